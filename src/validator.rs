use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::graph::{ComputationGraph, OperandKind};
use crate::schema::is_valid_identifier;

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Reject inputs that are declared but never consumed.
    pub reject_unused_inputs: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            reject_unused_inputs: true,
        }
    }
}

#[derive(Debug)]
pub struct ValidationArtifacts {
    pub input_names_to_operands: HashMap<String, u32>,
    pub operand_to_dependent_operations: HashMap<u32, Vec<String>>,
    pub operand_to_producing_operation: HashMap<u32, String>,
    /// Produced operands nothing consumes, in arena order.
    pub result_operands: Vec<u32>,
}

/// Checks the structural invariants of a graph: producer links agree in both
/// directions, every reference resolves, and operands are produced before use.
pub struct GraphValidator<'a> {
    graph: &'a ComputationGraph,
    options: ValidationOptions,
    processed_operands: HashSet<u32>,
    operand_to_dependents: HashMap<u32, Vec<String>>,
    operand_to_producer: HashMap<u32, String>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(graph: &'a ComputationGraph, options: ValidationOptions) -> Self {
        Self {
            graph,
            options,
            processed_operands: HashSet::new(),
            operand_to_dependents: HashMap::new(),
            operand_to_producer: HashMap::new(),
        }
    }

    pub fn validate(mut self) -> Result<ValidationArtifacts, GraphError> {
        if self.graph.operands.is_empty() || self.graph.operations.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        if self.graph.operands.len() >= u32::MAX as usize {
            return Err(GraphError::TooManyOperands {
                count: self.graph.operands.len(),
            });
        }

        let mut inputs = HashMap::new();
        for (idx, operand) in self.graph.operands.iter().enumerate() {
            let operand_id = idx as u32;
            match operand.kind {
                OperandKind::Input => {
                    if operand.producer.is_some() {
                        return Err(GraphError::InputWithProducer {
                            operand: operand_id,
                        });
                    }
                    let name = operand
                        .name
                        .as_ref()
                        .filter(|name| !name.is_empty())
                        .ok_or(GraphError::MissingInputName {
                            operand: operand_id,
                        })?;
                    if !is_valid_identifier(name) {
                        return Err(GraphError::InvalidIdentifier { name: name.clone() });
                    }
                    if inputs.insert(name.clone(), operand_id).is_some() {
                        return Err(GraphError::DuplicateInputName { name: name.clone() });
                    }
                    self.processed_operands.insert(operand_id);
                }
                OperandKind::Output => {
                    let Some(producer) = operand.producer else {
                        return Err(GraphError::ProducerMismatch {
                            operation: "<none>".to_string(),
                            operand: operand_id,
                            producer: None,
                        });
                    };
                    let operation = self.graph.operation(producer).ok_or(
                        GraphError::InvalidOperationReference {
                            operand: operand_id,
                            operation: producer,
                        },
                    )?;
                    if !operation.output_operands_slice().contains(&operand_id) {
                        return Err(GraphError::OrphanedOutput {
                            operand: operand_id,
                            operation: producer,
                        });
                    }
                }
            }
        }

        self.validate_variable_names(&inputs)?;
        self.validate_operations()?;
        self.validate_operand_usage()?;

        Ok(ValidationArtifacts {
            input_names_to_operands: inputs,
            operand_to_dependent_operations: self.operand_to_dependents,
            operand_to_producing_operation: self.operand_to_producer,
            result_operands: self.graph.result_operands(),
        })
    }

    // Materialized output names share one namespace with the input names.
    fn validate_variable_names(&self, inputs: &HashMap<String, u32>) -> Result<(), GraphError> {
        let mut seen: HashSet<&str> = inputs.keys().map(String::as_str).collect();
        for (idx, operand) in self.graph.operands.iter().enumerate() {
            if operand.kind != OperandKind::Output {
                continue;
            }
            if let Some(name) = operand.name.as_deref().filter(|name| !name.is_empty())
                && !seen.insert(name)
            {
                return Err(GraphError::DuplicateVariableName {
                    name: name.to_string(),
                    operand: idx as u32,
                });
            }
        }
        Ok(())
    }

    fn validate_operations(&mut self) -> Result<(), GraphError> {
        for (idx, operation) in self.graph.operations.iter().enumerate() {
            let op_name = operation.display_name();
            for (_, input_id) in operation.input_operands() {
                self.graph.operand(input_id).ok_or_else(|| {
                    GraphError::InvalidOperandReference {
                        operation: op_name.clone(),
                        operand: input_id,
                    }
                })?;
                if !self.processed_operands.contains(&input_id) {
                    return Err(GraphError::OperandNotReady {
                        operation: op_name.clone(),
                        operand: input_id,
                    });
                }
                self.operand_to_dependents
                    .entry(input_id)
                    .or_default()
                    .push(op_name.clone());
            }

            let outputs = operation.output_operands_slice();
            if outputs.is_empty() {
                return Err(GraphError::MissingOutputs {
                    operation: op_name.clone(),
                });
            }
            for &output_id in outputs {
                let operand = self.graph.operand(output_id).ok_or_else(|| {
                    GraphError::InvalidOperandReference {
                        operation: op_name.clone(),
                        operand: output_id,
                    }
                })?;
                if self.operand_to_producer.contains_key(&output_id)
                    || operand.kind == OperandKind::Input
                {
                    return Err(GraphError::OperandProducedTwice {
                        operation: op_name.clone(),
                        operand: output_id,
                    });
                }
                if operand.producer != Some(idx as u32) {
                    return Err(GraphError::ProducerMismatch {
                        operation: op_name.clone(),
                        operand: output_id,
                        producer: operand.producer,
                    });
                }
                self.operand_to_producer
                    .insert(output_id, operation.op_type.clone());
                self.processed_operands.insert(output_id);
            }
        }
        Ok(())
    }

    fn validate_operand_usage(&self) -> Result<(), GraphError> {
        if !self.options.reject_unused_inputs {
            return Ok(());
        }
        for (idx, operand) in self.graph.operands.iter().enumerate() {
            let operand_id = idx as u32;
            if operand.kind == OperandKind::Input
                && !self.operand_to_dependents.contains_key(&operand_id)
            {
                return Err(GraphError::OperandNeverUsed {
                    operand: operand_id,
                });
            }
        }
        Ok(())
    }
}
