use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{MapPreventDuplicates, serde_as, skip_serializing_none};

/// Value categories the engine distinguishes for operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandType {
    Matrix,
    Frame,
    Scalar,
    List,
}

impl OperandType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperandType::Matrix => "matrix",
            OperandType::Frame => "frame",
            OperandType::Scalar => "scalar",
            OperandType::List => "list",
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    /// Leaf value bound by the host under a variable name.
    Input,
    /// Value produced by an operation.
    Output,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operand {
    pub kind: OperandKind,
    pub operand_type: OperandType,
    /// Variable name: set for inputs, filled in for outputs once names are materialized.
    #[serde(default)]
    pub name: Option<String>,
    /// Index of the producing operation. Always `None` for inputs.
    #[serde(default)]
    pub producer: Option<u32>,
}

impl Operand {
    pub fn bound_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// A bound parameter value as stored in an operation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Operand(u32),
    Double(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl ParamValue {
    pub fn operand_id(&self) -> Option<u32> {
        match self {
            ParamValue::Operand(id) => Some(*id),
            _ => None,
        }
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: String,
    /// Parameter names are unique; a repeated key in serialized input is an error.
    #[serde_as(as = "MapPreventDuplicates<_, _>")]
    #[serde(default)]
    pub params: IndexMap<String, ParamValue>,
    /// Output of a single-return operation.
    #[serde(default)]
    pub output_operand: Option<u32>,
    /// Outputs of a multi-return operation, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_operands: Vec<u32>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Operation {
    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.op_type.clone())
    }

    pub fn is_multi_return(&self) -> bool {
        self.output_operand.is_none() && !self.output_operands.is_empty()
    }

    pub fn output_operands_slice(&self) -> &[u32] {
        match &self.output_operand {
            Some(id) => std::slice::from_ref(id),
            None => &self.output_operands,
        }
    }

    /// Operand ids consumed through the parameter map, in parameter order.
    pub fn input_operands(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.params
            .iter()
            .filter_map(|(name, value)| value.operand_id().map(|id| (name.as_str(), id)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputationGraph {
    #[serde(default)]
    pub operands: Vec<Operand>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl ComputationGraph {
    pub fn operand(&self, id: u32) -> Option<&Operand> {
        self.operands.get(id as usize)
    }

    pub fn operation(&self, id: u32) -> Option<&Operation> {
        self.operations.get(id as usize)
    }

    pub fn producer_of(&self, operand: u32) -> Option<&Operation> {
        self.operand(operand)
            .and_then(|o| o.producer)
            .and_then(|op| self.operation(op))
    }

    pub fn input_operands(&self) -> Vec<u32> {
        self.operands
            .iter()
            .enumerate()
            .filter(|(_, o)| o.kind == OperandKind::Input)
            .map(|(idx, _)| idx as u32)
            .collect()
    }

    /// Produced operands that no operation consumes.
    pub fn result_operands(&self) -> Vec<u32> {
        let mut consumed = vec![false; self.operands.len()];
        for operation in &self.operations {
            for (_, id) in operation.input_operands() {
                if let Some(slot) = consumed.get_mut(id as usize) {
                    *slot = true;
                }
            }
        }
        self.operands
            .iter()
            .enumerate()
            .filter(|(idx, o)| o.kind == OperandKind::Output && !consumed[*idx])
            .map(|(idx, _)| idx as u32)
            .collect()
    }

    /// Variable name of every operand, indexed by operand id.
    ///
    /// Bound names are kept. Unnamed operands get `{prefix}{id}`, followed by
    /// `_1`, `_2`, ... when that name is already bound elsewhere in the graph.
    pub fn variable_names(&self, prefix: &str) -> Vec<String> {
        let mut taken: HashSet<String> = self
            .operands
            .iter()
            .filter_map(|o| o.bound_name().map(str::to_string))
            .collect();
        self.operands
            .iter()
            .enumerate()
            .map(|(idx, operand)| match operand.bound_name() {
                Some(name) => name.to_string(),
                None => {
                    let base = format!("{}{}", prefix, idx);
                    let mut candidate = base.clone();
                    let mut suffix = 1;
                    while taken.contains(&candidate) {
                        candidate = format!("{}_{}", base, suffix);
                        suffix += 1;
                    }
                    taken.insert(candidate.clone());
                    candidate
                }
            })
            .collect()
    }

    /// Stores a generated name on every operand that has none yet.
    pub fn materialize_names(&mut self, prefix: &str) -> usize {
        let names = self.variable_names(prefix);
        let mut assigned = 0;
        for (operand, name) in self.operands.iter_mut().zip(names) {
            if operand.bound_name().is_none() {
                operand.name = Some(name);
                assigned += 1;
            }
        }
        assigned
    }
}
