//! Session context owning the lazily built computation graph.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::converters::{DmlConverter, GraphConverter};
use crate::error::GraphError;
use crate::graph::{ComputationGraph, Operand, OperandKind, OperandType, Operation, ParamValue};
use crate::schema::{OperationCatalog, OperationSchema, is_valid_identifier};
use crate::validator::{GraphValidator, ValidationOptions};
use crate::value::{
    Frame, Invocation, List, Matrix, MultiReturn, OperandHandle, Options, Scalar, Value,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// How option names outside an operation's schema are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionPolicy {
    /// Unknown options and parameter kind mismatches are rejected at build time.
    #[default]
    Strict,
    /// Everything is forwarded to the engine unchecked.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub option_policy: OptionPolicy,
    /// Prefix used when materializing names for unnamed operands.
    pub variable_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            option_policy: OptionPolicy::Strict,
            variable_prefix: "V".to_string(),
        }
    }
}

pub struct SessionContext {
    id: u64,
    config: SessionConfig,
    catalog: OperationCatalog,
    graph: ComputationGraph,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_catalog(config, OperationCatalog::with_defaults())
    }

    pub fn with_catalog(config: SessionConfig, catalog: OperationCatalog) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            config,
            catalog,
            graph: ComputationGraph::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut OperationCatalog {
        &mut self.catalog
    }

    pub fn graph(&self) -> &ComputationGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ComputationGraph {
        self.graph
    }

    /// Declares a matrix bound by the host under `name`.
    ///
    /// The name must be an engine identifier not yet used by another operand
    /// of this session.
    pub fn matrix(&mut self, name: &str) -> Result<Matrix, GraphError> {
        Ok(Matrix::new(self.push_input(name, OperandType::Matrix)?, self.id))
    }

    pub fn frame(&mut self, name: &str) -> Result<Frame, GraphError> {
        Ok(Frame::new(self.push_input(name, OperandType::Frame)?, self.id))
    }

    pub fn scalar(&mut self, name: &str) -> Result<Scalar, GraphError> {
        Ok(Scalar::new(self.push_input(name, OperandType::Scalar)?, self.id))
    }

    pub fn list(&mut self, name: &str) -> Result<List, GraphError> {
        Ok(List::new(self.push_input(name, OperandType::List)?, self.id))
    }

    fn push_input(&mut self, name: &str, operand_type: OperandType) -> Result<u32, GraphError> {
        if !is_valid_identifier(name) {
            return Err(GraphError::InvalidIdentifier {
                name: name.to_string(),
            });
        }
        if self
            .graph
            .operands
            .iter()
            .any(|operand| operand.bound_name() == Some(name))
        {
            return Err(GraphError::DuplicateInputName {
                name: name.to_string(),
            });
        }
        let id = self.graph.operands.len() as u32;
        self.graph.operands.push(Operand {
            kind: OperandKind::Input,
            operand_type,
            name: Some(name.to_string()),
            producer: None,
        });
        Ok(id)
    }

    /// Index of the operation producing `handle`, if any.
    pub fn producer_of(&self, handle: impl Into<OperandHandle>) -> Option<u32> {
        let handle = handle.into();
        if handle.session != self.id {
            return None;
        }
        self.graph.operand(handle.id).and_then(|o| o.producer)
    }

    pub fn operation(&self, id: u32) -> Option<&Operation> {
        self.graph.operation(id)
    }

    /// Registers one invocation of `operation`.
    ///
    /// Required parameters are inserted first, in the order given; options are
    /// merged afterwards and replace a required entry of the same name. For
    /// multi-return operations one placeholder per declared output is created,
    /// each linked back to the shared node before the call returns.
    pub fn invoke(
        &mut self,
        operation: &str,
        required: Vec<(&str, Value)>,
        options: Options,
    ) -> Result<Invocation, GraphError> {
        let schema = self.catalog.get(operation)?;
        let strict = self.config.option_policy == OptionPolicy::Strict;

        let mut params: IndexMap<String, ParamValue> = IndexMap::new();
        for (name, value) in required {
            if strict {
                check_kind(schema, name, &value)?;
            }
            params.insert(name.to_string(), self.resolve(operation, value)?);
        }
        for (name, value) in options {
            if strict {
                if schema.param(&name).is_none() {
                    return Err(GraphError::UnknownOption {
                        operation: operation.to_string(),
                        option: name,
                        known: schema.param_names(),
                    });
                }
                check_kind(schema, &name, &value)?;
            } else if schema.param(&name).is_none() {
                warn!(operation, option = %name, "forwarding unrecognized option");
            }
            let resolved = self.resolve(operation, value)?;
            params.insert(name, resolved);
        }
        if strict
            && let Some(missing) = schema
                .required
                .iter()
                .find(|p| !params.contains_key(&p.name))
        {
            return Err(GraphError::MissingRequiredParameter {
                operation: operation.to_string(),
                parameter: missing.name.clone(),
            });
        }

        let output_types = schema.outputs.clone();
        if output_types.is_empty() {
            return Err(GraphError::MissingOutputs {
                operation: operation.to_string(),
            });
        }
        Ok(self.push_operation(operation, params, &output_types))
    }

    fn resolve(&self, operation: &str, value: Value) -> Result<ParamValue, GraphError> {
        Ok(match value {
            Value::Operand(handle) => {
                if handle.session != self.id {
                    return Err(GraphError::ForeignOperand {
                        operand: handle.id,
                        owner: handle.session,
                        session: self.id,
                    });
                }
                if self.graph.operand(handle.id).is_none() {
                    return Err(GraphError::InvalidOperandReference {
                        operation: operation.to_string(),
                        operand: handle.id,
                    });
                }
                ParamValue::Operand(handle.id)
            }
            Value::Double(v) => ParamValue::Double(v),
            Value::Integer(v) => ParamValue::Integer(v),
            Value::Boolean(v) => ParamValue::Boolean(v),
            Value::Text(v) => ParamValue::Text(v),
        })
    }

    // Node and outputs are appended under one `&mut self` borrow, so no handle
    // escapes before its producer link is set.
    fn push_operation(
        &mut self,
        operation: &str,
        params: IndexMap<String, ParamValue>,
        output_types: &[OperandType],
    ) -> Invocation {
        let op_id = self.graph.operations.len() as u32;
        let outputs: Vec<OperandHandle> = output_types
            .iter()
            .map(|&operand_type| {
                let id = self.graph.operands.len() as u32;
                self.graph.operands.push(Operand {
                    kind: OperandKind::Output,
                    operand_type,
                    name: None,
                    producer: Some(op_id),
                });
                OperandHandle {
                    id,
                    operand_type,
                    session: self.id,
                }
            })
            .collect();

        let ids: Vec<u32> = outputs.iter().map(|h| h.id).collect();
        let multi = ids.len() > 1;
        debug!(
            operation,
            node = op_id,
            params = params.len(),
            outputs = ids.len(),
            "registered operation"
        );
        self.graph.operations.push(Operation {
            op_type: operation.to_string(),
            params,
            output_operand: if multi { None } else { ids.first().copied() },
            output_operands: if multi { ids } else { Vec::new() },
            label: None,
        });

        if multi {
            Invocation::Multi(MultiReturn {
                operation: op_id,
                outputs,
            })
        } else {
            Invocation::Single(outputs[0])
        }
    }

    /// Assigns variable names to every unnamed operand using the configured prefix.
    pub fn materialize_names(&mut self) -> usize {
        self.graph.materialize_names(&self.config.variable_prefix)
    }

    /// Renders the current graph as engine script text.
    ///
    /// The graph is validated first; inputs that feed nothing are allowed.
    pub fn to_script(&self) -> Result<String, GraphError> {
        GraphValidator::new(
            &self.graph,
            ValidationOptions {
                reject_unused_inputs: false,
            },
        )
        .validate()?;
        let converted =
            DmlConverter::with_prefix(&self.config.variable_prefix).convert(&self.graph)?;
        String::from_utf8(converted.data).map_err(|err| GraphError::ConversionFailed {
            format: converted.format.to_string(),
            reason: err.to_string(),
        })
    }
}

fn check_kind(schema: &OperationSchema, name: &str, value: &Value) -> Result<(), GraphError> {
    if let Some(spec) = schema.param(name)
        && !spec.kind.accepts(value)
    {
        return Err(GraphError::ParameterKindMismatch {
            operation: schema.name.clone(),
            parameter: name.to_string(),
            expected: spec.kind,
            actual: value.describe(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamKind;

    #[test]
    fn multi_return_links_every_output_to_one_node() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let result = ctx
            .invoke("scale", vec![("X", x.into())], Options::new())
            .unwrap()
            .into_multi()
            .unwrap();

        assert_eq!(result.len(), 3);
        for handle in result.outputs() {
            assert_eq!(ctx.producer_of(*handle), Some(result.operation()));
        }
        let op = ctx.operation(result.operation()).unwrap();
        let ids: Vec<u32> = result.outputs().iter().map(|h| h.id()).collect();
        assert_eq!(op.output_operands_slice(), ids.as_slice());
        assert_eq!(ctx.producer_of(x), None);
    }

    #[test]
    fn options_override_required_entries_in_place() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let y = ctx.matrix("Y").unwrap();
        let out = ctx
            .invoke(
                "glm",
                vec![("X", x.into()), ("Y", y.into())],
                Options::new().with("X", y).with("icpt", 2),
            )
            .unwrap();
        let op = ctx.producer_of(out.outputs()[0]).unwrap();
        let params = &ctx.operation(op).unwrap().params;
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["X", "Y", "icpt"]);
        assert_eq!(params["X"], ParamValue::Operand(y.id()));
    }

    #[test]
    fn strict_policy_rejects_unknown_options() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let err = ctx
            .invoke("kmeans", vec![("X", x.into())], Options::new().with("centroids", 3))
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownOption { ref option, .. } if option == "centroids"));
        assert!(ctx.graph().operations.is_empty());
    }

    #[test]
    fn strict_policy_checks_parameter_kinds() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let err = ctx
            .invoke("kmeans", vec![("X", x.into())], Options::new().with("k", "three"))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::ParameterKindMismatch {
                expected: ParamKind::Integer,
                ..
            }
        ));
    }

    #[test]
    fn strict_policy_requires_every_required_parameter() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        let err = ctx
            .invoke("glm", vec![("X", x.into())], Options::new())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::MissingRequiredParameter { ref parameter, .. } if parameter == "Y"
        ));
    }

    #[test]
    fn permissive_policy_forwards_unknown_options() {
        let mut ctx = SessionContext::with_config(SessionConfig {
            option_policy: OptionPolicy::Permissive,
            ..SessionConfig::default()
        });
        let x = ctx.matrix("X").unwrap();
        let out = ctx
            .invoke("kmeans", vec![("X", x.into())], Options::new().with("centroids", 3))
            .unwrap();
        let op = ctx.producer_of(out.outputs()[0]).unwrap();
        assert!(ctx.operation(op).unwrap().params.contains_key("centroids"));
    }

    #[test]
    fn handles_from_another_session_are_rejected() {
        let mut other = SessionContext::new();
        let foreign = other.matrix("X").unwrap();
        let mut ctx = SessionContext::new();
        let err = ctx
            .invoke("kmeans", vec![("X", foreign.into())], Options::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::ForeignOperand { .. }));
        assert_eq!(ctx.producer_of(foreign), None);
    }

    #[test]
    fn leaf_names_must_be_unique_identifiers() {
        let mut ctx = SessionContext::new();
        ctx.matrix("X").unwrap();
        assert!(matches!(
            ctx.matrix("X"),
            Err(GraphError::DuplicateInputName { ref name }) if name == "X"
        ));
        assert!(matches!(
            ctx.frame("my data"),
            Err(GraphError::InvalidIdentifier { ref name }) if name == "my data"
        ));
        assert!(matches!(
            ctx.scalar("1st"),
            Err(GraphError::InvalidIdentifier { .. })
        ));
        assert_eq!(ctx.graph().operands.len(), 1);
    }

    #[test]
    fn leaf_names_cannot_reuse_materialized_names() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        ctx.invoke("scale", vec![("X", x.into())], Options::new())
            .unwrap();
        ctx.materialize_names();
        assert!(matches!(
            ctx.list("V1"),
            Err(GraphError::DuplicateInputName { .. })
        ));
    }

    #[test]
    fn to_script_rejects_graphs_that_fail_validation() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        ctx.invoke("scale", vec![("X", x.into())], Options::new())
            .unwrap();
        ctx.graph.operands[1].producer = None;
        assert!(matches!(
            ctx.to_script(),
            Err(GraphError::ProducerMismatch { operand: 1, .. })
        ));
    }

    #[test]
    fn unknown_operation_is_reported() {
        let mut ctx = SessionContext::new();
        let err = ctx.invoke("lmDS", Vec::new(), Options::new()).unwrap_err();
        assert!(matches!(err, GraphError::UnknownOperation { .. }));
    }

    #[test]
    fn materialize_names_uses_configured_prefix() {
        let mut ctx = SessionContext::with_config(SessionConfig {
            variable_prefix: "tmp_".to_string(),
            ..SessionConfig::default()
        });
        let x = ctx.matrix("X").unwrap();
        ctx.invoke("kmeans", vec![("X", x.into())], Options::new())
            .unwrap();
        assert_eq!(ctx.materialize_names(), 2);
        assert_eq!(ctx.graph().operands[1].name.as_deref(), Some("tmp_1"));
    }
}
