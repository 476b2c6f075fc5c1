//! Operation signatures and the catalog that holds them.
//!
//! Each engine operation is described once by an [`OperationSchema`]: its name,
//! the required parameters in call order, the recognized options, and the fixed
//! sequence of output types. The generic binding in
//! [`SessionContext::invoke`](crate::SessionContext::invoke) is driven entirely
//! by these tables.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::builtins;
use crate::error::GraphError;
use crate::graph::{ComputationGraph, OperandType};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Matrix,
    Frame,
    List,
    /// Scalar operand or any literal.
    Scalar,
    Double,
    Integer,
    Boolean,
    Text,
    Any,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Matrix => "matrix",
            ParamKind::Frame => "frame",
            ParamKind::List => "list",
            ParamKind::Scalar => "scalar",
            ParamKind::Double => "double",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Text => "text",
            ParamKind::Any => "any",
        }
    }

    /// Whether `value` may be bound to a parameter of this kind.
    ///
    /// Scalar operands stand in for any literal kind since their value is only
    /// known once the engine runs. Integers widen to doubles.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ParamKind::Any, _) => true,
            (ParamKind::Matrix, Value::Operand(h)) => h.operand_type() == OperandType::Matrix,
            (ParamKind::Frame, Value::Operand(h)) => h.operand_type() == OperandType::Frame,
            (ParamKind::List, Value::Operand(h)) => h.operand_type() == OperandType::List,
            (
                ParamKind::Scalar
                | ParamKind::Double
                | ParamKind::Integer
                | ParamKind::Boolean
                | ParamKind::Text,
                Value::Operand(h),
            ) => h.operand_type() == OperandType::Scalar,
            (ParamKind::Scalar, _) => true,
            (ParamKind::Double, Value::Double(_) | Value::Integer(_)) => true,
            (ParamKind::Integer, Value::Integer(_)) => true,
            (ParamKind::Boolean, Value::Boolean(_)) => true,
            (ParamKind::Text, Value::Text(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSchema {
    pub name: String,
    #[serde(default)]
    pub required: Vec<ParamSpec>,
    #[serde(default)]
    pub options: Vec<ParamSpec>,
    pub outputs: Vec<OperandType>,
    #[serde(default)]
    pub description: Option<String>,
}

impl OperationSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            options: Vec::new(),
            outputs: Vec::new(),
            description: None,
        }
    }

    pub fn required(mut self, name: &str, kind: ParamKind) -> Self {
        self.required.push(ParamSpec::new(name, kind));
        self
    }

    pub fn option(mut self, name: &str, kind: ParamKind) -> Self {
        self.options.push(ParamSpec::new(name, kind));
        self
    }

    pub fn returns(mut self, outputs: &[OperandType]) -> Self {
        self.outputs = outputs.to_vec();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn is_multi_return(&self) -> bool {
        self.outputs.len() > 1
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.required
            .iter()
            .chain(self.options.iter())
            .find(|p| p.name == name)
    }

    pub fn param_names(&self) -> Vec<String> {
        self.required
            .iter()
            .chain(self.options.iter())
            .map(|p| p.name.clone())
            .collect()
    }

    /// Checks identifiers, parameter uniqueness and that at least one output is declared.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !is_valid_identifier(&self.name) {
            return Err(GraphError::InvalidIdentifier {
                name: self.name.clone(),
            });
        }
        if self.outputs.is_empty() {
            return Err(GraphError::MissingOutputs {
                operation: self.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for param in self.required.iter().chain(self.options.iter()) {
            if !is_valid_identifier(&param.name) {
                return Err(GraphError::InvalidIdentifier {
                    name: param.name.clone(),
                });
            }
            if !seen.insert(param.name.as_str()) {
                return Err(GraphError::DuplicateParameter {
                    operation: self.name.clone(),
                    parameter: param.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Engine identifiers: a letter or underscore followed by word characters.
pub fn is_valid_identifier(name: &str) -> bool {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
        .is_match(name)
}

/// Registry of operation schemas keyed by engine operation name.
#[derive(Debug, Clone, Default)]
pub struct OperationCatalog {
    schemas: HashMap<String, OperationSchema>,
}

impl OperationCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut catalog = Self::empty();
        for schema in builtins::builtin_schemas() {
            catalog.schemas.insert(schema.name.clone(), schema);
        }
        catalog
    }

    /// Adds or replaces a schema. Returns the schema previously registered under the name.
    pub fn register(
        &mut self,
        schema: OperationSchema,
    ) -> Result<Option<OperationSchema>, GraphError> {
        schema.validate()?;
        Ok(self.schemas.insert(schema.name.clone(), schema))
    }

    pub fn extend(
        &mut self,
        schemas: impl IntoIterator<Item = OperationSchema>,
    ) -> Result<usize, GraphError> {
        let mut count = 0;
        for schema in schemas {
            self.register(schema)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, operation: &str) -> Result<&OperationSchema, GraphError> {
        self.schemas
            .get(operation)
            .ok_or_else(|| GraphError::UnknownOperation {
                operation: operation.to_string(),
            })
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.schemas.contains_key(operation)
    }

    pub fn available_operations(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Verifies every operation in `graph` is known and produces the declared output types.
    pub fn check_graph(&self, graph: &ComputationGraph) -> Result<(), GraphError> {
        for operation in &graph.operations {
            let schema = self.get(&operation.op_type)?;
            let outputs = operation.output_operands_slice();
            if outputs.len() != schema.outputs.len() {
                return Err(GraphError::UnexpectedArity {
                    expected: schema.outputs.len(),
                    actual: outputs.len(),
                });
            }
            for (index, (&id, &expected)) in outputs.iter().zip(&schema.outputs).enumerate() {
                let operand = graph.operand(id).ok_or_else(|| {
                    GraphError::InvalidOperandReference {
                        operation: operation.display_name(),
                        operand: id,
                    }
                })?;
                if operand.operand_type != expected {
                    return Err(GraphError::OutputTypeMismatch {
                        index,
                        expected,
                        actual: operand.operand_type,
                    });
                }
            }
        }
        Ok(())
    }
}
