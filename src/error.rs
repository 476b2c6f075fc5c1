use std::path::PathBuf;

use crate::graph::OperandType;
use crate::schema::ParamKind;
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("file {path} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON could not be parsed: {source}")]
    Parse {
        #[from]
        source: JsonError,
    },
    #[error("graph must declare operands and operations")]
    EmptyGraph,
    #[error("graph declares {count} operands which exceeds the u32 id space")]
    TooManyOperands { count: usize },
    #[error("input operand {operand} is missing a name")]
    MissingInputName { operand: u32 },
    #[error("input operand name `{name}` is duplicated")]
    DuplicateInputName { name: String },
    #[error("operand {operand} reuses variable name `{name}`")]
    DuplicateVariableName { name: String, operand: u32 },
    #[error("input operand {operand} must not have a producer")]
    InputWithProducer { operand: u32 },
    #[error("input operand {operand} never feeds any operation")]
    OperandNeverUsed { operand: u32 },
    #[error("operation `{operation}` is not in the catalog")]
    UnknownOperation { operation: String },
    #[error("operation `{operation}` does not recognize option `{option}`. Known: {known:?}")]
    UnknownOption {
        operation: String,
        option: String,
        known: Vec<String>,
    },
    #[error("operation `{operation}` expects `{parameter}` to be {expected}, got {actual}")]
    ParameterKindMismatch {
        operation: String,
        parameter: String,
        expected: ParamKind,
        actual: String,
    },
    #[error("operation `{operation}` is missing required parameter `{parameter}`")]
    MissingRequiredParameter {
        operation: String,
        parameter: String,
    },
    #[error("operation `{operation}` declares parameter `{parameter}` more than once")]
    DuplicateParameter {
        operation: String,
        parameter: String,
    },
    #[error("operand {operand} belongs to session {owner}, not session {session}")]
    ForeignOperand {
        operand: u32,
        owner: u64,
        session: u64,
    },
    #[error("operand id {operand} referenced by `{operation}` is invalid")]
    InvalidOperandReference { operation: String, operand: u32 },
    #[error("operation id {operation} referenced by operand {operand} is invalid")]
    InvalidOperationReference { operand: u32, operation: u32 },
    #[error("operation `{operation}` consumes operand {operand} before it is produced")]
    OperandNotReady { operation: String, operand: u32 },
    #[error("operation `{operation}` attempts to reuse operand {operand} as output")]
    OperandProducedTwice { operation: String, operand: u32 },
    #[error("operand {operand} is listed by `{operation}` but its producer link is {producer:?}")]
    ProducerMismatch {
        operation: String,
        operand: u32,
        producer: Option<u32>,
    },
    #[error("operand {operand} claims producer {operation} which does not list it as an output")]
    OrphanedOutput { operand: u32, operation: u32 },
    #[error("operation `{operation}` declares no outputs")]
    MissingOutputs { operation: String },
    #[error("output {index} is a {actual}, not a {expected}")]
    OutputTypeMismatch {
        index: usize,
        expected: OperandType,
        actual: OperandType,
    },
    #[error("expected {expected} outputs, operation declares {actual}")]
    UnexpectedArity { expected: usize, actual: usize },
    #[error("output index {index} is out of range for {len} outputs")]
    OutputIndexOutOfRange { index: usize, len: usize },
    #[error("`{name}` is not a valid engine identifier")]
    InvalidIdentifier { name: String },
    #[error("graph converter `{requested}` is not available. Supported: {available:?}")]
    UnknownConverter {
        requested: String,
        available: Vec<&'static str>,
    },
    #[error("graph conversion failed for {format}: {reason}")]
    ConversionFailed { format: String, reason: String },
    #[error("graph could not be exported to {path}: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::ExportIo {
            path: path.into(),
            source,
        }
    }
}
