//! Caller-facing handles and option values.
//!
//! Handles are light copies of an arena id plus the owning session id, so they
//! can be passed around freely and resolved against the session's graph later.

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::graph::OperandType;

/// Untyped reference to an operand inside a session's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandHandle {
    pub(crate) id: u32,
    pub(crate) operand_type: OperandType,
    pub(crate) session: u64,
}

impl OperandHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn operand_type(&self) -> OperandType {
        self.operand_type
    }

    pub fn session(&self) -> u64 {
        self.session
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(OperandHandle);

        impl $name {
            pub(crate) fn from_handle(handle: OperandHandle) -> Option<Self> {
                (handle.operand_type == OperandType::$variant).then_some(Self(handle))
            }

            pub(crate) fn new(id: u32, session: u64) -> Self {
                Self(OperandHandle {
                    id,
                    operand_type: OperandType::$variant,
                    session,
                })
            }

            pub fn handle(&self) -> OperandHandle {
                self.0
            }

            pub fn id(&self) -> u32 {
                self.0.id
            }
        }

        impl From<$name> for OperandHandle {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<$name> for Value {
            fn from(value: $name) -> Self {
                Value::Operand(value.0)
            }
        }

        impl From<&$name> for Value {
            fn from(value: &$name) -> Self {
                Value::Operand(value.0)
            }
        }
    };
}

typed_handle!(
    /// Handle to a matrix value.
    Matrix,
    Matrix
);
typed_handle!(
    /// Handle to a frame (heterogeneous table) value.
    Frame,
    Frame
);
typed_handle!(
    /// Handle to a scalar value.
    Scalar,
    Scalar
);
typed_handle!(
    /// Handle to a list value.
    List,
    List
);

/// A parameter value supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Operand(OperandHandle),
    Double(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn describe(&self) -> String {
        match self {
            Value::Operand(handle) => format!("{} operand", handle.operand_type),
            Value::Double(_) => "double".to_string(),
            Value::Integer(_) => "integer".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Text(_) => "text".to_string(),
        }
    }
}

impl From<OperandHandle> for Value {
    fn from(value: OperandHandle) -> Self {
        Value::Operand(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Double(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Ordered bag of named options passed alongside the required parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: IndexMap<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for Options {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut options = Options::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

/// Outputs of a multi-return operation, all produced by one shared node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiReturn {
    pub(crate) operation: u32,
    pub(crate) outputs: Vec<OperandHandle>,
}

impl MultiReturn {
    pub fn operation(&self) -> u32 {
        self.operation
    }

    pub fn outputs(&self) -> &[OperandHandle] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<OperandHandle> {
        self.outputs.get(index).copied()
    }

    fn typed<T>(
        &self,
        index: usize,
        expected: OperandType,
        cast: fn(OperandHandle) -> Option<T>,
    ) -> Result<T, GraphError> {
        let handle = self.get(index).ok_or(GraphError::OutputIndexOutOfRange {
            index,
            len: self.outputs.len(),
        })?;
        cast(handle).ok_or(GraphError::OutputTypeMismatch {
            index,
            expected,
            actual: handle.operand_type,
        })
    }

    pub fn matrix(&self, index: usize) -> Result<Matrix, GraphError> {
        self.typed(index, OperandType::Matrix, Matrix::from_handle)
    }

    pub fn frame(&self, index: usize) -> Result<Frame, GraphError> {
        self.typed(index, OperandType::Frame, Frame::from_handle)
    }

    pub fn scalar(&self, index: usize) -> Result<Scalar, GraphError> {
        self.typed(index, OperandType::Scalar, Scalar::from_handle)
    }

    pub fn list(&self, index: usize) -> Result<List, GraphError> {
        self.typed(index, OperandType::List, List::from_handle)
    }
}

/// Result of a generic invocation: one live handle, or a shared multi-return node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Single(OperandHandle),
    Multi(MultiReturn),
}

impl Invocation {
    pub fn outputs(&self) -> &[OperandHandle] {
        match self {
            Invocation::Single(handle) => std::slice::from_ref(handle),
            Invocation::Multi(multi) => multi.outputs(),
        }
    }

    pub fn into_multi(self) -> Option<MultiReturn> {
        match self {
            Invocation::Multi(multi) => Some(multi),
            Invocation::Single(_) => None,
        }
    }

    pub fn into_matrix(self) -> Result<Matrix, GraphError> {
        self.single_typed(OperandType::Matrix, Matrix::from_handle)
    }

    pub fn into_frame(self) -> Result<Frame, GraphError> {
        self.single_typed(OperandType::Frame, Frame::from_handle)
    }

    pub fn into_scalar(self) -> Result<Scalar, GraphError> {
        self.single_typed(OperandType::Scalar, Scalar::from_handle)
    }

    pub fn into_list(self) -> Result<List, GraphError> {
        self.single_typed(OperandType::List, List::from_handle)
    }

    fn single_typed<T>(
        self,
        expected: OperandType,
        cast: fn(OperandHandle) -> Option<T>,
    ) -> Result<T, GraphError> {
        let outputs = self.outputs();
        if outputs.len() != 1 {
            return Err(GraphError::UnexpectedArity {
                expected: 1,
                actual: outputs.len(),
            });
        }
        let handle = outputs[0];
        cast(handle).ok_or(GraphError::OutputTypeMismatch {
            index: 0,
            expected,
            actual: handle.operand_type,
        })
    }
}
