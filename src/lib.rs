pub mod builtins;
pub mod context;
pub mod converters;
pub mod error;
pub mod graph;
pub mod graphviz;
pub mod loader;
pub mod schema;
pub mod validator;
pub mod value;

pub use context::{OptionPolicy, SessionConfig, SessionContext};
pub use converters::{ConvertedGraph, ConverterRegistry, DmlConverter, GraphConverter};
pub use error::GraphError;
pub use graph::{ComputationGraph, Operand, OperandKind, OperandType, Operation, ParamValue};
pub use graphviz::graph_to_dot;
pub use loader::{load_catalog_from_path, load_graph_from_path};
pub use schema::{OperationCatalog, OperationSchema, ParamKind, ParamSpec};
pub use validator::{GraphValidator, ValidationArtifacts, ValidationOptions};
pub use value::{
    Frame, Invocation, List, Matrix, MultiReturn, OperandHandle, Options, Scalar, Value,
};
