use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::graph::ComputationGraph;
use crate::schema::OperationSchema;

/// On-disk layout of an operation signature table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub operations: Vec<OperationSchema>,
}

fn read(path: &Path) -> Result<String, GraphError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => fs::read_to_string(path).map_err(|err| GraphError::io(path, err)),
        Some(other) => Err(GraphError::ConversionFailed {
            format: "unknown".to_string(),
            reason: format!("Unsupported file extension: {:?}. Use .json", other),
        }),
        None => Err(GraphError::ConversionFailed {
            format: "unknown".to_string(),
            reason: "No file extension found. Use .json".to_string(),
        }),
    }
}

/// Load a serialized computation graph (as written by the `json` converter).
pub fn load_graph_from_path(path: impl AsRef<Path>) -> Result<ComputationGraph, GraphError> {
    let path_ref = path.as_ref();
    let graph: ComputationGraph = serde_json::from_str(&read(path_ref)?)?;
    debug!(
        path = %path_ref.display(),
        operands = graph.operands.len(),
        operations = graph.operations.len(),
        "loaded graph"
    );
    Ok(graph)
}

/// Load operation schemas, checking each one before returning.
pub fn load_catalog_from_path(path: impl AsRef<Path>) -> Result<Vec<OperationSchema>, GraphError> {
    let path_ref = path.as_ref();
    let file: CatalogFile = serde_json::from_str(&read(path_ref)?)?;
    for schema in &file.operations {
        schema.validate()?;
    }
    debug!(
        path = %path_ref.display(),
        operations = file.operations.len(),
        "loaded operation catalog"
    );
    Ok(file.operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::context::SessionContext;
    use crate::converters::{GraphConverter, JsonConverter};
    use crate::graph::OperandType;
    use crate::schema::ParamKind;
    use crate::value::Options;
    use std::io::Write;

    #[test]
    fn loads_graph_written_by_json_converter() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        builtins::kmeans(&mut ctx, x, Options::new().with("seed", -1)).unwrap();
        let data = JsonConverter.convert(ctx.graph()).unwrap().data;

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(&data).unwrap();

        let graph = load_graph_from_path(file.path()).unwrap();
        assert_eq!(graph.operations[0].op_type, "kmeans");
        assert_eq!(graph.operands.len(), 3);
    }

    #[test]
    fn loads_and_validates_catalog() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"operations": [{{
                "name": "lm",
                "required": [{{"name": "X", "kind": "matrix"}}, {{"name": "y", "kind": "matrix"}}],
                "options": [{{"name": "reg", "kind": "double"}}],
                "outputs": ["matrix"]
            }}]}}"#
        )
        .unwrap();

        let schemas = load_catalog_from_path(file.path()).unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].outputs, vec![OperandType::Matrix]);
        assert_eq!(schemas[0].param("reg").map(|p| p.kind), Some(ParamKind::Double));
    }

    #[test]
    fn catalog_with_invalid_identifier_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"operations": [{{"name": "bad-name", "outputs": ["scalar"]}}]}}"#
        )
        .unwrap();
        assert!(matches!(
            load_catalog_from_path(file.path()),
            Err(GraphError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn graph_with_repeated_parameter_name_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "operands": [
                    {{"kind": "input", "operand_type": "matrix", "name": "A"}},
                    {{"kind": "input", "operand_type": "matrix", "name": "B"}},
                    {{"kind": "output", "operand_type": "matrix", "producer": 0}}
                ],
                "operations": [{{
                    "type": "glm",
                    "params": {{
                        "X": {{"kind": "operand", "value": 0}},
                        "X": {{"kind": "operand", "value": 1}}
                    }},
                    "output_operand": 2
                }}]
            }}"#
        )
        .unwrap();
        assert!(matches!(
            load_graph_from_path(file.path()),
            Err(GraphError::Parse { .. })
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".dml").tempfile().unwrap();
        assert!(matches!(
            load_graph_from_path(file.path()),
            Err(GraphError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        assert!(matches!(
            load_graph_from_path("/nonexistent/graph.json"),
            Err(GraphError::Io { .. })
        ));
    }
}
