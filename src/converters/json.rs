use crate::converters::{ConvertedGraph, GraphConverter};
use crate::error::GraphError;
use crate::graph::ComputationGraph;

/// Serializes the graph as pretty-printed JSON, readable by `load_graph_from_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl GraphConverter for JsonConverter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn convert(&self, graph: &ComputationGraph) -> Result<ConvertedGraph, GraphError> {
        let data = serde_json::to_vec_pretty(graph)?;
        Ok(ConvertedGraph {
            format: "json",
            content_type: "application/json",
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::context::SessionContext;
    use crate::value::Options;

    #[test]
    fn json_output_parses_back_into_the_same_graph() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        builtins::scale(&mut ctx, x, Options::new().with("center", true)).unwrap();

        let converted = JsonConverter.convert(ctx.graph()).unwrap();
        let back: ComputationGraph = serde_json::from_slice(&converted.data).unwrap();
        assert_eq!(back.operands.len(), 4);
        assert_eq!(back.operations[0].output_operands, vec![1, 2, 3]);
        assert_eq!(back.operands[3].producer, Some(0));
    }
}
