use std::fmt::Write;

use crate::converters::{ConvertedGraph, GraphConverter};
use crate::error::GraphError;
use crate::graph::{ComputationGraph, Operation, ParamValue};

/// Renders a graph as engine script, one assignment per operation in arena order.
#[derive(Debug, Clone)]
pub struct DmlConverter {
    variable_prefix: String,
}

impl Default for DmlConverter {
    fn default() -> Self {
        Self::with_prefix("V")
    }
}

impl DmlConverter {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            variable_prefix: prefix.to_string(),
        }
    }

    fn operand_name(
        &self,
        names: &[String],
        operation: &Operation,
        id: u32,
    ) -> Result<String, GraphError> {
        names
            .get(id as usize)
            .cloned()
            .ok_or_else(|| GraphError::InvalidOperandReference {
                operation: operation.display_name(),
                operand: id,
            })
    }

    fn render_value(
        &self,
        names: &[String],
        operation: &Operation,
        value: &ParamValue,
    ) -> Result<String, GraphError> {
        Ok(match value {
            ParamValue::Operand(id) => self.operand_name(names, operation, *id)?,
            ParamValue::Double(v) => render_double(*v),
            ParamValue::Integer(v) => v.to_string(),
            ParamValue::Boolean(true) => "TRUE".to_string(),
            ParamValue::Boolean(false) => "FALSE".to_string(),
            ParamValue::Text(text) => format!(
                "\"{}\"",
                text.replace('\\', "\\\\").replace('"', "\\\"")
            ),
        })
    }
}

fn render_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let literal = if value > 0.0 { "Inf" } else { "-Inf" };
        literal.to_string()
    } else {
        // Debug keeps the decimal point so the engine reads a double, not an integer.
        format!("{:?}", value)
    }
}

impl GraphConverter for DmlConverter {
    fn format(&self) -> &'static str {
        "dml"
    }

    fn convert(&self, graph: &ComputationGraph) -> Result<ConvertedGraph, GraphError> {
        let mut script = String::new();
        let names = graph.variable_names(&self.variable_prefix);

        let inputs = graph
            .input_operands()
            .into_iter()
            .map(|id| names[id as usize].as_str())
            .collect::<Vec<_>>();
        if !inputs.is_empty() {
            let _ = writeln!(script, "# inputs: {}", inputs.join(", "));
        }

        for (idx, operation) in graph.operations.iter().enumerate() {
            let outputs = operation.output_operands_slice();
            if outputs.is_empty() {
                return Err(GraphError::ConversionFailed {
                    format: self.format().to_string(),
                    reason: format!(
                        "operation `{}` (#{}) declares no outputs",
                        operation.display_name(),
                        idx
                    ),
                });
            }
            let names = outputs
                .iter()
                .map(|&id| self.operand_name(&names, operation, id))
                .collect::<Result<Vec<_>, _>>()?;
            let lhs = if operation.is_multi_return() {
                format!("[{}]", names.join(", "))
            } else {
                names.join(", ")
            };

            let mut args = Vec::with_capacity(operation.params.len());
            for (name, value) in &operation.params {
                args.push(format!(
                    "{}={}",
                    name,
                    self.render_value(&names, operation, value)?
                ));
            }
            let _ = writeln!(
                script,
                "{} = {}({});",
                lhs,
                operation.op_type,
                args.join(", ")
            );
        }

        Ok(ConvertedGraph {
            format: "dml",
            content_type: "text/x-dml",
            data: script.into_bytes(),
        })
    }
}
