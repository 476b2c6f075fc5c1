use std::fmt::Write;

use crate::graph::{ComputationGraph, OperandKind, OperandType, ParamValue};

pub fn graph_to_dot(graph: &ComputationGraph) -> String {
    let mut dot = String::from("digraph dml {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [fontname=\"Helvetica\"];\n");
    dot.push_str("  edge [fontname=\"Helvetica\"];\n\n");

    for (idx, operand) in graph.operands.iter().enumerate() {
        let node_id = format!("operand_{}", idx);
        let shape = match operand.operand_type {
            OperandType::Matrix => "box3d",
            OperandType::Frame => "tab",
            OperandType::Scalar => "circle",
            OperandType::List => "folder",
        };
        let fill = match operand.kind {
            OperandKind::Input => "#d0e6ff",
            OperandKind::Output => "#d6f5d6",
        };
        let mut label_lines = vec![format!(
            "{} {} {}",
            match operand.kind {
                OperandKind::Input => "Input",
                OperandKind::Output => "Output",
            },
            operand.operand_type,
            idx
        )];
        if let Some(name) = operand.bound_name() {
            label_lines.push(format!("name: {}", name));
        }
        let label = escape_label(&label_lines.join("\n"));
        let _ = writeln!(
            dot,
            "  {} [shape={},style=filled,fillcolor=\"{}\",label=\"{}\"];",
            node_id, shape, fill, label
        );
    }

    dot.push('\n');

    for (idx, operation) in graph.operations.iter().enumerate() {
        let node_id = format!("op_{}", idx);
        let mut label_lines = vec![format!("{} (#{})", operation.display_name(), idx)];
        if let Some(label) = &operation.label
            && !label.is_empty()
            && label != &operation.op_type
        {
            label_lines.push(operation.op_type.clone());
        }
        for (name, value) in &operation.params {
            if let Some(literal) = format_literal(value) {
                label_lines.push(format!("{}={}", name, literal));
            }
        }
        let label = escape_label(&label_lines.join("\n"));
        let _ = writeln!(
            dot,
            "  {} [shape=box,style=rounded,label=\"{}\"];",
            node_id, label
        );

        for (name, operand_id) in operation.input_operands() {
            let _ = writeln!(
                dot,
                "  operand_{} -> {} [label=\"{}\"];",
                operand_id,
                node_id,
                escape_label(name)
            );
        }
        for (out_idx, operand_id) in operation.output_operands_slice().iter().enumerate() {
            let _ = writeln!(
                dot,
                "  {} -> operand_{} [label=\"out{}\"];",
                node_id, operand_id, out_idx
            );
        }
    }

    dot.push_str("}\n");
    dot
}

fn format_literal(value: &ParamValue) -> Option<String> {
    match value {
        ParamValue::Operand(_) => None,
        ParamValue::Double(v) => Some(v.to_string()),
        ParamValue::Integer(v) => Some(v.to_string()),
        ParamValue::Boolean(v) => Some(v.to_string()),
        ParamValue::Text(v) => Some(format!("'{}'", v)),
    }
}

fn escape_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::graph_to_dot;
    use crate::builtins;
    use crate::context::SessionContext;
    use crate::value::Options;

    #[test]
    fn exports_graphviz_with_operands_and_operations() {
        let mut ctx = SessionContext::new();
        let x = ctx.matrix("X").unwrap();
        builtins::outlier_by_iqr(&mut ctx, x, 1.5, 3, Options::new()).unwrap();

        let dot = graph_to_dot(ctx.graph());

        assert!(dot.contains("operand_0 [shape=box3d"));
        assert!(dot.contains("operand_6 [shape=circle"));
        assert!(dot.contains("op_0 [shape=box"));
        assert!(dot.contains("outlierByIQR (#0)\\nk=1.5\\nmax_iterations=3"));
        assert!(dot.contains("operand_0 -> op_0 [label=\"X\"]"));
        assert!(dot.contains("op_0 -> operand_1 [label=\"out0\"]"));
        assert!(dot.contains("op_0 -> operand_6 [label=\"out5\"]"));
        assert!(dot.contains("name: X"));
    }
}
