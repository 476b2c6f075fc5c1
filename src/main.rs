use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use rust_dml_graph::{
    ConverterRegistry, GraphError, GraphValidator, OperationCatalog, ValidationOptions,
    graph_to_dot, load_catalog_from_path, load_graph_from_path,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and convert DML computation graphs", long_about = None)]
struct Cli {
    /// Path to a JSON file holding a serialized computation graph.
    #[arg(required_unless_present = "list_operations")]
    graph: Option<PathBuf>,
    /// Additional operation signature tables (JSON) merged into the builtin catalog.
    #[arg(long)]
    catalog: Vec<PathBuf>,
    /// Print the operations known to the catalog and exit.
    #[arg(long)]
    list_operations: bool,
    /// Accept inputs that no operation consumes.
    #[arg(long)]
    allow_unused_inputs: bool,
    /// Optional path to write a Graphviz DOT export of the graph.
    #[arg(long)]
    export_dot: Option<PathBuf>,
    /// Convert the graph to a different format (`dml` or `json`).
    #[arg(long)]
    convert: Option<String>,
    /// Path to write the converted graph (stdout if omitted).
    #[arg(long)]
    convert_output: Option<PathBuf>,
}

fn run() -> Result<(), GraphError> {
    let cli = Cli::parse();

    let mut catalog = OperationCatalog::with_defaults();
    for path in &cli.catalog {
        let added = catalog.extend(load_catalog_from_path(path)?)?;
        info!(path = %path.display(), operations = added, "merged catalog");
    }

    if cli.list_operations {
        for name in catalog.available_operations() {
            let schema = catalog.get(name)?;
            let required: Vec<_> = schema.required.iter().map(|p| p.name.as_str()).collect();
            let outputs: Vec<_> = schema.outputs.iter().map(|t| t.as_str()).collect();
            println!(
                "{}({}) -> [{}]",
                name,
                required.join(", "),
                outputs.join(", ")
            );
        }
        return Ok(());
    }

    // clap only lets the path be absent together with --list-operations.
    let Some(graph_path) = cli.graph else {
        return Ok(());
    };

    let graph = load_graph_from_path(&graph_path)?;
    let options = ValidationOptions {
        reject_unused_inputs: !cli.allow_unused_inputs,
    };
    let artifacts = GraphValidator::new(&graph, options).validate()?;
    catalog.check_graph(&graph)?;

    println!(
        "Validated graph from `{}` with {} operands and {} operations.",
        graph_path.display(),
        graph.operands.len(),
        graph.operations.len()
    );
    println!("Inputs:");
    let mut inputs: Vec<_> = artifacts.input_names_to_operands.iter().collect();
    inputs.sort_by_key(|(_, id)| **id);
    for (name, id) in inputs {
        let operand_type = graph.operand(*id).map(|o| o.operand_type.as_str());
        println!("  - {}: {}", name, operand_type.unwrap_or("?"));
    }
    println!("Results:");
    for id in &artifacts.result_operands {
        let producer = artifacts
            .operand_to_producing_operation
            .get(id)
            .map(String::as_str)
            .unwrap_or("?");
        println!("  - operand {} <- {}", id, producer);
    }
    println!("Dependency fan-out:");
    let mut fan_out: Vec<_> = artifacts.operand_to_dependent_operations.iter().collect();
    fan_out.sort_by_key(|(id, _)| **id);
    for (operand, deps) in fan_out {
        println!("  - operand {} -> {}", operand, deps.join(", "));
    }

    if let Some(dot_path) = cli.export_dot {
        let dot = graph_to_dot(&graph);
        std::fs::write(&dot_path, dot).map_err(|err| GraphError::export(dot_path.clone(), err))?;
        println!("Exported Graphviz DOT to `{}`.", dot_path.display());
    }

    if let Some(format) = cli.convert {
        let converted = ConverterRegistry::with_defaults().convert(&format, &graph)?;
        if let Some(path) = cli.convert_output {
            std::fs::write(&path, converted.data)
                .map_err(|err| GraphError::export(path.clone(), err))?;
            println!(
                "Converted graph to `{}` format at `{}` (type {}).",
                converted.format,
                path.display(),
                converted.content_type
            );
        } else {
            std::io::stdout()
                .write_all(&converted.data)
                .map_err(|err| GraphError::ConversionFailed {
                    format: converted.format.to_string(),
                    reason: err.to_string(),
                })?;
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DML_GRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
