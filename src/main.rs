//! Command-line interface for xmlschema-assembly

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xmlschema_assembly::{Grammar, SchemaHandler, SchemaOptions, SymbolSpace};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsd-assemble")]
#[command(author, version, about = "XML Schema assembly and symbol resolution tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble a schema set and display its grammars and diagnostics
    Inspect {
        /// Path or URL of the root XSD document
        #[arg(value_name = "SCHEMA")]
        schema: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// JSON file with schema options
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Load every import location, even for namespaces already imported
        #[arg(long)]
        honour_all_schema_locations: bool,

        /// Allow documents to add to an existing namespace grammar
        #[arg(long)]
        namespace_growth: bool,

        /// Accept duplicate declarations across documents
        #[arg(long)]
        tolerate_duplicates: bool,

        /// Ceiling on maxOccurs values
        #[arg(long, value_name = "N")]
        max_occurs: Option<u32>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            schema,
            json,
            config,
            honour_all_schema_locations,
            namespace_growth,
            tolerate_duplicates,
            max_occurs,
        } => load_options(config).and_then(|mut options| {
            options.honour_all_schema_locations |= honour_all_schema_locations;
            options.namespace_growth |= namespace_growth;
            options.tolerate_duplicates |= tolerate_duplicates;
            if max_occurs.is_some() {
                options.limits.max_occurs = max_occurs;
            }
            cmd_inspect(&schema, options, json)
        }),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "cli")]
fn load_options(config: Option<PathBuf>) -> Result<SchemaOptions, Box<dyn std::error::Error>> {
    match config {
        Some(path) => Ok(SchemaOptions::from_file(path)?),
        None => Ok(SchemaOptions::default()),
    }
}

/// Returns whether the schema set assembled without errors
#[cfg(feature = "cli")]
fn cmd_inspect(schema: &str, options: SchemaOptions, json_output: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let mut handler = SchemaHandler::with_options(options);
    let parsed = handler.parse_schema(schema);

    if json_output {
        print_json(&handler, parsed.as_ref().and_then(|p| p.target_namespace.as_deref()))?;
    } else {
        print_summary(&handler, schema);
    }

    Ok(parsed.is_some() && !handler.diagnostics().has_errors())
}

#[cfg(feature = "cli")]
fn namespace_label(namespace: Option<&str>) -> &str {
    namespace.unwrap_or("(no namespace)")
}

#[cfg(feature = "cli")]
fn print_summary(handler: &SchemaHandler, schema: &str) {
    println!("xsd-assemble v{}", xmlschema_assembly::VERSION);
    println!();
    println!("Schema: {}", schema);
    println!("  Documents: {}", handler.documents().len());

    for grammar in handler.grammars().iter() {
        if grammar.target_namespace() == Some(xmlschema_assembly::XSD_NAMESPACE) {
            continue;
        }
        println!();
        println!("=== {} ===", namespace_label(grammar.target_namespace()));
        for space in SymbolSpace::ALL {
            let count = grammar.len(space);
            if count > 0 {
                println!("  {}: {}", space, count);
            }
        }
        if !grammar.imports().is_empty() {
            let imports: Vec<&str> = grammar.imports().iter().map(|ns| namespace_label(ns.as_deref())).collect();
            println!("  Imports: {}", imports.join(", "));
        }
        for location in grammar.document_locations() {
            println!("  Document: {}", location);
        }
    }

    let diagnostics = handler.diagnostics();
    if !diagnostics.is_empty() {
        println!();
        println!("=== Diagnostics ===");
        for diagnostic in diagnostics.iter() {
            println!("  {}", diagnostic);
        }
    }
}

#[cfg(feature = "cli")]
fn grammar_json(grammar: &Grammar) -> serde_json::Value {
    use serde_json::{json, Map, Value};

    let mut spaces = Map::new();
    for space in SymbolSpace::ALL {
        let names: Vec<Value> = grammar
            .components(space)
            .map(|(name, _)| json!(name.local_name))
            .collect();
        if !names.is_empty() {
            spaces.insert(space.to_string(), Value::Array(names));
        }
    }

    json!({
        "targetNamespace": grammar.target_namespace(),
        "components": spaces,
        "imports": grammar.imports(),
        "documents": grammar.document_locations(),
        "annotations": grammar.annotations(),
    })
}

#[cfg(feature = "cli")]
fn print_json(handler: &SchemaHandler, target_namespace: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    use serde_json::{json, Value};

    let grammars: Vec<Value> = handler
        .grammars()
        .iter()
        .filter(|g| g.target_namespace() != Some(xmlschema_assembly::XSD_NAMESPACE))
        .map(|g| grammar_json(g))
        .collect();

    let output = json!({
        "version": xmlschema_assembly::VERSION,
        "targetNamespace": target_namespace,
        "documents": handler.documents().len(),
        "grammars": grammars,
        "diagnostics": handler.diagnostics().iter().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    std::process::exit(1);
}
