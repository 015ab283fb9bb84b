//! Binary entry point for the `jsonapi-query` command-line tool.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use jsonapi_query::config::{default_config_path, ConfigError, ConfigFile, QueryConfig};
use jsonapi_query::document::links::pagination_links;
use jsonapi_query::document::{DocumentAssembler, ErrorDocument};
use jsonapi_query::query::{
    InMemoryMetadata, OperatorRegistry, QueryError, QuerySpecBuilder, QuerySpecification,
};
use jsonapi_query::repository::memory::{MemoryStore, StoredRef};
use jsonapi_query::repository::Repository;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "jsonapi-query",
    version,
    about = "Resolve JSON:API query parameters and render compound documents",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "JSONAPI_QUERY_CONFIG",
        help = "Configuration file with knobs and resource schema"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a query string into a query specification
    Inspect(InspectCmd),
    /// Render a compound document from a JSON fixture
    Render(RenderCmd),
}

#[derive(clap::Args, Debug)]
struct InspectCmd {
    #[arg(value_name = "TYPE", help = "Primary resource type")]
    resource_type: String,
    #[arg(value_name = "QUERY", default_value = "", help = "Raw query string")]
    query: String,
}

#[derive(clap::Args, Debug)]
struct RenderCmd {
    #[arg(value_name = "TYPE", help = "Primary resource type")]
    resource_type: String,
    #[arg(value_name = "QUERY", default_value = "", help = "Raw query string")]
    query: String,
    #[arg(long, value_name = "FILE", help = "JSON fixture holding the records")]
    data: PathBuf,
    #[arg(long, value_name = "ID", help = "Render a single resource instead of a collection")]
    id: Option<String>,
    #[arg(
        long = "base-url",
        value_name = "URL",
        help = "Request URL used to build pagination links"
    )]
    base_url: Option<Url>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        if let Some(query_err) = err.downcast_ref::<QueryError>() {
            match serde_json::to_string_pretty(&ErrorDocument::from(query_err)) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("error: {query_err}"),
            }
            process::exit(2);
        }
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let path = resolve_config_path(cli.config.as_deref())?;
    debug!(path = %path.display(), "loading config");
    let (config, metadata) = ConfigFile::load(&path)?.into_parts();
    match &cli.command {
        Command::Inspect(cmd) => {
            let spec = build_spec(&metadata, &config, &cmd.resource_type, &cmd.query)?;
            emit(cli.format, &spec, print_spec_text)?;
        }
        Command::Render(cmd) => {
            let spec = build_spec(&metadata, &config, &cmd.resource_type, &cmd.query)?;
            let document = render(cmd, &spec, &metadata, &config)?;
            emit(cli.format, &document, print_document_text)?;
        }
    }
    Ok(())
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().ok_or(ConfigError::NoConfigPath),
    }
}

fn build_spec(
    metadata: &InMemoryMetadata,
    config: &QueryConfig,
    resource_type: &str,
    query: &str,
) -> Result<QuerySpecification, QueryError> {
    let operators = OperatorRegistry::with_builtins();
    QuerySpecBuilder::new(metadata, &operators, config)
        .build_from_query_string(resource_type, query.trim_start_matches('?'))
}

fn render(
    cmd: &RenderCmd,
    spec: &QuerySpecification,
    metadata: &InMemoryMetadata,
    config: &QueryConfig,
) -> Result<serde_json::Value, Box<dyn Error>> {
    let store = MemoryStore::from_path(&cmd.data, metadata)?;
    let assembler = DocumentAssembler::<StoredRef>::new(metadata, &store, &store)
        .with_linkage(config.relationships.linkage_in_resource);
    let document = match &cmd.id {
        Some(id) => {
            let primary = store.find_one(&cmd.resource_type, id, spec)?;
            assembler.assemble_one(spec, primary.as_ref())?
        }
        None => {
            let slice = store.find_collection(&cmd.resource_type, spec)?;
            let mut document = assembler
                .assemble_collection(spec, &slice.items)?
                .with_meta("total", slice.total);
            if let Some(base) = &cmd.base_url {
                document = document.with_links(pagination_links(base, &spec.page, slice.total));
            }
            document
        }
    };
    Ok(document.to_json())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn print_spec_text(spec: &QuerySpecification) {
    println!("type: {}", spec.resource_type);
    match &spec.filter {
        Some(filter) => println!("filter: {filter}"),
        None => println!("filter: none"),
    }
    let sort: Vec<String> = spec.sort.iter().map(ToString::to_string).collect();
    println!("sort: {}", if sort.is_empty() { "none".to_owned() } else { sort.join(",") });
    println!("page: number={} size={}", spec.page.number, spec.page.size);
    if spec.fields.is_empty() {
        println!("fields: all");
    } else {
        for (ty, fields) in spec.fields.iter() {
            let names: Vec<&str> = fields.iter().map(String::as_str).collect();
            println!("fields[{ty}]: {}", names.join(","));
        }
    }
    let include: Vec<String> = spec
        .include
        .leaf_paths()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "include: {}",
        if include.is_empty() { "none".to_owned() } else { include.join(",") }
    );
    println!(
        "complexity: total={} includes={} fields={} filter={}",
        spec.complexity.total,
        spec.complexity.includes,
        spec.complexity.fields,
        spec.complexity.filter
    );
}

fn print_document_text(document: &serde_json::Value) {
    match &document["data"] {
        serde_json::Value::Array(nodes) if nodes.is_empty() => println!("data: none"),
        serde_json::Value::Array(nodes) => nodes.iter().for_each(print_node_text),
        serde_json::Value::Null => println!("data: null"),
        node => print_node_text(node),
    }
    if let Some(included) = document["included"].as_array() {
        println!("included: {}", included.len());
        included.iter().for_each(print_node_text);
    }
    if let Some(meta) = document["meta"].as_object() {
        for (key, value) in meta {
            println!("meta.{key}: {value}");
        }
    }
    if let Some(links) = document["links"].as_object() {
        for (key, value) in links {
            println!("links.{key}: {}", value.as_str().unwrap_or("null"));
        }
    }
}

fn print_node_text(node: &serde_json::Value) {
    let label = |value: &serde_json::Value| {
        format!(
            "{}/{}",
            value["type"].as_str().unwrap_or("?"),
            value["id"].as_str().unwrap_or("?")
        )
    };
    match node.get("attributes") {
        Some(attributes) => println!("{} {attributes}", label(node)),
        None => println!("{}", label(node)),
    }
    if let Some(relationships) = node["relationships"].as_object() {
        for (name, relationship) in relationships {
            let targets = match &relationship["data"] {
                serde_json::Value::Array(items) => {
                    items.iter().map(label).collect::<Vec<_>>().join(", ")
                }
                serde_json::Value::Null => "null".to_owned(),
                item => label(item),
            };
            println!("  {name} -> {targets}");
        }
    }
}
