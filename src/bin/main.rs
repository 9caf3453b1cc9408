//! Strata CLI - run layered reports against a schema and a JSON data file
//!
//! Usage:
//!   strata run --report <name> --targets <Entity:id,id,...> [--flat]
//!   strata plan --report <name>
//!   strata list
//!
//! Examples:
//!   strata run --config shop.toml --report sales_by_product --targets Category:1,2
//!   strata plan --report sales_by_product
//!   RUST_LOG=strata=debug strata run --report sales_by_product --targets Product:10

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use strata::config::Settings;
use strata::engine::{QueryEngine, ReportDefinition};
use strata::graph::{EntityGraph, GraphRegistry};
use strata::schema::StaticSchema;
use strata::store::{EntityRecord, MemoryStore, StaticAccessFilter};
use strata::value::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - layered hierarchical reports over a relational schema graph")]
#[command(version)]
struct Cli {
    /// Config file (defaults to STRATA_CONFIG, ./strata.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report and print the result tree as JSON
    Run {
        /// Name of the report in the config file
        #[arg(short, long)]
        report: String,

        /// Targets as `Entity:id,id,...`
        #[arg(short, long)]
        targets: String,

        /// Print one row per leaf instead of the tree
        #[arg(long)]
        flat: bool,
    },

    /// Print the relations a report would execute
    Plan {
        /// Name of the report in the config file
        #[arg(short, long)]
        report: String,
    },

    /// List configured reports
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            report,
            targets,
            flat,
        } => cmd_run(&settings, &report, &targets, flat),
        Commands::Plan { report } => cmd_plan(&settings, &report),
        Commands::List => {
            cmd_list(&settings);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn build_engine(settings: &Settings) -> Result<QueryEngine, Box<dyn std::error::Error>> {
    let schema_path = settings
        .store
        .resolved_schema_path()?
        .ok_or("no [store] schema configured")?;
    let schema = StaticSchema::from_file(&schema_path)?;

    let graph = EntityGraph::new(Arc::new(schema))
        .with_through_hint_min_nodes(settings.engine.through_hint_min_nodes);
    let mut engine = QueryEngine::new(GraphRegistry::from_graph(graph));

    if !settings.access.is_empty() {
        engine = engine.with_access_filter(Arc::new(StaticAccessFilter::new(settings.access.clone())));
    }
    Ok(engine)
}

fn definition(settings: &Settings, report: &str) -> Result<ReportDefinition, Box<dyn std::error::Error>> {
    let report = settings.report(report)?;
    Ok(ReportDefinition::from_settings(settings, report)?)
}

/// Parse `Entity:id,id,...`.
fn parse_targets(spec: &str) -> Result<Vec<EntityRecord>, String> {
    let (entity, ids) = spec
        .split_once(':')
        .ok_or_else(|| format!("invalid targets '{}': expected Entity:id,...", spec))?;

    let entity = entity.trim();
    if entity.is_empty() {
        return Err(format!("invalid targets '{}': missing entity", spec));
    }

    Ok(ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| EntityRecord::new(entity, Value::parse(id)))
        .collect())
}

fn cmd_run(settings: &Settings, report: &str, targets: &str, flat: bool) -> CliResult {
    let engine = build_engine(settings)?;
    let plan = engine.configure(&definition(settings, report)?)?;

    let data_path = settings
        .store
        .resolved_data_path()?
        .ok_or("no [store] data configured")?;
    let store = MemoryStore::from_file(&data_path)?;

    let targets = parse_targets(targets)?;
    let tree = engine.run(&plan, &store, &targets)?;

    if flat {
        let table = tree.flatten();
        println!("{}", table.columns.join("\t"));
        for row in &table.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", cells.join("\t"));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    }
    Ok(())
}

fn cmd_plan(settings: &Settings, report: &str) -> CliResult {
    let engine = build_engine(settings)?;
    let plan = engine.configure(&definition(settings, report)?)?;

    println!("-- Strata report plan");
    println!("-- Report: {}", report);
    println!();
    print!("{}", plan);
    Ok(())
}

fn cmd_list(settings: &Settings) {
    if settings.reports.is_empty() {
        println!("No reports defined.");
        return;
    }

    println!("Reports:");
    for (name, report) in &settings.reports {
        println!("  - {} (layers: {})", name, report.layers.join(" > "));
        for aggregate in &report.aggregates {
            println!(
                "      {} from {}: {}",
                aggregate.data,
                aggregate.focus,
                aggregate.measures.join(", ")
            );
        }
    }
}
