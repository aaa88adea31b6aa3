use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codegraph::codegraph::{BuildOutput, CodeGraph};
use codegraph::resolution::OracleMode;
use codegraph::types::*;

/// Builds a code graph for C, C++ and Python projects.
#[derive(Parser)]
#[command(name = "codegraph", about = "Builds a code graph for C, C++ and Python projects")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration to .codegraph/config.json
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Build the graph and print a summary
    Index {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Seed file (repeatable); all supported sources when omitted
        #[arg(short, long)]
        seed: Vec<PathBuf>,
        /// Output the summary as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Build the graph and write nodes and edges as JSON
    Export {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Seed file (repeatable); all supported sources when omitted
        #[arg(short, long)]
        seed: Vec<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Look up entities by name and show their relationships
    Query {
        /// Entity name or name prefix
        name: String,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("codegraph=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> codegraph::errors::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            CodeGraph::init(&project_path)?;
            println!("Initialized CodeGraph at {}", project_path.display());
        }
        Commands::Index { path, seed, json } => {
            let output = build(&resolve_path(path), &seed)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output.summary)?);
            } else {
                print_summary(&output.summary);
            }
        }
        Commands::Export { path, seed, output } => {
            let built = build(&resolve_path(path), &seed)?;
            let json = serde_json::to_string_pretty(&built.graph.export())?;
            match output {
                Some(file) => {
                    std::fs::write(&file, json)?;
                    println!(
                        "Wrote {} entities and {} edges to {}",
                        built.summary.entity_count,
                        built.summary.edge_count,
                        file.display()
                    );
                }
                None => println!("{}", json),
            }
        }
        Commands::Query { name, path, limit } => {
            let built = build(&resolve_path(path), &[])?;
            let mut results = built.graph.lookup_by_name(&name);
            if results.is_empty() {
                results = built.graph.prefix_search(&name, limit);
            }
            if results.is_empty() {
                println!("No entities found for '{}'", name);
            }
            for entity in results.iter().take(limit) {
                print_entity(&built, entity);
            }
        }
    }
    Ok(())
}

fn build(project_path: &Path, seeds: &[PathBuf]) -> codegraph::errors::Result<BuildOutput> {
    let cg = CodeGraph::open(project_path)?;
    cg.build(seeds, &OracleMode::Disabled, &CancellationToken::new())
}

fn print_summary(summary: &BuildSummary) {
    println!("CodeGraph build");
    println!("  Files in scope:      {}", summary.files_in_scope);
    println!("  Files extracted:     {}", summary.files_extracted);
    println!("  External files:      {}", summary.external_files);
    println!("  Unresolved includes: {}", summary.unresolved_includes);
    println!("  Entities:            {}", summary.entity_count);
    println!("  Edges:               {}", summary.edge_count);
    println!(
        "  Symbols:             {} pending, {} resolved, {} stubs, {} unresolved",
        summary.pending_symbols,
        summary.resolved_structural + summary.resolved_oracle,
        summary.stubs_created,
        summary.unresolved
    );
    if !summary.unresolved_by_role.is_empty() {
        println!("\n  Unresolved by role:");
        for (role, count) in &summary.unresolved_by_role {
            println!("    {}: {}", role, count);
        }
    }
    if !summary.skipped_files.is_empty() {
        println!("\n  Skipped files:");
        for skipped in &summary.skipped_files {
            println!("    {} ({})", skipped.path, skipped.reason);
        }
    }
    println!("  Took {}ms", summary.duration_ms);
}

fn print_entity(built: &BuildOutput, entity: &Entity) {
    let location = match &entity.file_path {
        Some(path) => format!("{}:{}", path, entity.start_line + 1),
        None => "<external>".to_string(),
    };
    println!("{} ({}) - {}", entity.qualified_name, entity.kind, location);
    let kinds = [EdgeKind::Calls, EdgeKind::Inherits, EdgeKind::HasType];
    let outgoing = built.graph.outgoing_edges(&entity.id, &kinds);
    let incoming = built.graph.incoming_edges(&entity.id, &kinds);
    let edges = outgoing
        .iter()
        .map(|e| ("->", e, &e.target))
        .chain(incoming.iter().map(|e| ("<-", e, &e.source)));
    for (arrow, edge, other_id) in edges {
        let Some(other) = built.graph.get(other_id) else {
            continue;
        };
        match edge.resolved_by {
            Some(tier) => println!(
                "  {} {} {} [{} {:.2}]",
                edge.kind,
                arrow,
                other.qualified_name,
                tier.as_str(),
                tier.confidence()
            ),
            None => println!("  {} {} {}", edge.kind, arrow, other.qualified_name),
        }
    }
}

fn resolve_path(path: Option<String>) -> PathBuf {
    path.map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
