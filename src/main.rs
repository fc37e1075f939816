mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Kind;
use wisetask_search::{Health, SearchConfig, DEFAULT_TOP_K};

#[derive(Parser)]
#[command(name = "wisetask-search")]
#[command(about = "Semantic search over tasks and plugins", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database file (overrides WISETASK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Embedding model name (overrides WISETASK_MODEL and WISETASK_MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk index records from a JSON file (`-` for stdin)
    Index {
        #[arg(value_enum)]
        kind: Kind,
        file: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Semantic search
    #[command(alias = "ss")]
    Search {
        #[arg(value_enum)]
        kind: Kind,
        query: String,
        #[arg(long, short = 'k', default_value_t = DEFAULT_TOP_K, allow_negative_numbers = true, help = "Maximum results")]
        top_k: i64,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show index statistics
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Liveness check
    Health,

    /// Start MCP server on stdio
    #[cfg(feature = "mcp")]
    Mcp,
}

/// Logs go to stderr; stdout carries JSON output and the MCP transport
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = SearchConfig::from_env().with_overrides(cli.db, cli.model);

    match cli.command {
        Commands::Index { kind, file, json } => commands::index::run(kind, &file, &config, json),
        Commands::Search {
            kind,
            query,
            top_k,
            json,
        } => commands::search::run(kind, &query, top_k, &config, json),
        Commands::Status { json } => commands::status::run(&config, json),
        Commands::Health => {
            println!("{}", serde_json::to_string(&Health::ok())?);
            Ok(())
        }

        #[cfg(feature = "mcp")]
        Commands::Mcp => run_mcp_server(&config),
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(config: &SearchConfig) -> anyhow::Result<()> {
    // load the model before accepting requests
    let index = commands::open_ready_index(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(index))
}
