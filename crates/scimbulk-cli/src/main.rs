use clap::{Parser, Subcommand};
use scimbulk_core::ResolverConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "scimbulk", version, about = "SCIM bulk operation resolver")]
struct Cli {
    /// Resolver configuration file (YAML). Defaults are used when omitted.
    #[arg(short, long, global = true, env = "SCIMBULK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (e.g. "debug", "scimbulk_runtime=trace").
    /// Overrides `logging.level` from the configuration; `RUST_LOG` wins over both.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a bulk request against an in-memory store and print the bulk response.
    Resolve {
        /// Bulk request JSON file
        file: PathBuf,

        /// Maximum number of operations sent to the store at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also print the resolver map (bulkId -> id and location)
        #[arg(long, default_value_t = false)]
        map: bool,
    },

    /// Check a bulk request without executing it: shape, duplicate and
    /// dangling bulkIds, reference cycles and the planned execution order.
    Check {
        /// Bulk request JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Resolve {
            file,
            concurrency,
            map,
        } => commands::resolve::run(config, &file, concurrency, map).await,
        Command::Check { file } => commands::check::run(config, &file),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResolverConfig> {
    use anyhow::Context;

    match path {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(ResolverConfig::default()),
    }
}
