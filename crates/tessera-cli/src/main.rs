//! Tessera CLI.
//!
//! Checks ABAC policy documents and evaluates access requests against them.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate every policy in a directory
//! tessera check ./policies
//!
//! # Decide a request against the configured policy directory
//! tessera eval request.json
//!
//! # Index and rule counts
//! tessera stats --policies ./policies
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tessera_config::{ConfigLoader, TesseraConfig};
use tracing_subscriber::EnvFilter;

/// Tessera - attribute-based access control decision point.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing tessera.toml.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Validate policy documents without evaluating anything.
    Check {
        /// Policy file or directory of *.json policy files.
        path: PathBuf,
    },

    /// Evaluate an access request and print the decision as JSON.
    Eval {
        /// Access request JSON file.
        request: PathBuf,

        /// Policy file or directory (defaults to [policies] directory).
        #[arg(short, long)]
        policies: Option<PathBuf>,

        /// Print the decision on a single line.
        #[arg(long)]
        compact: bool,
    },

    /// Show policy and index statistics.
    Stats {
        /// Policy file or directory (defaults to [policies] directory).
        #[arg(short, long)]
        policies: Option<PathBuf>,

        /// Print statistics as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(config: &TesseraConfig) {
    // RUST_LOG wins over [logging] level; logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    if let Commands::Version = cli.command {
        commands::version::run();
        return Ok(());
    }

    let config = ConfigLoader::new()
        .with_project_dir(&cli.project)
        .load()
        .with_context(|| format!("Failed to load configuration from {}", cli.project.display()))?;
    init_logging(&config);

    match cli.command {
        Commands::Version => Ok(()),
        Commands::Check { path } => commands::check::run(&config, &path),
        Commands::Eval {
            request,
            policies,
            compact,
        } => commands::eval::run(&config, &request, policies.as_deref(), compact),
        Commands::Stats { policies, json } => {
            commands::stats::run(&config, policies.as_deref(), json)
        }
    }
}
