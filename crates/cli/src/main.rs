// domainwatch CLI - headless provider catalog reconciliation

mod catalog;
mod exit_codes;
mod providers;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::Env;

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_SYNC_STORE, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "dwatch")]
#[command(about = "Domain portfolio provider tracking (CLI mode, headless)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or migrate) a provider database
    #[command(after_help = "\
Examples:
  dwatch init --db portfolio.db")]
    Init {
        /// Path to the sqlite database file
        #[arg(long)]
        db: PathBuf,
    },

    /// Reconcile the provider table against a catalog
    #[command(after_help = "\
Examples:
  dwatch sync --db portfolio.db
  dwatch sync --db portfolio.db --catalog custom.catalog.toml
  dwatch sync --db portfolio.db --dry-run
  dwatch sync --db portfolio.db --json --output report.json")]
    Sync {
        /// Path to the sqlite database file
        #[arg(long)]
        db: PathBuf,

        /// Catalog TOML file (defaults to the bundled catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Plan and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output the full report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Inspect and validate catalog files
    Catalog {
        #[command(subcommand)]
        command: catalog::CatalogCommands,
    },

    /// Query the persisted provider table
    Providers {
        #[command(subcommand)]
        command: providers::ProviderCommands,
    },
}

/// Error carrying its shell exit code. Commands build these; `main` is the
/// single place that prints and exits.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SYNC_STORE, message: msg.into(), hint: None }
    }

    pub fn recon(err: domainwatch_recon::ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: err.to_string(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn cmd_init(db: PathBuf) -> Result<(), CliError> {
    domainwatch_store::SqliteStore::open(&db)
        .map_err(|e| CliError::store(format!("cannot open {}: {e}", db.display())))?;
    eprintln!("initialized {}", db.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { db } => cmd_init(db),
        Commands::Sync { db, catalog, dry_run, json, output } => {
            sync::cmd_sync(db, catalog, dry_run, json, output)
        }
        Commands::Catalog { command } => catalog::cmd_catalog(command),
        Commands::Providers { command } => providers::cmd_providers(command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
