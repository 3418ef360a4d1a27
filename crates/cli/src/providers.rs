//! `dwatch providers` — queries against the persisted provider table.

use std::path::PathBuf;

use clap::Subcommand;

use domainwatch_core::Category;
use domainwatch_recon::ProviderStore;
use domainwatch_store::SqliteStore;

use crate::CliError;

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List persisted providers
    #[command(after_help = "\
Examples:
  dwatch providers list --db portfolio.db
  dwatch providers list --db portfolio.db --category dns
  dwatch providers list --db portfolio.db --json")]
    List {
        /// Path to the sqlite database file
        #[arg(long)]
        db: PathBuf,

        /// Restrict to one category (dns, email, hosting, registrar, ca)
        #[arg(long)]
        category: Option<Category>,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_providers(cmd: ProviderCommands) -> Result<(), CliError> {
    match cmd {
        ProviderCommands::List { db, category, json } => cmd_providers_list(db, category, json),
    }
}

fn cmd_providers_list(
    db: PathBuf,
    category: Option<Category>,
    json: bool,
) -> Result<(), CliError> {
    let store = SqliteStore::open(&db)
        .map_err(|e| CliError::store(format!("cannot open {}: {e}", db.display())))?;

    let providers = match category {
        Some(category) => store.list_by_category(category),
        None => store.list_all().map(|mut rows| {
            rows.sort_by(|a, b| (a.category, &a.slug).cmp(&(b.category, &b.slug)));
            rows
        }),
    }
    .map_err(|e| CliError::store(e.to_string()))?;

    if json {
        let json_str = serde_json::to_string_pretty(&providers)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for p in &providers {
        println!(
            "{:<10} {:<24} {:<32} {}",
            p.category.to_string(),
            p.slug,
            p.name,
            p.source,
        );
    }
    eprintln!("{} provider(s)", providers.len());
    Ok(())
}
