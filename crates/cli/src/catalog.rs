//! `dwatch catalog` — catalog file inspection.

use std::path::PathBuf;

use clap::Subcommand;

use crate::sync::load_catalog;
use crate::CliError;

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Validate a catalog TOML file without touching any database
    #[command(after_help = "\
Examples:
  dwatch catalog validate custom.catalog.toml
  dwatch catalog validate            # checks the bundled catalog")]
    Validate {
        /// Catalog file (defaults to the bundled catalog)
        file: Option<PathBuf>,
    },

    /// List catalog definitions
    #[command(after_help = "\
Examples:
  dwatch catalog list
  dwatch catalog list --json
  dwatch catalog list custom.catalog.toml")]
    List {
        /// Catalog file (defaults to the bundled catalog)
        file: Option<PathBuf>,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_catalog(cmd: CatalogCommands) -> Result<(), CliError> {
    match cmd {
        CatalogCommands::Validate { file } => cmd_catalog_validate(file),
        CatalogCommands::List { file, json } => cmd_catalog_list(file, json),
    }
}

fn cmd_catalog_validate(file: Option<PathBuf>) -> Result<(), CliError> {
    let catalog = load_catalog(file.as_deref())?;
    eprintln!("valid: {} definition(s)", catalog.providers.len());
    Ok(())
}

fn cmd_catalog_list(file: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let catalog = load_catalog(file.as_deref())?;

    if json {
        #[derive(serde::Serialize)]
        struct Entry<'a> {
            name: &'a str,
            slug: String,
            category: domainwatch_core::Category,
            domain: Option<&'a str>,
            has_rule: bool,
        }

        let entries: Vec<Entry> = catalog
            .providers
            .iter()
            .map(|def| Entry {
                name: &def.name,
                slug: def.slug(),
                category: def.category,
                domain: def.domain.as_deref(),
                has_rule: def.rule.is_some(),
            })
            .collect();
        let json_str = serde_json::to_string_pretty(&entries)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for def in &catalog.providers {
        println!(
            "{:<10} {:<24} {}",
            def.category.to_string(),
            def.slug(),
            def.name,
        );
    }
    Ok(())
}
