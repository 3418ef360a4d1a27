//! `dwatch sync` — one reconciliation pass between catalog and database.

use std::path::PathBuf;

use domainwatch_recon::{reconcile, Catalog, ReconOptions, ReconReport};
use domainwatch_store::SqliteStore;

use crate::CliError;

pub fn cmd_sync(
    db: PathBuf,
    catalog_path: Option<PathBuf>,
    dry_run: bool,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let catalog = load_catalog(catalog_path.as_deref())?;

    let mut store = SqliteStore::open(&db)
        .map_err(|e| CliError::store(format!("cannot open {}: {e}", db.display())))?;

    let opts = ReconOptions { dry_run };
    let report = reconcile(&catalog, &mut store, &opts).map_err(CliError::recon)?;

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::general(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&report);
    Ok(())
}

pub(crate) fn load_catalog(path: Option<&std::path::Path>) -> Result<Catalog, CliError> {
    match path {
        Some(path) => {
            let input = std::fs::read_to_string(path).map_err(|e| {
                CliError::args(format!("cannot read {}: {e}", path.display()))
                    .with_hint("omit --catalog to use the bundled catalog")
            })?;
            Catalog::from_toml(&input).map_err(CliError::recon)
        }
        None => Catalog::builtin().map_err(CliError::recon),
    }
}

/// Human summary to stderr; stdout stays reserved for JSON.
fn print_summary(report: &ReconReport) {
    if report.dry_run {
        for action in &report.actions {
            eprintln!("  would {action}");
        }
    }

    let s = &report.summary;
    eprintln!(
        "{}sync: {} inserted, {} updated, {} cleaned, {} conflicts skipped, {} duplicates dropped",
        if report.dry_run { "dry-run " } else { "" },
        s.inserted,
        s.updated,
        s.cleaned,
        s.skipped_conflicts,
        s.dropped_duplicates,
    );
}
