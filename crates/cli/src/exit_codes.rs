//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success (warnings included)              |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | sync             | Reconciliation-specific codes            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors. Skipped conflicts and
/// dropped duplicates are warnings, not failures.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Sync (3-9)
// =============================================================================

/// Catalog file failed to parse or validate.
pub const EXIT_SYNC_CATALOG: u8 = 3;

/// Store error (cannot open database, schema failure, read/write error).
pub const EXIT_SYNC_STORE: u8 = 4;

/// A transactional merge failed and the run was aborted.
pub const EXIT_SYNC_MERGE: u8 = 5;

use domainwatch_recon::ReconError;

/// Map a ReconError to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::CatalogParse(_) | ReconError::CatalogValidation(_) => EXIT_SYNC_CATALOG,
        ReconError::Store(_) => EXIT_SYNC_STORE,
        ReconError::MergeFailed { .. } => EXIT_SYNC_MERGE,
    }
}
