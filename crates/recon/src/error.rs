use std::fmt;

use crate::store::StoreError;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error in a catalog document.
    CatalogParse(String),
    /// Catalog validation error (duplicate key, malformed rule, etc.).
    CatalogValidation(String),
    /// Storage error outside a merge (read, insert, update).
    Store(StoreError),
    /// A transactional merge failed. Fatal: a partially-migrated reference
    /// set must never be continued past.
    MergeFailed {
        discovered: String,
        catalog: String,
        reason: String,
    },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogParse(msg) => write!(f, "catalog parse error: {msg}"),
            Self::CatalogValidation(msg) => write!(f, "catalog validation error: {msg}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::MergeFailed { discovered, catalog, reason } => {
                write!(f, "merge of '{discovered}' into '{catalog}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ReconError {}

impl From<StoreError> for ReconError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
