use std::fmt;

use domainwatch_core::{Provider, ProviderPatch};

// ---------------------------------------------------------------------------
// Reference migration table
// ---------------------------------------------------------------------------

/// Every `(table, columns)` pair holding a provider-id foreign key. A merge
/// repoints all of them from the superseded discovered id to the catalog id
/// inside one transaction. Adding a referencing table is a one-line change.
pub const PROVIDER_REFS: &[(&str, &[&str])] = &[
    ("registrations", &["registrar_id", "reseller_id"]),
    ("certificates", &["ca_id"]),
    ("hosting", &["host_id", "email_id", "dns_id"]),
];

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying storage failure (connection, SQL, I/O).
    Backend(String),
    /// Row addressed by id does not exist.
    NotFound(String),
    /// A write violated a storage constraint.
    Constraint(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "storage backend error: {msg}"),
            Self::NotFound(id) => write!(f, "no provider row with id {id}"),
            Self::Constraint(msg) => write!(f, "storage constraint violated: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Handle passed to the closure of [`ProviderStore::in_transaction`].
/// All writes through it commit or roll back as a unit.
pub trait MergeTxn {
    /// Rewrite `column` on `table` from `old_id` to `new_id` wherever it
    /// currently holds `old_id`.
    fn repoint(&mut self, table: &str, column: &str, old_id: &str, new_id: &str)
        -> Result<(), StoreError>;

    /// Delete one provider row by id.
    fn delete_provider(&mut self, id: &str) -> Result<(), StoreError>;
}

/// The reconciliation engine's narrow view of provider storage.
pub trait ProviderStore {
    fn list_all(&self) -> Result<Vec<Provider>, StoreError>;

    /// Batch insert. All rows carry pre-assigned ids.
    fn insert_many(&mut self, rows: &[Provider]) -> Result<(), StoreError>;

    /// Targeted update by id; only fields present in the patch are written.
    fn update_fields(&mut self, id: &str, patch: &ProviderPatch) -> Result<(), StoreError>;

    /// Run `op` atomically: every write it issues through the handle is
    /// committed together, or rolled back together if it returns an error.
    fn in_transaction(
        &mut self,
        op: &mut dyn FnMut(&mut dyn MergeTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}
