//! `domainwatch-store` — SQLite-backed provider store.
//!
//! Implements the `domainwatch-recon` store traits over a single sqlite
//! database file holding the provider table and the domain-attribute tables
//! that reference it.

pub mod sqlite;

pub use sqlite::SqliteStore;
