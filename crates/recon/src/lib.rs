//! `domainwatch-recon` — Provider catalog reconciliation engine.
//!
//! Pure engine crate: talks to storage only through the narrow
//! [`store::ProviderStore`] trait. No CLI or sqlite dependencies.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod store;

pub use catalog::{Catalog, CatalogDef};
pub use engine::{reconcile, ReconOptions};
pub use error::ReconError;
pub use model::{PlannedAction, ReconReport, ReconSummary};
pub use store::{MergeTxn, ProviderStore, StoreError, PROVIDER_REFS};
