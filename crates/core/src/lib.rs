//! `domainwatch-core` — Provider data model and detection rules.
//!
//! Pure types crate: no storage or CLI dependencies. The rule evaluator is a
//! side-effect-free function over an ephemeral signal context.

pub mod error;
pub mod model;
pub mod rule;
pub mod slug;

pub use error::RuleError;
pub use model::{Category, Provider, ProviderPatch, ProviderSource};
pub use rule::{evaluate, DetectionRule, MatchMode, SignalContext, SignalField};
pub use slug::slugify;
