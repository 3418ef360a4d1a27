use std::collections::BTreeSet;

use serde::Deserialize;

use domainwatch_core::{slugify, Category, DetectionRule};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// One canonical provider definition from the versioned static catalog.
///
/// `rule` is optional: hosting providers are detected from live HTTP headers
/// and carry no retrospectively-evaluable rule.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDef {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub rule: Option<DetectionRule>,
}

impl CatalogDef {
    /// Canonical slug this definition reconciles under.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Ordered list of catalog definitions. Order matters: earlier definitions
/// claim matching discovered providers first.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub providers: Vec<CatalogDef>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl Catalog {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let catalog: Catalog =
            toml::from_str(input).map_err(|e| ReconError::CatalogParse(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog shipped with this build. A broken bundled catalog is a
    /// build defect, caught by the bundled_catalog_is_valid test; callers
    /// still get it as an ordinary error.
    pub fn builtin() -> Result<Self, ReconError> {
        Self::from_toml(include_str!("../data/catalog.toml"))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let mut seen: BTreeSet<(Category, String)> = BTreeSet::new();

        for def in &self.providers {
            if def.name.trim().is_empty() {
                return Err(ReconError::CatalogValidation(
                    "definition with empty name".into(),
                ));
            }

            let slug = def.slug();
            if slug.is_empty() {
                return Err(ReconError::CatalogValidation(format!(
                    "name '{}' normalizes to an empty slug",
                    def.name
                )));
            }

            if !seen.insert((def.category, slug.clone())) {
                return Err(ReconError::CatalogValidation(format!(
                    "duplicate ({}, {slug}) definition for '{}'",
                    def.category, def.name
                )));
            }

            if let Some(ref rule) = def.rule {
                rule.check().map_err(|e| {
                    ReconError::CatalogValidation(format!("'{}' has a malformed rule: {e}", def.name))
                })?;
            }
        }

        Ok(())
    }
}
