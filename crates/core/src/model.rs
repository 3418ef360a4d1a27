use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category + source
// ---------------------------------------------------------------------------

/// Function a provider performs for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dns,
    Email,
    Hosting,
    Registrar,
    Ca,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dns => write!(f, "dns"),
            Self::Email => write!(f, "email"),
            Self::Hosting => write!(f, "hosting"),
            Self::Registrar => write!(f, "registrar"),
            Self::Ca => write!(f, "ca"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dns" => Ok(Self::Dns),
            "email" => Ok(Self::Email),
            "hosting" => Ok(Self::Hosting),
            "registrar" => Ok(Self::Registrar),
            "ca" => Ok(Self::Ca),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// How a provider row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSource {
    /// Seeded from the versioned static catalog.
    Catalog,
    /// Created by live detection against an unrecognized signal.
    Discovered,
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Catalog => write!(f, "catalog"),
            Self::Discovered => write!(f, "discovered"),
        }
    }
}

impl std::str::FromStr for ProviderSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog" => Ok(Self::Catalog),
            "discovered" => Ok(Self::Discovered),
            other => Err(format!("unknown provider source: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A named organization performing a function for one or more domains.
///
/// `(category, slug)` is unique across the table. `domain` is not — several
/// providers may share a parent company's root domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub slug: String,
    pub domain: Option<String>,
    pub source: ProviderSource,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// New row with a fresh opaque id and a current timestamp.
    /// The slug is derived from the name.
    pub fn new(
        name: impl Into<String>,
        category: Category,
        domain: Option<String>,
        source: ProviderSource,
    ) -> Self {
        let name = name.into();
        let slug = crate::slug::slugify(&name);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            slug,
            domain,
            source,
            updated_at: Utc::now(),
        }
    }

    /// Lookup key for the uniqueness invariant.
    pub fn key(&self) -> (Category, &str) {
        (self.category, self.slug.as_str())
    }
}

// ---------------------------------------------------------------------------
// Partial update
// ---------------------------------------------------------------------------

/// Field-level patch for a provider row. Only present fields are written.
/// `domain` uses a double Option so a patch can clear the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Option<String>>,
    pub source: Option<ProviderSource>,
}

impl ProviderPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.slug.is_none() && self.domain.is_none() && self.source.is_none()
    }

    /// Apply to an in-memory row, refreshing its timestamp.
    pub fn apply(&self, row: &mut Provider) {
        if let Some(ref name) = self.name {
            row.name = name.clone();
        }
        if let Some(ref slug) = self.slug {
            row.slug = slug.clone();
        }
        if let Some(ref domain) = self.domain {
            row.domain = domain.clone();
        }
        if let Some(source) = self.source {
            row.source = source;
        }
        row.updated_at = Utc::now();
    }
}
