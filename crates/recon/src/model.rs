use serde::Serialize;

use domainwatch_core::Category;

// ---------------------------------------------------------------------------
// Planned actions (dry-run preview / audit trail)
// ---------------------------------------------------------------------------

/// One effect a reconciliation pass applies (or, in dry-run mode, would
/// apply). The list is identical in shape between dry and live runs so a
/// preview is trustworthy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedAction {
    /// New catalog-sourced row.
    Insert { name: String, category: Category, slug: String },
    /// Targeted field update of an existing row.
    Update { id: String, name: String, category: Category },
    /// A discovered row superseded in place by a catalog definition
    /// (id kept, fields rewritten, source flipped to catalog).
    Replace {
        id: String,
        discovered_name: String,
        catalog_name: String,
        category: Category,
    },
    /// Reference migration + deletion of a superseded discovered row.
    Merge {
        discovered_id: String,
        discovered_name: String,
        catalog_id: String,
        catalog_name: String,
        category: Category,
    },
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert { name, category, slug } => {
                write!(f, "insert  {category}/{slug} ('{name}')")
            }
            Self::Update { id, name, category } => {
                write!(f, "update  {category} '{name}' ({id})")
            }
            Self::Replace { discovered_name, catalog_name, category, .. } => {
                write!(f, "replace {category} '{discovered_name}' -> '{catalog_name}'")
            }
            Self::Merge { discovered_name, catalog_name, category, .. } => {
                write!(f, "merge   {category} '{discovered_name}' into '{catalog_name}'")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    /// New catalog rows inserted.
    pub inserted: usize,
    /// Field updates applied, replaces included.
    pub updated: usize,
    /// Discovered rows merged away in the cleanup pass.
    pub cleaned: usize,
    /// Updates skipped because they would violate (category, slug) uniqueness.
    pub skipped_conflicts: usize,
    /// Insert-queue entries dropped as duplicates of an earlier definition.
    pub dropped_duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub dry_run: bool,
    pub summary: ReconSummary,
    pub actions: Vec<PlannedAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_tagged() {
        let action = PlannedAction::Insert {
            name: "Cloudflare".into(),
            category: Category::Dns,
            slug: "cloudflare".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "insert");
        assert_eq!(json["category"], "dns");
        assert_eq!(json["slug"], "cloudflare");
    }

    #[test]
    fn action_display_is_one_line() {
        let action = PlannedAction::Merge {
            discovered_id: "d1".into(),
            discovered_name: "mail.tutanota.de".into(),
            catalog_id: "c1".into(),
            catalog_name: "Tuta".into(),
            category: Category::Email,
        };
        let line = action.to_string();
        assert!(line.contains("mail.tutanota.de"));
        assert!(line.contains("Tuta"));
        assert!(!line.contains('\n'));
    }
}
