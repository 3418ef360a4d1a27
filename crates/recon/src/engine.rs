use std::collections::BTreeSet;

use domainwatch_core::{Category, Provider, ProviderPatch, ProviderSource};

use crate::catalog::{Catalog, CatalogDef};
use crate::error::ReconError;
use crate::matcher::matches_catalog;
use crate::model::{PlannedAction, ReconReport, ReconSummary};
use crate::store::{ProviderStore, PROVIDER_REFS};

#[derive(Debug, Clone, Default)]
pub struct ReconOptions {
    /// Plan and report everything, write nothing.
    pub dry_run: bool,
}

/// Run one full synchronization pass between the static catalog and the
/// persisted provider table.
///
/// Catalog definitions are processed in catalog order; discovered rows are
/// scanned in ascending id order, so a pass is deterministic for a given
/// table state. All bookkeeping is local to the call.
pub fn reconcile(
    catalog: &Catalog,
    store: &mut dyn ProviderStore,
    opts: &ReconOptions,
) -> Result<ReconReport, ReconError> {
    let mut rows = store.list_all()?;
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    let mut summary = ReconSummary::default();
    // Discovered rows already consumed by a replace in this pass.
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut insert_queue: Vec<Provider> = Vec::new();
    let mut updates: Vec<(String, ProviderPatch, PlannedAction)> = Vec::new();

    // -- Plan: one decision per catalog definition, in catalog order --------

    for def in &catalog.providers {
        let slug = def.slug();

        if let Some(i) = rows
            .iter()
            .position(|r| r.category == def.category && r.slug == slug)
        {
            let patch = diff_fields(&rows[i], def, &slug);
            if patch.is_empty() {
                continue;
            }
            if let Some(other) = key_conflict(&rows, &insert_queue, &rows[i].id, def.category, &slug)
            {
                log::warn!(
                    "skipping update of '{}': ({}, {slug}) already belongs to '{}'",
                    def.name,
                    def.category,
                    other
                );
                summary.skipped_conflicts += 1;
                continue;
            }
            let row_id = rows[i].id.clone();
            let action = PlannedAction::Update {
                id: row_id.clone(),
                name: def.name.clone(),
                category: def.category,
            };
            patch.apply(&mut rows[i]);
            updates.push((row_id, patch, action));
        } else if let Some(i) = rows.iter().position(|r| {
            r.category == def.category
                && r.source == ProviderSource::Discovered
                && !claimed.contains(&r.id)
                && matches_catalog(def, r)
        }) {
            // First match wins; the discovered row keeps its id but takes the
            // catalog definition's fields so later definitions in this pass
            // see it under its new key.
            if let Some(other) = key_conflict(&rows, &insert_queue, &rows[i].id, def.category, &slug)
            {
                log::warn!(
                    "skipping replace of '{}' by '{}': ({}, {slug}) already belongs to '{}'",
                    rows[i].name,
                    def.name,
                    def.category,
                    other
                );
                summary.skipped_conflicts += 1;
                continue;
            }
            let row_id = rows[i].id.clone();
            let action = PlannedAction::Replace {
                id: row_id.clone(),
                discovered_name: rows[i].name.clone(),
                catalog_name: def.name.clone(),
                category: def.category,
            };
            let patch = ProviderPatch {
                name: Some(def.name.clone()),
                slug: Some(slug.clone()),
                domain: Some(def.domain.clone()),
                source: Some(ProviderSource::Catalog),
            };
            patch.apply(&mut rows[i]);
            claimed.insert(row_id.clone());
            updates.push((row_id, patch, action));
        } else {
            insert_queue.push(Provider::new(
                def.name.clone(),
                def.category,
                def.domain.clone(),
                ProviderSource::Catalog,
            ));
        }
    }

    // -- Dedupe the insert queue by (category, slug); first wins ------------

    let mut seen: BTreeSet<(Category, String)> = BTreeSet::new();
    let mut inserts: Vec<Provider> = Vec::new();
    for p in insert_queue {
        if seen.insert((p.category, p.slug.clone())) {
            inserts.push(p);
        } else {
            log::warn!(
                "dropping duplicate catalog definition '{}' ({}, {})",
                p.name,
                p.category,
                p.slug
            );
            summary.dropped_duplicates += 1;
        }
    }

    let mut actions: Vec<PlannedAction> = inserts
        .iter()
        .map(|p| PlannedAction::Insert {
            name: p.name.clone(),
            category: p.category,
            slug: p.slug.clone(),
        })
        .collect();

    // -- Apply: batch insert, then targeted updates -------------------------

    if !opts.dry_run {
        if !inserts.is_empty() {
            store.insert_many(&inserts)?;
        }
        for (id, patch, _) in &updates {
            store.update_fields(id, patch)?;
        }
    }
    summary.inserted = inserts.len();
    summary.updated = updates.len();
    actions.extend(updates.into_iter().map(|(_, _, action)| action));

    // -- Cleanup: merge leftover discovered rows into standing catalog rows -

    let table: Vec<Provider> = if opts.dry_run {
        rows.extend(inserts);
        rows
    } else {
        let mut table = store.list_all()?;
        table.sort_by(|a, b| a.id.cmp(&b.id));
        table
    };

    for d in table
        .iter()
        .filter(|r| r.source == ProviderSource::Discovered && !claimed.contains(&r.id))
    {
        let hit = catalog
            .providers
            .iter()
            .filter(|def| def.category == d.category && def.rule.is_some())
            .find_map(|def| {
                let target = standing_catalog_row(&table, def)?;
                matches_catalog(def, d).then_some(target)
            });

        let Some(target) = hit else { continue };

        if !opts.dry_run {
            merge_provider(store, d, target)?;
        }
        summary.cleaned += 1;
        actions.push(PlannedAction::Merge {
            discovered_id: d.id.clone(),
            discovered_name: d.name.clone(),
            catalog_id: target.id.clone(),
            catalog_name: target.name.clone(),
            category: d.category,
        });
    }

    if opts.dry_run {
        for action in &actions {
            log::info!("dry-run: {action}");
        }
    }

    Ok(ReconReport { dry_run: opts.dry_run, summary, actions })
}

/// Patch bringing `row` in line with a catalog definition; empty when the
/// row already matches.
fn diff_fields(row: &Provider, def: &CatalogDef, slug: &str) -> ProviderPatch {
    let mut patch = ProviderPatch::default();
    if row.name != def.name {
        patch.name = Some(def.name.clone());
    }
    if row.slug != slug {
        patch.slug = Some(slug.to_string());
    }
    if row.domain != def.domain {
        patch.domain = Some(def.domain.clone());
    }
    if row.source != ProviderSource::Catalog {
        patch.source = Some(ProviderSource::Catalog);
    }
    patch
}

/// Name of whichever *other* row or queued insert already owns
/// `(category, slug)`, if any. Guards the uniqueness invariant before a
/// write is queued.
fn key_conflict<'a>(
    rows: &'a [Provider],
    queued_inserts: &'a [Provider],
    target_id: &str,
    category: Category,
    slug: &str,
) -> Option<&'a str> {
    rows.iter()
        .chain(queued_inserts.iter())
        .find(|r| r.id != target_id && r.category == category && r.slug == slug)
        .map(|r| r.name.as_str())
}

/// The persisted catalog row a definition currently resolves to, if it is
/// still standing.
fn standing_catalog_row<'a>(table: &'a [Provider], def: &CatalogDef) -> Option<&'a Provider> {
    let slug = def.slug();
    table
        .iter()
        .find(|r| r.category == def.category && r.slug == slug && r.source == ProviderSource::Catalog)
}

/// Repoint every foreign-key reference from the discovered row to its
/// catalog counterpart, then delete the discovered row — all inside one
/// transaction. Failure aborts the whole run.
fn merge_provider(
    store: &mut dyn ProviderStore,
    discovered: &Provider,
    target: &Provider,
) -> Result<(), ReconError> {
    let result = store.in_transaction(&mut |txn| {
        for (table, columns) in PROVIDER_REFS {
            for column in *columns {
                txn.repoint(table, column, &discovered.id, &target.id)?;
            }
        }
        txn.delete_provider(&discovered.id)
    });

    result.map_err(|e| {
        log::error!(
            "merge of discovered '{}' into catalog '{}' failed, aborting run: {e}",
            discovered.name,
            target.name
        );
        ReconError::MergeFailed {
            discovered: discovered.name.clone(),
            catalog: target.name.clone(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainwatch_core::DetectionRule;

    fn def(name: &str, category: Category, rule: Option<DetectionRule>) -> CatalogDef {
        CatalogDef { name: name.into(), domain: None, category, rule }
    }

    #[test]
    fn diff_fields_empty_when_in_sync() {
        let mut row = Provider::new("Tuta", Category::Email, None, ProviderSource::Catalog);
        row.slug = "tuta".into();
        let d = def("Tuta", Category::Email, None);
        assert!(diff_fields(&row, &d, "tuta").is_empty());
    }

    #[test]
    fn diff_fields_flips_source_and_domain() {
        let row = Provider::new("tuta", Category::Email, None, ProviderSource::Discovered);
        let mut d = def("Tuta", Category::Email, None);
        d.domain = Some("tuta.com".into());
        let patch = diff_fields(&row, &d, "tuta");
        assert_eq!(patch.name.as_deref(), Some("Tuta"));
        assert_eq!(patch.source, Some(ProviderSource::Catalog));
        assert_eq!(patch.domain, Some(Some("tuta.com".into())));
        assert_eq!(patch.slug, None);
    }

    #[test]
    fn key_conflict_sees_rows_and_queue() {
        let a = Provider::new("A", Category::Dns, None, ProviderSource::Catalog);
        let q = Provider::new("Queued", Category::Dns, None, ProviderSource::Catalog);
        let rows = vec![a.clone()];
        let queue = vec![q.clone()];

        assert_eq!(key_conflict(&rows, &queue, "someone-else", Category::Dns, &a.slug), Some("A"));
        assert_eq!(
            key_conflict(&rows, &queue, "someone-else", Category::Dns, &q.slug),
            Some("Queued")
        );
        // The row itself is not a conflict.
        assert_eq!(key_conflict(&rows, &queue, &a.id, Category::Dns, &a.slug), None);
        // Same slug in another category is not a conflict.
        assert_eq!(key_conflict(&rows, &queue, "someone-else", Category::Email, &a.slug), None);
    }
}
