use std::collections::BTreeMap;
use std::path::PathBuf;

use domainwatch_core::{Category, DetectionRule, Provider, ProviderPatch, ProviderSource};
use domainwatch_recon::{
    reconcile, Catalog, CatalogDef, MergeTxn, PlannedAction, ProviderStore, ReconError,
    ReconOptions, StoreError,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

// ---------------------------------------------------------------------------
// In-memory store with failure injection
// ---------------------------------------------------------------------------

/// Referencing-table rows: table name -> rows of (column -> provider id).
type RefTables = BTreeMap<String, Vec<BTreeMap<String, String>>>;

#[derive(Debug, Clone, Default)]
struct MemStore {
    providers: Vec<Provider>,
    tables: RefTables,
    /// Injected failure: `repoint` on this (table, column) errors out.
    fail_repoint_on: Option<(String, String)>,
}

impl MemStore {
    fn seed(providers: Vec<Provider>) -> Self {
        Self { providers, ..Default::default() }
    }

    fn add_ref(&mut self, table: &str, column: &str, provider_id: &str) {
        let mut row = BTreeMap::new();
        row.insert(column.to_string(), provider_id.to_string());
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    fn refs_to(&self, provider_id: &str) -> usize {
        self.tables
            .values()
            .flatten()
            .flat_map(|row| row.values())
            .filter(|id| id.as_str() == provider_id)
            .count()
    }

    fn by_name(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }
}

struct MemTxn<'a> {
    store: &'a mut MemStore,
}

impl MergeTxn for MemTxn<'_> {
    fn repoint(
        &mut self,
        table: &str,
        column: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<(), StoreError> {
        if self.store.fail_repoint_on.as_ref().is_some_and(|(t, c)| t == table && c == column) {
            return Err(StoreError::Backend("injected repoint failure".into()));
        }
        if let Some(rows) = self.store.tables.get_mut(table) {
            for row in rows {
                if let Some(val) = row.get_mut(column) {
                    if val == old_id {
                        *val = new_id.to_string();
                    }
                }
            }
        }
        Ok(())
    }

    fn delete_provider(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.store.providers.len();
        self.store.providers.retain(|p| p.id != id);
        if self.store.providers.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl ProviderStore for MemStore {
    fn list_all(&self) -> Result<Vec<Provider>, StoreError> {
        Ok(self.providers.clone())
    }

    fn insert_many(&mut self, rows: &[Provider]) -> Result<(), StoreError> {
        for row in rows {
            if self
                .providers
                .iter()
                .any(|p| p.category == row.category && p.slug == row.slug)
            {
                return Err(StoreError::Constraint(format!(
                    "duplicate ({}, {})",
                    row.category, row.slug
                )));
            }
            self.providers.push(row.clone());
        }
        Ok(())
    }

    fn update_fields(&mut self, id: &str, patch: &ProviderPatch) -> Result<(), StoreError> {
        let Some(row) = self.providers.iter_mut().find(|p| p.id == id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        patch.apply(row);
        Ok(())
    }

    fn in_transaction(
        &mut self,
        op: &mut dyn FnMut(&mut dyn MergeTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let snapshot = (self.providers.clone(), self.tables.clone());
        let result = op(&mut MemTxn { store: self });
        if result.is_err() {
            // all-or-nothing: roll everything back
            self.providers = snapshot.0;
            self.tables = snapshot.1;
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn discovered(name: &str, category: Category) -> Provider {
    Provider::new(name, category, None, ProviderSource::Discovered)
}

fn def(name: &str, category: Category, rule: Option<DetectionRule>) -> CatalogDef {
    CatalogDef { name: name.into(), domain: None, category, rule }
}

fn catalog(defs: Vec<CatalogDef>) -> Catalog {
    Catalog { providers: defs }
}

fn tuta_catalog() -> Catalog {
    catalog(vec![def(
        "Tuta",
        Category::Email,
        Some(DetectionRule::mx_suffix("tutanota.de")),
    )])
}

fn live() -> ReconOptions {
    ReconOptions { dry_run: false }
}

fn dry() -> ReconOptions {
    ReconOptions { dry_run: true }
}

fn assert_unique_keys(store: &MemStore) {
    let mut keys: Vec<(Category, &str)> = store.providers.iter().map(|p| p.key()).collect();
    keys.sort();
    let len = keys.len();
    keys.dedup();
    assert_eq!(keys.len(), len, "duplicate (category, slug) after run");
}

// ---------------------------------------------------------------------------
// Insert / update
// ---------------------------------------------------------------------------

#[test]
fn insert_unseen_definition() {
    let mut store = MemStore::default();
    let cat = catalog(vec![def("New Provider", Category::Registrar, None)]);

    let report = reconcile(&cat, &mut store, &live()).unwrap();

    assert_eq!(report.summary.inserted, 1);
    assert_eq!(report.summary.updated, 0);
    assert_eq!(report.summary.cleaned, 0);
    let p = store.by_name("New Provider").unwrap();
    assert_eq!(p.slug, "new-provider");
    assert_eq!(p.source, ProviderSource::Catalog);
    assert_unique_keys(&store);
}

#[test]
fn update_drifted_catalog_row() {
    let mut row = Provider::new("tuta", Category::Email, None, ProviderSource::Catalog);
    row.slug = "tuta".into();
    let id = row.id.clone();
    let mut store = MemStore::seed(vec![row]);

    let cat = catalog(vec![CatalogDef {
        name: "Tuta".into(),
        domain: Some("tuta.com".into()),
        category: Category::Email,
        rule: Some(DetectionRule::mx_suffix("tutanota.de")),
    }]);

    let report = reconcile(&cat, &mut store, &live()).unwrap();

    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.inserted, 0);
    let p = store.by_name("Tuta").unwrap();
    assert_eq!(p.id, id, "update is in place");
    assert_eq!(p.domain.as_deref(), Some("tuta.com"));
    assert_unique_keys(&store);
}

#[test]
fn duplicate_definitions_deduped_with_warning() {
    let mut store = MemStore::default();
    // Both names normalize to (email, tuta-gmbh); first occurrence wins.
    let cat = catalog(vec![
        def("Tuta GmbH", Category::Email, None),
        def("tuta gmbh", Category::Email, None),
    ]);

    let report = reconcile(&cat, &mut store, &live()).unwrap();

    assert_eq!(report.summary.inserted, 1);
    assert_eq!(report.summary.dropped_duplicates, 1);
    assert_eq!(store.by_name("Tuta GmbH").unwrap().slug, "tuta-gmbh");
    assert!(store.by_name("tuta gmbh").is_none());
    assert_unique_keys(&store);
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

#[test]
fn replace_matched_discovered_provider() {
    let d = discovered("mail.tutanota.de", Category::Email);
    let d_id = d.id.clone();
    let mut store = MemStore::seed(vec![d]);
    store.add_ref("registrations", "registrar_id", &d_id);
    store.add_ref("hosting", "email_id", &d_id);

    let report = reconcile(&tuta_catalog(), &mut store, &live()).unwrap();

    assert_eq!(report.summary.updated, 1, "replace counts as an update");
    assert_eq!(report.summary.inserted, 0);
    assert_eq!(report.summary.cleaned, 0);

    let email_rows: Vec<_> = store
        .providers
        .iter()
        .filter(|p| p.category == Category::Email)
        .collect();
    assert_eq!(email_rows.len(), 1);
    let p = email_rows[0];
    assert_eq!(p.name, "Tuta");
    assert_eq!(p.slug, "tuta");
    assert_eq!(p.source, ProviderSource::Catalog);

    // All prior references resolve to the surviving row.
    assert_eq!(store.refs_to(&p.id), 2);
    assert!(matches!(report.actions[0], PlannedAction::Replace { .. }));
    assert_unique_keys(&store);
}

#[test]
fn at_most_one_discovered_replaced_lowest_id_wins() {
    let mut a = discovered("mail.tutanota.de", Category::Email);
    let mut b = discovered("mx.tutanota.de", Category::Email);
    // Force a deterministic id order regardless of UUID luck.
    a.id = "00000000-0000-0000-0000-00000000000a".into();
    b.id = "00000000-0000-0000-0000-00000000000b".into();
    let mut store = MemStore::seed(vec![b.clone(), a.clone()]);

    let report = reconcile(&tuta_catalog(), &mut store, &live()).unwrap();

    // Lowest id becomes the replace target; the other is merged in cleanup.
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.cleaned, 1);
    let p = store.by_name("Tuta").unwrap();
    assert_eq!(p.id, a.id);
    assert!(store.providers.iter().all(|r| r.id != b.id));
    assert_unique_keys(&store);
}

// ---------------------------------------------------------------------------
// Cleanup merge
// ---------------------------------------------------------------------------

#[test]
fn cleanup_merges_leftover_discovered_into_standing_row() {
    let standing = Provider::new("Tuta", Category::Email, None, ProviderSource::Catalog);
    let d = discovered("mail.tutanota.de", Category::Email);
    let (standing_id, d_id) = (standing.id.clone(), d.id.clone());
    let mut store = MemStore::seed(vec![standing, d]);
    store.add_ref("registrations", "registrar_id", &d_id);
    store.add_ref("registrations", "reseller_id", &d_id);
    store.add_ref("certificates", "ca_id", &d_id);
    store.add_ref("hosting", "dns_id", &d_id);

    let report = reconcile(&tuta_catalog(), &mut store, &live()).unwrap();

    assert_eq!(report.summary.cleaned, 1);
    assert_eq!(report.summary.updated, 0);
    assert!(store.providers.iter().all(|p| p.id != d_id), "discovered row deleted");
    assert_eq!(store.refs_to(&d_id), 0);
    assert_eq!(store.refs_to(&standing_id), 4);
    assert_unique_keys(&store);
}

#[test]
fn merge_failure_is_fatal_and_rolls_back() {
    let standing = Provider::new("Tuta", Category::Email, None, ProviderSource::Catalog);
    let d = discovered("mail.tutanota.de", Category::Email);
    let d_id = d.id.clone();
    let mut store = MemStore::seed(vec![standing, d]);
    store.add_ref("registrations", "registrar_id", &d_id);
    store.add_ref("certificates", "ca_id", &d_id);
    store.add_ref("hosting", "email_id", &d_id);
    // registrations is repointed first; failing on certificates leaves a
    // half-done merge for the transaction to roll back.
    store.fail_repoint_on = Some(("certificates".into(), "ca_id".into()));

    let before_providers = store.providers.clone();
    let before_tables = store.tables.clone();

    let err = reconcile(&tuta_catalog(), &mut store, &live()).unwrap_err();

    match err {
        ReconError::MergeFailed { discovered, catalog, .. } => {
            assert_eq!(discovered, "mail.tutanota.de");
            assert_eq!(catalog, "Tuta");
        }
        other => panic!("expected MergeFailed, got {other}"),
    }
    assert_eq!(store.providers, before_providers, "no partial provider state");
    assert_eq!(store.tables, before_tables, "no partial repoint");
}

#[test]
fn hosting_is_never_cleaned_up() {
    let standing = Provider::new("Netlify", Category::Hosting, None, ProviderSource::Catalog);
    let d = discovered("netlify-edge", Category::Hosting);
    let d_id = d.id.clone();
    let mut store = MemStore::seed(vec![standing, d]);

    // A hosting rule that would match anything if it were ever evaluated.
    let cat = catalog(vec![def(
        "Netlify",
        Category::Hosting,
        Some(DetectionRule::not(DetectionRule::header("x-never-sent"))),
    )]);

    let report = reconcile(&cat, &mut store, &live()).unwrap();

    assert_eq!(report.summary.cleaned, 0);
    assert!(store.providers.iter().any(|p| p.id == d_id), "discovered hosting row survives");
}

// ---------------------------------------------------------------------------
// Conflict skip
// ---------------------------------------------------------------------------

#[test]
fn conflicting_update_is_skipped_with_warning() {
    // Dirty table predating the uniqueness invariant: two rows own the same
    // (email, tuta) key. The update must be skipped, not applied.
    let mut a = Provider::new("Tuta Legacy", Category::Email, None, ProviderSource::Catalog);
    let mut b = Provider::new("Tuta Modern", Category::Email, None, ProviderSource::Catalog);
    a.slug = "tuta".into();
    b.slug = "tuta".into();
    a.id = "00000000-0000-0000-0000-00000000000a".into();
    b.id = "00000000-0000-0000-0000-00000000000b".into();
    let before = vec![a.clone(), b.clone()];
    let mut store = MemStore::seed(before.clone());

    let cat = catalog(vec![def("Tuta", Category::Email, None)]);
    let report = reconcile(&cat, &mut store, &live()).unwrap();

    assert_eq!(report.summary.skipped_conflicts, 1);
    assert_eq!(report.summary.updated, 0);
    assert_eq!(report.summary.inserted, 0);
    assert_eq!(store.providers, before, "conflicting rows left untouched");
}

// ---------------------------------------------------------------------------
// Idempotence + dry run
// ---------------------------------------------------------------------------

fn mixed_scenario() -> (Catalog, MemStore) {
    let d1 = discovered("mail.tutanota.de", Category::Email);
    let d2 = discovered("kiki.ns.cloudflare.com", Category::Dns);
    let standing = Provider::new("Gandi", Category::Registrar, None, ProviderSource::Catalog);
    let d2_id = d2.id.clone();
    let mut store = MemStore::seed(vec![d1, d2, standing]);
    store.add_ref("hosting", "dns_id", &d2_id);

    let cat = catalog(vec![
        def("Tuta", Category::Email, Some(DetectionRule::mx_suffix("tutanota.de"))),
        def("Cloudflare", Category::Dns, Some(DetectionRule::ns_suffix("ns.cloudflare.com"))),
        CatalogDef {
            name: "Gandi".into(),
            domain: Some("gandi.net".into()),
            category: Category::Registrar,
            rule: Some(DetectionRule::registrar_contains("gandi")),
        },
        def("Porkbun", Category::Registrar, Some(DetectionRule::registrar_contains("porkbun"))),
    ]);
    (cat, store)
}

#[test]
fn second_run_is_a_no_op() {
    let (cat, mut store) = mixed_scenario();

    let first = reconcile(&cat, &mut store, &live()).unwrap();
    assert!(first.summary.inserted > 0 || first.summary.updated > 0);

    let second = reconcile(&cat, &mut store, &live()).unwrap();
    assert_eq!(second.summary.inserted, 0);
    assert_eq!(second.summary.updated, 0);
    assert_eq!(second.summary.cleaned, 0);
    assert!(second.actions.is_empty());
    assert_unique_keys(&store);
}

#[test]
fn dry_run_reports_without_writing() {
    let (cat, mut store) = mixed_scenario();
    let before_providers = store.providers.clone();
    let before_tables = store.tables.clone();

    let preview = reconcile(&cat, &mut store, &dry()).unwrap();
    assert!(preview.dry_run);
    assert_eq!(store.providers, before_providers, "dry run wrote providers");
    assert_eq!(store.tables, before_tables, "dry run wrote references");

    let applied = reconcile(&cat, &mut store, &live()).unwrap();
    assert!(!applied.dry_run);
    assert_eq!(preview.summary, applied.summary, "preview must match the live run");
    assert_eq!(preview.actions, applied.actions);
}

// ---------------------------------------------------------------------------
// Fixture catalog
// ---------------------------------------------------------------------------

#[test]
fn fixture_catalog_end_to_end() {
    let toml = std::fs::read_to_string(fixtures_dir().join("portfolio.catalog.toml")).unwrap();
    let cat = Catalog::from_toml(&toml).unwrap();

    let mut store = MemStore::seed(vec![
        discovered("mail.tutanota.de", Category::Email),
        discovered("GANDI SAS", Category::Registrar),
        discovered("Let's Encrypt R11", Category::Ca),
        discovered("some-unknown-host.example", Category::Hosting),
    ]);

    let report = reconcile(&cat, &mut store, &live()).unwrap();

    // Every non-hosting discovered row is consumed; hosting survives.
    assert_eq!(report.summary.updated, 3, "three replaces");
    assert!(store.by_name("mail.tutanota.de").is_none());
    assert!(store.by_name("GANDI SAS").is_none());
    assert!(store.by_name("Let's Encrypt R11").is_none());
    assert!(store.by_name("some-unknown-host.example").is_some());

    // Remaining definitions inserted as fresh catalog rows.
    assert_eq!(report.summary.inserted, cat.providers.len() - 3);
    assert_unique_keys(&store);

    let second = reconcile(&cat, &mut store, &live()).unwrap();
    assert_eq!(second.summary, Default::default());
}
