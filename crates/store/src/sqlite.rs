// Native store format using SQLite

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use domainwatch_core::{Provider, ProviderPatch};
use domainwatch_recon::{MergeTxn, ProviderStore, StoreError, PROVIDER_REFS};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,    -- dns | email | hosting | registrar | ca
    slug TEXT NOT NULL,
    domain TEXT,
    source TEXT NOT NULL,      -- catalog | discovered
    updated_at TEXT NOT NULL,  -- RFC 3339
    UNIQUE (category, slug)
);

CREATE TABLE IF NOT EXISTS registrations (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    registrar_id TEXT REFERENCES providers(id),
    reseller_id TEXT REFERENCES providers(id),
    expires_at TEXT
);

CREATE TABLE IF NOT EXISTS certificates (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    ca_id TEXT REFERENCES providers(id),
    not_after TEXT
);

CREATE TABLE IF NOT EXISTS hosting (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    host_id TEXT REFERENCES providers(id),
    email_id TEXT REFERENCES providers(id),
    dns_id TEXT REFERENCES providers(id)
);

CREATE INDEX IF NOT EXISTS idx_providers_category ON providers (category);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) a store at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Ephemeral store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Providers of one category, ordered by slug. Dashboard listing helper.
    pub fn list_by_category(
        &self,
        category: domainwatch_core::Category,
    ) -> Result<Vec<Provider>, StoreError> {
        let mut providers = self.list_all()?;
        providers.retain(|p| p.category == category);
        providers.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(providers)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn row_to_provider(row: &rusqlite::Row<'_>) -> rusqlite::Result<Provider> {
    let category: String = row.get(2)?;
    let source: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    let parse_col = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            msg.into(),
        )
    };

    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        category: category.parse().map_err(|e: String| parse_col(2, e))?,
        slug: row.get(3)?,
        domain: row.get(4)?,
        source: source.parse().map_err(|e: String| parse_col(5, e))?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| parse_col(6, e.to_string()))?,
    })
}

// ---------------------------------------------------------------------------
// ProviderStore impl
// ---------------------------------------------------------------------------

impl ProviderStore for SqliteStore {
    fn list_all(&self) -> Result<Vec<Provider>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category, slug, domain, source, updated_at FROM providers")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], row_to_provider)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    fn insert_many(&mut self, rows: &[Provider]) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO providers (id, name, category, slug, domain, source, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(db_err)?;
            for row in rows {
                stmt.execute(params![
                    row.id,
                    row.name,
                    row.category.to_string(),
                    row.slug,
                    row.domain,
                    row.source.to_string(),
                    row.updated_at.to_rfc3339(),
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    fn update_fields(&mut self, id: &str, patch: &ProviderPatch) -> Result<(), StoreError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref name) = patch.name {
            sets.push("name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(ref slug) = patch.slug {
            sets.push("slug = ?");
            values.push(Value::Text(slug.clone()));
        }
        if let Some(ref domain) = patch.domain {
            sets.push("domain = ?");
            values.push(match domain {
                Some(d) => Value::Text(d.clone()),
                None => Value::Null,
            });
        }
        if let Some(source) = patch.source {
            sets.push("source = ?");
            values.push(Value::Text(source.to_string()));
        }
        if sets.is_empty() {
            return Ok(());
        }
        sets.push("updated_at = ?");
        values.push(Value::Text(Utc::now().to_rfc3339()));
        values.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE providers SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(db_err)?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn in_transaction(
        &mut self,
        op: &mut dyn FnMut(&mut dyn MergeTxn) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(db_err)?;
        let result = op(&mut SqliteTxn { tx: &tx });
        match result {
            Ok(()) => tx.commit().map_err(db_err),
            Err(e) => {
                // Dropping the transaction rolls it back.
                drop(tx);
                Err(e)
            }
        }
    }
}

struct SqliteTxn<'a> {
    tx: &'a rusqlite::Transaction<'a>,
}

impl MergeTxn for SqliteTxn<'_> {
    fn repoint(
        &mut self,
        table: &str,
        column: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<(), StoreError> {
        // Identifiers cannot be bound as parameters; only the declared
        // reference columns are accepted.
        let known = PROVIDER_REFS
            .iter()
            .any(|(t, cols)| *t == table && cols.contains(&column));
        if !known {
            return Err(StoreError::Constraint(format!(
                "unknown reference target {table}.{column}"
            )));
        }

        let sql = format!("UPDATE {table} SET {column} = ?1 WHERE {column} = ?2");
        self.tx.execute(&sql, params![new_id, old_id]).map_err(db_err)?;
        Ok(())
    }

    fn delete_provider(&mut self, id: &str) -> Result<(), StoreError> {
        let deleted = self
            .tx
            .execute("DELETE FROM providers WHERE id = ?1", params![id])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
