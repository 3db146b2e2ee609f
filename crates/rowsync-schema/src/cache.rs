//! Per-table schema cache.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use asupersync::{Cx, Outcome};
use rowsync_core::{ColumnDef, Connection, Error, ExtensionColumn, TableSchema, Value};

use crate::introspect::{CATALOG_QUERY, introspect};

/// Memoized column metadata, keyed by table name.
///
/// Entries are written at most once per table unless explicitly invalidated.
/// The lock is never held across an await: two operations touching a new table
/// at the same moment may both query the catalog, and the second write simply
/// replaces the first with the same columns.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by every repository that does not bring its own.
    pub fn shared() -> Arc<SchemaCache> {
        static SHARED: OnceLock<Arc<SchemaCache>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(SchemaCache::new())))
    }

    /// Cached schema of a table, without touching the database.
    pub fn get(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    /// Whether a table has been loaded.
    pub fn contains(&self, table: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(table)
    }

    /// Cached columns of a table; empty when the table is unknown.
    pub fn columns(&self, table: &str) -> Vec<ColumnDef> {
        self.get(table)
            .map(|schema| schema.columns().to_vec())
            .unwrap_or_default()
    }

    /// Whether a cached table carries the extension column.
    pub fn has_extension(&self, table: &str, extension: &ExtensionColumn) -> bool {
        self.get(table)
            .is_some_and(|schema| schema.has_extension(extension))
    }

    /// Store a schema, replacing any previous entry for the same table.
    ///
    /// Also serves to preload known schemas and skip introspection entirely.
    pub fn insert(&self, schema: TableSchema) -> Arc<TableSchema> {
        let schema = Arc::new(schema);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.table_name().to_string(), Arc::clone(&schema));
        schema
    }

    /// Drop a table's entry so the next touch introspects again.
    pub fn invalidate(&self, table: &str) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table)
            .is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ensure a table's schema is cached, introspecting on a miss.
    pub async fn load<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table: &str,
    ) -> Outcome<Arc<TableSchema>, Error> {
        self.load_with(cx, conn, table, |_, _| {}).await
    }

    /// Like [`load`](Self::load), reporting the catalog statement to `inspect`
    /// before it runs.
    ///
    /// A failing catalog query is logged and cached as an empty schema; the
    /// caller still gets `Outcome::Ok`. Cancellation is passed through and
    /// leaves the cache untouched.
    pub async fn load_with<C, F>(
        &self,
        cx: &Cx,
        conn: &C,
        table: &str,
        inspect: F,
    ) -> Outcome<Arc<TableSchema>, Error>
    where
        C: Connection,
        F: FnOnce(&str, &[Value]),
    {
        if let Some(schema) = self.get(table) {
            tracing::trace!(table = table, "Schema cache hit");
            return Outcome::Ok(schema);
        }

        tracing::debug!(table = table, "Schema cache miss, introspecting catalog");
        inspect(CATALOG_QUERY, &[Value::Text(table.to_string())]);

        let columns = match introspect(cx, conn, table).await {
            Outcome::Ok(columns) => columns,
            Outcome::Err(e) => {
                tracing::warn!(
                    table = table,
                    error = %e,
                    "Catalog introspection failed, caching empty schema"
                );
                Vec::new()
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        tracing::debug!(table = table, columns = columns.len(), "Schema cached");
        Outcome::Ok(self.insert(TableSchema::new(table, columns)))
    }
}
