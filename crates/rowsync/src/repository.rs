//! The sync dispatcher.
//!
//! A [`Repository`] runs one operation at a time against a table:
//!
//! 1. check cancellation and acquire a connection from the connector
//! 2. make sure the table's schema is cached (one catalog query on first touch)
//! 3. resolve the relation scope from the record's resource path
//! 4. build the statement
//! 5. execute it and merge the returned row into the record
//!
//! Every operation reports exactly one `Outcome`. The connection is dropped
//! when the operation ends.

use std::fmt;
use std::sync::Arc;

use asupersync::{Cx, Outcome};
use rowsync_core::{
    Attributes, Connection, Connector, Error, Record, Result, Row, TableSchema, Value,
};
use rowsync_query::{
    DeleteBuilder, InsertBuilder, SelectBuilder, Statement, Target, UpdateBuilder, hstore,
    relation_conditions,
};
use rowsync_schema::SchemaCache;

use crate::collection::Collection;
use crate::config::SyncConfig;
use crate::method::SyncMethod;
use crate::options::{DebugSink, SyncOptions};

/// Label passed to debug sinks for the catalog query.
pub const INTROSPECT_STEP: &str = "introspect";

fn map_outcome<T, U>(outcome: Outcome<T, Error>, f: impl FnOnce(T) -> U) -> Outcome<U, Error> {
    match outcome {
        Outcome::Ok(v) => Outcome::Ok(f(v)),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Synchronizes records with PostgreSQL tables.
///
/// # Example
///
/// ```ignore
/// let repo = Repository::builder()
///     .connector(ClientConnector::new(client))
///     .extension_storage(true)
///     .build()?;
///
/// let mut member = DynamicRecord::new("orgs/7/members").with("name", "Ann");
/// repo.create(&cx, &mut member, &SyncOptions::new()).await;
/// ```
pub struct Repository<C> {
    connector: C,
    schemas: Arc<SchemaCache>,
    config: SyncConfig,
    debug: Option<DebugSink>,
}

impl<C: Connector> Repository<C> {
    /// Start building a repository.
    pub fn builder() -> RepositoryBuilder<C> {
        RepositoryBuilder::new()
    }

    /// Repository with default configuration and the process-wide schema cache.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            schemas: SchemaCache::shared(),
            config: SyncConfig::default(),
            debug: None,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Schema cache used by this repository.
    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    /// The connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn target<'a>(&'a self, schema: &'a TableSchema, primary_key: &'a str) -> Target<'a> {
        Target::new(schema, primary_key, &self.config.extension)
            .extension_storage(self.config.extension_storage)
    }

    fn sink<'a>(&'a self, options: &'a SyncOptions) -> Option<&'a DebugSink> {
        options.debug.as_ref().or(self.debug.as_ref())
    }

    fn cached_schema(&self, table: &str) -> Arc<TableSchema> {
        self.schemas
            .get(table)
            .unwrap_or_else(|| Arc::new(TableSchema::empty(table)))
    }

    // ========================================================================
    // Statement preparation
    // ========================================================================

    fn build_read<R: Record>(
        &self,
        schema: &TableSchema,
        record: &R,
        options: &SyncOptions,
    ) -> Statement {
        let relation = relation_conditions(record.resource_path());
        let id = record.id().cloned().unwrap_or_default();
        SelectBuilder::one(self.target(schema, record.primary_key_name()), &id)
            .filter(options.filter.as_ref())
            .relation(&relation)
            .build()
    }

    fn build_create<R: Record>(&self, schema: &TableSchema, record: &R) -> Result<Statement> {
        let mut attributes = record.attributes().clone();
        attributes.extend(relation_conditions(record.resource_path()));
        InsertBuilder::new(self.target(schema, record.primary_key_name()), &attributes).build()
    }

    fn build_update<R: Record>(&self, schema: &TableSchema, record: &R) -> Result<Statement> {
        let relation = relation_conditions(record.resource_path());
        let mut attributes = record.attributes().clone();
        attributes.extend(relation.clone());
        let id = record.id().cloned().unwrap_or_default();
        UpdateBuilder::new(
            self.target(schema, record.primary_key_name()),
            &attributes,
            &id,
        )
        .relation(&relation)
        .build()
    }

    fn build_delete<R: Record>(
        &self,
        schema: &TableSchema,
        record: &R,
        options: &SyncOptions,
    ) -> Statement {
        let relation = relation_conditions(record.resource_path());
        let id = record.id().cloned().unwrap_or_default();
        DeleteBuilder::new(self.target(schema, record.primary_key_name()), &id)
            .filter(options.filter.as_ref())
            .relation(&relation)
            .build()
    }

    fn build_read_collection<R: Record + Default>(
        &self,
        schema: &TableSchema,
        collection: &Collection<R>,
        options: &SyncOptions,
    ) -> Statement {
        let relation = relation_conditions(&collection.resource_path());
        let primary_key = collection.primary_key_name();
        SelectBuilder::collection(self.target(schema, &primary_key))
            .filter(options.filter.as_ref())
            .relation(&relation)
            .build()
    }

    /// Statement [`read`](Self::read) would run, using the cached schema.
    ///
    /// A table that has not been loaded yet is treated as having no declared
    /// columns; call [`load_schema`](Self::load_schema) first.
    pub fn prepare_read<R: Record>(&self, record: &R, options: &SyncOptions) -> Statement {
        self.build_read(&self.cached_schema(record.table_name()), record, options)
    }

    /// Statement [`create`](Self::create) would run, using the cached schema.
    ///
    /// Fails with `ColumnNotFound` exactly when `create` would.
    pub fn prepare_create<R: Record>(&self, record: &R) -> Result<Statement> {
        self.build_create(&self.cached_schema(record.table_name()), record)
    }

    /// Statement [`update`](Self::update) would run, using the cached schema.
    pub fn prepare_update<R: Record>(&self, record: &R) -> Result<Statement> {
        self.build_update(&self.cached_schema(record.table_name()), record)
    }

    /// Statement [`delete`](Self::delete) would run, using the cached schema.
    pub fn prepare_delete<R: Record>(&self, record: &R, options: &SyncOptions) -> Statement {
        self.build_delete(&self.cached_schema(record.table_name()), record, options)
    }

    /// Statement [`read_collection`](Self::read_collection) would run, using the
    /// cached schema.
    pub fn prepare_read_collection<R: Record + Default>(
        &self,
        collection: &Collection<R>,
        options: &SyncOptions,
    ) -> Statement {
        self.build_read_collection(
            &self.cached_schema(&collection.table_name()),
            collection,
            options,
        )
    }

    // ========================================================================
    // Execution helpers
    // ========================================================================

    async fn acquire(&self, cx: &Cx) -> Outcome<C::Conn, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        self.connector.connect(cx).await
    }

    async fn open(
        &self,
        cx: &Cx,
        table: &str,
        options: &SyncOptions,
    ) -> Outcome<(C::Conn, Arc<TableSchema>), Error> {
        let conn = match self.acquire(cx).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let sink = self.sink(options);
        let schema = match self
            .schemas
            .load_with(cx, &conn, table, |sql, params| {
                if let Some(sink) = sink {
                    sink(INTROSPECT_STEP, &Statement::new(sql, params.to_vec()));
                }
            })
            .await
        {
            Outcome::Ok(schema) => schema,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        Outcome::Ok((conn, schema))
    }

    async fn execute(
        &self,
        cx: &Cx,
        conn: &C::Conn,
        step: &str,
        statement: &Statement,
        options: &SyncOptions,
    ) -> Outcome<Vec<Row>, Error> {
        if let Some(sink) = self.sink(options) {
            sink(step, statement);
        }
        tracing::debug!(
            step = step,
            sql = %statement.sql,
            params = statement.params.len(),
            "Executing statement"
        );

        match conn.query(cx, &statement.sql, &statement.params).await {
            Outcome::Err(Error::Query(e)) if e.sql.is_none() => {
                Outcome::Err(Error::Query(e.with_sql(statement.sql.clone())))
            }
            other => other,
        }
    }

    /// Flatten a returned row, decoding the extension column when present.
    fn merge_row(&self, schema: &TableSchema, row: Row) -> Result<Attributes> {
        if schema.has_extension(&self.config.extension) {
            hstore::merge_row(row, &self.config.extension.name)
        } else {
            Ok(row.into_attributes())
        }
    }

    fn absorb<R: Record>(
        &self,
        schema: &TableSchema,
        record: &mut R,
        row: Row,
    ) -> Outcome<Attributes, Error> {
        match self.merge_row(schema, row) {
            Ok(attributes) => {
                record.merge_attributes(attributes.clone());
                Outcome::Ok(attributes)
            }
            Err(e) => Outcome::Err(e),
        }
    }

    fn not_found<R: Record>(record: &R) -> Error {
        Error::not_found(
            record.table_name(),
            record.primary_key_name(),
            record.id().cloned().unwrap_or(Value::Null),
        )
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Load a table's schema into the cache ahead of time.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn load_schema(&self, cx: &Cx, table: &str) -> Outcome<Arc<TableSchema>, Error> {
        map_outcome(self.open(cx, table, &SyncOptions::default()).await, |(_, schema)| schema)
    }

    /// Fetch the record's row by primary key and merge it into the record.
    ///
    /// Zero rows is `NotFound`.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options), fields(table = record.table_name()))]
    pub async fn read<R: Record>(
        &self,
        cx: &Cx,
        record: &mut R,
        options: &SyncOptions,
    ) -> Outcome<Attributes, Error> {
        let table = record.table_name().to_string();
        let (conn, schema) = match self.open(cx, &table, options).await {
            Outcome::Ok(opened) => opened,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let statement = self.build_read(&schema, record, options);
        let rows = match self.execute(cx, &conn, "read", &statement, options).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let Some(row) = rows.into_iter().next() else {
            tracing::debug!(table = %table, "Read matched no row");
            return Outcome::Err(Self::not_found(record));
        };
        self.absorb(&schema, record, row)
    }

    /// Insert the record and merge the stored row back into it.
    ///
    /// The record is stamped with its parent scope first. Attributes without a
    /// column fail with `ColumnNotFound` before anything is sent, unless
    /// extension storage applies.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options), fields(table = record.table_name()))]
    pub async fn create<R: Record>(
        &self,
        cx: &Cx,
        record: &mut R,
        options: &SyncOptions,
    ) -> Outcome<Attributes, Error> {
        let table = record.table_name().to_string();
        let (conn, schema) = match self.open(cx, &table, options).await {
            Outcome::Ok(opened) => opened,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let relation = relation_conditions(record.resource_path());
        record.attributes_mut().extend(relation);

        let statement = match self.build_create(&schema, record) {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        let rows = match self.execute(cx, &conn, "create", &statement, options).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let Some(row) = rows.into_iter().next() else {
            return Outcome::Err(Error::Decode(format!(
                "insert into '{table}' returned no row"
            )));
        };
        tracing::info!(table = %table, "Record created");
        self.absorb(&schema, record, row)
    }

    /// Update the record's row and merge the stored row back into it.
    ///
    /// The primary key is never assigned. Zero rows, including a row outside
    /// the record's parent scope, is `NotFound`.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options), fields(table = record.table_name()))]
    pub async fn update<R: Record>(
        &self,
        cx: &Cx,
        record: &mut R,
        options: &SyncOptions,
    ) -> Outcome<Attributes, Error> {
        let table = record.table_name().to_string();
        let (conn, schema) = match self.open(cx, &table, options).await {
            Outcome::Ok(opened) => opened,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let relation = relation_conditions(record.resource_path());
        record.attributes_mut().extend(relation);

        let statement = match self.build_update(&schema, record) {
            Ok(statement) => statement,
            Err(e) => return Outcome::Err(e),
        };
        let rows = match self.execute(cx, &conn, "update", &statement, options).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let Some(row) = rows.into_iter().next() else {
            tracing::debug!(table = %table, "Update matched no row");
            return Outcome::Err(Self::not_found(record));
        };
        self.absorb(&schema, record, row)
    }

    /// Delete the record's row.
    ///
    /// Zero rows, including a row outside the record's parent scope, is
    /// `NotFound`.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options), fields(table = record.table_name()))]
    pub async fn delete<R: Record>(
        &self,
        cx: &Cx,
        record: &R,
        options: &SyncOptions,
    ) -> Outcome<(), Error> {
        let table = record.table_name().to_string();
        let (conn, schema) = match self.open(cx, &table, options).await {
            Outcome::Ok(opened) => opened,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let statement = self.build_delete(&schema, record, options);
        let rows = match self.execute(cx, &conn, "delete", &statement, options).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        if rows.is_empty() {
            tracing::debug!(table = %table, "Delete matched no row");
            return Outcome::Err(Self::not_found(record));
        }
        tracing::info!(table = %table, "Record deleted");
        Outcome::Ok(())
    }

    /// Fetch every row in the collection's scope, ordered by primary key.
    ///
    /// Rows are returned as stored (the extension column is not decoded) and
    /// handed to the collection's fetched listeners.
    #[tracing::instrument(level = "debug", skip(self, cx, collection, options))]
    pub async fn read_collection<R: Record + Default>(
        &self,
        cx: &Cx,
        collection: &Collection<R>,
        options: &SyncOptions,
    ) -> Outcome<Vec<Row>, Error> {
        let table = collection.table_name();
        let (conn, schema) = match self.open(cx, &table, options).await {
            Outcome::Ok(opened) => opened,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let statement = self.build_read_collection(&schema, collection, options);
        let rows = match self
            .execute(cx, &conn, "read_collection", &statement, options)
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        tracing::debug!(table = %table, rows = rows.len(), "Collection fetched");
        collection.notify_fetched(&rows);
        Outcome::Ok(rows)
    }

    /// Run a record operation chosen by method.
    ///
    /// Returns the merged attributes, or `None` for a delete.
    pub async fn sync<R: Record>(
        &self,
        cx: &Cx,
        method: SyncMethod,
        record: &mut R,
        options: &SyncOptions,
    ) -> Outcome<Option<Attributes>, Error> {
        match method {
            SyncMethod::Read => map_outcome(self.read(cx, record, options).await, Some),
            SyncMethod::Create => map_outcome(self.create(cx, record, options).await, Some),
            SyncMethod::Update => map_outcome(self.update(cx, record, options).await, Some),
            SyncMethod::Delete => map_outcome(self.delete(cx, record, options).await, |()| None),
        }
    }

    /// Run a collection operation chosen by method. Only `read` applies.
    pub async fn sync_collection<R: Record + Default>(
        &self,
        cx: &Cx,
        method: SyncMethod,
        collection: &Collection<R>,
        options: &SyncOptions,
    ) -> Outcome<Vec<Row>, Error> {
        match method {
            SyncMethod::Read => self.read_collection(cx, collection, options).await,
            other => Outcome::Err(Error::UnknownMethod(format!("{other}_collection"))),
        }
    }
}

impl<C> fmt::Debug for Repository<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .field("cached_tables", &self.schemas.len())
            .field("debug", &self.debug.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Repository`].
pub struct RepositoryBuilder<C> {
    connector: Option<C>,
    config: SyncConfig,
    schemas: Option<Arc<SchemaCache>>,
    debug: Option<DebugSink>,
}

impl<C: Connector> RepositoryBuilder<C> {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            connector: None,
            config: SyncConfig::default(),
            schemas: None,
            debug: None,
        }
    }

    /// Set the connector. Required.
    pub fn connector(mut self, connector: C) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable extension storage.
    pub fn extension_storage(mut self, enabled: bool) -> Self {
        self.config.extension_storage = enabled;
        self
    }

    /// Use a dedicated schema cache instead of the process-wide one.
    pub fn schema_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.schemas = Some(cache);
        self
    }

    /// Receive every statement before it is executed.
    pub fn debug<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str, &Statement) + Send + Sync + 'static,
    {
        self.debug = Some(Arc::new(sink));
        self
    }

    /// Build the repository.
    ///
    /// Fails with `Error::Configuration` when no connector was given.
    pub fn build(self) -> Result<Repository<C>> {
        let Some(connector) = self.connector else {
            return Err(Error::Configuration(
                "a connector is required to build a repository".to_string(),
            ));
        };

        tracing::debug!(
            extension_storage = self.config.extension_storage,
            extension_column = %self.config.extension.name,
            "Repository configured"
        );

        Ok(Repository {
            connector,
            schemas: self.schemas.unwrap_or_else(SchemaCache::shared),
            config: self.config,
            debug: self.debug,
        })
    }
}

impl<C: Connector> Default for RepositoryBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for RepositoryBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryBuilder")
            .field("has_connector", &self.connector.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
