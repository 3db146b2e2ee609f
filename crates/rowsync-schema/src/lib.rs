//! Catalog introspection and schema caching for rowsync.
//!
//! rowsync routes every record attribute by looking at the columns a table
//! actually has. This crate discovers those columns from the PostgreSQL catalog
//! and memoizes them per table name for the lifetime of a [`SchemaCache`].
//!
//! # Lifecycle
//!
//! - **Create on first use**: the first operation touching a table issues one
//!   catalog query; later operations hit the cache.
//! - **Never invalidated implicitly**: the schema is assumed static. Callers that
//!   run migrations can drop entries with [`SchemaCache::invalidate`].
//! - **Failure degrades, never errors**: a failed catalog query caches an empty
//!   column list so a misconfigured table does not trigger a catalog query on
//!   every call.

pub mod cache;
pub mod introspect;

pub use cache::SchemaCache;
pub use introspect::{CATALOG_QUERY, columns_from_rows, introspect};
