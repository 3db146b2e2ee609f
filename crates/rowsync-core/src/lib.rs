//! Core types and traits for rowsync.
//!
//! `rowsync-core` is the **foundation layer** for the workspace. It defines the
//! capabilities and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Record` is the narrow capability a caller's object
//!   exposes (table, primary key, attributes). `Connection` and `Connector`
//!   are the capabilities an external driver or pool provides.
//! - **Data model**: `Row`, `Value`, `ColumnDef` and `TableSchema` represent
//!   query inputs/outputs and discovered table metadata.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every async database operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `rowsync-schema` caches `TableSchema` values discovered through a `Connection`.
//! - `rowsync-query` turns `Record` attributes into SQL text and `Value` parameters.
//! - `rowsync` (the facade) wires them together behind `Repository`.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod column;
pub mod connection;
pub mod error;
pub mod record;
pub mod row;
pub mod value;

pub use column::{ColumnDef, EXTENSION_COLUMN, EXTENSION_TYPE, ExtensionColumn, TableSchema};
pub use connection::{ClientConnector, Connection, Connector, FnConnector};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result,
};
pub use record::{
    Attributes, DEFAULT_PRIMARY_KEY, DynamicRecord, Record, path_segments, table_name_of,
};
pub use row::Row;
pub use value::Value;
