//! SQL generation for rowsync.
//!
//! `rowsync-query` is the **statement layer**. It turns record attributes,
//! relation scopes and caller filters into parameterized PostgreSQL statements,
//! and owns the codec for the hstore extension column.
//!
//! # Role In The Architecture
//!
//! - **Builders**: `SelectBuilder`, `InsertBuilder`, `UpdateBuilder` and
//!   `DeleteBuilder` produce a `Statement` (SQL text plus `$n` parameters)
//!   against a `Target` table.
//! - **Partitioning**: attributes are split into declared columns and the
//!   extension map before any SQL is written; unknown attributes fail fast.
//! - **Filters**: equality maps and raw conditions, AND-combined with the
//!   relation scope inferred from a resource path.
//! - **Codec**: `hstore::encode` / `hstore::decode` keep value kinds across the
//!   text-only hstore column.
//!
//! Nothing here performs I/O; the `rowsync` facade executes the statements.

pub mod builder;
pub mod filter;
pub mod hstore;
pub mod relation;

pub use builder::{
    DeleteBuilder, InsertBuilder, Partition, SelectBuilder, Statement, Target, UpdateBuilder,
};
pub use filter::{Filter, compose};
pub use relation::{RelationScope, relation_conditions, relation_scope, singularize};
