//! Schema-tolerant record synchronization for PostgreSQL.
//!
//! `rowsync` maps records onto table rows without requiring every attribute to
//! have a declared column. Column metadata is discovered from the catalog on
//! first use; attributes the table does not declare can spill into a single
//! `attributes hstore` column and come back with their original kinds.
//!
//! # Role In The Architecture
//!
//! - **Facade**: re-exports the core types, the statement layer and the schema
//!   cache so applications depend on one crate.
//! - **Dispatcher**: [`Repository`] runs `read`, `create`, `update`, `delete`
//!   and `read_collection`, each reporting a single `Outcome`.
//! - **Scoping**: records under `orgs/7/members` are filtered and stamped with
//!   `org_id = 7` automatically.
//!
//! # Example
//!
//! ```ignore
//! use rowsync::prelude::*;
//!
//! let repo = Repository::builder()
//!     .connector(ClientConnector::new(client))
//!     .extension_storage(true)
//!     .build()?;
//!
//! let mut member = DynamicRecord::new("orgs/7/members")
//!     .with("name", "Ann")
//!     .with("nickname", "annie");
//!
//! match repo.create(&cx, &mut member, &SyncOptions::new()).await {
//!     Outcome::Ok(stored) => println!("created {:?}", stored.get("id")),
//!     Outcome::Err(e) => eprintln!("create failed: {e}"),
//!     Outcome::Cancelled(_) | Outcome::Panicked(_) => {}
//! }
//! ```

pub mod collection;
pub mod config;
pub mod method;
pub mod options;
pub mod repository;

pub use collection::Collection;
pub use config::SyncConfig;
pub use method::SyncMethod;
pub use options::{DebugSink, SyncOptions};
pub use repository::{INTROSPECT_STEP, Repository, RepositoryBuilder};

pub use rowsync_core::{
    Attributes, ClientConnector, ColumnDef, Connection, ConnectionError, ConnectionErrorKind,
    Connector, Cx, DynamicRecord, Error, ExtensionColumn, FnConnector, Outcome, QueryError,
    QueryErrorKind, Record, Result, Row, TableSchema, Value,
};
pub use rowsync_query::{Filter, Statement, hstore, relation_conditions};
pub use rowsync_schema::SchemaCache;

/// Everything needed to run operations against a repository.
pub mod prelude {
    pub use crate::{
        Attributes, ClientConnector, Collection, Connection, Connector, Cx, DynamicRecord, Error,
        Filter, FnConnector, Outcome, Record, Repository, Row, SyncConfig, SyncMethod,
        SyncOptions, Value,
    };
}
