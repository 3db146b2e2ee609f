//! Error types.
//!
//! Configuration and schema-mismatch errors are programmer errors and surface
//! before any statement reaches the database. Row-level and driver-level
//! failures are reported through an operation's `Outcome::Err`.

use std::fmt;

/// Result alias for synchronous rowsync APIs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed underlying cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable connection configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An attribute matches no declared column and extension storage is
    /// unavailable for the table.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        /// Table the record targets.
        table: String,
        /// Offending attribute name.
        column: String,
    },

    /// A read, update or delete matched zero rows.
    #[error("Not found: no row in '{table}' where {primary_key} = {id}")]
    NotFound {
        /// Table the record targets.
        table: String,
        /// Primary key column.
        primary_key: String,
        /// Rendered primary key value.
        id: String,
    },

    /// A driver-reported failure while executing a statement.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Failure acquiring a connection.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A sync method name that has no handler.
    #[error("unknown sync method '{0}'")]
    UnknownMethod(String),

    /// A result row could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Build a `NotFound` error.
    pub fn not_found(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        id: impl fmt::Display,
    ) -> Self {
        Error::NotFound {
            table: table.into(),
            primary_key: primary_key.into(),
            id: id.to_string(),
        }
    }

    /// Build a `ColumnNotFound` error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// True for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for `ColumnNotFound`.
    pub fn is_column_not_found(&self) -> bool {
        matches!(self, Error::ColumnNotFound { .. })
    }

    /// SQLSTATE code of a driver error, if one was reported.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }
}

/// Classification of a query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// SQL syntax error.
    Syntax,
    /// Constraint violation (unique, foreign key, not-null, check).
    Constraint,
    /// Referenced relation or column does not exist.
    UndefinedObject,
    /// Type mismatch or invalid input for a type.
    DataType,
    /// The statement was cancelled.
    Cancelled,
    /// Any other database-side failure.
    Database,
}

impl QueryErrorKind {
    /// Classify a PostgreSQL SQLSTATE code.
    pub fn from_sqlstate(code: &str) -> Self {
        match code.get(..2) {
            Some("42") if code == "42P01" || code == "42703" => QueryErrorKind::UndefinedObject,
            Some("42") => QueryErrorKind::Syntax,
            Some("23") => QueryErrorKind::Constraint,
            Some("22") => QueryErrorKind::DataType,
            Some("57") if code == "57014" => QueryErrorKind::Cancelled,
            _ => QueryErrorKind::Database,
        }
    }
}

/// Failure reported while executing a statement.
#[derive(Debug, thiserror::Error)]
#[error("query failed: {message}")]
pub struct QueryError {
    /// Failure classification.
    pub kind: QueryErrorKind,
    /// Human readable message from the driver.
    pub message: String,
    /// SQLSTATE code, when the server reported one.
    pub sqlstate: Option<String>,
    /// Statement text that failed.
    pub sql: Option<String>,
    /// Underlying driver error.
    #[source]
    pub source: Option<BoxError>,
}

impl QueryError {
    /// Create a query error with no SQLSTATE or cause.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sqlstate: None,
            sql: None,
            source: None,
        }
    }

    /// Attach a SQLSTATE code and reclassify from it.
    pub fn with_sqlstate(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.kind = QueryErrorKind::from_sqlstate(&code);
        self.sqlstate = Some(code);
        self
    }

    /// Attach the failing statement text.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Classification of a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Could not reach or open the database.
    Connect,
    /// Credentials were rejected.
    Authentication,
    /// The pool had no connection available.
    PoolExhausted,
    /// The connection was closed underneath us.
    Disconnected,
}

/// Failure acquiring a connection.
#[derive(Debug, thiserror::Error)]
#[error("connection failed: {message}")]
pub struct ConnectionError {
    /// Failure classification.
    pub kind: ConnectionErrorKind,
    /// Human readable message.
    pub message: String,
    /// Underlying cause.
    #[source]
    pub source: Option<BoxError>,
}

impl ConnectionError {
    /// Create a connection error with no cause.
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }
}
