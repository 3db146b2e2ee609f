//! Connection capabilities.
//!
//! rowsync does not speak any wire protocol itself. A driver provides a
//! [`Connection`] that can run one parameterized statement, and a pool or
//! factory provides a [`Connector`] that hands out connections per operation.

// Allow `impl Future` return types in trait methods - intentional for async trait compat
#![allow(clippy::manual_async_fn)]

use std::future::Future;
use std::sync::Arc;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// A database connection able to run one parameterized statement.
///
/// Placeholders use PostgreSQL's `$1, $2, ...` numbering and `params` are
/// bound positionally. Every statement rowsync issues returns rows (it always
/// asks for `RETURNING`), so this is the only method required.
pub trait Connection: Send + Sync {
    /// Execute `sql` with `params` and collect the result rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;
}

impl<C: Connection> Connection for Arc<C> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        (**self).query(cx, sql, params)
    }
}

/// Source of connections (a pool, a factory, or a single shared client).
///
/// A connector is asked for a connection at the start of every operation and
/// the connection is dropped at the end of it; rowsync never holds one across
/// operations.
pub trait Connector: Send + Sync {
    /// Connection type handed out.
    type Conn: Connection;

    /// Acquire a connection.
    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}

/// Connector that hands out clones of one prebuilt client.
///
/// Useful when the caller already owns a pooled handle that is cheap to clone.
#[derive(Debug, Clone)]
pub struct ClientConnector<C> {
    client: C,
}

impl<C: Connection + Clone> ClientConnector<C> {
    /// Wrap an existing client.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Borrow the wrapped client.
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: Connection + Clone> Connector for ClientConnector<C> {
    type Conn = C;

    fn connect(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        let client = self.client.clone();
        async move { Outcome::Ok(client) }
    }
}

/// Connector backed by a factory closure, typically a pool's acquire call.
///
/// # Example
///
/// ```ignore
/// let connector = FnConnector::new(|_cx: &Cx| async { pool_acquire().await });
/// ```
pub struct FnConnector<F> {
    factory: F,
}

impl<F> FnConnector<F> {
    /// Wrap a factory closure.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F, Fut, C> Connector for FnConnector<F>
where
    F: Fn(&Cx) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<C, Error>> + Send,
    C: Connection,
{
    type Conn = C;

    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send {
        (self.factory)(cx)
    }
}

impl<F> std::fmt::Debug for FnConnector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnConnector").finish_non_exhaustive()
    }
}
