//! Per-call options.

use std::fmt;
use std::sync::Arc;

use rowsync_query::{Filter, Statement};

/// Receives every statement right before it is executed.
///
/// The first argument names the step: `read`, `create`, `update`, `delete`,
/// `read_collection`, or `introspect` for the catalog query.
pub type DebugSink = Arc<dyn Fn(&str, &Statement) + Send + Sync>;

/// Options for one repository operation.
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Extra row filter. Relation scoping is added on top of it.
    pub filter: Option<Filter>,
    /// Debug sink overriding the repository's.
    pub debug: Option<DebugSink>,
}

impl SyncOptions {
    /// Options with no filter and the repository's debug sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Override the debug sink for this call.
    pub fn debug<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str, &Statement) + Send + Sync + 'static,
    {
        self.debug = Some(Arc::new(sink));
        self
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("filter", &self.filter)
            .field("debug", &self.debug.is_some())
            .finish()
    }
}
