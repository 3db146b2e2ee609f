//! Record collections.

use std::fmt;

use rowsync_core::{Record, Row, table_name_of};
use rowsync_query::relation_conditions;

type FetchedListener = Box<dyn Fn(&[Row]) + Send + Sync>;

/// An ordered set of records sharing one resource path.
///
/// Table, primary key and resource path default to those of `R::default()`
/// and can be overridden per collection. Records added to a nested collection
/// (`orgs/7/members`) are stamped with the parent scope (`org_id = 7`).
pub struct Collection<R> {
    resource_path: Option<String>,
    primary_key: Option<String>,
    records: Vec<R>,
    fetched: Vec<FetchedListener>,
}

impl<R: Record + Default> Collection<R> {
    /// Empty collection at the record type's own resource path.
    pub fn new() -> Self {
        Self {
            resource_path: None,
            primary_key: None,
            records: Vec::new(),
            fetched: Vec::new(),
        }
    }

    /// Empty collection at a specific resource path.
    pub fn at(resource_path: impl Into<String>) -> Self {
        let mut collection = Self::new();
        collection.resource_path = Some(resource_path.into());
        collection
    }

    /// Override the primary key used for ordering.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    /// Resource path of the collection.
    pub fn resource_path(&self) -> String {
        match &self.resource_path {
            Some(path) => path.clone(),
            None => R::default().resource_path().to_string(),
        }
    }

    /// Table the collection reads from.
    pub fn table_name(&self) -> String {
        table_name_of(&self.resource_path()).to_string()
    }

    /// Primary key column.
    pub fn primary_key_name(&self) -> String {
        match &self.primary_key {
            Some(pk) => pk.clone(),
            None => R::default().primary_key_name().to_string(),
        }
    }

    /// Add a record, stamping it with the collection's parent scope.
    pub fn add(&mut self, mut record: R) -> &mut R {
        let relation = relation_conditions(&self.resource_path());
        record.attributes_mut().extend(relation);
        self.records.push(record);
        let last = self.records.len() - 1;
        &mut self.records[last]
    }

    /// Register a listener called with the raw rows of every successful read.
    pub fn on_fetched<F>(&mut self, listener: F)
    where
        F: Fn(&[Row]) + Send + Sync + 'static,
    {
        self.fetched.push(Box::new(listener));
    }

    pub(crate) fn notify_fetched(&self, rows: &[Row]) {
        for listener in &self.fetched {
            listener(rows);
        }
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Mutable access to the records.
    pub fn records_mut(&mut self) -> &mut [R] {
        &mut self.records
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Record + Default> Default for Collection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: fmt::Debug> fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("resource_path", &self.resource_path)
            .field("primary_key", &self.primary_key)
            .field("records", &self.records)
            .field("fetched_listeners", &self.fetched.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::{DynamicRecord, Value};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_stamps_parent_scope() {
        let mut members: Collection<DynamicRecord> = Collection::at("orgs/7/members");
        let added = members.add(DynamicRecord::new("orgs/7/members").with("name", "Ann"));
        assert_eq!(added.get("org_id"), Some(&Value::BigInt(7)));
        assert_eq!(members.len(), 1);
        assert_eq!(members.table_name(), "members");
    }

    #[test]
    fn test_unscoped_add_leaves_record() {
        let mut people: Collection<DynamicRecord> = Collection::at("people");
        people.add(DynamicRecord::new("people").with("name", "Bo"));
        assert_eq!(people.records()[0].attributes().len(), 1);
    }

    #[test]
    fn test_defaults_from_representative() {
        let people: Collection<DynamicRecord> = Collection::new();
        assert_eq!(people.primary_key_name(), "id");
        assert_eq!(people.resource_path(), "");

        let keyed: Collection<DynamicRecord> = Collection::at("people").with_primary_key("person_no");
        assert_eq!(keyed.primary_key_name(), "person_no");
    }

    #[test]
    fn test_fetched_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut people: Collection<DynamicRecord> = Collection::at("people");
        let seen = Arc::clone(&calls);
        people.on_fetched(move |rows| {
            seen.fetch_add(rows.len(), Ordering::SeqCst);
        });
        people.notify_fetched(&[Row::from_pairs([("id", Value::BigInt(1))])]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
