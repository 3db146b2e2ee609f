//! The record capability.
//!
//! rowsync never assumes a fixed record shape. A caller's type only has to say
//! which resource it lives under, which attribute is its primary key, and hand
//! out its attribute map. [`DynamicRecord`] is the map-backed implementation
//! for callers without a typed model of their own.

use std::collections::BTreeMap;

use crate::value::Value;

/// Attribute name to value mapping, ordered by name.
pub type Attributes = BTreeMap<String, Value>;

/// Primary key attribute used when a record does not name one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Non-empty `/`-separated segments of a resource path.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Table name of a resource path: its last non-empty segment.
///
/// `"orgs/7/members"` and `"/members/"` both name table `members`.
pub fn table_name_of(path: &str) -> &str {
    path_segments(path).last().unwrap_or("")
}

/// A record that can be synchronized with a table row.
pub trait Record {
    /// Resource path of the record, e.g. `"people"` or `"orgs/7/members"`.
    fn resource_path(&self) -> &str;

    /// Attribute map.
    fn attributes(&self) -> &Attributes;

    /// Mutable attribute map.
    fn attributes_mut(&mut self) -> &mut Attributes;

    /// Table the record is stored in.
    fn table_name(&self) -> &str {
        table_name_of(self.resource_path())
    }

    /// Name of the primary key attribute.
    fn primary_key_name(&self) -> &str {
        DEFAULT_PRIMARY_KEY
    }

    /// Primary key value, if set.
    fn id(&self) -> Option<&Value> {
        self.attributes().get(self.primary_key_name())
    }

    /// Overwrite attributes with incoming values.
    fn merge_attributes(&mut self, incoming: Attributes) {
        self.attributes_mut().extend(incoming);
    }
}

/// A map-backed record for tables whose shape is only known at runtime.
///
/// # Example
///
/// ```
/// use rowsync_core::record::{DynamicRecord, Record};
/// use rowsync_core::value::Value;
///
/// let mut person = DynamicRecord::new("orgs/7/members");
/// person.set("name", "Alice");
/// person.set("nickname", "al");
///
/// assert_eq!(person.table_name(), "members");
/// assert_eq!(person.get("name").and_then(Value::as_str), Some("Alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicRecord {
    resource_path: String,
    primary_key: Option<String>,
    attributes: Attributes,
}

impl DynamicRecord {
    /// Create an empty record under the given resource path.
    pub fn new(resource_path: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            primary_key: None,
            attributes: Attributes::new(),
        }
    }

    /// Use a primary key attribute other than `id`.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Change the resource path.
    pub fn set_resource_path(&mut self, resource_path: impl Into<String>) {
        self.resource_path = resource_path.into();
    }

    /// Set an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Get an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Remove an attribute, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Check if an attribute is set.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

impl Record for DynamicRecord {
    fn resource_path(&self) -> &str {
        &self.resource_path
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn primary_key_name(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }
}
