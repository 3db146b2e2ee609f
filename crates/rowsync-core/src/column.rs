//! Discovered column metadata.
//!
//! Unlike compile-time models, rowsync learns a table's columns at runtime from
//! the database catalog. `ColumnDef` keeps the catalog's own spelling of the
//! type (`character varying(64)`, `hstore`, ...) and classifies it on demand.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default name of the extension column.
pub const EXTENSION_COLUMN: &str = "attributes";

/// Default SQL type of the extension column.
pub const EXTENSION_TYPE: &str = "hstore";

/// Matches types of the character-string family as printed by `format_type`.
fn character_type_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^(text|citext|name|character varying|varchar|character|char|bpchar)(\(\d+\))?$")
                .ok()
        })
        .as_ref()
}

/// A column definition discovered from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name in the database.
    pub name: String,
    /// SQL type as printed by the catalog.
    pub sql_type: String,
    /// Default value expression.
    pub default: Option<String>,
    /// Whether the column is declared `NOT NULL`.
    pub not_null: bool,
}

impl ColumnDef {
    /// Create a nullable column with no default.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            default: None,
            not_null: false,
        }
    }

    /// Mark as `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether the type belongs to the character-string family.
    ///
    /// Filter literals for these columns are emitted single-quoted.
    pub fn is_character_string(&self) -> bool {
        let ty = self.sql_type.trim().to_ascii_lowercase();
        character_type_pattern().is_some_and(|re| re.is_match(&ty))
    }
}

/// The designated key-value column that absorbs undeclared attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionColumn {
    /// Column name.
    pub name: String,
    /// SQL type marking key-value storage.
    pub sql_type: String,
}

impl Default for ExtensionColumn {
    fn default() -> Self {
        Self {
            name: EXTENSION_COLUMN.to_string(),
            sql_type: EXTENSION_TYPE.to_string(),
        }
    }
}

impl ExtensionColumn {
    /// Whether a column definition is this extension column.
    pub fn matches(&self, column: &ColumnDef) -> bool {
        column.name == self.name && column.sql_type.eq_ignore_ascii_case(&self.sql_type)
    }
}

/// Ordered column definitions of one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    table_name: String,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a schema from catalog columns in attribute order.
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// A schema with no declared columns.
    ///
    /// This is what a failed introspection degrades to: every attribute is then
    /// routed to the extension column or rejected.
    pub fn empty(table_name: impl Into<String>) -> Self {
        Self::new(table_name, Vec::new())
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column definitions in attribute order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// True if no columns are declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with this name is declared.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in attribute order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether the table carries the given extension column.
    pub fn has_extension(&self, extension: &ExtensionColumn) -> bool {
        self.columns.iter().any(|c| extension.matches(c))
    }
}
