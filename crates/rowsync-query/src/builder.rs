//! Statement builders for SELECT, INSERT, UPDATE and DELETE.
//!
//! Every builder works against a [`Target`]: the table's discovered schema, the
//! primary key name and the extension column settings. Attribute values are
//! always bound as `$n` parameters; only filter literals are inlined.
//!
//! - Declared columns come from the schema, never from the record.
//! - Attributes without a column go to the extension column when storage is
//!   enabled, and are rejected with `ColumnNotFound` otherwise.
//! - Statements against a table with an extension column also return it in
//!   `%#` array form under its own name.

use std::fmt;

use rowsync_core::{Attributes, Error, ExtensionColumn, Result, TableSchema, Value};

use crate::filter::{Filter, compose};
use crate::hstore;

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `$1..$n` placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

impl Statement {
    /// Create a statement.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// JSON form `{"text": ..., "values": [...]}` used by debug output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "text": self.sql,
            "values": self.params.iter().map(Value::to_json).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// The table a statement is built for.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    schema: &'a TableSchema,
    primary_key: &'a str,
    extension: &'a ExtensionColumn,
    extension_storage: bool,
}

impl<'a> Target<'a> {
    /// Target a table with extension storage disabled.
    pub fn new(
        schema: &'a TableSchema,
        primary_key: &'a str,
        extension: &'a ExtensionColumn,
    ) -> Self {
        Self {
            schema,
            primary_key,
            extension,
            extension_storage: false,
        }
    }

    /// Allow undeclared attributes to be folded into the extension column.
    pub fn extension_storage(mut self, enabled: bool) -> Self {
        self.extension_storage = enabled;
        self
    }

    /// Table name.
    pub fn table(&self) -> &'a str {
        self.schema.table_name()
    }

    /// Table schema.
    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &'a str {
        self.primary_key
    }

    /// Whether the table carries the extension column.
    pub fn has_extension(&self) -> bool {
        self.schema.has_extension(self.extension)
    }

    /// Whether undeclared attributes are written to the extension column.
    pub fn stores_extension(&self) -> bool {
        self.extension_storage && self.has_extension()
    }

    /// `, %# attributes AS attributes` when the table has the extension column.
    fn extension_select(&self) -> String {
        if self.has_extension() {
            format!(", %# {0} AS {0}", self.extension.name)
        } else {
            String::new()
        }
    }
}

/// Record attributes split by where they are written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    /// Declared columns in attribute order, with their values.
    pub columns: Vec<(String, Value)>,
    /// Undeclared attributes bound for the extension column.
    pub extension: Attributes,
}

impl Partition {
    /// Split attributes against a target, optionally leaving out the primary key.
    ///
    /// An attribute named like the extension column itself is never written
    /// directly; the column is managed by the codec.
    pub fn split(target: &Target<'_>, attributes: &Attributes, skip_primary_key: bool) -> Result<Self> {
        let mut partition = Self::default();
        let has_extension = target.has_extension();

        for (name, value) in attributes {
            if skip_primary_key && name == target.primary_key() {
                continue;
            }
            if has_extension && *name == target.extension.name {
                tracing::debug!(
                    table = target.table(),
                    column = %name,
                    "Ignoring attribute shadowing the extension column"
                );
                continue;
            }
            if target.schema.has_column(name) {
                partition.columns.push((name.clone(), value.clone()));
            } else if target.stores_extension() {
                partition.extension.insert(name.clone(), value.clone());
            } else {
                return Err(Error::column_not_found(target.table(), name.clone()));
            }
        }

        if !partition.extension.is_empty() {
            partition.columns.push((
                target.extension.name.clone(),
                Value::Text(hstore::encode(&partition.extension)),
            ));
        }
        Ok(partition)
    }
}

/// SELECT builder for one row by primary key, or a whole scoped table.
#[derive(Debug, Clone)]
pub struct SelectBuilder<'a> {
    target: Target<'a>,
    id: Option<&'a Value>,
    filter: Option<&'a Filter>,
    relation: Option<&'a Attributes>,
}

impl<'a> SelectBuilder<'a> {
    /// Select the row whose primary key equals `id`.
    pub fn one(target: Target<'a>, id: &'a Value) -> Self {
        Self {
            target,
            id: Some(id),
            filter: None,
            relation: None,
        }
    }

    /// Select every row, ordered by primary key.
    pub fn collection(target: Target<'a>) -> Self {
        Self {
            target,
            id: None,
            filter: None,
            relation: None,
        }
    }

    /// Add a caller filter.
    pub fn filter(mut self, filter: Option<&'a Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Add relation conditions.
    pub fn relation(mut self, relation: &'a Attributes) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Build the SQL and parameters.
    pub fn build(&self) -> Statement {
        let empty = Attributes::new();
        let relation = self.relation.unwrap_or(&empty);
        let table = self.target.table();
        let pk = self.target.primary_key();

        match self.id {
            Some(id) => {
                let conds = compose(self.filter, relation, self.target.schema(), " AND ");
                Statement::new(
                    format!(
                        "SELECT *{} FROM {table} WHERE {pk} = $1{conds}",
                        self.target.extension_select()
                    ),
                    vec![id.clone()],
                )
            }
            None => {
                let conds = compose(self.filter, relation, self.target.schema(), " WHERE ");
                Statement::new(
                    format!("SELECT * FROM {table}{conds} ORDER BY {pk}"),
                    Vec::new(),
                )
            }
        }
    }
}

/// INSERT builder.
///
/// Relation conditions must already be part of `attributes`.
#[derive(Debug, Clone)]
pub struct InsertBuilder<'a> {
    target: Target<'a>,
    attributes: &'a Attributes,
}

impl<'a> InsertBuilder<'a> {
    /// Insert a row with the given attributes.
    pub fn new(target: Target<'a>, attributes: &'a Attributes) -> Self {
        Self { target, attributes }
    }

    /// Build the SQL and parameters.
    pub fn build(&self) -> Result<Statement> {
        let partition = Partition::split(&self.target, self.attributes, false)?;
        let table = self.target.table();
        let returning = format!(" RETURNING *{}", self.target.extension_select());

        if partition.columns.is_empty() {
            return Ok(Statement::new(
                format!("INSERT INTO {table} DEFAULT VALUES{returning}"),
                Vec::new(),
            ));
        }

        let mut names = Vec::with_capacity(partition.columns.len());
        let mut placeholders = Vec::with_capacity(partition.columns.len());
        let mut params = Vec::with_capacity(partition.columns.len());
        for (i, (name, value)) in partition.columns.into_iter().enumerate() {
            names.push(name);
            placeholders.push(format!("${}", i + 1));
            params.push(value);
        }

        Ok(Statement::new(
            format!(
                "INSERT INTO {table} ({}) VALUES ({}){returning}",
                names.join(", "),
                placeholders.join(", ")
            ),
            params,
        ))
    }
}

/// UPDATE builder for one row by primary key.
///
/// The primary key is never assigned and is always the last parameter.
#[derive(Debug, Clone)]
pub struct UpdateBuilder<'a> {
    target: Target<'a>,
    attributes: &'a Attributes,
    id: &'a Value,
    relation: Option<&'a Attributes>,
}

impl<'a> UpdateBuilder<'a> {
    /// Update the row whose primary key equals `id`.
    pub fn new(target: Target<'a>, attributes: &'a Attributes, id: &'a Value) -> Self {
        Self {
            target,
            attributes,
            id,
            relation: None,
        }
    }

    /// Restrict the update to rows matching relation conditions.
    pub fn relation(mut self, relation: &'a Attributes) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Build the SQL and parameters.
    pub fn build(&self) -> Result<Statement> {
        let partition = Partition::split(&self.target, self.attributes, true)?;
        let table = self.target.table();
        let pk = self.target.primary_key();

        let mut assignments = Vec::with_capacity(partition.columns.len());
        let mut params = Vec::with_capacity(partition.columns.len() + 1);
        for (i, (name, value)) in partition.columns.into_iter().enumerate() {
            assignments.push(format!("{name} = ${}", i + 1));
            params.push(value);
        }
        if assignments.is_empty() {
            assignments.push(format!("{pk} = {pk}"));
        }
        params.push(self.id.clone());

        let empty = Attributes::new();
        let conds = compose(
            None,
            self.relation.unwrap_or(&empty),
            self.target.schema(),
            " AND ",
        );

        Ok(Statement::new(
            format!(
                "UPDATE {table} SET {} WHERE {pk} = ${}{conds} RETURNING *{}",
                assignments.join(", "),
                params.len(),
                self.target.extension_select()
            ),
            params,
        ))
    }
}

/// DELETE builder for one row by primary key.
#[derive(Debug, Clone)]
pub struct DeleteBuilder<'a> {
    target: Target<'a>,
    id: &'a Value,
    filter: Option<&'a Filter>,
    relation: Option<&'a Attributes>,
}

impl<'a> DeleteBuilder<'a> {
    /// Delete the row whose primary key equals `id`.
    pub fn new(target: Target<'a>, id: &'a Value) -> Self {
        Self {
            target,
            id,
            filter: None,
            relation: None,
        }
    }

    /// Add a caller filter.
    pub fn filter(mut self, filter: Option<&'a Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Add relation conditions.
    pub fn relation(mut self, relation: &'a Attributes) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Build the SQL and parameters.
    pub fn build(&self) -> Statement {
        let empty = Attributes::new();
        let conds = compose(
            self.filter,
            self.relation.unwrap_or(&empty),
            self.target.schema(),
            " AND ",
        );
        let table = self.target.table();
        let pk = self.target.primary_key();

        Statement::new(
            format!("DELETE FROM {table} WHERE {pk} = $1{conds} RETURNING {pk}"),
            vec![self.id.clone()],
        )
    }
}
