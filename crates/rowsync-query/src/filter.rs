//! Filter composition.
//!
//! Filter values are inlined into the SQL text rather than bound, with quoting
//! chosen from the column's declared type. [`Filter::Raw`] conditions are copied
//! verbatim and must come from trusted code.

use rowsync_core::{Attributes, TableSchema, Value};

/// Caller-supplied row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = literal` conditions.
    Equals(Attributes),
    /// Pre-built SQL conditions, inserted unmodified.
    Raw(Vec<String>),
}

impl Filter {
    /// Equality filter from `(column, value)` pairs.
    pub fn equals<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Equals(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Raw filter from condition strings.
    pub fn raw<I, S>(conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Raw(conditions.into_iter().map(Into::into).collect())
    }

    /// True if the filter contributes no condition.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Equals(map) => map.is_empty(),
            Self::Raw(conditions) => conditions.is_empty(),
        }
    }
}

/// Single-quote a string literal, doubling embedded quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render a value as an SQL literal for `column`.
pub fn literal(schema: &TableSchema, column: &str, value: &Value) -> String {
    let character_column = schema
        .column(column)
        .is_some_and(|c| c.is_character_string());

    match value {
        Value::Null => "NULL".to_string(),
        Value::Text(s) => quote_literal(s),
        Value::Json(j) => quote_literal(&j.to_string()),
        Value::Array(_) => quote_literal(&value.to_string()),
        other if character_column => quote_literal(&other.to_string()),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::BigInt(i) => i.to_string(),
        Value::Double(f) if f.is_finite() => f.to_string(),
        Value::Double(f) if f.is_nan() => quote_literal("NaN"),
        Value::Double(f) if *f > 0.0 => quote_literal("Infinity"),
        Value::Double(_) => quote_literal("-Infinity"),
    }
}

/// One equality condition. Null compares with `IS NULL`.
pub fn condition(schema: &TableSchema, column: &str, value: &Value) -> String {
    if value.is_null() {
        format!("{column} IS NULL")
    } else {
        format!("{column} = {}", literal(schema, column, value))
    }
}

/// Combine an optional caller filter with relation conditions.
///
/// Returns `prefix` followed by the AND-joined conditions, or an empty string
/// when there are none. The caller passes `" WHERE "` or `" AND "` depending on
/// what precedes the fragment.
pub fn compose(
    filter: Option<&Filter>,
    relation: &Attributes,
    schema: &TableSchema,
    prefix: &str,
) -> String {
    let mut conditions: Vec<String> = match filter {
        Some(Filter::Raw(raw)) => raw.clone(),
        Some(Filter::Equals(map)) => map
            .iter()
            .map(|(column, value)| condition(schema, column, value))
            .collect(),
        None => Vec::new(),
    };
    conditions.extend(
        relation
            .iter()
            .map(|(column, value)| condition(schema, column, value)),
    );

    if conditions.is_empty() {
        String::new()
    } else {
        format!("{prefix}{}", conditions.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::ColumnDef;

    fn schema() -> TableSchema {
        TableSchema::new(
            "members",
            vec![
                ColumnDef::new("id", "integer"),
                ColumnDef::new("name", "character varying(64)"),
                ColumnDef::new("code", "text"),
                ColumnDef::new("org_id", "integer"),
                ColumnDef::new("active", "boolean"),
            ],
        )
    }

    #[test]
    fn test_empty_compose() {
        assert_eq!(compose(None, &Attributes::new(), &schema(), " WHERE "), "");
        let empty = Filter::equals(Vec::<(String, Value)>::new());
        assert!(empty.is_empty());
        assert_eq!(
            compose(Some(&empty), &Attributes::new(), &schema(), " AND "),
            ""
        );
    }

    #[test]
    fn test_equality_quoting_by_type() {
        let filter = Filter::equals([
            ("active", Value::Bool(true)),
            ("code", Value::BigInt(12)),
            ("name", Value::from("O'Brien")),
            ("org_id", Value::BigInt(7)),
        ]);
        let sql = compose(Some(&filter), &Attributes::new(), &schema(), " WHERE ");
        assert_eq!(
            sql,
            " WHERE active = TRUE AND code = '12' AND name = 'O''Brien' AND org_id = 7"
        );
    }

    #[test]
    fn test_text_value_on_unknown_column_quoted() {
        let filter = Filter::equals([("nickname", "al")]);
        let sql = compose(Some(&filter), &Attributes::new(), &schema(), " WHERE ");
        assert_eq!(sql, " WHERE nickname = 'al'");
    }

    #[test]
    fn test_null_uses_is_null() {
        let filter = Filter::equals([("name", Value::Null)]);
        let sql = compose(Some(&filter), &Attributes::new(), &schema(), " AND ");
        assert_eq!(sql, " AND name IS NULL");
    }

    #[test]
    fn test_relation_appended_after_filter() {
        let filter = Filter::equals([("active", false)]);
        let relation = Attributes::from([("org_id".to_string(), Value::BigInt(7))]);
        let sql = compose(Some(&filter), &relation, &schema(), " WHERE ");
        assert_eq!(sql, " WHERE active = FALSE AND org_id = 7");

        let sql = compose(None, &relation, &schema(), " AND ");
        assert_eq!(sql, " AND org_id = 7");
    }

    #[test]
    fn test_raw_conditions_verbatim() {
        let filter = Filter::raw(["created_at > now() - interval '1 day'", "id % 2 = 0"]);
        let relation = Attributes::from([("org_id".to_string(), Value::BigInt(3))]);
        let sql = compose(Some(&filter), &relation, &schema(), " WHERE ");
        assert_eq!(
            sql,
            " WHERE created_at > now() - interval '1 day' AND id % 2 = 0 AND org_id = 3"
        );
    }
}
