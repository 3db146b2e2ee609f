//! PostgreSQL catalog introspection.

use asupersync::{Cx, Outcome};
use rowsync_core::{ColumnDef, Connection, Error, Result, Row, Value};

/// Column metadata of one table, in attribute order.
///
/// The table name is bound as `$1` and resolved through `regclass`, so it may be
/// schema-qualified.
pub const CATALOG_QUERY: &str = "SELECT a.attname AS name, \
format_type(a.atttypid, a.atttypmod) AS type, \
pg_get_expr(d.adbin, d.adrelid) AS default, \
a.attnotnull AS not_null \
FROM pg_attribute a \
LEFT JOIN pg_attrdef d ON a.attrelid = d.adrelid AND a.attnum = d.adnum \
WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attnum";

fn text_field<'r>(row: &'r Row, field: &str) -> Result<&'r str> {
    match row.get_named(field) {
        Some(Value::Text(s)) => Ok(s),
        Some(other) => Err(Error::Decode(format!(
            "catalog column '{field}' has unexpected {} value",
            other.kind()
        ))),
        None => Err(Error::Decode(format!("catalog row is missing '{field}'"))),
    }
}

fn bool_field(row: &Row, field: &str) -> Result<bool> {
    match row.get_named(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Text(s)) => match s.as_str() {
            "t" | "true" => Ok(true),
            "f" | "false" => Ok(false),
            _ => Err(Error::Decode(format!(
                "catalog column '{field}' is not a boolean: {s}"
            ))),
        },
        Some(Value::Null) | None => Ok(false),
        Some(other) => Err(Error::Decode(format!(
            "catalog column '{field}' has unexpected {} value",
            other.kind()
        ))),
    }
}

/// Convert catalog rows into column definitions.
pub fn columns_from_rows(rows: &[Row]) -> Result<Vec<ColumnDef>> {
    rows.iter()
        .map(|row| -> Result<ColumnDef> {
            let mut column = ColumnDef::new(text_field(row, "name")?, text_field(row, "type")?);
            column.default = match row.get_named("default") {
                Some(Value::Text(expr)) => Some(expr.clone()),
                _ => None,
            };
            column.not_null = bool_field(row, "not_null")?;
            Ok(column)
        })
        .collect()
}

/// Query the catalog for a table's columns.
///
/// An unknown table surfaces as the driver's error (PostgreSQL rejects the
/// `regclass` cast); callers decide whether that is fatal.
pub async fn introspect<C: Connection>(
    cx: &Cx,
    conn: &C,
    table: &str,
) -> Outcome<Vec<ColumnDef>, Error> {
    let params = [Value::Text(table.to_string())];
    match conn.query(cx, CATALOG_QUERY, &params).await {
        Outcome::Ok(rows) => match columns_from_rows(&rows) {
            Ok(columns) => Outcome::Ok(columns),
            Err(e) => Outcome::Err(e),
        },
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}
