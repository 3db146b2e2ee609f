//! In-memory stand-in for a PostgreSQL connection.
//!
//! Understands the catalog query and the statement shapes the repository
//! generates, which is enough to exercise whole operations end to end.

#![allow(dead_code)]
#![allow(clippy::manual_async_fn)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use asupersync::Outcome;
use rowsync::{
    Attributes, ClientConnector, ColumnDef, Connection, Cx, Error, QueryError, QueryErrorKind,
    Repository, Row, SchemaCache, Value, hstore,
};
use rowsync_schema::CATALOG_QUERY;

pub type FakeRepository = Repository<ClientConnector<FakeDatabase>>;

struct FakeTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Attributes>,
    next_id: i64,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, FakeTable>,
    log: Vec<(String, Vec<Value>)>,
    catalog_queries: usize,
    fail_next: Option<QueryError>,
    text_arrays: bool,
}

#[derive(Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<State>>,
}

fn syntax_error(sql: &str) -> Error {
    Error::Query(
        QueryError::new(QueryErrorKind::Syntax, format!("fake database cannot run: {sql}"))
            .with_sqlstate("42601"),
    )
}

fn catalog_row(column: &ColumnDef) -> Row {
    Row::from_pairs([
        ("name", Value::from(column.name.as_str())),
        ("type", Value::from(column.sql_type.as_str())),
        ("default", Value::from(column.default.clone())),
        ("not_null", Value::Bool(column.not_null)),
    ])
}

/// `%#` form of a stored hstore value.
fn hstore_array(stored: Option<&Value>) -> Result<Value, Error> {
    let Some(Value::Text(text)) = stored else {
        return Ok(Value::Null);
    };
    let pairs = hstore::parse(text)?;
    Ok(Value::Array(
        pairs
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::Text(k), v.map_or(Value::Null, Value::Text)]))
            .collect(),
    ))
}

/// PostgreSQL array literal text, as a text-protocol driver returns it.
fn array_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Array(items) => format!(
            "{{{}}}",
            items.iter().map(array_literal).collect::<Vec<_>>().join(",")
        ),
        other => format!(
            "\"{}\"",
            other.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        ),
    }
}

fn parse_literal(literal: &str, params: &[Value]) -> Option<Value> {
    if let Some(n) = literal.strip_prefix('$') {
        let index: usize = n.parse().ok()?;
        return params.get(index.checked_sub(1)?).cloned();
    }
    if let Some(quoted) = literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Some(Value::Text(quoted.replace("''", "'")));
    }
    match literal {
        "TRUE" => Some(Value::Bool(true)),
        "FALSE" => Some(Value::Bool(false)),
        other => other.parse::<i64>().ok().map(Value::BigInt),
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    actual == expected || actual.to_string() == expected.to_string()
}

fn matches(row: &Attributes, where_clause: &str, params: &[Value]) -> Option<bool> {
    for condition in where_clause.split(" AND ") {
        if let Some(column) = condition.strip_suffix(" IS NULL") {
            if !row.get(column).is_none_or(Value::is_null) {
                return Some(false);
            }
            continue;
        }
        let (column, literal) = condition.split_once(" = ")?;
        let expected = parse_literal(literal, params)?;
        let actual = row.get(column).cloned().unwrap_or_default();
        if !loosely_equal(&actual, &expected) {
            return Some(false);
        }
    }
    Some(true)
}

impl FakeTable {
    fn output(&self, row: &Attributes, with_extension: bool) -> Result<Row, Error> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in &self.columns {
            columns.push(column.name.clone());
            values.push(row.get(&column.name).cloned().unwrap_or_default());
        }
        if with_extension {
            columns.push("attributes".to_string());
            values.push(hstore_array(row.get("attributes"))?);
        }
        Row::new(columns, values)
    }

    fn check_columns<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<(), Error> {
        for name in names {
            if !self.columns.iter().any(|c| &c.name == name) {
                return Err(Error::Query(
                    QueryError::new(
                        QueryErrorKind::UndefinedObject,
                        format!("column \"{name}\" does not exist"),
                    )
                    .with_sqlstate("42703"),
                ));
            }
        }
        Ok(())
    }
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake database lock")
    }

    /// Declare a table. Column `id` is filled from a sequence on insert.
    pub fn with_table(self, name: &str, columns: Vec<ColumnDef>) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            FakeTable {
                columns,
                rows: Vec::new(),
                next_id: 0,
            },
        );
        self
    }

    /// Return array columns as literal text instead of `Value::Array`.
    pub fn with_text_arrays(self) -> Self {
        self.lock().text_arrays = true;
        self
    }

    /// Store a row directly, bypassing the repository.
    pub fn seed(&self, table: &str, pairs: &[(&str, Value)]) {
        let mut state = self.lock();
        let table = state.tables.get_mut(table).expect("seeded table exists");
        let row: Attributes = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        if let Some(id) = row.get("id").and_then(Value::as_i64) {
            table.next_id = table.next_id.max(id);
        }
        table.rows.push(row);
    }

    /// Make the next non-catalog statement fail.
    pub fn fail_next(&self, error: QueryError) {
        self.lock().fail_next = Some(error);
    }

    pub fn rows(&self, table: &str) -> Vec<Attributes> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Every statement received, catalog queries included.
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().log.clone()
    }

    /// SQL of every non-catalog statement received.
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter(|(sql, _)| sql != CATALOG_QUERY)
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn catalog_queries(&self) -> usize {
        self.lock().catalog_queries
    }

    fn handle(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let rows = self.dispatch(sql, params)?;
        if !self.lock().text_arrays {
            return Ok(rows);
        }
        rows.into_iter()
            .map(|row| {
                let (columns, values): (Vec<String>, Vec<Value>) = row
                    .into_iter()
                    .map(|(column, value)| match value {
                        Value::Array(_) => (column, Value::Text(array_literal(&value))),
                        other => (column, other),
                    })
                    .unzip();
                Row::new(columns, values)
            })
            .collect()
    }

    fn dispatch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let mut state = self.lock();
        state.log.push((sql.to_string(), params.to_vec()));

        if sql == CATALOG_QUERY {
            state.catalog_queries += 1;
            let table = params.first().and_then(Value::as_str).unwrap_or_default();
            let Some(table) = state.tables.get(table) else {
                return Err(Error::Query(
                    QueryError::new(
                        QueryErrorKind::UndefinedObject,
                        format!("relation \"{table}\" does not exist"),
                    )
                    .with_sqlstate("42P01"),
                ));
            };
            return Ok(table.columns.iter().map(catalog_row).collect());
        }

        if let Some(error) = state.fail_next.take() {
            return Err(Error::Query(error));
        }

        let with_extension = sql.contains("%# attributes AS attributes");
        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            Self::insert(&mut state, sql, rest, params, with_extension)
        } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
            Self::update(&mut state, sql, rest, params, with_extension)
        } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            Self::delete(&mut state, sql, rest, params)
        } else if sql.starts_with("SELECT *") {
            Self::select(&state, sql, params, with_extension)
        } else {
            Err(syntax_error(sql))
        }
    }

    fn insert(
        state: &mut State,
        sql: &str,
        rest: &str,
        params: &[Value],
        with_extension: bool,
    ) -> Result<Vec<Row>, Error> {
        let (table_name, rest) = rest.split_once(' ').ok_or_else(|| syntax_error(sql))?;
        let table = state
            .tables
            .get_mut(table_name)
            .ok_or_else(|| syntax_error(sql))?;

        let mut row = Attributes::new();
        if let Some(columns) = rest.strip_prefix('(') {
            let (columns, _) = columns.split_once(')').ok_or_else(|| syntax_error(sql))?;
            for (i, column) in columns.split(", ").enumerate() {
                let value = params.get(i).cloned().ok_or_else(|| syntax_error(sql))?;
                row.insert(column.to_string(), value);
            }
        }
        table.check_columns(row.keys())?;

        let has_id = table.columns.iter().any(|c| c.name == "id");
        if has_id && !row.contains_key("id") {
            table.next_id += 1;
            row.insert("id".to_string(), Value::BigInt(table.next_id));
        }
        let output = table.output(&row, with_extension)?;
        table.rows.push(row);
        Ok(vec![output])
    }

    fn update(
        state: &mut State,
        sql: &str,
        rest: &str,
        params: &[Value],
        with_extension: bool,
    ) -> Result<Vec<Row>, Error> {
        let (table_name, rest) = rest.split_once(" SET ").ok_or_else(|| syntax_error(sql))?;
        let (assignments, rest) = rest.split_once(" WHERE ").ok_or_else(|| syntax_error(sql))?;
        let (where_clause, _) = rest
            .split_once(" RETURNING ")
            .ok_or_else(|| syntax_error(sql))?;
        let table = state
            .tables
            .get_mut(table_name)
            .ok_or_else(|| syntax_error(sql))?;

        let mut changes = Attributes::new();
        for assignment in assignments.split(", ") {
            let (column, rhs) = assignment.split_once(" = ").ok_or_else(|| syntax_error(sql))?;
            if rhs.starts_with('$') {
                let value = parse_literal(rhs, params).ok_or_else(|| syntax_error(sql))?;
                changes.insert(column.to_string(), value);
            }
        }
        table.check_columns(changes.keys())?;

        let mut updated = Vec::new();
        for row in &mut table.rows {
            if matches(row, where_clause, params).ok_or_else(|| syntax_error(sql))? {
                row.extend(changes.clone());
                updated.push(row.clone());
            }
        }
        updated
            .iter()
            .map(|row| table.output(row, with_extension))
            .collect()
    }

    fn delete(
        state: &mut State,
        sql: &str,
        rest: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, Error> {
        let (table_name, rest) = rest.split_once(" WHERE ").ok_or_else(|| syntax_error(sql))?;
        let (where_clause, returning) = rest
            .split_once(" RETURNING ")
            .ok_or_else(|| syntax_error(sql))?;
        let table = state
            .tables
            .get_mut(table_name)
            .ok_or_else(|| syntax_error(sql))?;

        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for row in table.rows.drain(..) {
            if matches(&row, where_clause, params).ok_or_else(|| syntax_error(sql))? {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        table.rows = kept;

        Ok(removed
            .iter()
            .map(|row| {
                Row::from_pairs([(returning, row.get(returning).cloned().unwrap_or_default())])
            })
            .collect())
    }

    fn select(
        state: &State,
        sql: &str,
        params: &[Value],
        with_extension: bool,
    ) -> Result<Vec<Row>, Error> {
        let (_, after_from) = sql.split_once(" FROM ").ok_or_else(|| syntax_error(sql))?;
        let (body, order_by) = match after_from.split_once(" ORDER BY ") {
            Some((body, order_by)) => (body, Some(order_by)),
            None => (after_from, None),
        };
        let (table_name, where_clause) = match body.split_once(" WHERE ") {
            Some((table_name, where_clause)) => (table_name, Some(where_clause)),
            None => (body, None),
        };
        let table = state
            .tables
            .get(table_name)
            .ok_or_else(|| syntax_error(sql))?;

        let mut selected = Vec::new();
        for row in &table.rows {
            let keep = match where_clause {
                Some(clause) => matches(row, clause, params).ok_or_else(|| syntax_error(sql))?,
                None => true,
            };
            if keep {
                selected.push(row);
            }
        }
        if let Some(column) = order_by {
            selected.sort_by_key(|row| row.get(column).and_then(Value::as_i64));
        }

        selected
            .into_iter()
            .map(|row| table.output(row, with_extension))
            .collect()
    }
}

impl Connection for FakeDatabase {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.handle(sql, params);
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows),
                Err(e) => Outcome::Err(e),
            }
        }
    }
}

/// Repository over `db` with a private schema cache.
pub fn repository(db: &FakeDatabase, extension_storage: bool) -> FakeRepository {
    Repository::builder()
        .connector(ClientConnector::new(db.clone()))
        .extension_storage(extension_storage)
        .schema_cache(Arc::new(SchemaCache::new()))
        .build()
        .expect("build repository")
}

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        Outcome::Ok(v) => panic!("expected an error, got {v:?}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn people_columns(with_extension: bool) -> Vec<ColumnDef> {
    let mut columns = vec![
        ColumnDef::new("id", "integer")
            .not_null()
            .with_default("nextval('people_id_seq'::regclass)"),
        ColumnDef::new("name", "text"),
    ];
    if with_extension {
        columns.push(ColumnDef::new("attributes", "hstore"));
    }
    columns
}

pub fn members_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("id", "integer").not_null(),
        ColumnDef::new("name", "character varying(64)"),
        ColumnDef::new("org_id", "integer"),
    ]
}
