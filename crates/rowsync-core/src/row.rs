//! Result rows.

use crate::error::{Error, Result};
use crate::record::Attributes;
use crate::value::Value;

/// A single row returned by a query, with its column names in result order.
///
/// Column names are not required to be unique: `SELECT *, x AS attributes`
/// can yield the same name twice. Lookups by name resolve to the **last**
/// column carrying that name, so an explicit alias shadows the raw column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from parallel column and value lists.
    ///
    /// Lists of different lengths are a driver fault and yield
    /// [`Error::Decode`].
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(Error::Decode(format!(
                "row has {} column names but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value at a column index.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the last column with the given name.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Iterate `(column, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Convert into an attribute map. Later duplicate columns win.
    pub fn into_attributes(self) -> Attributes {
        self.columns.into_iter().zip(self.values).collect()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter().zip(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_named_prefers_last_duplicate() {
        let row = Row::from_pairs([
            ("id", Value::BigInt(1)),
            ("attributes", Value::Text("raw".to_string())),
            ("attributes", Value::Text("aliased".to_string())),
        ]);
        assert_eq!(
            row.get_named("attributes"),
            Some(&Value::Text("aliased".to_string()))
        );
        assert_eq!(row.get_named("missing"), None);
    }

    #[test]
    fn test_into_attributes_last_duplicate_wins() {
        let row = Row::from_pairs([("a", 1i64), ("a", 2i64)]);
        let attrs = row.into_attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("a"), Some(&Value::BigInt(2)));
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let err = Row::new(
            vec!["a".to_string(), "b".to_string()],
            vec![Value::BigInt(1)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(ref m) if m.contains("2 column names but 1 values")));

        let row = Row::new(vec!["a".to_string()], vec![Value::BigInt(1)]).expect("row");
        assert_eq!(row.len(), 1);
        assert_eq!(row.columns(), &["a".to_string()]);
    }
}
