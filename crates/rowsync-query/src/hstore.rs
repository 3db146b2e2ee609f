//! Extension attribute codec.
//!
//! Attributes that have no declared column are stored together in one `hstore`
//! column. hstore only holds text, so every value is written as its JSON text
//! and read back through a JSON parse:
//!
//! | value kind           | stored as                  |
//! |----------------------|----------------------------|
//! | boolean              | `"true"` / `"false"`       |
//! | finite number        | `"42"`, `"1.5"`            |
//! | non-finite number    | `NULL`                     |
//! | text                 | `"\"text\""` (JSON string) |
//! | object / array       | `"{\"a\":1}"`              |
//! | SQL / JSON null      | `NULL`                     |
//!
//! Storing text as a JSON string keeps decoding unambiguous: `"true"` the
//! boolean and `"true"` the string come back as different kinds. Values written
//! by other tools that are not valid JSON decode as plain text.
//!
//! Decoding follows the JSON data model, so two kinds are normalized on the
//! way back: an `Array` returns as a `Json` array, and a `Json` scalar returns
//! as the plain kind it holds (`json!("x")` reads back as `Text("x")`).

use std::iter::Peekable;
use std::str::Chars;

use rowsync_core::{Attributes, Error, Result, Row, Value};

/// Quote a string for an hstore literal, escaping `\` and `"`.
pub fn quote_and_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Encode one value as the right-hand side of an hstore pair.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Json(serde_json::Value::Null) => "NULL".to_string(),
        Value::Bool(b) => quote_and_escape(if *b { "true" } else { "false" }),
        Value::BigInt(i) => quote_and_escape(&i.to_string()),
        Value::Double(f) => serde_json::Number::from_f64(*f)
            .map_or_else(|| "NULL".to_string(), |n| quote_and_escape(&n.to_string())),
        Value::Text(s) => quote_and_escape(&serde_json::Value::String(s.clone()).to_string()),
        Value::Json(j) => quote_and_escape(&j.to_string()),
        Value::Array(_) => quote_and_escape(&value.to_json().to_string()),
    }
}

/// Encode attributes as an hstore literal: `"k1"=>"v1", "k2"=>NULL`.
pub fn encode(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(key, value)| format!("{}=>{}", quote_and_escape(key), encode_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turn one stored hstore value back into a typed value.
pub fn decode_value(stored: Option<&str>) -> Value {
    match stored {
        None => Value::Null,
        Some(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => Value::from_json(json),
            Err(_) => Value::Text(text.to_string()),
        },
    }
}

/// Decode an extension column value into attributes.
///
/// Accepts the hstore text output format, the `%#` key/value array form
/// (`{{k,v},{k,v}}` as nested arrays, or a flat `{k,v,k,v}` array), and the
/// object form produced by `hstore_to_json`. Drivers that hand back arrays in
/// the text protocol deliver the `%#` form as an array literal string; text
/// opening with `{` is read that way, since hstore output never does.
pub fn decode(value: &Value) -> Result<Attributes> {
    match value {
        Value::Null => Ok(Attributes::new()),
        Value::Text(text) if text.trim_start().starts_with('{') => {
            decode_array(&parse_array(text)?)
        }
        Value::Text(text) => Ok(parse(text)?
            .into_iter()
            .map(|(key, stored)| {
                let decoded = decode_value(stored.as_deref());
                (key, decoded)
            })
            .collect()),
        Value::Array(items) => decode_array(items),
        Value::Json(serde_json::Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, json)| {
                let decoded = match json {
                    serde_json::Value::String(s) => decode_value(Some(s)),
                    other => Value::from_json(other.clone()),
                };
                (key.clone(), decoded)
            })
            .collect()),
        other => Err(Error::Decode(format!(
            "cannot decode extension attributes from {} value",
            other.kind()
        ))),
    }
}

fn array_text(value: &Value) -> Result<Option<&str>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(Error::Decode(format!(
            "extension array holds {} instead of text",
            other.kind()
        ))),
    }
}

fn decode_array(items: &[Value]) -> Result<Attributes> {
    let mut out = Attributes::new();
    if items.iter().all(|item| matches!(item, Value::Array(_))) {
        for item in items {
            let Value::Array(pair) = item else {
                continue;
            };
            let [key, stored] = pair.as_slice() else {
                return Err(Error::Decode(format!(
                    "extension pair has {} elements, expected 2",
                    pair.len()
                )));
            };
            let key = array_text(key)?
                .ok_or_else(|| Error::Decode("extension key is NULL".to_string()))?;
            out.insert(key.to_string(), decode_value(array_text(stored)?));
        }
        return Ok(out);
    }

    if items.len() % 2 != 0 {
        return Err(Error::Decode(
            "flat extension array has an odd number of elements".to_string(),
        ));
    }
    for pair in items.chunks(2) {
        let key = array_text(&pair[0])?
            .ok_or_else(|| Error::Decode("extension key is NULL".to_string()))?;
        out.insert(key.to_string(), decode_value(array_text(&pair[1])?));
    }
    Ok(out)
}

/// Merge decoded extension attributes into `target`.
///
/// Attributes already present win: a declared column and an extension entry
/// should never share a name, and if they do the column is authoritative.
pub fn merge_extension(target: &mut Attributes, decoded: Attributes) {
    for (key, value) in decoded {
        target.entry(key).or_insert(value);
    }
}

/// Flatten a result row, folding its extension column into plain attributes.
pub fn merge_row(row: Row, extension_column: &str) -> Result<Attributes> {
    let mut attributes = row.into_attributes();
    if let Some(raw) = attributes.remove(extension_column) {
        let decoded = decode(&raw)?;
        merge_extension(&mut attributes, decoded);
    }
    Ok(attributes)
}

/// Parse hstore text output into raw `(key, value)` pairs.
pub fn parse(text: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut parser = Parser {
        chars: text.chars().peekable(),
    };
    let mut pairs = Vec::new();

    loop {
        parser.skip_whitespace();
        if parser.chars.peek().is_none() {
            break;
        }

        let (key, _) = parser.token()?;
        parser.skip_whitespace();
        parser.arrow()?;
        parser.skip_whitespace();
        let (value, quoted) = parser.token()?;
        let value = if !quoted && value.eq_ignore_ascii_case("NULL") {
            None
        } else {
            Some(value)
        };
        pairs.push((key, value));

        parser.skip_whitespace();
        match parser.chars.next() {
            None => break,
            Some(',') => {}
            Some(c) => {
                return Err(Error::Decode(format!(
                    "unexpected '{c}' between hstore pairs"
                )));
            }
        }
    }

    Ok(pairs)
}

/// Parse a PostgreSQL array literal such as `{{k,v},{k,NULL}}`.
///
/// Elements come back as `Text`, unquoted `NULL` as `Null`, and sub-arrays as
/// nested `Array` values.
pub fn parse_array(text: &str) -> Result<Vec<Value>> {
    let mut parser = Parser {
        chars: text.chars().peekable(),
    };
    let items = parser.array()?;
    parser.skip_whitespace();
    match parser.chars.next() {
        None => Ok(items),
        Some(c) => Err(Error::Decode(format!(
            "unexpected '{c}' after array literal"
        ))),
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn arrow(&mut self) -> Result<()> {
        match (self.chars.next(), self.chars.next()) {
            (Some('='), Some('>')) => Ok(()),
            _ => Err(Error::Decode("expected '=>' in hstore pair".to_string())),
        }
    }

    /// Read a quoted or bare token. Returns the text and whether it was quoted.
    fn token(&mut self) -> Result<(String, bool)> {
        if self.chars.peek() == Some(&'"') {
            return Ok((self.quoted()?, true));
        }
        let out = self.bare(|c| c.is_whitespace() || c == ',' || c == '=');
        if out.is_empty() {
            return Err(Error::Decode("empty hstore token".to_string()));
        }
        Ok((out, false))
    }

    fn quoted(&mut self) -> Result<String> {
        let mut out = String::new();
        self.chars.next();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(c) => out.push(c),
                    None => {
                        return Err(Error::Decode("dangling escape in quoted string".to_string()));
                    }
                },
                Some('"') => return Ok(out),
                Some(c) => out.push(c),
                None => {
                    return Err(Error::Decode("unterminated quoted string".to_string()));
                }
            }
        }
    }

    fn bare(&mut self, stop: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if stop(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    /// Read one `{...}` level of an array literal, recursing into sub-arrays.
    fn array(&mut self) -> Result<Vec<Value>> {
        self.skip_whitespace();
        if self.chars.next() != Some('{') {
            return Err(Error::Decode("expected '{' opening array literal".to_string()));
        }
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.chars.peek() == Some(&'}') {
            self.chars.next();
            return Ok(items);
        }

        loop {
            self.skip_whitespace();
            let item = match self.chars.peek().copied() {
                Some('{') => Value::Array(self.array()?),
                Some('"') => Value::Text(self.quoted()?),
                _ => {
                    let text = self.bare(|c| c.is_whitespace() || matches!(c, ',' | '{' | '}'));
                    if text.is_empty() {
                        return Err(Error::Decode("empty array element".to_string()));
                    }
                    if text.eq_ignore_ascii_case("NULL") {
                        Value::Null
                    } else {
                        Value::Text(text)
                    }
                }
            };
            items.push(item);

            self.skip_whitespace();
            match self.chars.next() {
                Some(',') => {}
                Some('}') => return Ok(items),
                Some(c) => {
                    return Err(Error::Decode(format!("unexpected '{c}' in array literal")));
                }
                None => return Err(Error::Decode("unterminated array literal".to_string())),
            }
        }
    }
}
