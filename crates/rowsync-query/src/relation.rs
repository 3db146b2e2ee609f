//! Parent scoping inferred from resource paths.
//!
//! A record living under `orgs/7/members` belongs to org 7: every statement
//! touching it is constrained by `org_id = 7`, and writes stamp that value onto
//! the row. Only one level of nesting is recognized.

use rowsync_core::{Attributes, Value, path_segments};

/// The parent a nested resource path points at.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationScope {
    /// Foreign key column on the child table, e.g. `org_id`.
    pub parent_column: String,
    /// Parent primary key value.
    pub parent_id: Value,
}

/// Names that are the same in both numbers.
const UNCOUNTABLE: &[&str] = &["equipment", "information", "metadata", "news", "series", "species"];

/// Singulars ending in `s` whose plural adds `es`.
const SINGULAR_S: &[&str] = &[
    "alias", "atlas", "bonus", "bus", "campus", "canvas", "census", "gas", "lens", "status",
    "virus",
];

/// Singulars ending in `ie` whose plural only adds `s`.
const SINGULAR_IE: &[&str] = &[
    "calorie", "cookie", "goalie", "movie", "pie", "rookie", "selfie", "tie", "zombie",
];

/// Singular form of a resource name.
///
/// Rule based, with small word lists for the usual exceptions: `categories`
/// -> `category`, `movies` -> `movie`, `statuses` -> `status`, `boxes` ->
/// `box`, `orgs` -> `org`, `news` -> `news`. In snake_case names only the last
/// word changes (`order_statuses` -> `order_status`). Irregular plurals such as
/// `people` are not recognized.
pub fn singularize(word: &str) -> String {
    let (head, last) = word
        .rfind('_')
        .map_or(("", word), |i| word.split_at(i + 1));
    format!("{head}{}", singularize_word(last))
}

fn singularize_word(word: &str) -> String {
    if UNCOUNTABLE.contains(&word) || SINGULAR_S.contains(&word) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("es").filter(|stem| SINGULAR_S.contains(stem)) {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix('s').filter(|stem| SINGULAR_IE.contains(stem)) {
        return stem.to_string();
    }
    if let Some(stem) = word
        .strip_suffix("ies")
        .filter(|stem| stem.chars().next_back().is_some_and(is_consonant))
    {
        return format!("{stem}y");
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Parse the parent scope of a `<parent>/<parent_id>/<child>` path.
///
/// Any other segment count has no scope. Integer ids are bound as integers;
/// anything else is kept as text so the scope still applies.
pub fn relation_scope(path: &str) -> Option<RelationScope> {
    let segments: Vec<&str> = path_segments(path).collect();
    let [parent, id, _child] = segments.as_slice() else {
        return None;
    };

    let parent_id = match id.parse::<i64>() {
        Ok(n) => Value::BigInt(n),
        Err(_) => {
            tracing::debug!(path = path, id = *id, "Non-integer parent id, scoping by text");
            Value::Text((*id).to_string())
        }
    };

    Some(RelationScope {
        parent_column: format!("{}_id", singularize(parent)),
        parent_id,
    })
}

/// Relation conditions of a resource path as a column -> value map.
///
/// ```
/// use rowsync_core::Value;
/// use rowsync_query::relation::relation_conditions;
///
/// let conds = relation_conditions("orgs/7/members");
/// assert_eq!(conds.get("org_id"), Some(&Value::BigInt(7)));
/// assert!(relation_conditions("members").is_empty());
/// ```
pub fn relation_conditions(path: &str) -> Attributes {
    relation_scope(path)
        .map(|scope| Attributes::from([(scope.parent_column, scope.parent_id)]))
        .unwrap_or_default()
}
