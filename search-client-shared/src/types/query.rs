//! Query expression tree and its rendering to the query DSL.
//!
//! Queries are immutable values built with the free functions [`term`], [`match_text`],
//! [`range`] and [`bool_must`]. [`render`] turns a tree into a [`WireQuery`], the JSON
//! body understood by OpenSearch/Elasticsearch.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::document::{format_timestamp, FieldValue};

/// A query expression.
///
/// Leaves are `Term`, `Match` and `Range`; `BoolMust` combines any number of children,
/// all of which must match.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Exact match on a field value.
    Term {
        /// Field name.
        field: String,
        /// Value the field must equal.
        value: FieldValue,
    },
    /// Full-text match on an analyzed field.
    Match {
        /// Field name.
        field: String,
        /// Text to match.
        text: String,
    },
    /// Closed range, inclusive on both ends.
    Range {
        /// Field name.
        field: String,
        /// Lower bound (inclusive).
        lower: FieldValue,
        /// Upper bound (inclusive).
        upper: FieldValue,
    },
    /// Conjunction of child queries.
    BoolMust(Vec<Query>),
}

/// Exact-match query on `field`.
pub fn term(field: impl Into<String>, value: impl Into<FieldValue>) -> Query {
    Query::Term {
        field: field.into(),
        value: value.into(),
    }
}

/// Full-text match query on `field`.
pub fn match_text(field: impl Into<String>, text: impl Into<String>) -> Query {
    Query::Match {
        field: field.into(),
        text: text.into(),
    }
}

/// Closed range query: `lower <= field <= upper`.
pub fn range(
    field: impl Into<String>,
    lower: impl Into<FieldValue>,
    upper: impl Into<FieldValue>,
) -> Query {
    Query::Range {
        field: field.into(),
        lower: lower.into(),
        upper: upper.into(),
    }
}

/// Conjunction of `children`, in order.
pub fn bool_must(children: impl IntoIterator<Item = Query>) -> Query {
    Query::BoolMust(children.into_iter().collect())
}

impl Query {
    /// Combine this query with another under a `BoolMust`.
    pub fn and(self, other: Query) -> Query {
        bool_must([self, other])
    }

    /// Validate the tree before it is sent to a backend.
    ///
    /// Field names must be non-empty, and term/range values must be finite scalars.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Query::Term { field, value } => {
                check_field(field)?;
                check_scalar(field, value)
            }
            Query::Match { field, .. } => check_field(field),
            Query::Range {
                field,
                lower,
                upper,
            } => {
                check_field(field)?;
                check_scalar(field, lower)?;
                check_scalar(field, upper)
            }
            Query::BoolMust(children) => children.iter().try_for_each(Query::validate),
        }
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Query::BoolMust(children) => children.iter().map(Query::leaf_count).sum(),
            _ => 1,
        }
    }
}

fn check_field(field: &str) -> Result<(), String> {
    if field.trim().is_empty() {
        return Err("Query field name cannot be empty".to_string());
    }
    Ok(())
}

fn check_scalar(field: &str, value: &FieldValue) -> Result<(), String> {
    match value {
        FieldValue::Float(f) if !f.is_finite() => Err(format!(
            "Query value for '{}' must be a finite number",
            field
        )),
        v if !v.is_scalar() => Err(format!(
            "Query value for '{}' must be a scalar, got {}",
            field,
            v.type_name()
        )),
        _ => Ok(()),
    }
}

/// Rendered query DSL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WireQuery(Value);

impl WireQuery {
    /// Wrap an already rendered JSON query.
    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the JSON body.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Take the JSON body.
    pub fn into_json(self) -> Value {
        self.0
    }
}

impl fmt::Display for WireQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a query to the DSL.
///
/// Rendering is deterministic, and nested `BoolMust` nodes are flattened into their
/// parent, so `bool_must([bool_must([a, b]), c])` renders exactly like
/// `bool_must([a, b, c])`.
///
/// # Example
///
/// ```
/// use search_client_shared::query::{bool_must, range, render, term};
///
/// let wire = render(&bool_must([term("user", "geyang1"), range("age", 10, 30)]));
/// assert_eq!(
///     wire.to_string(),
///     r#"{"bool":{"must":[{"term":{"user":"geyang1"}},{"range":{"age":{"gte":10,"lte":30}}}]}}"#
/// );
/// ```
pub fn render(query: &Query) -> WireQuery {
    WireQuery(render_node(query))
}

/// Render the DSL for a query that matches every document.
pub fn render_match_all() -> WireQuery {
    WireQuery(json!({ "match_all": {} }))
}

fn render_node(query: &Query) -> Value {
    match query {
        Query::Term { field, value } => {
            json!({ "term": { field.as_str(): scalar_json(value) } })
        }
        Query::Match { field, text } => {
            json!({ "match": { field.as_str(): { "query": text } } })
        }
        Query::Range {
            field,
            lower,
            upper,
        } => {
            let mut bounds = Map::new();
            bounds.insert("gte".to_string(), scalar_json(lower));
            bounds.insert("lte".to_string(), scalar_json(upper));
            json!({ "range": { field.as_str(): bounds } })
        }
        Query::BoolMust(children) => {
            let mut must = Vec::with_capacity(children.len());
            flatten_must(children, &mut must);
            json!({ "bool": { "must": must } })
        }
    }
}

fn flatten_must(children: &[Query], out: &mut Vec<Value>) {
    for child in children {
        match child {
            Query::BoolMust(grandchildren) => flatten_must(grandchildren, out),
            leaf => out.push(render_node(leaf)),
        }
    }
}

/// Non-scalars and non-finite floats render as `null`; `Query::validate` rejects them.
fn scalar_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Integer(i) => json!(i),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Timestamp(ts) => Value::String(format_timestamp(ts)),
        FieldValue::Document(_) | FieldValue::Sequence(_) => Value::Null,
    }
}
