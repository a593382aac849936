//! Evaluation of rendered queries against stored sources.
//!
//! Understands the DSL shapes the query renderer produces: `match_all`, `term`, `match`,
//! `range` and `bool.must`. Field names may be dotted paths into nested objects, and
//! arrays match when any element does.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::errors::SearchClientError;

/// Returns true if `source` satisfies `query`.
///
/// # Errors
///
/// * `InvalidArgumentError` - if the query uses a shape outside the supported set
pub fn matches(query: &Value, source: &Map<String, Value>) -> Result<bool, SearchClientError> {
    let (kind, body) = single_entry(query)?;
    match kind.as_str() {
        "match_all" => Ok(true),
        "term" => {
            let (field, expected) = single_entry(body)?;
            Ok(field_values(source, field)
                .into_iter()
                .any(|v| scalar_eq(v, expected)))
        }
        "match" => {
            let (field, options) = single_entry(body)?;
            let text = match options {
                Value::Object(options) => options.get("query").unwrap_or(&Value::Null),
                other => other,
            };
            let wanted = tokens(&scalar_text(text));
            if wanted.is_empty() {
                return Ok(false);
            }
            Ok(field_values(source, field).into_iter().any(|v| {
                let have = tokens(&scalar_text(v));
                wanted.iter().any(|t| have.contains(t))
            }))
        }
        "range" => {
            let (field, bounds) = single_entry(body)?;
            let bounds = bounds.as_object().ok_or_else(|| unsupported(query))?;
            Ok(field_values(source, field)
                .into_iter()
                .any(|v| within(v, bounds)))
        }
        "bool" => {
            let clauses = body.as_object().ok_or_else(|| unsupported(query))?;
            for (occur, children) in clauses {
                if occur != "must" {
                    return Err(unsupported(query));
                }
                let children = match children {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                for child in children {
                    if !matches(child, source)? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }
        _ => Err(unsupported(query)),
    }
}

fn unsupported(query: &Value) -> SearchClientError {
    SearchClientError::invalid_argument(format!("Unsupported query: {}", query))
}

/// The only key and value of a single-entry object.
fn single_entry(value: &Value) -> Result<(&String, &Value), SearchClientError> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map.iter().next().ok_or_else(|| unsupported(value)),
        _ => Err(unsupported(value)),
    }
}

/// All scalar values found at a dotted path, with arrays flattened.
fn field_values<'a>(source: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = match source.get(path) {
        // A literal key containing dots wins over path traversal.
        Some(v) => vec![v],
        None => {
            let mut segments = path.split('.');
            let first = segments.next().and_then(|s| source.get(s));
            let mut values: Vec<&Value> = first.into_iter().collect();
            for segment in segments {
                values = flatten(values)
                    .into_iter()
                    .filter_map(|v| v.as_object().and_then(|m| m.get(segment)))
                    .collect();
            }
            values
        }
    };
    current = flatten(current);
    current.retain(|v| !v.is_null() && !v.is_object());
    current
}

fn flatten(values: Vec<&Value>) -> Vec<&Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Array(items) => out.extend(flatten(items.iter().collect())),
            other => out.push(other),
        }
    }
    out
}

fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => actual == expected,
    }
}

fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn within(value: &Value, bounds: &Map<String, Value>) -> bool {
    bounds.iter().all(|(op, bound)| {
        let Some(ordering) = compare(value, bound) else {
            return false;
        };
        match op.as_str() {
            "gte" => ordering != Ordering::Less,
            "gt" => ordering == Ordering::Greater,
            "lte" => ordering != Ordering::Greater,
            "lt" => ordering == Ordering::Less,
            _ => false,
        }
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Lowercased alphanumeric tokens, roughly what the standard analyzer produces.
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_client_shared::query::{bool_must, match_text, range, render, render_match_all, term};
    use search_client_shared::Query;
    use serde_json::json;

    fn tweet() -> Map<String, Value> {
        match json!({
            "user": "geyang1",
            "age": 20,
            "message": "Trying out Elasticsearch, so far so good?",
            "postDate": "2013-01-30T00:00:00Z",
            "tags": ["bulk", "search"],
            "location": { "city": "Shanghai", "floor": 3 }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn eval(query: &Query) -> bool {
        matches(render(query).as_json(), &tweet()).unwrap()
    }

    #[test]
    fn test_match_all() {
        assert!(matches(render_match_all().as_json(), &tweet()).unwrap());
    }

    #[test]
    fn test_term() {
        assert!(eval(&term("user", "geyang1")));
        assert!(!eval(&term("user", "geyang2")));
        assert!(eval(&term("age", 20)));
        assert!(eval(&term("age", 20.0)));
        assert!(!eval(&term("age", "20")));
        assert!(eval(&term("tags", "search")));
        assert!(eval(&term("location.city", "Shanghai")));
        assert!(!eval(&term("missing", "x")));
    }

    #[test]
    fn test_match() {
        assert!(eval(&match_text("message", "elasticsearch")));
        assert!(eval(&match_text("message", "nothing good")));
        assert!(!eval(&match_text("message", "lucene")));
        assert!(eval(&match_text("user", "GEYANG1")));
        assert!(!eval(&match_text("message", "")));
    }

    #[test]
    fn test_range() {
        assert!(eval(&range("age", 10, 30)));
        assert!(eval(&range("age", 20, 20)));
        assert!(!eval(&range("age", 21, 30)));
        assert!(eval(&range("location.floor", 1, 5)));
        assert!(eval(&range("postDate", "2013-01-01T00:00:00Z", "2013-12-31T00:00:00Z")));
        assert!(!eval(&range("user", 0, 100)));
    }

    #[test]
    fn test_bool_must() {
        assert!(eval(&bool_must([term("user", "geyang1"), range("age", 10, 30)])));
        assert!(!eval(&bool_must([term("user", "geyang1"), range("age", 21, 30)])));
        assert!(eval(&bool_must(Vec::<Query>::new())));
    }

    #[test]
    fn test_unsupported_shape() {
        let query = json!({ "wildcard": { "user": "gey*" } });
        assert!(matches!(
            matches(&query, &tweet()),
            Err(SearchClientError::InvalidArgumentError(_))
        ));

        let query = json!({ "bool": { "should": [] } });
        assert!(matches(&query, &tweet()).is_err());
    }
}
