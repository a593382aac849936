//! Document types for the search client.
//!
//! A [`Document`] is an ordered mapping of field names to [`FieldValue`]s. Field order is
//! the insertion order and is preserved all the way to the wire, so a document read back
//! from the backend lists its fields in the order they were written.

use chrono::{DateTime, SecondsFormat, Utc};

/// A single field value inside a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 text.
    Text(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
    /// Nested document.
    Document(Document),
    /// Sequence of values. Elements need not share a type.
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Document(_) => "document",
            FieldValue::Sequence(_) => "sequence",
        }
    }

    /// Returns true for text, numbers, booleans and timestamps.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Document(_) | FieldValue::Sequence(_))
    }

    /// Returns the text if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer` value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the nested document if this is a `Document` value.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            FieldValue::Document(d) => Some(d),
            _ => None,
        }
    }
}

/// Format a timestamp the way it is written to the wire.
///
/// RFC 3339, UTC with a `Z` suffix, with as many fractional digits as the value needs.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a string that is in the exact form produced by [`format_timestamp`].
///
/// Strings that parse as RFC 3339 but are not in canonical form (offsets other than `Z`,
/// padded fractions) return `None`.
pub fn parse_canonical_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
    (format_timestamp(&parsed) == s).then_some(parsed)
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<Document> for FieldValue {
    fn from(value: Document) -> Self {
        FieldValue::Document(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::Sequence(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered mapping of field names to values.
///
/// Field names are unique. Inserting an existing name replaces the value but keeps the
/// field at its original position.
///
/// # Example
///
/// ```
/// use search_client_shared::Document;
///
/// let doc = Document::new()
///     .with("user", "kimchy")
///     .with("age", 20)
///     .with("message", "trying out Elasticsearch");
///
/// assert_eq!(doc.field_names(), vec!["user", "age", "message"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, FieldValue)>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from fields, rejecting duplicate or empty field names.
    ///
    /// Returns an error message naming the offending field.
    pub fn try_from_fields<I, K, V>(fields: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut doc = Document::new();
        for (name, value) in fields {
            let name = name.into();
            if name.is_empty() {
                return Err("Field names cannot be empty".to_string());
            }
            if doc.contains(&name) {
                return Err(format!("Duplicate field name '{}'", name));
            }
            doc.fields.push((name, value.into()));
        }
        Ok(doc)
    }

    /// Insert a field, returning the previous value if the name was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Insert a field and return the document, for building documents inline.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (name, value) in iter {
            doc.insert(name, value);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_keeps_order() {
        let doc = Document::new()
            .with("user", "geyang")
            .with("age", 20)
            .with("message", "trying out Elasticsearch");

        assert_eq!(doc.field_names(), vec!["user", "age", "message"]);
        assert_eq!(doc.get("age"), Some(&FieldValue::Integer(20)));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = Document::new().with("user", "geyang").with("age", 20);

        let previous = doc.insert("user", "qingqing");

        assert_eq!(previous, Some(FieldValue::Text("geyang".to_string())));
        assert_eq!(doc.field_names(), vec!["user", "age"]);
        assert_eq!(doc.get("user").and_then(|v| v.as_text()), Some("qingqing"));
    }

    #[test]
    fn test_try_from_fields_rejects_duplicates() {
        let result = Document::try_from_fields(vec![("user", "a"), ("user", "b")]);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("user"));
    }

    #[test]
    fn test_try_from_fields_rejects_empty_name() {
        let result = Document::try_from_fields(vec![("", 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_iterator_last_write_wins() {
        let doc: Document = vec![("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        assert_eq!(doc.field_names(), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn test_remove() {
        let mut doc = Document::new().with("a", 1).with("b", 2);
        assert_eq!(doc.remove("a"), Some(FieldValue::Integer(1)));
        assert_eq!(doc.remove("a"), None);
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_canonical_timestamp() {
        let ts = Utc.with_ymd_and_hms(2013, 1, 30, 12, 0, 0).unwrap();
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2013-01-30T12:00:00Z");
        assert_eq!(parse_canonical_timestamp(&formatted), Some(ts));

        // Valid RFC 3339, but not the form we write.
        assert_eq!(parse_canonical_timestamp("2013-01-30T12:00:00+00:00"), None);
        assert_eq!(parse_canonical_timestamp("2013-01-30"), None);
        assert_eq!(parse_canonical_timestamp("kimchy"), None);
    }

    #[test]
    fn test_sequence_from_vec() {
        let value = FieldValue::from(vec!["a", "b"]);
        assert_eq!(
            value,
            FieldValue::Sequence(vec![
                FieldValue::Text("a".to_string()),
                FieldValue::Text("b".to_string())
            ])
        );
        assert!(!value.is_scalar());
    }
}
