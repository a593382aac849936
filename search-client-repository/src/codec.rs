//! Document codec.
//!
//! Converts [`Document`]s to the JSON object the backend stores and back. The codec is a
//! pure transformation: field order is kept, values keep their type, and nothing here
//! touches the network.

use std::collections::BTreeSet;

use search_client_shared::{format_timestamp, parse_canonical_timestamp, Document, FieldValue};
use serde_json::{Map, Number, Value};

use crate::errors::SearchClientError;

/// Deepest nesting of documents and sequences the codec accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

/// A document in wire form: a JSON object with fields in insertion order.
///
/// JSON has no timestamp type, so the encoder also records the JSON pointer of every
/// string it wrote for a timestamp. [`DocumentCodec::decode`] uses that record to restore
/// timestamps exactly, so timestamp-shaped text stays text.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    source: Map<String, Value>,
    timestamps: BTreeSet<String>,
}

impl EncodedDocument {
    /// Wrap a JSON object received from the backend. It carries no timestamp record, so
    /// every string decodes as text; use [`DocumentCodec::decode_source`] to apply date
    /// detection instead.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            source: map,
            timestamps: BTreeSet::new(),
        }
    }

    /// Borrow the JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Take the JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.source
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.source.clone())
    }

    /// JSON pointers (`/postDate`, `/history/0`) of the strings that encode timestamps.
    pub fn timestamp_paths(&self) -> impl Iterator<Item = &str> {
        self.timestamps.iter().map(String::as_str)
    }
}

/// How decoded strings are typed.
#[derive(Clone, Copy)]
enum Strings<'a> {
    /// Canonical timestamp strings become timestamps.
    Detect,
    /// Every string is text.
    Text,
    /// Only strings at the recorded pointers are timestamps.
    Recorded(&'a BTreeSet<String>),
}

/// Encodes and decodes documents.
///
/// Timestamps are written as canonical RFC 3339 strings. [`decode`](Self::decode) restores
/// them from the encoder's record and is exact. Sources read back from the backend have
/// no such record; [`decode_source`](Self::decode_source) applies date detection to them
/// (on by default, matching the engine's dynamic date detection), so strings in exactly
/// the canonical form decode to timestamps.
#[derive(Debug, Clone, Copy)]
pub struct DocumentCodec {
    date_detection: bool,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self {
            date_detection: true,
        }
    }
}

impl DocumentCodec {
    /// Create a codec with date detection enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec whose [`decode_source`](Self::decode_source) reads every string as
    /// text.
    pub fn without_date_detection() -> Self {
        Self {
            date_detection: false,
        }
    }

    /// Encode a document.
    ///
    /// # Errors
    ///
    /// * `EncodingError` - empty field names, non-finite floats, or nesting deeper than
    ///   [`MAX_NESTING_DEPTH`]
    pub fn encode(&self, document: &Document) -> Result<EncodedDocument, SearchClientError> {
        let mut timestamps = BTreeSet::new();
        let source = encode_document(document, 1, "", &mut timestamps)?;
        Ok(EncodedDocument { source, timestamps })
    }

    /// Decode a document produced by [`encode`](Self::encode).
    ///
    /// `decode(encode(d)) == d` for every document the encoder accepts.
    ///
    /// # Errors
    ///
    /// * `EncodingError` - integers outside the i64 range, a recorded timestamp that no
    ///   longer parses, or nesting deeper than [`MAX_NESTING_DEPTH`]
    pub fn decode(&self, encoded: &EncodedDocument) -> Result<Document, SearchClientError> {
        decode_map(&encoded.source, 1, "", Strings::Recorded(&encoded.timestamps))
    }

    /// Decode a raw `_source` object returned by the backend.
    ///
    /// `null` values are dropped: the store is schemaless and a null field is equivalent
    /// to an absent one.
    pub fn decode_source(&self, source: &Map<String, Value>) -> Result<Document, SearchClientError> {
        let strings = if self.date_detection {
            Strings::Detect
        } else {
            Strings::Text
        };
        decode_map(source, 1, "", strings)
    }
}

/// Append one reference token to a JSON pointer.
fn pointer(parent: &str, token: &str) -> String {
    format!("{}/{}", parent, token.replace('~', "~0").replace('/', "~1"))
}

fn decode_map(
    map: &Map<String, Value>,
    depth: usize,
    path: &str,
    strings: Strings<'_>,
) -> Result<Document, SearchClientError> {
    check_depth(depth)?;
    let mut document = Document::new();
    for (name, value) in map {
        let field_path = pointer(path, name);
        if let Some(decoded) = decode_value(name, value, depth, &field_path, strings)? {
            document.insert(name.clone(), decoded);
        }
    }
    Ok(document)
}

fn decode_value(
    name: &str,
    value: &Value,
    depth: usize,
    path: &str,
    strings: Strings<'_>,
) -> Result<Option<FieldValue>, SearchClientError> {
    let decoded = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => decode_number(name, n)?,
        Value::String(s) => decode_string(name, s, path, strings)?,
        Value::Array(items) => {
            check_depth(depth + 1)?;
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = pointer(path, &i.to_string());
                if let Some(v) = decode_value(name, item, depth + 1, &item_path, strings)? {
                    values.push(v);
                }
            }
            FieldValue::Sequence(values)
        }
        Value::Object(map) => FieldValue::Document(decode_map(map, depth + 1, path, strings)?),
    };
    Ok(Some(decoded))
}

fn decode_string(
    name: &str,
    s: &str,
    path: &str,
    strings: Strings<'_>,
) -> Result<FieldValue, SearchClientError> {
    match strings {
        Strings::Text => Ok(FieldValue::Text(s.to_string())),
        Strings::Detect => Ok(parse_canonical_timestamp(s)
            .map(FieldValue::Timestamp)
            .unwrap_or_else(|| FieldValue::Text(s.to_string()))),
        Strings::Recorded(timestamps) if timestamps.contains(path) => parse_canonical_timestamp(s)
            .map(FieldValue::Timestamp)
            .ok_or_else(|| {
                SearchClientError::encoding(format!(
                    "Field '{}' is recorded as a timestamp but holds '{}'",
                    name, s
                ))
            }),
        Strings::Recorded(_) => Ok(FieldValue::Text(s.to_string())),
    }
}

fn check_depth(depth: usize) -> Result<(), SearchClientError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(SearchClientError::encoding(format!(
            "Document nesting exceeds maximum depth of {}",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

fn encode_document(
    document: &Document,
    depth: usize,
    path: &str,
    timestamps: &mut BTreeSet<String>,
) -> Result<Map<String, Value>, SearchClientError> {
    check_depth(depth)?;
    let mut map = Map::new();
    for (name, value) in document.iter() {
        if name.is_empty() {
            return Err(SearchClientError::encoding("Field names cannot be empty"));
        }
        let field_path = pointer(path, name);
        map.insert(
            name.to_string(),
            encode_value(name, value, depth, &field_path, timestamps)?,
        );
    }
    Ok(map)
}

fn encode_value(
    name: &str,
    value: &FieldValue,
    depth: usize,
    path: &str,
    timestamps: &mut BTreeSet<String>,
) -> Result<Value, SearchClientError> {
    match value {
        FieldValue::Text(s) => Ok(Value::String(s.clone())),
        FieldValue::Integer(i) => Ok(Value::Number(Number::from(*i))),
        FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
            SearchClientError::encoding(format!(
                "Field '{}' holds a non-finite float ({}), which has no wire representation",
                name, f
            ))
        }),
        FieldValue::Boolean(b) => Ok(Value::Bool(*b)),
        FieldValue::Timestamp(ts) => {
            timestamps.insert(path.to_string());
            Ok(Value::String(format_timestamp(ts)))
        }
        FieldValue::Document(nested) => {
            encode_document(nested, depth + 1, path, timestamps).map(Value::Object)
        }
        FieldValue::Sequence(items) => {
            check_depth(depth + 1)?;
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = pointer(path, &i.to_string());
                values.push(encode_value(name, item, depth + 1, &item_path, timestamps)?);
            }
            Ok(Value::Array(values))
        }
    }
}

fn decode_number(name: &str, n: &Number) -> Result<FieldValue, SearchClientError> {
    if n.is_f64() {
        return n.as_f64().map(FieldValue::Float).ok_or_else(|| {
            SearchClientError::encoding(format!("Field '{}' holds an invalid float", name))
        });
    }
    n.as_i64().map(FieldValue::Integer).ok_or_else(|| {
        SearchClientError::encoding(format!(
            "Field '{}' holds integer {} outside the supported range",
            name, n
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn tweet() -> Document {
        Document::new()
            .with("user", "geyang")
            .with("age", 20)
            .with(
                "postDate",
                Utc.with_ymd_and_hms(2013, 1, 30, 8, 15, 0).unwrap(),
            )
            .with("message", "trying out Elasticsearch")
            .with("score", 4.5)
            .with("verified", true)
            .with("tags", vec!["bulk", "search"])
            .with(
                "location",
                Document::new().with("city", "Shanghai").with("floor", 3),
            )
    }

    #[test]
    fn test_round_trip_preserves_order_and_types() {
        let codec = DocumentCodec::new();
        let doc = tweet();

        let encoded = codec.encode(&doc).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert_eq!(decoded, doc);
        assert_eq!(
            decoded.field_names(),
            vec!["user", "age", "postDate", "message", "score", "verified", "tags", "location"]
        );
    }

    #[test]
    fn test_round_trip_through_text() {
        let codec = DocumentCodec::new();
        let doc = tweet();

        let text = serde_json::to_string(&codec.encode(&doc).unwrap().to_value()).unwrap();
        let parsed: Map<String, Value> = serde_json::from_str(&text).unwrap();
        let decoded = codec.decode_source(&parsed).unwrap();

        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_round_trip_keeps_timestamp_shaped_text() {
        let codec = DocumentCodec::new();
        let posted = Utc.with_ymd_and_hms(2013, 1, 30, 12, 0, 0).unwrap();
        let doc = Document::new()
            .with("note", "2013-01-30T12:00:00Z")
            .with("postDate", posted)
            .with(
                "history",
                FieldValue::Sequence(vec![
                    FieldValue::Text("2013-01-30T12:00:00Z".to_string()),
                    FieldValue::Timestamp(posted),
                ]),
            )
            .with("meta", Document::new().with("label", "2013-01-30T12:00:00Z"));

        let decoded = codec.decode(&codec.encode(&doc).unwrap()).unwrap();

        assert_eq!(decoded, doc);
        assert_eq!(
            decoded.get("note"),
            Some(&FieldValue::Text("2013-01-30T12:00:00Z".to_string()))
        );
        assert_eq!(decoded.get("postDate"), Some(&FieldValue::Timestamp(posted)));
    }

    #[test]
    fn test_encode_records_timestamp_paths() {
        let codec = DocumentCodec::new();
        let posted = Utc.with_ymd_and_hms(2013, 1, 30, 12, 0, 0).unwrap();
        let doc = Document::new()
            .with("user", "geyang")
            .with("postDate", posted)
            .with("history", FieldValue::Sequence(vec![FieldValue::Integer(1), posted.into()]))
            .with("meta", Document::new().with("created/at", posted));

        let encoded = codec.encode(&doc).unwrap();

        let paths: Vec<&str> = encoded.timestamp_paths().collect();
        assert_eq!(paths, vec!["/history/1", "/meta/created~1at", "/postDate"]);
        assert_eq!(EncodedDocument::from_map(encoded.into_map()).timestamp_paths().count(), 0);
    }

    #[test]
    fn test_backend_source_uses_date_detection() {
        let codec = DocumentCodec::new();
        let Value::Object(map) = json!({ "note": "2013-01-30T12:00:00Z" }) else {
            unreachable!()
        };

        assert!(matches!(
            codec.decode_source(&map).unwrap().get("note"),
            Some(FieldValue::Timestamp(_))
        ));
        assert_eq!(
            codec.decode(&EncodedDocument::from_map(map)).unwrap().get("note"),
            Some(&FieldValue::Text("2013-01-30T12:00:00Z".to_string()))
        );
    }

    #[test]
    fn test_float_stays_float() {
        let codec = DocumentCodec::new();
        let doc = Document::new().with("ratio", 1.0).with("count", 1);

        let encoded = codec.encode(&doc).unwrap();
        let text = encoded.to_value().to_string();
        assert_eq!(text, r#"{"ratio":1.0,"count":1}"#);

        let parsed: Map<String, Value> = serde_json::from_str(&text).unwrap();
        let decoded = codec.decode_source(&parsed).unwrap();
        assert_eq!(decoded.get("ratio"), Some(&FieldValue::Float(1.0)));
        assert_eq!(decoded.get("count"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn test_encode_timestamp_as_rfc3339() {
        let codec = DocumentCodec::new();
        let doc = Document::new().with(
            "postDate",
            Utc.with_ymd_and_hms(2013, 1, 30, 0, 0, 0).unwrap(),
        );

        let encoded = codec.encode(&doc).unwrap();
        assert_eq!(encoded.to_value(), json!({ "postDate": "2013-01-30T00:00:00Z" }));
    }

    #[test]
    fn test_decode_without_date_detection() {
        let codec = DocumentCodec::without_date_detection();
        let source = json!({ "postDate": "2013-01-30T00:00:00Z" });
        let Value::Object(map) = source else {
            unreachable!()
        };

        let decoded = codec.decode_source(&map).unwrap();
        assert_eq!(
            decoded.get("postDate"),
            Some(&FieldValue::Text("2013-01-30T00:00:00Z".to_string()))
        );
    }

    #[test]
    fn test_encode_rejects_non_finite_float() {
        let codec = DocumentCodec::new();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let doc = Document::new().with("score", value);
            let result = codec.encode(&doc);
            assert!(matches!(result, Err(SearchClientError::EncodingError(_))));
        }
    }

    #[test]
    fn test_encode_rejects_nested_non_finite_float() {
        let codec = DocumentCodec::new();
        let doc = Document::new().with(
            "stats",
            Document::new().with("values", vec![1.0, f64::NAN]),
        );
        assert!(matches!(
            codec.encode(&doc),
            Err(SearchClientError::EncodingError(_))
        ));
    }

    #[test]
    fn test_encode_rejects_empty_field_name() {
        let codec = DocumentCodec::new();
        let mut doc = Document::new();
        doc.insert("", 1);
        assert!(matches!(
            codec.encode(&doc),
            Err(SearchClientError::EncodingError(_))
        ));
    }

    #[test]
    fn test_encode_rejects_excessive_nesting() {
        let codec = DocumentCodec::new();
        let mut doc = Document::new().with("leaf", 1);
        for _ in 0..MAX_NESTING_DEPTH {
            doc = Document::new().with("child", doc);
        }
        assert!(matches!(
            codec.encode(&doc),
            Err(SearchClientError::EncodingError(_))
        ));
    }

    #[test]
    fn test_encode_accepts_maximum_nesting() {
        let codec = DocumentCodec::new();
        let mut doc = Document::new().with("leaf", 1);
        for _ in 1..MAX_NESTING_DEPTH {
            doc = Document::new().with("child", doc);
        }
        let encoded = codec.encode(&doc).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_decode_drops_nulls() {
        let codec = DocumentCodec::new();
        let Value::Object(map) = json!({ "user": "a", "avatar": null, "tags": ["x", null] }) else {
            unreachable!()
        };

        let decoded = codec.decode_source(&map).unwrap();
        assert_eq!(decoded.field_names(), vec!["user", "tags"]);
        assert_eq!(
            codec.decode(&EncodedDocument::from_map(map.clone())).unwrap(),
            decoded
        );
        assert_eq!(
            decoded.get("tags"),
            Some(&FieldValue::Sequence(vec![FieldValue::Text("x".to_string())]))
        );
    }

    #[test]
    fn test_decode_rejects_out_of_range_integer() {
        let codec = DocumentCodec::new();
        let Value::Object(map) = json!({ "big": u64::MAX }) else {
            unreachable!()
        };
        assert!(matches!(
            codec.decode_source(&map),
            Err(SearchClientError::EncodingError(_))
        ));
    }
}
