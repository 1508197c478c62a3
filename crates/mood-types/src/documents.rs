//! Document model shared by every `DocumentStore` backend.
//!
//! Documents are flat JSON objects addressed by `(collection, id)`. Writes are
//! expressed as per-field operations so that list appends and server-assigned
//! timestamps resolve inside the store rather than on the client.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A single field write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(Value),
    /// Replaced by the store's clock when the write is applied.
    ServerTimestamp,
    /// Append each value not already present. A missing or non-list field
    /// becomes a new list.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each value.
    ArrayRemove(Vec<Value>),
}

impl FieldValue {
    pub fn set(value: impl Into<Value>) -> Self {
        Self::Set(value.into())
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Encoding used for timestamps inside document bodies.
pub fn timestamp_value(ts: DateTime<Utc>) -> Value {
    Value::from(ts.timestamp_micros())
}

/// Apply field writes onto an existing (or empty) document body.
pub fn apply_fields(target: &mut Map<String, Value>, fields: Fields, now: DateTime<Utc>) {
    for (name, op) in fields {
        match op {
            FieldValue::Set(value) => {
                target.insert(name, value);
            }
            FieldValue::ServerTimestamp => {
                target.insert(name, timestamp_value(now));
            }
            FieldValue::ArrayUnion(values) => {
                let slot = target.entry(name).or_insert_with(|| Value::Array(vec![]));
                if !slot.is_array() {
                    *slot = Value::Array(vec![]);
                }
                if let Value::Array(items) = slot {
                    for value in values {
                        if !items.contains(&value) {
                            items.push(value);
                        }
                    }
                }
            }
            FieldValue::ArrayRemove(values) => {
                let slot = target.entry(name).or_insert_with(|| Value::Array(vec![]));
                match slot {
                    Value::Array(items) => items.retain(|item| !values.contains(item)),
                    other => *other = Value::Array(vec![]),
                }
            }
        }
    }
}

/// Strictly increasing wall clock for server timestamps. Two writes landing
/// within the same microsecond still get distinct, ordered timestamps.
#[derive(Debug, Default)]
pub struct ServerClock {
    last_micros: Mutex<i64>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = match self.last_micros.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = if wall > *last { wall } else { *last + 1 };
        *last = next;
        DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now)
    }
}

// -- Queries --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `doc` passes the filter and carries the ordering field.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some((field, expected)) = &self.filter {
            if doc.get(field) != Some(expected) {
                return false;
            }
        }
        match &self.order_by {
            Some((field, _)) => doc.get(field).is_some(),
            None => true,
        }
    }

    /// Evaluate the query over documents given in store order.
    pub fn evaluate(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut hits: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if let Some((field, direction)) = &self.order_by {
            hits.sort_by(|a, b| {
                let ord = compare_values(&a.fields[field.as_str()], &b.fields[field.as_str()]);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(id, fields),
            _ => unreachable!(),
        }
    }

    #[test]
    fn array_union_creates_field_and_skips_duplicates() {
        let mut body = Map::new();
        let mut fields = Fields::new();
        fields.insert("😊".into(), FieldValue::ArrayUnion(vec![json!("x"), json!("y")]));
        apply_fields(&mut body, fields, Utc::now());

        let mut again = Fields::new();
        again.insert("😊".into(), FieldValue::ArrayUnion(vec![json!("y"), json!("z")]));
        apply_fields(&mut body, again, Utc::now());

        assert_eq!(body["😊"], json!(["x", "y", "z"]));
    }

    #[test]
    fn array_remove_drops_every_occurrence() {
        let mut body = json!({ "😂": ["a", "b", "a"], "😡": "scalar" })
            .as_object()
            .cloned()
            .unwrap();
        let mut fields = Fields::new();
        fields.insert("😂".into(), FieldValue::ArrayRemove(vec![json!("a")]));
        fields.insert("😡".into(), FieldValue::ArrayRemove(vec![json!("a")]));
        apply_fields(&mut body, fields, Utc::now());

        assert_eq!(body["😂"], json!(["b"]));
        assert_eq!(body["😡"], json!([]));
    }

    #[test]
    fn server_timestamp_resolves_to_micros() {
        let now = Utc::now();
        let mut body = Map::new();
        let mut fields = Fields::new();
        fields.insert("timestamp".into(), FieldValue::ServerTimestamp);
        apply_fields(&mut body, fields, now);

        assert_eq!(body["timestamp"], json!(now.timestamp_micros()));
    }

    #[test]
    fn server_clock_never_repeats() {
        let clock = ServerClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn query_filters_orders_and_limits() {
        let docs = vec![
            doc("1", json!({ "uploader": "A", "timestamp": 10 })),
            doc("2", json!({ "uploader": "B", "timestamp": 20 })),
            doc("3", json!({ "uploader": "A", "timestamp": 30 })),
            doc("4", json!({ "uploader": "A" })),
            doc("5", json!({ "uploader": "A", "timestamp": 5 })),
        ];

        let query = Query::collection("moods")
            .where_eq("uploader", "A")
            .order_by("timestamp", Direction::Descending)
            .limit(2);
        let ids: Vec<String> = query.evaluate(docs).into_iter().map(|d| d.id).collect();

        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn unordered_query_keeps_store_order() {
        let docs = vec![
            doc("b", json!({ "username": "B" })),
            doc("b2", json!({ "username": "B" })),
        ];
        let hits = Query::collection("users").where_eq("username", "B").evaluate(docs);
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits.len(), 2);
    }
}
