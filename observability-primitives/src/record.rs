//! Ordered records exchanged between instruments, collectors, and serializers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// An ordered mapping of field name to value describing one measurement or event.
///
/// Field order is insertion order. No schema is enforced: each producer
/// decides its own field set. Collectors take records by value, so a record
/// handed to a sink can no longer be changed by its producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds a field, returning the record for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a field. Replacing keeps the field's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` when the record holds a field named `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Borrows the underlying JSON map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the record into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        value.into_value()
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidRecord {
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_insertion_order() {
        let record = Record::new()
            .with("total", 3)
            .with("sqs.SendMessage", 2)
            .with("alpha", 1);

        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(keys, ["total", "sqs.SendMessage", "alpha"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let record = Record::new().with("queue", "arn:q").with("visible", 4);
        let encoded = serde_json::to_string(&record).unwrap();
        assert_eq!(encoded, r#"{"queue":"arn:q","visible":4}"#);
    }

    #[test]
    fn rejects_non_object_values() {
        let err = Record::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));

        let record = Record::try_from(json!({ "total": 1 })).unwrap();
        assert_eq!(record.get("total"), Some(&json!(1)));
    }
}
