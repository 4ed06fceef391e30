//! Immutable builder products

use cocis_types::{ConstructionError, ConstructionResult, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable product of a successful [`BuilderSession::build`](crate::BuilderSession::build)
///
/// Holds every declared field, with defaults applied. Clones share one
/// field map; equality is value equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRepr", into = "RecordRepr")]
pub struct Record {
    product: String,
    fields: Arc<BTreeMap<String, Value>>,
}

#[derive(Serialize, Deserialize)]
struct RecordRepr {
    product: String,
    fields: BTreeMap<String, Value>,
}

impl From<RecordRepr> for Record {
    fn from(repr: RecordRepr) -> Self {
        Self::new(repr.product, repr.fields)
    }
}

impl From<Record> for RecordRepr {
    fn from(record: Record) -> Self {
        Self {
            product: record.product,
            fields: Arc::try_unwrap(record.fields).unwrap_or_else(|shared| (*shared).clone()),
        }
    }
}

impl Record {
    pub(crate) fn new(product: String, fields: BTreeMap<String, Value>) -> Self {
        Self {
            product,
            fields: Arc::new(fields),
        }
    }

    #[inline]
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Fields ordered by name
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check if both records share one field map
    #[inline]
    #[must_use]
    pub fn same_record(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }

    /// Integer field
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not an integer
    pub fn int(&self, field: &str) -> ConstructionResult<i64> {
        self.typed(field, "int", Value::as_int)
    }

    /// Float field; integers widen
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not numeric
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, field: &str) -> ConstructionResult<f64> {
        self.typed(field, "float", |v| {
            v.as_float().or_else(|| v.as_int().map(|i| i as f64))
        })
    }

    /// Text field
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not text
    pub fn text(&self, field: &str) -> ConstructionResult<&str> {
        self.typed(field, "text", Value::as_text)
    }

    /// Boolean field
    ///
    /// # Errors
    /// Returns `InvalidArgument` if absent or not a boolean
    pub fn bool(&self, field: &str) -> ConstructionResult<bool> {
        self.typed(field, "bool", Value::as_bool)
    }

    /// Encode as JSON
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a value cannot be encoded
    pub fn to_json(&self) -> ConstructionResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ConstructionError::invalid_argument(self.product.clone(), e.to_string()))
    }

    fn typed<'a, T>(
        &'a self,
        field: &str,
        expected: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> ConstructionResult<T> {
        self.fields.get(field).and_then(extract).ok_or_else(|| {
            ConstructionError::invalid_argument(field, format!("expected {expected} field"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("width".to_string(), Value::Int(4));
        fields.insert("color".to_string(), Value::from("black"));
        Record::new("rectangle".to_string(), fields)
    }

    #[test]
    fn typed_getters() {
        let r = record();
        assert_eq!(r.int("width").unwrap(), 4);
        assert_eq!(r.float("width").unwrap(), 4.0);
        assert_eq!(r.text("color").unwrap(), "black");
        assert!(r.text("width").is_err());
        assert!(r.int("height").is_err());
    }

    #[test]
    fn clones_share_fields() {
        let a = record();
        let b = a.clone();
        assert!(a.same_record(&b));
        assert_eq!(a, record());
        assert!(!a.same_record(&record()));
    }

    #[test]
    fn json_round_trip_preserves_value() {
        let r = record();
        let json = r.to_json().unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.product(), "rectangle");
    }
}
