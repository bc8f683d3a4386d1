//! Document values and merge semantics.

use crate::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The field map of a document: JSON object keys to JSON values.
pub type Fields = serde_json::Map<String, Value>;

/// A decoded document snapshot: identifier plus field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The document's identifier within its collection.
    pub id: String,
    /// The document's fields.
    pub fields: Fields,
}

impl Document {
    /// Decodes the field map into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Deserialization` if the fields do not match the
    /// target type.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Deserialization {
                path: self.id.clone(),
                message: e.to_string(),
            }
        })
    }

    /// Encodes a typed value into a field map.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the value does not serialise to
    /// a JSON object.
    pub fn encode<T: Serialize>(value: &T) -> StoreResult<Fields> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StoreError::Serialization {
                path: String::new(),
                message: format!("expected a JSON object, got {other}"),
            }),
            Err(e) => Err(StoreError::Serialization {
                path: String::new(),
                message: e.to_string(),
            }),
        }
    }
}

/// Applies a merge write: named fields replace, all other fields stay.
///
/// Merge is shallow: a nested object named in `updates` replaces the whole
/// stored object under that key.
pub(crate) fn merge_fields(target: &mut Fields, updates: Fields) {
    for (key, value) in updates {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn merge_replaces_named_fields_only() {
        let mut target = fields(json!({"a": 1, "b": "keep", "c": {"x": 1}}));
        merge_fields(&mut target, fields(json!({"a": 2, "c": {"y": 2}})));

        assert_eq!(
            Value::Object(target),
            json!({"a": 2, "b": "keep", "c": {"y": 2}})
        );
    }

    #[test]
    fn encode_rejects_non_object_values() {
        let err = Document::encode(&42u32).expect_err("expected rejection");
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn decode_round_trips_typed_values() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Sample {
            name: String,
            count: u32,
        }

        let sample = Sample {
            name: "midazolam".into(),
            count: 2,
        };
        let doc = Document {
            id: "current".into(),
            fields: Document::encode(&sample).expect("encode"),
        };
        assert_eq!(doc.decode::<Sample>().expect("decode"), sample);
    }
}
