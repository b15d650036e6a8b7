//! The remote scripting engine's serialized value model.
//!
//! Evaluation responses carry values shaped as
//! `{"btType": "...BTFSValueString", "value": ..., "typeTag": ""}`.
//! Only strings, arrays and maps matter to the gateway; every other engine
//! type decodes to [`TypedValue::Other`] so callers can report a tag
//! mismatch instead of failing the decode.

use std::fmt;

const BT_PREFIX: &str = "com.belmonttech.serialize.fsvalue.";
const BT_STRING: &str = "BTFSValueString";
const BT_ARRAY: &str = "BTFSValueArray";
const BT_MAP: &str = "BTFSValueMap";

/// Error decoding a value from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid typed value: {0}")]
pub struct ValueError(pub String);

/// Discriminator of a [`TypedValue`], used in mismatch messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    String,
    Array,
    Map,
    Other,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::String => "string",
            Tag::Array => "array",
            Tag::Map => "map",
            Tag::Other => "other",
        };
        f.write_str(name)
    }
}

/// A value returned by remote evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Array(Vec<TypedValue>),
    /// Entries in the order the engine reported them.
    Map(Vec<(TypedValue, TypedValue)>),
    /// Any other engine type, kept verbatim.
    Other {
        bt_type: String,
        value: serde_json::Value,
    },
}

impl TypedValue {
    pub fn tag(&self) -> Tag {
        match self {
            TypedValue::String(_) => Tag::String,
            TypedValue::Array(_) => Tag::Array,
            TypedValue::Map(_) => Tag::Map,
            TypedValue::Other { .. } => Tag::Other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(TypedValue, TypedValue)]> {
        match self {
            TypedValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a map value.
    pub fn map_get(&self, key: &str) -> Option<&TypedValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Decode from the wire form.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ValueError> {
        let obj = json
            .as_object()
            .ok_or_else(|| ValueError(format!("expected object, got {json}")))?;
        let bt_type = obj
            .get("btType")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ValueError("missing btType".to_string()))?;
        let value = obj.get("value").unwrap_or(&serde_json::Value::Null);

        match simple_type_name(bt_type) {
            BT_STRING => value
                .as_str()
                .map(|s| TypedValue::String(s.to_string()))
                .ok_or_else(|| ValueError(format!("{BT_STRING} with non-string value"))),
            BT_ARRAY => {
                let items = value
                    .as_array()
                    .ok_or_else(|| ValueError(format!("{BT_ARRAY} with non-array value")))?;
                items
                    .iter()
                    .map(TypedValue::from_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map(TypedValue::Array)
            }
            BT_MAP => {
                let entries = value
                    .as_array()
                    .ok_or_else(|| ValueError(format!("{BT_MAP} with non-array value")))?;
                entries
                    .iter()
                    .map(|entry| {
                        let key = entry
                            .get("key")
                            .ok_or_else(|| ValueError("map entry without key".to_string()))?;
                        let val = entry
                            .get("value")
                            .ok_or_else(|| ValueError("map entry without value".to_string()))?;
                        Ok((TypedValue::from_json(key)?, TypedValue::from_json(val)?))
                    })
                    .collect::<Result<Vec<_>, ValueError>>()
                    .map(TypedValue::Map)
            }
            _ => Ok(TypedValue::Other {
                bt_type: bt_type.to_string(),
                value: value.clone(),
            }),
        }
    }

    /// Encode to the wire form.
    pub fn to_json(&self) -> serde_json::Value {
        let (bt_type, value) = match self {
            TypedValue::String(s) => (
                format!("{BT_PREFIX}{BT_STRING}"),
                serde_json::Value::String(s.clone()),
            ),
            TypedValue::Array(items) => (
                format!("{BT_PREFIX}{BT_ARRAY}"),
                serde_json::Value::Array(items.iter().map(TypedValue::to_json).collect()),
            ),
            TypedValue::Map(entries) => (
                format!("{BT_PREFIX}{BT_MAP}"),
                serde_json::Value::Array(
                    entries
                        .iter()
                        .map(|(k, v)| serde_json::json!({"key": k.to_json(), "value": v.to_json()}))
                        .collect(),
                ),
            ),
            TypedValue::Other { bt_type, value } => (bt_type.clone(), value.clone()),
        };
        serde_json::json!({"btType": bt_type, "value": value, "typeTag": ""})
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

/// `com.belmonttech.serialize.fsvalue.BTFSValueString-1474` → `BTFSValueString`
fn simple_type_name(bt_type: &str) -> &str {
    let last = bt_type.rsplit('.').next().unwrap_or(bt_type);
    match last.split_once('-') {
        Some((name, suffix)) if suffix.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => last,
    }
}
