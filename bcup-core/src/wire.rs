/*!
Typed-value translation for the Firestore REST API.

The REST API represents every field as a single-key object naming its kind
(`{"integerValue": "5"}`, `{"mapValue": {"fields": {...}}}`, ...). Documents
held in backups are plain JSON. [`WireValue`] is the typed form of the former;
[`encode`] and [`decode`] move between the two.

Two conversions are knowingly lossy and must stay that way so backups written
by other tools restore identically:

- plain empty arrays and empty objects both encode as an empty `mapValue`;
- timestamps, references and bytes decode to plain strings and therefore
  re-encode as `stringValue`.
*/

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Ordered field list of a `mapValue` or document.
pub type WireFields = Vec<(String, WireValue)>;

/// A single value in the REST API's discriminated representation.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Boolean(bool),
    /// 64-bit integer, carried on the wire as a decimal string
    Integer(i64),
    Double(f64),
    /// RFC 3339 timestamp, passed through untouched
    Timestamp(String),
    String(String),
    /// Base64 payload, passed through untouched
    Bytes(String),
    /// Full document resource name, passed through untouched
    Reference(String),
    GeoPoint { latitude: f64, longitude: f64 },
    Array(Vec<WireValue>),
    Map(WireFields),
}

impl WireValue {
    /// Parse a raw JSON wire value.
    ///
    /// The first recognised discriminant key wins. Values with no recognised
    /// key (or whose payload has the wrong JSON type) parse as `Null`.
    pub fn from_json(value: &Value) -> WireValue {
        let Some(object) = value.as_object() else {
            return WireValue::Null;
        };

        for (key, inner) in object {
            let parsed = match key.as_str() {
                "nullValue" => Some(WireValue::Null),
                "booleanValue" => inner.as_bool().map(WireValue::Boolean),
                "integerValue" => parse_integer(inner).map(WireValue::Integer),
                "doubleValue" => parse_double(inner).map(WireValue::Double),
                "timestampValue" => inner.as_str().map(|s| WireValue::Timestamp(s.to_string())),
                "stringValue" => inner.as_str().map(|s| WireValue::String(s.to_string())),
                "bytesValue" => inner.as_str().map(|s| WireValue::Bytes(s.to_string())),
                "referenceValue" => inner.as_str().map(|s| WireValue::Reference(s.to_string())),
                "geoPointValue" => Some(WireValue::GeoPoint {
                    latitude: inner.get("latitude").and_then(Value::as_f64).unwrap_or(0.0),
                    longitude: inner.get("longitude").and_then(Value::as_f64).unwrap_or(0.0),
                }),
                "arrayValue" => Some(WireValue::Array(
                    inner
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|values| values.iter().map(WireValue::from_json).collect())
                        .unwrap_or_default(),
                )),
                "mapValue" => Some(WireValue::Map(
                    inner
                        .get("fields")
                        .and_then(Value::as_object)
                        .map(fields_from_json)
                        .unwrap_or_default(),
                )),
                _ => None,
            };
            if let Some(parsed) = parsed {
                return parsed;
            }
        }

        WireValue::Null
    }

    /// Render this value in the REST API's JSON form.
    pub fn to_json(&self) -> Value {
        let (key, inner) = match self {
            WireValue::Null => ("nullValue", Value::Null),
            WireValue::Boolean(b) => ("booleanValue", Value::Bool(*b)),
            WireValue::Integer(i) => ("integerValue", Value::String(i.to_string())),
            WireValue::Double(d) => ("doubleValue", double_to_json(*d)),
            WireValue::Timestamp(s) => ("timestampValue", Value::String(s.clone())),
            WireValue::String(s) => ("stringValue", Value::String(s.clone())),
            WireValue::Bytes(s) => ("bytesValue", Value::String(s.clone())),
            WireValue::Reference(s) => ("referenceValue", Value::String(s.clone())),
            WireValue::GeoPoint {
                latitude,
                longitude,
            } => {
                let mut point = Map::new();
                point.insert("latitude".to_string(), double_to_json(*latitude));
                point.insert("longitude".to_string(), double_to_json(*longitude));
                ("geoPointValue", Value::Object(point))
            }
            WireValue::Array(values) => {
                let mut array = Map::new();
                array.insert(
                    "values".to_string(),
                    Value::Array(values.iter().map(WireValue::to_json).collect()),
                );
                ("arrayValue", Value::Object(array))
            }
            WireValue::Map(fields) => {
                let mut map = Map::new();
                map.insert("fields".to_string(), Value::Object(fields_to_json(fields)));
                ("mapValue", Value::Object(map))
            }
        };

        let mut wrapper = Map::new();
        wrapper.insert(key.to_string(), inner);
        Value::Object(wrapper)
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WireValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| WireValue::from_json(&value))
    }
}

/// Parse the `fields` object of a document or `mapValue`.
pub fn fields_from_json(fields: &Map<String, Value>) -> WireFields {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), WireValue::from_json(value)))
        .collect()
}

/// Render a field list as the `fields` object of a document or `mapValue`.
pub fn fields_to_json(fields: &WireFields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// Convert a wire value into plain JSON.
pub fn decode(wire: &WireValue) -> Value {
    match wire {
        WireValue::Null => Value::Null,
        WireValue::Boolean(b) => Value::Bool(*b),
        WireValue::Integer(i) => Value::Number(Number::from(*i)),
        WireValue::Double(d) => match Number::from_f64(*d) {
            Some(n) => Value::Number(n),
            None => Value::String(d.to_string()),
        },
        WireValue::Timestamp(s)
        | WireValue::String(s)
        | WireValue::Bytes(s)
        | WireValue::Reference(s) => Value::String(s.clone()),
        WireValue::GeoPoint {
            latitude,
            longitude,
        } => {
            let mut point = Map::new();
            point.insert("latitude".to_string(), decode(&WireValue::Double(*latitude)));
            point.insert("longitude".to_string(), decode(&WireValue::Double(*longitude)));
            Value::Object(point)
        }
        WireValue::Array(values) => Value::Array(values.iter().map(decode).collect()),
        WireValue::Map(fields) => Value::Object(decode_fields(fields)),
    }
}

/// Convert a wire field list into a plain JSON object.
pub fn decode_fields(fields: &WireFields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), decode(value)))
        .collect()
}

/// Convert plain JSON into a wire value.
pub fn encode(plain: &Value) -> WireValue {
    match plain {
        Value::Null => WireValue::Null,
        Value::Bool(b) => WireValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => WireValue::Integer(i),
            // u64 beyond i64::MAX has no integer kind on the wire
            None => WireValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => WireValue::String(s.clone()),
        Value::Array(values) if values.is_empty() => WireValue::Map(Vec::new()),
        Value::Array(values) => WireValue::Array(values.iter().map(encode).collect()),
        Value::Object(fields) => WireValue::Map(encode_fields(fields)),
    }
}

/// Convert a plain JSON object into a wire field list.
pub fn encode_fields(fields: &Map<String, Value>) -> WireFields {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), encode(value)))
        .collect()
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn parse_double(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

fn double_to_json(d: f64) -> Value {
    match Number::from_f64(d) {
        Some(n) => Value::Number(n),
        None if d.is_nan() => Value::String("NaN".to_string()),
        None if d > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_nested_map_and_array() {
        let wire = encode(&json!({"a": 5, "b": [1, 2]}));
        assert_eq!(
            wire.to_json(),
            json!({"mapValue": {"fields": {
                "a": {"integerValue": "5"},
                "b": {"arrayValue": {"values": [
                    {"integerValue": "1"},
                    {"integerValue": "2"}
                ]}}
            }}})
        );
    }

    #[test]
    fn test_empty_array_and_empty_object_encode_as_empty_map() {
        let empty_map = json!({"mapValue": {"fields": {}}});
        assert_eq!(encode(&json!([])).to_json(), empty_map);
        assert_eq!(encode(&json!({})).to_json(), empty_map);
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&json!(null)).to_json(), json!({"nullValue": null}));
        assert_eq!(encode(&json!(true)).to_json(), json!({"booleanValue": true}));
        assert_eq!(encode(&json!(-12)).to_json(), json!({"integerValue": "-12"}));
        assert_eq!(encode(&json!(1.5)).to_json(), json!({"doubleValue": 1.5}));
        assert_eq!(encode(&json!("hi")).to_json(), json!({"stringValue": "hi"}));
    }

    #[test]
    fn test_decode_every_kind() {
        let raw = json!({"mapValue": {"fields": {
            "n": {"nullValue": "NULL_VALUE"},
            "b": {"booleanValue": false},
            "i": {"integerValue": "9007199254740993"},
            "d": {"doubleValue": 2.25},
            "t": {"timestampValue": "2024-01-01T00:00:00Z"},
            "s": {"stringValue": "text"},
            "y": {"bytesValue": "AAEC"},
            "r": {"referenceValue": "projects/p/databases/(default)/documents/users/1"},
            "g": {"geoPointValue": {"latitude": 1.5, "longitude": -2.0}},
            "a": {"arrayValue": {"values": [{"stringValue": "x"}]}},
            "m": {"mapValue": {}}
        }}});

        let plain = decode(&WireValue::from_json(&raw));
        assert_eq!(
            plain,
            json!({
                "n": null,
                "b": false,
                "i": 9007199254740993i64,
                "d": 2.25,
                "t": "2024-01-01T00:00:00Z",
                "s": "text",
                "y": "AAEC",
                "r": "projects/p/databases/(default)/documents/users/1",
                "g": {"latitude": 1.5, "longitude": -2.0},
                "a": ["x"],
                "m": {}
            })
        );
    }

    #[test]
    fn test_unknown_discriminant_decodes_to_null() {
        assert_eq!(decode(&WireValue::from_json(&json!({"mysteryValue": 1}))), Value::Null);
        assert_eq!(decode(&WireValue::from_json(&json!("bare"))), Value::Null);
        assert_eq!(decode(&WireValue::from_json(&json!({}))), Value::Null);
    }

    #[test]
    fn test_empty_array_loses_kind_through_wire() {
        let plain = json!({"tags": []});
        let back = decode(&encode(&plain));
        assert_eq!(back, json!({"tags": {}}));
    }

    #[test]
    fn test_timestamp_reencodes_as_string() {
        let wire = WireValue::from_json(&json!({"timestampValue": "2024-05-01T10:00:00Z"}));
        let reencoded = encode(&decode(&wire));
        assert_eq!(
            reencoded,
            WireValue::String("2024-05-01T10:00:00Z".to_string())
        );
    }

    #[test]
    fn test_integer_accepts_number_payload() {
        let wire = WireValue::from_json(&json!({"integerValue": 42}));
        assert_eq!(wire, WireValue::Integer(42));
    }

    #[test]
    fn test_non_finite_double_survives_as_string() {
        let wire = WireValue::from_json(&json!({"doubleValue": "NaN"}));
        assert_eq!(decode(&wire), json!("NaN"));
        assert_eq!(wire.to_json(), json!({"doubleValue": "NaN"}));
    }

    #[test]
    fn test_serde_roundtrip_through_wire_json() {
        let wire = encode(&json!({"name": "bolt", "qty": 3, "dims": [1.5, 2.5]}));
        let text = serde_json::to_string(&wire).unwrap();
        let parsed: WireValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, wire);
    }

    #[test]
    fn test_field_order_is_preserved() {
        let fields = encode_fields(json!({"z": 1, "a": 2}).as_object().unwrap());
        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
    }
}
