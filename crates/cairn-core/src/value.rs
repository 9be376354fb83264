use crate::error::{CairnError, Result};
use crate::key::{Key, Slot};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// A passable value: the domain of values a collection stores.
///
/// Superset of [`Key`]: adds the composite variants, which can appear in
/// values but are rejected as keys.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    BigInt(BigInt),
    Str(String),
    Symbol(String),
    Remotable(Slot),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) | (Undefined, Undefined) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => {
                Key::canonical_number_bits(*a) == Key::canonical_number_bits(*b)
            }
            (BigInt(a), BigInt(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Remotable(a), Remotable(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        match key {
            Key::Null => Value::Null,
            Key::Undefined => Value::Undefined,
            Key::Bool(b) => Value::Bool(*b),
            Key::Number(n) => Value::Number(*n),
            Key::BigInt(n) => Value::BigInt(n.clone()),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Symbol(s) => Value::Symbol(s.clone()),
            Key::Remotable(slot) => Value::Remotable(slot.clone()),
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = CairnError;

    /// Narrow a value to a key. Composites have no rank order and are
    /// rejected with `UnsupportedKeyPassStyle`.
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Key::Null),
            Value::Undefined => Ok(Key::Undefined),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Number(n) => Ok(Key::Number(*n)),
            Value::BigInt(n) => Ok(Key::BigInt(n.clone())),
            Value::Str(s) => Ok(Key::Str(s.clone())),
            Value::Symbol(s) => Ok(Key::Symbol(s.clone())),
            Value::Remotable(slot) => Ok(Key::Remotable(slot.clone())),
            Value::List(_) => Err(CairnError::UnsupportedKeyPassStyle("list".into())),
            Value::Record(_) => Err(CairnError::UnsupportedKeyPassStyle("record".into())),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Transport form of a marshalled value: a JSON body plus the slots it
/// references, listed side-band so the engine can adjust reference counts
/// without interpreting the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapData {
    pub body: String,
    pub slots: Vec<Slot>,
}

/// The external marshal layer: values cross into and out of the store as
/// [`CapData`]. The engine never interprets bodies; it only reads `slots`.
pub trait Marshal: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<CapData>;
    fn unserialize(&self, data: &CapData) -> Result<Value>;
}

/// Reference marshaller: bodies are JSON with `{"@qclass": ...}` escapes for
/// the variants JSON cannot carry (undefined, non-finite numbers, bigints,
/// symbols, remotable slot references).
#[derive(Debug, Default)]
pub struct JsonMarshal;

impl JsonMarshal {
    pub fn new() -> Self {
        Self
    }

    fn encode(value: &Value, slots: &mut Vec<Slot>) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Undefined => json!({ "@qclass": "undefined" }),
            Value::Bool(b) => json!(b),
            Value::Number(n) if n.is_nan() => json!({ "@qclass": "NaN" }),
            Value::Number(n) if *n == f64::INFINITY => json!({ "@qclass": "Infinity" }),
            Value::Number(n) if *n == f64::NEG_INFINITY => json!({ "@qclass": "-Infinity" }),
            Value::Number(n) => json!(n),
            Value::BigInt(n) => json!({ "@qclass": "bigint", "digits": n.to_str_radix(10) }),
            Value::Symbol(name) => json!({ "@qclass": "symbol", "name": name }),
            Value::Remotable(slot) => {
                let index = match slots.iter().position(|s| s == slot) {
                    Some(i) => i,
                    None => {
                        slots.push(slot.clone());
                        slots.len() - 1
                    }
                };
                json!({ "@qclass": "slot", "index": index })
            }
            Value::Str(s) => json!(s),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(|v| Self::encode(v, slots)).collect(),
            ),
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::encode(v, slots)))
                    .collect(),
            ),
        }
    }

    fn decode(body: &serde_json::Value, slots: &[Slot]) -> Result<Value> {
        let bad = |msg: &str| CairnError::Marshal(msg.to_string());
        match body {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| bad("non-f64 number")),
            serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
            serde_json::Value::Array(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|v| Self::decode(v, slots))
                    .collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(fields) => {
                let Some(qclass) = fields.get("@qclass").and_then(|q| q.as_str()) else {
                    return Ok(Value::Record(
                        fields
                            .iter()
                            .map(|(k, v)| Ok((k.clone(), Self::decode(v, slots)?)))
                            .collect::<Result<_>>()?,
                    ));
                };
                match qclass {
                    "undefined" => Ok(Value::Undefined),
                    "NaN" => Ok(Value::Number(f64::NAN)),
                    "Infinity" => Ok(Value::Number(f64::INFINITY)),
                    "-Infinity" => Ok(Value::Number(f64::NEG_INFINITY)),
                    "bigint" => {
                        let digits = fields
                            .get("digits")
                            .and_then(|d| d.as_str())
                            .ok_or_else(|| bad("bigint without digits"))?;
                        digits
                            .parse::<BigInt>()
                            .map(Value::BigInt)
                            .map_err(|e| bad(&format!("bad bigint digits: {e}")))
                    }
                    "symbol" => fields
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(|n| Value::Symbol(n.to_string()))
                        .ok_or_else(|| bad("symbol without name")),
                    "slot" => {
                        let index = fields
                            .get("index")
                            .and_then(|i| i.as_u64())
                            .ok_or_else(|| bad("slot without index"))?;
                        slots
                            .get(index as usize)
                            .map(|s| Value::Remotable(s.clone()))
                            .ok_or_else(|| bad("slot index out of range"))
                    }
                    other => Err(bad(&format!("unknown @qclass {other:?}"))),
                }
            }
        }
    }
}

impl Marshal for JsonMarshal {
    fn serialize(&self, value: &Value) -> Result<CapData> {
        let mut slots = Vec::new();
        let body = Self::encode(value, &mut slots);
        let body = serde_json::to_string(&body)
            .map_err(|e| CairnError::Marshal(e.to_string()))?;
        Ok(CapData { body, slots })
    }

    fn unserialize(&self, data: &CapData) -> Result<Value> {
        let body: serde_json::Value = serde_json::from_str(&data.body)
            .map_err(|e| CairnError::Marshal(e.to_string()))?;
        Self::decode(&body, &data.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) -> (CapData, Value) {
        let m = JsonMarshal::new();
        let data = m.serialize(&value).unwrap();
        let back = m.unserialize(&data).unwrap();
        (data, back)
    }

    #[test]
    fn test_slots_collected_in_order() {
        let value = Value::List(vec![
            Value::Remotable("o-1".into()),
            Value::Str("mid".into()),
            Value::Remotable("o-2".into()),
            Value::Remotable("o-1".into()),
        ]);
        let (data, back) = round_trip(value.clone());
        assert_eq!(data.slots, vec!["o-1".to_string(), "o-2".to_string()]);
        assert_eq!(back, value);
    }

    #[test]
    fn test_special_numbers_round_trip() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 2.5] {
            let (_, back) = round_trip(Value::Number(n));
            assert_eq!(back, Value::Number(n));
        }
    }

    #[test]
    fn test_record_and_bigint_round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert("count".to_string(), Value::BigInt(BigInt::from(1u8) << 100));
        fields.insert("who".to_string(), Value::Remotable("o-9".into()));
        let (data, back) = round_trip(Value::Record(fields.clone()));
        assert_eq!(back, Value::Record(fields));
        assert_eq!(data.slots, vec!["o-9".to_string()]);
    }

    #[test]
    fn test_composites_rejected_as_keys() {
        let err = Key::try_from(&Value::List(vec![])).unwrap_err();
        assert!(matches!(err, CairnError::UnsupportedKeyPassStyle(_)));
    }
}
