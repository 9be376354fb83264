use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable textual identifier assigned to an opaque remote object by the host
/// (e.g. `o-3`, `o+12/7`).
pub type Slot = String;

/// A passable key: the domain of values a collection accepts as keys.
///
/// Only scalars and opaque remote references qualify; composites (lists,
/// records) and other pass styles are rejected at the `Value` → `Key`
/// conversion with `UnsupportedKeyPassStyle`.
///
/// Equality follows the rank-order conventions of the key codec: `+0.0` and
/// `-0.0` are the same key, and `NaN` equals `NaN` (a single rank position).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    Null,
    Undefined,
    Bool(bool),
    Number(#[serde(with = "f64_bits")] f64),
    BigInt(#[serde(with = "bigint_dec")] BigInt),
    Str(String),
    Symbol(String),
    Remotable(Slot),
}

impl Key {
    /// Canonical bit pattern for the number variant: `-0.0` folds into
    /// `+0.0` and every NaN folds into the canonical quiet NaN.
    pub fn canonical_number_bits(n: f64) -> u64 {
        if n == 0.0 {
            0
        } else if n.is_nan() {
            f64::NAN.to_bits()
        } else {
            n.to_bits()
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        use Key::*;
        match (self, other) {
            (Null, Null) | (Undefined, Undefined) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => {
                Self::canonical_number_bits(*a) == Self::canonical_number_bits(*b)
            }
            (BigInt(a), BigInt(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Remotable(a), Remotable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Null => write!(f, "null"),
            Key::Undefined => write!(f, "undefined"),
            Key::Bool(b) => write!(f, "{b}"),
            Key::Number(n) => write!(f, "{n}"),
            Key::BigInt(n) => write!(f, "{n}n"),
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Symbol(name) => write!(f, "symbol({name})"),
            Key::Remotable(slot) => write!(f, "remotable({slot})"),
        }
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<BigInt> for Key {
    fn from(n: BigInt) -> Self {
        Key::BigInt(n)
    }
}

/// Serde the number variant through its raw IEEE-754 bits so NaN and signed
/// zero survive a round trip through JSON (which has neither).
mod f64_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &f64, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(n.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
        Ok(f64::from_bits(u64::deserialize(de)?))
    }
}

/// Serde bigints as signed decimal strings.
mod bigint_dec {
    use num_bigint::BigInt;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &BigInt, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&n.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<BigInt, D::Error> {
        let s = String::deserialize(de)?;
        s.parse::<BigInt>()
            .map_err(|e| D::Error::custom(format!("bad bigint literal: {e}")))
    }
}
