use crate::error::{CairnError, Result};
use crate::key::Key;
use serde::{Deserialize, Serialize};

/// The slice of the pattern language the collection engine consumes.
///
/// A collection's key schema is any of these; `scalar()` is the default.
/// In value position only `any()` is accepted (anything else is
/// `UnsupportedValuePattern`, reserved behavior). Whatever pattern a caller
/// supplies as a key schema is preserved verbatim in the collection's
/// persistent `|keySchema` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Matches any passable.
    Any,
    /// Matches any scalar key (every [`Key`] variant qualifies).
    Scalar,
    /// Matches exactly one key.
    Eq(Key),
}

impl Pattern {
    pub fn any() -> Self {
        Pattern::Any
    }

    pub fn scalar() -> Self {
        Pattern::Scalar
    }

    pub fn eq(key: impl Into<Key>) -> Self {
        Pattern::Eq(key.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Pattern::Any)
    }

    /// Whether `key` satisfies this pattern.
    ///
    /// Every `Key` is a scalar by construction, so `Scalar` and `Any` accept
    /// all of them.
    pub fn matches_key(&self, key: &Key) -> bool {
        match self {
            Pattern::Any | Pattern::Scalar => true,
            Pattern::Eq(want) => want == key,
        }
    }

    /// Reject anything but `any()` in value position.
    pub fn ensure_value_pattern(pattern: Option<&Pattern>) -> Result<()> {
        match pattern {
            None => Ok(()),
            Some(p) if p.is_any() => Ok(()),
            Some(_) => Err(CairnError::UnsupportedValuePattern),
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_scalar_matches_every_key_variant() {
        let keys = [
            Key::Null,
            Key::Undefined,
            Key::Bool(true),
            Key::Number(f64::NAN),
            Key::BigInt(BigInt::from(-7)),
            Key::Str("x".into()),
            Key::Symbol("tag".into()),
            Key::Remotable("o-1".into()),
        ];
        for key in &keys {
            assert!(Pattern::scalar().matches_key(key), "{key}");
        }
    }

    #[test]
    fn test_eq_uses_key_equality() {
        assert!(Pattern::eq(0.0).matches_key(&Key::Number(-0.0)));
        assert!(!Pattern::eq("a").matches_key(&Key::Str("b".into())));
    }

    #[test]
    fn test_value_position_only_accepts_any() {
        assert!(Pattern::ensure_value_pattern(None).is_ok());
        assert!(Pattern::ensure_value_pattern(Some(&Pattern::any())).is_ok());
        assert!(matches!(
            Pattern::ensure_value_pattern(Some(&Pattern::scalar())),
            Err(CairnError::UnsupportedValuePattern)
        ));
    }

    #[test]
    fn test_schema_serde_preserves_nan_eq_pattern() {
        let schema = Pattern::eq(f64::NAN);
        let json = serde_json::to_string(&schema).unwrap();
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
