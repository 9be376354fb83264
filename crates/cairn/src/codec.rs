//! Rank-preserving key codec.
//!
//! Each passable key encodes to a string whose first byte names the variant
//! and whose tail encodes the value so that lexicographic order of encoded
//! strings equals rank order across the whole key union. Prefix range scans
//! over encoded keys therefore implement pattern queries directly.
//!
//! Tags: `z` null, `u` undefined, `f` number, `s` string, `b` boolean,
//! `n` negative bigint, `p` non-negative bigint, `r` remotable, `y` symbol.
//!
//! `+0.0` and `-0.0` encode identically and are the same key.

use cairn_core::{CairnError, Key, Pattern, Result, Slot};
use num_bigint::{BigInt, BigUint, Sign};

/// Fixed decimal width of remotable ordinals and bigint length fields.
pub const ORDINAL_WIDTH: usize = 10;

/// 10^10: negative bigint length fields are stored as this minus the length.
const LENGTH_COMPLEMENT: u64 = 10_000_000_000;

/// Hook supplying the encoded form of a remotable key. Returns `None` when
/// the remotable has no ordinal in the collection at hand (and so cannot
/// currently be present as a key).
pub type RemotableEncoder<'a> = dyn FnMut(&Slot) -> Result<Option<String>> + 'a;

/// Encode a key to its sortable string form.
///
/// Returns `Ok(None)` only for a remotable the encoder has no ordinal for;
/// every other variant always encodes.
pub fn encode_key(
    key: &Key,
    encode_remotable: &mut RemotableEncoder<'_>,
) -> Result<Option<String>> {
    Ok(Some(match key {
        Key::Null => "z".to_string(),
        Key::Undefined => "u".to_string(),
        Key::Bool(b) => format!("b{b}"),
        Key::Number(n) => encode_number(*n),
        Key::BigInt(n) => encode_bigint(n),
        Key::Str(s) => format!("s{s}"),
        Key::Symbol(name) => format!("y{name}"),
        Key::Remotable(slot) => match encode_remotable(slot)? {
            Some(encoded) => encoded,
            None => return Ok(None),
        },
    }))
}

/// Decode an encoded key. Inverse of [`encode_key`] for every well-formed
/// input; fails with `DecodeCorruption` otherwise.
pub fn decode_key(encoded: &str) -> Result<Key> {
    let corrupt = |msg: &str| CairnError::DecodeCorruption(format!("{msg}: {encoded:?}"));
    let mut chars = encoded.chars();
    let tag = chars.next().ok_or_else(|| corrupt("empty encoded key"))?;
    let rest = chars.as_str();
    match tag {
        'z' if rest.is_empty() => Ok(Key::Null),
        'u' if rest.is_empty() => Ok(Key::Undefined),
        'b' => match rest {
            "true" => Ok(Key::Bool(true)),
            "false" => Ok(Key::Bool(false)),
            _ => Err(corrupt("bad boolean")),
        },
        'f' => decode_number(rest).ok_or_else(|| corrupt("bad number")),
        'n' | 'p' => decode_bigint(tag, rest).ok_or_else(|| corrupt("bad bigint")),
        's' => Ok(Key::Str(rest.to_string())),
        'y' => Ok(Key::Symbol(rest.to_string())),
        'r' => decode_remotable(rest).ok_or_else(|| corrupt("bad remotable")),
        _ => Err(corrupt("unrecognized tag")),
    }
}

/// Encoded-key bounds over-approximating a pattern's match set.
///
/// `Any`/`Scalar` cover the whole key space: every tag lies in `b..=z`, so
/// `("", "{")` spans all encoded keys while excluding `|`-metadata rows.
/// An `Eq` pattern covers exactly its one encoded key; an `Eq` on a
/// remotable with no ordinal covers nothing.
pub fn rank_cover(
    pattern: &Pattern,
    encode_remotable: &mut RemotableEncoder<'_>,
) -> Result<(String, String)> {
    match pattern {
        Pattern::Any | Pattern::Scalar => Ok((String::new(), "{".to_string())),
        Pattern::Eq(key) => match encode_key(key, encode_remotable)? {
            Some(encoded) => {
                let hi = format!("{encoded}\u{0}");
                Ok((encoded, hi))
            }
            None => Ok((String::new(), String::new())),
        },
    }
}

/// Encoded form of a remotable key: `r<10-digit ordinal>:<slot>`.
///
/// The ordinal carries the ordering; the slot is included so decoding can
/// recover the identity.
pub fn format_remotable(ordinal: u64, slot: &str) -> String {
    format!("r{ordinal:0width$}:{slot}", width = ORDINAL_WIDTH)
}

/// Map a double to 16 hex digits whose lexicographic order is the IEEE
/// total order, with NaN after all other values.
///
/// The sign bit is flipped for non-negatives and all 64 bits for negatives,
/// so negatives sort ascending toward zero and positives continue above.
/// `-0.0` is folded into `+0.0` before the flip, and NaN into the canonical
/// quiet NaN.
fn encode_number(n: f64) -> String {
    let n = if n == 0.0 {
        0.0
    } else if n.is_nan() {
        f64::NAN
    } else {
        n
    };
    let bits = n.to_bits();
    let mapped = if n < 0.0 { !bits } else { bits ^ (1 << 63) };
    format!("f{mapped:016x}")
}

fn decode_number(hex: &str) -> Option<Key> {
    if hex.len() != 16 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    let mapped = u64::from_str_radix(hex, 16).ok()?;
    let bits = if mapped >> 63 == 1 {
        mapped ^ (1 << 63)
    } else {
        !mapped
    };
    Some(Key::Number(f64::from_bits(bits)))
}

/// Sign-encoded, length-tagged decimal.
///
/// Non-negative: `p<10-digit length>:<digits>`; the length field orders by
/// magnitude first, digits break ties. Negative: the length field is
/// complemented (`10^10 - len`) so larger magnitudes sort earlier, and the
/// digit field is the 10's complement `10^len - |n|` so that within one
/// length less-negative values sort later.
fn encode_bigint(n: &BigInt) -> String {
    match n.sign() {
        Sign::Minus => {
            let digits = n.magnitude().to_str_radix(10);
            let len = digits.len();
            let complement = BigUint::from(10u32).pow(len as u32) - n.magnitude();
            let comp_digits = complement.to_str_radix(10);
            format!(
                "n{:0lw$}:{:0>dw$}",
                LENGTH_COMPLEMENT - len as u64,
                comp_digits,
                lw = ORDINAL_WIDTH,
                dw = len,
            )
        }
        _ => {
            let digits = n.to_str_radix(10);
            format!("p{:0lw$}:{digits}", digits.len(), lw = ORDINAL_WIDTH)
        }
    }
}

fn decode_bigint(tag: char, rest: &str) -> Option<Key> {
    let (len_field, digits) = rest.split_once(':')?;
    if len_field.len() != ORDINAL_WIDTH || !len_field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let len_value: u64 = len_field.parse().ok()?;
    let len = if tag == 'n' {
        LENGTH_COMPLEMENT.checked_sub(len_value)?
    } else {
        len_value
    };
    if digits.len() as u64 != len {
        return None;
    }
    let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10)?;
    let value = if tag == 'n' {
        let modulus = BigUint::from(10u32).pow(len as u32);
        if magnitude >= modulus {
            return None;
        }
        let value = BigInt::from(modulus - magnitude);
        // canonical form only: the recovered magnitude must fill the length
        if value.magnitude().to_str_radix(10).len() as u64 != len {
            return None;
        }
        -value
    } else {
        // canonical form only: no redundant leading zeros
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        BigInt::from(magnitude)
    };
    Some(Key::BigInt(value))
}

fn decode_remotable(rest: &str) -> Option<Key> {
    let (ordinal, slot) = rest.split_once(':')?;
    if ordinal.len() != ORDINAL_WIDTH || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if slot.is_empty() {
        return None;
    }
    Some(Key::Remotable(slot.to_string()))
}
