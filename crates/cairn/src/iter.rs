//! Lazy, resumable range iteration over a collection.
//!
//! Each step performs at most one `get_after` probe against the vat store
//! and at most one value deserialize, resuming from the last key returned.
//! The scan is bounded by the rank cover of the key pattern, and a snapshot
//! of the collection's generation counter guards against structural
//! mutation: any mismatch surfaces as `ConcurrentModification`.
//!
//! Deleting through an open iterator's own yields is therefore unsafe;
//! collect keys first the way `clear` does.

use crate::codec;
use crate::collection::CollectionState;
use cairn_core::observe;
use cairn_core::{CairnError, CapData, Key, Pattern, Result, Value};
use std::sync::Arc;

pub struct CollectionIter {
    state: Arc<CollectionState>,
    prior_db_key: String,
    lo: String,
    hi: String,
    generation_at_start: u64,
    key_pattern: Pattern,
    value_pattern: Pattern,
    need_values: bool,
    done: bool,
}

impl CollectionIter {
    pub(crate) fn new(
        state: Arc<CollectionState>,
        key_pattern: Pattern,
        value_pattern: Pattern,
        need_values: bool,
    ) -> Result<Self> {
        let (cover_lo, cover_hi) =
            codec::rank_cover(&key_pattern, &mut |slot| state.lookup_remotable(slot))?;
        let lo = format!("{}{}", state.key_prefix, cover_lo);
        let hi = format!("{}{}", state.key_prefix, cover_hi);
        Ok(Self {
            generation_at_start: state.generation(),
            prior_db_key: String::new(),
            lo,
            hi,
            state,
            key_pattern,
            value_pattern,
            need_values,
            done: false,
        })
    }

    fn step(&mut self) -> Result<Option<(Key, Option<Value>)>> {
        loop {
            if self.state.generation() != self.generation_at_start {
                return Err(CairnError::ConcurrentModification);
            }
            observe::record_iter_probe();
            let Some((db_key, raw)) =
                self.state
                    .store
                    .get_after(&self.prior_db_key, &self.lo, Some(&self.hi))?
            else {
                return Ok(None);
            };
            if db_key.as_str() >= self.hi.as_str() {
                return Ok(None);
            }
            self.prior_db_key = db_key.clone();
            let encoded = db_key
                .strip_prefix(&self.state.key_prefix)
                .ok_or_else(|| CairnError::DecodeCorruption(db_key.clone()))?;
            let key = codec::decode_key(encoded)?;
            if !self.key_pattern.matches_key(&key) {
                continue;
            }
            if self.need_values || !self.value_pattern.is_any() {
                let data: CapData = serde_json::from_str(&raw)
                    .map_err(|e| CairnError::Serialization(format!("row {db_key:?}: {e}")))?;
                let value = self.state.marshal.unserialize(&data)?;
                // only `any` reaches here in value position; nothing to test
                return Ok(Some((key, Some(value))));
            }
            return Ok(Some((key, None)));
        }
    }
}

impl Iterator for CollectionIter {
    type Item = Result<(Key, Option<Value>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Key sequence in rank order.
pub struct Keys(pub(crate) CollectionIter);

impl Iterator for Keys {
    type Item = Result<Key>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|item| item.map(|(key, _)| key))
    }
}

/// Value sequence in key rank order.
pub struct Values(pub(crate) CollectionIter);

impl Iterator for Values {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|item| {
            item.and_then(|(_, value)| {
                value.ok_or_else(|| CairnError::Internal("value-less iteration step".into()))
            })
        })
    }
}

/// Entry sequence in key rank order.
pub struct Entries(pub(crate) CollectionIter);

impl Iterator for Entries {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|item| {
            item.and_then(|(key, value)| {
                let value = value
                    .ok_or_else(|| CairnError::Internal("value-less iteration step".into()))?;
                Ok((key, value))
            })
        })
    }
}
