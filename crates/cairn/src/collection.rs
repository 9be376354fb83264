//! The collection engine and its four typed facades.
//!
//! A collection stores entries as rows under the prefix `vc.<id>.`:
//! encoded keys map to marshalled values, and `|`-prefixed metadata rows
//! hold the label, the key schema, and the ordinal table. Strong keys and
//! all value-embedded slots pin their targets through the reference
//! manager; weak keys are merely recognized.

use crate::codec::{self, format_remotable};
use crate::iter::{CollectionIter, Entries, Keys, Values};
use crate::kinds::CollectionKind;
use crate::ordinal::OrdinalTable;
use cairn_core::observe;
use cairn_core::{
    CairnError, CapData, Key, Marshal, Pattern, Recognizer, ReferenceManager, Result, Slot,
    Value, VatStore,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct Counters {
    /// Bumped on every mutation that can affect iteration; open iterators
    /// fail with `ConcurrentModification` when it moves.
    generation: u64,
    /// Entry count, not persisted. `None` after reanimation until the first
    /// `size()` recounts it.
    size: Option<u64>,
}

/// Shared state behind every facade over one collection.
pub(crate) struct CollectionState {
    pub(crate) store: Arc<dyn VatStore>,
    vrm: Arc<dyn ReferenceManager>,
    pub(crate) marshal: Arc<dyn Marshal>,
    label: String,
    collection_id: u64,
    kind: CollectionKind,
    kind_id: u64,
    key_schema: Pattern,
    pub(crate) key_prefix: String,
    counters: Mutex<Counters>,
    /// Recognizer a weak collection registers per remotable key; holds only
    /// a weak self-reference so the registration does not pin the handle.
    entry_deleter: Recognizer,
}

impl CollectionState {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: Arc<dyn VatStore>,
        vrm: Arc<dyn ReferenceManager>,
        marshal: Arc<dyn Marshal>,
        label: String,
        collection_id: u64,
        kind: CollectionKind,
        kind_id: u64,
        key_schema: Pattern,
        size: Option<u64>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<CollectionState>| {
            let handle = weak.clone();
            let entry_deleter: Recognizer = Arc::new(move |slot: &Slot| {
                if let Some(state) = handle.upgrade() {
                    if let Err(e) = state.reclaim_weak_key(slot) {
                        tracing::error!("failed to drop reclaimed weak key {slot}: {e}");
                    }
                }
            });
            CollectionState {
                store,
                vrm,
                marshal,
                label,
                key_prefix: format!("vc.{collection_id}."),
                collection_id,
                kind,
                kind_id,
                key_schema,
                counters: Mutex::new(Counters {
                    generation: 0,
                    size,
                }),
                entry_deleter,
            }
        })
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn key_schema(&self) -> &Pattern {
        &self.key_schema
    }

    pub(crate) fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// External identifier: `o+<kindID>/<collectionID>`.
    pub(crate) fn external_id(&self) -> String {
        format!("o+{}/{}", self.kind_id, self.collection_id)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.counters.lock().generation
    }

    fn bump_generation(&self) {
        self.counters.lock().generation += 1;
    }

    fn db_key(&self, encoded: &str) -> String {
        format!("{}{}", self.key_prefix, encoded)
    }

    fn ordinals(&self) -> OrdinalTable<'_> {
        OrdinalTable::new(self.store.as_ref(), &self.key_prefix)
    }

    fn check_schema(&self, key: &Key) -> Result<()> {
        if self.key_schema.matches_key(key) {
            Ok(())
        } else {
            Err(CairnError::SchemaViolation(key.to_string()))
        }
    }

    /// Encoded form of an existing remotable key, if it has an ordinal.
    pub(crate) fn lookup_remotable(&self, slot: &Slot) -> Result<Option<String>> {
        Ok(self
            .ordinals()
            .get(slot)?
            .map(|ordinal| format_remotable(ordinal, slot)))
    }

    /// Encode without allocating: `None` for a remotable that has no
    /// ordinal here (and so cannot currently be a key of this collection).
    fn encode_lookup(&self, key: &Key) -> Result<Option<String>> {
        codec::encode_key(key, &mut |slot| self.lookup_remotable(slot))
    }

    /// Encode a key that is expected to be encodable right now. A remotable
    /// with no ordinal fails with `OrdinalMissing`.
    fn encode_present(&self, key: &Key) -> Result<String> {
        self.encode_lookup(key)?
            .ok_or_else(|| CairnError::OrdinalMissing(key.to_string()))
    }

    fn read_row(&self, db_key: &str) -> Result<Option<CapData>> {
        match self.store.get(db_key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CairnError::Serialization(format!("row {db_key:?}: {e}"))),
        }
    }

    fn write_row(&self, db_key: &str, data: &CapData) -> Result<()> {
        let raw =
            serde_json::to_string(data).map_err(|e| CairnError::Serialization(e.to_string()))?;
        self.store.set(db_key, &raw)
    }

    pub(crate) fn has(&self, key: &Key) -> Result<bool> {
        if !self.key_schema.matches_key(key) {
            return Ok(false);
        }
        match key {
            Key::Remotable(slot) => Ok(self.ordinals().get(slot)?.is_some()),
            _ => match self.encode_lookup(key)? {
                Some(encoded) => Ok(self.store.get(&self.db_key(&encoded))?.is_some()),
                None => Ok(false),
            },
        }
    }

    pub(crate) fn get(&self, key: &Key) -> Result<Value> {
        self.check_schema(key)?;
        let encoded = self.encode_present(key)?;
        let data = self
            .read_row(&self.db_key(&encoded))?
            .ok_or_else(|| CairnError::NotFound(key.to_string()))?;
        self.marshal.unserialize(&data)
    }

    pub(crate) fn init(&self, key: &Key, value: &Value) -> Result<()> {
        self.check_schema(key)?;
        if self.has(key)? {
            return Err(CairnError::AlreadyPresent(key.to_string()));
        }
        // serialize before touching the ordinal table or the reference
        // manager: a rejected value must leave no side effect behind
        let data = self.marshal.serialize(value)?;
        let encoded = match key {
            Key::Remotable(slot) => {
                let ordinal = self.ordinals().allocate(slot)?;
                if self.kind.has_weak_keys() {
                    self.vrm.add_recognizable_value(slot, &self.entry_deleter);
                } else {
                    self.vrm.add_reachable_vref(slot);
                }
                format_remotable(ordinal, slot)
            }
            _ => self.encode_present(key)?,
        };
        self.vrm.update_reference_counts(&[], &data.slots);
        self.write_row(&self.db_key(&encoded), &data)?;
        let mut counters = self.counters.lock();
        if let Some(size) = counters.size.as_mut() {
            *size += 1;
        }
        counters.generation += 1;
        observe::record_op("init");
        Ok(())
    }

    pub(crate) fn set(&self, key: &Key, value: &Value) -> Result<()> {
        self.check_schema(key)?;
        let encoded = self.encode_present(key)?;
        let db_key = self.db_key(&encoded);
        let before = self
            .read_row(&db_key)?
            .ok_or_else(|| CairnError::NotFound(key.to_string()))?;
        let after = self.marshal.serialize(value)?;
        // add-then-remove so a slot on both sides never transits zero
        self.vrm.update_reference_counts(&before.slots, &after.slots);
        self.write_row(&db_key, &after)?;
        // value changes do not invalidate iteration: no generation bump
        observe::record_op("set");
        Ok(())
    }

    /// Remove one entry, maintaining refcounts, recognizers, and the
    /// ordinal table. Shared by `delete`, `clear`, and disposal.
    fn delete_entry(&self, key: &Key, encoded: &str) -> Result<()> {
        let db_key = self.db_key(encoded);
        let data = self
            .read_row(&db_key)?
            .ok_or_else(|| CairnError::NotFound(key.to_string()))?;
        // drop the row first; refcounts only move once it is actually gone
        self.store.delete(&db_key)?;
        self.vrm.update_reference_counts(&data.slots, &[]);
        if let Key::Remotable(slot) = key {
            self.ordinals().remove(slot)?;
            if self.kind.has_weak_keys() {
                self.vrm
                    .remove_recognizable_value(slot, &self.entry_deleter);
            } else {
                self.vrm.remove_reachable_vref(slot);
            }
        }
        let mut counters = self.counters.lock();
        if let Some(size) = counters.size.as_mut() {
            *size = size.saturating_sub(1);
        }
        Ok(())
    }

    pub(crate) fn delete(&self, key: &Key) -> Result<()> {
        self.check_schema(key)?;
        let encoded = self.encode_present(key)?;
        self.delete_entry(key, &encoded)?;
        self.bump_generation();
        observe::record_op("delete");
        Ok(())
    }

    /// Host notification that a weak key's target was reclaimed. Drops the
    /// entry row and the ordinal row directly: the key object is already
    /// gone, so the public `delete` path cannot be used.
    fn reclaim_weak_key(&self, slot: &Slot) -> Result<()> {
        let Some(ordinal) = self.ordinals().get(slot)? else {
            return Ok(());
        };
        let db_key = self.db_key(&format_remotable(ordinal, slot));
        if let Some(data) = self.read_row(&db_key)? {
            // drop the row first; refcounts only move once it is actually gone
            self.store.delete(&db_key)?;
            self.vrm.update_reference_counts(&data.slots, &[]);
            let mut counters = self.counters.lock();
            if let Some(size) = counters.size.as_mut() {
                *size = size.saturating_sub(1);
            }
        }
        self.ordinals().remove(slot)
    }

    /// Delete every entry matching `key_pattern` through the entry-delete
    /// path, so reference counts stay balanced. Metadata rows survive.
    pub(crate) fn clear_internal(&self, key_pattern: Option<&Pattern>) -> Result<()> {
        // collect first; deleting underneath the probe loop would skip rows
        let mut doomed: Vec<(Key, String)> = Vec::new();
        let mut prior = String::new();
        while let Some((db_key, _)) = self.store.get_after(&prior, &self.key_prefix, None)? {
            prior = db_key.clone();
            let encoded = &db_key[self.key_prefix.len()..];
            if encoded.starts_with('|') {
                continue;
            }
            let key = codec::decode_key(encoded)?;
            if let Some(pattern) = key_pattern {
                if !pattern.matches_key(&key) {
                    continue;
                }
            }
            doomed.push((key, encoded.to_string()));
        }
        for (key, encoded) in doomed {
            self.delete_entry(&key, &encoded)?;
        }
        Ok(())
    }

    pub(crate) fn clear(
        &self,
        key_pattern: Option<&Pattern>,
        value_pattern: Option<&Pattern>,
    ) -> Result<()> {
        Pattern::ensure_value_pattern(value_pattern)?;
        self.clear_internal(key_pattern)?;
        self.bump_generation();
        observe::record_op("clear");
        Ok(())
    }

    /// Entry count. A reanimated handle recounts on first access with one
    /// pass over the prefix, then maintains the cached count.
    pub(crate) fn size(&self) -> Result<u64> {
        if let Some(size) = self.counters.lock().size {
            return Ok(size);
        }
        let mut count = 0u64;
        let mut prior = String::new();
        while let Some((db_key, _)) = self.store.get_after(&prior, &self.key_prefix, None)? {
            if !db_key[self.key_prefix.len()..].starts_with('|') {
                count += 1;
            }
            prior = db_key;
        }
        self.counters.lock().size = Some(count);
        Ok(count)
    }

    /// Destroy the collection's persistent state: clear every entry through
    /// the delete path, then sweep any remaining rows under the prefix.
    pub(crate) fn dispose(&self) -> Result<()> {
        self.clear_internal(None)?;
        let mut prior = String::new();
        while let Some((db_key, _)) = self.store.get_after(&prior, &self.key_prefix, None)? {
            self.store.delete(&db_key)?;
            prior = db_key;
        }
        Ok(())
    }

    pub(crate) fn iter(
        self: &Arc<Self>,
        key_pattern: Option<Pattern>,
        value_pattern: Option<Pattern>,
        need_values: bool,
    ) -> Result<CollectionIter> {
        Pattern::ensure_value_pattern(value_pattern.as_ref())?;
        CollectionIter::new(
            Arc::clone(self),
            key_pattern.unwrap_or(Pattern::Scalar),
            value_pattern.unwrap_or(Pattern::Any),
            need_values,
        )
    }
}

/// Strong-keyed persistent map.
pub struct ScalarMapStore {
    pub(crate) state: Arc<CollectionState>,
}

impl ScalarMapStore {
    pub fn label(&self) -> &str {
        self.state.label()
    }

    pub fn external_id(&self) -> String {
        self.state.external_id()
    }

    pub fn key_schema(&self) -> &Pattern {
        self.state.key_schema()
    }

    /// Whether `key` is present. A key that fails the schema is simply not
    /// present; this never fails on schema grounds.
    pub fn has(&self, key: &Key) -> Result<bool> {
        self.state.has(key)
    }

    pub fn get(&self, key: &Key) -> Result<Value> {
        self.state.get(key)
    }

    /// Insert a fresh entry. Fails with `AlreadyPresent` if `key` exists.
    pub fn init(&self, key: &Key, value: &Value) -> Result<()> {
        self.state.init(key, value)
    }

    /// Replace the value of an existing entry. Fails with `NotFound` if
    /// `key` is absent. Does not disturb open iterators.
    pub fn set(&self, key: &Key, value: &Value) -> Result<()> {
        self.state.set(key, value)
    }

    pub fn delete(&self, key: &Key) -> Result<()> {
        self.state.delete(key)
    }

    pub fn size(&self) -> Result<u64> {
        self.state.size()
    }

    /// Lazy, single-pass key sequence in encoded-key (rank) order.
    pub fn keys(&self) -> Result<Keys> {
        self.keys_matching(None, None)
    }

    pub fn keys_matching(
        &self,
        key_pattern: Option<Pattern>,
        value_pattern: Option<Pattern>,
    ) -> Result<Keys> {
        let need_values = !value_pattern.as_ref().map_or(true, Pattern::is_any);
        Ok(Keys(self.state.iter(key_pattern, value_pattern, need_values)?))
    }

    pub fn values(&self) -> Result<Values> {
        self.values_matching(None, None)
    }

    pub fn values_matching(
        &self,
        key_pattern: Option<Pattern>,
        value_pattern: Option<Pattern>,
    ) -> Result<Values> {
        Ok(Values(self.state.iter(key_pattern, value_pattern, true)?))
    }

    pub fn entries(&self) -> Result<Entries> {
        self.entries_matching(None, None)
    }

    pub fn entries_matching(
        &self,
        key_pattern: Option<Pattern>,
        value_pattern: Option<Pattern>,
    ) -> Result<Entries> {
        Ok(Entries(self.state.iter(key_pattern, value_pattern, true)?))
    }

    /// Delete every matching entry, then invalidate open iterators once.
    pub fn clear(&self) -> Result<()> {
        self.state.clear(None, None)
    }

    pub fn clear_matching(
        &self,
        key_pattern: Option<&Pattern>,
        value_pattern: Option<&Pattern>,
    ) -> Result<()> {
        self.state.clear(key_pattern, value_pattern)
    }
}

/// Weak-keyed persistent map: remotable keys are recognized, not pinned.
/// No size, no iteration.
pub struct ScalarWeakMapStore {
    pub(crate) state: Arc<CollectionState>,
}

impl ScalarWeakMapStore {
    pub fn label(&self) -> &str {
        self.state.label()
    }

    pub fn external_id(&self) -> String {
        self.state.external_id()
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        self.state.has(key)
    }

    pub fn get(&self, key: &Key) -> Result<Value> {
        self.state.get(key)
    }

    pub fn init(&self, key: &Key, value: &Value) -> Result<()> {
        self.state.init(key, value)
    }

    pub fn set(&self, key: &Key, value: &Value) -> Result<()> {
        self.state.set(key, value)
    }

    pub fn delete(&self, key: &Key) -> Result<()> {
        self.state.delete(key)
    }
}

/// Strong-keyed persistent set.
pub struct ScalarSetStore {
    pub(crate) state: Arc<CollectionState>,
}

impl ScalarSetStore {
    pub fn label(&self) -> &str {
        self.state.label()
    }

    pub fn external_id(&self) -> String {
        self.state.external_id()
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        self.state.has(key)
    }

    /// Add an element. Fails with `AlreadyPresent` if it is already there.
    pub fn add(&self, key: &Key) -> Result<()> {
        self.state.init(key, &Value::Undefined)
    }

    pub fn delete(&self, key: &Key) -> Result<()> {
        self.state.delete(key)
    }

    pub fn size(&self) -> Result<u64> {
        self.state.size()
    }

    pub fn keys(&self) -> Result<Keys> {
        self.keys_matching(None)
    }

    pub fn keys_matching(&self, key_pattern: Option<Pattern>) -> Result<Keys> {
        Ok(Keys(self.state.iter(key_pattern, None, false)?))
    }

    pub fn clear(&self) -> Result<()> {
        self.state.clear(None, None)
    }

    pub fn clear_matching(&self, key_pattern: Option<&Pattern>) -> Result<()> {
        self.state.clear(key_pattern, None)
    }
}

/// Weak-keyed persistent set.
pub struct ScalarWeakSetStore {
    pub(crate) state: Arc<CollectionState>,
}

impl ScalarWeakSetStore {
    pub fn label(&self) -> &str {
        self.state.label()
    }

    pub fn external_id(&self) -> String {
        self.state.external_id()
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        self.state.has(key)
    }

    pub fn add(&self, key: &Key) -> Result<()> {
        self.state.init(key, &Value::Undefined)
    }

    pub fn delete(&self, key: &Key) -> Result<()> {
        self.state.delete(key)
    }
}
