//! Test double for the host's virtual-reference manager: tracks refcounts,
//! recognizer registrations, reanimators, and dropped-collection disposers,
//! and lets tests drive reclamation and disposal by hand.

use cairn::{Disposer, Reanimator, Recognizer, ReferenceManager, Result, Slot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct State {
    refcounts: BTreeMap<Slot, i64>,
    recognizers: BTreeMap<Slot, Vec<Recognizer>>,
    reanimators: BTreeMap<u64, Reanimator>,
    disposers: Vec<(String, Disposer)>,
    next_export_id: u64,
}

#[derive(Default)]
pub struct TrackingReferenceManager {
    state: Mutex<State>,
}

impl TrackingReferenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refcount(&self, slot: &str) -> i64 {
        *self.state.lock().refcounts.get(slot).unwrap_or(&0)
    }

    /// True when every slot's count has returned to zero.
    pub fn refcounts_balanced(&self) -> bool {
        self.state.lock().refcounts.values().all(|&n| n == 0)
    }

    pub fn recognizer_count(&self, slot: &str) -> usize {
        self.state
            .lock()
            .recognizers
            .get(slot)
            .map_or(0, Vec::len)
    }

    /// Simulate the host reclaiming `slot`: every recognizer fires and the
    /// registrations are dropped.
    pub fn reclaim(&self, slot: &str) {
        let fired = self.state.lock().recognizers.remove(slot);
        for recognizer in fired.into_iter().flatten() {
            recognizer(&slot.to_string());
        }
    }

    /// Simulate the host re-encountering a forgotten external identifier.
    pub fn run_reanimator(&self, kind_id: u64, external_id: &str) -> Result<()> {
        let reanimator = self
            .state
            .lock()
            .reanimators
            .get(&kind_id)
            .cloned()
            .expect("no reanimator registered for kind");
        reanimator(external_id)
    }

    /// Simulate the host deciding the collection owning `key_prefix` is
    /// unreachable.
    pub fn drop_collection(&self, key_prefix: &str) -> Result<()> {
        let disposer = self
            .state
            .lock()
            .disposers
            .iter()
            .find(|(prefix, _)| prefix == key_prefix)
            .map(|(_, d)| Arc::clone(d))
            .expect("no disposer registered for prefix");
        disposer()
    }
}

impl ReferenceManager for TrackingReferenceManager {
    fn allocate_export_id(&self) -> u64 {
        let mut state = self.state.lock();
        state.next_export_id += 1;
        state.next_export_id + 100
    }

    fn add_reachable_vref(&self, slot: &Slot) {
        *self.state.lock().refcounts.entry(slot.clone()).or_insert(0) += 1;
    }

    fn remove_reachable_vref(&self, slot: &Slot) {
        *self.state.lock().refcounts.entry(slot.clone()).or_insert(0) -= 1;
    }

    fn update_reference_counts(&self, before: &[Slot], after: &[Slot]) {
        // add-then-remove so a slot on both sides never transits zero
        let mut state = self.state.lock();
        for slot in after {
            *state.refcounts.entry(slot.clone()).or_insert(0) += 1;
        }
        for slot in before {
            *state.refcounts.entry(slot.clone()).or_insert(0) -= 1;
        }
    }

    fn add_recognizable_value(&self, slot: &Slot, recognizer: &Recognizer) {
        self.state
            .lock()
            .recognizers
            .entry(slot.clone())
            .or_default()
            .push(Arc::clone(recognizer));
    }

    fn remove_recognizable_value(&self, slot: &Slot, recognizer: &Recognizer) {
        if let Some(registered) = self.state.lock().recognizers.get_mut(slot) {
            registered.retain(|r| !Arc::ptr_eq(r, recognizer));
        }
    }

    fn register_reanimator(&self, kind_id: u64, reanimator: Reanimator) {
        self.state.lock().reanimators.insert(kind_id, reanimator);
    }

    fn register_dropped_collection(&self, key_prefix: String, disposer: Disposer) {
        self.state.lock().disposers.push((key_prefix, disposer));
    }
}
