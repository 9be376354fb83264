use crate::error::Result;
use crate::key::Slot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback a weak collection registers per remotable key: invoked with the
/// slot when the host reclaims the key, so the collection can drop the entry
/// and its ordinal row.
pub type Recognizer = Arc<dyn Fn(&Slot) + Send + Sync>;

/// Callback that rebuilds a live collection handle from its external
/// identifier (`o+<kindID>/<collectionID>`) when the host re-encounters it
/// after the in-memory handle was dropped.
pub type Reanimator = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Callback that destroys a collection's persistent state once the host
/// decides the collection itself is unreachable.
pub type Disposer = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// The host's virtual-reference manager, as seen by the collection engine.
///
/// Strong keys and all value-embedded slots pin their targets through the
/// reachable-vref refcounts; weak keys are merely recognized. The engine
/// adjusts counts on every `init`/`set`/`delete`; implementations must apply
/// `update_reference_counts` add-then-remove so a slot present on both sides
/// never transits zero.
pub trait ReferenceManager: Send + Sync {
    /// Allocate a fresh export ID (used for collection kind IDs).
    fn allocate_export_id(&self) -> u64;

    fn add_reachable_vref(&self, slot: &Slot);

    fn remove_reachable_vref(&self, slot: &Slot);

    /// Apply the symmetric difference of two slot lists: increment every
    /// slot in `after`, then decrement every slot in `before`.
    fn update_reference_counts(&self, before: &[Slot], after: &[Slot]);

    /// Register interest in `slot` without pinning it. `recognizer` is
    /// invoked when the slot's target is reclaimed.
    fn add_recognizable_value(&self, slot: &Slot, recognizer: &Recognizer);

    /// Remove a recognizer registration. Registrations are identified by
    /// the `Arc` pointer identity of the recognizer.
    fn remove_recognizable_value(&self, slot: &Slot, recognizer: &Recognizer);

    /// Register the reanimator for one collection kind.
    fn register_reanimator(&self, kind_id: u64, reanimator: Reanimator);

    /// Register a disposer to run when the collection owning `key_prefix`
    /// becomes unreachable.
    fn register_dropped_collection(&self, key_prefix: String, disposer: Disposer);
}

/// Inert host for standalone use: allocates export IDs and ignores every
/// reachability signal. Nothing is ever reclaimed and nothing reanimates
/// on its own; suitable when the embedder manages object lifetimes itself.
#[derive(Debug, Default)]
pub struct NullReferenceManager {
    next_export_id: AtomicU64,
}

impl NullReferenceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceManager for NullReferenceManager {
    fn allocate_export_id(&self) -> u64 {
        self.next_export_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn add_reachable_vref(&self, _slot: &Slot) {}

    fn remove_reachable_vref(&self, _slot: &Slot) {}

    fn update_reference_counts(&self, _before: &[Slot], _after: &[Slot]) {}

    fn add_recognizable_value(&self, _slot: &Slot, _recognizer: &Recognizer) {}

    fn remove_recognizable_value(&self, _slot: &Slot, _recognizer: &Recognizer) {}

    fn register_reanimator(&self, _kind_id: u64, _reanimator: Reanimator) {}

    fn register_dropped_collection(&self, _key_prefix: String, _disposer: Disposer) {}
}
