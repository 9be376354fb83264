//! Persistent registry of collection kinds.
//!
//! Each kind name maps to a stable numeric kind ID recorded in the
//! `storeKindIDTable` row. IDs are allocated once, on first sight of a kind
//! name, from the reference manager's export-ID allocator; names already in
//! the table keep their IDs forever.

use cairn_core::{CairnError, ReferenceManager, Result, VatStore};
use std::collections::BTreeMap;

/// Top-level vat-store row holding the `{kindName: kindID}` table.
pub const KIND_ID_TABLE_KEY: &str = "storeKindIDTable";

/// The four collection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    ScalarMap,
    ScalarWeakMap,
    ScalarSet,
    ScalarWeakSet,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::ScalarMap,
        CollectionKind::ScalarWeakMap,
        CollectionKind::ScalarSet,
        CollectionKind::ScalarWeakSet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::ScalarMap => "scalarMapStore",
            CollectionKind::ScalarWeakMap => "scalarWeakMapStore",
            CollectionKind::ScalarSet => "scalarSetStore",
            CollectionKind::ScalarWeakSet => "scalarWeakSetStore",
        }
    }

    /// Weak-keyed kinds recognize their remotable keys instead of pinning
    /// them, and expose no size or iteration.
    pub fn has_weak_keys(self) -> bool {
        matches!(
            self,
            CollectionKind::ScalarWeakMap | CollectionKind::ScalarWeakSet
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// In-memory view of the persistent kind table.
#[derive(Debug, Default)]
pub struct KindRegistry {
    ids: BTreeMap<&'static str, u64>,
    kinds: BTreeMap<u64, CollectionKind>,
    initialized: bool,
}

impl KindRegistry {
    /// Load the table, allocating IDs for any kind names not yet present,
    /// and persist it if it changed. Idempotent within a process; never
    /// re-allocates an ID for a name already in the table.
    pub fn ensure_initialized(
        &mut self,
        store: &dyn VatStore,
        vrm: &dyn ReferenceManager,
    ) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let mut table: BTreeMap<String, u64> = match store.get(KIND_ID_TABLE_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| CairnError::Serialization(format!("kind table: {e}")))?,
            None => BTreeMap::new(),
        };
        let mut dirty = false;
        for kind in CollectionKind::ALL {
            if !table.contains_key(kind.name()) {
                table.insert(kind.name().to_string(), vrm.allocate_export_id());
                dirty = true;
            }
        }
        if dirty {
            let json = serde_json::to_string(&table)
                .map_err(|e| CairnError::Serialization(e.to_string()))?;
            store.set(KIND_ID_TABLE_KEY, &json)?;
        }
        for kind in CollectionKind::ALL {
            let id = table[kind.name()];
            self.ids.insert(kind.name(), id);
            self.kinds.insert(id, kind);
        }
        self.initialized = true;
        tracing::debug!(new_ids = dirty, "kind registry initialized");
        Ok(())
    }

    pub fn kind_id(&self, kind: CollectionKind) -> u64 {
        self.ids[kind.name()]
    }

    pub fn kind_for_id(&self, kind_id: u64) -> Option<CollectionKind> {
        self.kinds.get(&kind_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{Disposer, MemVatStore, Reanimator, Recognizer, Slot};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Allocator-only reference manager for registry tests.
    #[derive(Default)]
    struct IdAllocator {
        next: AtomicU64,
    }

    impl ReferenceManager for IdAllocator {
        fn allocate_export_id(&self) -> u64 {
            self.next.fetch_add(1, Ordering::SeqCst) + 10
        }
        fn add_reachable_vref(&self, _: &Slot) {}
        fn remove_reachable_vref(&self, _: &Slot) {}
        fn update_reference_counts(&self, _: &[Slot], _: &[Slot]) {}
        fn add_recognizable_value(&self, _: &Slot, _: &Recognizer) {}
        fn remove_recognizable_value(&self, _: &Slot, _: &Recognizer) {}
        fn register_reanimator(&self, _: u64, _: Reanimator) {}
        fn register_dropped_collection(&self, _: String, _: Disposer) {}
    }

    #[test]
    fn test_allocates_and_persists_ids() {
        let store = MemVatStore::new();
        let vrm = IdAllocator::default();
        let mut registry = KindRegistry::default();
        registry.ensure_initialized(&store, &vrm).unwrap();

        let map_id = registry.kind_id(CollectionKind::ScalarMap);
        assert_eq!(registry.kind_for_id(map_id), Some(CollectionKind::ScalarMap));
        assert!(store.get(KIND_ID_TABLE_KEY).unwrap().is_some());
    }

    #[test]
    fn test_reload_keeps_existing_ids() {
        let store = MemVatStore::new();
        store
            .set(KIND_ID_TABLE_KEY, r#"{"scalarMapStore":77}"#)
            .unwrap();
        let vrm = IdAllocator::default();
        let mut registry = KindRegistry::default();
        registry.ensure_initialized(&store, &vrm).unwrap();

        // the pre-existing name kept its ID; the other three were allocated
        assert_eq!(registry.kind_id(CollectionKind::ScalarMap), 77);
        let table: BTreeMap<String, u64> =
            serde_json::from_str(&store.get(KIND_ID_TABLE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table["scalarMapStore"], 77);
    }

    #[test]
    fn test_idempotent_within_process() {
        let store = MemVatStore::new();
        let vrm = IdAllocator::default();
        let mut registry = KindRegistry::default();
        registry.ensure_initialized(&store, &vrm).unwrap();
        let before = store.get(KIND_ID_TABLE_KEY).unwrap().unwrap();
        registry.ensure_initialized(&store, &vrm).unwrap();
        assert_eq!(store.get(KIND_ID_TABLE_KEY).unwrap().unwrap(), before);
        assert_eq!(vrm.next.load(Ordering::SeqCst), 4);
    }
}
