//! Per-collection ordinal allocation for remotable keys.
//!
//! Opaque remote references have no canonical ordering and no stable textual
//! form, so each one that becomes a key is assigned a monotonically
//! increasing ordinal, persisted under `|<slot>` in the collection's prefix.
//! Ordinals are never reused within a collection.

use cairn_core::{CairnError, Result, Slot, VatStore};

/// Largest assignable ordinal: the fixed 10-digit field allows 10^10 - 1.
pub const MAX_ORDINAL: u64 = 9_999_999_999;

const NEXT_ORDINAL: &str = "nextOrdinal";

/// View over one collection's ordinal rows. Constructed per call; holds no
/// state beyond the store handle and the collection prefix.
pub(crate) struct OrdinalTable<'a> {
    store: &'a dyn VatStore,
    prefix: &'a str,
}

impl<'a> OrdinalTable<'a> {
    pub fn new(store: &'a dyn VatStore, prefix: &'a str) -> Self {
        Self { store, prefix }
    }

    fn next_key(&self) -> String {
        format!("{}|{NEXT_ORDINAL}", self.prefix)
    }

    fn slot_key(&self, slot: &Slot) -> String {
        format!("{}|{slot}", self.prefix)
    }

    /// Write the initial `|nextOrdinal` row for a fresh collection.
    pub fn init(&self) -> Result<()> {
        self.store.set(&self.next_key(), "1")
    }

    /// Ordinal currently assigned to `slot`, if any.
    pub fn get(&self, slot: &Slot) -> Result<Option<u64>> {
        match self.store.get(&self.slot_key(slot))? {
            None => Ok(None),
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| corrupt_row(&self.slot_key(slot), &raw)),
        }
    }

    /// Assign the next ordinal to `slot` and advance the counter.
    pub fn allocate(&self, slot: &Slot) -> Result<u64> {
        let next_key = self.next_key();
        let raw = self
            .store
            .get(&next_key)?
            .ok_or_else(|| CairnError::Store(format!("missing row {next_key:?}")))?;
        let next: u64 = raw.parse().map_err(|_| corrupt_row(&next_key, &raw))?;
        if next > MAX_ORDINAL {
            return Err(CairnError::OrdinalOverflow);
        }
        self.store.set(&self.slot_key(slot), &next.to_string())?;
        self.store.set(&next_key, &(next + 1).to_string())?;
        Ok(next)
    }

    /// Drop the ordinal row for `slot`. The ordinal is retired, not
    /// recycled: the counter never moves backward.
    pub fn remove(&self, slot: &Slot) -> Result<()> {
        self.store.delete(&self.slot_key(slot))
    }
}

fn corrupt_row(key: &str, raw: &str) -> CairnError {
    CairnError::Store(format!("non-numeric ordinal row {key:?}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::MemVatStore;

    #[test]
    fn test_allocation_is_monotonic() {
        let store = MemVatStore::new();
        let table = OrdinalTable::new(&store, "vc.1.");
        table.init().unwrap();

        assert_eq!(table.allocate(&"o-1".to_string()).unwrap(), 1);
        assert_eq!(table.allocate(&"o-2".to_string()).unwrap(), 2);
        assert_eq!(table.get(&"o-1".to_string()).unwrap(), Some(1));
        assert_eq!(table.get(&"o-9".to_string()).unwrap(), None);
    }

    #[test]
    fn test_removal_does_not_recycle() {
        let store = MemVatStore::new();
        let table = OrdinalTable::new(&store, "vc.1.");
        table.init().unwrap();

        table.allocate(&"o-1".to_string()).unwrap();
        table.remove(&"o-1".to_string()).unwrap();
        assert_eq!(table.get(&"o-1".to_string()).unwrap(), None);
        assert_eq!(table.allocate(&"o-1".to_string()).unwrap(), 2);
    }

    #[test]
    fn test_overflow() {
        let store = MemVatStore::new();
        let table = OrdinalTable::new(&store, "vc.1.");
        store
            .set("vc.1.|nextOrdinal", &(MAX_ORDINAL + 1).to_string())
            .unwrap();
        assert!(matches!(
            table.allocate(&"o-1".to_string()),
            Err(CairnError::OrdinalOverflow)
        ));
        // the last representable ordinal is still assignable
        store
            .set("vc.1.|nextOrdinal", &MAX_ORDINAL.to_string())
            .unwrap();
        assert_eq!(table.allocate(&"o-2".to_string()).unwrap(), MAX_ORDINAL);
    }

    #[test]
    fn test_collections_do_not_share_ordinals() {
        let store = MemVatStore::new();
        let a = OrdinalTable::new(&store, "vc.1.");
        let b = OrdinalTable::new(&store, "vc.2.");
        a.init().unwrap();
        b.init().unwrap();
        a.allocate(&"o-1".to_string()).unwrap();
        assert_eq!(b.allocate(&"o-1".to_string()).unwrap(), 1);
        assert_eq!(b.get(&"o-1".to_string()).unwrap(), Some(1));
    }
}
