//! Collection lifecycle: creation, reanimation, disposal.
//!
//! The manager owns the kind registry and the process-wide collection-ID
//! allocator. The allocator's high-water mark is persisted under a
//! top-level row so a restarted process never reuses an ID that already
//! names persistent rows.

use crate::collection::{
    CollectionState, ScalarMapStore, ScalarSetStore, ScalarWeakMapStore, ScalarWeakSetStore,
};
use crate::kinds::{CollectionKind, KindRegistry};
use crate::ordinal::OrdinalTable;
use cairn_core::observe;
use cairn_core::{
    CairnError, Disposer, Marshal, Pattern, Reanimator, ReferenceManager, Result, ResultExt,
    VatStore,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Top-level row persisting the collection-ID high-water mark.
pub const NEXT_COLLECTION_ID_KEY: &str = "storeNextCollectionID";

struct ManagerInner {
    store: Arc<dyn VatStore>,
    vrm: Arc<dyn ReferenceManager>,
    marshal: Arc<dyn Marshal>,
    kinds: KindRegistry,
    next_collection_id: Mutex<u64>,
}

/// Entry point: materializes persistent collections over a vat store.
pub struct CollectionManager {
    inner: Arc<ManagerInner>,
}

impl CollectionManager {
    /// Open a manager over a vat store. Initializes the kind registry
    /// (allocating kind IDs on first use) and registers a reanimator per
    /// kind with the reference manager.
    pub fn new(
        store: Arc<dyn VatStore>,
        vrm: Arc<dyn ReferenceManager>,
        marshal: Arc<dyn Marshal>,
    ) -> Result<Self> {
        let mut kinds = KindRegistry::default();
        kinds.ensure_initialized(store.as_ref(), vrm.as_ref())?;
        let next_collection_id = match store.get(NEXT_COLLECTION_ID_KEY)? {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| CairnError::Store(format!("non-numeric {NEXT_COLLECTION_ID_KEY}")))?,
            None => 1,
        };
        let inner = Arc::new(ManagerInner {
            store,
            vrm,
            marshal,
            kinds,
            next_collection_id: Mutex::new(next_collection_id),
        });
        // The reference manager holds only weak manager handles, so the
        // registrations do not keep the manager alive.
        for kind in CollectionKind::ALL {
            let kind_id = inner.kinds.kind_id(kind);
            let weak = Arc::downgrade(&inner);
            let reanimator: Reanimator = Arc::new(move |external_id: &str| {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| CairnError::Internal("collection manager is gone".into()))?;
                ManagerInner::reanimate_state(&inner, external_id).map(|_| ())
            });
            inner.vrm.register_reanimator(kind_id, reanimator);
        }
        Ok(Self { inner })
    }

    pub fn make_scalar_map_store(
        &self,
        label: &str,
        key_schema: Option<Pattern>,
    ) -> Result<ScalarMapStore> {
        let state = self.make_collection(CollectionKind::ScalarMap, label, key_schema)?;
        Ok(ScalarMapStore { state })
    }

    pub fn make_scalar_weak_map_store(
        &self,
        label: &str,
        key_schema: Option<Pattern>,
    ) -> Result<ScalarWeakMapStore> {
        let state = self.make_collection(CollectionKind::ScalarWeakMap, label, key_schema)?;
        Ok(ScalarWeakMapStore { state })
    }

    pub fn make_scalar_set_store(
        &self,
        label: &str,
        key_schema: Option<Pattern>,
    ) -> Result<ScalarSetStore> {
        let state = self.make_collection(CollectionKind::ScalarSet, label, key_schema)?;
        Ok(ScalarSetStore { state })
    }

    pub fn make_scalar_weak_set_store(
        &self,
        label: &str,
        key_schema: Option<Pattern>,
    ) -> Result<ScalarWeakSetStore> {
        let state = self.make_collection(CollectionKind::ScalarWeakSet, label, key_schema)?;
        Ok(ScalarWeakSetStore { state })
    }

    /// Rebuild a live handle from its external identifier. The handle
    /// shares the persistent rows with any other handle over the same
    /// collection, but carries its own generation counter and size cache.
    pub fn reanimate(&self, external_id: &str) -> Result<AnyStore> {
        let state = ManagerInner::reanimate_state(&self.inner, external_id)?;
        Ok(AnyStore::from_state(state))
    }

    /// Destroy a collection: clear every entry through the delete path
    /// (maintaining reference counts), then sweep all remaining rows under
    /// its prefix.
    pub fn delete_collection(&self, external_id: &str) -> Result<()> {
        let state = ManagerInner::reanimate_state(&self.inner, external_id)?;
        state
            .dispose()
            .with_context(|| format!("while disposing collection {external_id}"))?;
        tracing::debug!(external_id, "deleted collection");
        observe::record_lifecycle("deleted");
        Ok(())
    }

    fn make_collection(
        &self,
        kind: CollectionKind,
        label: &str,
        key_schema: Option<Pattern>,
    ) -> Result<Arc<CollectionState>> {
        let inner = &self.inner;
        let key_schema = key_schema.unwrap_or_default();
        let collection_id = inner.allocate_collection_id()?;
        let prefix = format!("vc.{collection_id}.");
        inner.store.set(&format!("{prefix}|label"), label)?;
        let schema_json = serde_json::to_string(&key_schema)
            .map_err(|e| CairnError::Serialization(e.to_string()))?;
        inner
            .store
            .set(&format!("{prefix}|keySchema"), &schema_json)?;
        OrdinalTable::new(inner.store.as_ref(), &prefix).init()?;

        let kind_id = inner.kinds.kind_id(kind);
        let state = CollectionState::new(
            Arc::clone(&inner.store),
            Arc::clone(&inner.vrm),
            Arc::clone(&inner.marshal),
            label.to_string(),
            collection_id,
            kind,
            kind_id,
            key_schema,
            Some(0),
        );

        let weak = Arc::downgrade(inner);
        let external_id = state.external_id();
        let disposer: Disposer = Arc::new(move || {
            let inner = weak
                .upgrade()
                .ok_or_else(|| CairnError::Internal("collection manager is gone".into()))?;
            ManagerInner::reanimate_state(&inner, &external_id)?.dispose()
        });
        inner.vrm.register_dropped_collection(prefix, disposer);

        tracing::debug!(
            collection_id,
            kind = kind.name(),
            label,
            "created collection"
        );
        observe::record_lifecycle("created");
        Ok(state)
    }
}

impl ManagerInner {
    fn allocate_collection_id(&self) -> Result<u64> {
        let mut next = self.next_collection_id.lock();
        let id = *next;
        *next += 1;
        self.store.set(NEXT_COLLECTION_ID_KEY, &next.to_string())?;
        Ok(id)
    }

    fn reanimate_state(inner: &Arc<ManagerInner>, external_id: &str) -> Result<Arc<CollectionState>> {
        let (kind_id, collection_id) = parse_external_id(external_id)?;
        let kind = inner
            .kinds
            .kind_for_id(kind_id)
            .ok_or_else(|| CairnError::UnknownKind(format!("kind id {kind_id}")))?;
        let prefix = format!("vc.{collection_id}.");
        let label = inner
            .store
            .get(&format!("{prefix}|label"))?
            .ok_or_else(|| CairnError::NotFound(format!("collection {external_id}")))?;
        let schema_json = inner
            .store
            .get(&format!("{prefix}|keySchema"))?
            .ok_or_else(|| CairnError::NotFound(format!("collection {external_id}")))?;
        let key_schema: Pattern = serde_json::from_str(&schema_json)
            .map_err(|e| CairnError::Serialization(format!("key schema: {e}")))?;
        let state = CollectionState::new(
            Arc::clone(&inner.store),
            Arc::clone(&inner.vrm),
            Arc::clone(&inner.marshal),
            label,
            collection_id,
            kind,
            kind_id,
            key_schema,
            None,
        );
        tracing::debug!(external_id, "reanimated collection");
        observe::record_lifecycle("reanimated");
        Ok(state)
    }
}

/// A reanimated handle of whichever kind the external identifier named.
pub enum AnyStore {
    ScalarMap(ScalarMapStore),
    ScalarWeakMap(ScalarWeakMapStore),
    ScalarSet(ScalarSetStore),
    ScalarWeakSet(ScalarWeakSetStore),
}

impl AnyStore {
    fn from_state(state: Arc<CollectionState>) -> Self {
        match state.kind() {
            CollectionKind::ScalarMap => AnyStore::ScalarMap(ScalarMapStore { state }),
            CollectionKind::ScalarWeakMap => {
                AnyStore::ScalarWeakMap(ScalarWeakMapStore { state })
            }
            CollectionKind::ScalarSet => AnyStore::ScalarSet(ScalarSetStore { state }),
            CollectionKind::ScalarWeakSet => {
                AnyStore::ScalarWeakSet(ScalarWeakSetStore { state })
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AnyStore::ScalarMap(s) => s.label(),
            AnyStore::ScalarWeakMap(s) => s.label(),
            AnyStore::ScalarSet(s) => s.label(),
            AnyStore::ScalarWeakSet(s) => s.label(),
        }
    }

    pub fn external_id(&self) -> String {
        match self {
            AnyStore::ScalarMap(s) => s.external_id(),
            AnyStore::ScalarWeakMap(s) => s.external_id(),
            AnyStore::ScalarSet(s) => s.external_id(),
            AnyStore::ScalarWeakSet(s) => s.external_id(),
        }
    }

    pub fn into_scalar_map(self) -> Option<ScalarMapStore> {
        match self {
            AnyStore::ScalarMap(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_scalar_weak_map(self) -> Option<ScalarWeakMapStore> {
        match self {
            AnyStore::ScalarWeakMap(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_scalar_set(self) -> Option<ScalarSetStore> {
        match self {
            AnyStore::ScalarSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_scalar_weak_set(self) -> Option<ScalarWeakSetStore> {
        match self {
            AnyStore::ScalarWeakSet(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse `o+<kindID>/<collectionID>`.
fn parse_external_id(external_id: &str) -> Result<(u64, u64)> {
    let bad = || CairnError::InvalidExternalId(external_id.to_string());
    let body = external_id.strip_prefix("o+").ok_or_else(bad)?;
    let (kind_id, collection_id) = body.split_once('/').ok_or_else(bad)?;
    Ok((
        kind_id.parse().map_err(|_| bad())?,
        collection_id.parse().map_err(|_| bad())?,
    ))
}
