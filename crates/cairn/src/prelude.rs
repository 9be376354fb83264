//! Convenience re-exports for typical embedders.

pub use crate::collection::{
    ScalarMapStore, ScalarSetStore, ScalarWeakMapStore, ScalarWeakSetStore,
};
pub use crate::manager::{AnyStore, CollectionManager};
pub use cairn_core::{
    CairnError, JsonMarshal, Key, Marshal, MemVatStore, NullReferenceManager, Pattern,
    ReferenceManager, Result, Slot, Value, VatStore,
};
