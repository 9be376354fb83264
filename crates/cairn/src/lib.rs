//! Cairn: persistent map and set collections over an ordered key/value
//! vat store.
//!
//! Collections survive process restarts by encoding keys as sortable
//! strings (lexicographic order of encoded keys equals rank order across
//! the whole key union), serializing values through a marshal layer, and
//! reporting every referenced slot to the host's reference manager so
//! reclamation stays precise. Pattern queries run as prefix range scans.
//!
//! # Quick Start
//!
//! ```
//! use cairn::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> cairn::Result<()> {
//! let store = Arc::new(MemVatStore::new());
//! let vrm = Arc::new(NullReferenceManager::new());
//! let manager = CollectionManager::new(store, vrm, Arc::new(JsonMarshal::new()))?;
//!
//! let settings = manager.make_scalar_map_store("settings", None)?;
//! settings.init(&Key::from("theme"), &Value::from("dark"))?;
//! assert_eq!(settings.get(&Key::from("theme"))?, Value::from("dark"));
//!
//! // handles can be rebuilt later from the external identifier
//! let id = settings.external_id();
//! let again = manager.reanimate(&id)?.into_scalar_map().unwrap();
//! assert_eq!(again.label(), "settings");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod collection;
pub mod iter;
pub mod kinds;
pub mod manager;
pub mod ordinal;
pub mod prelude;

// Re-export core types
pub use cairn_core::{
    CairnError, CapData, Disposer, JsonMarshal, Key, Marshal, MemVatStore,
    NullReferenceManager, Pattern, Reanimator, Recognizer, ReferenceManager, Result, ResultExt,
    Slot, Value, VatStore,
};

pub use collection::{
    ScalarMapStore, ScalarSetStore, ScalarWeakMapStore, ScalarWeakSetStore,
};
pub use iter::{CollectionIter, Entries, Keys, Values};
pub use kinds::CollectionKind;
pub use manager::{AnyStore, CollectionManager};
pub use ordinal::MAX_ORDINAL;
