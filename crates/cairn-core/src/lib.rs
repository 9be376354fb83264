//! Cairn core: traits and types for the cairn collection manager.
//!
//! This crate defines the seams the engine is built against:
//! - Passable key and value domains ([`Key`], [`Value`])
//! - The marshal layer ([`Marshal`], [`CapData`]) with a JSON reference
//!   implementation
//! - The pattern surface the engine consumes ([`Pattern`]: `scalar`, `any`,
//!   `eq`)
//! - The ordered vat store ([`VatStore`]) with an in-memory reference
//!   implementation
//! - The host's virtual-reference manager ([`ReferenceManager`])

pub mod error;
pub mod key;
pub mod observe;
pub mod pattern;
pub mod store;
pub mod value;
pub mod vrm;

pub use error::{CairnError, Result, ResultExt};
pub use key::{Key, Slot};
pub use pattern::Pattern;
pub use store::{MemVatStore, VatStore};
pub use value::{CapData, JsonMarshal, Marshal, Value};
pub use vrm::{Disposer, NullReferenceManager, Reanimator, Recognizer, ReferenceManager};
