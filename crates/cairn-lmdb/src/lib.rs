//! LMDB-backed vat store.
//!
//! Persistent implementation of the `VatStore` interface: string rows in a
//! single LMDB database, with `get_after` served by short-lived cursor
//! probes so the engine's resumable scans never hold a transaction open.

pub mod config;
pub mod store;

pub use config::LmdbStoreConfig;
pub use store::LmdbVatStore;
