//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, key operations emit counters via
//! the [`metrics`] crate; a downstream application must install a recorder
//! to collect them. Without the feature every function here is a zero-cost
//! no-op.

/// Record one collection operation.
///
/// - `cairn.collection.ops_total` – counter with an `op` label
///   (`init` / `set` / `delete` / `clear`)
#[inline]
pub fn record_op(op: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.collection.ops_total", "op" => op).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = op;
    }
}

/// Record one iterator probe against the vat store.
///
/// - `cairn.iter.probes_total` – counter
#[inline]
pub fn record_iter_probe() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.iter.probes_total").increment(1);
    }
}

/// Record a collection lifecycle event.
///
/// - `cairn.collection.lifecycle_total` – counter with an `event` label
///   (`created` / `reanimated` / `deleted`)
#[inline]
pub fn record_lifecycle(event: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("cairn.collection.lifecycle_total", "event" => event).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = event;
    }
}
