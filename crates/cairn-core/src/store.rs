use crate::error::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;

/// The ordered string key/value store a collection manager runs against.
///
/// Every operation is a synchronous request-reply; the engine issues at most
/// one call per step and never holds a cursor open across calls.
pub trait VatStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete is idempotent: removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Return the smallest key strictly greater than `prior_key` within
    /// `[lower_bound, upper_bound)`, together with its value.
    ///
    /// When `upper_bound` is `None`, `lower_bound` is treated as a key
    /// prefix and the scan is bounded to keys carrying that prefix.
    fn get_after(
        &self,
        prior_key: &str,
        lower_bound: &str,
        upper_bound: Option<&str>,
    ) -> Result<Option<(String, String)>>;
}

/// In-memory reference implementation over a `BTreeMap`.
///
/// The ordering semantics are the contract the persistent backends must
/// match; the engine's own tests run against this store.
#[derive(Debug, Default)]
pub struct MemVatStore {
    rows: Mutex<BTreeMap<String, String>>,
}

impl MemVatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored, all collections included.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Snapshot of every key with the given prefix, in order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.rows
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl VatStore for MemVatStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.rows.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.rows.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.rows.lock().remove(key);
        Ok(())
    }

    fn get_after(
        &self,
        prior_key: &str,
        lower_bound: &str,
        upper_bound: Option<&str>,
    ) -> Result<Option<(String, String)>> {
        let rows = self.rows.lock();
        let start = if prior_key < lower_bound {
            Bound::Included(lower_bound.to_string())
        } else {
            Bound::Excluded(prior_key.to_string())
        };
        let found = rows
            .range((start, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(match found {
            Some((k, v)) => {
                let in_range = match upper_bound {
                    Some(hi) => k.as_str() < hi,
                    None => k.starts_with(lower_bound),
                };
                in_range.then_some((k, v))
            }
            None => None,
        })
    }
}
