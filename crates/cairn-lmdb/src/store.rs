use cairn_core::{CairnError, Result, VatStore};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};

use crate::config::LmdbStoreConfig;

/// LMDB-backed vat store.
///
/// One database holds every row; keys and values are UTF-8 strings and
/// LMDB's byte ordering over them matches the string ordering the engine's
/// rank covers assume. Each operation runs in its own transaction, matching
/// the engine's synchronous request-reply access pattern.
pub struct LmdbVatStore {
    env: Environment,
    db: Database,
}

impl LmdbVatStore {
    pub fn open(cfg: LmdbStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&cfg.path)?;

        let mut env_builder = Environment::new();
        env_builder.set_max_dbs(1);
        env_builder.set_map_size(cfg.map_size);
        env_builder.set_max_readers(cfg.max_readers);

        let env = env_builder
            .open(&cfg.path)
            .map_err(|e| CairnError::Io(std::io::Error::other(e)))?;
        let db = env
            .create_db(Some("vatstore"), DatabaseFlags::empty())
            .map_err(store_err)?;

        tracing::info!(path = %cfg.path.display(), "opened LMDB vat store");
        Ok(Self { env, db })
    }
}

fn store_err(e: lmdb::Error) -> CairnError {
    CairnError::Store(e.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| CairnError::Store(format!("non-UTF-8 row: {e}")))
}

impl VatStore for LmdbVatStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let txn = self.env.begin_ro_txn().map_err(store_err)?;
        match txn.get(self.db, &key) {
            Ok(bytes) => Ok(Some(utf8(bytes)?)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn().map_err(store_err)?;
        txn.put(self.db, &key, &value, WriteFlags::empty())
            .map_err(store_err)?;
        txn.commit().map_err(store_err)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut txn = self.env.begin_rw_txn().map_err(store_err)?;
        match txn.del(self.db, &key, None) {
            Ok(()) | Err(lmdb::Error::NotFound) => txn.commit().map_err(store_err),
            Err(e) => Err(store_err(e)),
        }
    }

    fn get_after(
        &self,
        prior_key: &str,
        lower_bound: &str,
        upper_bound: Option<&str>,
    ) -> Result<Option<(String, String)>> {
        // Position at the smallest key > prior_key and >= lower_bound. The
        // successor of a byte string is itself plus one NUL byte.
        let start: Vec<u8> = if prior_key < lower_bound {
            lower_bound.as_bytes().to_vec()
        } else {
            let mut successor = prior_key.as_bytes().to_vec();
            successor.push(0);
            successor
        };

        let txn = self.env.begin_ro_txn().map_err(store_err)?;
        let cursor = txn.open_ro_cursor(self.db).map_err(store_err)?;
        let found = match cursor.get(Some(&start[..]), None, lmdb_sys::MDB_SET_RANGE) {
            Ok((key_bytes, value_bytes)) => Some((
                key_bytes.expect("MDB_SET_RANGE always returns the matched key"),
                value_bytes,
            )),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(store_err(e)),
        };
        if let Some((key_bytes, value_bytes)) = found {
            let key = utf8(key_bytes)?;
            let in_range = match upper_bound {
                Some(hi) => key.as_str() < hi,
                None => key.starts_with(lower_bound),
            };
            if in_range {
                return Ok(Some((key, utf8(value_bytes)?)));
            }
        }
        Ok(None)
    }
}
