//! LocalMappingStore: a shard's own view of the tenants it serves.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;
use wingtip_core::TenantKey;

use crate::error::CatalogResult;
use crate::store::{decode, encode, map_err};
use crate::tables::LOCAL_MAPPINGS;
use crate::types::LocalMapping;

/// Local mapping table of one shard database.
#[derive(Clone)]
pub struct LocalMappingStore {
    db: Arc<Database>,
}

impl LocalMappingStore {
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "shard store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> CatalogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> CatalogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(LOCAL_MAPPINGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get(&self, key: TenantKey) -> CatalogResult<Option<LocalMapping>> {
        let stored = key.to_bytes();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LOCAL_MAPPINGS).map_err(map_err!(Table))?;
        match table.get(&stored[..]).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the local mapping for `mapping.key`.
    pub fn put(&self, mapping: &LocalMapping) -> CatalogResult<()> {
        let stored = mapping.key.to_bytes();
        let value = encode(mapping)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LOCAL_MAPPINGS).map_err(map_err!(Table))?;
            table
                .insert(&stored[..], value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %mapping.key, status = ?mapping.status, "local mapping stored");
        Ok(())
    }

    /// Remove the local mapping for `key`. Returns true if it existed.
    pub fn remove(&self, key: TenantKey) -> CatalogResult<bool> {
        let stored = key.to_bytes();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(LOCAL_MAPPINGS).map_err(map_err!(Table))?;
            existed = table.remove(&stored[..]).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "local mapping removed");
        Ok(existed)
    }

    pub fn list(&self) -> CatalogResult<Vec<LocalMapping>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LOCAL_MAPPINGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for LocalMappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMappingStore").finish_non_exhaustive()
    }
}
