//! Shard database registry.
//!
//! Each shard location owns one [`LocalMappingStore`]. On disk the store
//! lives at `{root}/{server}/{database}.redb`; in memory it exists only once
//! provisioned. Handles are cached so a redb file is opened at most once per
//! process.
//!
//! A shard can be detached to simulate an outage: connecting to a detached
//! shard fails with [`CatalogError::ShardUnreachable`] until it is reattached.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult};
use crate::local::LocalMappingStore;
use crate::types::ShardLocation;

enum Backing {
    Disk(PathBuf),
    Memory,
}

/// Opens and caches shard-local mapping stores.
#[derive(Clone)]
pub struct ShardStores {
    backing: Arc<Backing>,
    open: Arc<RwLock<HashMap<String, LocalMappingStore>>>,
    detached: Arc<RwLock<HashSet<String>>>,
}

impl ShardStores {
    /// Shards stored as redb files below `root`.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::with_backing(Backing::Disk(root.into()))
    }

    /// Shards held in memory (for testing).
    pub fn in_memory() -> Self {
        Self::with_backing(Backing::Memory)
    }

    fn with_backing(backing: Backing) -> Self {
        Self {
            backing: Arc::new(backing),
            open: Arc::new(RwLock::new(HashMap::new())),
            detached: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Shard file path. Server and database must each be one plain path
    /// component so the file stays below `root`.
    fn path_for(root: &Path, location: &ShardLocation) -> CatalogResult<PathBuf> {
        let file = format!("{}.redb", location.database);
        for part in [location.server.as_str(), location.database.as_str(), file.as_str()] {
            let mut components = Path::new(part).components();
            let plain = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !plain {
                return Err(CatalogError::InvalidShardLocation(location.table_key()));
            }
        }
        Ok(root.join(&location.server).join(file))
    }

    fn unreachable(location: &ShardLocation, reason: impl Into<String>) -> CatalogError {
        CatalogError::ShardUnreachable {
            shard: location.table_key(),
            reason: reason.into(),
        }
    }

    fn check_attached(&self, location: &ShardLocation) -> CatalogResult<()> {
        let detached = self.detached.read().expect("detached lock");
        if detached.contains(&location.table_key()) {
            return Err(Self::unreachable(location, "shard is detached"));
        }
        Ok(())
    }

    /// Open the shard database, creating it if it does not exist.
    pub fn provision(&self, location: &ShardLocation) -> CatalogResult<LocalMappingStore> {
        self.check_attached(location)?;
        let key = location.table_key();
        let mut open = self.open.write().expect("shards lock");
        if let Some(store) = open.get(&key) {
            return Ok(store.clone());
        }

        let store = match self.backing.as_ref() {
            Backing::Disk(root) => {
                let path = Self::path_for(root, location)?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Self::unreachable(location, e.to_string()))?;
                }
                LocalMappingStore::open(&path)?
            }
            Backing::Memory => LocalMappingStore::open_in_memory()?,
        };
        open.insert(key.clone(), store.clone());
        info!(shard = %key, "shard database provisioned");
        Ok(store)
    }

    /// Connect to an existing shard database.
    pub fn connect(&self, location: &ShardLocation) -> CatalogResult<LocalMappingStore> {
        self.check_attached(location)?;
        let key = location.table_key();
        if let Some(store) = self.open.read().expect("shards lock").get(&key) {
            return Ok(store.clone());
        }

        match self.backing.as_ref() {
            Backing::Disk(root) => {
                let path = Self::path_for(root, location)?;
                if !path.exists() {
                    return Err(Self::unreachable(location, "shard database does not exist"));
                }
                let mut open = self.open.write().expect("shards lock");
                if let Some(store) = open.get(&key) {
                    return Ok(store.clone());
                }
                let store = LocalMappingStore::open(&path)
                    .map_err(|e| Self::unreachable(location, e.to_string()))?;
                open.insert(key, store.clone());
                Ok(store)
            }
            Backing::Memory => Err(Self::unreachable(location, "shard database does not exist")),
        }
    }

    /// Take a shard offline for connection attempts.
    pub fn detach(&self, location: &ShardLocation) {
        let key = location.table_key();
        debug!(shard = %key, "shard detached");
        self.detached.write().expect("detached lock").insert(key);
    }

    /// Bring a detached shard back.
    pub fn reattach(&self, location: &ShardLocation) {
        let key = location.table_key();
        debug!(shard = %key, "shard reattached");
        self.detached.write().expect("detached lock").remove(&key);
    }
}
