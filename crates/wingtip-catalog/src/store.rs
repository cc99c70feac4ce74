//! CatalogStore: redb-backed persistence for the tenant catalog.
//!
//! Provides typed operations over tenants, the tenant-name index, shard
//! locations, and global point mappings. Multi-record invariants (a tenant
//! row always has a mapping; a mapping always references a known shard) are
//! enforced inside single write transactions. redb admits one writer at a
//! time, so check-and-insert within a write transaction cannot race.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use wingtip_core::{TenantKey, normalize_tenant_name};

use crate::error::{CatalogError, CatalogResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `CatalogError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::CatalogError::$variant(e.to_string())
    };
}

pub(crate) use map_err;

pub(crate) fn encode<T: Serialize>(value: &T) -> CatalogResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CatalogResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Outcome of [`CatalogStore::register_tenant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub mapping_created: bool,
    pub tenant_created: bool,
}

impl Registration {
    /// Nothing was written; the tenant was already fully registered.
    pub fn is_noop(&self) -> bool {
        !self.mapping_created && !self.tenant_created
    }
}

/// Thread-safe catalog store backed by redb.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    /// Open (or create) a persistent catalog at the given path.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "catalog opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory catalog (for testing).
    pub fn open_in_memory() -> CatalogResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory catalog opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> CatalogResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TENANTS).map_err(map_err!(Table))?;
        txn.open_table(TENANT_NAMES).map_err(map_err!(Table))?;
        txn.open_table(SHARDS).map_err(map_err!(Table))?;
        txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Shards ─────────────────────────────────────────────────────

    /// Insert a shard location unless it already exists. Returns true if created.
    pub fn ensure_shard(&self, location: &ShardLocation) -> CatalogResult<bool> {
        let key = location.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created;
        {
            let mut table = txn.open_table(SHARDS).map_err(map_err!(Table))?;
            created = table.get(key.as_str()).map_err(map_err!(Read))?.is_none();
            if created {
                let value = encode(location)?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, created, "shard ensured");
        Ok(created)
    }

    /// Get a shard location by server and database name.
    pub fn get_shard(&self, server: &str, database: &str) -> CatalogResult<Option<ShardLocation>> {
        let key = format!("{server}/{database}");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SHARDS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all shard locations.
    pub fn list_shards(&self) -> CatalogResult<Vec<ShardLocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SHARDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    // ── Mappings ───────────────────────────────────────────────────

    /// Get the global mapping for a tenant key.
    pub fn get_mapping(&self, key: TenantKey) -> CatalogResult<Option<PointMapping>> {
        let stored = key.to_bytes();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
        match table.get(&stored[..]).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all global mappings in key order.
    pub fn list_mappings(&self) -> CatalogResult<Vec<PointMapping>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Insert or replace a global mapping. The shard must already be registered.
    pub fn put_mapping(&self, mapping: &PointMapping) -> CatalogResult<()> {
        let stored = mapping.key.to_bytes();
        let shard_key = mapping.location.table_key();
        let value = encode(mapping)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let shards = txn.open_table(SHARDS).map_err(map_err!(Table))?;
            if shards.get(shard_key.as_str()).map_err(map_err!(Read))?.is_none() {
                return Err(CatalogError::ShardNotRegistered(shard_key));
            }
            let mut table = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            table
                .insert(&stored[..], value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %mapping.key, shard = %shard_key, status = ?mapping.status, "mapping stored");
        Ok(())
    }

    /// Delete a global mapping. Returns true if it existed.
    pub fn delete_mapping(&self, key: TenantKey) -> CatalogResult<bool> {
        let stored = key.to_bytes();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            existed = table.remove(&stored[..]).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "mapping deleted");
        Ok(existed)
    }

    // ── Tenants ────────────────────────────────────────────────────

    /// Atomically create the mapping and tenant row for a new tenant.
    ///
    /// Both rows are checked and written in one write transaction:
    /// an existing mapping is left untouched, a missing tenant row next to an
    /// existing mapping is filled in, and a tenant row for the same key under
    /// a different name is rejected as a key collision.
    pub fn register_tenant(
        &self,
        record: &TenantRecord,
        mapping: &PointMapping,
    ) -> CatalogResult<Registration> {
        debug_assert_eq!(record.key, mapping.key);
        let stored = record.key.to_bytes();
        let shard_key = mapping.location.table_key();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let shards = txn.open_table(SHARDS).map_err(map_err!(Table))?;
            if shards.get(shard_key.as_str()).map_err(map_err!(Read))?.is_none() {
                return Err(CatalogError::ShardNotRegistered(shard_key));
            }

            let mut tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
            let existing_tenant = tenants
                .get(&stored[..])
                .map_err(map_err!(Read))?
                .map(|guard| decode::<TenantRecord>(guard.value()))
                .transpose()?;
            if let Some(existing) = &existing_tenant {
                if existing.normalized_name != record.normalized_name {
                    return Err(CatalogError::KeyCollision {
                        key: record.key,
                        existing: existing.name.clone(),
                        requested: record.name.clone(),
                    });
                }
            }

            let mut mappings = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            let mapping_created = mappings.get(&stored[..]).map_err(map_err!(Read))?.is_none();
            if mapping_created {
                let value = encode(mapping)?;
                mappings
                    .insert(&stored[..], value.as_slice())
                    .map_err(map_err!(Write))?;
            }

            let tenant_created = existing_tenant.is_none();
            if tenant_created {
                let value = encode(record)?;
                tenants
                    .insert(&stored[..], value.as_slice())
                    .map_err(map_err!(Write))?;
                let mut names = txn.open_table(TENANT_NAMES).map_err(map_err!(Table))?;
                names
                    .insert(record.normalized_name.as_str(), &stored[..])
                    .map_err(map_err!(Write))?;
            }

            outcome = Registration {
                mapping_created,
                tenant_created,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %record.key, tenant = %record.name, ?outcome, "tenant registration committed");
        Ok(outcome)
    }

    /// Get a tenant by key.
    pub fn get_tenant(&self, key: TenantKey) -> CatalogResult<Option<TenantRecord>> {
        let stored = key.to_bytes();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        match table.get(&stored[..]).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Find a tenant by name, ignoring case and whitespace.
    pub fn find_tenant(&self, name: &str) -> CatalogResult<Option<TenantRecord>> {
        let normalized = normalize_tenant_name(name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let names = txn.open_table(TENANT_NAMES).map_err(map_err!(Table))?;
        let Some(stored) = names
            .get(normalized.as_str())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec())
        else {
            return Ok(None);
        };
        let tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        match tenants.get(stored.as_slice()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all tenants in signed key order.
    pub fn list_tenants(&self) -> CatalogResult<Vec<TenantRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// List tenants with `low <= key <= high`, using a byte-range scan.
    pub fn tenants_in_range(
        &self,
        low: TenantKey,
        high: TenantKey,
    ) -> CatalogResult<Vec<TenantRecord>> {
        if low > high {
            return Ok(Vec::new());
        }
        let (lo, hi) = (low.to_bytes(), high.to_bytes());
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TENANTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(&lo[..]..=&hi[..]).map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Move a tenant to a new recovery state. Returns false if the tenant is unknown.
    pub fn set_recovery_state(&self, key: TenantKey, state: RecoveryState) -> CatalogResult<bool> {
        let stored = key.to_bytes();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated;
        {
            let mut table = txn.open_table(TENANTS).map_err(map_err!(Table))?;
            let existing = table
                .get(&stored[..])
                .map_err(map_err!(Read))?
                .map(|guard| decode::<TenantRecord>(guard.value()))
                .transpose()?;
            updated = match existing {
                Some(mut record) if record.recovery_state != state => {
                    record.recovery_state = state;
                    record.last_updated = now_secs();
                    let value = encode(&record)?;
                    table
                        .insert(&stored[..], value.as_slice())
                        .map_err(map_err!(Write))?;
                    true
                }
                Some(_) => true,
                None => false,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, ?state, updated, "recovery state set");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_location(server: &str, database: &str) -> ShardLocation {
        ShardLocation::new(server, database, Protocol::Tcp, 1433)
    }

    fn test_record(key: TenantKey, name: &str, server: &str) -> TenantRecord {
        TenantRecord {
            key,
            name: name.to_string(),
            normalized_name: normalize_tenant_name(name),
            service_plan: "standard".to_string(),
            alias: server.to_string(),
            recovery_state: RecoveryState::Normal,
            last_updated: 1000,
        }
    }

    fn register(store: &CatalogStore, name: &str, server: &str) -> (TenantKey, Registration) {
        let key = TenantKey::derive(name);
        let location = test_location(server, &normalize_tenant_name(name));
        store.ensure_shard(&location).unwrap();
        let mapping = PointMapping {
            key,
            location,
            status: MappingStatus::Online,
        };
        let outcome = store
            .register_tenant(&test_record(key, name, server), &mapping)
            .unwrap();
        (key, outcome)
    }

    // ── Shards ─────────────────────────────────────────────────────

    #[test]
    fn ensure_shard_is_idempotent() {
        let store = CatalogStore::open_in_memory().unwrap();
        let loc = test_location("tenants1-dpt-alice-west", "contosoconcerthall");

        assert!(store.ensure_shard(&loc).unwrap());
        assert!(!store.ensure_shard(&loc).unwrap());
        assert_eq!(store.list_shards().unwrap(), vec![loc.clone()]);
        assert_eq!(
            store.get_shard("tenants1-dpt-alice-west", "contosoconcerthall").unwrap(),
            Some(loc)
        );
    }

    #[test]
    fn get_shard_nonexistent_returns_none() {
        let store = CatalogStore::open_in_memory().unwrap();
        assert!(store.get_shard("nope", "nothing").unwrap().is_none());
    }

    // ── Registration ───────────────────────────────────────────────

    #[test]
    fn register_creates_mapping_and_tenant() {
        let store = CatalogStore::open_in_memory().unwrap();
        let (key, outcome) = register(&store, "Contoso Concert Hall", "tenants1-dpt-alice-west");

        assert!(outcome.mapping_created);
        assert!(outcome.tenant_created);

        let mapping = store.get_mapping(key).unwrap().unwrap();
        assert_eq!(mapping.status, MappingStatus::Online);
        assert_eq!(mapping.location.database, "contosoconcerthall");

        let tenant = store.find_tenant("contoso concert HALL").unwrap().unwrap();
        assert_eq!(tenant.key, key);
        assert_eq!(tenant.name, "Contoso Concert Hall");
    }

    #[test]
    fn register_twice_is_noop() {
        let store = CatalogStore::open_in_memory().unwrap();
        register(&store, "Contoso Concert Hall", "tenants1-dpt-alice-west");
        let (_, outcome) = register(&store, "Contoso Concert Hall", "tenants1-dpt-alice-west");

        assert!(outcome.is_noop());
        assert_eq!(store.list_tenants().unwrap().len(), 1);
        assert_eq!(store.list_mappings().unwrap().len(), 1);
        assert_eq!(store.list_shards().unwrap().len(), 1);
    }

    #[test]
    fn register_requires_known_shard() {
        let store = CatalogStore::open_in_memory().unwrap();
        let key = TenantKey::derive("dogwooddojo");
        let mapping = PointMapping {
            key,
            location: test_location("tenants1-dpt-alice-west", "dogwooddojo"),
            status: MappingStatus::Online,
        };
        let err = store
            .register_tenant(&test_record(key, "dogwooddojo", "tenants1"), &mapping)
            .unwrap_err();
        assert!(matches!(err, CatalogError::ShardNotRegistered(_)));
        assert!(store.get_mapping(key).unwrap().is_none());
        assert!(store.get_tenant(key).unwrap().is_none());
    }

    #[test]
    fn register_detects_key_collision() {
        let store = CatalogStore::open_in_memory().unwrap();
        let key = TenantKey::new(397858529);
        let location = test_location("tenants1-dpt-alice-west", "alpha");
        store.ensure_shard(&location).unwrap();
        let mapping = PointMapping {
            key,
            location,
            status: MappingStatus::Online,
        };
        store
            .register_tenant(&test_record(key, "Alpha", "tenants1"), &mapping)
            .unwrap();

        let err = store
            .register_tenant(&test_record(key, "Beta", "tenants1"), &mapping)
            .unwrap_err();
        assert!(matches!(err, CatalogError::KeyCollision { .. }));
        assert_eq!(store.get_tenant(key).unwrap().unwrap().name, "Alpha");
        assert!(store.find_tenant("beta").unwrap().is_none());
    }

    #[test]
    fn register_fills_missing_tenant_next_to_existing_mapping() {
        let store = CatalogStore::open_in_memory().unwrap();
        let key = TenantKey::derive("fabrikamjazzclub");
        let location = test_location("tenants1-dpt-alice-west", "fabrikamjazzclub");
        store.ensure_shard(&location).unwrap();
        let mapping = PointMapping {
            key,
            location,
            status: MappingStatus::Offline,
        };
        store.put_mapping(&mapping).unwrap();

        let outcome = store
            .register_tenant(&test_record(key, "Fabrikam Jazz Club", "tenants1"), &mapping)
            .unwrap();
        assert!(!outcome.mapping_created);
        assert!(outcome.tenant_created);
        // Existing mapping status is left alone.
        assert_eq!(
            store.get_mapping(key).unwrap().unwrap().status,
            MappingStatus::Offline
        );
    }

    // ── Mappings ───────────────────────────────────────────────────

    #[test]
    fn put_mapping_requires_known_shard() {
        let store = CatalogStore::open_in_memory().unwrap();
        let mapping = PointMapping {
            key: TenantKey::new(1),
            location: test_location("ghost", "nothing"),
            status: MappingStatus::Online,
        };
        assert!(matches!(
            store.put_mapping(&mapping),
            Err(CatalogError::ShardNotRegistered(_))
        ));
    }

    #[test]
    fn mapping_update_and_delete() {
        let store = CatalogStore::open_in_memory().unwrap();
        let (key, _) = register(&store, "Dogwood Dojo", "tenants1-dpt-alice-west");

        let mut mapping = store.get_mapping(key).unwrap().unwrap();
        mapping.status = MappingStatus::Offline;
        store.put_mapping(&mapping).unwrap();
        assert_eq!(store.get_mapping(key).unwrap(), Some(mapping));

        assert!(store.delete_mapping(key).unwrap());
        assert!(!store.delete_mapping(key).unwrap());
        assert!(store.get_mapping(key).unwrap().is_none());
        // Tenant rows are never deleted with the mapping.
        assert!(store.get_tenant(key).unwrap().is_some());
    }

    // ── Tenants ────────────────────────────────────────────────────

    #[test]
    fn tenants_list_in_signed_key_order() {
        let store = CatalogStore::open_in_memory().unwrap();
        for value in [5, i32::MIN, -1, i32::MAX, 0] {
            let key = TenantKey::new(value);
            let name = format!("tenant{}", value.unsigned_abs());
            let name = if value < 0 { format!("{name}neg") } else { name };
            let location = test_location("tenants1-dpt-alice-west", &name);
            store.ensure_shard(&location).unwrap();
            let mapping = PointMapping {
                key,
                location,
                status: MappingStatus::Online,
            };
            store
                .register_tenant(&test_record(key, &name, "tenants1"), &mapping)
                .unwrap();
        }

        let keys: Vec<i32> = store
            .list_tenants()
            .unwrap()
            .iter()
            .map(|t| t.key.value())
            .collect();
        assert_eq!(keys, vec![i32::MIN, -1, 0, 5, i32::MAX]);

        let middle: Vec<i32> = store
            .tenants_in_range(TenantKey::new(-1), TenantKey::new(5))
            .unwrap()
            .iter()
            .map(|t| t.key.value())
            .collect();
        assert_eq!(middle, vec![-1, 0, 5]);

        assert!(store
            .tenants_in_range(TenantKey::new(5), TenantKey::new(-1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn recovery_state_transitions() {
        let store = CatalogStore::open_in_memory().unwrap();
        let (key, _) = register(&store, "Contoso Concert Hall", "tenants1-dpt-alice-west");

        assert!(store.set_recovery_state(key, RecoveryState::Recovering).unwrap());
        let tenant = store.get_tenant(key).unwrap().unwrap();
        assert_eq!(tenant.recovery_state, RecoveryState::Recovering);
        assert!(tenant.last_updated > 1000);

        assert!(!store
            .set_recovery_state(TenantKey::new(42), RecoveryState::Normal)
            .unwrap());
    }

    #[test]
    fn find_unknown_tenant_returns_none() {
        let store = CatalogStore::open_in_memory().unwrap();
        assert!(store.find_tenant("nobody").unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.redb");

        let key = {
            let store = CatalogStore::open(&db_path).unwrap();
            register(&store, "Contoso Concert Hall", "tenants1-dpt-alice-west").0
        };

        // Reopen the same database file.
        let store = CatalogStore::open(&db_path).unwrap();
        assert!(store.get_mapping(key).unwrap().is_some());
        assert_eq!(
            store.find_tenant("contosoconcerthall").unwrap().unwrap().key,
            key
        );
    }

    #[test]
    fn empty_store_operations() {
        let store = CatalogStore::open_in_memory().unwrap();

        assert!(store.list_tenants().unwrap().is_empty());
        assert!(store.list_shards().unwrap().is_empty());
        assert!(store.list_mappings().unwrap().is_empty());
        assert!(store.get_mapping(TenantKey::new(1)).unwrap().is_none());
        assert!(!store.delete_mapping(TenantKey::new(1)).unwrap());
    }
}
