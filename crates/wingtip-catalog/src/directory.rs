//! Read-only catalog queries used by request handling.

use tracing::debug;
use wingtip_core::TenantKey;

use crate::error::CatalogResult;
use crate::store::CatalogStore;
use crate::types::{MappingStatus, PointMapping, ShardLocation, TenantRecord};

/// Lookups over the tenant catalog. Never writes.
#[derive(Clone)]
pub struct ShardDirectory {
    store: CatalogStore,
}

impl ShardDirectory {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Find a tenant by name; case and whitespace are ignored.
    pub fn get_tenant(&self, name: &str) -> CatalogResult<Option<TenantRecord>> {
        let tenant = self.store.find_tenant(name)?;
        debug!(tenant = name, found = tenant.is_some(), "tenant lookup");
        Ok(tenant)
    }

    pub fn get_tenant_by_key(&self, key: TenantKey) -> CatalogResult<Option<TenantRecord>> {
        self.store.get_tenant(key)
    }

    /// All tenants, ordered by signed key.
    pub fn get_all_tenants(&self) -> CatalogResult<Vec<TenantRecord>> {
        self.store.list_tenants()
    }

    /// Shard a tenant key is mapped to in the global catalog.
    pub fn get_shard_location(&self, key: TenantKey) -> CatalogResult<Option<ShardLocation>> {
        Ok(self.store.get_mapping(key)?.map(|m| m.location))
    }

    pub fn get_mapping(&self, key: TenantKey) -> CatalogResult<Option<PointMapping>> {
        self.store.get_mapping(key)
    }

    /// Mapping status for a key. A missing mapping reads as offline.
    pub fn get_mapping_status(&self, key: TenantKey) -> CatalogResult<MappingStatus> {
        Ok(self
            .store
            .get_mapping(key)?
            .map(|m| m.status)
            .unwrap_or(MappingStatus::Offline))
    }

    pub fn list_shards(&self) -> CatalogResult<Vec<ShardLocation>> {
        self.store.list_shards()
    }
}
