//! Tenant registration: creates shard locations, mappings, and tenant rows.
//!
//! The shard's local mapping is written first; the global mapping and the
//! tenant row follow in one catalog write transaction. A crash between the
//! two steps leaves only a local claim, which local-trust repair promotes to
//! a complete global mapping.

use tracing::{debug, error, info, warn};
use wingtip_catalog::{
    CatalogError, CatalogStore, LocalMapping, MappingStatus, PointMapping, Protocol, RecoveryState,
    Registration, ShardLocation, ShardStores, TenantRecord, now_secs,
};
use wingtip_core::config::{TenantSeed, WingtipConfig};
use wingtip_core::{TenantKey, normalize_tenant_name};

use crate::error::{RoutingError, RoutingResult};

/// Values used for tenants registered without explicit shard details.
#[derive(Debug, Clone)]
pub struct ShardDefaults {
    pub server: String,
    pub port: u16,
    pub protocol: Protocol,
    pub service_plan: String,
}

impl ShardDefaults {
    pub fn from_config(config: &WingtipConfig) -> RoutingResult<Self> {
        let protocol = Protocol::parse(&config.database.protocol)
            .ok_or_else(|| RoutingError::UnsupportedProtocol(config.database.protocol.clone()))?;
        Ok(Self {
            server: config.tenant_server.server.clone(),
            port: config.database.port,
            protocol,
            service_plan: config.catalog.service_plan.clone(),
        })
    }
}

/// Shard database name for a tenant: the normalized name, restricted to
/// ASCII alphanumerics, `-` and `_`.
fn database_name(tenant_name: &str) -> RoutingResult<String> {
    let normalized = normalize_tenant_name(tenant_name);
    let valid = !normalized.is_empty()
        && normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(RoutingError::InvalidTenantName(tenant_name.to_string()));
    }
    Ok(normalized)
}

/// Result of registering one seed at startup.
#[derive(Debug)]
pub struct SeedResult {
    pub name: String,
    pub key: TenantKey,
    pub result: RoutingResult<Registration>,
}

pub struct ShardRegistrar {
    store: CatalogStore,
    shards: ShardStores,
    defaults: ShardDefaults,
}

impl ShardRegistrar {
    pub fn new(store: CatalogStore, shards: ShardStores, defaults: ShardDefaults) -> Self {
        Self {
            store,
            shards,
            defaults,
        }
    }

    /// Register a tenant's shard. Returns true on success, including when the
    /// tenant was already registered; failures are logged.
    pub fn register_shard(
        &self,
        tenant_name: &str,
        key: TenantKey,
        server: &str,
        port: u16,
        service_plan: &str,
    ) -> bool {
        match self.try_register(tenant_name, key, server, port, service_plan) {
            Ok(_) => true,
            Err(e) => {
                error!(tenant = tenant_name, %key, error = %e, "tenant registration failed");
                false
            }
        }
    }

    /// Register a tenant's shard, reporting what was written.
    pub fn try_register(
        &self,
        tenant_name: &str,
        key: TenantKey,
        server: &str,
        port: u16,
        service_plan: &str,
    ) -> RoutingResult<Registration> {
        let normalized = database_name(tenant_name)?;

        if let Some(existing) = self.store.get_tenant(key)? {
            if existing.normalized_name != normalized {
                return Err(CatalogError::KeyCollision {
                    key,
                    existing: existing.name,
                    requested: tenant_name.trim().to_string(),
                }
                .into());
            }
        }

        let location = ShardLocation::new(server, &normalized, self.defaults.protocol, port);
        self.store.ensure_shard(&location)?;

        let existing = self.store.get_mapping(key)?;
        let wrote_local = existing.is_none();
        if wrote_local {
            let local = self.shards.provision(&location)?;
            local.put(&LocalMapping {
                key,
                location: location.clone(),
                status: MappingStatus::Online,
            })?;
        }

        let record = TenantRecord {
            key,
            name: tenant_name.trim().to_string(),
            normalized_name: normalized,
            service_plan: service_plan.to_string(),
            alias: location.server_alias().to_string(),
            recovery_state: RecoveryState::Normal,
            last_updated: now_secs(),
        };
        let mapping = PointMapping {
            key,
            location: location.clone(),
            status: MappingStatus::Online,
        };
        let outcome = match self.store.register_tenant(&record, &mapping) {
            Ok(outcome) => outcome,
            Err(e) => {
                if wrote_local {
                    self.drop_claim(&location, key);
                }
                return Err(e.into());
            }
        };

        if wrote_local && !outcome.mapping_created {
            // Another registration won the race; drop our claim if it points elsewhere.
            let winner = self.store.get_mapping(key)?;
            if winner.is_none_or(|w| w.location != location) {
                self.drop_claim(&location, key);
            }
        }

        if outcome.is_noop() {
            debug!(tenant = tenant_name, %key, "tenant already registered");
        } else {
            info!(
                tenant = tenant_name,
                %key,
                shard = %location.table_key(),
                mapping_created = outcome.mapping_created,
                tenant_created = outcome.tenant_created,
                "tenant registered"
            );
        }
        Ok(outcome)
    }

    /// Remove a local claim written by a registration that did not complete.
    fn drop_claim(&self, location: &ShardLocation, key: TenantKey) {
        let removed = self
            .shards
            .connect(location)
            .and_then(|local| local.remove(key));
        if let Err(e) = removed {
            warn!(%key, shard = %location.table_key(), error = %e, "could not remove local claim");
        }
    }

    /// Register every configured tenant. A failing tenant does not stop the rest.
    pub fn register_all(&self, seeds: &[TenantSeed]) -> Vec<SeedResult> {
        seeds
            .iter()
            .map(|seed| {
                let key = TenantKey::derive(&seed.name);
                let server = seed.server_or(&self.defaults.server);
                let result = self.try_register(
                    &seed.name,
                    key,
                    server,
                    self.defaults.port,
                    &self.defaults.service_plan,
                );
                if let Err(e) = &result {
                    error!(tenant = %seed.name, %key, error = %e, "seed registration failed");
                }
                SeedResult {
                    name: seed.name.clone(),
                    key,
                    result,
                }
            })
            .collect()
    }

    /// Take a tenant online or offline. The catalog is updated before the
    /// shard's local view.
    pub fn set_mapping_status(
        &self,
        key: TenantKey,
        status: MappingStatus,
    ) -> RoutingResult<PointMapping> {
        let mut mapping = self
            .store
            .get_mapping(key)?
            .ok_or(RoutingError::MappingNotFound(key))?;
        mapping.status = status;
        self.store.put_mapping(&mapping)?;

        let local = self.shards.connect(&mapping.location)?;
        local.put(&LocalMapping::from(&mapping))?;
        info!(%key, ?status, shard = %mapping.location.table_key(), "mapping status changed");
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEST: &str = "tenants1-dpt-alice-west.database.windows.net";

    fn registrar() -> (ShardRegistrar, CatalogStore, ShardStores) {
        let store = CatalogStore::open_in_memory().unwrap();
        let shards = ShardStores::in_memory();
        let defaults = ShardDefaults {
            server: WEST.to_string(),
            port: 1433,
            protocol: Protocol::Tcp,
            service_plan: "standard".to_string(),
        };
        (
            ShardRegistrar::new(store.clone(), shards.clone(), defaults),
            store,
            shards,
        )
    }

    #[test]
    fn register_writes_all_three_rows_and_local_claim() {
        let (registrar, store, shards) = registrar();
        let name = "Contoso Concert Hall";
        let key = TenantKey::derive(name);

        assert!(registrar.register_shard(name, key, WEST, 1433, "standard"));

        let mapping = store.get_mapping(key).unwrap().unwrap();
        assert_eq!(mapping.location.database, "contosoconcerthall");
        assert_eq!(mapping.location.data_source(), format!("tcp:{WEST},1433"));

        let tenant = store.get_tenant(key).unwrap().unwrap();
        assert_eq!(tenant.alias, "tenants1-dpt-alice-west");
        assert_eq!(tenant.recovery_state, RecoveryState::Normal);

        let local = shards.connect(&mapping.location).unwrap();
        assert!(local.get(key).unwrap().unwrap().agrees_with(&mapping));
    }

    #[test]
    fn register_twice_succeeds_without_duplicates() {
        let (registrar, store, _) = registrar();
        let name = "Contoso Concert Hall";
        let key = TenantKey::derive(name);

        assert!(registrar.register_shard(name, key, WEST, 1433, "standard"));
        let second = registrar
            .try_register(name, key, WEST, 1433, "standard")
            .unwrap();
        assert!(second.is_noop());
        assert_eq!(store.list_shards().unwrap().len(), 1);
        assert_eq!(store.list_tenants().unwrap().len(), 1);
        assert_eq!(store.list_mappings().unwrap().len(), 1);
    }

    #[test]
    fn register_fails_on_unreachable_shard() {
        let (registrar, store, shards) = registrar();
        let name = "Dogwood Dojo";
        let key = TenantKey::derive(name);
        let location = ShardLocation::new(WEST, "dogwooddojo", Protocol::Tcp, 1433);
        shards.detach(&location);

        assert!(!registrar.register_shard(name, key, WEST, 1433, "standard"));
        assert!(store.get_mapping(key).unwrap().is_none());
        assert!(store.get_tenant(key).unwrap().is_none());
    }

    #[test]
    fn register_rejects_blank_name() {
        let (registrar, _, _) = registrar();
        let err = registrar
            .try_register("   ", TenantKey::derive(""), WEST, 1433, "standard")
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidTenantName(_)));
    }

    #[test]
    fn register_rejects_names_unfit_for_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open_in_memory().unwrap();
        let shards = ShardStores::on_disk(dir.path().join("shards"));
        let defaults = ShardDefaults {
            server: WEST.to_string(),
            port: 1433,
            protocol: Protocol::Tcp,
            service_plan: "standard".to_string(),
        };
        let registrar = ShardRegistrar::new(store.clone(), shards, defaults);

        for name in ["../../escaped", "a/b", "dots.in.name"] {
            let err = registrar
                .try_register(name, TenantKey::derive(name), WEST, 1433, "standard")
                .unwrap_err();
            assert!(matches!(err, RoutingError::InvalidTenantName(_)), "{name}");
        }
        assert!(!dir.path().join("escaped.redb").exists());
        assert!(!dir.path().join("shards").exists());
        assert!(store.list_shards().unwrap().is_empty());
    }

    #[test]
    fn colliding_key_leaves_no_trace() {
        let (registrar, store, shards) = registrar();
        let alpha = TenantKey::derive("Alpha");
        assert!(registrar.register_shard("Alpha", alpha, WEST, 1433, "standard"));
        // Alpha's global mapping is gone; only its tenant row remains.
        store.delete_mapping(alpha).unwrap();

        let err = registrar
            .try_register("Beta", alpha, WEST, 1433, "standard")
            .unwrap_err();
        assert!(matches!(
            err,
            RoutingError::Catalog(CatalogError::KeyCollision { ref existing, ref requested, .. })
                if existing == "Alpha" && requested == "Beta"
        ));

        assert!(store.get_shard(WEST, "beta").unwrap().is_none());
        let beta = ShardLocation::new(WEST, "beta", Protocol::Tcp, 1433);
        assert!(shards.connect(&beta).is_err());
        assert!(store.get_mapping(alpha).unwrap().is_none());
        assert_eq!(store.get_tenant(alpha).unwrap().unwrap().name, "Alpha");
    }

    #[test]
    fn derived_key_collision_is_rejected() {
        let (registrar, store, _) = registrar();
        let key = TenantKey::derive("Alpha");
        registrar
            .try_register("Alpha", key, WEST, 1433, "standard")
            .unwrap();

        // Same derived key under another name.
        assert_eq!(TenantKey::derive(" ALPHA "), key);
        let same = registrar
            .try_register(" ALPHA ", key, WEST, 1433, "standard")
            .unwrap();
        assert!(same.is_noop());
        let err = registrar
            .try_register("Beta", key, WEST, 1433, "standard")
            .unwrap_err();
        assert!(matches!(err, RoutingError::Catalog(CatalogError::KeyCollision { .. })));
        assert_eq!(store.list_shards().unwrap().len(), 1);
        assert_eq!(store.get_mapping(key).unwrap().unwrap().location.database, "alpha");
    }

    #[test]
    fn defaults_reject_unknown_protocol() {
        let mut config = WingtipConfig::scaffold(std::path::Path::new("data"), "west");
        assert_eq!(ShardDefaults::from_config(&config).unwrap().protocol, Protocol::Tcp);

        config.database.protocol = "udp".to_string();
        assert!(matches!(
            ShardDefaults::from_config(&config),
            Err(RoutingError::UnsupportedProtocol(p)) if p == "udp"
        ));
    }

    #[test]
    fn register_all_continues_past_failures() {
        let (registrar, store, shards) = registrar();
        let blocked = ShardLocation::new(WEST, "fabrikamjazzclub", Protocol::Tcp, 1433);
        shards.detach(&blocked);

        let seeds = vec![
            TenantSeed {
                name: "Fabrikam Jazz Club".to_string(),
                server: None,
            },
            TenantSeed {
                name: "Dogwood Dojo".to_string(),
                server: Some("tenants2-dpt-alice-east.database.windows.net".to_string()),
            },
        ];
        let results = registrar.register_all(&seeds);

        assert!(results[0].result.is_err());
        assert!(results[1].result.is_ok());
        let dojo = store.get_mapping(results[1].key).unwrap().unwrap();
        assert_eq!(dojo.location.server_alias(), "tenants2-dpt-alice-east");
        assert_eq!(store.list_tenants().unwrap().len(), 1);
    }

    #[test]
    fn set_status_updates_catalog_and_local() {
        let (registrar, store, shards) = registrar();
        let name = "Contoso Concert Hall";
        let key = TenantKey::derive(name);
        registrar.register_shard(name, key, WEST, 1433, "standard");

        let mapping = registrar
            .set_mapping_status(key, MappingStatus::Offline)
            .unwrap();
        assert_eq!(store.get_mapping(key).unwrap(), Some(mapping.clone()));
        let local = shards.connect(&mapping.location).unwrap();
        assert_eq!(local.get(key).unwrap().unwrap().status, MappingStatus::Offline);

        assert!(matches!(
            registrar.set_mapping_status(TenantKey::new(3), MappingStatus::Online),
            Err(RoutingError::MappingNotFound(_))
        ));
    }
}
