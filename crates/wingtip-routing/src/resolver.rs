//! Mapping repair between the global catalog and shard-local views.
//!
//! Runs on demand, inline on the request that found the two disagreeing.
//! With [`ResolveStrategy::TrustLocal`] the shards' claims win; with
//! [`ResolveStrategy::TrustGlobal`] the catalog wins. Afterwards both
//! stores agree on location and status for the key, or the key is unmapped
//! everywhere.

use serde::Serialize;
use tracing::{debug, info, warn};
use wingtip_catalog::{
    CatalogError, CatalogStore, LocalMapping, LocalMappingStore, PointMapping, RecoveryState,
    ShardLocation, ShardStores,
};
use wingtip_core::TenantKey;

use crate::error::{RoutingError, RoutingResult};

/// Which side wins when the catalog and a shard disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    #[default]
    TrustLocal,
    TrustGlobal,
}

/// What a repair changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub key: TenantKey,
    pub strategy: ResolveStrategy,
    /// The agreed mapping, or `None` if the key is now unmapped.
    pub mapping: Option<PointMapping>,
    pub global_changed: bool,
    /// Shards whose local view was written.
    pub local_written: Vec<String>,
    /// Shards whose local claim was removed.
    pub local_removed: Vec<String>,
    /// Shards that could not be inspected.
    pub skipped: Vec<String>,
}

impl Resolution {
    fn new(key: TenantKey, strategy: ResolveStrategy) -> Self {
        Self {
            key,
            strategy,
            mapping: None,
            global_changed: false,
            local_written: Vec::new(),
            local_removed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// True if neither store was modified.
    pub fn is_clean(&self) -> bool {
        !self.global_changed && self.local_written.is_empty() && self.local_removed.is_empty()
    }
}

/// A shard's claim on a key, with the shard it was found on.
struct Claim {
    shard: ShardLocation,
    store: LocalMappingStore,
    local: LocalMapping,
}

pub struct MappingConsistencyResolver {
    store: CatalogStore,
    shards: ShardStores,
}

impl MappingConsistencyResolver {
    pub fn new(store: CatalogStore, shards: ShardStores) -> Self {
        Self { store, shards }
    }

    /// Bring the catalog and the shards into agreement for `key`.
    pub fn resolve(&self, key: TenantKey, strategy: ResolveStrategy) -> RoutingResult<Resolution> {
        let mut report = Resolution::new(key, strategy);
        let global = self.store.get_mapping(key)?;
        let claims = self.collect_claims(key, &mut report)?;
        debug!(%key, ?strategy, claims = claims.len(), has_global = global.is_some(), "resolving mapping");

        match strategy {
            ResolveStrategy::TrustLocal => self.trust_local(key, global, claims, &mut report)?,
            ResolveStrategy::TrustGlobal => self.trust_global(key, global, claims, &mut report)?,
        }

        let state = if report.mapping.is_some() {
            RecoveryState::Normal
        } else {
            RecoveryState::Recovering
        };
        self.store.set_recovery_state(key, state)?;

        if report.is_clean() {
            debug!(%key, "mapping already consistent");
        } else {
            info!(
                %key,
                ?strategy,
                mapped = report.mapping.is_some(),
                global_changed = report.global_changed,
                written = report.local_written.len(),
                removed = report.local_removed.len(),
                "mapping repaired"
            );
        }
        Ok(report)
    }

    fn collect_claims(&self, key: TenantKey, report: &mut Resolution) -> RoutingResult<Vec<Claim>> {
        let mut claims = Vec::new();
        for shard in self.store.list_shards()? {
            let store = match self.shards.connect(&shard) {
                Ok(store) => store,
                Err(CatalogError::ShardUnreachable { shard: name, reason }) => {
                    warn!(shard = %name, %reason, "skipping unreachable shard during repair");
                    report.skipped.push(name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(local) = store.get(key)? {
                claims.push(Claim {
                    shard,
                    store,
                    local,
                });
            }
        }
        Ok(claims)
    }

    fn trust_local(
        &self,
        key: TenantKey,
        global: Option<PointMapping>,
        mut claims: Vec<Claim>,
        report: &mut Resolution,
    ) -> RoutingResult<()> {
        if let Some(mapping) = &global {
            let shard = mapping.location.table_key();
            if report.skipped.contains(&shard) {
                return Err(RoutingError::ShardUnreachable {
                    shard,
                    reason: "mapped shard could not be inspected".to_string(),
                });
            }
        }

        if claims.is_empty() {
            if global.is_some() {
                warn!(%key, "global mapping has no local claim; removing it");
                self.store.delete_mapping(key)?;
                report.global_changed = true;
            }
            return Ok(());
        }

        let preferred = global
            .as_ref()
            .and_then(|g| claims.iter().position(|c| c.shard == g.location));
        let winner_idx = match preferred {
            Some(idx) => idx,
            None if claims.len() == 1 => 0,
            None => {
                return Err(RoutingError::ConflictingLocalClaims {
                    key,
                    shards: claims.iter().map(|c| c.shard.table_key()).collect(),
                });
            }
        };
        let winner = claims.swap_remove(winner_idx);

        let agreed = PointMapping {
            key,
            location: winner.shard.clone(),
            status: winner.local.status,
        };
        if global.as_ref() != Some(&agreed) {
            warn!(%key, shard = %agreed.location.table_key(), "adopting local claim as global mapping");
            self.store.put_mapping(&agreed)?;
            report.global_changed = true;
        }
        if !winner.local.agrees_with(&agreed) {
            winner.store.put(&LocalMapping::from(&agreed))?;
            report.local_written.push(winner.shard.table_key());
        }
        self.remove_claims(key, claims, report)?;
        report.mapping = Some(agreed);
        Ok(())
    }

    fn trust_global(
        &self,
        key: TenantKey,
        global: Option<PointMapping>,
        claims: Vec<Claim>,
        report: &mut Resolution,
    ) -> RoutingResult<()> {
        let Some(mapping) = global else {
            return self.remove_claims(key, claims, report);
        };

        let (own, others): (Vec<Claim>, Vec<Claim>) =
            claims.into_iter().partition(|c| c.shard == mapping.location);
        let in_sync = own.iter().any(|c| c.local.agrees_with(&mapping));
        if !in_sync {
            let store = self.shards.connect(&mapping.location)?;
            store.put(&LocalMapping::from(&mapping))?;
            report.local_written.push(mapping.location.table_key());
        }
        self.remove_claims(key, others, report)?;
        report.mapping = Some(mapping);
        Ok(())
    }

    fn remove_claims(
        &self,
        key: TenantKey,
        claims: Vec<Claim>,
        report: &mut Resolution,
    ) -> RoutingResult<()> {
        for claim in claims {
            warn!(%key, shard = %claim.shard.table_key(), "removing stale local claim");
            claim.store.remove(key)?;
            report.local_removed.push(claim.shard.table_key());
        }
        Ok(())
    }
}
