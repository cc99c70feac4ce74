//! Request routing: resolves a tenant path segment to a shard or a peer instance.
//!
//! The router looks the tenant up in the catalog, checks its mapping status,
//! picks serve-or-redirect by region, and for a local serve verifies that the
//! shard agrees with the catalog. A disagreement triggers local-trust repair
//! and exactly one retry.

use serde::Serialize;
use tracing::{debug, info, warn};
use wingtip_catalog::{ShardDirectory, ShardLocation, ShardStores, TenantRecord};
use wingtip_core::{RedirectTemplate, Region, TenantKey};

use crate::error::{RoutingError, RoutingResult};
use crate::geo::{GeoDecision, decide_routing};
use crate::resolver::{MappingConsistencyResolver, ResolveStrategy};

/// Connection details for a tenant served by this instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardTarget {
    pub key: TenantKey,
    pub location: ShardLocation,
    /// `tcp:{server},{port}` form handed to the data-access layer.
    pub data_source: String,
    pub database: String,
}

impl ShardTarget {
    fn new(key: TenantKey, location: ShardLocation) -> Self {
        Self {
            key,
            data_source: location.data_source(),
            database: location.database.clone(),
            location,
        }
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RouteOutcome {
    Connect(ShardTarget),
    /// The tenant is offline; answer with the offline page.
    Offline { tenant: String },
    /// Serve from another instance. `region` is `None` when the shard's
    /// region could not be determined and the fallback URL is used.
    Redirect { region: Option<Region>, url: String },
}

/// This instance's region and where to send everything else.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub region: Region,
    pub redirect: RedirectTemplate,
    pub fallback_url: String,
}

pub struct Router {
    directory: ShardDirectory,
    shards: ShardStores,
    resolver: MappingConsistencyResolver,
    policy: RoutingPolicy,
}

impl Router {
    pub fn new(
        directory: ShardDirectory,
        shards: ShardStores,
        resolver: MappingConsistencyResolver,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            directory,
            shards,
            resolver,
            policy,
        }
    }

    pub fn region(&self) -> &Region {
        &self.policy.region
    }

    /// Route a request for the tenant named by `tenant_segment`.
    pub fn route(&self, tenant_segment: &str) -> RoutingResult<RouteOutcome> {
        let tenant = self
            .directory
            .get_tenant(tenant_segment)?
            .ok_or_else(|| RoutingError::TenantNotFound(tenant_segment.to_string()))?;

        match self.attempt(&tenant, tenant_segment) {
            Err(RoutingError::MappingNotFound(key)) => {
                warn!(%key, tenant = %tenant.name, "mapping divergence detected, repairing");
                let resolution = self.resolver.resolve(key, ResolveStrategy::TrustLocal)?;
                match self.attempt(&tenant, tenant_segment) {
                    Err(RoutingError::MappingNotFound(key)) if resolution.mapping.is_some() => {
                        Err(RoutingError::Unresolved(key))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn attempt(&self, tenant: &TenantRecord, tenant_segment: &str) -> RoutingResult<RouteOutcome> {
        let key = tenant.key;
        let mapping = self
            .directory
            .get_mapping(key)?
            .ok_or(RoutingError::MappingNotFound(key))?;

        let shard_region = match Region::from_server(&mapping.location.server) {
            Ok(region) => region,
            Err(e) if mapping.status.is_online() => {
                warn!(%key, error = %e, "cannot determine shard region, using fallback");
                return Ok(RouteOutcome::Redirect {
                    region: None,
                    url: self.policy.fallback_url.clone(),
                });
            }
            Err(_) => {
                return Ok(RouteOutcome::Offline {
                    tenant: tenant.name.clone(),
                });
            }
        };

        match decide_routing(&shard_region, &self.policy.region, mapping.status) {
            GeoDecision::ServeOffline => {
                info!(%key, tenant = %tenant.name, "tenant offline");
                Ok(RouteOutcome::Offline {
                    tenant: tenant.name.clone(),
                })
            }
            GeoDecision::RedirectTo(region) => {
                let url = self.policy.redirect.url_for(&region, tenant_segment);
                debug!(%key, %region, %url, "redirecting to peer instance");
                Ok(RouteOutcome::Redirect {
                    region: Some(region),
                    url,
                })
            }
            GeoDecision::Serve => {
                let local = self.shards.connect(&mapping.location)?;
                match local.get(key)? {
                    Some(claim) if claim.agrees_with(&mapping) => {
                        debug!(%key, shard = %mapping.location.table_key(), "routing to shard");
                        Ok(RouteOutcome::Connect(ShardTarget::new(key, mapping.location)))
                    }
                    _ => Err(RoutingError::MappingNotFound(key)),
                }
            }
        }
    }
}
