use std::path::Path;

use anyhow::Context as _;
use clap::ValueEnum;
use serde::Serialize;
use wingtip_catalog::{CatalogStore, MappingStatus, ShardDirectory, ShardStores, TenantRecord};
use wingtip_core::WingtipConfig;
use wingtip_routing::{
    MappingConsistencyResolver, ResolveStrategy, Router, RoutingPolicy, ShardDefaults,
    ShardRegistrar,
};

pub mod route;
pub mod setup;
pub mod tenants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrustArg {
    Local,
    Global,
}

impl From<TrustArg> for ResolveStrategy {
    fn from(arg: TrustArg) -> Self {
        match arg {
            TrustArg::Local => ResolveStrategy::TrustLocal,
            TrustArg::Global => ResolveStrategy::TrustGlobal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Online,
    Offline,
}

impl From<StatusArg> for MappingStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Online => MappingStatus::Online,
            StatusArg::Offline => MappingStatus::Offline,
        }
    }
}

/// Opened stores and the loaded configuration.
pub struct Context {
    pub config: WingtipConfig,
    pub store: CatalogStore,
    pub shards: ShardStores,
}

impl Context {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = WingtipConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        Self::open(config)
    }

    pub fn open(config: WingtipConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.catalog.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = CatalogStore::open(&config.catalog.path)
            .with_context(|| format!("opening catalog {}", config.catalog.path.display()))?;
        let shards = ShardStores::on_disk(&config.tenant_server.shard_root);
        Ok(Self {
            config,
            store,
            shards,
        })
    }

    pub fn directory(&self) -> ShardDirectory {
        ShardDirectory::new(self.store.clone())
    }

    pub fn registrar(&self) -> anyhow::Result<ShardRegistrar> {
        Ok(ShardRegistrar::new(
            self.store.clone(),
            self.shards.clone(),
            ShardDefaults::from_config(&self.config)?,
        ))
    }

    pub fn resolver(&self) -> MappingConsistencyResolver {
        MappingConsistencyResolver::new(self.store.clone(), self.shards.clone())
    }

    pub fn router(&self) -> anyhow::Result<Router> {
        let routing = &self.config.routing;
        let policy = RoutingPolicy {
            region: routing.region()?,
            redirect: routing.redirect_template()?,
            fallback_url: routing.fallback_url.clone(),
        };
        Ok(Router::new(
            self.directory(),
            self.shards.clone(),
            self.resolver(),
            policy,
        ))
    }

    /// Look a tenant up by name, failing if it is not registered.
    pub fn tenant(&self, name: &str) -> anyhow::Result<TenantRecord> {
        self.directory()
            .get_tenant(name)?
            .ok_or_else(|| anyhow::anyhow!("tenant not found: {name}"))
    }
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(dir: &Path) -> Context {
        let config = WingtipConfig::scaffold(dir, "west");
        Context::open(config).unwrap()
    }

    #[test]
    fn bootstrap_then_route_from_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let results = ctx.registrar().unwrap().register_all(&ctx.config.tenants);
        assert!(results.iter().all(|r| r.result.is_ok()));

        let tenant = ctx.tenant("Contoso Concert Hall").unwrap();
        assert_eq!(tenant.normalized_name, "contosoconcerthall");
        let outcome = ctx.router().unwrap().route("contosoconcerthall").unwrap();
        assert!(matches!(outcome, wingtip_routing::RouteOutcome::Connect(_)));
    }

    #[test]
    fn load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wingtip.toml");
        let config = WingtipConfig::scaffold(dir.path(), "west");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let ctx = Context::load(&path).unwrap();
        assert!(ctx.store.list_tenants().unwrap().is_empty());
        assert!(ctx.tenant("nobody").is_err());
    }

    #[test]
    fn arg_conversions() {
        assert_eq!(ResolveStrategy::from(TrustArg::Global), ResolveStrategy::TrustGlobal);
        assert_eq!(MappingStatus::from(StatusArg::Offline), MappingStatus::Offline);
    }
}
