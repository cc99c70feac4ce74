//! wingtip.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::region::{RedirectTemplate, Region};

/// Environment variable that overrides `routing.region` on a deployed instance.
pub const REGION_ENV: &str = "APP_REGION";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WingtipConfig {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tenant_server: TenantServerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub tenants: Vec<TenantSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path of the catalog redb file.
    pub path: PathBuf,
    #[serde(default = "default_service_plan")]
    pub service_plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantServerConfig {
    /// Default server hosting tenant shards.
    #[serde(default = "default_tenant_server")]
    pub server: String,
    /// Directory holding one redb file per shard.
    #[serde(default = "default_shard_root")]
    pub shard_root: PathBuf,
    /// Consumed by the tenant data layer; routing ignores it.
    #[serde(default)]
    pub reset_event_dates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Region this application instance is deployed in.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_redirect_template")]
    pub redirect_template: String,
    /// Where to send requests whose shard region cannot be determined.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
}

/// A tenant registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantSeed {
    pub name: String,
    /// Server alias for this tenant's shard; defaults to `tenant_server.server`.
    pub server: Option<String>,
}

fn default_service_plan() -> String {
    "standard".to_string()
}

fn default_port() -> u16 {
    1433
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_tenant_server() -> String {
    "tenants1-dpt-local-home.database.windows.net".to_string()
}

fn default_shard_root() -> PathBuf {
    PathBuf::from("shards")
}

fn default_region() -> String {
    "home".to_string()
}

fn default_redirect_template() -> String {
    "https://events-wingtip-{region}.example.net/{tenant}".to_string()
}

fn default_fallback_url() -> String {
    "https://events-wingtip.example.net/".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            protocol: default_protocol(),
        }
    }
}

impl Default for TenantServerConfig {
    fn default() -> Self {
        Self {
            server: default_tenant_server(),
            shard_root: default_shard_root(),
            reset_event_dates: false,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            redirect_template: default_redirect_template(),
            fallback_url: default_fallback_url(),
        }
    }
}

impl RoutingConfig {
    pub fn region(&self) -> anyhow::Result<Region> {
        Ok(Region::new(&self.region)?)
    }

    pub fn redirect_template(&self) -> anyhow::Result<RedirectTemplate> {
        Ok(RedirectTemplate::new(&self.redirect_template)?)
    }
}

impl TenantSeed {
    /// Server hosting this tenant's shard.
    pub fn server_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.server.as_deref().unwrap_or(default)
    }
}

impl WingtipConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: WingtipConfig = toml::from_str(&content)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup(REGION_ENV).filter(|r| !r.trim().is_empty()) {
            self.routing.region = region;
        }
    }

    /// Check the values routing depends on.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.routing.region()?;
        self.routing.redirect_template()?;
        if self.database.protocol != "tcp" && self.database.protocol != "default" {
            anyhow::bail!("unsupported database protocol: {}", self.database.protocol);
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal wingtip.toml rooted at `data_dir`.
    pub fn scaffold(data_dir: &Path, region: &str) -> Self {
        WingtipConfig {
            catalog: CatalogConfig {
                path: data_dir.join("catalog.redb"),
                service_plan: default_service_plan(),
            },
            database: DatabaseConfig::default(),
            tenant_server: TenantServerConfig {
                server: format!("tenants1-dpt-local-{region}.database.windows.net"),
                shard_root: data_dir.join("shards"),
                reset_event_dates: false,
            },
            routing: RoutingConfig {
                region: region.to_string(),
                ..RoutingConfig::default()
            },
            tenants: vec![TenantSeed {
                name: "Contoso Concert Hall".to_string(),
                server: None,
            }],
        }
    }
}
