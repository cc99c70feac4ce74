//! Domain types for the catalog and shard-local stores.
//!
//! These types are serializable to/from JSON for storage in redb tables.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use wingtip_core::TenantKey;

// ── Shards ─────────────────────────────────────────────────────────

/// Connection protocol of a shard server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Default,
    Tcp,
}

impl Protocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }
}

/// Physical location of one shard database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardLocation {
    pub server: String,
    pub database: String,
    pub protocol: Protocol,
    pub port: u16,
}

impl ShardLocation {
    pub fn new(server: &str, database: &str, protocol: Protocol, port: u16) -> Self {
        Self {
            server: server.to_string(),
            database: database.to_string(),
            protocol,
            port,
        }
    }

    /// Build the composite key for the shards table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.server, self.database)
    }

    /// Data source string handed to the data-access layer.
    pub fn data_source(&self) -> String {
        match self.protocol {
            Protocol::Tcp => format!("tcp:{},{}", self.server, self.port),
            Protocol::Default => format!("{},{}", self.server, self.port),
        }
    }

    /// First DNS label of the server name.
    pub fn server_alias(&self) -> &str {
        self.server.split('.').next().unwrap_or(&self.server)
    }
}

// ── Mappings ───────────────────────────────────────────────────────

/// Whether the shard behind a mapping is serving traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    Online,
    Offline,
}

impl MappingStatus {
    pub fn is_online(self) -> bool {
        self == MappingStatus::Online
    }
}

/// Global routing fact: requests for `key` go to `location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMapping {
    pub key: TenantKey,
    pub location: ShardLocation,
    pub status: MappingStatus,
}

/// A shard's own belief that it serves `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMapping {
    pub key: TenantKey,
    pub location: ShardLocation,
    pub status: MappingStatus,
}

impl LocalMapping {
    /// True when both stores agree on location and status.
    pub fn agrees_with(&self, global: &PointMapping) -> bool {
        self.key == global.key && self.location == global.location && self.status == global.status
    }
}

impl From<&PointMapping> for LocalMapping {
    fn from(mapping: &PointMapping) -> Self {
        Self {
            key: mapping.key,
            location: mapping.location.clone(),
            status: mapping.status,
        }
    }
}

impl From<&LocalMapping> for PointMapping {
    fn from(local: &LocalMapping) -> Self {
        Self {
            key: local.key,
            location: local.location.clone(),
            status: local.status,
        }
    }
}

// ── Tenants ────────────────────────────────────────────────────────

/// Recovery state of a tenant's shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Unknown,
    Normal,
    Recovering,
}

/// Catalog row for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub key: TenantKey,
    /// Display name as registered.
    pub name: String,
    /// Whitespace-stripped lowercase name, unique across the catalog.
    pub normalized_name: String,
    pub service_plan: String,
    /// Server alias of the shard the tenant was registered on.
    pub alias: String,
    pub recovery_state: RecoveryState,
    /// Unix timestamp (seconds) of the last change.
    pub last_updated: u64,
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
