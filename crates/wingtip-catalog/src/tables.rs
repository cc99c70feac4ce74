//! redb table definitions for the catalog and shard-local stores.
//!
//! Tenant-keyed tables use the 4-byte stored key form from
//! [`wingtip_core::TenantKey::to_bytes`]; values are JSON-serialized records.

use redb::TableDefinition;

/// Tenant records keyed by stored tenant key.
pub const TENANTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tenants");

/// Unique index: normalized tenant name → stored tenant key.
pub const TENANT_NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("tenant_names");

/// Shard locations keyed by `{server}/{database}`.
pub const SHARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("shards");

/// Global point mappings keyed by stored tenant key.
pub const MAPPINGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("mappings");

/// A shard's own view of the mappings it serves, keyed by stored tenant key.
pub const LOCAL_MAPPINGS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("local_mappings");
