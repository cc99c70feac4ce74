//! Error types for the catalog and shard-local stores.

use thiserror::Error;
use wingtip_core::{KeyError, TenantKey};

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during catalog and shard-store operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("corrupt tenant key: {0}")]
    Key(#[from] KeyError),

    #[error("shard not registered in catalog: {0}")]
    ShardNotRegistered(String),

    #[error("invalid shard location: {0}")]
    InvalidShardLocation(String),

    #[error("shard unreachable: {shard}: {reason}")]
    ShardUnreachable { shard: String, reason: String },

    #[error("tenant key {key} already belongs to '{existing}', cannot register '{requested}'")]
    KeyCollision {
        key: TenantKey,
        existing: String,
        requested: String,
    },
}
