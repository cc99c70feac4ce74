//! Error types for registration, mapping repair, and routing.

use thiserror::Error;
use wingtip_catalog::CatalogError;
use wingtip_core::TenantKey;

/// Result type alias for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Errors surfaced while routing a request or repairing a mapping.
///
/// An offline tenant is not an error; it is reported as
/// [`RouteOutcome::Offline`](crate::RouteOutcome::Offline).
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("invalid tenant name: '{0}'")]
    InvalidTenantName(String),

    #[error("unsupported database protocol: '{0}'")]
    UnsupportedProtocol(String),

    #[error("no consistent mapping for tenant key {0}")]
    MappingNotFound(TenantKey),

    #[error("shard unreachable: {shard}: {reason}")]
    ShardUnreachable { shard: String, reason: String },

    #[error("mapping for tenant key {0} is still inconsistent after repair")]
    Unresolved(TenantKey),

    #[error("tenant key {key} is claimed by several shards: {}", .shards.join(", "))]
    ConflictingLocalClaims { key: TenantKey, shards: Vec<String> },

    #[error(transparent)]
    Catalog(CatalogError),
}

impl From<CatalogError> for RoutingError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ShardUnreachable { shard, reason } => {
                RoutingError::ShardUnreachable { shard, reason }
            }
            other => RoutingError::Catalog(other),
        }
    }
}

impl RoutingError {
    /// Text safe to show an end user. The cause is logged, never displayed.
    pub fn user_message(&self) -> &'static str {
        match self {
            RoutingError::TenantNotFound(_) | RoutingError::InvalidTenantName(_) => {
                "The requested venue could not be found."
            }
            _ => "An error occurred while processing your request. Please try again later.",
        }
    }
}
