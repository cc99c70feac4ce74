//! wingtip-catalog: the tenant catalog and shard-local mapping stores.
//!
//! Backed by [redb](https://docs.rs/redb). The catalog holds tenant records,
//! a normalized-name index, shard locations, and the global point mappings
//! (tenant key → shard, plus reachability). Every shard additionally keeps
//! its own local copy of the mappings it serves; the two can drift apart
//! after administrative or failover operations.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Tenant keys are stored in their sign-flipped big-endian form so that
//! redb's byte ordering matches signed key ordering.
//!
//! ```text
//! ShardDirectory (read-only)
//!   └── CatalogStore ── tenants / tenant_names / shards / mappings
//! ShardStores (one LocalMappingStore per shard location)
//!   └── LocalMappingStore ── local_mappings
//! ```
//!
//! Stores are `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod directory;
pub mod error;
pub mod local;
pub mod shards;
pub mod store;
pub mod tables;
pub mod types;

pub use directory::ShardDirectory;
pub use error::{CatalogError, CatalogResult};
pub use local::LocalMappingStore;
pub use shards::ShardStores;
pub use store::{CatalogStore, Registration};
pub use types::*;
