//! wingtip-routing: tenant registration, mapping repair, and request routing.
//!
//! # Components
//!
//! - **`registrar`**: creates shard locations, global mappings, and tenant rows
//! - **`resolver`**: repairs divergence between the catalog and shard-local views
//! - **`geo`**: serve-or-redirect decision by deployment region
//! - **`router`**: per-request routing with one repair-and-retry on divergence

pub mod error;
pub mod geo;
pub mod registrar;
pub mod resolver;
pub mod router;

pub use error::{RoutingError, RoutingResult};
pub use geo::{GeoDecision, decide_routing};
pub use registrar::{SeedResult, ShardDefaults, ShardRegistrar};
pub use resolver::{MappingConsistencyResolver, ResolveStrategy, Resolution};
pub use router::{RouteOutcome, Router, RoutingPolicy, ShardTarget};
