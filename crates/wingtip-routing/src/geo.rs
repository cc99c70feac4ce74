//! Region-aware serve/redirect decision.

use serde::Serialize;
use wingtip_catalog::MappingStatus;
use wingtip_core::Region;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "region")]
pub enum GeoDecision {
    /// Handle the request on this instance.
    Serve,
    /// Handle the request on this instance with the tenant-offline response.
    ServeOffline,
    /// Send the request to the instance in the shard's region.
    RedirectTo(Region),
}

/// Decide whether this instance serves a tenant.
///
/// Offline tenants are always answered locally; online tenants are served
/// only by the instance in the shard's region.
pub fn decide_routing(
    shard_region: &Region,
    instance_region: &Region,
    status: MappingStatus,
) -> GeoDecision {
    match status {
        MappingStatus::Offline => GeoDecision::ServeOffline,
        MappingStatus::Online if shard_region == instance_region => GeoDecision::Serve,
        MappingStatus::Online => GeoDecision::RedirectTo(shard_region.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tag: &str) -> Region {
        Region::new(tag).unwrap()
    }

    #[test]
    fn same_region_online_serves() {
        assert_eq!(
            decide_routing(&region("west"), &region("WEST"), MappingStatus::Online),
            GeoDecision::Serve
        );
    }

    #[test]
    fn other_region_online_redirects() {
        assert_eq!(
            decide_routing(&region("west"), &region("east"), MappingStatus::Online),
            GeoDecision::RedirectTo(region("west"))
        );
    }

    #[test]
    fn offline_never_serves_normally() {
        for instance in ["west", "east"] {
            assert_eq!(
                decide_routing(&region("west"), &region(instance), MappingStatus::Offline),
                GeoDecision::ServeOffline
            );
        }
    }
}
