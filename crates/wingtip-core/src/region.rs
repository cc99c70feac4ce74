//! Deployment region tags and peer-instance redirect URLs.
//!
//! Shard servers follow the naming convention
//! `{role}-{...}-{region}.{domain}`: the region tag is the last
//! `-`-separated segment of the first DNS label, e.g.
//! `tenants1-dpt-alice-west.database.windows.net` lives in `west`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("server name '{server}' violates the region naming convention: {reason}")]
    ConventionViolated { server: String, reason: &'static str },

    #[error("invalid region tag: '{0}'")]
    InvalidTag(String),

    #[error("redirect template must contain a {{region}} placeholder: {0}")]
    InvalidTemplate(String),
}

/// A deployment region tag, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    /// Validate a region tag. Tags are non-empty ASCII alphanumerics and
    /// compare case-insensitively.
    pub fn new(tag: &str) -> Result<Self, RegionError> {
        let tag = tag.trim();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RegionError::InvalidTag(tag.to_string()));
        }
        Ok(Self(tag.to_ascii_lowercase()))
    }

    /// Extract the region tag from a shard server identifier.
    ///
    /// Never guesses: a name that does not follow the convention is an error
    /// and callers must treat it as a region mismatch.
    pub fn from_server(server: &str) -> Result<Self, RegionError> {
        let violated = |reason| RegionError::ConventionViolated {
            server: server.to_string(),
            reason,
        };

        let label = server.trim().split('.').next().unwrap_or_default();
        if label.is_empty() {
            return Err(violated("empty host label"));
        }
        let (_, tag) = label
            .rsplit_once('-')
            .ok_or_else(|| violated("no '-' separated region segment"))?;
        if tag.is_empty() {
            return Err(violated("empty region segment"));
        }
        Self::new(tag).map_err(|_| violated("region segment is not alphanumeric"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the URL of the peer application instance serving a region.
///
/// `{region}` is replaced with the region tag and `{tenant}` with the
/// tenant path segment of the original request, unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTemplate {
    template: String,
}

impl RedirectTemplate {
    pub fn new(template: &str) -> Result<Self, RegionError> {
        if !template.contains("{region}") {
            return Err(RegionError::InvalidTemplate(template.to_string()));
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    pub fn url_for(&self, region: &Region, tenant_segment: &str) -> String {
        self.template
            .replace("{region}", region.as_str())
            .replace("{tenant}", tenant_segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_segment_of_first_label() {
        let region = Region::from_server("tenants1-dpt-alice-west.database.windows.net").unwrap();
        assert_eq!(region.as_str(), "west");

        let region = Region::from_server("contosoconcerthall-dpt-bob-eastus2").unwrap();
        assert_eq!(region.as_str(), "eastus2");
    }

    #[test]
    fn extraction_is_case_insensitive() {
        let a = Region::from_server("tenants1-dpt-alice-WEST.database.windows.net").unwrap();
        assert_eq!(a, Region::new("west").unwrap());
    }

    #[test]
    fn violations_fail_closed() {
        for server in [
            "localhost",
            "",
            ".database.windows.net",
            "tenants1-dpt-alice-.database.windows.net",
            "tenants1-dpt-alice-we_st.database.windows.net",
        ] {
            let err = Region::from_server(server).unwrap_err();
            assert!(
                matches!(err, RegionError::ConventionViolated { .. }),
                "{server}: {err}"
            );
        }
    }

    #[test]
    fn region_tag_validation() {
        assert!(Region::new("west").is_ok());
        assert_eq!(Region::new(" East ").unwrap().as_str(), "east");
        assert_eq!(Region::new(""), Err(RegionError::InvalidTag(String::new())));
        assert!(Region::new("west-1").is_err());
    }

    #[test]
    fn redirect_preserves_tenant_segment() {
        let template =
            RedirectTemplate::new("https://events-wingtip-{region}.example.net/{tenant}").unwrap();
        let url = template.url_for(&Region::new("west").unwrap(), "contosoconcerthall");
        assert_eq!(url, "https://events-wingtip-west.example.net/contosoconcerthall");
    }

    #[test]
    fn redirect_template_requires_region_placeholder() {
        assert!(matches!(
            RedirectTemplate::new("https://events.example.net/{tenant}"),
            Err(RegionError::InvalidTemplate(_))
        ));
    }
}
