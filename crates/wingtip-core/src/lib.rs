pub mod config;
pub mod key;
pub mod region;

pub use config::WingtipConfig;
pub use key::{KeyError, TenantKey, normalize_tenant_name};
pub use region::{RedirectTemplate, Region, RegionError};
