//! Tenant key derivation and the catalog's key storage codec.
//!
//! A tenant key is the first four bytes of the MD5 digest of the
//! normalized tenant name, read as a big-endian `i32`. MD5 is used for bit
//! distribution only.
//!
//! The catalog stores keys as byte strings and relies on byte ordering for
//! range scans, so the stored form is the big-endian encoding with the sign
//! bit flipped. That maps `i32::MIN..=i32::MAX` onto `0x00000000..=0xFFFFFFFF`
//! and makes lexicographic byte order agree with signed numeric order.

use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("stored tenant key must be {expected} bytes, got {actual}")]
    InvalidWidth { expected: usize, actual: usize },
}

/// Canonical tenant key used by every layer of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(i32);

impl TenantKey {
    /// Width of the stored key in bytes.
    pub const WIDTH: usize = 4;

    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Derive the key for a tenant name. Names that normalize to the same
    /// string always yield the same key.
    pub fn derive(tenant_name: &str) -> Self {
        let normalized = normalize_tenant_name(tenant_name);
        let digest = Md5::digest(normalized.as_bytes());
        let prefix = [digest[0], digest[1], digest[2], digest[3]];
        Self(i32::from_be_bytes(prefix))
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    /// Encode for storage: big-endian with the top bit of the first byte flipped.
    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = self.0.to_be_bytes();
        bytes[0] ^= 0x80;
        bytes
    }

    /// Decode a stored key produced by [`TenantKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut raw: [u8; Self::WIDTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidWidth {
                expected: Self::WIDTH,
                actual: bytes.len(),
            })?;
        raw[0] ^= 0x80;
        Ok(Self(i32::from_be_bytes(raw)))
    }

    /// Upper-case hex of the stored bytes, as used in URLs and session data.
    pub fn to_hex(self) -> String {
        hex::encode_upper(self.to_bytes())
    }
}

impl From<i32> for TenantKey {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup form of a tenant name: all whitespace removed, lowercased.
///
/// Also the shard database name for the tenant.
pub fn normalize_tenant_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
