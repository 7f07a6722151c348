//! Tunnel device configuration.
//!
//! A [`TunConfig`] is built programmatically or loaded from an INI file
//! (see [`ini`]). The session stores a normalized clone on `init`.
//!
//! # Example
//!
//! ```
//! use tunsession::TunConfig;
//!
//! let config = TunConfig::new("tun0", "10.8.0.1/24")
//!     .ipv6("fd00::1/64")
//!     .mtu(1400);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.mtu_value(), 1400);
//! ```

pub mod ini;

use std::path::Path;

use crate::error::{Error, Result};
use crate::util::ifname;

/// Default MTU applied when none (or an out-of-range one) is configured.
pub const DEFAULT_MTU: u32 = 1500;

/// Largest accepted MTU.
pub const MAX_MTU: u32 = 9000;

/// Parameters of the tunnel device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunConfig {
    name: String,
    ipv4: String,
    #[cfg_attr(feature = "serde", serde(default))]
    ipv6: Option<String>,
    #[cfg_attr(feature = "serde", serde(default = "default_mtu"))]
    mtu: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    persist: bool,
}

#[cfg(feature = "serde")]
fn default_mtu() -> u32 {
    DEFAULT_MTU
}

impl TunConfig {
    /// Create a configuration with the required fields.
    ///
    /// `ipv4` is CIDR notation (`10.8.0.1/24`).
    pub fn new(name: impl Into<String>, ipv4: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ipv4: ipv4.into(),
            ipv6: None,
            mtu: DEFAULT_MTU,
            persist: false,
        }
    }

    /// Load a configuration from an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ini::load(path.as_ref())
    }

    /// Parse a configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self> {
        ini::parse(text)
    }

    /// Set the IPv6 address in CIDR notation. Empty disables IPv6.
    pub fn ipv6(mut self, ipv6: impl Into<String>) -> Self {
        let ipv6 = ipv6.into();
        self.ipv6 = if ipv6.trim().is_empty() {
            None
        } else {
            Some(ipv6)
        };
        self
    }

    /// Set the MTU.
    ///
    /// Values outside `(0, 9000]` are replaced with [`DEFAULT_MTU`] when the
    /// configuration is normalized.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    /// Keep the device after its descriptor is closed.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// IPv4 address in CIDR notation.
    pub fn ipv4_cidr(&self) -> &str {
        &self.ipv4
    }

    /// IPv6 address in CIDR notation, if configured.
    pub fn ipv6_cidr(&self) -> Option<&str> {
        self.ipv6.as_deref()
    }

    /// Configured MTU.
    pub fn mtu_value(&self) -> u32 {
        self.mtu
    }

    /// Whether the device is made persistent.
    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    /// Check the required fields.
    pub fn validate(&self) -> Result<()> {
        ifname::validate(&self.name).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if self.ipv4.trim().is_empty() {
            return Err(Error::InvalidConfig("ipv4 address is required".to_string()));
        }
        Ok(())
    }

    /// Copy with the MTU clamped into the accepted range.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        config.mtu = clamp_mtu(i64::from(self.mtu));
        config
    }
}

/// Map a raw MTU onto the accepted range, falling back to [`DEFAULT_MTU`].
pub(crate) fn clamp_mtu(raw: i64) -> u32 {
    if raw > 0 && raw <= i64::from(MAX_MTU) {
        raw as u32
    } else {
        tracing::warn!(mtu = raw, "MTU out of range, using {}", DEFAULT_MTU);
        DEFAULT_MTU
    }
}
