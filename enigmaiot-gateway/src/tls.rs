// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! TLS settings for the broker transport
//!
//! TLS sessions pin a root CA (PEM) and refuse to connect until the wall
//! clock is plausible, since certificate validity cannot be checked against
//! a clock that still reads 1970.

use crate::error::ConfigError;
use std::fs;
use std::path::PathBuf;

/// Default SNTP source
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";

/// Earliest year a synchronized clock can report
pub const DEFAULT_MIN_VALID_YEAR: i32 = 2019;

/// TLS configuration builder
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the pinned CA certificate (PEM)
    pub ca_path: Option<PathBuf>,
    /// Inline CA certificate (PEM), takes precedence over `ca_path`
    pub ca_pem: Option<Vec<u8>>,
    /// SNTP server used before the first connect
    pub ntp_server: String,
    /// Clock is considered synchronized from this year on
    pub min_valid_year: i32,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_path: None,
            ca_pem: None,
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            min_valid_year: DEFAULT_MIN_VALID_YEAR,
        }
    }
}

impl TlsConfig {
    /// Create a new TLS configuration with no CA
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the CA certificate stored at `path`
    pub fn with_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Pin an in-memory CA certificate
    pub fn with_ca_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_pem = Some(pem.into());
        self
    }

    /// Set the SNTP server
    pub fn with_ntp_server(mut self, server: &str) -> Self {
        self.ntp_server = server.to_string();
        self
    }

    /// Set the clock plausibility threshold
    pub fn with_min_valid_year(mut self, year: i32) -> Self {
        self.min_valid_year = year;
        self
    }

    /// Check a CA is configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ca_pem.is_none() && self.ca_path.is_none() {
            return Err(ConfigError::MissingCa);
        }
        Ok(())
    }

    /// PEM bytes of the pinned CA
    pub fn load_ca(&self) -> Result<Vec<u8>, ConfigError> {
        if let Some(pem) = &self.ca_pem {
            return Ok(pem.clone());
        }
        match &self.ca_path {
            Some(path) => Ok(fs::read(path)?),
            None => Err(ConfigError::MissingCa),
        }
    }
}
