// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for the gateway output adapter

use crate::error::ConfigError;
use crate::tls::TlsConfig;
use enigmaiot::MacAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum broker host length
pub const MAX_HOST_LEN: usize = 40;
/// Maximum broker user name length
pub const MAX_USER_LEN: usize = 20;
/// Maximum broker password length
pub const MAX_PASS_LEN: usize = 40;
/// Default plain MQTT port
pub const DEFAULT_PORT: u16 = 1883;
/// Default MQTT over TLS port
pub const DEFAULT_TLS_PORT: u16 = 8883;
/// Default persisted config file
pub const DEFAULT_CONFIG_FILE: &str = "mqtt.json";

/// Broker address and credentials, as persisted in `mqtt.json`
///
/// Immutable once a session starts; changing it means restarting the output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name or address
    #[serde(rename = "mqtt_server")]
    pub host: String,

    /// Broker TCP port
    #[serde(rename = "mqtt_port")]
    pub port: u16,

    /// User name (empty for anonymous)
    #[serde(rename = "mqtt_user", default)]
    pub user: String,

    /// Password
    #[serde(rename = "mqtt_pass", default)]
    pub password: String,
}

impl BrokerConfig {
    /// Anonymous broker on `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: String::new(),
            password: String::new(),
        }
    }

    /// Add credentials
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Default port for plain or TLS transport
    pub fn default_port(tls: bool) -> u16 {
        if tls {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PORT
        }
    }

    /// User name and password, or `None` for anonymous sessions
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() {
            None
        } else {
            Some((self.user.as_str(), self.password.as_str()))
        }
    }

    /// Check field limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        check_len("mqtt_server", &self.host, MAX_HOST_LEN)?;
        check_len("mqtt_user", &self.user, MAX_USER_LEN)?;
        check_len("mqtt_pass", &self.password, MAX_PASS_LEN)?;
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }
        Ok(())
    }

    /// Read and validate a persisted config
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: BrokerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ConfigError> {
    let len = value.chars().count();
    if len > max {
        return Err(ConfigError::TooLong { field, len, max });
    }
    Ok(())
}

/// Outbound queue limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of pending records
    pub max_records: usize,

    /// Maximum total payload bytes held by pending records
    pub max_payload_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_records: 32,
            max_payload_bytes: 4 * 1024,
        }
    }
}

/// Broker session timing
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Budget for a CONNECT to be acknowledged
    pub connect_timeout: Duration,

    /// MQTT keep-alive interval
    pub keep_alive: Duration,

    /// First reconnect delay
    pub backoff_initial: Duration,

    /// Upper bound for reconnect delay
    pub backoff_max: Duration,

    /// Delay growth per failed attempt
    pub backoff_multiplier: f64,

    /// Uptime after which a connection counts as stable and the backoff resets
    pub stable_after: Duration,

    /// Longest a single link poll may block while connected
    pub poll_slice: Duration,

    /// Inbound events handled per tick
    pub inbound_budget: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(15),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            stable_after: Duration::from_secs(30),
            poll_slice: Duration::from_millis(10),
            inbound_budget: 8,
        }
    }
}

/// Output adapter configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// EnigmaIOT network name, root of every topic
    pub network_name: String,

    /// The gateway's own MAC, used as MQTT client id
    pub gateway_address: MacAddress,

    /// Broker settings; loaded from `config_path` when `None`
    pub broker: Option<BrokerConfig>,

    /// Persisted broker config location
    pub config_path: PathBuf,

    /// TLS transport settings; plain TCP when `None`
    pub tls: Option<TlsConfig>,

    /// Outbound queue limits
    pub queue: QueueConfig,

    /// Session timing
    pub session: SessionConfig,

    /// Inbound payloads longer than this are truncated
    pub max_inbound_payload: usize,

    /// Records published per tick
    pub publish_budget: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network_name: "EnigmaIOT".to_string(),
            gateway_address: MacAddress::default(),
            broker: None,
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            tls: None,
            queue: QueueConfig::default(),
            session: SessionConfig::default(),
            max_inbound_payload: 256,
            publish_budget: 8,
        }
    }
}

impl GatewayConfig {
    /// Configuration for a named network
    pub fn new(network_name: impl Into<String>, gateway_address: MacAddress) -> Self {
        Self {
            network_name: network_name.into(),
            gateway_address,
            ..Default::default()
        }
    }

    /// Use an explicit broker config instead of the persisted one
    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Persisted config location
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Enable TLS
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Override queue limits
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Override session timing
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Whether TLS transport is enabled
    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check the network name is usable as a topic root
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.network_name;
        if name.is_empty() || name.contains(['/', '+', '#']) {
            return Err(ConfigError::InvalidNetworkName(name.clone()));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}
