//! Configuration management
//!
//! Everything here is optional; the CLI alone is enough to run either mode.

use crate::protocol::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, MAX_PLAINTEXT_LEN,
};
use crate::transport::TransportConfig;
use crate::tunnel::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relay-mode settings
    pub relay: RelayConfig,
    /// Settings shared by both modes
    pub tunnel: TunnelConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, crate::Error> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the listening port on
    pub listen_addr: String,
    /// Maximum concurrent sessions
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            max_sessions: 1024,
        }
    }
}

/// Tunnel tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Plaintext read size; each read becomes one frame
    pub chunk_size: usize,
    /// Dial timeout in seconds
    pub connect_timeout_secs: u64,
    /// Seconds to wait for the salt on a new relay connection (0 = forever)
    pub handshake_timeout_secs: u64,
    /// Seconds both directions may stay quiet before the session is torn
    /// down (0 = forever)
    pub idle_timeout_secs: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout_secs: 0,
        }
    }
}

impl TunnelConfig {
    /// Chunk size clamped to what one frame can carry
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_PLAINTEXT_LEN)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout_secs)
    }

    /// Options for relay sessions and the client driver
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            chunk_size: self.chunk_size(),
            idle_timeout: self.idle_timeout(),
        }
    }

    /// Options for dialing
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            nodelay: true,
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
