//! Plain TCP transport
//!
//! Dialing and listening for the two hops. Both the client↔relay and the
//! relay↔service hop are ordinary TCP; encryption happens above this layer.

mod tcp;

pub use tcp::{bind, TcpConnector};

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {addr}: {source}")]
    DialFailure {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Connecting to {0} timed out")]
    Timeout(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on new sockets
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(crate::protocol::DEFAULT_CONNECT_TIMEOUT),
            nodelay: true,
        }
    }
}
