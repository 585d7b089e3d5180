//! Raw TCP dial and listen

use super::{TransportConfig, TransportError};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Dials TCP endpoints with a timeout
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TransportConfig,
}

impl TcpConnector {
    /// Create a new connector
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Connect to `addr` (`host:port`)
    pub async fn connect(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(addr.to_string()))?
            .map_err(|source| TransportError::DialFailure {
                addr: addr.to_string(),
                source,
            })?;

        // Small writes (salt, short frames) should not wait on Nagle
        if self.config.nodelay {
            stream.set_nodelay(true).ok();
        }

        debug!(addr, "Connected");
        Ok(stream)
    }
}

/// Bind a listening socket
pub async fn bind(addr: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}
