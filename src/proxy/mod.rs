//! Mode drivers
//!
//! Provides:
//! - Client mode: stdin/stdout tunneled to a relay
//! - Relay mode: accept encrypted connections and forward them to a service

mod client;
mod relay;

pub use client::{drive_client, run_client};
pub use relay::RelayServer;

use std::fmt;
use std::net::Ipv6Addr;

/// A `host:port` to dial: the relay in client mode, the final service in
/// relay mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
