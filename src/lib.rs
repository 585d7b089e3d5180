//! # Jumproxy
//!
//! An encrypted jump proxy. A client tunnels a byte stream (usually its
//! terminal) through an authenticated-encryption hop to a relay, which
//! forwards the decrypted bytes to a destination service over plain TCP.
//!
//! ## Architecture
//!
//! ```text
//!  stdin/stdout            encrypted hop              plain TCP
//! ┌────────────┐  SALT | FRAME FRAME ...  ┌───────┐  raw bytes  ┌─────────┐
//! │   client   │ ───────────────────────▶ │ relay │ ──────────▶ │ service │
//! │            │ ◀─────────────────────── │       │ ◀────────── │         │
//! └────────────┘        FRAME FRAME ...   └───────┘             └─────────┘
//! ```
//!
//! Each frame on the encrypted hop is `NONCE(12) | LEN(2, BE) | CIPHERTEXT`,
//! sealed with AES-256-GCM under a key stretched from a shared passphrase
//! and a per-connection salt.

pub mod config;
pub mod crypto;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod tunnel;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Configuration error: {0}")]
    Config(String),
}
