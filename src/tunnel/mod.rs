//! Tunnel layer - encrypted communication channel
//!
//! Provides:
//! - Frame sealing/opening over async byte streams
//! - The salt handshake that keys each hop
//! - The stop-signal and idle clock shared by the two halves of a session
//! - The bidirectional relay engine

mod frame;
mod handshake;
mod idle;
mod session;
mod signal;

pub use frame::{open_frame, seal_frame, write_sealed, Frame};
pub use handshake::{client_handshake, relay_handshake};
pub use idle::IdleClock;
pub use session::{
    forward_opened, forward_sealed, DirectionReport, ExitReason, ForwardOptions, RelaySession,
    SessionConfig, SessionSummary,
};
pub use signal::StopSignal;

use crate::crypto::CryptoError;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Tunnel layer errors
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Peer closed the stream, possibly mid-frame
    #[error("Stream closed")]
    StreamClosed,

    /// A frame failed AEAD verification (tampered or wrong key)
    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Frame too large: {0} > {1}")]
    FrameTooLarge(usize, usize),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for TunnelError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailure => TunnelError::AuthenticationFailure,
            other => TunnelError::Crypto(other),
        }
    }
}

impl TunnelError {
    /// Map an error from a read-exactly call, turning a premature EOF into
    /// [`TunnelError::StreamClosed`]
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            TunnelError::StreamClosed
        } else {
            TunnelError::Io(err)
        }
    }

    /// Whether this is an orderly disconnect rather than a failure
    pub fn is_clean_close(&self) -> bool {
        matches!(self, TunnelError::StreamClosed)
    }
}

/// Run `fut`, failing with [`TunnelError::Timeout`] if it takes longer than
/// `limit`. `None` waits forever.
pub(crate) async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TunnelError>
where
    F: Future<Output = Result<T, TunnelError>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| TunnelError::Timeout(d))?,
        None => fut.await,
    }
}
