//! Relay mode: accept encrypted connections and forward each one to the
//! destination service
//!
//! Per connection: read the salt, dial the service, then run a
//! [`RelaySession`]. Any failure is contained to that connection; the
//! accept loop keeps running.

use super::Destination;
use crate::config::Config;
use crate::crypto::Passphrase;
use crate::transport::{self, TcpConnector, TransportError};
use crate::tunnel::{relay_handshake, with_timeout, RelaySession, SessionSummary, StopSignal};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pause after a failed accept so resource exhaustion doesn't spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// State shared across connections
struct RelayState {
    destination: String,
    passphrase: Passphrase,
    config: Config,
    connector: TcpConnector,
    /// Limits concurrent sessions
    sessions: Semaphore,
}

/// Listening relay
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Bind `listen_port` on the configured address
    pub async fn bind(
        listen_port: u16,
        destination: &Destination,
        passphrase: Passphrase,
        config: Config,
    ) -> Result<Self, TransportError> {
        let addr = Destination::new(config.relay.listen_addr.clone(), listen_port).to_string();
        let listener = transport::bind(&addr).await?;

        let state = RelayState {
            destination: destination.to_string(),
            passphrase,
            connector: TcpConnector::new(config.tunnel.transport()),
            sessions: Semaphore::new(config.relay.max_sessions.max(1)),
            config,
        };

        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    /// Address the relay is listening on
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            listen = ?self.listener.local_addr().ok(),
            destination = %self.state.destination,
            "Relay listening"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Relay shutting down");
                    break;
                }
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!("New connection from {}", peer);

                            let state = Arc::clone(&self.state);
                            let stop = StopSignal::child_of(&shutdown);
                            tokio::spawn(
                                async move {
                                    if let Err(e) = handle_connection(stream, state, stop).await {
                                        debug!("Connection error: {}", e);
                                    }
                                }
                                .instrument(info_span!("session", %peer)),
                            );
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }
}

/// Handle a single inbound connection
async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<RelayState>,
    stop: StopSignal,
) -> crate::Result<SessionSummary> {
    if state.sessions.available_permits() == 0 {
        debug!("Session limit reached, waiting for a free slot");
    }
    let Ok(_permit) = state.sessions.acquire().await else {
        return Err(io::Error::other("session limiter closed").into());
    };

    stream.set_nodelay(true).ok();

    let handshake = with_timeout(
        state.config.tunnel.handshake_timeout(),
        relay_handshake(&mut stream, &state.passphrase),
    )
    .await;
    let cipher = match handshake {
        Ok(cipher) => cipher,
        Err(e) if e.is_clean_close() => {
            debug!("Peer closed before sending a salt");
            return Err(e.into());
        }
        Err(e) => {
            warn!("Handshake failed: {}", e);
            return Err(e.into());
        }
    };

    let service = match state.connector.connect(&state.destination).await {
        Ok(service) => service,
        Err(e) => {
            warn!("Failed to connect to service: {}", e);
            return Err(e.into());
        }
    };

    let session = RelaySession::new(cipher, state.config.tunnel.session()).with_stop_signal(stop);
    let summary = session.run(stream, service).await;

    info!(
        to_service = summary.inbound.bytes,
        to_client = summary.outbound.bytes,
        stopped_by = summary.stopped_by().unwrap_or("shutdown"),
        "Session closed ({}, {})",
        summary.inbound.reason,
        summary.outbound.reason
    );
    Ok(summary)
}
