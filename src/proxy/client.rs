//! Client mode: tunnel a local byte stream to the relay
//!
//! Local input (stdin) is read in chunks and sealed onto the socket;
//! frames from the relay are opened and written to local output (stdout).
//! Local EOF stops the upstream direction but leaves the socket fully open:
//! the relay treats end-of-stream as the end of the session, so replies
//! still in flight would be lost. The session ends when the relay closes.

use super::Destination;
use crate::config::TunnelConfig;
use crate::crypto::{Cipher, Passphrase};
use crate::transport::TcpConnector;
use crate::tunnel::{
    client_handshake, forward_opened, forward_sealed, DirectionReport, ForwardOptions, IdleClock,
    SessionConfig, SessionSummary, StopSignal,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const UPSTREAM: &str = "local->relay";
const DOWNSTREAM: &str = "relay->local";

/// Dial the relay, perform the handshake, and tunnel `input`/`output`
/// through it until the relay closes or `shutdown` fires.
pub async fn run_client<I, O>(
    relay: &Destination,
    passphrase: &Passphrase,
    config: &TunnelConfig,
    input: I,
    output: O,
    shutdown: &CancellationToken,
) -> crate::Result<SessionSummary>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let addr = relay.to_string();
    let mut stream = TcpConnector::new(config.transport()).connect(&addr).await?;
    info!(relay = %addr, "Connected to relay");

    let cipher = client_handshake(&mut stream, passphrase).await?;

    let summary = drive_client(
        stream,
        cipher,
        config.session(),
        input,
        output,
        StopSignal::child_of(shutdown),
    )
    .await;

    info!(
        sent = summary.outbound.bytes,
        received = summary.inbound.bytes,
        "Tunnel closed ({})",
        summary.inbound.reason
    );
    Ok(summary)
}

/// Run both client directions over an already keyed socket
pub async fn drive_client<I, O>(
    stream: TcpStream,
    cipher: Cipher,
    config: SessionConfig,
    input: I,
    output: O,
    stop: StopSignal,
) -> SessionSummary
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let cipher = Arc::new(cipher);
    let (socket_read, mut socket_write) = stream.into_split();
    let activity = IdleClock::new();

    // Local input counts as activity but only the relay side times out
    let upstream_opts = ForwardOptions {
        idle_timeout: None,
        stop_on_eof: false,
        shutdown_on_exit: false,
        ..ForwardOptions::new(UPSTREAM, &config, &activity)
    };
    let upstream = tokio::spawn({
        let cipher = Arc::clone(&cipher);
        let stop = stop.clone();
        async move {
            let report =
                forward_sealed(input, &mut socket_write, cipher, stop.clone(), upstream_opts).await;
            // Dropping the write half would send FIN; hold it until the
            // session is over
            stop.raised().await;
            report
        }
    });

    let downstream = tokio::spawn(forward_opened(
        socket_read,
        output,
        cipher,
        stop.clone(),
        ForwardOptions::new(DOWNSTREAM, &config, &activity),
    ));

    let (upstream, downstream) = tokio::join!(upstream, downstream);

    let outbound = upstream.unwrap_or_else(|e| {
        warn!("Upstream direction aborted: {}", e);
        DirectionReport::aborted(UPSTREAM)
    });
    let inbound = downstream.unwrap_or_else(|e| {
        warn!("Downstream direction aborted: {}", e);
        DirectionReport::aborted(DOWNSTREAM)
    });

    SessionSummary { inbound, outbound }
}
