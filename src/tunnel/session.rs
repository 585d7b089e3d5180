//! Relay engine: two forwarding directions with coordinated teardown
//!
//! A session pairs the encrypted client socket with the plain service
//! socket. Each direction runs in its own task:
//!
//! ```text
//!   client ──frames──▶ [open]  ──plaintext──▶ service
//!   client ◀──frames── [seal]  ◀──plaintext── service
//! ```
//!
//! The directions share only a [`StopSignal`]. Whichever side hits a
//! terminal condition raises it, the other side notices at its next
//! suspension point, and the session finishes once both tasks have joined.
//! Each task shuts down the write half it owns on the way out; the sockets
//! are fully closed when both tasks have dropped their halves. The idle
//! timeout is measured across both directions: the session only times out
//! when neither side has carried data for the whole period.

use super::{open_frame, write_sealed, IdleClock, StopSignal, TunnelError};
use crate::crypto::Cipher;
use crate::protocol::{DEFAULT_CHUNK_SIZE, MAX_PLAINTEXT_LEN};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Why a direction stopped forwarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Its reader reached end-of-stream
    PeerClosed,
    /// The stop-signal was raised elsewhere
    Stopped,
    /// A frame failed authentication
    AuthenticationFailure,
    /// No data within the idle timeout
    IdleTimeout,
    /// Socket read/write failure
    TransportError(String),
    /// The task panicked or was cancelled
    Aborted,
}

impl From<&TunnelError> for ExitReason {
    fn from(err: &TunnelError) -> Self {
        match err {
            TunnelError::StreamClosed => ExitReason::PeerClosed,
            TunnelError::AuthenticationFailure => ExitReason::AuthenticationFailure,
            TunnelError::Timeout(_) => ExitReason::IdleTimeout,
            other => ExitReason::TransportError(other.to_string()),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::PeerClosed => f.write_str("peer closed"),
            ExitReason::Stopped => f.write_str("stopped"),
            ExitReason::AuthenticationFailure => f.write_str("authentication failure"),
            ExitReason::IdleTimeout => f.write_str("idle timeout"),
            ExitReason::TransportError(e) => write!(f, "transport error: {}", e),
            ExitReason::Aborted => f.write_str("aborted"),
        }
    }
}

/// Outcome of one forwarding direction
#[derive(Debug, Clone)]
pub struct DirectionReport {
    /// Human-readable direction name, e.g. `client->service`
    pub label: &'static str,
    /// Plaintext bytes forwarded
    pub bytes: u64,
    /// Frames sealed or opened
    pub frames: u64,
    /// Why the direction exited
    pub reason: ExitReason,
    /// Whether this direction performed the stop transition
    pub raised_stop: bool,
}

impl DirectionReport {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            bytes: 0,
            frames: 0,
            reason: ExitReason::Stopped,
            raised_stop: false,
        }
    }

    pub(crate) fn aborted(label: &'static str) -> Self {
        Self {
            reason: ExitReason::Aborted,
            ..Self::new(label)
        }
    }
}

/// Result of a finished session: both directions have reported
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Direction that opens frames arriving on the encrypted hop
    pub inbound: DirectionReport,
    /// Direction that seals plaintext onto the encrypted hop
    pub outbound: DirectionReport,
}

impl SessionSummary {
    /// Label of the direction that raised the stop-signal, if any did
    pub fn stopped_by(&self) -> Option<&'static str> {
        [&self.inbound, &self.outbound]
            .into_iter()
            .find(|r| r.raised_stop)
            .map(|r| r.label)
    }

    /// Whether either direction saw a frame fail authentication
    pub fn authentication_failed(&self) -> bool {
        self.inbound.reason == ExitReason::AuthenticationFailure
            || self.outbound.reason == ExitReason::AuthenticationFailure
    }

    /// Whether the session ended without a failure: the encrypted hop
    /// closed or the session was stopped, and every frame authenticated
    pub fn ended_cleanly(&self) -> bool {
        !self.authentication_failed()
            && matches!(
                self.inbound.reason,
                ExitReason::PeerClosed | ExitReason::Stopped
            )
    }
}

/// Tunables for a relay session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read size on the plaintext side; each read becomes one frame
    pub chunk_size: usize,
    /// Tear the session down once neither direction has carried data for
    /// this long
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_timeout: None,
        }
    }
}

/// Per-direction options for [`forward_sealed`] and [`forward_opened`]
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub label: &'static str,
    pub chunk_size: usize,
    /// Exit with [`ExitReason::IdleTimeout`] once `activity` has been quiet
    /// this long
    pub idle_timeout: Option<Duration>,
    /// Activity clock shared with the opposite direction
    pub activity: IdleClock,
    /// Raise the stop-signal when the reader hits end-of-stream
    pub stop_on_eof: bool,
    /// Shut down the writer when the direction exits. When unset the caller
    /// keeps the write half open.
    pub shutdown_on_exit: bool,
}

impl ForwardOptions {
    /// Options for one direction of a session: stop on EOF, shut down the
    /// writer on exit
    pub fn new(label: &'static str, config: &SessionConfig, activity: &IdleClock) -> Self {
        Self {
            label,
            chunk_size: config.chunk_size,
            idle_timeout: config.idle_timeout,
            activity: activity.clone(),
            stop_on_eof: true,
            shutdown_on_exit: true,
        }
    }
}

/// Read plaintext from `reader` in chunks, seal each chunk, and write the
/// frames to `writer` until EOF, an error, or the stop-signal.
pub async fn forward_sealed<R, W>(
    mut reader: R,
    mut writer: W,
    cipher: Arc<Cipher>,
    stop: StopSignal,
    opts: ForwardOptions,
) -> DirectionReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = DirectionReport::new(opts.label);
    let mut buf = vec![0u8; opts.chunk_size.clamp(1, MAX_PLAINTEXT_LEN)];

    let reason = loop {
        if stop.is_raised() {
            break ExitReason::Stopped;
        }

        let n = tokio::select! {
            biased;
            _ = stop.raised() => break ExitReason::Stopped,
            _ = opts.activity.expired(opts.idle_timeout) => break ExitReason::IdleTimeout,
            r = reader.read(&mut buf) => match r {
                Ok(0) => break ExitReason::PeerClosed,
                Ok(n) => n,
                Err(e) => break ExitReason::TransportError(e.to_string()),
            },
        };
        opts.activity.touch();

        match write_sealed(&mut writer, &buf[..n], &cipher).await {
            Ok(frames) => {
                report.bytes += n as u64;
                report.frames += frames as u64;
                trace!(direction = opts.label, bytes = n, "Sealed chunk");
            }
            Err(e) => break ExitReason::from(&e),
        }
    };

    finish(&mut report, reason, &stop, opts.stop_on_eof);
    if opts.shutdown_on_exit {
        if let Err(e) = writer.shutdown().await {
            trace!(direction = opts.label, "Shutdown error: {}", e);
        }
    }
    report
}

/// Open frames from `reader` and write the plaintext to `writer` until the
/// stream closes, a frame fails authentication, or the stop-signal.
pub async fn forward_opened<R, W>(
    mut reader: R,
    mut writer: W,
    cipher: Arc<Cipher>,
    stop: StopSignal,
    opts: ForwardOptions,
) -> DirectionReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = DirectionReport::new(opts.label);

    let reason = loop {
        if stop.is_raised() {
            break ExitReason::Stopped;
        }

        let plaintext = tokio::select! {
            biased;
            _ = stop.raised() => break ExitReason::Stopped,
            _ = opts.activity.expired(opts.idle_timeout) => break ExitReason::IdleTimeout,
            r = open_frame(&mut reader, &cipher) => match r {
                Ok(p) => p,
                Err(e) => break ExitReason::from(&e),
            },
        };
        opts.activity.touch();

        let written = async {
            writer.write_all(&plaintext).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            break ExitReason::TransportError(e.to_string());
        }

        report.bytes += plaintext.len() as u64;
        report.frames += 1;
        trace!(direction = opts.label, bytes = plaintext.len(), "Opened frame");
    };

    finish(&mut report, reason, &stop, opts.stop_on_eof);
    if opts.shutdown_on_exit {
        if let Err(e) = writer.shutdown().await {
            trace!(direction = opts.label, "Shutdown error: {}", e);
        }
    }
    report
}

fn finish(report: &mut DirectionReport, reason: ExitReason, stop: &StopSignal, stop_on_eof: bool) {
    match &reason {
        ExitReason::AuthenticationFailure => {
            warn!(direction = report.label, "Frame failed authentication, closing session");
        }
        ExitReason::TransportError(e) => {
            debug!(direction = report.label, "Transport error: {}", e);
        }
        _ => debug!(direction = report.label, reason = %reason, "Direction finished"),
    }

    let raise = match reason {
        ExitReason::Stopped => false,
        ExitReason::PeerClosed => stop_on_eof,
        _ => true,
    };
    if raise {
        report.raised_stop = stop.raise();
    }
    report.reason = reason;
}

/// One relayed connection: the encrypted client hop paired with the plain
/// service hop
pub struct RelaySession {
    cipher: Arc<Cipher>,
    config: SessionConfig,
    stop: StopSignal,
}

impl RelaySession {
    /// Create a session keyed by the client hop's cipher
    pub fn new(cipher: Cipher, config: SessionConfig) -> Self {
        Self {
            cipher: Arc::new(cipher),
            config,
            stop: StopSignal::new(),
        }
    }

    /// Use an externally owned stop-signal, e.g. a child of the process
    /// shutdown token
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle to this session's stop-signal
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Relay between two TCP sockets until both directions have exited
    pub async fn run(self, client: TcpStream, service: TcpStream) -> SessionSummary {
        let (client_read, client_write) = client.into_split();
        let (service_read, service_write) = service.into_split();
        self.run_split(client_read, client_write, service_read, service_write)
            .await
    }

    /// Relay between arbitrary stream halves until both directions have
    /// exited
    pub async fn run_split<CR, CW, SR, SW>(
        self,
        client_read: CR,
        client_write: CW,
        service_read: SR,
        service_write: SW,
    ) -> SessionSummary
    where
        CR: AsyncRead + Unpin + Send + 'static,
        CW: AsyncWrite + Unpin + Send + 'static,
        SR: AsyncRead + Unpin + Send + 'static,
        SW: AsyncWrite + Unpin + Send + 'static,
    {
        const INBOUND: &str = "client->service";
        const OUTBOUND: &str = "service->client";

        let activity = IdleClock::new();

        let inbound = tokio::spawn(forward_opened(
            client_read,
            service_write,
            Arc::clone(&self.cipher),
            self.stop.clone(),
            ForwardOptions::new(INBOUND, &self.config, &activity),
        ));

        let outbound = tokio::spawn(forward_sealed(
            service_read,
            client_write,
            Arc::clone(&self.cipher),
            self.stop.clone(),
            ForwardOptions::new(OUTBOUND, &self.config, &activity),
        ));

        let (inbound, outbound) = tokio::join!(inbound, outbound);

        let inbound = inbound.unwrap_or_else(|e| {
            warn!("Inbound direction aborted: {}", e);
            DirectionReport::aborted(INBOUND)
        });
        let outbound = outbound.unwrap_or_else(|e| {
            warn!("Outbound direction aborted: {}", e);
            DirectionReport::aborted(OUTBOUND)
        });

        SessionSummary { inbound, outbound }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{SessionKey, KEY_LEN};
    use crate::tunnel::seal_frame;
    use tokio::io::{duplex, DuplexStream};

    fn cipher() -> Cipher {
        Cipher::new(&SessionKey::from([0x42u8; KEY_LEN])).unwrap()
    }

    struct Harness {
        /// Test's end of the encrypted client hop
        client: DuplexStream,
        /// Test's end of the plain service hop
        service: DuplexStream,
        session: tokio::task::JoinHandle<SessionSummary>,
        stop: StopSignal,
    }

    fn start(config: SessionConfig) -> Harness {
        let (client, relay_client) = duplex(64 * 1024);
        let (service, relay_service) = duplex(64 * 1024);

        let session = RelaySession::new(cipher(), config);
        let stop = session.stop_signal();

        let (cr, cw) = tokio::io::split(relay_client);
        let (sr, sw) = tokio::io::split(relay_service);
        let session = tokio::spawn(session.run_split(cr, cw, sr, sw));

        Harness {
            client,
            service,
            session,
            stop,
        }
    }

    #[tokio::test]
    async fn test_forwards_both_directions() {
        let mut h = start(SessionConfig::default());
        let cipher = cipher();

        h.client
            .write_all(&seal_frame(b"ping\n", &cipher).unwrap())
            .await
            .unwrap();
        let mut buf = [0u8; 5];
        h.service.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");

        h.service.write_all(b"pong\n").await.unwrap();
        assert_eq!(open_frame(&mut h.client, &cipher).await.unwrap(), b"pong\n");

        drop(h.client);
        let summary = h.session.await.unwrap();
        assert_eq!(summary.inbound.reason, ExitReason::PeerClosed);
        assert_eq!(summary.inbound.bytes, 5);
        assert_eq!(summary.outbound.bytes, 5);
        assert_eq!(summary.stopped_by(), Some("client->service"));
        assert!(summary.ended_cleanly());
    }

    #[tokio::test]
    async fn test_authentication_failure_tears_down() {
        let mut h = start(SessionConfig::default());
        let wrong = Cipher::new(&SessionKey::from([0x07u8; KEY_LEN])).unwrap();

        h.client
            .write_all(&seal_frame(b"ping\n", &wrong).unwrap())
            .await
            .unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(5), h.session)
            .await
            .unwrap()
            .unwrap();
        assert!(summary.authentication_failed());
        assert!(!summary.ended_cleanly());
        assert_eq!(summary.outbound.reason, ExitReason::Stopped);

        // Nothing reached the service and it sees EOF
        let mut rest = Vec::new();
        h.service.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_service_close_closes_client() {
        let mut h = start(SessionConfig::default());

        drop(h.service);

        // Client hop sees a clean end-of-stream within bounded time
        let result = tokio::time::timeout(Duration::from_secs(5), open_frame(&mut h.client, &cipher()))
            .await
            .unwrap();
        assert!(matches!(result, Err(TunnelError::StreamClosed)));

        let summary = h.session.await.unwrap();
        assert_eq!(summary.stopped_by(), Some("service->client"));
    }

    #[tokio::test]
    async fn test_external_stop_joins_both() {
        let h = start(SessionConfig::default());

        assert!(h.stop.raise());
        let summary = tokio::time::timeout(Duration::from_secs(5), h.session)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.inbound.reason, ExitReason::Stopped);
        assert_eq!(summary.outbound.reason, ExitReason::Stopped);
        assert_eq!(summary.stopped_by(), None);
        drop((h.client, h.service));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let h = start(SessionConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        });

        let summary = tokio::time::timeout(Duration::from_secs(5), h.session)
            .await
            .unwrap()
            .unwrap();
        assert!(
            summary.inbound.reason == ExitReason::IdleTimeout
                || summary.outbound.reason == ExitReason::IdleTimeout
        );
        assert!(summary.stopped_by().is_some());
        drop((h.client, h.service));
    }

    #[tokio::test]
    async fn test_chunking_policy() {
        let mut h = start(SessionConfig {
            chunk_size: 4,
            idle_timeout: None,
        });
        let cipher = cipher();

        h.service.write_all(b"abcdefghij").await.unwrap();

        let mut received = Vec::new();
        while received.len() < 10 {
            let chunk = open_frame(&mut h.client, &cipher).await.unwrap();
            assert!(chunk.len() <= 4);
            received.extend(chunk);
        }
        assert_eq!(received, b"abcdefghij");

        h.stop.raise();
        h.session.await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_sealed_half_close_without_stop() {
        let (mut input, reader) = duplex(1024);
        let (writer, mut wire) = duplex(1024);
        let stop = StopSignal::new();

        input.write_all(b"hello").await.unwrap();
        drop(input);

        let report = forward_sealed(
            reader,
            writer,
            Arc::new(cipher()),
            stop.clone(),
            ForwardOptions {
                stop_on_eof: false,
                ..ForwardOptions::new("stdin->relay", &SessionConfig::default(), &IdleClock::new())
            },
        )
        .await;

        assert_eq!(report.reason, ExitReason::PeerClosed);
        assert!(!report.raised_stop);
        assert!(!stop.is_raised());

        assert_eq!(open_frame(&mut wire, &cipher()).await.unwrap(), b"hello");
        assert!(matches!(
            open_frame(&mut wire, &cipher()).await,
            Err(TunnelError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_one_way_upload_is_not_idle() {
        let mut h = start(SessionConfig {
            idle_timeout: Some(Duration::from_millis(300)),
            ..SessionConfig::default()
        });
        let cipher = cipher();

        // Client keeps sending for well past the timeout; the service never replies
        let mut received = Vec::new();
        for _ in 0..10 {
            h.client
                .write_all(&seal_frame(b"data\n", &cipher).unwrap())
                .await
                .unwrap();
            let mut buf = [0u8; 5];
            h.service.read_exact(&mut buf).await.unwrap();
            received.extend_from_slice(&buf);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(received.len(), 50);
        assert!(!h.session.is_finished());

        // Once both sides go quiet the session times out
        let summary = tokio::time::timeout(Duration::from_secs(5), h.session)
            .await
            .unwrap()
            .unwrap();
        assert!(
            summary.inbound.reason == ExitReason::IdleTimeout
                || summary.outbound.reason == ExitReason::IdleTimeout
        );
        assert_eq!(summary.inbound.bytes, 50);
        drop((h.client, h.service));
    }

    #[tokio::test]
    async fn test_writer_left_open_without_shutdown_on_exit() {
        let (input, reader) = duplex(1024);
        let (writer, mut wire) = duplex(1024);
        drop(input);

        let mut writer = writer;
        let report = forward_sealed(
            reader,
            &mut writer,
            Arc::new(cipher()),
            StopSignal::new(),
            ForwardOptions {
                stop_on_eof: false,
                shutdown_on_exit: false,
                ..ForwardOptions::new("stdin->relay", &SessionConfig::default(), &IdleClock::new())
            },
        )
        .await;
        assert_eq!(report.reason, ExitReason::PeerClosed);

        // The wire is still open: a later write goes through
        writer
            .write_all(&seal_frame(b"late", &cipher()).unwrap())
            .await
            .unwrap();
        assert_eq!(open_frame(&mut wire, &cipher()).await.unwrap(), b"late");
    }
}
