//! Jumproxy
//!
//! Client mode (default): dial the relay at HOST:PORT and tunnel
//! stdin/stdout through the encrypted hop.
//!
//! Relay mode (`-l PORT`): accept encrypted connections on PORT and forward
//! each one, decrypted, to the service at HOST:PORT.

use anyhow::{Context, Result};
use clap::Parser;
use jumproxy::{
    config::Config,
    crypto::Passphrase,
    proxy::{run_client, Destination, RelayServer},
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Jumproxy - encrypted jump proxy
#[derive(Parser, Debug)]
#[command(name = "jumproxy")]
#[command(about = "Jumproxy - tunnel a byte stream through an encrypted relay")]
#[command(version)]
struct Args {
    /// Use the ASCII passphrase contained in this file
    #[arg(short = 'k', long = "key-file", default_value = "mykey")]
    key_file: PathBuf,

    /// Reverse-proxy mode: listen for inbound connections on this port and
    /// relay them to HOST:PORT
    #[arg(short = 'l', long = "listen")]
    listen: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    /// Destination host (the relay in client mode, the service in relay mode)
    host: String,

    /// Destination port
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging; stderr keeps stdout clean for the tunnel
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let passphrase = Passphrase::load(&args.key_file).with_context(|| {
        format!("Failed to read passphrase file {}", args.key_file.display())
    })?;
    if passphrase.is_empty() {
        warn!("Passphrase file is empty");
    }

    let destination = Destination::new(args.host, args.port);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
                shutdown.cancel();
            }
        }
    });

    match args.listen {
        Some(port) => {
            info!("Jumproxy v{} (relay mode)", jumproxy::VERSION);
            let relay = RelayServer::bind(port, &destination, passphrase, config)
                .await
                .context("Failed to start relay")?;
            relay.run(shutdown).await;
            Ok(())
        }
        None => {
            info!("Jumproxy v{} (client mode)", jumproxy::VERSION);
            let summary = run_client(
                &destination,
                &passphrase,
                &config.tunnel,
                tokio::io::stdin(),
                tokio::io::stdout(),
                &shutdown,
            )
            .await
            .context("Tunnel failed")?;

            if !summary.ended_cleanly() {
                error!("Tunnel closed abnormally ({})", summary.inbound.reason);
            }

            // A pending stdin read sits on a blocking thread that runtime
            // shutdown would wait on forever
            std::process::exit(if summary.ended_cleanly() { 0 } else { 1 });
        }
    }
}
