//! Rendezvous Signal Server
//!
//! HTTP signaling relay for browser peer-to-peer connection setup.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (port 8081, config from the platform config dir)
//! rendezvous-signal
//!
//! # Explicit port and static client
//! rendezvous-signal 9000 --static-dir ./client
//!
//! # Relay payloads verbatim
//! PORT=9000 rendezvous-signal --no-transform
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rendezvous_core::Config;
use rendezvous_signal::SignalServer;

#[derive(Parser, Debug)]
#[command(name = "rendezvous-signal")]
#[command(about = "Rendezvous signaling relay for peer-to-peer connection setup")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(env = "PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Config file path (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve non-channel paths from this directory
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Relay payloads without SDP transformation
    #[arg(long)]
    no_transform: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::load(),
        };

        if let Some(port) = self.port {
            config.relay.port = port;
        }
        if let Some(bind) = self.bind {
            config.relay.bind = bind;
        }
        if let Some(dir) = &self.static_dir {
            config.static_files.dir = Some(dir.clone());
        }
        if self.no_transform {
            config.relay.transform = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::sample());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let config = args.resolve_config()?;
    let addr = SocketAddr::new(config.relay.bind, config.relay.port);

    info!("Starting Rendezvous Signal Server");
    info!(
        "Keepalive every {}s, bodies up to {} bytes",
        config.relay.keepalive_interval().as_secs(),
        config.relay.max_body_bytes
    );

    let server = SignalServer::new(config);
    server.serve(addr).await?;

    Ok(())
}
