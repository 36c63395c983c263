//! Portal gate
//!
//! Sits in front of the portal's application server and decides, for every
//! request, whether to forward it, redirect it, or refuse it.
//!
//! ```text
//!   Client ──▶ classify path ──▶ verify session cookie ──▶ route by role ──▶ respond
//!                    │                    ▲                      │
//!                    │              decision cache               ├─ forward (+ identity headers) ──▶ upstream
//!                    └─ public / static ─────────────────────────┤
//!                                                                └─ 307 redirect / 500
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use portal_gate::config::watcher::ConfigWatcher;
use portal_gate::config::{load_config, GateConfig};
use portal_gate::lifecycle::{shutdown_signal, Shutdown};
use portal_gate::net::load_tls_config;
use portal_gate::observability::{logging, metrics};
use portal_gate::HttpServer;

#[derive(Parser)]
#[command(name = "portal-gate")]
#[command(about = "Request-time authorization gate for the portal", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portal-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        cache_ttl_ms = config.cache.ttl_ms,
        cache_capacity = config.cache.capacity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher stops delivering updates when dropped, so keep it for the
    // lifetime of the process.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => {
            let (_tx, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, config_updates, server_shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, config_updates, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
