//! Bread proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     BREAD PROXY                       │
//!                     │                                                       │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐    │
//!   ──────────────────┼─▶│  http   │──▶│ security │──▶│  proxy handler   │────┼──▶ Target
//!                     │  │ server  │   │   gate   │   │ parse/fetch/hdrs │    │    site
//!                     │  └─────────┘   └──────────┘   └────────┬─────────┘    │
//!                     │                                        │              │
//!                     │                          ┌─────────────┴───────────┐  │
//!                     │                          ▼                         ▼  │
//!   Client Response   │                  ┌──────────────┐        ┌──────────┐ │
//!   ◀─────────────────┼──────────────────│   rewrite    │        │  stream  │ │
//!                     │                  │  html / css  │        │  bytes   │ │
//!                     │                  └──────────────┘        └──────────┘ │
//!                     │                                                       │
//!                     │  config · observability · lifecycle · status          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use bread_proxy::config::{load_config, ProxyConfig};
use bread_proxy::http::HttpServer;
use bread_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use bread_proxy::net::load_tls_config;
use bread_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "bread-proxy")]
#[command(about = "Streaming HTTP rewriting proxy", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bread-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.proxy.mount_path,
        timeout_ms = config.proxy.timeout_ms,
        max_body_bytes = config.proxy.max_body_bytes,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
