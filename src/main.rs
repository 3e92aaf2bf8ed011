//! Broker proxy
//!
//! Serves HTTP on the configured listener and forwards every request under
//! `/api/proxy` through the file message broker.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ request pipeline ──▶ file broker ──▶ <key>.req
//!                                         (collapse)                          │
//!                                                                          backend
//!                                                                             │
//!     Client Response                                                         ▼
//!     ◀────────────── http server ◀── registry ◀── consumer ◀── file broker ◀── <key>.resp
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use broker_proxy::config::load_config;
use broker_proxy::lifecycle::{bind, bootstrap, signals, Shutdown};
use broker_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "broker-proxy")]
#[command(about = "HTTP proxy over a file message broker", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "broker-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        broker_directory = %config.message_broker.directory_path,
        advanced_mode = config.application.use_advanced_mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    let app = bootstrap(&config, &shutdown).await?;
    let listener = bind(&config.listener).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    app.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
