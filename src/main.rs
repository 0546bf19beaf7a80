//! Request tracker demo service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ TimeoutLayer ─▶ track_middleware ─▶ handler
//!                                                    │        │            │
//!                                                    │        │     tracing::info! / TracedClient
//!                                                    │        │            │
//!                                                    │        ▼            ▼
//!                                                    │    PolicyGate    Correlator
//!                                                    │  /api/config       │
//!                                                    │  /api/requestCount │
//!                                                    ▼                    ▼
//!                                                TrackedBody ─────▶ Finalizer
//!                                                                       │
//!                                          per_request: Transmitter ◀───┤
//!                                          batched: EventBuffer ◀───────┘
//!                                                        │
//!                                                  BatchFlusher ─▶ POST /api/track
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_tracker::config::{apply_env_overrides, load_config, AppConfig};
use request_tracker::lifecycle::signals::shutdown_on_ctrl_c;
use request_tracker::observability::{logging, metrics};
use request_tracker::{HttpServer, Shutdown, Tracker};

#[derive(Parser)]
#[command(name = "request-tracker")]
#[command(about = "Demo service instrumented with the request tracker", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config);
            config
        }
    };

    let tracker = Tracker::new(config.tracker.clone())?;
    logging::init_logging(&config.observability, tracker.capture_layer())?;

    tracing::info!("request-tracker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        tracking_url = %config.tracker.tracking_url,
        mode = ?config.tracker.mode,
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

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    let server = HttpServer::new(config, tracker);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
