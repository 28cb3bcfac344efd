//! bearer-relay
//!
//! A reverse proxy that swaps a public, rotatable bearer token for a private
//! upstream credential and forwards everything to one fixed upstream API.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 BEARER RELAY                 │
//!   Client Request      │  ┌────────┐   ┌────────┐   ┌─────────────┐   │
//!   ────────────────────┼─▶│  http  │──▶│  auth  │──▶│   forward   │   │
//!   Bearer <public>     │  │ server │   │  gate  │   │  + classify │   │
//!                       │  └────────┘   └────────┘   └──────┬──────┘   │
//!                       │                    stream ┌───────┴───────┐  │
//!                       │                           ▼               ▼  │   Bearer <private>
//!   Client Response     │                     ┌──────────┐  ┌───────────┐ ──────────────▶
//!   ◀───────────────────┼─────────────────────│  relay   │  │ translate │ │    Upstream
//!                       │                     └──────────┘  └───────────┘ ◀──────────────
//!                       │  errors ──▶ sanitize ──▶ {"detail": ...}     │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use bearer_relay::config::{load_config, load_from_env};
use bearer_relay::lifecycle::{signals::shutdown_signal, startup, Shutdown};
use bearer_relay::observability::logging::init_logging;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bearer-relay")]
#[command(about = "Credential-substituting reverse proxy", long_about = None)]
struct Cli {
    /// TOML configuration file. Without it, defaults plus RELAY_* environment
    /// variables are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    init_logging(&config.observability);
    tracing::info!("bearer-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    startup::start(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
