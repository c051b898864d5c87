//! Application entry point for the `fogflow-cloud` ingestion service.
//!
//! Startup sequence:
//! - Initialize structured logging/tracing
//! - Load configuration from environment variables or `.env`
//! - Build the in-memory service state (credential table, history ring,
//!   alert log, trend predictor)
//! - Mount all API routes via the `routes` gateway (EMBP pattern)
//! - Bind the Axum HTTP server and serve requests
//!
//! # Environment Variables
//! - `SECRET_KEY` (**required**) – token signing secret
//! - `FOG_NODE` (**required**) – secret for the `fog_node` identity
//! - `ADMIN` (**required**) – secret for the `admin` identity
//! - `CLOUD_PORT` (optional) – HTTP port (default: 5000)
//! - `LOG_LEVEL` / `SPAN_EVENTS` (optional) – tracing verbosity

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use chrono::Duration;
use dotenvy::dotenv;

use fogflow::auth::Authenticator;
use fogflow::{config, init_tracing, CloudState};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_cloud_from_env()?;
    cfg.log_config();

    let auth = Authenticator::new(
        &cfg.signing_secret,
        vec![
            ("fog_node".to_string(), cfg.fog_node_secret.clone()),
            ("admin".to_string(), cfg.admin_secret.clone()),
        ],
        Duration::hours(cfg.token_ttl_hours as i64),
    );
    let state = Arc::new(CloudState::new(
        auth,
        cfg.history_capacity as usize,
        cfg.trend_window_capacity as usize,
    ));

    // Build app from routes gateway (EMBP)
    let app: Router = fogflow::routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port as u16));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
