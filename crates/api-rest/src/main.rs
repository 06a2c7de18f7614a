//! Standalone REST API server binary.
//!
//! ## Purpose
//! Serves the patient plugin on its own, mounted at the site root.
//!
//! ## Intended use
//! Useful for development and debugging of the plugin without a host application. The
//! workspace's main `roster-run` binary mounts the plugin under its configured prefix instead.

use api_rest::{router, AppState};
use roster_core::{CoreConfig, Store};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone REST server.
///
/// # Environment Variables
/// - `ROSTER_DATABASE`: SQLite database path (default: "roster.db")
/// - `ROSTER_REST_ADDR`: Server address (default: "0.0.0.0:3000")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the database cannot be opened or lacks the roster tables,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("roster_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("ROSTER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    // Standalone mode serves the plugin at the root.
    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("ROSTER_DATABASE").ok(),
        Some("/".into()),
    )?);
    let store = Store::open(cfg.database_path())?;

    tracing::info!("-- Starting roster REST API on {}", addr);

    let app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
