use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, routes, AppState};
use roster_core::{CoreConfig, Store};
use std::sync::Arc;

/// Main entry point for the roster host application
///
/// Mounts the patient plugin under its configured prefix and applies its URL overrides at the
/// site root, so `/patients/` is served by the plugin's main list.
///
/// # Environment Variables
/// - `ROSTER_DATABASE`: SQLite database path (default: "roster.db"); created if missing
/// - `ROSTER_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `ROSTER_PLUGIN_PREFIX`: Plugin mount prefix (default: "/plugins/patient_plugin")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, database setup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roster_run=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("ROSTER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("ROSTER_DATABASE").ok(),
        std::env::var("ROSTER_PLUGIN_PREFIX").ok(),
    )?);
    let store = Store::create(cfg.database_path())?;

    tracing::info!("++ Starting roster REST on {}", rest_addr);
    if let Some(list) = routes::reverse("patient_plugin:patient_list", cfg.plugin_prefix()) {
        tracing::info!("++ Patient list mounted at {}", list);
    }

    let app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
