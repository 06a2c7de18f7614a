//! # API REST
//!
//! REST surface of the patient plugin.
//!
//! Handles:
//! - HTTP endpoints with axum (list, compact list, stats, health)
//! - The named route table, URL overrides and reverse lookup (`routes`)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (header parsing, attachments, CORS)
//!
//! Uses `roster-core` for the views and `api-shared` for wire types.

#![warn(rust_2018_idioms)]

pub mod handlers;
pub mod routes;

use api_shared::dto;
use axum::{routing::get, routing::MethodRouter, Router};
use roster_core::{CoreConfig, Store};
use routes::RouteView;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub store: Store,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, store: Store) -> Self {
        Self { cfg, store }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::patient_list,
        handlers::compact_patient_list,
        handlers::patient_stats,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ColumnHeader,
        dto::PatientRow,
        dto::PageInfo,
        dto::FilterState,
        dto::PatientListRes,
        dto::PatientStats,
        dto::PatientStatsRes,
    ))
)]
pub struct ApiDoc;

fn view_route(view: RouteView) -> MethodRouter<AppState> {
    match view {
        RouteView::PatientList => get(handlers::patient_list),
        RouteView::CompactPatientList => get(handlers::compact_patient_list),
        RouteView::PatientStats => get(handlers::patient_stats),
    }
}

/// Builds the full application router.
///
/// Plugin routes are mounted under the configured plugin prefix and the URL overrides at the
/// site root. `/health` and the Swagger UI are always served.
pub fn router(state: AppState) -> Router {
    let prefix = state.cfg.plugin_prefix().to_string();
    let mut app = Router::new().route("/health", get(handlers::health));

    for mounted in routes::mounted_routes(&prefix) {
        tracing::debug!(path = %mounted.path, view = ?mounted.view, "mounting route");
        app = app.route(&mounted.path, view_route(mounted.view));
    }

    app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
