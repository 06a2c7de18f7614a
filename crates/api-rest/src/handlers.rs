//! HTTP handlers for the patient plugin.
//!
//! Each handler resolves the request user from the `x-api-key` header and runs the matching core
//! view on the blocking pool. Permission denials become `403`; internal failures are logged and
//! become `500 Internal error`.

use crate::AppState;
use api_shared::auth::{normalise_api_key, API_KEY_HEADER, PERMISSION_DENIED_BODY};
use api_shared::dto;
use api_shared::HealthService;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use roster_core::{
    user_by_api_key, Access, Connection, ExportFile, ListRequest, ListResponse, RosterResult, User,
};

type HandlerError = (StatusCode, &'static str);

const INTERNAL: HandlerError = (StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
const FORBIDDEN: HandlerError = (StatusCode::FORBIDDEN, "Forbidden");

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = dto::HealthRes)
    )
)]
/// Health check endpoint.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<dto::HealthRes> {
    Json(HealthService::check_health("Roster REST API"))
}

#[utoipa::path(
    get,
    path = "/patients/",
    params(
        ("x-api-key" = Option<String>, Header, description = "API key of the requesting user"),
        ("name" = Option<String>, Query, description = "First or last name contains"),
        ("sort" = Option<String>, Query, description = "Column name, `-` prefix for descending"),
        ("page" = Option<String>, Query, description = "1-based page number"),
        ("per_page" = Option<String>, Query, description = "One of 5, 10, 20, 50, 100, 200"),
        ("_export" = Option<String>, Query, description = "csv, xlsx or json"),
    ),
    responses(
        (status = 200, description = "Page of patients, or an export attachment", body = dto::PatientListRes),
        (status = 403, description = "Missing permission"),
        (status = 500, description = "Internal server error")
    )
)]
/// Main patient list with filtering, sorting, pagination and export.
#[axum::debug_handler]
pub async fn patient_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<ListRequest>,
) -> Result<Response, HandlerError> {
    let api_key = request_api_key(&headers);
    let outcome = run_view(&state, move |conn| {
        let user = resolve_user(conn, api_key.as_deref())?;
        roster_core::patient_list(conn, user.as_ref(), &request)
    })
    .await?;

    match outcome {
        Access::Granted(ListResponse::Page(page)) => Ok(Json(page).into_response()),
        Access::Granted(ListResponse::Export(file)) => Ok(attachment(file)),
        Access::Denied => Err(FORBIDDEN),
    }
}

#[utoipa::path(
    get,
    path = "/patients/compact/",
    params(
        ("x-api-key" = Option<String>, Header, description = "API key of the requesting user"),
        ("name" = Option<String>, Query, description = "First or last name contains"),
        ("is_active" = Option<String>, Query, description = "true or false"),
        ("page" = Option<String>, Query, description = "1-based page number"),
    ),
    responses(
        (status = 200, description = "Compact page of patients", body = dto::PatientListRes),
        (status = 403, description = "Missing permission"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn compact_patient_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(request): Query<ListRequest>,
) -> Result<Json<dto::PatientListRes>, HandlerError> {
    let api_key = request_api_key(&headers);
    let outcome = run_view(&state, move |conn| {
        let user = resolve_user(conn, api_key.as_deref())?;
        roster_core::compact_patient_list(conn, user.as_ref(), &request)
    })
    .await?;

    match outcome {
        Access::Granted(page) => Ok(Json(page)),
        Access::Denied => Err(FORBIDDEN),
    }
}

#[utoipa::path(
    get,
    path = "/patients/stats/",
    params(
        ("x-api-key" = Option<String>, Header, description = "API key of the requesting user"),
    ),
    responses(
        (status = 200, description = "Organisation patient counts", body = dto::PatientStatsRes),
        (status = 403, description = "Permission denied"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn patient_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<dto::PatientStatsRes>, HandlerError> {
    let api_key = request_api_key(&headers);
    let outcome = run_view(&state, move |conn| {
        let user = resolve_user(conn, api_key.as_deref())?;
        roster_core::patient_stats(conn, user.as_ref())
    })
    .await?;

    match outcome {
        Access::Granted(res) => Ok(Json(res)),
        Access::Denied => Err((StatusCode::FORBIDDEN, PERMISSION_DENIED_BODY)),
    }
}

fn request_api_key(headers: &HeaderMap) -> Option<String> {
    normalise_api_key(headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

fn resolve_user(conn: &Connection, api_key: Option<&str>) -> RosterResult<Option<User>> {
    match api_key {
        Some(key) => user_by_api_key(conn, key),
        None => Ok(None),
    }
}

/// Runs `f` against the store on the blocking pool.
async fn run_view<T, F>(state: &AppState, f: F) -> Result<T, HandlerError>
where
    F: FnOnce(&Connection) -> RosterResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.with_conn(f)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!("Roster view error: {:?}", e);
            Err(INTERNAL)
        }
        Err(e) => {
            tracing::error!("Blocking task failed: {:?}", e);
            Err(INTERNAL)
        }
    }
}

fn attachment(file: ExportFile) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}
