//! Conversion routes: start a job from an upload, then poll its status.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::NormalizedStatus;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::conversion::{ErrorResponse, StartConversionForm, StartConversionResponse};
use crate::state::AppState;
use crate::upload;

/// Allowance for multipart boundaries and the format field on top of the
/// file itself.
const MULTIPART_SLACK: u64 = 1024 * 1024;
const MAX_JOB_ID_LEN: usize = 128;

#[derive(OpenApi)]
#[openapi(paths(start_conversion, conversion_status))]
pub struct ConversionApi;

/// Register conversion routes.
pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let body_limit = state.staging.max_bytes().saturating_add(MULTIPART_SLACK);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/api/start-conversion",
            post(start_conversion).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/conversion-status/{id}", get(conversion_status))
}

/// Start a conversion (`POST /api/start-conversion`).
///
/// Stages the uploaded file, creates a provider job (inline for small files,
/// staged upload for large ones) and returns the job id. The staged file is
/// removed before the response is sent, whatever the outcome.
#[utoipa::path(
    post,
    path = "/api/start-conversion",
    tag = "conversion",
    request_body(content = StartConversionForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Job created", body = StartConversionResponse),
        (status = 400, description = "Missing file or output format", body = ErrorResponse),
        (status = 402, description = "Provider quota exhausted", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 422, description = "Provider rejected the file or format", body = ErrorResponse),
        (status = 500, description = "Missing credential or provider failure", body = ErrorResponse),
    )
)]
pub async fn start_conversion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StartConversionResponse>, ServerError> {
    reject_oversized(&headers, state.staging.max_bytes())?;

    let Ok(mut multipart) = multipart else {
        return Err(ServerError::BadRequest("No file".into()));
    };
    let form = upload::read_form(&mut multipart, &state.staging).await?;

    let file = form
        .file
        .ok_or_else(|| ServerError::BadRequest("No file".into()))?;
    if !state.gateway.is_configured() {
        return Err(ServerError::Config("API key missing".into()));
    }
    let output_format = form
        .output_format
        .ok_or_else(|| ServerError::BadRequest("No output format".into()))?;

    let result = state.gateway.start_conversion(&file, &output_format).await;
    file.discard();

    let started = result.map_err(|e| ServerError::from_provider(e, "Conversion failed"))?;
    info!(job_id = %started.id, strategy = %started.strategy, "conversion accepted");
    Ok(Json(StartConversionResponse { id: started.id }))
}

/// Poll a conversion (`GET /api/conversion-status/{id}`).
///
/// Every call fetches the job from the provider; nothing is cached.
#[utoipa::path(
    get,
    path = "/api/conversion-status/{id}",
    tag = "conversion",
    params(("id" = String, Path, description = "Job id returned by start-conversion")),
    responses(
        (status = 200, description = "Current job state", body = NormalizedStatus),
        (status = 400, description = "Invalid id or the job failed", body = ErrorResponse),
        (status = 402, description = "Provider quota exhausted", body = ErrorResponse),
        (status = 404, description = "Job unknown to the provider", body = ErrorResponse),
        (status = 422, description = "Provider rejected the status request", body = ErrorResponse),
        (status = 500, description = "Missing credential or provider unreachable", body = ErrorResponse),
    )
)]
pub async fn conversion_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NormalizedStatus>, ServerError> {
    if !is_valid_job_id(&id) {
        return Err(ServerError::BadRequest("Invalid job id".into()));
    }
    if !state.gateway.is_configured() {
        return Err(ServerError::Config("API key missing".into()));
    }

    let status = state
        .gateway
        .conversion_status(&id)
        .await
        .map_err(|e| ServerError::from_provider(e, "Status check failed"))?;
    debug!(job_id = %id, step = ?status.step, "status polled");
    Ok(Json(status))
}

// ── private helpers ──────────────────────────────────────────────────────────

/// Refuse bodies whose declared length already exceeds the ceiling, before
/// reading any of it.
fn reject_oversized(headers: &HeaderMap, max_bytes: u64) -> Result<(), ServerError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(len) if len > max_bytes.saturating_add(MULTIPART_SLACK) => {
            debug!(content_length = len, max_bytes, "rejecting oversized upload");
            Err(ServerError::PayloadTooLarge("File too large".into()))
        }
        _ => Ok(()),
    }
}

fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_JOB_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
