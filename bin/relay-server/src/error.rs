//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{"error": message}` JSON response with an appropriate status code.
//!
//! **Security note:** provider transport failures and local I/O errors are
//! logged with full detail, but the client only sees a fixed message so that
//! file paths, upstream URLs and credentials never leak.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::strategy::MIB;
use relay_core::{ProviderError, StagingError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the relay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or incomplete request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The server is missing configuration it needs (provider key).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The provider refused the job (unsupported format, quota, ...).
    #[error("provider rejected request ({status}): {message}")]
    ProviderRejected { status: StatusCode, message: String },

    /// The provider could not be reached or answered with garbage.
    #[error("{message}: {source}")]
    ProviderUnavailable {
        message: &'static str,
        #[source]
        source: ProviderError,
    },

    /// The remote conversion job ended in its error state.
    #[error("conversion failed: {0}")]
    JobFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Classify a provider failure. `fallback` is the client-facing message
    /// used when the cause is not the caller's business.
    pub fn from_provider(err: ProviderError, fallback: &'static str) -> Self {
        match err {
            ProviderError::NotConfigured => ServerError::Config("API key missing".into()),
            ProviderError::JobFailed { message } => ServerError::JobFailed(message),
            ProviderError::Upstream { status, message } => match status {
                400 | 415 | 422 => ServerError::ProviderRejected {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    message,
                },
                402 => ServerError::ProviderRejected {
                    status: StatusCode::PAYMENT_REQUIRED,
                    message,
                },
                401 | 403 => {
                    warn!(status, %message, "provider rejected the configured credential");
                    ServerError::Config("Provider credential rejected".into())
                }
                404 => ServerError::NotFound("Job not found".into()),
                _ => ServerError::ProviderUnavailable {
                    message: fallback,
                    source: ProviderError::Upstream { status, message },
                },
            },
            source @ (ProviderError::Http(_)
            | ProviderError::Malformed { .. }
            | ProviderError::Io(_)) => ServerError::ProviderUnavailable {
                message: fallback,
                source,
            },
        }
    }
}

impl From<StagingError> for ServerError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::TooLarge { limit } => ServerError::PayloadTooLarge(format!(
                "File too large: maximum upload size is {} MB",
                limit / MIB
            )),
            StagingError::Io(e) => ServerError::Internal(format!("failed to stage upload: {e}")),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m),
            ServerError::ProviderRejected { status, message } => (status, message),
            ServerError::JobFailed(m) => (StatusCode::BAD_REQUEST, m),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ServerError::Config(m) => {
                warn!(message = %m, "request refused: server not configured");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }

            // Internal errors: log the full detail, return a fixed message.
            ServerError::ProviderUnavailable { message, source } => {
                error!(error = %source, "provider call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;

    async fn render(err: ServerError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn upstream(status: u16, message: &str) -> ProviderError {
        ProviderError::Upstream {
            status,
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn invalid_format_maps_to_unprocessable() {
        let err = ServerError::from_provider(upstream(422, "Invalid output format"), "Conversion failed");
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Invalid output format");
    }

    #[tokio::test]
    async fn quota_maps_to_payment_required() {
        let err = ServerError::from_provider(upstream(402, "Credits exhausted"), "Conversion failed");
        assert_eq!(render(err).await.0, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn rejected_credential_is_a_config_error() {
        let err = ServerError::from_provider(upstream(401, "Unauthenticated"), "Conversion failed");
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Provider credential rejected");
    }

    #[tokio::test]
    async fn transport_failure_hides_detail() {
        let err = ServerError::from_provider(upstream(503, "upstream at 10.1.2.3 down"), "Status check failed");
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Status check failed");

        let err = ServerError::from_provider(
            ProviderError::Malformed { message: "missing data".into() },
            "Conversion failed",
        );
        assert_eq!(render(err).await.1["error"], "Conversion failed");
    }

    #[tokio::test]
    async fn failed_job_is_a_bad_request() {
        let err = ServerError::from_provider(
            ProviderError::JobFailed { message: "Unsupported codec".into() },
            "Status check failed",
        );
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported codec");
    }

    #[tokio::test]
    async fn staging_errors_map_to_413_and_500() {
        let (status, _) = render(StagingError::TooLarge { limit: 400 * MIB }.into()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/var/tmp/secret");
        let (status, body) = render(StagingError::Io(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }
}
