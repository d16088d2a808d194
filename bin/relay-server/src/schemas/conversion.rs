use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart body of `POST /api/start-conversion` (documentation only; the
/// handler streams the form itself).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct StartConversionForm {
    /// The file to convert.
    #[schema(format = Binary)]
    pub file: String,
    /// Target format token, e.g. `jpg` or `mp3`. `output_format` is accepted too.
    pub outputformat: String,
}

/// Response of `POST /api/start-conversion`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartConversionResponse {
    /// Provider job id to poll.
    pub id: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
