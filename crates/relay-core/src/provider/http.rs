//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, Url};
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::UploadTarget;
use crate::staging::StagedFile;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_TEXT: usize = 200;

pub(crate) fn client() -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .user_agent(concat!("convert-relay/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?)
}

/// Join path segments onto a base URL, percent-encoding each one so that
/// client-supplied ids and filenames cannot alter the path.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base)
        .map_err(|e| ProviderError::malformed(format!("invalid provider URL {base:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::malformed(format!("provider URL {base:?} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Decode a JSON body, turning non-success statuses into
/// [`ProviderError::Upstream`].
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(ProviderError::Upstream {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        });
    }
    serde_json::from_slice(&body).map_err(|e| ProviderError::malformed(e.to_string()))
}

/// Check the status of a response whose body we do not need.
pub(crate) async fn ensure_success(response: Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(ProviderError::Upstream {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason()),
    })
}

/// Pull a human-readable message out of a provider error body.
///
/// CloudConvert uses `{"message": ...}`, Convertio `{"error": ...}`.
pub(crate) fn error_message(body: &[u8], reason: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.trim().to_owned();
                }
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && !text.starts_with('<') {
        return text.chars().take(MAX_ERROR_TEXT).collect();
    }
    reason.unwrap_or("unexpected provider response").to_owned()
}

/// Stream a staged file from disk to an upload target without buffering it.
pub(crate) async fn send_file(
    client: &Client,
    target: &UploadTarget,
    file: &StagedFile,
    timeout: Duration,
) -> Result<(), ProviderError> {
    let handle = tokio::fs::File::open(file.path()).await?;
    let body = Body::wrap_stream(ReaderStream::new(handle));

    let request = match target {
        UploadTarget::Form { url, parameters } => {
            let mut form = Form::new();
            for (name, value) in parameters {
                form = form.text(name.clone(), value.clone());
            }
            let part = Part::stream_with_length(body, file.size())
                .file_name(file.filename().to_owned());
            client.post(url).multipart(form.part("file", part))
        }
        UploadTarget::Put { url } => client
            .put(url)
            .header(CONTENT_LENGTH, file.size())
            .body(body),
    };

    debug!(size = file.size(), "streaming staged upload to provider");
    let response = request.timeout(timeout).send().await?;
    ensure_success(response).await
}
