//! Helpers shared by the router tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, Response};
use http_body_util::BodyExt;
use relay_core::{ConversionProvider, Gateway, StagingArea, UploadPolicy};
use serde_json::Value;

use crate::config::Config;
use crate::state::AppState;

pub const BOUNDARY: &str = "relay-test-boundary";

/// State backed by `provider`, staging into `dir`.
pub fn state_with(
    provider: Arc<dyn ConversionProvider>,
    dir: &Path,
    max_upload_bytes: u64,
    inline_threshold: u64,
) -> Arc<AppState> {
    let mut config = Config::from_lookup(|_| None);
    config.max_upload_bytes = max_upload_bytes;
    config.inline_threshold = inline_threshold;
    config.upload_dir = dir.join("uploads");
    config.static_dir = dir.join("public");

    Arc::new(AppState {
        gateway: Gateway::new(provider, UploadPolicy::new(inline_threshold)),
        staging: StagingArea::new(&config.upload_dir, max_upload_bytes),
        config: Arc::new(config),
        started_at: Instant::now(),
    })
}

/// One multipart part: `(name, filename, content)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Number of entries in a directory; zero when it does not exist.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
