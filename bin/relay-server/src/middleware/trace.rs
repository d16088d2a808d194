use axum::body::{Body, Bytes, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument, Level};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies up to this size are logged when they are JSON.
const MAX_LOGGED_BODY: u64 = 1024;

pub async fn trace_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();

    // Propagate the caller's trace id when it is a valid UUID.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let (mut parts, body) = req.into_parts();
        let body = log_body("request", &parts.headers, body).await;
        if let Some(value) = &header_value {
            parts.headers.insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(Request::from_parts(parts, body)).await;

        let (mut parts, body) = response.into_parts();
        let body = log_body("response", &parts.headers, body).await;
        if let Some(value) = header_value {
            parts.headers.insert(X_TRACE_ID, value);
        }
        let response = Response::from_parts(parts, body);

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Log a body at debug level if it is small JSON, otherwise pass it through
/// untouched.
///
/// Uploads and static files are never buffered, and nothing is buffered while
/// debug logging is off.
async fn log_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    if !tracing::enabled!(Level::DEBUG) {
        return body;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let size = body.size_hint().exact().or_else(|| content_length(headers));

    let small_json = content_type.contains("application/json")
        && size.is_some_and(|n| n <= MAX_LOGGED_BODY);
    if !small_json {
        if size != Some(0) {
            debug!(
                direction,
                content_type,
                size = ?size,
                "body not logged"
            );
        }
        return body;
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!(direction, body = %text, "body");
    }
    Body::from(bytes)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
