//! relay-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON when `RELAY_LOG_JSON` is set).
//! 3. Build the provider client and the conversion gateway.
//! 4. Prepare the upload staging directory.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_support;
mod upload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use relay_core::{Gateway, StagingArea, UploadPolicy};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: RELAY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "relay-server starting");

    // ── 3. Provider + gateway ──────────────────────────────────────────────────
    let provider = relay_core::provider::build(cfg.provider.clone())?;
    if provider.is_configured() {
        info!(provider = %provider.kind(), "conversion provider ready");
    } else {
        warn!(
            provider = %provider.kind(),
            "no provider API key configured; conversions will be refused"
        );
    }
    let gateway = Gateway::new(provider, UploadPolicy::new(cfg.inline_threshold));

    // ── 4. Upload staging ──────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cfg.upload_dir).await?;
    let staging = StagingArea::new(&cfg.upload_dir, cfg.max_upload_bytes);
    info!(
        upload_dir = %cfg.upload_dir.display(),
        max_upload_bytes = cfg.max_upload_bytes,
        inline_threshold = cfg.inline_threshold,
        "upload staging ready"
    );
    if !cfg.static_dir.join("index.html").is_file() {
        warn!(static_dir = %cfg.static_dir.display(), "static client not found");
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState {
        config: Arc::new(cfg),
        gateway,
        staging,
        started_at: Instant::now(),
    });

    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
