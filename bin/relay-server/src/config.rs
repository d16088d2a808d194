//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use relay_core::provider::{ProviderKind, ProviderSettings, ProviderTimeouts};
use relay_core::strategy::MIB;

const DEFAULT_PORT: u16 = 3002;
const DEFAULT_MAX_UPLOAD_MB: u64 = 400;
const DEFAULT_INLINE_THRESHOLD_MB: u64 = 200;

/// Runtime configuration for relay-server.
///
/// Every field has a default, so the server starts without any environment
/// variables set. It will refuse conversions until a provider key is given.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind. `0.0.0.0:3002` in production, loopback otherwise.
    pub bind_address: String,

    /// Provider selection, credential and timeouts. `Debug` redacts the key.
    pub provider: ProviderSettings,

    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,

    /// Uploads strictly larger than this are staged instead of sent inline.
    pub inline_threshold: u64,

    /// Directory for in-flight upload temp files.
    pub upload_dir: PathBuf,

    /// Directory holding the single-page client.
    pub static_dir: PathBuf,

    /// Comma-separated CORS origins; any origin when unset.
    pub cors_allowed_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let kind = parse_var(&var, "RELAY_PROVIDER", ProviderKind::default());
        let key_var = match kind {
            ProviderKind::CloudConvert => "CLOUDCONVERT_KEY",
            ProviderKind::Convertio => "CONVERTIO_KEY",
        };
        let api_key = var("RELAY_API_KEY").or_else(|| var(key_var));

        let bind_address = var("RELAY_BIND").unwrap_or_else(|| {
            let production = var("RELAY_ENV").is_some_and(|e| e.eq_ignore_ascii_case("production"));
            let host = if production { "0.0.0.0" } else { "127.0.0.1" };
            let port: u16 = parse_var(&var, "PORT", DEFAULT_PORT);
            format!("{host}:{port}")
        });

        let defaults = ProviderTimeouts::default();
        let timeouts = ProviderTimeouts {
            create: secs_var(&var, "RELAY_CREATE_TIMEOUT_SECS", defaults.create),
            upload: secs_var(&var, "RELAY_UPLOAD_TIMEOUT_SECS", defaults.upload),
            status: secs_var(&var, "RELAY_STATUS_TIMEOUT_SECS", defaults.status),
        };

        Self {
            bind_address,
            provider: ProviderSettings {
                kind,
                api_key,
                base_url: var("RELAY_PROVIDER_URL"),
                timeouts,
            },
            max_upload_bytes: parse_var(&var, "RELAY_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)
                .saturating_mul(MIB),
            inline_threshold: parse_var(&var, "RELAY_INLINE_THRESHOLD_MB", DEFAULT_INLINE_THRESHOLD_MB)
                .saturating_mul(MIB),
            upload_dir: var("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            static_dir: PathBuf::from(var("RELAY_STATIC_DIR").unwrap_or_else(|| "public".into())),
            cors_allowed_origins: var("RELAY_CORS_ORIGINS"),
            log_level: var("RELAY_LOG").unwrap_or_else(|| "info".into()),
            log_json: var("RELAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    var(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_var(var: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    var(key)
        .and_then(|v| v.trim().parse().ok())
        .filter(|secs: &u64| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.bind_address, "127.0.0.1:3002");
        assert_eq!(cfg.provider.kind, ProviderKind::CloudConvert);
        assert!(cfg.provider.api_key.is_none());
        assert_eq!(cfg.max_upload_bytes, 400 * MIB);
        assert_eq!(cfg.inline_threshold, 200 * MIB);
        assert_eq!(cfg.static_dir, PathBuf::from("public"));
        assert_eq!(cfg.provider.timeouts.status, Duration::from_secs(15));
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
    }

    #[test]
    fn production_binds_all_interfaces() {
        let cfg = config(&[("RELAY_ENV", "production"), ("PORT", "8080")]);
        assert_eq!(cfg.bind_address, "0.0.0.0:8080");

        let cfg = config(&[("RELAY_ENV", "production"), ("RELAY_BIND", "10.0.0.5:9000")]);
        assert_eq!(cfg.bind_address, "10.0.0.5:9000");
    }

    #[test]
    fn provider_key_follows_selected_provider() {
        let cfg = config(&[("CLOUDCONVERT_KEY", "cc"), ("CONVERTIO_KEY", "cv")]);
        assert_eq!(cfg.provider.api_key.as_deref(), Some("cc"));

        let cfg = config(&[
            ("RELAY_PROVIDER", "convertio"),
            ("CLOUDCONVERT_KEY", "cc"),
            ("CONVERTIO_KEY", "cv"),
        ]);
        assert_eq!(cfg.provider.kind, ProviderKind::Convertio);
        assert_eq!(cfg.provider.api_key.as_deref(), Some("cv"));

        let cfg = config(&[("RELAY_API_KEY", "override"), ("CLOUDCONVERT_KEY", "cc")]);
        assert_eq!(cfg.provider.api_key.as_deref(), Some("override"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = config(&[("CLOUDCONVERT_KEY", "   ")]);
        assert!(cfg.provider.api_key.is_none());
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let cfg = config(&[
            ("PORT", "not-a-port"),
            ("RELAY_MAX_UPLOAD_MB", "lots"),
            ("RELAY_STATUS_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(cfg.bind_address, "127.0.0.1:3002");
        assert_eq!(cfg.max_upload_bytes, 400 * MIB);
        assert_eq!(cfg.provider.timeouts.status, Duration::from_secs(15));
    }

    #[test]
    fn sizes_are_read_in_mebibytes() {
        let cfg = config(&[("RELAY_MAX_UPLOAD_MB", "10"), ("RELAY_INLINE_THRESHOLD_MB", "2")]);
        assert_eq!(cfg.max_upload_bytes, 10 * MIB);
        assert_eq!(cfg.inline_threshold, 2 * MIB);
    }

    #[test]
    fn debug_output_hides_key() {
        let cfg = config(&[("CLOUDCONVERT_KEY", "very-secret")]);
        assert!(!format!("{cfg:?}").contains("very-secret"));
    }
}
