//! Conversion provider abstraction.
//!
//! A provider creates remote jobs, accepts staged uploads and reports job
//! state. The gateway only talks to the [`ConversionProvider`] trait, so the
//! HTTP clients below can be swapped for [`stub::StubProvider`] in tests.

pub mod cloudconvert;
pub mod convertio;
mod http;
#[cfg(any(test, feature = "stub"))]
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use strum::{AsRefStr, Display, EnumString};

use crate::error::ProviderError;
use crate::job::JobSnapshot;
use crate::staging::StagedFile;

pub use cloudconvert::CloudConvert;
pub use convertio::Convertio;

/// Which remote API the relay talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    #[default]
    CloudConvert,
    Convertio,
}

/// How the file reaches the provider when the job is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    /// Base64-encoded file content embedded in the creation request.
    Inline(String),
    /// The provider should expect a separate upload.
    Upload,
}

#[derive(Debug, Clone)]
pub struct JobRequest<'a> {
    pub filename: &'a str,
    pub output_format: &'a str,
    pub source: JobSource,
}

/// Provider-issued destination for a staged upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// `multipart/form-data` POST with the given fields, file part last.
    Form {
        url: String,
        parameters: Vec<(String, String)>,
    },
    /// Raw `PUT` of the file body.
    Put { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedJob {
    pub id: String,
    /// Present when the job was created with [`JobSource::Upload`].
    pub upload_target: Option<UploadTarget>,
}

#[async_trait]
pub trait ConversionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// `false` when no API credential is available.
    fn is_configured(&self) -> bool;

    async fn create_job(&self, request: JobRequest<'_>) -> Result<CreatedJob, ProviderError>;

    /// Stream a staged file to the target returned by [`create_job`].
    ///
    /// [`create_job`]: ConversionProvider::create_job
    async fn upload(&self, target: &UploadTarget, file: &StagedFile) -> Result<(), ProviderError>;

    async fn get_job(&self, id: &str) -> Result<JobSnapshot, ProviderError>;
}

/// Per-operation request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ProviderTimeouts {
    pub create: Duration,
    pub upload: Duration,
    pub status: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30),
            upload: Duration::from_secs(30 * 60),
            status: Duration::from_secs(15),
        }
    }
}

/// Everything needed to construct a provider client.
#[derive(Clone, Default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    /// Overrides the provider's public API endpoint (sandbox, mocks).
    pub base_url: Option<String>,
    pub timeouts: ProviderTimeouts,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Build the configured provider client.
pub fn build(settings: ProviderSettings) -> Result<Arc<dyn ConversionProvider>, ProviderError> {
    let client = http::client()?;
    let provider: Arc<dyn ConversionProvider> = match settings.kind {
        ProviderKind::CloudConvert => Arc::new(CloudConvert::new(client, settings)),
        ProviderKind::Convertio => Arc::new(Convertio::new(client, settings)),
    };
    Ok(provider)
}
