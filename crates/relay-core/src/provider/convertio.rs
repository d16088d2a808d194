//! Convertio client.
//!
//! Convertio reports a single `step` per conversion instead of a task list.
//! The step is expanded into synthetic import/convert/export tasks so the
//! shared normalizer handles both providers the same way.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::job::{JobSnapshot, JobStatus, ResultFile, TaskOperation, TaskSnapshot};
use crate::provider::{
    http, ConversionProvider, CreatedJob, JobRequest, JobSource, ProviderKind, ProviderSettings,
    ProviderTimeouts, UploadTarget,
};
use crate::staging::StagedFile;

pub const DEFAULT_BASE_URL: &str = "https://api.convertio.co";

pub struct Convertio {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeouts: ProviderTimeouts,
}

impl Convertio {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self {
            client,
            api_key: settings.api_key.filter(|k| !k.trim().is_empty()),
            base_url: settings
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            timeouts: settings.timeouts,
        }
    }
}

#[async_trait]
impl ConversionProvider for Convertio {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Convertio
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn create_job(&self, request: JobRequest<'_>) -> Result<CreatedJob, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::NotConfigured)?;
        let url = http::endpoint(&self.base_url, &["convert"])?;

        let response = self
            .client
            .post(url)
            .json(&conversion_payload(key, &request))
            .timeout(self.timeouts.create)
            .send()
            .await?;
        let envelope: Envelope<Created> = http::read_json(response).await?;
        let id = envelope.into_data()?.id;

        let upload_target = match request.source {
            JobSource::Inline(_) => None,
            JobSource::Upload => Some(UploadTarget::Put {
                url: http::endpoint(&self.base_url, &["convert", &id, request.filename])?
                    .to_string(),
            }),
        };
        info!(job_id = %id, staged = upload_target.is_some(), "convertio conversion created");

        Ok(CreatedJob { id, upload_target })
    }

    async fn upload(&self, target: &UploadTarget, file: &StagedFile) -> Result<(), ProviderError> {
        http::send_file(&self.client, target, file, self.timeouts.upload).await
    }

    async fn get_job(&self, id: &str) -> Result<JobSnapshot, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured);
        }
        let url = http::endpoint(&self.base_url, &["convert", id, "status"])?;

        let response = self
            .client
            .get(url)
            .timeout(self.timeouts.status)
            .send()
            .await?;

        // Failed conversions may also be reported with a 4xx status and an
        // error envelope. Credential and lookup failures keep their status.
        let status = response.status();
        if status.is_client_error() && !matches!(status.as_u16(), 401 | 403 | 404) {
            let body = response.bytes().await?;
            if let Ok(envelope) = serde_json::from_slice::<Envelope<IgnoredAny>>(&body) {
                if envelope.is_error() {
                    return Ok(failed_job(id, envelope.error));
                }
            }
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message: http::error_message(&body, status.canonical_reason()),
            });
        }

        let envelope: Envelope<Progress> = http::read_json(response).await?;
        if envelope.is_error() {
            return Ok(failed_job(id, envelope.error));
        }

        let progress = envelope.into_data()?;
        debug!(job_id = %id, step = %progress.step, "convertio status fetched");
        Ok(progress.into_snapshot(id))
    }
}

fn failed_job(id: &str, error: Option<String>) -> JobSnapshot {
    let message = error.filter(|m| !m.trim().is_empty());
    debug!(job_id = %id, message = ?message, "convertio conversion failed");
    let mut job = JobSnapshot::new(id, JobStatus::Error);
    job.message = message;
    job
}

/// Body of `POST /convert`. Borrows the encoded file so it is copied only
/// once, into the serialized request.
#[derive(Debug, Serialize)]
struct ConversionPayload<'a> {
    apikey: &'a str,
    input: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
    outputformat: &'a str,
}

fn conversion_payload<'a>(api_key: &'a str, request: &'a JobRequest<'_>) -> ConversionPayload<'a> {
    let (input, file, filename) = match &request.source {
        JobSource::Inline(encoded) => ("base64", Some(encoded.as_str()), Some(request.filename)),
        JobSource::Upload => ("upload", None, None),
    };
    ConversionPayload {
        apikey: api_key,
        input,
        file,
        filename,
        outputformat: request.output_format,
    }
}

// ── wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    fn into_data(self) -> Result<T, ProviderError> {
        if self.is_error() {
            // Body-level rejections arrive with HTTP 200.
            return Err(ProviderError::Upstream {
                status: 422,
                message: self.error.unwrap_or_else(|| "conversion rejected".into()),
            });
        }
        self.data
            .ok_or_else(|| ProviderError::malformed("convertio response has no data"))
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Progress {
    step: String,
    #[serde(default)]
    output: Option<Output>,
}

#[derive(Debug, Deserialize)]
struct Output {
    url: String,
    /// Reported as either a number or a numeric string.
    #[serde(default)]
    size: Option<Value>,
}

impl Progress {
    fn into_snapshot(self, id: &str) -> JobSnapshot {
        use JobStatus::{Finished, Processing, Waiting};

        let import = |status| TaskSnapshot::new(TaskOperation::Import, status);
        let convert = |status| TaskSnapshot::new(TaskOperation::Convert, status);

        match self.step.as_str() {
            "upload" => JobSnapshot::new(id, Processing)
                .with_task(import(Processing))
                .with_task(convert(Waiting)),
            "convert" => JobSnapshot::new(id, Processing)
                .with_task(import(Finished))
                .with_task(convert(Processing)),
            "finish" => {
                let mut export = TaskSnapshot::new(TaskOperation::Export, Finished);
                if let Some(output) = self.output {
                    export.files.push(ResultFile {
                        url: output.url,
                        size: output.size.as_ref().and_then(parse_size),
                        filename: None,
                    });
                }
                JobSnapshot::new(id, Finished)
                    .with_task(import(Finished))
                    .with_task(convert(Finished))
                    .with_task(export)
            }
            "failed" | "error" => JobSnapshot::new(id, JobStatus::Error),
            _ => JobSnapshot::new(id, Waiting),
        }
    }
}

fn parse_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
