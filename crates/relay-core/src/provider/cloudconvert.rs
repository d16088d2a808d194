//! CloudConvert v2 client.
//!
//! A conversion is a single job of three named tasks:
//! `import-file` (base64 or upload) → `convert-file` → `export-file`
//! (`export/url`, which yields a temporary download link).

use async_trait::async_trait;
use reqwest::Client;
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

pub const DEFAULT_BASE_URL: &str = "https://api.cloudconvert.com";
const API_VERSION: &str = "v2";

const JPEG_QUALITY: u8 = 90;

pub struct CloudConvert {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeouts: ProviderTimeouts,
}

impl CloudConvert {
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

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl ConversionProvider for CloudConvert {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudConvert
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn create_job(&self, request: JobRequest<'_>) -> Result<CreatedJob, ProviderError> {
        let key = self.api_key()?;
        let url = http::endpoint(&self.base_url, &[API_VERSION, "jobs"])?;
        let staged = matches!(request.source, JobSource::Upload);

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&job_payload(&request))
            .timeout(self.timeouts.create)
            .send()
            .await?;
        let envelope: Envelope = http::read_json(response).await?;
        let job = envelope.data;
        info!(job_id = %job.id, staged, "cloudconvert job created");

        let upload_target = if staged {
            Some(upload_form(&job)?)
        } else {
            None
        };
        Ok(CreatedJob {
            id: job.id,
            upload_target,
        })
    }

    async fn upload(&self, target: &UploadTarget, file: &StagedFile) -> Result<(), ProviderError> {
        http::send_file(&self.client, target, file, self.timeouts.upload).await
    }

    async fn get_job(&self, id: &str) -> Result<JobSnapshot, ProviderError> {
        let key = self.api_key()?;
        let url = http::endpoint(&self.base_url, &[API_VERSION, "jobs", id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(key)
            .timeout(self.timeouts.status)
            .send()
            .await?;
        let envelope: Envelope = http::read_json(response).await?;
        debug!(job_id = %id, status = %envelope.data.status, "cloudconvert job fetched");
        Ok(envelope.data.into_snapshot())
    }
}

/// Body for `POST /v2/jobs`. Borrows the request, so the encoded file is
/// copied only once, into the serialized body.
#[derive(Debug, Serialize)]
struct JobPayload<'a> {
    tasks: JobTasks<'a>,
}

#[derive(Debug, Serialize)]
struct JobTasks<'a> {
    #[serde(rename = "import-file")]
    import: ImportTask<'a>,
    #[serde(rename = "convert-file")]
    convert: ConvertTask<'a>,
    #[serde(rename = "export-file")]
    export: ExportTask,
}

#[derive(Debug, Serialize)]
#[serde(tag = "operation")]
enum ImportTask<'a> {
    #[serde(rename = "import/base64")]
    Base64 { file: &'a str, filename: &'a str },
    #[serde(rename = "import/upload")]
    Upload,
}

#[derive(Debug, Serialize)]
struct ConvertTask<'a> {
    operation: &'static str,
    input: &'static str,
    output_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<u8>,
}

#[derive(Debug, Serialize)]
struct ExportTask {
    operation: &'static str,
    input: &'static str,
}

fn job_payload<'a>(request: &'a JobRequest<'_>) -> JobPayload<'a> {
    let import = match &request.source {
        JobSource::Inline(encoded) => ImportTask::Base64 {
            file: encoded.as_str(),
            filename: request.filename,
        },
        JobSource::Upload => ImportTask::Upload,
    };
    let jpeg = matches!(request.output_format.to_ascii_lowercase().as_str(), "jpg" | "jpeg");

    JobPayload {
        tasks: JobTasks {
            import,
            convert: ConvertTask {
                operation: "convert",
                input: "import-file",
                output_format: request.output_format,
                quality: jpeg.then_some(JPEG_QUALITY),
            },
            export: ExportTask {
                operation: "export/url",
                input: "convert-file",
            },
        },
    }
}

fn upload_form(job: &WireJob) -> Result<UploadTarget, ProviderError> {
    let form = job
        .tasks
        .iter()
        .filter(|t| t.operation == "import/upload")
        .find_map(|t| t.result.as_ref().and_then(|r| r.form.as_ref()))
        .ok_or_else(|| {
            ProviderError::malformed(format!("job {} has no upload form", job.id))
        })?;

    let parameters = form
        .parameters
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect();

    Ok(UploadTarget::Form {
        url: form.url.clone(),
        parameters,
    })
}

// ── wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    data: WireJob,
}

#[derive(Debug, Deserialize)]
struct WireJob {
    id: String,
    status: String,
    #[serde(default)]
    tasks: Vec<WireTask>,
}

#[derive(Debug, Deserialize)]
struct WireTask {
    #[serde(default)]
    name: Option<String>,
    operation: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    files: Vec<WireFile>,
    #[serde(default)]
    form: Option<WireForm>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireForm {
    url: String,
    #[serde(default)]
    parameters: serde_json::Map<String, Value>,
}

impl WireJob {
    fn into_snapshot(self) -> JobSnapshot {
        let tasks = self
            .tasks
            .into_iter()
            .map(|task| {
                let files = task
                    .result
                    .map(|r| r.files)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|f| {
                        Some(ResultFile {
                            url: f.url?,
                            size: f.size,
                            filename: f.filename,
                        })
                    })
                    .collect();
                TaskSnapshot {
                    name: task.name,
                    operation: TaskOperation::from_wire(&task.operation),
                    status: task
                        .status
                        .as_deref()
                        .map(JobStatus::from_wire)
                        .unwrap_or(JobStatus::Waiting),
                    message: task.message,
                    files,
                }
            })
            .collect();

        JobSnapshot {
            id: self.id,
            status: JobStatus::from_wire(&self.status),
            tasks,
            message: None,
        }
    }
}
