//! In-memory provider for tests.
//!
//! Records every call so tests can assert on how many remote requests a
//! relay operation made and what they carried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::job::{JobSnapshot, JobStatus, ResultFile, TaskOperation, TaskSnapshot};
use crate::provider::{
    ConversionProvider, CreatedJob, JobRequest, JobSource, ProviderKind, UploadTarget,
};
use crate::staging::StagedFile;

/// What the stub saw in a `create_job` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedJob {
    pub filename: String,
    pub output_format: String,
    /// Length of the base64 payload for inline jobs; `None` for staged jobs.
    pub inline_len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub target: UploadTarget,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct StubProvider {
    job_id: String,
    configured: bool,
    create_failure: Option<(u16, String)>,
    status_failure: Option<(u16, String)>,
    transport_failure: bool,
    job: Option<JobSnapshot>,
    create_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    status_calls: AtomicUsize,
    jobs: Mutex<Vec<RecordedJob>>,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl StubProvider {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            configured: true,
            create_failure: None,
            status_failure: None,
            transport_failure: false,
            job: None,
            create_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// A provider with no API credential.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new("unconfigured")
        }
    }

    pub fn fail_create_with(mut self, status: u16, message: impl Into<String>) -> Self {
        self.create_failure = Some((status, message.into()));
        self
    }

    pub fn fail_status_with(mut self, status: u16, message: impl Into<String>) -> Self {
        self.status_failure = Some((status, message.into()));
        self
    }

    /// Fail status lookups as if the provider were unreachable.
    pub fn unreachable(mut self) -> Self {
        self.transport_failure = true;
        self
    }

    /// Snapshot returned by `get_job`. Defaults to a waiting job.
    pub fn with_job(mut self, job: JobSnapshot) -> Self {
        self.job = Some(job);
        self
    }

    /// Convenience snapshot for a finished job with one exported file.
    pub fn finished_job(id: &str, url: &str, size: Option<u64>) -> JobSnapshot {
        let mut export = TaskSnapshot::new(TaskOperation::Export, JobStatus::Finished);
        export.files.push(ResultFile {
            url: url.to_owned(),
            size,
            filename: None,
        });
        JobSnapshot::new(id, JobStatus::Finished)
            .with_task(TaskSnapshot::new(TaskOperation::Import, JobStatus::Finished))
            .with_task(TaskSnapshot::new(TaskOperation::Convert, JobStatus::Finished))
            .with_task(export)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Total number of remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.create_calls() + self.upload_calls() + self.status_calls()
    }

    pub fn jobs(&self) -> Vec<RecordedJob> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn target(&self) -> UploadTarget {
        UploadTarget::Form {
            url: format!("https://stub.invalid/upload/{}", self.job_id),
            parameters: vec![("key".into(), self.job_id.clone())],
        }
    }
}

#[async_trait]
impl ConversionProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudConvert
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn create_job(&self, request: JobRequest<'_>) -> Result<CreatedJob, ProviderError> {
        if !self.configured {
            return Err(ProviderError::NotConfigured);
        }
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let inline_len = match &request.source {
            JobSource::Inline(encoded) => Some(encoded.len()),
            JobSource::Upload => None,
        };
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(RecordedJob {
                filename: request.filename.to_owned(),
                output_format: request.output_format.to_owned(),
                inline_len,
            });
        }

        if let Some((status, message)) = &self.create_failure {
            return Err(ProviderError::Upstream {
                status: *status,
                message: message.clone(),
            });
        }

        Ok(CreatedJob {
            id: self.job_id.clone(),
            upload_target: inline_len.is_none().then(|| self.target()),
        })
    }

    async fn upload(&self, target: &UploadTarget, file: &StagedFile) -> Result<(), ProviderError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(file.path()).await?;
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(RecordedUpload {
                target: target.clone(),
                filename: file.filename().to_owned(),
                bytes,
            });
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<JobSnapshot, ProviderError> {
        if !self.configured {
            return Err(ProviderError::NotConfigured);
        }
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if self.transport_failure {
            return Err(ProviderError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "provider unreachable",
            )));
        }
        if let Some((status, message)) = &self.status_failure {
            return Err(ProviderError::Upstream {
                status: *status,
                message: message.clone(),
            });
        }

        let mut job = self
            .job
            .clone()
            .unwrap_or_else(|| JobSnapshot::new(id, JobStatus::Waiting));
        job.id = id.to_owned();
        Ok(job)
    }
}
