//! Conversion gateway: strategy selection plus the provider calls behind the
//! two public operations.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::provider::{ConversionProvider, JobRequest, JobSource, ProviderKind};
use crate::staging::StagedFile;
use crate::status::{normalize, NormalizedStatus};
use crate::strategy::{UploadPolicy, UploadStrategy};

/// A job the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedJob {
    pub id: String,
    pub strategy: UploadStrategy,
}

#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn ConversionProvider>,
    policy: UploadPolicy,
}

impl Gateway {
    pub fn new(provider: Arc<dyn ConversionProvider>, policy: UploadPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    /// Create a remote job for a staged file.
    ///
    /// Issues exactly one job-creation call, followed by one upload call
    /// when the file is above the inline threshold.
    pub async fn start_conversion(
        &self,
        file: &StagedFile,
        output_format: &str,
    ) -> Result<StartedJob, ProviderError> {
        let strategy = self.policy.select(file.size());
        debug!(size = file.size(), %strategy, "selected upload strategy");

        let id = match strategy {
            UploadStrategy::Inline => {
                let bytes = file.read_all().await?;
                let created = self
                    .provider
                    .create_job(JobRequest {
                        filename: file.filename(),
                        output_format,
                        source: JobSource::Inline(STANDARD.encode(bytes)),
                    })
                    .await?;
                created.id
            }
            UploadStrategy::Staged => {
                let created = self
                    .provider
                    .create_job(JobRequest {
                        filename: file.filename(),
                        output_format,
                        source: JobSource::Upload,
                    })
                    .await?;
                let target = created.upload_target.ok_or_else(|| {
                    ProviderError::malformed(format!(
                        "job {} was created without an upload target",
                        created.id
                    ))
                })?;
                self.provider.upload(&target, file).await?;
                created.id
            }
        };

        info!(
            job_id = %id,
            provider = %self.provider.kind(),
            %strategy,
            size = file.size(),
            output_format,
            "conversion started"
        );
        Ok(StartedJob { id, strategy })
    }

    /// Fetch the current remote state of a job and normalize it.
    pub async fn conversion_status(&self, id: &str) -> Result<NormalizedStatus, ProviderError> {
        let job = self.provider.get_job(id).await?;
        normalize(&job)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::job::{JobSnapshot, JobStatus, TaskOperation, TaskSnapshot};
    use crate::provider::stub::StubProvider;
    use crate::provider::UploadTarget;
    use crate::staging::StagingArea;
    use crate::status::Step;

    fn gateway(stub: &Arc<StubProvider>, threshold: u64) -> Gateway {
        Gateway::new(stub.clone(), UploadPolicy::new(threshold))
    }

    #[tokio::test]
    async fn small_file_is_sent_inline_in_one_call() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = StagingArea::new(tmp.path(), 1024)
            .stage_bytes("photo.png", b"abc")
            .await
            .unwrap();
        let stub = Arc::new(StubProvider::new("job-1"));

        let started = gateway(&stub, 1024)
            .start_conversion(&staged, "jpg")
            .await
            .unwrap();

        assert_eq!(started.id, "job-1");
        assert_eq!(started.strategy, UploadStrategy::Inline);
        assert_eq!(stub.create_calls(), 1);
        assert_eq!(stub.upload_calls(), 0);

        let jobs = stub.jobs();
        assert_eq!(jobs[0].filename, "photo.png");
        assert_eq!(jobs[0].output_format, "jpg");
        // "abc" -> "YWJj"
        assert_eq!(jobs[0].inline_len, Some(4));
    }

    #[tokio::test]
    async fn large_file_is_created_then_uploaded() {
        let tmp = tempfile::tempdir().unwrap();
        let payload = vec![7u8; 64];
        let staged = StagingArea::new(tmp.path(), 1024)
            .stage_bytes("video.mov", &payload)
            .await
            .unwrap();
        let stub = Arc::new(StubProvider::new("job-2"));

        let started = gateway(&stub, 16)
            .start_conversion(&staged, "mp4")
            .await
            .unwrap();

        assert_eq!(started.strategy, UploadStrategy::Staged);
        assert_eq!(stub.create_calls(), 1);
        assert_eq!(stub.jobs()[0].inline_len, None);

        let uploads = stub.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes, payload);
        assert_eq!(uploads[0].filename, "video.mov");
        assert!(matches!(uploads[0].target, UploadTarget::Form { .. }));
    }

    #[tokio::test]
    async fn provider_rejection_is_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = StagingArea::new(tmp.path(), 1024)
            .stage_bytes("a.png", b"x")
            .await
            .unwrap();
        let stub = Arc::new(StubProvider::new("job-3").fail_create_with(422, "Invalid format"));

        let err = gateway(&stub, 1024)
            .start_conversion(&staged, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Upstream { status: 422, .. }));
        assert_eq!(stub.create_calls(), 1);
    }

    #[tokio::test]
    async fn status_polls_are_idempotent() {
        let job = JobSnapshot::new("job-4", JobStatus::Processing)
            .with_task(TaskSnapshot::new(TaskOperation::Import, JobStatus::Finished))
            .with_task(TaskSnapshot::new(TaskOperation::Convert, JobStatus::Finished));
        let stub = Arc::new(StubProvider::new("job-4").with_job(job));
        let gateway = gateway(&stub, 1024);

        let first = gateway.conversion_status("job-4").await.unwrap();
        let second = gateway.conversion_status("job-4").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.step, Step::Wait);
        assert_eq!(first.step_percent, 50);
        assert_eq!(stub.status_calls(), 2);
        assert_eq!(stub.create_calls(), 0);
    }

    #[tokio::test]
    async fn finished_status_carries_output() {
        let stub = Arc::new(StubProvider::new("job-5").with_job(StubProvider::finished_job(
            "job-5",
            "https://x/y.jpg",
            Some(45678),
        )));

        let status = gateway(&stub, 1024).conversion_status("job-5").await.unwrap();
        assert_eq!(status.step, Step::Finish);
        let output = status.output.unwrap();
        assert_eq!(output.url, "https://x/y.jpg");
        assert_eq!(output.size, Some(45678));
    }
}
