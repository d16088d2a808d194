//! Maps a provider job snapshot onto the coarse polling contract the
//! browser client understands.
//!
//! | remote status | step                          | percent |
//! |---------------|-------------------------------|---------|
//! | `waiting`     | `wait`                        | 10      |
//! | `processing`  | `upload` / `convert` / `wait` | 50      |
//! | `finished`    | `finish`                      | 100     |
//! | `error`       | returned as [`ProviderError::JobFailed`] |  |
//!
//! Providers expose no reliable sub-task progress, so the percentages are
//! fixed markers rather than measurements.

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ProviderError;
use crate::job::{JobSnapshot, JobStatus, TaskOperation};

pub const WAITING_PERCENT: u8 = 10;
pub const PROCESSING_PERCENT: u8 = 50;
pub const FINISHED_PERCENT: u8 = 100;

/// Fallback message for failed jobs that carry no provider message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Conversion failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Wait,
    Upload,
    Convert,
    Finish,
}

/// Download location of the converted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConversionOutput {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Status payload returned to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NormalizedStatus {
    pub id: String,
    pub status: JobStatus,
    pub step: Step,
    pub step_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ConversionOutput>,
}

/// Normalize one job snapshot.
///
/// Pure: the same snapshot always yields the same result.
pub fn normalize(job: &JobSnapshot) -> Result<NormalizedStatus, ProviderError> {
    let (step, step_percent, output) = match job.status {
        JobStatus::Waiting => (Step::Wait, WAITING_PERCENT, None),
        JobStatus::Processing => (processing_step(job), PROCESSING_PERCENT, None),
        JobStatus::Finished => (Step::Finish, FINISHED_PERCENT, Some(finished_output(job)?)),
        JobStatus::Error => {
            return Err(ProviderError::JobFailed {
                message: failure_message(job),
            });
        }
    };

    Ok(NormalizedStatus {
        id: job.id.clone(),
        status: job.status,
        step,
        step_percent,
        output,
    })
}

fn processing_step(job: &JobSnapshot) -> Step {
    if job.has_active(&TaskOperation::Import) {
        Step::Upload
    } else if job.has_active(&TaskOperation::Convert) {
        Step::Convert
    } else {
        Step::Wait
    }
}

fn finished_output(job: &JobSnapshot) -> Result<ConversionOutput, ProviderError> {
    let file = job
        .tasks
        .iter()
        .filter(|t| t.operation == TaskOperation::Export)
        .find_map(|t| t.files.first())
        .ok_or_else(|| {
            ProviderError::malformed(format!(
                "job {} finished without an exported file",
                job.id
            ))
        })?;

    Ok(ConversionOutput {
        url: file.url.clone(),
        size: file.size,
    })
}

fn failure_message(job: &JobSnapshot) -> String {
    job.tasks
        .iter()
        .filter(|t| t.status == JobStatus::Error)
        .find_map(|t| t.message.clone())
        .or_else(|| job.message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_owned())
}
