//! Provider-neutral view of a remote conversion job.
//!
//! Each provider client parses its own wire format into a [`JobSnapshot`];
//! the status normalizer only ever sees these types.

use serde::Serialize;
use strum::{AsRefStr, EnumString};
use utoipa::ToSchema;

/// Lifecycle state shared by jobs and their sub-tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    Finished,
    Error,
}

impl JobStatus {
    /// Parse a provider status string. Unknown values are treated as
    /// `waiting`, since providers add intermediate states over time.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or(JobStatus::Waiting)
    }

    /// `true` while the task still has work outstanding.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Waiting | JobStatus::Processing)
    }
}

/// What a sub-task does inside the job pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOperation {
    Import,
    Convert,
    Export,
    Other(String),
}

impl TaskOperation {
    /// Classify an operation tag such as `import/upload` or `export/url`.
    pub fn from_wire(operation: &str) -> Self {
        let family = operation.split('/').next().unwrap_or_default();
        match family {
            "import" => TaskOperation::Import,
            "convert" => TaskOperation::Convert,
            "export" => TaskOperation::Export,
            _ => TaskOperation::Other(operation.to_owned()),
        }
    }
}

/// A file produced by an export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFile {
    pub url: String,
    pub size: Option<u64>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: Option<String>,
    pub operation: TaskOperation,
    pub status: JobStatus,
    pub message: Option<String>,
    pub files: Vec<ResultFile>,
}

impl TaskSnapshot {
    pub fn new(operation: TaskOperation, status: JobStatus) -> Self {
        Self {
            name: None,
            operation,
            status,
            message: None,
            files: Vec::new(),
        }
    }
}

/// One poll's worth of remote job state. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub tasks: Vec<TaskSnapshot>,
    /// Job-level failure message, for providers that report one.
    pub message: Option<String>,
}

impl JobSnapshot {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            tasks: Vec::new(),
            message: None,
        }
    }

    pub fn with_task(mut self, task: TaskSnapshot) -> Self {
        self.tasks.push(task);
        self
    }

    pub(crate) fn has_active(&self, operation: &TaskOperation) -> bool {
        self.tasks
            .iter()
            .any(|t| &t.operation == operation && t.status.is_active())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(JobStatus::from_wire("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::from_wire("finished"), JobStatus::Finished);
        assert_eq!(JobStatus::from_wire("error"), JobStatus::Error);
    }

    #[test]
    fn unknown_status_counts_as_waiting() {
        assert_eq!(JobStatus::from_wire("paused"), JobStatus::Waiting);
    }

    #[test]
    fn classifies_operation_families() {
        assert_eq!(TaskOperation::from_wire("import/base64"), TaskOperation::Import);
        assert_eq!(TaskOperation::from_wire("import/upload"), TaskOperation::Import);
        assert_eq!(TaskOperation::from_wire("convert"), TaskOperation::Convert);
        assert_eq!(TaskOperation::from_wire("export/url"), TaskOperation::Export);
        assert_eq!(
            TaskOperation::from_wire("thumbnail"),
            TaskOperation::Other("thumbnail".into())
        );
    }
}
