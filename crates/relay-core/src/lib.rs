//! Core of the conversion relay: provider clients, upload staging, the
//! inline/staged strategy selector and the job status normalizer.
//!
//! This crate has no HTTP server dependency; `relay-server` wraps it in axum
//! routes.

pub mod error;
pub mod gateway;
pub mod job;
pub mod provider;
pub mod staging;
pub mod status;
pub mod strategy;

pub use error::{ProviderError, StagingError};
pub use gateway::{Gateway, StartedJob};
pub use job::{JobSnapshot, JobStatus, ResultFile, TaskOperation, TaskSnapshot};
pub use provider::{ConversionProvider, ProviderKind, ProviderSettings, ProviderTimeouts};
pub use staging::{StagedFile, StagedUpload, StagingArea};
pub use status::{normalize, ConversionOutput, NormalizedStatus, Step};
pub use strategy::{UploadPolicy, UploadStrategy};
