//! Recognition backends: external services that turn document bytes into text lines.
//!
//! Two variants are wired in by default: `VisionReadBackend` (free-form OCR) and
//! `LayoutBackend` (structure-aware layout analysis). Both are asynchronous:
//! `submit` returns a job handle that `JobPoller` drives to a terminal state.
//! A synchronous backend returns `Submission::Lines` and is never polled.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::service_client::ServiceError;

pub mod layout;
pub mod poller;
pub mod vision;

pub use layout::LayoutBackend;
pub use poller::{JobPoller, PollPolicy};
pub use vision::VisionReadBackend;

/// Reason recorded when a service reports failure without saying why.
pub const DEFAULT_FAILURE_REASON: &str = "Unable to extract text from the document";

#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The service could not be reached, or kept answering 429/5xx.
    #[error("{backend} is unreachable: {message}")]
    Transport {
        backend: &'static str,
        message: String,
    },

    /// The service ran but reported failure (e.g. unreadable document).
    #[error("{backend} failed: {reason}")]
    RecognitionFailed {
        backend: &'static str,
        reason: String,
    },

    /// The job did not reach a terminal state within the poll budget.
    #[error("{backend} job did not finish after {polls} polls ({elapsed:?})")]
    Timeout {
        backend: &'static str,
        polls: u32,
        elapsed: Duration,
    },
}

impl RecognitionError {
    pub fn from_service(backend: &'static str, err: ServiceError) -> Self {
        if err.is_transport() {
            return RecognitionError::Transport {
                backend,
                message: err.to_string(),
            };
        }
        let reason = match err {
            ServiceError::Api { message, .. } if !message.is_empty() => message,
            other => other.to_string(),
        };
        RecognitionError::RecognitionFailed { backend, reason }
    }
}

/// Opaque, service-issued token identifying one in-flight job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    /// Zero lines is a valid, successful outcome.
    Succeeded(Vec<String>),
    Failed(String),
}

impl JobStatus {
    /// Maps the status vocabulary shared by the recognition services
    /// (`notStarted | running | succeeded | failed`). `lines` is only
    /// evaluated for a successful job.
    pub fn from_service(
        status: &str,
        lines: impl FnOnce() -> Vec<String>,
        error: Option<String>,
    ) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "notstarted" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "succeeded" => JobStatus::Succeeded(lines()),
            "failed" => JobStatus::Failed(
                error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
            ),
            other => JobStatus::Failed(format!("Unexpected job status '{other}'")),
        }
    }
}

/// What a backend hands back on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Lines(Vec<String>),
    Pending(JobHandle),
}

/// Tracks one asynchronous job between submission and its terminal status.
/// Only `JobPoller` mutates it.
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub handle: JobHandle,
    pub status: JobStatus,
    pub polls: u32,
}

impl RecognitionJob {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            status: JobStatus::Pending,
            polls: 0,
        }
    }
}

/// An external service converting document bytes into text lines.
///
/// `submit` receives its own `Bytes` view of the document; implementations must
/// not assume exclusive ownership of the underlying buffer.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, document: Bytes) -> Result<Submission, RecognitionError>;

    /// Synchronous backends never issue handles, so polling one is a failure.
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, RecognitionError> {
        Err(RecognitionError::RecognitionFailed {
            backend: self.name(),
            reason: format!("backend does not issue job handles (got '{handle}')"),
        })
    }
}
