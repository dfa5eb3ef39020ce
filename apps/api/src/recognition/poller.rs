//! Job poller: drives a submitted recognition job to a terminal status.
//!
//! Polls immediately, then sleeps `interval` between non-terminal answers.
//! The loop is bounded by both a poll count and an elapsed-time budget; the
//! budget also caps each individual poll call. A few consecutive transport
//! errors are tolerated before giving up. Sleeping is a plain
//! `tokio::time::sleep`, so dropping the future cancels it promptly.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::recognition::{
    JobHandle, JobStatus, RecognitionBackend, RecognitionError, RecognitionJob, Submission,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    /// Consecutive transport failures tolerated while polling.
    pub transport_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
            max_elapsed: Duration::from_secs(120),
            transport_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    /// Submits the document and, for asynchronous backends, polls the job to completion.
    pub async fn recognize(
        &self,
        backend: &dyn RecognitionBackend,
        document: Bytes,
    ) -> Result<Vec<String>, RecognitionError> {
        match backend.submit(document).await? {
            Submission::Lines(lines) => {
                debug!("{} answered synchronously", backend.name());
                Ok(lines)
            }
            Submission::Pending(handle) => self.run(backend, handle).await,
        }
    }

    /// Polls `handle` until the backend reports `succeeded` or `failed`.
    pub async fn run(
        &self,
        backend: &dyn RecognitionBackend,
        handle: JobHandle,
    ) -> Result<Vec<String>, RecognitionError> {
        let started = Instant::now();
        let mut job = RecognitionJob::new(handle);
        let mut transport_failures = 0u32;

        loop {
            if job.polls >= self.policy.max_attempts {
                return Err(self.timeout(backend, &job, started));
            }
            job.polls += 1;

            // a single poll may not outlive what is left of the elapsed budget
            let remaining = self.policy.max_elapsed.saturating_sub(started.elapsed());
            let Ok(polled) = tokio::time::timeout(remaining, backend.poll(&job.handle)).await
            else {
                return Err(self.timeout(backend, &job, started));
            };

            match polled {
                Ok(status) => {
                    transport_failures = 0;
                    debug!(
                        "{} job {} poll #{}: {}",
                        backend.name(),
                        job.handle,
                        job.polls,
                        status_label(&status)
                    );
                    job.status = status;
                }
                Err(RecognitionError::Transport { message, .. })
                    if transport_failures < self.policy.transport_retries =>
                {
                    transport_failures += 1;
                    warn!(
                        "{} poll #{} failed ({}), retry {}/{}",
                        backend.name(),
                        job.polls,
                        message,
                        transport_failures,
                        self.policy.transport_retries
                    );
                }
                Err(e) => return Err(e),
            }

            match std::mem::replace(&mut job.status, JobStatus::Running) {
                JobStatus::Succeeded(lines) => {
                    info!(
                        "{} job finished after {} polls with {} lines",
                        backend.name(),
                        job.polls,
                        lines.len()
                    );
                    return Ok(lines);
                }
                JobStatus::Failed(reason) => {
                    return Err(RecognitionError::RecognitionFailed {
                        backend: backend.name(),
                        reason,
                    });
                }
                pending => job.status = pending,
            }

            if started.elapsed() + self.policy.interval > self.policy.max_elapsed {
                return Err(self.timeout(backend, &job, started));
            }
            tokio::time::sleep(self.policy.interval).await;
        }
    }

    fn timeout(
        &self,
        backend: &dyn RecognitionBackend,
        job: &RecognitionJob,
        started: Instant,
    ) -> RecognitionError {
        let elapsed = started.elapsed();
        warn!(
            "{} job {} gave up after {} polls ({:?})",
            backend.name(),
            job.handle,
            job.polls,
            elapsed
        );
        RecognitionError::Timeout {
            backend: backend.name(),
            polls: job.polls,
            elapsed,
        }
    }
}

fn status_label(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Succeeded(_) => "succeeded",
        JobStatus::Failed(_) => "failed",
    }
}
