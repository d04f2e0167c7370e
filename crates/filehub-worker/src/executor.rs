//! Job handlers and the context they run in.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use filehub_core::error::AppError;
use filehub_core::types::JobId;

/// A unit of background work selected by `job_type`.
#[async_trait]
pub trait JobHandler: Send + Sync + fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Execute the job with the given payload
    async fn execute(&self, ctx: &JobContext, payload: &Value)
        -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The payload or target is unusable; running again will not help
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// The job stopped at a cancellation point
    #[error("Job cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Per-run state handed to a [`JobHandler`].
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    cancel: watch::Receiver<bool>,
}

impl JobContext {
    pub(crate) fn new(job_id: JobId, cancel: watch::Receiver<bool>) -> Self {
        Self { job_id, cancel }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Cancellation point; handlers call this between stages.
    pub fn checkpoint(&self) -> Result<(), JobExecutionError> {
        if self.is_cancelled() {
            Err(JobExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
