//! Job dispatcher: runs registered handlers on tokio tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing;

use filehub_core::config::WorkerConfig;
use filehub_core::error::AppError;
use filehub_core::result::AppResult;
use filehub_core::types::JobId;

use crate::executor::{JobContext, JobExecutionError, JobHandler};

type JobResult = Result<Option<Value>, JobExecutionError>;

/// Resolves once cancellation is requested. Dropping the handle without
/// cancelling leaves the job running.
async fn cancellation(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// A dispatched job that can be awaited or cancelled.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    job_type: String,
    cancel: watch::Sender<bool>,
    join: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Ask the job to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job to finish and return its result.
    pub async fn wait(self) -> JobResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(JobExecutionError::Internal(AppError::internal(format!(
                "Job {} panicked or was aborted: {}",
                self.id, e
            )))),
        }
    }
}

/// Dispatches jobs to the handler registered for their type, with at most
/// `concurrency` jobs running at once.
#[derive(Debug)]
pub struct JobDispatcher {
    /// Registered job handlers by type
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl JobDispatcher {
    /// Create a dispatcher with no handlers
    pub fn new(config: &WorkerConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            handlers: HashMap::new(),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get the list of registered job types
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Start `job_type` with `payload`. The job waits for a free slot on its
    /// own task; the returned handle is available immediately.
    pub fn dispatch(&self, job_type: &str, payload: Value) -> AppResult<JobHandle> {
        let handler = self.handlers.get(job_type).cloned().ok_or_else(|| {
            AppError::validation(format!("No handler registered for job type '{job_type}'"))
        })?;

        let id = JobId::new();
        let (cancel, cancel_rx) = watch::channel(false);
        let semaphore = Arc::clone(&self.semaphore);
        let job_type = job_type.to_string();
        let task_type = job_type.clone();

        let join = tokio::spawn(async move {
            let mut waiting = cancel_rx.clone();
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.map_err(|_| {
                    JobExecutionError::Internal(AppError::service_unavailable("Dispatcher is shut down"))
                })?,
                _ = cancellation(&mut waiting) => {
                    tracing::debug!(job_id = %id, job_type = %task_type, "Job cancelled before it started");
                    return Err(JobExecutionError::Cancelled);
                }
            };
            let _permit = permit;

            tracing::info!(job_id = %id, job_type = %task_type, "Processing job");
            let ctx = JobContext::new(id, cancel_rx);
            let result = handler.execute(&ctx, &payload).await;
            match &result {
                Ok(_) => tracing::info!(job_id = %id, "Job completed successfully"),
                Err(JobExecutionError::Cancelled) => tracing::info!(job_id = %id, "Job cancelled"),
                Err(JobExecutionError::Permanent(msg)) => {
                    tracing::error!(job_id = %id, error = %msg, "Job failed permanently")
                }
                Err(JobExecutionError::Internal(err)) => {
                    tracing::error!(job_id = %id, error = %err, "Job internal error")
                }
            }
            result
        });

        Ok(JobHandle {
            id,
            job_type,
            cancel,
            join,
        })
    }

    /// Stop accepting jobs and wait up to `timeout` for in-flight jobs.
    pub async fn shutdown(&self, timeout: Duration) {
        tracing::info!("Waiting for in-flight jobs to complete...");
        let permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        match tokio::time::timeout(timeout, self.semaphore.acquire_many(permits)).await {
            Ok(Ok(_all)) => self.semaphore.close(),
            Ok(Err(_)) => {}
            Err(_) => tracing::warn!("Timed out waiting for in-flight jobs"),
        }
        tracing::info!("Job dispatcher shut down");
    }
}
