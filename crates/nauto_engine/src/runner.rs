//! Runner (C9): end-to-end job lifecycle. Loads target devices, delegates
//! to the Dispatcher, aggregates per-device results into a terminal
//! Job.status, and persists that status (spec.md §4.9).

use std::sync::Arc;

use nauto_model::{JobId, JobStatus, LogLevel, LogRecord, LogType};
use nauto_security::{resolve, CredentialRepository};
use nauto_store::{JobRepository, LogPipeline};
use thiserror::Error;
use tracing::instrument;

use crate::dispatcher::{CancelToken, Dispatcher};
use crate::registry::JobModuleContext;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("store error: {0}")]
    Store(#[from] nauto_store::StoreError),
}

pub struct Runner {
    jobs: Arc<JobRepository>,
    credentials: Arc<dyn CredentialRepository>,
    dispatcher: Arc<Dispatcher>,
    logs: Arc<LogPipeline>,
}

impl Runner {
    pub fn new(
        jobs: Arc<JobRepository>,
        credentials: Arc<dyn CredentialRepository>,
        dispatcher: Arc<Dispatcher>,
        logs: Arc<LogPipeline>,
    ) -> Self {
        Runner { jobs, credentials, dispatcher, logs }
    }

    /// `run_job(job_id, db) -> terminal_status` (spec.md §4.9).
    #[instrument(skip(self, ctx), fields(job_id))]
    pub async fn run_job(&self, job_id: JobId, ctx: &JobModuleContext) -> Result<JobStatus, RunnerError> {
        let Some(job) = self.jobs.get_job(job_id).await? else {
            return Ok(JobStatus::Pending);
        };
        if !job.is_enabled {
            return Ok(job.status);
        }

        self.jobs.update_job_status(job_id, JobStatus::Running).await?;
        self.log_job(job_id, LogLevel::Info, format!("job '{}' starting", job.name)).await;

        let devices = self.jobs.devices_for_tags(&job.tags).await?;
        if devices.is_empty() {
            self.finish(job_id, JobStatus::CompletedNoDevices, "no devices matched this job's tags").await?;
            return Ok(JobStatus::CompletedNoDevices);
        }

        let mut any_candidate = false;
        for device in &devices {
            match resolve(device, self.credentials.as_ref()).await {
                Ok(candidates) if !candidates.is_empty() => {
                    any_candidate = true;
                    break;
                }
                Ok(_) => continue,
                Err(err) => {
                    self.finish(
                        job_id,
                        JobStatus::FailedCredentialResolution,
                        format!("credential resolution errored: {err}"),
                    )
                    .await?;
                    return Ok(JobStatus::FailedCredentialResolution);
                }
            }
        }
        if !any_candidate {
            self.finish(job_id, JobStatus::CompletedNoCredentials, "no device has a matching credential").await?;
            return Ok(JobStatus::CompletedNoCredentials);
        }

        let results = match self.dispatcher.dispatch(devices, &job, ctx, CancelToken::new()).await {
            Ok(results) => results,
            Err(err) => {
                self.finish(job_id, JobStatus::FailedDispatcherError, format!("dispatcher error: {err}")).await?;
                return Ok(JobStatus::FailedDispatcherError);
            }
        };

        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        for result in &results {
            if let Err(err) = self.jobs.insert_job_result(result).await {
                self.finish(job_id, JobStatus::FailedUnexpected, format!("failed to persist job result: {err}"))
                    .await?;
                return Ok(JobStatus::FailedUnexpected);
            }
        }

        let status = match (succeeded, total) {
            (s, t) if s == t => JobStatus::CompletedSuccess,
            (0, _) => JobStatus::CompletedFailure,
            _ => JobStatus::CompletedPartialFailure,
        };

        self.finish(job_id, status, format!("{succeeded}/{total} devices succeeded")).await?;
        Ok(status)
    }

    async fn finish(&self, job_id: JobId, status: JobStatus, summary: impl Into<String>) -> Result<(), RunnerError> {
        self.jobs.update_job_status(job_id, status).await?;
        let level = if status.is_terminal() && status != JobStatus::CompletedSuccess {
            match status {
                JobStatus::CompletedPartialFailure | JobStatus::CompletedNoCredentials => LogLevel::Warning,
                _ => LogLevel::Error,
            }
        } else {
            LogLevel::Info
        };
        self.log_job(job_id, level, format!("job finished: {status} ({})", summary.into())).await;
        Ok(())
    }

    async fn log_job(&self, job_id: JobId, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord::new(LogType::Job, level, "runner", message).with_job(job_id);
        self.logs.log(record).await;
    }
}
