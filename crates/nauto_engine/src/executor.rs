//! Executor (C7): per-device orchestration. Resolves credentials (C3),
//! dispatches to the right job module (C6), retries across credentials on
//! retriable failures, and records exactly one JobResult.

use std::sync::Arc;

use chrono::Utc;
use nauto_model::{Device, ErrorClass, Job, JobId, JobResult, LogLevel, LogRecord, LogType, ResolvedDevice};
use nauto_security::{resolve, CredentialAttempt, CredentialRepository};
use nauto_store::LogPipeline;
use tracing::instrument;

use crate::registry::{JobModuleContext, JobRegistry};

#[derive(Clone)]
pub struct Executor {
    registry: Arc<JobRegistry>,
    credentials: Arc<dyn CredentialRepository>,
    logs: Arc<LogPipeline>,
}

impl Executor {
    pub fn new(
        registry: Arc<JobRegistry>,
        credentials: Arc<dyn CredentialRepository>,
        logs: Arc<LogPipeline>,
    ) -> Self {
        Executor { registry, credentials, logs }
    }

    /// `handle_device` (spec.md §4.7). Always returns exactly one
    /// JobResult, even on UNKNOWN_JOB_TYPE/NO_CREDENTIALS.
    #[instrument(skip(self, device, job, ctx), fields(job_id = job.id, device_id = device.id))]
    pub async fn handle_device(&self, device: &Device, job: &Job, ctx: &JobModuleContext) -> JobResult {
        let job_id = job.id;
        let device_id = device.id;

        self.log_job(job_id, device_id, LogLevel::Info, format!("executor starting device {device_id}"))
            .await;

        let Some(module) = self.registry.find(&job.job_type) else {
            let result = JobResult::failure(
                job_id,
                device_id,
                "UNKNOWN_JOB_TYPE",
                Some(ErrorClass::UnknownJobType),
                format!("no module registered for job_type '{}'", job.job_type),
            );
            self.log_job(job_id, device_id, LogLevel::Error, format!("unknown job type '{}'", job.job_type))
                .await;
            return result;
        };

        let candidates = match resolve(device, self.credentials.as_ref()).await {
            Ok(candidates) => candidates,
            Err(err) => {
                self.log_job(job_id, device_id, LogLevel::Error, format!("credential resolution failed: {err}"))
                    .await;
                return JobResult::failure(job_id, device_id, "NO_CREDENTIALS", Some(ErrorClass::NoCredentials), err.to_string());
            }
        };
        if candidates.is_empty() {
            self.log_job(job_id, device_id, LogLevel::Warning, "no credential shares a tag with this device")
                .await;
            return JobResult::failure(
                job_id,
                device_id,
                "NO_CREDENTIALS",
                Some(ErrorClass::NoCredentials),
                "no credential shares a tag with this device",
            );
        }

        let mut last_result = None;
        for credential in candidates {
            let credential_id = credential.id;
            let resolved = ResolvedDevice::new(device.clone(), credential);
            let outcome = module.run(&resolved, job_id, ctx).await;

            self.credentials
                .record_attempt(CredentialAttempt {
                    credential_id,
                    device_id,
                    job_id,
                    success: outcome.success,
                    error: if outcome.success { None } else { outcome.details.get("error").and_then(|v| v.as_str()).map(String::from) },
                    occurred_at: Utc::now(),
                })
                .await
                .ok();

            self.log_connection(job_id, device_id, credential_id, outcome.success).await;

            let result = JobResult {
                id: None,
                job_id,
                device_id,
                success: outcome.success,
                details: outcome.details,
                created_at: Utc::now(),
            };

            if result.success {
                self.log_job(job_id, device_id, LogLevel::Info, "device task succeeded").await;
                return result;
            }

            let class = result
                .details
                .get("error_class")
                .and_then(|v| serde_json::from_value::<ErrorClass>(v.clone()).ok());
            let retriable = class.map(|c| c.retriable_by_credential()).unwrap_or(false);
            last_result = Some(result);
            if !retriable {
                break;
            }
        }

        let result = last_result.expect("at least one credential attempt was made");
        self.log_job(job_id, device_id, LogLevel::Error, "device task failed for all available credentials")
            .await;
        result
    }

    async fn log_job(&self, job_id: JobId, device_id: i64, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord::new(LogType::Job, level, "executor", message)
            .with_job(job_id)
            .with_device(device_id);
        self.logs.log(record).await;
    }

    async fn log_connection(&self, job_id: JobId, device_id: i64, credential_id: i64, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warning };
        let message = format!(
            "credential {credential_id} attempt {}",
            if success { "succeeded" } else { "failed" }
        );
        let record = LogRecord::new(LogType::Connection, level, "executor", message)
            .with_job(job_id)
            .with_device(device_id);
        self.logs.log(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nauto_model::{DeviceType, JobStatus, ResolvedDevice, ScheduleParams};
    use nauto_security::{CredentialAttempt, ResolverError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::registry::{JobModule, JobModuleMeta, JobModuleOutcome, JobRegistry};

    struct FakeCredentials {
        credentials: Vec<nauto_model::Credential>,
        attempts: Mutex<Vec<CredentialAttempt>>,
    }

    #[async_trait]
    impl CredentialRepository for FakeCredentials {
        async fn credentials_for_tags(&self, _tags: &[String]) -> Result<Vec<nauto_model::Credential>, ResolverError> {
            Ok(self.credentials.clone())
        }

        async fn record_attempt(&self, attempt: CredentialAttempt) -> Result<(), ResolverError> {
            self.attempts.lock().unwrap().push(attempt);
            Ok(())
        }
    }

    /// Fails every attempt except the one made with `succeeds_with_credential_id`.
    struct FlakyModule {
        succeeds_with_credential_id: i64,
        error_class: ErrorClass,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobModule for FlakyModule {
        fn job_type(&self) -> &'static str {
            "flaky"
        }

        fn meta(&self) -> JobModuleMeta {
            JobModuleMeta { label: "Flaky".into(), icon: "flaky".into(), description: "test module".into() }
        }

        async fn run(&self, device: &ResolvedDevice, _job_id: JobId, _ctx: &crate::registry::JobModuleContext) -> JobModuleOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if device.credential.id == self.succeeds_with_credential_id {
                return JobModuleOutcome::success(device.device.id, serde_json::json!({}));
            }
            JobModuleOutcome::failure(
                device.device.id,
                serde_json::json!({"error_class": self.error_class, "error": "simulated failure"}),
            )
        }
    }

    fn device(tags: Vec<String>) -> Device {
        Device {
            id: 1,
            hostname: "r1".into(),
            ip_address: "10.0.0.1".parse().unwrap(),
            device_type: DeviceType::GenericSsh,
            port: 22,
            description: None,
            serial_number: None,
            model: None,
            source: None,
            notes: None,
            last_updated: None,
            updated_by: None,
            created_at: chrono::Utc::now(),
            tags,
        }
    }

    fn credential(id: i64, priority: u16, tags: Vec<String>) -> nauto_model::Credential {
        nauto_model::Credential {
            id,
            username: format!("user{id}"),
            password: "secret".into(),
            priority,
            last_used: None,
            success_count: 0,
            failure_count: 0,
            description: None,
            is_system: false,
            tags,
        }
    }

    fn job() -> Job {
        Job {
            id: 7,
            name: "test job".into(),
            job_type: "flaky".into(),
            is_enabled: true,
            schedule: ScheduleParams::Manual,
            parameters: serde_json::Value::Null,
            status: JobStatus::Running,
            is_system: false,
            tags: vec!["site:lab".into()],
            approval_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    async fn in_memory_logs() -> Arc<LogPipeline> {
        let pool = nauto_store::init_pool("sqlite::memory:").await.unwrap();
        Arc::new(
            LogPipeline::new(
                pool,
                nauto_store::LogPipelineConfig { stdout_enabled: false, db_enabled: false, ..Default::default() },
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn unknown_job_type_yields_a_failure_result_without_touching_credentials() {
        let registry = Arc::new(JobRegistry::new());
        let credentials = Arc::new(FakeCredentials { credentials: vec![], attempts: Mutex::new(vec![]) });
        let executor = Executor::new(registry, credentials, in_memory_logs().await);

        let result = executor.handle_device(&device(vec!["site:lab".into()]), &job(), &crate::registry::JobModuleContext::probe()).await;

        assert!(!result.success);
        assert_eq!(result.details["error_type"], "UNKNOWN_JOB_TYPE");
    }

    #[tokio::test]
    async fn no_matching_credential_yields_no_credentials_result() {
        let mut registry = JobRegistry::new();
        registry
            .register(Arc::new(FlakyModule { succeeds_with_credential_id: 1, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) }))
            .await
            .unwrap();
        let credentials = Arc::new(FakeCredentials { credentials: vec![credential(1, 10, vec!["other:tag".into()])], attempts: Mutex::new(vec![]) });
        let executor = Executor::new(Arc::new(registry), credentials, in_memory_logs().await);

        let result = executor.handle_device(&device(vec!["site:lab".into()]), &job(), &crate::registry::JobModuleContext::probe()).await;

        assert!(!result.success);
        assert_eq!(result.details["error_type"], "NO_CREDENTIALS");
    }

    #[tokio::test]
    async fn retriable_failure_falls_through_to_the_next_credential_by_priority() {
        let mut registry = JobRegistry::new();
        registry
            .register(Arc::new(FlakyModule { succeeds_with_credential_id: 2, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) }))
            .await
            .unwrap();
        let credentials = Arc::new(FakeCredentials {
            credentials: vec![credential(1, 1, vec!["site:lab".into()]), credential(2, 2, vec!["site:lab".into()])],
            attempts: Mutex::new(vec![]),
        });
        let executor = Executor::new(Arc::new(registry), credentials.clone(), in_memory_logs().await);

        let result = executor.handle_device(&device(vec!["site:lab".into()]), &job(), &crate::registry::JobModuleContext::probe()).await;

        assert!(result.success);
        assert_eq!(credentials.attempts.lock().unwrap().len(), 2, "both credentials should have been attempted");
    }

    #[tokio::test]
    async fn non_retriable_failure_stops_after_the_first_credential() {
        let mut registry = JobRegistry::new();
        registry
            .register(Arc::new(FlakyModule { succeeds_with_credential_id: 2, error_class: ErrorClass::CommandError, calls: AtomicUsize::new(0) }))
            .await
            .unwrap();
        let credentials = Arc::new(FakeCredentials {
            credentials: vec![credential(1, 1, vec!["site:lab".into()]), credential(2, 2, vec!["site:lab".into()])],
            attempts: Mutex::new(vec![]),
        });
        let executor = Executor::new(Arc::new(registry), credentials.clone(), in_memory_logs().await);

        let result = executor.handle_device(&device(vec!["site:lab".into()]), &job(), &crate::registry::JobModuleContext::probe()).await;

        assert!(!result.success);
        assert_eq!(credentials.attempts.lock().unwrap().len(), 1, "a non-retriable failure must not try the next credential");
    }
}
