//! Dispatcher (C8): bounded-concurrency fan-out of Executor tasks across a
//! job's devices, with per-device retry/backoff and a cooperative cancel
//! signal. A Semaphore + FuturesUnordered pool gates in-flight device tasks,
//! with full retry/backoff/cancellation support layered on top.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use nauto_model::{Device, ErrorClass, Job, JobId, JobResult, LogLevel, LogRecord, LogType};
use nauto_store::LogPipeline;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::executor::Executor;
use crate::registry::JobModuleContext;

/// An unexpected failure inside the dispatcher itself (spec.md §4.9: "if
/// from the dispatcher" → `FAILED_DISPATCHER_ERROR`), distinct from an
/// ordinary per-device `JobResult` failure the retry loop already handles.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("a device task panicked or was cancelled before reporting a result: {0}")]
    TaskJoin(String),
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub thread_pool_size: usize,
    pub max_retries: u32,
    pub retry_backoff_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig { thread_pool_size: 5, max_retries: 2, retry_backoff_seconds: 2 }
    }
}

/// Shared cancel flag a Runner can flip; in-flight attempts complete and
/// report, but no further attempts (retries or new devices) are scheduled.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Dispatcher {
    executor: Arc<Executor>,
    logs: Arc<LogPipeline>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(executor: Arc<Executor>, logs: Arc<LogPipeline>, config: DispatcherConfig) -> Self {
        Dispatcher { executor, logs, config }
    }

    /// `dispatch(devices, job_id, job_type, config) -> [JobResult]`
    /// (spec.md §4.8). Task submission order is stable by device id;
    /// completion order is unspecified. Returns exactly one JobResult per
    /// input device, or `Err` if any device task panicked/was aborted
    /// before reporting — an unexpected dispatcher-level failure rather
    /// than an ordinary device failure.
    #[instrument(skip(self, devices, job, ctx, cancel), fields(job_id = job.id, device_count = devices.len()))]
    pub async fn dispatch(
        &self,
        mut devices: Vec<Device>,
        job: &Job,
        ctx: &JobModuleContext,
        cancel: CancelToken,
    ) -> Result<Vec<JobResult>, DispatcherError> {
        devices.sort_by_key(|d| d.id);
        let total = devices.len();
        let semaphore = Arc::new(Semaphore::new(self.config.thread_pool_size.max(1)));
        let started = std::time::Instant::now();

        self.log_job(job.id, LogLevel::Info, format!("dispatching {total} device task(s)")).await;

        let mut tasks = FuturesUnordered::new();
        for device in devices {
            let sem = semaphore.clone();
            let executor = self.executor.clone();
            let logs = self.logs.clone();
            let job = job.clone();
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            let config = self.config;

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.expect("dispatcher semaphore closed");
                run_with_retry(executor, logs, device, job, ctx, cancel, config).await
            }));
        }

        let mut results = Vec::with_capacity(total);
        let mut join_error = None;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::error!(job_id = job.id, "dispatcher task join error: {err}");
                    join_error.get_or_insert(err.to_string());
                }
            }
        }

        if let Some(err) = join_error {
            return Err(DispatcherError::TaskJoin(err));
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        self.log_job(
            job.id,
            LogLevel::Info,
            format!("dispatch complete: {succeeded}/{total} succeeded in {:?}", started.elapsed()),
        )
        .await;

        Ok(results)
    }

    async fn log_job(&self, job_id: JobId, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord::new(LogType::Job, level, "dispatcher", message).with_job(job_id);
        self.logs.log(record).await;
    }
}

async fn run_with_retry(
    executor: Arc<Executor>,
    logs: Arc<LogPipeline>,
    device: Device,
    job: Job,
    ctx: JobModuleContext,
    cancel: CancelToken,
    config: DispatcherConfig,
) -> JobResult {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = executor.handle_device(&device, &job, &ctx).await;

        if result.success || cancel.is_cancelled() {
            return result;
        }

        let class = result
            .details
            .get("error_class")
            .and_then(|v| serde_json::from_value::<ErrorClass>(v.clone()).ok());
        let retriable = class.map(|c| c.retriable_by_dispatcher()).unwrap_or(false);

        if !retriable || attempt > config.max_retries {
            return result;
        }

        let backoff = Duration::from_secs(config.retry_backoff_seconds.saturating_mul(1u64 << (attempt - 1)));
        let record = LogRecord::new(
            LogType::Job,
            LogLevel::Warning,
            "dispatcher",
            format!("retrying device {} (attempt {}/{})", device.id, attempt + 1, config.max_retries + 1),
        )
        .with_job(job.id)
        .with_device(device.id);
        logs.log(record).await;

        tokio::time::sleep(backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nauto_model::{Credential, DeviceType, JobStatus, ResolvedDevice, ScheduleParams};
    use nauto_security::{CredentialAttempt, CredentialRepository, ResolverError};
    use std::sync::atomic::AtomicUsize;

    use crate::registry::{JobModule, JobModuleMeta, JobModuleOutcome, JobRegistry};

    struct SingleCredential(Credential);

    #[async_trait]
    impl CredentialRepository for SingleCredential {
        async fn credentials_for_tags(&self, _tags: &[String]) -> Result<Vec<Credential>, ResolverError> {
            Ok(vec![self.0.clone()])
        }

        async fn record_attempt(&self, _attempt: CredentialAttempt) -> Result<(), ResolverError> {
            Ok(())
        }
    }

    /// Fails with `error_class` on every call until `succeeds_after_call` (inclusive), then succeeds.
    struct CountingModule {
        succeeds_after_call: usize,
        error_class: ErrorClass,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobModule for CountingModule {
        fn job_type(&self) -> &'static str {
            "counting"
        }

        fn meta(&self) -> JobModuleMeta {
            JobModuleMeta { label: "Counting".into(), icon: "counting".into(), description: "test module".into() }
        }

        async fn run(&self, device: &ResolvedDevice, _job_id: JobId, _ctx: &JobModuleContext) -> JobModuleOutcome {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeeds_after_call {
                return JobModuleOutcome::success(device.device.id, serde_json::json!({}));
            }
            JobModuleOutcome::failure(device.device.id, serde_json::json!({"error_class": self.error_class}))
        }
    }

    fn device(id: i64) -> Device {
        Device {
            id,
            hostname: format!("r{id}"),
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
            tags: vec!["site:lab".into()],
        }
    }

    fn job() -> Job {
        Job {
            id: 1,
            name: "dispatch test".into(),
            job_type: "counting".into(),
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

    fn credential() -> Credential {
        Credential {
            id: 1,
            username: "admin".into(),
            password: "secret".into(),
            priority: 1,
            last_used: None,
            success_count: 0,
            failure_count: 0,
            description: None,
            is_system: false,
            tags: vec!["site:lab".into()],
        }
    }

    async fn dispatcher_with(module: CountingModule, config: DispatcherConfig) -> Dispatcher {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(module)).await.unwrap();
        let credentials = Arc::new(SingleCredential(credential()));
        let logs = in_memory_logs().await;
        let executor = Arc::new(Executor::new(Arc::new(registry), credentials, logs.clone()));
        Dispatcher::new(executor, logs, config)
    }

    #[tokio::test]
    async fn dispatch_returns_exactly_one_result_per_device() {
        let dispatcher = dispatcher_with(
            CountingModule { succeeds_after_call: 1, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) },
            DispatcherConfig::default(),
        )
        .await;

        let devices = vec![device(1), device(2), device(3)];
        let results = dispatcher.dispatch(devices, &job(), &JobModuleContext::probe(), CancelToken::new()).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn dispatch_retries_a_dispatcher_retriable_failure_until_it_succeeds() {
        let config = DispatcherConfig { thread_pool_size: 1, max_retries: 3, retry_backoff_seconds: 0 };
        let dispatcher = dispatcher_with(
            CountingModule { succeeds_after_call: 3, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) },
            config,
        )
        .await;

        let results = dispatcher.dispatch(vec![device(1)], &job(), &JobModuleContext::probe(), CancelToken::new()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].success, "should eventually succeed within max_retries");
    }

    #[tokio::test]
    async fn dispatch_gives_up_once_max_retries_are_exhausted() {
        let config = DispatcherConfig { thread_pool_size: 1, max_retries: 1, retry_backoff_seconds: 0 };
        let dispatcher = dispatcher_with(
            // Never succeeds within the 2 attempts (1 initial + 1 retry) the config allows.
            CountingModule { succeeds_after_call: 100, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) },
            config,
        )
        .await;

        let results = dispatcher.dispatch(vec![device(1)], &job(), &JobModuleContext::probe(), CancelToken::new()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn dispatch_does_not_retry_a_non_dispatcher_retriable_failure() {
        let config = DispatcherConfig { thread_pool_size: 1, max_retries: 5, retry_backoff_seconds: 0 };
        let dispatcher = dispatcher_with(
            CountingModule { succeeds_after_call: 2, error_class: ErrorClass::CommandError, calls: AtomicUsize::new(0) },
            config,
        )
        .await;

        let results = dispatcher.dispatch(vec![device(1)], &job(), &JobModuleContext::probe(), CancelToken::new()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(!results[0].success, "CommandError is not dispatcher-retriable, so the single attempt must fail");
    }

    #[tokio::test]
    async fn a_cancelled_token_stops_the_retry_loop_after_the_in_flight_attempt() {
        let config = DispatcherConfig { thread_pool_size: 1, max_retries: 5, retry_backoff_seconds: 0 };
        let dispatcher = dispatcher_with(
            CountingModule { succeeds_after_call: 100, error_class: ErrorClass::TransientNetwork, calls: AtomicUsize::new(0) },
            config,
        )
        .await;

        let cancel = CancelToken::new();
        cancel.cancel();
        let results = dispatcher.dispatch(vec![device(1)], &job(), &JobModuleContext::probe(), cancel).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(!results[0].success, "a pre-cancelled token must not retry, so the first failure is terminal");
    }

    struct PanickingModule;

    #[async_trait]
    impl JobModule for PanickingModule {
        fn job_type(&self) -> &'static str {
            "panicking"
        }

        fn meta(&self) -> JobModuleMeta {
            JobModuleMeta { label: "Panicking".into(), icon: "panicking".into(), description: "test module".into() }
        }

        async fn run(&self, _device: &ResolvedDevice, _job_id: JobId, _ctx: &JobModuleContext) -> JobModuleOutcome {
            panic!("simulated unexpected failure inside a device task")
        }
    }

    #[tokio::test]
    async fn dispatch_surfaces_a_panicking_task_as_a_dispatcher_error() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(PanickingModule)).await.unwrap();
        let credentials = Arc::new(SingleCredential(credential()));
        let logs = in_memory_logs().await;
        let executor = Arc::new(Executor::new(Arc::new(registry), credentials, logs.clone()));
        let dispatcher = Dispatcher::new(executor, logs, DispatcherConfig::default());

        let mut job = job();
        job.job_type = "panicking".into();

        let err = dispatcher
            .dispatch(vec![device(1)], &job, &JobModuleContext::probe(), CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::TaskJoin(_)));
    }
}
