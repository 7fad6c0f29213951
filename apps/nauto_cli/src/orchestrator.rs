//! Shared wiring between the `nauto` CLI and the two long-running daemon
//! binaries (`scheduler_daemon`, `worker_daemon`): opening the SQLite-backed
//! core collaborators and assembling a job's `JobModuleContext`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use nauto_drivers::drivers::{
    AristaEosDriver, CiscoIosDriver, CiscoNxosApiDriver, GenericSshDriver, JuniperJunosDriver, MerakiCloudDriver,
    MockDriver,
};
use nauto_drivers::{CommandTimeouts, DriverRegistry};
use nauto_model::DeviceType;
use nauto_engine::{Dispatcher, Executor, FileJobQueue, JobModuleContext, JobQueue, JobRegistry, RedisJobQueue, Runner};
use nauto_security::CredentialCipher;
use nauto_store::{init_pool, ConfigStore, JobRepository, LogPipeline, LogPipelineConfig, SqliteCredentialRepository};
use sqlx::SqlitePool;

pub struct Store {
    pub pool: SqlitePool,
    pub jobs: Arc<JobRepository>,
    pub credentials: Arc<SqliteCredentialRepository>,
    pub logs: Arc<LogPipeline>,
}

pub async fn open_store(db: &Path) -> Result<Store> {
    let url = format!("sqlite://{}?mode=rwc", db.display());
    let pool = init_pool(&url).await.context("opening orchestrator database")?;
    let cipher = CredentialCipher::from_env_or_keyring().context("resolving credential master key")?;
    let jobs = Arc::new(JobRepository::new(pool.clone()));
    let credentials = Arc::new(SqliteCredentialRepository::new(pool.clone(), cipher));
    let logs = Arc::new(LogPipeline::new(pool.clone(), LogPipelineConfig::default())?);
    Ok(Store { pool, jobs, credentials, logs })
}

pub fn driver_registry() -> DriverRegistry {
    if std::env::var("NAUTO_USE_MOCK_DRIVERS").as_deref() == Ok("1") {
        return DriverRegistry::new(
            [
                DeviceType::CiscoIos,
                DeviceType::JuniperJunos,
                DeviceType::GenericSsh,
                DeviceType::AristaEos,
                DeviceType::CiscoNxosApi,
                DeviceType::MerakiCloud,
            ]
            .into_iter()
            .map(|dt| Arc::new(MockDriver::new(dt)) as _)
            .collect(),
        );
    }
    DriverRegistry::new(vec![
        Arc::new(CiscoIosDriver::default()),
        Arc::new(JuniperJunosDriver::default()),
        Arc::new(GenericSshDriver::default()),
        Arc::new(AristaEosDriver::default()),
        Arc::new(CiscoNxosApiDriver::default()),
        Arc::new(MerakiCloudDriver::default()),
    ])
}

pub fn job_module_context(pool: SqlitePool) -> JobModuleContext {
    JobModuleContext {
        drivers: driver_registry(),
        config_store: Some(Arc::new(ConfigStore::new(pool))),
        redaction_patterns: nauto_engine::config::extra_redaction_patterns(),
        timeouts: CommandTimeouts {
            connection_timeout: nauto_engine::config::connection_timeout(),
            ..CommandTimeouts::default()
        },
        parameters: serde_json::Value::Null,
    }
}

pub async fn build_runner(store: &Store) -> Runner {
    let registry = Arc::new(JobRegistry::with_defaults().await);
    let executor = Arc::new(Executor::new(registry, store.credentials.clone(), store.logs.clone()));
    let dispatcher = Arc::new(Dispatcher::new(executor, store.logs.clone(), nauto_engine::config::dispatcher_config()));
    Runner::new(store.jobs.clone(), store.credentials.clone(), dispatcher, store.logs.clone())
}

pub fn open_queue() -> Result<Arc<dyn JobQueue>> {
    Ok(match nauto_engine::config::queue_redis_url() {
        Some(url) => Arc::new(RedisJobQueue::new(&url, "nauto:jobs")?),
        None => Arc::new(FileJobQueue::new("queue/jobs.jsonl")),
    })
}
