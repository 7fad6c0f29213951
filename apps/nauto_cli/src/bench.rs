use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use nauto_drivers::drivers::GenericSshDriver;
use nauto_drivers::DriverRegistry;
use nauto_engine::{Dispatcher, DispatcherConfig, Executor, JobModuleContext, JobRegistry};
use nauto_model::{Credential, Device, DeviceType, Job, JobStatus, ScheduleParams};
use nauto_security::{CredentialAttempt, CredentialRepository, ResolverError};
use nauto_store::{init_pool, LogPipeline, LogPipelineConfig};
use std::sync::Arc;
use std::time::Instant;

#[derive(Args)]
pub struct BenchCmd {
    #[arg(long, default_value_t = 1000)]
    pub devices: usize,
    #[arg(long, default_value_t = 100)]
    pub parallel: usize,
}

/// Static single-credential repository; every synthetic device shares the
/// `bench` tag so resolution always yields exactly one candidate.
struct BenchCredentials {
    credential: Credential,
}

#[async_trait]
impl CredentialRepository for BenchCredentials {
    async fn credentials_for_tags(&self, _tags: &[String]) -> Result<Vec<Credential>, ResolverError> {
        Ok(vec![self.credential.clone()])
    }

    async fn record_attempt(&self, _attempt: CredentialAttempt) -> Result<(), ResolverError> {
        Ok(())
    }
}

pub async fn run(cmd: BenchCmd) -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = init_pool("sqlite::memory:").await?;
    let logs = Arc::new(LogPipeline::new(
        pool,
        LogPipelineConfig {
            file_directory: dir.path().to_path_buf(),
            stdout_enabled: false,
            db_enabled: false,
            ..Default::default()
        },
    )?);

    let credentials = Arc::new(BenchCredentials {
        credential: Credential {
            id: 1,
            username: "bench".into(),
            password: "bench".into(),
            priority: 1,
            last_used: None,
            success_count: 0,
            failure_count: 0,
            description: None,
            is_system: false,
            tags: vec!["bench".into()],
        },
    });

    let registry = Arc::new(JobRegistry::with_defaults().await);
    let executor = Arc::new(Executor::new(registry, credentials, logs.clone()));
    let dispatcher = Dispatcher::new(
        executor,
        logs,
        DispatcherConfig { thread_pool_size: cmd.parallel.max(1), ..DispatcherConfig::default() },
    );

    let job = Job {
        id: 0,
        name: format!("bench-{}-{}", cmd.devices, cmd.parallel),
        job_type: "reachability".into(),
        is_enabled: true,
        schedule: ScheduleParams::Manual,
        parameters: serde_json::Value::Null,
        status: JobStatus::Running,
        is_system: false,
        tags: vec!["bench".into()],
        approval_id: None,
        created_at: chrono::Utc::now(),
    };

    let ctx = JobModuleContext {
        drivers: DriverRegistry::new(vec![Arc::new(GenericSshDriver::default())]),
        config_store: None,
        redaction_patterns: vec![],
        timeouts: nauto_drivers::CommandTimeouts::default(),
        parameters: serde_json::Value::Null,
    };

    let devices = build_devices(cmd.devices);
    let total = devices.len() as f64;

    let start = Instant::now();
    let results = dispatcher.dispatch(devices, &job, &ctx, nauto_engine::CancelToken::new()).await?;
    let elapsed = start.elapsed().as_secs_f64();
    let succeeded = results.iter().filter(|r| r.success).count();
    let throughput = if elapsed > 0.0 { total / elapsed } else { total };

    println!("Devices processed: {} ({} succeeded)", results.len(), succeeded);
    println!("Elapsed: {:.2}s", elapsed);
    println!("Throughput: {:.2} devices/sec", throughput);
    Ok(())
}

fn build_devices(count: usize) -> Vec<Device> {
    (0..count)
        .map(|i| Device {
            id: i as i64,
            hostname: format!("bench-{i}"),
            ip_address: format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff)
                .parse()
                .unwrap(),
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
            tags: vec!["bench".into()],
        })
        .collect()
}
