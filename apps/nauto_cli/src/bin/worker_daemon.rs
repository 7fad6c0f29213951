use anyhow::Result;
use nauto_cli::orchestrator;
use nauto_engine::JobQueue;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let db_path = env_path("NAUTO_DB", "nauto.sqlite3");
    let poll_interval = Duration::from_secs(5);

    let store = orchestrator::open_store(&db_path).await?;
    let runner = orchestrator::build_runner(&store).await;
    let queue = orchestrator::open_queue()?;

    info!(db = %db_path.display(), "starting worker daemon");

    loop {
        match queue.dequeue().await {
            Ok(Some((job_id, handle))) => {
                let ctx = orchestrator::job_module_context(store.pool.clone());
                match runner.run_job(job_id, &ctx).await {
                    Ok(status) => info!(job_id, %handle, %status, "job finished"),
                    Err(err) => error!(job_id, %handle, "job run failed: {err}"),
                }
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(err) => {
                error!("dequeue failed: {err}");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}
