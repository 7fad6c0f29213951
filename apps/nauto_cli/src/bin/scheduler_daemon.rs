use anyhow::Result;
use nauto_cli::orchestrator;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let db_path = env_path("NAUTO_DB", "nauto.sqlite3");
    let interval = nauto_engine::config::scheduler_polling_interval();

    let store = orchestrator::open_store(&db_path).await?;
    let queue = orchestrator::open_queue()?;
    let scheduler = nauto_engine::Scheduler::new(store.jobs, queue);

    info!(db = %db_path.display(), interval_secs = interval.as_secs(), "starting scheduler daemon");

    loop {
        match scheduler.reconcile(chrono::Utc::now()).await {
            Ok(enqueued) if enqueued > 0 => info!(enqueued, "reconcile pass enqueued jobs"),
            Ok(_) => {}
            Err(err) => error!("reconcile pass failed: {err}"),
        }
        tokio::time::sleep(interval).await;
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}
