use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nauto_cli::{approvals, audit_log, bench, compliance, gitops, orchestrator, scheduler, transactions};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nauto", about = "Network automation orchestrator CLI")]
struct Cli {
    #[arg(long, default_value = "nauto.sqlite3", global = true)]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single persisted job to completion
    RunJob {
        #[arg(long)]
        job_id: i64,
        #[arg(long, help = "Append a JSON-lines summary of this run to the given file")]
        audit_log: Option<PathBuf>,
    },
    /// Run one scheduler reconcile pass and exit
    Reconcile,
    /// Store a credential securely
    Creds {
        #[arg(long)]
        username: String,
        #[arg(long, default_value_t = 100)]
        priority: u16,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(
            long,
            help = "Provide the password directly (not recommended; use only in CI)",
            conflicts_with_all = ["password_stdin", "password_prompt"]
        )]
        password: Option<String>,
        #[arg(long = "password-stdin", default_value_t = false, conflicts_with = "password_prompt")]
        password_stdin: bool,
        #[arg(long = "password-prompt", default_value_t = false)]
        password_prompt: bool,
    },
    /// Run compliance checks and export reports
    Compliance(compliance::ComplianceCmd),
    /// Preview cron-based schedules
    Schedule(scheduler::ScheduleCmd),
    /// Sync desired configs to a Git repository (GitOps)
    GitOps(gitops::GitOpsCmd),
    /// Manage the approval workflow gating scheduled enqueues
    Approvals(approvals::ApprovalsCmd),
    /// Run a synthetic benchmark against mock drivers
    Bench(bench::BenchCmd),
    /// Plan staged/canary rollout batches for a tag selection
    Transactions(transactions::TransactionsCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::RunJob { job_id, audit_log } => run_job(&cli.db, job_id, audit_log).await?,
        Commands::Reconcile => reconcile(&cli.db).await?,
        Commands::Creds { username, priority, description, tags, password, password_stdin, password_prompt } => {
            let password = resolve_password(password, password_stdin, password_prompt).context("password input")?;
            store_credential(&cli.db, username, password, priority, description, tags).await?
        }
        Commands::Compliance(cmd) => compliance::run(cmd)?,
        Commands::Schedule(cmd) => scheduler::run(cmd)?,
        Commands::GitOps(cmd) => gitops::run(cmd)?,
        Commands::Approvals(cmd) => approvals::run(cmd)?,
        Commands::Bench(cmd) => bench::run(cmd).await?,
        Commands::Transactions(cmd) => transactions::run(cmd)?,
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();
}

async fn run_job(db: &PathBuf, job_id: i64, audit_log_path: Option<PathBuf>) -> Result<()> {
    let store = orchestrator::open_store(db).await?;
    let runner = orchestrator::build_runner(&store).await;
    let ctx = orchestrator::job_module_context(store.pool.clone());

    info!(job_id, "running job");
    let status = runner.run_job(job_id, &ctx).await?;
    println!("job {job_id} finished: {status}");

    if let Some(path) = audit_log_path {
        let job = store.jobs.get_job(job_id).await?.context("job disappeared after running")?;
        let results = store.jobs.results_for_job(job_id).await?;
        audit_log::record(path, &job, &results)?;
    }
    Ok(())
}

async fn reconcile(db: &PathBuf) -> Result<()> {
    let store = orchestrator::open_store(db).await?;
    let queue = orchestrator::open_queue()?;
    let sched = nauto_engine::Scheduler::new(store.jobs, queue);
    let enqueued = sched.reconcile(chrono::Utc::now()).await?;
    println!("reconcile complete: {enqueued} job(s) enqueued");
    Ok(())
}

async fn store_credential(
    db: &PathBuf,
    username: String,
    password: String,
    priority: u16,
    description: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let store = orchestrator::open_store(db).await?;
    let id = store
        .credentials
        .insert_credential(&username, &password, priority, description.as_deref(), &tags)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("Stored credential {id} ({username})");
    Ok(())
}

fn resolve_password(password_flag: Option<String>, password_stdin: bool, password_prompt: bool) -> Result<String> {
    if let Some(value) = password_flag {
        eprintln!("warning: --password exposes secrets via argv; prefer --password-prompt or --password-stdin");
        return Ok(value);
    }
    if password_stdin {
        return read_password_from_stdin();
    }
    if password_prompt {
        return prompt_for_password();
    }
    if std::io::stdin().is_terminal() {
        return prompt_for_password();
    }
    bail!("stdin is not a TTY; provide --password-stdin for automation or --password-prompt to force interactive entry");
}

fn prompt_for_password() -> Result<String> {
    let password = rpassword::prompt_password("Credential password: ").context("reading password interactively")?;
    if password.is_empty() {
        bail!("password cannot be empty");
    }
    Ok(password)
}

fn read_password_from_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).context("reading password from stdin")?;
    let password = buffer.trim_end_matches(['\n', '\r']).to_string();
    if password.is_empty() {
        bail!("password from stdin cannot be empty");
    }
    Ok(password)
}
