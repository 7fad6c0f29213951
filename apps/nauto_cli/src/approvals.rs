use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// A standalone, file-backed approval workflow gating the Scheduler's
/// enqueue decision. The core never reads or writes these records
/// (spec.md §9); a held approval simply means the collaborator does not
/// call `reconcile`/`run-job` for that job yet.
#[derive(Args)]
pub struct ApprovalsCmd {
    #[command(subcommand)]
    pub action: ApprovalsAction,
    #[arg(long, default_value = "approvals/approvals.json")]
    pub store: PathBuf,
}

#[derive(Subcommand)]
pub enum ApprovalsAction {
    Request {
        #[arg(long)]
        job_id: i64,
        #[arg(long)]
        requested_by: String,
        #[arg(long)]
        note: Option<String>,
    },
    Approve {
        #[arg(long)]
        id: String,
        #[arg(long)]
        approver: String,
    },
    List,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ApprovalRecord {
    id: Uuid,
    job_id: i64,
    requested_by: String,
    note: Option<String>,
    status: ApprovalStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
enum ApprovalStatus {
    Pending,
    Approved,
}

pub fn run(cmd: ApprovalsCmd) -> Result<()> {
    let mut store = ApprovalStore::load(&cmd.store)?;
    match cmd.action {
        ApprovalsAction::Request { job_id, requested_by, note } => {
            let record = store.add_request(job_id, requested_by, note);
            store.save(&cmd.store)?;
            println!("Approval requested: {} (job {job_id})", record.id);
        }
        ApprovalsAction::Approve { id, approver } => {
            store.approve(&id, approver)?;
            store.save(&cmd.store)?;
            println!("Approved {}", id);
        }
        ApprovalsAction::List => {
            for record in &store.records {
                println!("{} | job {} | {:?} | {}", record.id, record.job_id, record.status, record.requested_by);
            }
        }
    }
    Ok(())
}

struct ApprovalStore {
    records: Vec<ApprovalRecord>,
}

impl ApprovalStore {
    fn load(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self { records: Vec::new() });
        }
        let content = fs::read_to_string(path)?;
        let records = serde_json::from_str(&content)?;
        Ok(Self { records })
    }

    fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, body)?;
        Ok(())
    }

    fn add_request(&mut self, job_id: i64, requested_by: String, note: Option<String>) -> ApprovalRecord {
        let record = ApprovalRecord { id: Uuid::new_v4(), job_id, requested_by, note, status: ApprovalStatus::Pending };
        self.records.push(record.clone());
        record
    }

    fn approve(&mut self, id: &str, approver: String) -> Result<()> {
        let uuid = Uuid::parse_str(id).context("invalid approval id")?;
        for record in &mut self.records {
            if record.id == uuid {
                record.status = ApprovalStatus::Approved;
                record.note.get_or_insert_with(|| format!("Approved by {approver}"));
                return Ok(());
            }
        }
        anyhow::bail!("approval ID {} not found", id);
    }
}
