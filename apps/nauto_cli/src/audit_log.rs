use anyhow::Result;
use nauto_model::{Job, JobResult};
use serde::Serialize;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Serialize)]
struct AuditRecord<'a> {
    job_id: i64,
    job_name: &'a str,
    total: usize,
    succeeded: usize,
    failed: usize,
    failed_devices: Vec<i64>,
}

#[derive(Serialize)]
struct DeviceAuditRecord<'a> {
    job_id: i64,
    device_id: i64,
    success: bool,
    details: &'a serde_json::Value,
}

/// Appends one summary line plus one per-device line for a completed job's
/// results. A file-sink audit trail alongside the Log Pipeline (C5), which
/// this does not replace: the Log Pipeline is the core's own record,
/// this is a collaborator-owned export in a deliberately flat format.
pub fn record(path: PathBuf, job: &Job, results: &[JobResult]) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }

    let succeeded = nauto_model::success_count(results);
    let record = AuditRecord {
        job_id: job.id,
        job_name: &job.name,
        total: results.len(),
        succeeded,
        failed: results.len().saturating_sub(succeeded),
        failed_devices: results.iter().filter(|r| !r.success).map(|r| r.device_id).collect(),
    };

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", serde_json::to_string(&record)?)?;

    let device_path = device_log_path(&path);
    if let Some(dir) = device_path.parent() {
        create_dir_all(dir)?;
    }
    let mut device_file = OpenOptions::new().create(true).append(true).open(device_path)?;
    for result in results {
        let record = DeviceAuditRecord {
            job_id: job.id,
            device_id: result.device_id,
            success: result.success,
            details: &result.details,
        };
        writeln!(device_file, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}

fn device_log_path(base: &PathBuf) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("audit");
    let device_name = format!("{stem}.devices.jsonl");
    base.with_file_name(device_name)
}
