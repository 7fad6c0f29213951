use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = i64;

/// PENDING → QUEUED → RUNNING → one terminal status. Terminal statuses are
/// absorbing; re-enqueueing the same Job re-enters QUEUED (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    CompletedSuccess,
    CompletedPartialFailure,
    CompletedFailure,
    CompletedNoDevices,
    CompletedNoCredentials,
    FailedUnexpected,
    FailedDispatcherError,
    FailedCredentialResolution,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Queued | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::CompletedSuccess => "completed_success",
            JobStatus::CompletedPartialFailure => "completed_partial_failure",
            JobStatus::CompletedFailure => "completed_failure",
            JobStatus::CompletedNoDevices => "completed_no_devices",
            JobStatus::CompletedNoCredentials => "completed_no_credentials",
            JobStatus::FailedUnexpected => "failed_unexpected",
            JobStatus::FailedDispatcherError => "failed_dispatcher_error",
            JobStatus::FailedCredentialResolution => "failed_credential_resolution",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed_success" => Ok(JobStatus::CompletedSuccess),
            "completed_partial_failure" => Ok(JobStatus::CompletedPartialFailure),
            "completed_failure" => Ok(JobStatus::CompletedFailure),
            "completed_no_devices" => Ok(JobStatus::CompletedNoDevices),
            "completed_no_credentials" => Ok(JobStatus::CompletedNoCredentials),
            "failed_unexpected" => Ok(JobStatus::FailedUnexpected),
            "failed_dispatcher_error" => Ok(JobStatus::FailedDispatcherError),
            "failed_credential_resolution" => Ok(JobStatus::FailedCredentialResolution),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Interval,
    Cron,
    Onetime,
    Manual,
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleKind::Interval => "interval",
            ScheduleKind::Cron => "cron",
            ScheduleKind::Onetime => "onetime",
            ScheduleKind::Manual => "manual",
        };
        f.write_str(s)
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interval" => Ok(ScheduleKind::Interval),
            "cron" => Ok(ScheduleKind::Cron),
            "onetime" => Ok(ScheduleKind::Onetime),
            "manual" => Ok(ScheduleKind::Manual),
            other => Err(format!("unknown schedule kind: {other}")),
        }
    }
}

/// Kind-specific schedule parameters, persisted as the `schedule_params`
/// JSON column alongside the plain `schedule_kind` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleParams {
    Interval { every_seconds: u64 },
    Cron { expression: String },
    Onetime { at: DateTime<Utc> },
    Manual,
}

impl ScheduleParams {
    pub fn kind(&self) -> ScheduleKind {
        match self {
            ScheduleParams::Interval { .. } => ScheduleKind::Interval,
            ScheduleParams::Cron { .. } => ScheduleKind::Cron,
            ScheduleParams::Onetime { .. } => ScheduleKind::Onetime,
            ScheduleParams::Manual => ScheduleKind::Manual,
        }
    }
}

/// A persisted job definition: job-type key, schedule, and target tags.
/// Owned by the collaborator; the core reads it and updates `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Must correspond to a module registered in the Job Registry (C6).
    pub job_type: String,
    pub is_enabled: bool,
    pub schedule: ScheduleParams,
    /// Free-form, job-type-specific parameters (e.g. commands to run).
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub status: JobStatus,
    /// Protected: the collaborator boundary rejects delete/disable; the
    /// core only honors this flag when rendering status (spec.md §9).
    pub is_system: bool,
    /// Tags selecting target devices.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Collaborator-owned approval workflow reference; the core never reads
    /// or enforces this (spec.md §9) — a held approval just means the
    /// collaborator withholds the Scheduler enqueue.
    #[serde(default)]
    pub approval_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A compliance rule evaluated by the `compliance_check` job module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub name: String,
    pub description: String,
    pub expression: String,
}

/// One run of a Job. Not a separate persisted table per spec.md §3 (it is
/// the logical envelope around `started_at`/`finished_at`/terminal status
/// that a run of the Runner produces); tracked in-process and surfaced
/// through Log records and the Job row's own status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub job_id: JobId,
    pub execution_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_kind_roundtrips() {
        for kind in [
            ScheduleKind::Interval,
            ScheduleKind::Cron,
            ScheduleKind::Onetime,
            ScheduleKind::Manual,
        ] {
            assert_eq!(ScheduleKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::CompletedSuccess.is_terminal());
        assert!(JobStatus::FailedCredentialResolution.is_terminal());
    }
}
