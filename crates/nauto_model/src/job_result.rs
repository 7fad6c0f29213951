use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::device::DeviceId;
use crate::job::JobId;

pub type JobResultId = i64;

/// Per-device outcome of a JobExecution. Invariant: every dispatched
/// (device, job) pair produces exactly one row (spec.md §3, §8 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub id: Option<JobResultId>,
    pub job_id: JobId,
    pub device_id: DeviceId,
    pub success: bool,
    /// Structured, free-form per job type. Failure results carry
    /// `error_type` and `error_class` keys under this value rather than as
    /// dedicated columns, matching the schema in spec.md §6.
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Error classes referenced by spec.md §7. Not persisted as a column;
/// governs Executor/Dispatcher retry decisions and is recorded under
/// `details.error_class` for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    TransientNetwork,
    Authentication,
    ProtocolLegacyAlgorithm,
    CommandError,
    JobTypeContractViolation,
    NoCredentials,
    UnknownJobType,
    Storage,
}

impl ErrorClass {
    /// Retriable at the Executor level (try the next credential).
    pub fn retriable_by_credential(self) -> bool {
        matches!(self, ErrorClass::TransientNetwork | ErrorClass::Authentication)
    }

    /// Retriable at the Dispatcher level (try the whole task again) once
    /// all credentials for the current attempt are exhausted. Per spec.md
    /// §7, authentication failures are retriable by credential but not by
    /// the Dispatcher once credentials are exhausted.
    pub fn retriable_by_dispatcher(self) -> bool {
        matches!(self, ErrorClass::TransientNetwork)
    }
}

impl JobResult {
    pub fn success(job_id: JobId, device_id: DeviceId, details: serde_json::Value) -> Self {
        JobResult {
            id: None,
            job_id,
            device_id,
            success: true,
            details,
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        job_id: JobId,
        device_id: DeviceId,
        error_type: &str,
        class: Option<ErrorClass>,
        message: impl Into<String>,
    ) -> Self {
        let mut details = json!({
            "error_type": error_type,
            "error": message.into(),
        });
        if let Some(class) = class {
            details["error_class"] = json!(class);
        }
        JobResult {
            id: None,
            job_id,
            device_id,
            success: false,
            details,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate view over a completed job's results: how many devices
/// succeeded out of the full per-device result set.
pub fn success_count(results: &[JobResult]) -> usize {
    results.iter().filter(|r| r.success).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_details_carry_error_type_and_class() {
        let r = JobResult::failure(1, 10, "NO_CREDENTIALS", None, "no matching credential");
        assert!(!r.success);
        assert_eq!(r.details["error_type"], "NO_CREDENTIALS");
    }

    #[test]
    fn success_count_counts_only_successes() {
        let results = vec![
            JobResult::success(1, 10, json!({})),
            JobResult::failure(1, 11, "X", None, "boom"),
        ];
        assert_eq!(success_count(&results), 1);
    }
}
