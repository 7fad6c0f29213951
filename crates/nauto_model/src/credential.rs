use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CredentialId = i64;

/// A resolved credential, plaintext in memory for the duration of a driver
/// session. Never logged or serialized verbatim — see the custom `Debug`
/// impl below, mirroring the masking convention the rest of the model uses
/// for secret-bearing variants.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub username: String,
    pub password: String,
    /// 1–1000; lower wins.
    pub priority: u16,
    pub last_used: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub description: Option<String>,
    pub is_system: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"******")
            .field("priority", &self.priority)
            .field("last_used", &self.last_used)
            .field("success_count", &self.success_count)
            .field("failure_count", &self.failure_count)
            .field("is_system", &self.is_system)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Outcome of a single credential attempt against a device, recorded by the
/// Credential Resolver (C3) as a side effect of every Executor attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialAttempt {
    pub credential_id: CredentialId,
    pub device_id: crate::device::DeviceId,
    pub job_id: crate::job::JobId,
    pub success: bool,
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
