//! Orchestrator configuration (spec.md §6), env-var driven the way
//! `nauto_drivers::config` exposes SSH/HTTP timeouts: each knob is a
//! lazily-computed static read once from its `NAUTO_*` variable, falling
//! back to a documented default rather than failing to start.

use once_cell::sync::Lazy;
use std::time::Duration;

const DEFAULT_POLLING_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 2;
const DEFAULT_THREAD_POOL_SIZE: usize = 5;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

static POLLING_INTERVAL: Lazy<Duration> =
    Lazy::new(|| env_duration("NAUTO_SCHEDULER_POLLING_INTERVAL_SECONDS", Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS)));

static MAX_RETRIES: Lazy<u32> = Lazy::new(|| env_parsed("NAUTO_SCHEDULER_MAX_RETRIES", DEFAULT_MAX_RETRIES));

static RETRY_BACKOFF: Lazy<u64> =
    Lazy::new(|| env_parsed("NAUTO_SCHEDULER_RETRY_BACKOFF_SECONDS", DEFAULT_RETRY_BACKOFF_SECS));

static THREAD_POOL_SIZE: Lazy<usize> = Lazy::new(|| env_parsed("NAUTO_WORKER_THREAD_POOL_SIZE", DEFAULT_THREAD_POOL_SIZE));

static CONNECTION_TIMEOUT: Lazy<Duration> =
    Lazy::new(|| env_duration("NAUTO_WORKER_CONNECTION_TIMEOUT_SECONDS", Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS)));

static REDACTION_PATTERNS: Lazy<Vec<String>> = Lazy::new(|| {
    std::env::var("NAUTO_WORKER_REDACTION_PATTERNS")
        .ok()
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
});

static ALLOW_LEGACY_KEX: Lazy<bool> = Lazy::new(|| env_bool("NAUTO_SSH_ALLOW_LEGACY_KEX", false));

static QUEUE_BACKEND_URL: Lazy<Option<String>> = Lazy::new(|| std::env::var("NAUTO_QUEUE_REDIS_URL").ok());

/// `scheduler.polling_interval_seconds`: how often the Scheduler reconciles.
pub fn scheduler_polling_interval() -> Duration {
    *POLLING_INTERVAL
}

/// `scheduler.max_retries` / `scheduler.retry_backoff_seconds`: fed
/// straight into [`crate::dispatcher::DispatcherConfig`].
pub fn dispatcher_config() -> crate::dispatcher::DispatcherConfig {
    crate::dispatcher::DispatcherConfig {
        thread_pool_size: *THREAD_POOL_SIZE,
        max_retries: *MAX_RETRIES,
        retry_backoff_seconds: *RETRY_BACKOFF,
    }
}

/// `worker.connection_timeout`: driver connect/command timeout.
pub fn connection_timeout() -> Duration {
    *CONNECTION_TIMEOUT
}

/// `worker.redaction.patterns`: extra Redactor keywords layered onto the
/// Redactor's (C2) built-in defaults.
pub fn extra_redaction_patterns() -> Vec<String> {
    REDACTION_PATTERNS.clone()
}

/// `ssh.allow_legacy_kex`: whether `nauto_drivers` may fall back to a
/// legacy key-exchange/MAC algorithm after a handshake failure.
pub fn ssh_allow_legacy_kex() -> bool {
    *ALLOW_LEGACY_KEX
}

/// `NAUTO_QUEUE_REDIS_URL`: when set, the Scheduler/Runner use
/// [`crate::queue::RedisJobQueue`]; otherwise they fall back to
/// [`crate::queue::FileJobQueue`].
pub fn queue_redis_url() -> Option<String> {
    QUEUE_BACKEND_URL.clone()
}

fn env_duration(var: &str, default: Duration) -> Duration {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(var: &str, default: bool) -> bool {
    std::env::var(var).ok().map(|v| matches!(v.as_str(), "1" | "true" | "yes")).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env_overrides() {
        assert!(scheduler_polling_interval().as_secs() > 0);
        assert!(dispatcher_config().thread_pool_size > 0);
        assert!(!ssh_allow_legacy_kex());
        assert!(extra_redaction_patterns().is_empty());
    }
}
