use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::job::JobId;

pub type LogId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Job,
    Connection,
    Session,
    System,
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogType::Job => "job",
            LogType::Connection => "connection",
            LogType::Session => "session",
            LogType::System => "system",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Stdout,
    File,
    Db,
    Channel,
}

/// A unified log record. `id` is assigned by the Log Pipeline's db sink on
/// insertion (monotonic, global tiebreaker per spec.md §5); records created
/// here carry `id: None` until persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Option<LogId>,
    pub timestamp: DateTime<Utc>,
    pub log_type: LogType,
    pub level: LogLevel,
    pub job_id: Option<JobId>,
    pub device_id: Option<DeviceId>,
    pub source: String,
    pub message: String,
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub destinations: HashSet<Destination>,
}

impl LogRecord {
    pub fn new(log_type: LogType, level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            id: None,
            timestamp: Utc::now(),
            log_type,
            level,
            job_id: None,
            device_id: None,
            source: source.into(),
            message: message.into(),
            meta: None,
            destinations: default_destinations(log_type, level),
        }
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Default sink set derived from `log_type`/`level` absent explicit
/// configuration overrides (spec.md §4.5). Every record goes to stdout and
/// db; errors/criticals additionally publish to the live channel so
/// subscribers see failures immediately.
fn default_destinations(_log_type: LogType, level: LogLevel) -> HashSet<Destination> {
    let mut set = HashSet::from([Destination::Stdout, Destination::Db, Destination::File]);
    if level >= LogLevel::Error {
        set.insert(Destination::Channel);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_level_records_default_to_channel_too() {
        let rec = LogRecord::new(LogType::Job, LogLevel::Error, "runner", "boom");
        assert!(rec.destinations.contains(&Destination::Channel));
        let rec = LogRecord::new(LogType::Job, LogLevel::Info, "runner", "ok");
        assert!(!rec.destinations.contains(&Destination::Channel));
    }

    #[test]
    fn level_ordering_follows_severity() {
        assert!(LogLevel::Critical > LogLevel::Error);
        assert!(LogLevel::Error > LogLevel::Warning);
        assert!(LogLevel::Warning > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Debug);
    }
}
