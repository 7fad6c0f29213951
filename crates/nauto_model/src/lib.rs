//! Core data model for the NetRaven Job Orchestration Core: the entities
//! shared across every other crate in this workspace (Device, Credential,
//! Tag, Job, JobResult, Log, DeviceConfiguration) plus the pure Redactor.

pub mod credential;
pub mod device;
pub mod device_configuration;
pub mod job;
pub mod job_result;
pub mod log;
pub mod redact;
pub mod resolved;
pub mod tag;

pub use credential::{Credential, CredentialAttempt, CredentialId};
pub use device::{Device, DeviceId, DeviceType, TagId};
pub use device_configuration::{hash_config, ConfigurationId, DeviceConfiguration};
pub use job::{ComplianceRule, Job, JobExecution, JobId, JobStatus, ScheduleKind, ScheduleParams};
pub use job_result::{success_count, ErrorClass, JobResult, JobResultId};
pub use log::{Destination, LogId, LogLevel, LogRecord, LogType};
pub use redact::{redact, DEFAULT_PATTERNS};
pub use resolved::ResolvedDevice;
pub use tag::{shares_tag, Tag, DEFAULT_TAG};
