//! Built-in job-type modules registered by `JobRegistry::with_defaults`.

pub mod compliance;
pub mod config_backup;
pub mod reachability;

pub use compliance::ComplianceCheckModule;
pub use config_backup::ConfigBackupModule;
pub use reachability::ReachabilityModule;
