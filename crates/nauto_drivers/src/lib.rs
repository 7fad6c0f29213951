//! Device Driver (C1): opens one session to a device, runs commands, and
//! returns raw output. Vendor-agnostic at the trait boundary; vendor
//! transport specifics (SSH, NETCONF, REST) live behind individual
//! implementations.

pub mod config;
pub mod drivers;
pub mod platform;
pub mod ssh;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nauto_model::{ErrorClass, ResolvedDevice};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("session error: {0}")]
    Session(String),
}

impl DriverError {
    /// Maps the driver's typed error onto the error taxonomy Executor/
    /// Dispatcher use to decide retries (spec.md §7).
    pub fn error_class(&self) -> ErrorClass {
        match self {
            DriverError::Auth(_) => ErrorClass::Authentication,
            DriverError::Unreachable(_) | DriverError::Timeout(_) => ErrorClass::TransientNetwork,
            DriverError::Command(_) => ErrorClass::CommandError,
            DriverError::Session(_) => ErrorClass::ProtocolLegacyAlgorithm,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandTimeouts {
    pub connection_timeout: Duration,
    pub per_command_timeout: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        CommandTimeouts {
            connection_timeout: Duration::from_secs(30),
            per_command_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-session algorithm allow-list, honored by SSH-based drivers
/// (spec.md §4.1, configuration row `ssh.allow_legacy_kex`).
#[derive(Debug, Clone, Default)]
pub struct SshAlgorithmPolicy {
    pub allow_legacy_kex: bool,
    pub legacy_kex: Vec<String>,
    pub legacy_macs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub output: String,
}

/// Result of `run_commands`: per-command output plus a verbatim session
/// transcript (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct DriverOutput {
    pub outcomes: Vec<CommandOutcome>,
    pub session_log: String,
}

impl DriverOutput {
    pub fn output_for(&self, command: &str) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| o.command == command)
            .map(|o| o.output.as_str())
    }
}

#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn device_type(&self) -> nauto_model::DeviceType;
    fn name(&self) -> &str;

    /// Single operation (spec.md §4.1): opens one session to
    /// `resolved.device` using `resolved.credential`, runs `commands` in
    /// order, returns per-command output and a verbatim transcript.
    /// Emits no logs itself — the Executor logs around this call.
    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError>;
}

pub type DynDeviceDriver = Arc<dyn DeviceDriver>;

#[derive(Clone)]
pub struct DriverRegistry {
    drivers: Vec<DynDeviceDriver>,
}

impl DriverRegistry {
    pub fn new(drivers: Vec<DynDeviceDriver>) -> Self {
        DriverRegistry { drivers }
    }

    pub fn find(&self, device_type: &nauto_model::DeviceType) -> Option<DynDeviceDriver> {
        self.drivers
            .iter()
            .find(|d| d.device_type() == *device_type)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::drivers::{
        AristaEosDriver, CiscoIosDriver, CiscoNxosApiDriver, GenericSshDriver, JuniperJunosDriver,
        MerakiCloudDriver,
    };
    use super::*;
    use nauto_model::DeviceType;

    #[test]
    fn registry_finds_driver_by_device_type() {
        let registry = DriverRegistry::new(vec![
            Arc::new(GenericSshDriver::default()),
            Arc::new(CiscoIosDriver::default()),
            Arc::new(JuniperJunosDriver::default()),
            Arc::new(AristaEosDriver::default()),
            Arc::new(CiscoNxosApiDriver::default()),
            Arc::new(MerakiCloudDriver::default()),
        ]);
        assert!(registry.find(&DeviceType::CiscoIos).is_some());
        assert!(registry.find(&DeviceType::MerakiCloud).is_some());
        assert_eq!(
            registry.find(&DeviceType::CiscoIos).unwrap().name(),
            "Cisco IOS CLI"
        );
    }

    #[test]
    fn error_classes_match_retry_taxonomy() {
        assert_eq!(
            DriverError::Unreachable("x".into()).error_class(),
            ErrorClass::TransientNetwork
        );
        assert_eq!(DriverError::Auth("x".into()).error_class(), ErrorClass::Authentication);
        assert_eq!(DriverError::Command("x".into()).error_class(), ErrorClass::CommandError);
    }
}
