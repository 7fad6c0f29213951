use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};

use crate::{CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

/// In-process driver used by tests and `NAUTO_USE_MOCK_DRIVERS=1` runs so
/// the engine can be exercised without real network gear. A device tagged
/// `mock:fail` fails every command; the literal command strings `"fail"`
/// and `"timeout"` simulate a command error and a per-command timeout
/// respectively.
pub struct MockDriver {
    device_type: DeviceType,
}

impl MockDriver {
    pub fn new(device_type: DeviceType) -> Self {
        Self { device_type }
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn name(&self) -> &str {
        "Mock Driver"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        if resolved.device.has_tag("mock:fail") {
            return Err(DriverError::Command(format!(
                "simulated failure for {}",
                resolved.device.hostname
            )));
        }

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut session_log = String::new();
        for command in commands {
            if command == "timeout" {
                return Err(DriverError::Timeout(format!(
                    "simulated timeout after {:?}",
                    timeouts.per_command_timeout
                )));
            }
            if command == "fail" {
                return Err(DriverError::Command("simulated command failure".into()));
            }
            let output = format!("mock output for {command}");
            session_log.push_str(&format!("{command}\n{output}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output,
            });
        }

        Ok(DriverOutput { outcomes, session_log })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nauto_model::{Credential, Device};
    use std::net::IpAddr;

    fn device(tags: Vec<String>) -> ResolvedDevice {
        ResolvedDevice::new(
            Device {
                id: 1,
                hostname: "mock1".into(),
                ip_address: "127.0.0.1".parse::<IpAddr>().unwrap(),
                device_type: DeviceType::GenericSsh,
                port: 22,
                description: None,
                serial_number: None,
                model: None,
                source: None,
                notes: None,
                last_updated: None,
                updated_by: None,
                created_at: chrono::Utc::now(),
                tags,
            },
            Credential {
                id: 1,
                username: "admin".into(),
                password: "x".into(),
                priority: 0,
                last_used: None,
                success_count: 0,
                failure_count: 0,
                description: None,
                is_system: false,
                tags: vec![],
            },
        )
    }

    #[tokio::test]
    async fn tagged_device_fails_every_command() {
        let driver = MockDriver::new(DeviceType::GenericSsh);
        let resolved = device(vec!["mock:fail".into()]);
        let result = driver
            .run_commands(&resolved, &["show version".into()], &CommandTimeouts::default())
            .await;
        assert!(matches!(result, Err(DriverError::Command(_))));
    }

    #[tokio::test]
    async fn fail_command_simulates_command_error() {
        let driver = MockDriver::new(DeviceType::GenericSsh);
        let resolved = device(vec![]);
        let result = driver
            .run_commands(&resolved, &["fail".into()], &CommandTimeouts::default())
            .await;
        assert!(matches!(result, Err(DriverError::Command(_))));
    }

    #[tokio::test]
    async fn ordinary_commands_return_per_command_output() {
        let driver = MockDriver::new(DeviceType::GenericSsh);
        let resolved = device(vec![]);
        let output = driver
            .run_commands(
                &resolved,
                &["show version".into()],
                &CommandTimeouts::default(),
            )
            .await
            .unwrap();
        assert_eq!(output.outcomes.len(), 1);
        assert!(output.output_for("show version").unwrap().contains("show version"));
    }
}
