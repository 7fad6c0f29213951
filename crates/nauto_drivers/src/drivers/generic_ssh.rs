use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};

use crate::{ssh, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

/// Vendor-agnostic fallback: a plain SSH session running each command in
/// order. Every other SSH-backed driver in this crate builds on the same
/// connect/exec primitives in `crate::ssh`.
#[derive(Default)]
pub struct GenericSshDriver;

#[async_trait]
impl DeviceDriver for GenericSshDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::GenericSsh
    }

    fn name(&self) -> &str {
        "Generic SSH CLI"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        let client = ssh::connect(
            resolved.device.ip_address,
            resolved.device.port,
            &resolved.credential,
            timeouts.connection_timeout,
        )
        .await?;

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut session_log = String::new();
        for command in commands {
            let output = tokio::time::timeout(timeouts.per_command_timeout, ssh::exec(&client, command))
                .await
                .map_err(|_| DriverError::Timeout(format!("command '{command}' timed out")))??;
            session_log.push_str(&format!("$ {command}\n{output}\n"));
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

    #[test]
    fn reports_generic_ssh_device_type() {
        let driver = GenericSshDriver::default();
        assert_eq!(driver.device_type(), DeviceType::GenericSsh);
        assert_eq!(driver.name(), "Generic SSH CLI");
    }
}
