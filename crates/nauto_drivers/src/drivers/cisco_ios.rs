use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};
use tracing::debug;

use crate::{ssh, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

#[derive(Default)]
pub struct CiscoIosDriver;

#[async_trait]
impl DeviceDriver for CiscoIosDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::CiscoIos
    }

    fn name(&self) -> &str {
        "Cisco IOS CLI"
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
            debug!(target: "drivers::cisco_ios", device = resolved.device.hostname, %command, "executing");
            let output = tokio::time::timeout(timeouts.per_command_timeout, ssh::exec(&client, command))
                .await
                .map_err(|_| DriverError::Timeout(format!("command '{command}' timed out")))??;
            session_log.push_str(&format!("{command}\n{output}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output,
            });
        }

        Ok(DriverOutput { outcomes, session_log })
    }
}
