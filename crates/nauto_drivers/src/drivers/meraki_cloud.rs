use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};
use reqwest::Client;

use crate::{config, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

const MERAKI_BASE_URL: &str = "https://api.meraki.com/api/v1";

/// Cisco Meraki's dashboard is a cloud REST API, not an interactive CLI:
/// each "command" here is a dashboard API path relative to the device's
/// serial number, e.g. `devices/{serial}/clients`. The credential's
/// password field carries the dashboard API key (there is no separate
/// token variant in this model); username is unused by Meraki but kept
/// for symmetry with the other drivers.
pub struct MerakiCloudDriver {
    client: Client,
}

impl Default for MerakiCloudDriver {
    fn default() -> Self {
        let client = Client::builder()
            .timeout(config::http_timeout())
            .build()
            .expect("meraki reqwest client");
        Self { client }
    }
}

#[async_trait]
impl DeviceDriver for MerakiCloudDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::MerakiCloud
    }

    fn name(&self) -> &str {
        "Cisco Meraki Cloud"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        let serial = resolved
            .device
            .serial_number
            .clone()
            .ok_or_else(|| DriverError::Command("device has no Meraki serial number".into()))?;

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut session_log = String::new();
        for command in commands {
            let path = command.replace("{serial}", &serial);
            let url = format!("{MERAKI_BASE_URL}/devices/{serial}/{path}");

            let send = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", resolved.credential.password))
                .send();
            let resp = tokio::time::timeout(timeouts.connection_timeout, send)
                .await
                .map_err(|_| DriverError::Timeout(format!("meraki connect to {url}")))?
                .map_err(classify_reqwest_error)?;

            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| DriverError::Command(format!("read meraki body: {e}")))?;
            if !status.is_success() {
                return Err(classify_http_status(status.as_u16(), &body));
            }

            session_log.push_str(&format!("GET {url}\n{body}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output: body,
            });
        }

        Ok(DriverOutput { outcomes, session_log })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout(err.to_string())
    } else if err.is_connect() {
        DriverError::Unreachable(err.to_string())
    } else {
        DriverError::Command(err.to_string())
    }
}

fn classify_http_status(status: u16, body: &str) -> DriverError {
    match status {
        401 | 403 => DriverError::Auth(format!("meraki {status}: {body}")),
        429 | 500..=599 => DriverError::Unreachable(format!("meraki {status}: {body}")),
        _ => DriverError::Command(format!("meraki {status}: {body}")),
    }
}
