use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{config, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

/// NX-API (Cisco's REST/JSON-RPC management interface for NX-OS). One
/// `cli_show` request per command, sent sequentially against the same
/// `sid` so the switch keeps them in one logical session.
pub struct CiscoNxosApiDriver {
    client: Client,
}

impl Default for CiscoNxosApiDriver {
    fn default() -> Self {
        let client = Client::builder()
            .timeout(config::http_timeout())
            .build()
            .expect("nx-api reqwest client");
        Self { client }
    }
}

#[async_trait]
impl DeviceDriver for CiscoNxosApiDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::CiscoNxosApi
    }

    fn name(&self) -> &str {
        "Cisco NX-OS API"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        let endpoint = format!(
            "https://{}:{}/ins",
            resolved.device.ip_address, resolved.device.port
        );

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut session_log = String::new();
        for command in commands {
            let payload = json!({
                "ins_api": {
                    "version": "1.2",
                    "type": "cli_show",
                    "chunk": "0",
                    "sid": "1",
                    "input": command,
                    "output_format": "json"
                }
            });

            let send = self
                .client
                .post(&endpoint)
                .basic_auth(&resolved.credential.username, Some(&resolved.credential.password))
                .json(&payload)
                .send();
            let resp = tokio::time::timeout(timeouts.connection_timeout, send)
                .await
                .map_err(|_| DriverError::Timeout(format!("nx-api connect to {endpoint}")))?
                .map_err(classify_reqwest_error)?;

            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| DriverError::Command(format!("read nx-api body: {e}")))?;
            if !status.is_success() {
                return Err(classify_http_status(status.as_u16(), &body));
            }

            let envelope: NxapiEnvelope = serde_json::from_str(&body)
                .map_err(|e| DriverError::Command(format!("parse nx-api JSON: {e}")))?;
            if let Some(error) = envelope.ins_api.outputs.body_error() {
                return Err(DriverError::Command(format!(
                    "nx-api command '{command}' failed: {error}"
                )));
            }
            let output = envelope.ins_api.outputs.body_text();
            session_log.push_str(&format!("{command}\n{output}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output,
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
        401 | 403 => DriverError::Auth(format!("nx-api {status}: {body}")),
        _ => DriverError::Command(format!("nx-api {status}: {body}")),
    }
}

#[derive(Debug, Deserialize)]
struct NxapiEnvelope {
    ins_api: InsApi,
}

#[derive(Debug, Deserialize)]
struct InsApi {
    outputs: Outputs,
}

/// NX-API wraps a single command's output in `outputs.output`, but under
/// chunked/multi-command requests returns `outputs.output` as an array.
/// This driver sends one command per request, so only the single-value
/// shape is ever produced, but both are accepted defensively.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Outputs {
    Single { output: OutputBody },
    Many { output: Vec<OutputBody> },
}

#[derive(Debug, Deserialize)]
struct OutputBody {
    body: Option<serde_json::Value>,
    msg: Option<String>,
    code: Option<String>,
}

impl Outputs {
    fn first(&self) -> &OutputBody {
        match self {
            Outputs::Single { output } => output,
            Outputs::Many { output } => &output[0],
        }
    }

    fn body_text(&self) -> String {
        let entry = self.first();
        entry
            .body
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| entry.msg.clone().unwrap_or_default())
    }

    fn body_error(&self) -> Option<String> {
        let entry = self.first();
        match entry.code.as_deref() {
            Some(code) if code != "200" => Some(format!(
                "{code}: {}",
                entry.msg.clone().unwrap_or_default()
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_nxos_device_type() {
        let driver = CiscoNxosApiDriver::default();
        assert_eq!(driver.device_type(), DeviceType::CiscoNxosApi);
    }

    #[test]
    fn parses_single_output_envelope() {
        let body = r#"{"ins_api":{"outputs":{"output":{"body":{"k":"v"},"msg":"Success","code":"200"}}}}"#;
        let envelope: NxapiEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.ins_api.outputs.body_error().is_none());
        assert_eq!(envelope.ins_api.outputs.body_text(), r#"{"k":"v"}"#);
    }

    #[test]
    fn surfaces_non_200_code_as_error() {
        let body = r#"{"ins_api":{"outputs":{"output":{"body":null,"msg":"bad command","code":"400"}}}}"#;
        let envelope: NxapiEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(
            envelope.ins_api.outputs.body_error(),
            Some("400: bad command".to_string())
        );
    }
}
