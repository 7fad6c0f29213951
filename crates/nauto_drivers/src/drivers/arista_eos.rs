use std::time::Duration;

use async_ssh2_tokio::Client;
use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::{config, ssh, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

/// Dual-transport EOS driver: plain SSH by default, eAPI (JSON-RPC over
/// HTTPS) when the device carries a `transport:eapi` tag or its mgmt
/// address already looks like a URL. eAPI calls retry with linear
/// backoff; SSH calls do not (the SSH session itself owns retry/backoff
/// at the connection layer via `ssh::connect`).
pub struct AristaEosDriver {
    http: HttpClient,
}

impl Default for AristaEosDriver {
    fn default() -> Self {
        let http = HttpClient::builder()
            .timeout(config::http_timeout())
            .build()
            .expect("eAPI reqwest client");
        Self { http }
    }
}

#[async_trait]
impl DeviceDriver for AristaEosDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::AristaEos
    }

    fn name(&self) -> &str {
        "Arista EOS CLI"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        match self.transport(resolved) {
            Transport::Ssh => self.run_via_ssh(resolved, commands, timeouts).await,
            Transport::Eapi => self.run_via_eapi(resolved, commands).await,
        }
    }
}

impl AristaEosDriver {
    fn transport(&self, resolved: &ResolvedDevice) -> Transport {
        let mgmt = resolved.device.ip_address.to_string();
        if resolved
            .device
            .tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case("transport:eapi"))
            || mgmt.starts_with("http://")
            || mgmt.starts_with("https://")
        {
            Transport::Eapi
        } else {
            Transport::Ssh
        }
    }

    async fn run_via_ssh(
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
            let output = exec_checked(&client, command, timeouts.per_command_timeout).await?;
            session_log.push_str(&format!("{command}\n{output}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output,
            });
        }
        Ok(DriverOutput { outcomes, session_log })
    }

    async fn run_via_eapi(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
    ) -> Result<DriverOutput, DriverError> {
        let endpoint = self.eapi_endpoint(resolved);
        let mut payload = vec!["enable".to_string()];
        payload.extend(commands.iter().cloned());
        let response = self
            .eapi_post(&endpoint, payload, &resolved.credential)
            .await?;

        let outcomes: Vec<CommandOutcome> = commands
            .iter()
            .enumerate()
            .map(|(idx, command)| CommandOutcome {
                command: command.clone(),
                output: response.output_at(idx + 1).unwrap_or_else(|| "ok".into()),
            })
            .collect();
        let session_log = response.raw.clone();
        Ok(DriverOutput { outcomes, session_log })
    }

    async fn eapi_post(
        &self,
        endpoint: &str,
        commands: Vec<String>,
        credential: &nauto_model::Credential,
    ) -> Result<EapiResponse, DriverError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "runCmds",
            "params": {
                "version": 1,
                "cmds": commands,
                "format": "json"
            },
            "id": "netraven"
        });

        let retry_limit = config::http_retry_limit();
        for attempt in 0..=retry_limit {
            match self
                .http
                .post(endpoint)
                .basic_auth(&credential.username, Some(&credential.password))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| DriverError::Command(format!("read eAPI body: {e}")))?;
                    if !status.is_success() {
                        return Err(classify_http_status(status.as_u16(), &body));
                    }
                    let parsed: RawEapiEnvelope = serde_json::from_str(&body)
                        .map_err(|e| DriverError::Command(format!("parse eAPI JSON: {e}")))?;
                    if let Some(err) = parsed.error {
                        return Err(DriverError::Command(format!(
                            "eAPI error {}: {}",
                            err.code, err.message
                        )));
                    }
                    return Ok(EapiResponse { raw: body, parsed });
                }
                Err(err) => {
                    if attempt < retry_limit {
                        warn!(target: "drivers::arista", attempt, %err, "retrying eAPI call");
                        tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(DriverError::Unreachable(format!("eAPI request: {err}")));
                }
            }
        }
        unreachable!("eAPI retry loop always returns")
    }

    fn eapi_endpoint(&self, resolved: &ResolvedDevice) -> String {
        let mgmt = resolved.device.ip_address.to_string();
        if mgmt.starts_with("http://") || mgmt.starts_with("https://") {
            format!("{}/command-api", mgmt.trim_end_matches('/'))
        } else {
            format!("https://{mgmt}:{}/command-api", resolved.device.port)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Ssh,
    Eapi,
}

async fn exec_checked(
    client: &Client,
    command: &str,
    timeout: Duration,
) -> Result<String, DriverError> {
    tokio::time::timeout(timeout, ssh::exec(client, command))
        .await
        .map_err(|_| DriverError::Timeout(format!("command '{command}' timed out")))?
}

fn classify_http_status(status: u16, body: &str) -> DriverError {
    match status {
        401 | 403 => DriverError::Auth(format!("eAPI {status}: {body}")),
        408 | 504 => DriverError::Timeout(format!("eAPI {status}: {body}")),
        _ => DriverError::Command(format!("eAPI {status}: {body}")),
    }
}

struct EapiResponse {
    raw: String,
    parsed: RawEapiEnvelope,
}

impl EapiResponse {
    /// `index` is 1-based: index 0 of `result` is always the implicit
    /// `enable` command this driver prepends.
    fn output_at(&self, index: usize) -> Option<String> {
        self.parsed
            .result
            .as_ref()?
            .get(index)?
            .as_object()?
            .get("output")?
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct RawEapiEnvelope {
    result: Option<Vec<Value>>,
    error: Option<EapiError>,
}

#[derive(Debug, Deserialize)]
struct EapiError {
    code: i64,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_arista_device_type() {
        let driver = AristaEosDriver::default();
        assert_eq!(driver.device_type(), DeviceType::AristaEos);
    }

    #[test]
    fn classifies_auth_and_timeout_statuses() {
        assert!(matches!(classify_http_status(401, "x"), DriverError::Auth(_)));
        assert!(matches!(classify_http_status(504, "x"), DriverError::Timeout(_)));
        assert!(matches!(classify_http_status(500, "x"), DriverError::Command(_)));
    }
}
