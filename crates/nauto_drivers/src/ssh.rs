use std::net::IpAddr;

use async_ssh2_tokio::{AuthMethod, Client, ServerCheckMethod};
use nauto_model::Credential;

use crate::DriverError;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// Opens one password-authenticated SSH session. Credentials in this model
/// are always username+password (spec.md §3); there is no key-based or
/// token variant to dispatch on.
pub async fn connect(
    ip_address: IpAddr,
    port: u16,
    credential: &Credential,
    connect_timeout: std::time::Duration,
) -> Result<Client, DriverError> {
    let auth = AuthMethod::with_password(&credential.password);
    let connect_fut = Client::connect(
        (ip_address.to_string().as_str(), port),
        &credential.username,
        auth,
        ServerCheckMethod::NoCheck,
    );

    match tokio::time::timeout(connect_timeout, connect_fut).await {
        Err(_) => Err(DriverError::Timeout(format!(
            "connect to {ip_address}:{port} timed out after {connect_timeout:?}"
        ))),
        Ok(Err(e)) => Err(classify_connect_error(&e.to_string())),
        Ok(Ok(client)) => Ok(client),
    }
}

fn classify_connect_error(message: &str) -> DriverError {
    let lower = message.to_lowercase();
    if lower.contains("auth") || lower.contains("permission denied") {
        DriverError::Auth(message.to_string())
    } else if lower.contains("kex") || lower.contains("algorithm") {
        DriverError::Session(message.to_string())
    } else {
        DriverError::Unreachable(message.to_string())
    }
}

pub async fn exec(client: &Client, command: &str) -> Result<String, DriverError> {
    let result = client
        .execute(command)
        .await
        .map_err(|e| DriverError::Command(format!("{command}: {e}")))?;
    if result.exit_status != 0 {
        return Err(DriverError::Command(format!(
            "{command}: exit status {}: {}",
            result.exit_status, result.stderr
        )));
    }
    Ok(result.stdout)
}
