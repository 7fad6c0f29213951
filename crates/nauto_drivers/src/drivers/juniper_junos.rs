use std::pin::Pin;

use async_ssh2_tokio::Client;
use async_trait::async_trait;
use nauto_model::{DeviceType, ResolvedDevice};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{ssh, CommandOutcome, CommandTimeouts, DeviceDriver, DriverError, DriverOutput};

const NETCONF_EOM: &str = "]]>]]>";

trait NetconfIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T> NetconfIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Runs operational commands over a NETCONF session instead of an
/// interactive shell. Config-push/commit/rollback is out of scope for
/// the Device Driver; this driver only ever issues read-only `<command>`
/// RPCs over the netconf subsystem.
#[derive(Default)]
pub struct JuniperJunosDriver;

#[async_trait]
impl DeviceDriver for JuniperJunosDriver {
    fn device_type(&self) -> DeviceType {
        DeviceType::JuniperJunos
    }

    fn name(&self) -> &str {
        "Juniper Junos NETCONF"
    }

    async fn run_commands(
        &self,
        resolved: &ResolvedDevice,
        commands: &[String],
        timeouts: &CommandTimeouts,
    ) -> Result<DriverOutput, DriverError> {
        let mut session = NetconfSession::connect(
            resolved.device.ip_address,
            resolved.device.port,
            &resolved.credential,
            timeouts.connection_timeout,
        )
        .await?;

        let mut outcomes = Vec::with_capacity(commands.len());
        let mut session_log = String::new();
        for command in commands {
            let rpc = format!("<command>{}</command>", escape_xml(command));
            let output = tokio::time::timeout(timeouts.per_command_timeout, session.rpc(&rpc))
                .await
                .map_err(|_| DriverError::Timeout(format!("rpc '{command}' timed out")))??;
            session_log.push_str(&format!("{command}\n{output}\n"));
            outcomes.push(CommandOutcome {
                command: command.clone(),
                output,
            });
        }

        Ok(DriverOutput { outcomes, session_log })
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

struct NetconfSession {
    #[allow(dead_code)]
    client: Client,
    stream: Pin<Box<dyn NetconfIo>>,
    next_id: u32,
}

impl NetconfSession {
    async fn connect(
        ip_address: std::net::IpAddr,
        port: u16,
        credential: &nauto_model::Credential,
        connect_timeout: std::time::Duration,
    ) -> Result<NetconfSession, DriverError> {
        let client = ssh::connect(ip_address, port, credential, connect_timeout).await?;
        let channel = client
            .get_channel()
            .await
            .map_err(|e| DriverError::Session(format!("netconf channel: {e}")))?;
        channel
            .request_subsystem(true, "netconf")
            .await
            .map_err(|e| DriverError::Session(format!("netconf subsystem denied: {e}")))?;
        let stream = channel.into_stream();
        let mut session = NetconfSession {
            client,
            stream: Box::pin(stream),
            next_id: 1,
        };
        session.send_hello().await?;
        Ok(session)
    }

    async fn send_hello(&mut self) -> Result<(), DriverError> {
        let hello = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
  </capabilities>
</hello>]]>]]>"#;
        self.stream
            .as_mut()
            .write_all(hello.as_bytes())
            .await
            .map_err(|e| DriverError::Session(format!("write hello: {e}")))?;
        self.stream
            .as_mut()
            .flush()
            .await
            .map_err(|e| DriverError::Session(format!("flush hello: {e}")))?;
        let _server_hello = self.read_reply().await?;
        Ok(())
    }

    async fn rpc(&mut self, inner: &str) -> Result<String, DriverError> {
        let message_id = self.next_id;
        self.next_id += 1;
        let payload = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rpc message-id="{message_id}" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">{inner}</rpc>{NETCONF_EOM}"#
        );
        self.stream
            .as_mut()
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| DriverError::Command(format!("write rpc: {e}")))?;
        self.stream
            .as_mut()
            .flush()
            .await
            .map_err(|e| DriverError::Command(format!("flush rpc: {e}")))?;
        let reply = self.read_reply().await?;
        if reply.contains("<rpc-error>") {
            return Err(DriverError::Command(format!("netconf error: {reply}")));
        }
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<String, DriverError> {
        let mut buf = Vec::new();
        loop {
            let mut chunk = vec![0u8; 4096];
            let read = self
                .stream
                .as_mut()
                .read(&mut chunk)
                .await
                .map_err(|e| DriverError::Session(format!("read netconf frame: {e}")))?;
            if read == 0 {
                return Err(DriverError::Session("netconf stream closed".into()));
            }
            buf.extend_from_slice(&chunk[..read]);
            if buf.len() >= NETCONF_EOM.len()
                && buf[buf.len() - NETCONF_EOM.len()..] == NETCONF_EOM.as_bytes()[..]
            {
                break;
            }
        }
        buf.truncate(buf.len() - NETCONF_EOM.len());
        String::from_utf8(buf).map_err(|_| DriverError::Session("netconf reply not utf8".into()))
    }
}
