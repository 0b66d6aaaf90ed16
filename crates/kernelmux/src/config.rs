use std::fmt;
use std::path::Path;

use kernelmux_transport::BindAddress;
use serde::Deserialize;

use crate::exit::{config_error, io_error, transport_error, CliResult};
use crate::sockets::EndpointRole;

/// Contents of a kernel connection file.
///
/// Unknown fields are ignored so files written for other kernels load too.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInfo {
    pub transport: String,
    pub ip: String,
    pub shell_port: u16,
    pub control_port: u16,
    pub stdin_port: u16,
    pub iopub_port: u16,
    pub hb_port: u16,
    #[serde(default)]
    pub key: SigningKey,
    #[serde(default)]
    pub signature_scheme: String,
}

impl ConnectionInfo {
    pub fn from_json(json: &str) -> CliResult<Self> {
        serde_json::from_str(json).map_err(|err| config_error("invalid connection file", err))
    }

    pub fn port(&self, role: EndpointRole) -> u16 {
        match role {
            EndpointRole::Shell => self.shell_port,
            EndpointRole::Control => self.control_port,
            EndpointRole::Stdin => self.stdin_port,
            EndpointRole::IoPub => self.iopub_port,
            EndpointRole::Heartbeat => self.hb_port,
        }
    }

    /// Bind address for one endpoint.
    pub fn bind_address(&self, role: EndpointRole) -> CliResult<BindAddress> {
        BindAddress::from_parts(&self.transport, &self.ip, self.port(role)).map_err(|err| {
            transport_error(&format!("{} endpoint address", role.name()), err)
        })
    }
}

/// Read and parse a connection file.
pub fn load(path: &Path) -> CliResult<ConnectionInfo> {
    let json = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?;
    ConnectionInfo::from_json(&json)
}

/// Message signing key. Carried for higher layers; never printed.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SigningKey(<empty>)")
        } else {
            f.write_str("SigningKey(<redacted>)")
        }
    }
}
