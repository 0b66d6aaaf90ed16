use std::fmt;

use kernelmux_frame::{ConnectionEndpoint, FrameConfig};
use kernelmux_transport::Listener;
use tracing::info;

use crate::config::ConnectionInfo;
use crate::exit::{frame_error, transport_error, CliResult};

/// Message pattern an endpoint follows. Used for labelling only; every
/// endpoint moves opaque multipart messages the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Bidirectional, addressed by peer identity frames.
    Router,
    /// One-way broadcast to subscribers.
    Publish,
    /// Strict request/reply alternation.
    Reply,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pattern::Router => "router",
            Pattern::Publish => "publish",
            Pattern::Reply => "reply",
        })
    }
}

/// The five endpoints of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Shell,
    Control,
    Stdin,
    IoPub,
    Heartbeat,
}

impl EndpointRole {
    pub const ALL: [EndpointRole; 5] = [
        EndpointRole::Shell,
        EndpointRole::Control,
        EndpointRole::Stdin,
        EndpointRole::IoPub,
        EndpointRole::Heartbeat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EndpointRole::Shell => "shell",
            EndpointRole::Control => "control",
            EndpointRole::Stdin => "stdin",
            EndpointRole::IoPub => "iopub",
            EndpointRole::Heartbeat => "hb",
        }
    }

    pub fn pattern(self) -> Pattern {
        match self {
            EndpointRole::Shell | EndpointRole::Control | EndpointRole::Stdin => Pattern::Router,
            EndpointRole::IoPub => Pattern::Publish,
            EndpointRole::Heartbeat => Pattern::Reply,
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A listening endpoint that has not yet met its frontend.
#[derive(Debug)]
pub struct BoundEndpoint {
    pub role: EndpointRole,
    pub listener: Listener,
}

/// Bind every endpoint before accepting any, so a frontend can connect in
/// any order.
pub fn bind_all(info: &ConnectionInfo) -> CliResult<Vec<BoundEndpoint>> {
    EndpointRole::ALL
        .iter()
        .map(|&role| {
            let address = info.bind_address(role)?;
            let listener = Listener::bind(&address)
                .map_err(|err| transport_error(&format!("failed to bind {role}"), err))?;
            info!(
                endpoint = role.name(),
                pattern = %role.pattern(),
                address = %listener.local_address(),
                "endpoint bound"
            );
            Ok(BoundEndpoint { role, listener })
        })
        .collect()
}

/// Block until the frontend connects to `bound`.
pub fn accept(bound: &BoundEndpoint, config: FrameConfig) -> CliResult<ConnectionEndpoint> {
    let endpoint = ConnectionEndpoint::accept(&bound.listener, config)
        .map_err(|err| frame_error(&format!("failed to accept on {}", bound.role), err))?;
    info!(
        endpoint = bound.role.name(),
        transport = endpoint.get_ref().transport_name(),
        peer = endpoint.get_ref().peer_description().as_deref().unwrap_or("unknown"),
        "frontend connected"
    );
    Ok(endpoint)
}
