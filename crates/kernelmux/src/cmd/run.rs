use std::thread::{self, JoinHandle};
use std::time::Duration;

use kernelmux_frame::FrameConfig;
use kernelmux_reactor::{ChannelHandle, Inbox, Outbox, Reactor, ReactorConfig, SocketChannel};
use tracing::{debug, info, warn};

use crate::cmd::RunArgs;
use crate::config;
use crate::exit::{io_error, reactor_error, CliResult, SUCCESS};
use crate::sockets::{self, EndpointRole};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let info = config::load(&args.connection_file)?;
    info!(
        file = %args.connection_file.display(),
        transport = %info.transport,
        ip = %info.ip,
        signature_scheme = %info.signature_scheme,
        key = ?info.key,
        "loaded connection file"
    );

    let frame_config = FrameConfig {
        max_payload_size: args.max_payload,
        ..FrameConfig::default()
    };
    let mut reactor = Reactor::with_config(ReactorConfig {
        poll_interval: Duration::from_micros(args.poll_interval_us),
        ..ReactorConfig::default()
    })
    .map_err(|err| reactor_error("failed to start reactor", err))?;

    // Listeners stay open for the life of the process so ipc socket files
    // are only removed on exit.
    let bound = sockets::bind_all(&info)?;
    let mut handles = Vec::with_capacity(bound.len());
    for endpoint in &bound {
        let conn = sockets::accept(endpoint, frame_config.clone())?;
        let (channel, handle) = SocketChannel::new(endpoint.role.name(), conn, reactor.waker());
        let token = reactor
            .register_endpoint(Box::new(channel))
            .map_err(|err| reactor_error("failed to register endpoint", err))?;
        reactor
            .register_wakeup(token)
            .map_err(|err| reactor_error("failed to register wake-up", err))?;
        handles.push((endpoint.role, handle));
    }

    // Every outbox stays alive while the reactor runs: a channel whose
    // outbound queue is closed cannot write again.
    let mut outboxes = Vec::with_capacity(handles.len());
    let mut consumers = Vec::with_capacity(handles.len());
    for (role, ChannelHandle { inbox, outbox }) in handles {
        let consumer = match role {
            EndpointRole::Heartbeat => {
                let replies = outbox.clone();
                spawn_consumer(role, move || echo(inbox, replies))?
            }
            _ => spawn_consumer(role, move || drain(role, inbox))?,
        };
        outboxes.push(outbox);
        consumers.push(consumer);
    }

    info!(endpoints = bound.len(), "all frontends connected");
    reactor
        .run()
        .map_err(|err| reactor_error("reactor stopped", err))?;

    debug!(outboxes = outboxes.len(), consumers = consumers.len(), "reactor exited");
    Ok(SUCCESS)
}

fn spawn_consumer<F>(role: EndpointRole, body: F) -> CliResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{role}-consumer"))
        .spawn(body)
        .map_err(|err| io_error(&format!("failed to spawn {role} consumer"), err))
}

/// Send every heartbeat straight back, byte for byte.
fn echo(inbox: Inbox, outbox: Outbox) {
    for message in inbox {
        debug!(endpoint = outbox.name(), frames = message.len(), "heartbeat");
        if let Err(err) = outbox.enqueue(message) {
            warn!(endpoint = outbox.name(), error = %err, "heartbeat echo stopped");
            return;
        }
    }
}

fn drain(role: EndpointRole, inbox: Inbox) {
    for message in inbox {
        debug!(
            endpoint = role.name(),
            frames = message.len(),
            bytes = message.byte_len(),
            "message received"
        );
    }
}
