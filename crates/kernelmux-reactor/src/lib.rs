//! Readiness-driven multiplexing of kernelmux endpoints.
//!
//! One thread owns a [`Reactor`] and every [`SocketChannel`] registered with
//! it. Channels turn read readiness into completed messages on their
//! [`Inbox`], and drain messages handed to their [`Outbox`] (from any thread)
//! whenever the endpoint is writable. A channel only asks to be polled for
//! writability while it has something to send.

pub mod channel;
pub mod error;
pub mod interest;
pub mod reactor;

pub use channel::{ChannelHandle, Inbox, Outbox, SocketChannel};
pub use error::{ChannelError, ReactorError, Result};
pub use interest::{Interest, Readiness};
pub use reactor::{
    EventHandler, Reactor, ReactorConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_POLL_INTERVAL,
};

pub use kernelmux_frame::Message;
