//! Transport plumbing for kernelmux endpoints.
//!
//! Turns a bind address into a listening socket and hands out accepted peers
//! as non-blocking [`Connection`]s that can be registered with a poll set:
//! - TCP (`tcp://host:port`)
//! - Unix domain sockets (`ipc://path`)
//!
//! This is the lowest layer of kernelmux. Framing and scheduling live in
//! `kernelmux-frame` and `kernelmux-reactor`.

pub mod address;
pub mod connection;
pub mod error;
pub mod listener;

#[cfg(unix)]
pub mod uds;

pub use address::BindAddress;
pub use connection::Connection;
pub use error::{Result, TransportError};
pub use listener::Listener;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
