//! Multipart socket multiplexing for kernel endpoints.
//!
//! kernelmux drives several bound, non-blocking endpoints from one thread:
//! it rebuilds multi-frame messages from the inbound frame stream and
//! drains queued outbound messages with would-block aware flow control.
//! Frames are opaque bytes; nothing here parses message contents.
//!
//! # Crate Structure
//!
//! - [`transport`] — Bind addresses, listeners and non-blocking connections (TCP, UDS)
//! - [`frame`] — Frame wire codec, framed endpoints, message assembly and write scheduling
//! - [`reactor`] — Socket channels and the poll loop that drives them

/// Re-export transport types.
pub mod transport {
    pub use kernelmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use kernelmux_frame::*;
}

/// Re-export reactor types.
pub mod reactor {
    pub use kernelmux_reactor::*;
}
