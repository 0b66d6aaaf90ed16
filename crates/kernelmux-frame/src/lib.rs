//! Multipart message framing for kernelmux endpoints.
//!
//! A message is an ordered list of opaque frames. On the wire every frame
//! carries an 8-byte header:
//! - A 2-byte magic number ("KM") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian flags word (bit 0: more frames follow)
//!
//! [`FrameAssembler`] rebuilds messages from `(frame, more)` pairs and
//! [`WriteScheduler`] pushes queued messages out frame by frame, resuming at
//! the exact frame after a would-block.

pub mod assembler;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod scheduler;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, encode_frame, FrameConfig, WireFrame, DEFAULT_MAX_PAYLOAD,
    DEFAULT_SEND_HIGH_WATER_MARK, FLAG_MORE, HEADER_SIZE,
};
pub use endpoint::{ConnectionEndpoint, FrameEndpoint, RecvOutcome, SendOutcome, StreamEndpoint};
pub use error::{FrameError, Result};
pub use message::Message;
pub use scheduler::{MessageSource, WriteProgress, WriteScheduler};
