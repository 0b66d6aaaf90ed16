/// Errors that can occur while framing, receiving or sending messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4B4D \"KM\")")]
    InvalidMagic,

    /// The frame header carries flag bits this codec does not understand.
    #[error("invalid frame flags 0x{0:04x}")]
    InvalidFlags(u16),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kernelmux_transport::TransportError),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Every producer of outbound messages went away while the endpoint was
    /// still writing.
    #[error("outbound message source closed while writing")]
    OutboundClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
