use kernelmux_frame::FrameError;

/// Errors raised by a socket channel or its handles.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Frame-level error on the endpoint (transport failure, protocol violation).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Messages must carry at least one frame.
    #[error("cannot enqueue a message with no frames")]
    EmptyMessage,

    /// The channel behind this handle no longer exists.
    #[error("channel '{0}' is gone")]
    Disconnected(String),

    /// The reactor could not be woken after an enqueue.
    #[error("failed to wake reactor: {0}")]
    Wake(std::io::Error),
}

/// Errors that stop the reactor.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// Creating the poll instance or its waker failed.
    #[error("failed to set up poll: {0}")]
    Setup(std::io::Error),

    /// Polling for readiness failed.
    #[error("poll failed: {0}")]
    Poll(std::io::Error),

    /// Registering or re-registering an endpoint failed.
    #[error("failed to register endpoint '{name}': {source}")]
    Register {
        name: String,
        source: std::io::Error,
    },

    /// A token that was never handed out by this reactor.
    #[error("unknown endpoint token {0}")]
    UnknownToken(usize),

    /// A handler failed; the reactor halts on the first such error.
    #[error("endpoint '{name}' failed: {source}")]
    Handler { name: String, source: ChannelError },
}

pub type Result<T> = std::result::Result<T, ReactorError>;
