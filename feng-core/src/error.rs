//! Feng connection-core error types.
//!
//! Comprehensive error handling for the client connection core.

use std::io;
use thiserror::Error;

/// Main error type for connection-core operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// IO error during socket operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The request handler (RTSP parser, out of scope for this crate)
    /// reported a fatal protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Loop initialisation failed (e.g. fd exhaustion registering a watcher).
    #[error("loop initialisation failed: {0}")]
    LoopInit(io::Error),

    /// A stream timeout fired.
    ///
    /// `soft = true` is an RTCP BYE signal that does not stop the loop;
    /// `soft = false` is the hard kick that does.
    #[error("stream timeout (soft = {soft})")]
    Timeout { soft: bool },

    /// The client's loop was stopped by a registry broadcast shutdown.
    #[error("shutdown requested")]
    Shutdown,

    /// Socket closed (EOF or fatal write error).
    #[error("socket closed")]
    SocketClosed,

    /// Channel send error (registry/handle communication).
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error (registry/handle communication).
    #[error("channel receive error")]
    ChannelRecv,

    /// The accepted socket's transport could not be determined, or was not
    /// one the core supports; the connection is rejected rather than
    /// admitted with an undefined write strategy.
    #[error("unknown or unsupported socket protocol")]
    UnknownProtocol,

    /// The configured output queue byte cap was exceeded.
    #[error("output queue exceeded {limit} bytes")]
    OutputQueueFull { limit: usize },
}

/// Result type alias for connection-core operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

impl ConnectionError {
    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error represents the connection going away, as opposed
    /// to a transient condition.
    ///
    /// All variants ultimately funnel into the same "stop this loop and
    /// free" policy; this is a named predicate so callers (tests,
    /// metrics) can group errors without a giant match.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            Self::Timeout { soft } => !soft,
            _ => true,
        }
    }
}
