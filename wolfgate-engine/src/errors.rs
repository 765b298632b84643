//! Error types for the wolfgate-engine library.

use std::sync::Arc;

use thiserror::Error;

/// Top-level error type for the gateway client engine.
///
/// Cloneable so that a single fatal error can be recorded once and handed to
/// every caller that asks for it afterwards.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// TCP connection failure or socket write error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failed to encode a request message.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a reply message.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// The byte source ended in the middle of a message.
    #[error("message truncated")]
    Truncated,

    /// A frame header declared a body larger than the hard cap.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Protocol-level violation (bad handshake, bad frame, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server speaks an older protocol than the engine requires.
    #[error("server version {server} is below the required minimum {required}")]
    VersionMismatch { server: i32, required: i32 },

    /// The server asked the client to reconnect elsewhere.
    #[error("server redirect to {address}")]
    Redirect { address: String },

    /// A request uses a feature the negotiated server version lacks.
    #[error("{feature} requires server version >= {required} (current: {current})")]
    Unsupported {
        feature: &'static str,
        required: i32,
        current: i32,
    },

    /// An application-level error reply that a manager treats as fatal.
    #[error("Server error (id={id}, code={code}): {message}")]
    Server { id: i64, code: i32, message: String },

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection was closed by the peer.
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The engine was stopped and accepts no further work.
    #[error("engine terminated")]
    Terminated,

    /// A manager hook failed.
    #[error("Manager hook error: {0}")]
    Hook(String),

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(Arc::new(e))
    }
}

/// Convenience Result type for this library.
pub type Result<T> = std::result::Result<T, EngineError>;
