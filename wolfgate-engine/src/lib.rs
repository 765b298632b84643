//! wolfgate-engine -- Rust native client engine for the TWS gateway protocol.
//!
//! The crate establishes a session with a gateway, negotiates the protocol
//! version, serializes typed requests, decodes typed replies, and routes each
//! reply to the interested consumer under bounded backpressure.
//!
//! ## Modules
//!
//! - [`protocol`] -- Protocol constants, message codes, server version gates
//! - [`errors`] -- Error type for the library
//! - [`framing`] -- Legacy vs. V100+ framing
//! - [`encoder`] -- Field and message encoding
//! - [`decoder`] -- Field decoding
//! - [`message`] -- Request/reply contract and reply registry
//! - [`messages`] -- Built-in message catalog
//! - [`transport`] -- Async TCP transport
//! - [`handshake`] -- Version negotiation
//! - [`engine`] -- Connection engine (receive, transmit and dispatch tasks)
//! - [`manager`] -- Generic request/reply lifecycle
//! - [`sink`] -- Drain a manager to an update count
//! - [`managers`] -- Current time, positions, account summary

pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod framing;
pub mod handshake;
pub mod manager;
pub mod managers;
pub mod message;
pub mod messages;
pub mod options;
pub mod protocol;
pub mod signal;
pub mod sink;
pub mod transport;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use engine::{Engine, EngineState, ReplySink, StateSink};
pub use errors::{EngineError, Result};
pub use framing::Framing;
pub use manager::{Manager, ManagerContext, ManagerHooks, UpdateStatus};
pub use message::{Reply, ReplyBody, ReplyKind, ReplyRegistry, Request};
pub use messages::{AccountValue, Position, ServerError};
pub use options::EngineOptions;
pub use protocol::UNMATCHED_REPLY_ID;
pub use sink::sink_manager;
