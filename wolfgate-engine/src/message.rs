//! Request/reply contract.
//!
//! A transmittable message implements [`Request`]. Incoming messages are
//! decoded into a [`Reply`] by a [`ReplyRegistry`], which maps each message
//! code to a decode function and tags the result with its [`ReplyKind`].

use std::collections::HashMap;

use serde::Serialize;

use crate::decoder::MessageDecoder;
use crate::encoder::MessageEncoder;
use crate::errors::{EngineError, Result};
use crate::framing::Framing;
use crate::messages::{AccountValue, Position, ServerError};
use crate::protocol::{incoming, UNMATCHED_REPLY_ID};

// ============================================================================
// Request
// ============================================================================

/// An outbound message.
///
/// The engine writes the envelope (`code`, then `version` when present) and
/// then calls [`write`](Request::write) for the message's own fields.
pub trait Request: Send + Sync {
    /// Outgoing message code.
    fn code(&self) -> i32;

    /// Message version field, or `None` for messages that carry none.
    fn version(&self) -> Option<i32>;

    /// Correlation id, or `None` for fire-and-forget requests.
    fn id(&self) -> Option<i64> {
        None
    }

    /// Encode the message body for the negotiated server version.
    ///
    /// Must fail before writing anything if the request needs a feature the
    /// server lacks.
    fn write(&self, server_version: i32, enc: &mut MessageEncoder) -> Result<()>;
}

/// Fail with [`EngineError::Unsupported`] when `server_version < required`.
pub fn require_server_version(
    server_version: i32,
    required: i32,
    feature: &'static str,
) -> Result<()> {
    if server_version < required {
        return Err(EngineError::Unsupported {
            feature,
            required,
            current: server_version,
        });
    }
    Ok(())
}

/// Serialize a request (envelope + body) into wire bytes.
///
/// Nothing is produced unless the whole request encodes successfully.
pub fn encode_request(
    request: &dyn Request,
    server_version: i32,
    framing: Framing,
) -> Result<bytes::BytesMut> {
    let mut enc = MessageEncoder::new(server_version);
    enc.encode_field_i32(request.code());
    if let Some(version) = request.version() {
        enc.encode_version(version);
    }
    request.write(server_version, &mut enc)?;
    enc.finish(framing)
}

// ============================================================================
// Reply
// ============================================================================

/// Routing class of a decoded reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyKind {
    /// An `ERR_MSG`; fanned out to every sink.
    Error,
    /// Carries a correlation id.
    Matched,
    /// Carries no correlation id.
    Unmatched,
}

/// Decoded payload of a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplyBody {
    Error(ServerError),
    NextValidId { order_id: i64 },
    ManagedAccounts { accounts: Vec<String> },
    CurrentTime { time: i64 },
    CurrentTimeInMillis { millis: i64 },
    Position(Position),
    PositionEnd,
    AccountSummary(AccountValue),
    AccountSummaryEnd,
    /// A message with no registered decoder; every remaining field as text.
    Raw { fields: Vec<String> },
}

/// An inbound message.
///
/// Each delivery hands out its own clone; a reply is never mutated after
/// dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub code: i32,
    pub id: Option<i64>,
    pub kind: ReplyKind,
    pub body: ReplyBody,
}

impl Reply {
    /// Build a reply, normalizing the id and deriving its kind.
    ///
    /// Negative ids and the sentinel are treated as "no id".
    pub fn new(code: i32, id: Option<i64>, body: ReplyBody) -> Self {
        let id = id.filter(|&id| id >= 0 && id != UNMATCHED_REPLY_ID);
        let kind = if code == incoming::ERR_MSG {
            ReplyKind::Error
        } else if id.is_some() {
            ReplyKind::Matched
        } else {
            ReplyKind::Unmatched
        };
        Self {
            code,
            id,
            kind,
            body,
        }
    }

    /// The server error carried by an `Error` reply.
    pub fn server_error(&self) -> Option<&ServerError> {
        match &self.body {
            ReplyBody::Error(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// ReplyRegistry
// ============================================================================

/// Decodes the fields following the message code into `(id, body)`.
pub type DecodeFn = fn(&mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)>;

/// Decode functions keyed by incoming message code.
#[derive(Clone, Default)]
pub struct ReplyRegistry {
    decoders: HashMap<i32, DecodeFn>,
}

impl ReplyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in message catalog.
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        crate::messages::register_catalog(&mut registry);
        registry
    }

    /// Register (or replace) the decoder for `code`.
    pub fn register(&mut self, code: i32, decode: DecodeFn) -> &mut Self {
        self.decoders.insert(code, decode);
        self
    }

    pub fn contains(&self, code: i32) -> bool {
        self.decoders.contains_key(&code)
    }

    /// Decode one complete reply from `dec`.
    ///
    /// An unregistered code is kept as [`ReplyBody::Raw`] under V100+ framing.
    /// Under legacy framing its extent is unknowable, so it is an error.
    pub fn decode(&self, dec: &mut MessageDecoder<'_>, framing: Framing) -> Result<Reply> {
        let code = dec.decode_i32()?;
        match self.decoders.get(&code) {
            Some(decode) => {
                let (id, body) = decode(dec)?;
                Ok(Reply::new(code, id, body))
            }
            None if framing == Framing::V100 => {
                let fields = dec.decode_rest()?;
                Ok(Reply::new(code, None, ReplyBody::Raw { fields }))
            }
            None => Err(EngineError::Decoding(format!(
                "unknown message code {code} cannot be delimited in legacy framing"
            ))),
        }
    }
}

impl std::fmt::Debug for ReplyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<_> = self.decoders.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("ReplyRegistry").field("codes", &codes).finish()
    }
}
