//! Gateway protocol constants.
//!
//! These constants define the wire protocol between the client engine and the
//! gateway: handshake signature, framing limits, unset sentinels, message
//! codes, and the server-version thresholds that gate optional fields.

use std::ops::RangeInclusive;
use std::time::Duration;

// ============================================================================
// Client / Protocol Constants
// ============================================================================

/// Client protocol version sent as the single handshake field in legacy framing.
pub const CLIENT_VERSION: i32 = 66;

/// Minimum supported client version in the V100+ version range.
pub const MIN_CLIENT_VER: i32 = 100;

/// Maximum supported client version in the V100+ version range.
///
/// Capped below `server_version::PROTOBUF` so every negotiated session keeps
/// text-encoded message codes.
pub const MAX_CLIENT_VER: i32 = 200;

/// Message header length (4-byte big-endian message length prefix).
pub const HEADER_LEN: usize = 4;

/// Maximum message length: 16 MB - 1 byte.
pub const MAX_MSG_LEN: usize = 0xFFFFFF;

/// API protocol signature sent at connection start (V100+ only).
pub const API_SIGN: &[u8; 4] = b"API\0";

/// Maximum number of connection redirects followed by `Engine::connect`.
pub const REDIRECT_COUNT_MAX: u32 = 2;

/// Lowest server version the engine accepts unless configured otherwise.
pub const DEFAULT_MIN_SERVER_VERSION: i32 = 70;

/// Servers older than this do not send their wall-clock time in the handshake.
pub const MIN_SERVER_VER_TIME: i32 = 20;

// ============================================================================
// Sentinels
// ============================================================================

/// Unset integer field. Encodes as an empty field.
pub const UNSET_INTEGER: i32 = i32::MAX;

/// Unset long field. Encodes as an empty field.
pub const UNSET_LONG: i64 = i64::MAX;

/// Unset double field. Encodes as an empty field.
pub const UNSET_DOUBLE: f64 = f64::MAX;

/// Correlation id meaning "no id".
///
/// Never produced by `Engine::next_request_id`; subscribing under this id
/// registers a sink for unmatched replies.
pub const UNMATCHED_REPLY_ID: i64 = i64::MIN;

/// Server error codes in this range are warnings, not failures.
pub const WARNING_CODES: RangeInclusive<i32> = 2100..=2169;

// ============================================================================
// Engine timing
// ============================================================================

/// Bounded wait when delivering a reply or state change to one sink.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How many bounded attempts are made to hand the terminal state to a
/// state observer before giving up on it.
pub const STATE_DELIVERY_ATTEMPTS: u32 = 3;

/// Default capacity of the engine's internal channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Incoming Message Codes (server -> client)
// ============================================================================

/// Incoming message type identifiers.
///
/// These are the first field in every message received from the gateway.
pub mod incoming {
    pub const ERR_MSG: i32 = 4;
    pub const NEXT_VALID_ID: i32 = 9;
    pub const MANAGED_ACCTS: i32 = 15;
    pub const CURRENT_TIME: i32 = 49;
    pub const POSITION_DATA: i32 = 61;
    pub const POSITION_END: i32 = 62;
    pub const ACCOUNT_SUMMARY: i32 = 63;
    pub const ACCOUNT_SUMMARY_END: i32 = 64;
    pub const CURRENT_TIME_IN_MILLIS: i32 = 109;
}

// ============================================================================
// Outgoing Message Codes (client -> server)
// ============================================================================

/// Outgoing request type identifiers.
///
/// These are sent as the first field in every request to the gateway.
pub mod outgoing {
    pub const REQ_CURRENT_TIME: i32 = 49;
    pub const REQ_POSITIONS: i32 = 61;
    pub const REQ_ACCOUNT_SUMMARY: i32 = 62;
    pub const CANCEL_ACCOUNT_SUMMARY: i32 = 63;
    pub const CANCEL_POSITIONS: i32 = 64;
    pub const START_API: i32 = 71;
    pub const REQ_CURRENT_TIME_IN_MILLIS: i32 = 105;
}

// ============================================================================
// Minimum Server Version Constants
// ============================================================================

/// Server version gates that control which features/fields are sent.
///
/// Compared against the version negotiated during the handshake.
pub mod server_version {
    pub const POSITIONS: i32 = 67;
    pub const ACCOUNT_SUMMARY: i32 = 67;
    /// From here on the client id travels in a START_API message.
    pub const LINKING: i32 = 70;
    pub const OPTIONAL_CAPABILITIES: i32 = 72;
    pub const ADVANCED_ORDER_REJECT: i32 = 166;
    pub const ERROR_TIME: i32 = 194;
    pub const CURRENT_TIME_IN_MILLIS: i32 = 197;
    pub const PROTOBUF: i32 = 201;
}
