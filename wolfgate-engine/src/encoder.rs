//! Gateway message encoder.
//!
//! Encodes outgoing messages in the gateway wire format: NUL-terminated ASCII
//! fields, optionally wrapped in a 4-byte big-endian length prefix (V100+
//! framing).

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

use crate::errors::{EngineError, Result};
use crate::framing::Framing;
use crate::protocol::{
    API_SIGN, CLIENT_VERSION, HEADER_LEN, MAX_CLIENT_VER, MAX_MSG_LEN, MIN_CLIENT_VER,
    UNSET_DOUBLE, UNSET_INTEGER, UNSET_LONG,
};

/// Wire format of UTC time fields.
pub const UTC_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S UTC";

/// Wire format of naive local time fields (no zone).
pub const LOCAL_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

// ============================================================================
// Helpers
// ============================================================================

/// Check if a string contains only ASCII printable characters (32-126)
/// plus tab (9), LF (10), CR (13).
fn is_ascii_printable(s: &str) -> bool {
    s.bytes()
        .all(|b| (32..127).contains(&b) || b == 9 || b == 10 || b == 13)
}

// ============================================================================
// Field
// ============================================================================

/// One encodable scalar, used by version-gated field lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'a> {
    Int(i64),
    MaxInt(Option<i64>),
    Float(f64),
    MaxFloat(Option<f64>),
    Bool(bool),
    Str(&'a str),
    Decimal(Decimal),
    MaxDecimal(Option<Decimal>),
    UtcTime(DateTime<Utc>),
    LocalTime(NaiveDateTime),
}

/// Presence condition of a version-gated field.
///
/// Shared by [`MessageEncoder::encode_gated`] and
/// [`MessageDecoder::decode_gated`](crate::decoder::MessageDecoder::decode_gated)
/// so both directions agree on which fields are on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    /// Negotiated server version at or above the threshold.
    Server(i32),
    /// Negotiated server version below the threshold (field was retired).
    ServerBelow(i32),
    /// The message's own version field at or above the threshold.
    Message(i32),
}

impl Gate {
    pub fn admits(self, server_version: i32, message_version: i32) -> bool {
        match self {
            Gate::Always => true,
            Gate::Server(min) => server_version >= min,
            Gate::ServerBelow(max) => server_version < max,
            Gate::Message(min) => message_version >= min,
        }
    }
}

// ============================================================================
// MessageEncoder
// ============================================================================

/// Encodes gateway wire-format messages.
///
/// Each instance represents a single outgoing message being built. Fields are
/// encoded as ASCII text followed by a NUL byte. The framing is chosen when
/// the message is finished.
pub struct MessageEncoder {
    buf: BytesMut,
    server_version: i32,
    message_version: i32,
    invalid: Option<String>,
}

impl MessageEncoder {
    /// Create a new encoder for a single message.
    ///
    /// Reserves 4 bytes at the start for the V100+ length header; legacy
    /// framing drops them in [`finish`](Self::finish).
    pub fn new(server_version: i32) -> Self {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_bytes(0, HEADER_LEN);
        Self {
            buf,
            server_version,
            message_version: 0,
            invalid: None,
        }
    }

    /// Negotiated server version the message is being encoded for.
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Version written by [`encode_version`](Self::encode_version), 0 if none.
    pub fn message_version(&self) -> i32 {
        self.message_version
    }

    /// Write the message's version field and gate later fields on it.
    pub fn encode_version(&mut self, version: i32) -> &mut Self {
        self.message_version = version;
        self.encode_field_i32(version)
    }

    /// Encoded body so far (no length header).
    pub fn body(&self) -> &[u8] {
        &self.buf[HEADER_LEN..]
    }

    /// Finish the message and return the bytes to put on the wire.
    ///
    /// Fails without producing any bytes if a field was invalid or the body
    /// exceeds `MAX_MSG_LEN`.
    pub fn finish(mut self, framing: Framing) -> Result<BytesMut> {
        if let Some(reason) = self.invalid.take() {
            return Err(EngineError::Encoding(reason));
        }
        let msg_len = self.buf.len() - HEADER_LEN;
        if msg_len > MAX_MSG_LEN {
            return Err(EngineError::Encoding(format!(
                "message too long: {msg_len} bytes (max {MAX_MSG_LEN})"
            )));
        }
        match framing {
            Framing::V100 => {
                let len_bytes = (msg_len as u32).to_be_bytes();
                self.buf[0..HEADER_LEN].copy_from_slice(&len_bytes);
                Ok(self.buf)
            }
            Framing::Legacy => Ok(self.buf.split_off(HEADER_LEN)),
        }
    }

    // ========================================================================
    // Core field encoders
    // ========================================================================

    /// Encode a string field: bytes + '\0'.
    ///
    /// A string containing NUL would split into two fields on the wire, so it
    /// poisons the message and `finish` fails.
    pub fn encode_field_str(&mut self, value: &str) -> &mut Self {
        if value.as_bytes().contains(&0) {
            self.invalid
                .get_or_insert_with(|| format!("string field contains NUL: {value:?}"));
        } else if !value.is_empty() && !is_ascii_printable(value) {
            tracing::warn!(value, "non-ASCII-printable string in field encoding");
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.put_u8(0);
        self
    }

    /// Encode an i32 field: ASCII decimal + '\0'.
    pub fn encode_field_i32(&mut self, value: i32) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    /// Encode an i64 field: ASCII decimal + '\0'.
    pub fn encode_field_i64(&mut self, value: i64) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    /// Encode a f64 field: decimal string or "Infinity" + '\0'.
    ///
    /// Rust's default f64 Display produces the shortest round-trip
    /// representation.
    pub fn encode_field_f64(&mut self, value: f64) -> &mut Self {
        if value.is_infinite() && value.is_sign_positive() {
            self.buf.extend_from_slice(b"Infinity");
        } else {
            self.write_display(value);
        }
        self.buf.put_u8(0);
        self
    }

    /// Encode a bool field: "1\0" for true, "0\0" for false.
    pub fn encode_field_bool(&mut self, value: bool) -> &mut Self {
        self.buf.extend_from_slice(if value { b"1" } else { b"0" });
        self.buf.put_u8(0);
        self
    }

    /// Encode a Decimal field: string representation + '\0'.
    pub fn encode_field_decimal(&mut self, value: &Decimal) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    // ========================================================================
    // "Max" encoders: Option<T> and the UNSET sentinel both map to ""
    // ========================================================================

    /// Encode Option<i32>: None or `UNSET_INTEGER` → "\0", Some(v) → value.
    pub fn encode_field_max_i32(&mut self, value: Option<i32>) -> &mut Self {
        match value {
            Some(v) if v != UNSET_INTEGER => self.encode_field_i32(v),
            _ => self.empty_field(),
        }
    }

    /// Encode Option<i64>: None or `UNSET_LONG` → "\0", Some(v) → value.
    pub fn encode_field_max_i64(&mut self, value: Option<i64>) -> &mut Self {
        match value {
            Some(v) if v != UNSET_LONG => self.encode_field_i64(v),
            _ => self.empty_field(),
        }
    }

    /// Encode Option<f64>: None or `UNSET_DOUBLE` → "\0", Some(v) → value.
    pub fn encode_field_max_f64(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) if v != UNSET_DOUBLE => self.encode_field_f64(v),
            _ => self.empty_field(),
        }
    }

    /// Encode Option<Decimal>: None or `Decimal::MAX` → "\0", Some(v) → value.
    pub fn encode_field_max_decimal(&mut self, value: Option<&Decimal>) -> &mut Self {
        match value {
            Some(v) if *v != Decimal::MAX => self.encode_field_decimal(v),
            _ => self.empty_field(),
        }
    }

    // ========================================================================
    // Time encoders
    // ========================================================================

    /// Encode a UTC timestamp as `yyyymmdd hh:mm:ss UTC`.
    pub fn encode_field_utc_time(&mut self, value: &DateTime<Utc>) -> &mut Self {
        self.write_display(value.format(UTC_TIME_FORMAT));
        self.buf.put_u8(0);
        self
    }

    /// Encode a naive local timestamp as `yyyymmdd hh:mm:ss` (no zone).
    pub fn encode_field_local_time(&mut self, value: &NaiveDateTime) -> &mut Self {
        self.write_display(value.format(LOCAL_TIME_FORMAT));
        self.buf.put_u8(0);
        self
    }

    // ========================================================================
    // Composite encoders
    // ========================================================================

    /// Encode a collection: element count, then each element via `f`.
    pub fn encode_list<T>(
        &mut self,
        items: &[T],
        mut f: impl FnMut(&mut Self, &T),
    ) -> &mut Self {
        self.encode_field_i32(items.len() as i32);
        for item in items {
            f(self, item);
        }
        self
    }

    /// Encode a single [`Field`].
    pub fn encode_field(&mut self, field: &Field<'_>) -> &mut Self {
        match field {
            Field::Int(v) => self.encode_field_i64(*v),
            Field::MaxInt(v) => self.encode_field_max_i64(*v),
            Field::Float(v) => self.encode_field_f64(*v),
            Field::MaxFloat(v) => self.encode_field_max_f64(*v),
            Field::Bool(v) => self.encode_field_bool(*v),
            Field::Str(v) => self.encode_field_str(v),
            Field::Decimal(v) => self.encode_field_decimal(v),
            Field::MaxDecimal(v) => self.encode_field_max_decimal(v.as_ref()),
            Field::UtcTime(v) => self.encode_field_utc_time(v),
            Field::LocalTime(v) => self.encode_field_local_time(v),
        }
    }

    /// Encode a version-gated field list.
    ///
    /// Each entry is `(gate, field)`; the field is written only when the gate
    /// admits the negotiated server version and the message version. Entries
    /// are evaluated strictly in the given order, which is the wire order.
    pub fn encode_gated(&mut self, fields: &[(Gate, Field<'_>)]) -> &mut Self {
        for (gate, field) in fields {
            if gate.admits(self.server_version, self.message_version) {
                self.encode_field(field);
            }
        }
        self
    }

    /// Encode a type implementing Display: uses its Display output + '\0'.
    pub fn encode_field_display<T: fmt::Display>(&mut self, value: &T) -> &mut Self {
        self.write_display(value);
        self.buf.put_u8(0);
        self
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn empty_field(&mut self) -> &mut Self {
        self.buf.put_u8(0);
        self
    }

    /// Write the Display representation of a value to the buffer.
    fn write_display<T: fmt::Display>(&mut self, value: T) {
        let s = value.to_string();
        self.buf.extend_from_slice(s.as_bytes());
    }
}

// ============================================================================
// Connect request builders (special case: not ordinary messages)
// ============================================================================

/// Build the V100+ connection request bytes.
///
/// Wire format: `b"API\0"` + `[4-byte BE length]` + `b"vMIN..MAX[ connectOptions]"`
/// (or `b"vMIN"` when the range collapses to one version).
///
/// The version string is NOT NUL-terminated.
pub fn build_connect_request(connect_options: Option<&str>) -> Result<BytesMut> {
    let body = version_range(MIN_CLIENT_VER, MAX_CLIENT_VER);

    let body = match connect_options {
        Some(opts) if !opts.is_empty() => format!("{body} {opts}"),
        _ => body,
    };

    let body_bytes = body.as_bytes();
    let body_len = body_bytes.len();
    if body_len > MAX_MSG_LEN {
        return Err(EngineError::Encoding("connect request too long".into()));
    }

    let mut buf = BytesMut::with_capacity(API_SIGN.len() + HEADER_LEN + body_len);
    buf.extend_from_slice(API_SIGN);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.extend_from_slice(body_bytes);
    Ok(buf)
}

/// Build the legacy connection request: the client version as one field.
pub fn build_legacy_connect_request() -> BytesMut {
    let mut enc = MessageEncoder::new(0);
    enc.encode_field_i32(CLIENT_VERSION);
    enc.buf.split_off(HEADER_LEN)
}

/// `"vMIN..MAX"`, or `"vMIN"` if both ends are equal.
pub fn version_range(min: i32, max: i32) -> String {
    if min < max {
        format!("v{min}..{max}")
    } else {
        format!("v{min}")
    }
}

// ============================================================================
// Tests
// ============================================================================
