//! Gateway message decoder.
//!
//! Decodes incoming message fields from the gateway wire format:
//! NUL-terminated ASCII fields parsed from a byte buffer using a
//! cursor/position-tracking pattern.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::encoder::{Gate, LOCAL_TIME_FORMAT, UTC_TIME_FORMAT};
use crate::errors::{EngineError, Result};
use crate::protocol::{UNSET_DOUBLE, UNSET_INTEGER, UNSET_LONG};

/// Upper bound on the capacity pre-allocated for a decoded collection.
const MAX_LIST_PREALLOC: usize = 1024;

// ============================================================================
// MessageDecoder
// ============================================================================

/// Decodes gateway wire-format message fields from a byte buffer.
///
/// Wraps a byte slice and tracks the current read position. Each `decode_*`
/// method reads the next field (bytes up to the NUL terminator), parses it
/// into the requested type, and advances the position.
///
/// Running out of bytes yields [`EngineError::Truncated`], which lets a
/// legacy-framing reader tell "need more bytes" apart from malformed input.
pub struct MessageDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    server_version: i32,
    message_version: i32,
}

impl<'a> MessageDecoder<'a> {
    /// Create a decoder over a message body (without any length header).
    pub fn new(data: &'a [u8], server_version: i32) -> Self {
        Self {
            data,
            pos: 0,
            server_version,
            message_version: 0,
        }
    }

    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Version read by [`decode_version`](Self::decode_version), 0 if none.
    pub fn message_version(&self) -> i32 {
        self.message_version
    }

    /// Check if there are more bytes to decode.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Return remaining undecoded bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Current position in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Read the raw bytes of the next field (up to but not including NUL),
    /// advance position past the NUL, return the field as a `&str`.
    fn read_field_str(&mut self) -> Result<&'a str> {
        let data = self.data;
        let rest = &data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(EngineError::Truncated)?;
        let field = std::str::from_utf8(&rest[..end])
            .map_err(|e| EngineError::Decoding(format!("invalid UTF-8: {e}")))?;
        self.pos += end + 1;
        Ok(field)
    }

    // ========================================================================
    // Type-specific decoders
    // ========================================================================

    /// Decode a String field.
    pub fn decode_string(&mut self) -> Result<String> {
        self.read_field_str().map(|s| s.to_string())
    }

    /// Decode an i32 field. Empty string → 0.
    pub fn decode_i32(&mut self) -> Result<i32> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i32>()
            .map_err(|e| EngineError::Decoding(format!("invalid i32 '{s}': {e}")))
    }

    /// Decode an i64 field. Empty string → 0.
    pub fn decode_i64(&mut self) -> Result<i64> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i64>()
            .map_err(|e| EngineError::Decoding(format!("invalid i64 '{s}': {e}")))
    }

    /// Decode a f64 field. Handles `"Infinity"`; empty string → 0.0.
    pub fn decode_f64(&mut self) -> Result<f64> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0.0);
        }
        parse_f64(s)
    }

    /// Decode a bool field: an integer, `> 0` is true.
    pub fn decode_bool(&mut self) -> Result<bool> {
        self.decode_i32().map(|v| v > 0)
    }

    /// Decode a Decimal field. Empty string → zero.
    pub fn decode_decimal(&mut self) -> Result<Decimal> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(s)
            .map_err(|e| EngineError::Decoding(format!("invalid Decimal '{s}': {e}")))
    }

    // ========================================================================
    // "Max" decoders: empty string or the UNSET sentinel → None
    // ========================================================================

    /// Decode Option<i32>: empty or `UNSET_INTEGER` → None.
    pub fn decode_i32_max(&mut self) -> Result<Option<i32>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<i32>()
            .map(|v| (v != UNSET_INTEGER).then_some(v))
            .map_err(|e| EngineError::Decoding(format!("invalid i32 '{s}': {e}")))
    }

    /// Decode Option<i64>: empty or `UNSET_LONG` → None.
    pub fn decode_i64_max(&mut self) -> Result<Option<i64>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<i64>()
            .map(|v| (v != UNSET_LONG).then_some(v))
            .map_err(|e| EngineError::Decoding(format!("invalid i64 '{s}': {e}")))
    }

    /// Decode Option<f64>: empty or `UNSET_DOUBLE` → None.
    pub fn decode_f64_max(&mut self) -> Result<Option<f64>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        parse_f64(s).map(|v| (v != UNSET_DOUBLE).then_some(v))
    }

    /// Decode Option<Decimal>: empty or `Decimal::MAX` → None.
    pub fn decode_decimal_max(&mut self) -> Result<Option<Decimal>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        Decimal::from_str(s)
            .map(|v| (v != Decimal::MAX).then_some(v))
            .map_err(|e| EngineError::Decoding(format!("invalid Decimal '{s}': {e}")))
    }

    // ========================================================================
    // Time decoders
    // ========================================================================

    /// Decode a `yyyymmdd hh:mm:ss UTC` field. Empty → None.
    pub fn decode_utc_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(s, UTC_TIME_FORMAT)
            .map(|t| Some(t.and_utc()))
            .map_err(|e| EngineError::Decoding(format!("invalid UTC time '{s}': {e}")))
    }

    /// Decode a zone-less `yyyymmdd hh:mm:ss` field. Empty → None.
    pub fn decode_local_time(&mut self) -> Result<Option<NaiveDateTime>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT)
            .map(Some)
            .map_err(|e| EngineError::Decoding(format!("invalid local time '{s}': {e}")))
    }

    // ========================================================================
    // Composite decoders
    // ========================================================================

    /// Decode a collection: element count N, then N elements via `f`.
    ///
    /// A count of zero yields an empty vector; a negative count is malformed.
    pub fn decode_list<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = self.decode_i32()?;
        if count < 0 {
            return Err(EngineError::Decoding(format!(
                "negative element count {count}"
            )));
        }
        let count = count as usize;
        let mut items = Vec::with_capacity(count.min(MAX_LIST_PREALLOC));
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Read the message's version field and gate later fields on it.
    pub fn decode_version(&mut self) -> Result<i32> {
        let version = self.decode_i32()?;
        self.message_version = version;
        Ok(version)
    }

    /// Decode the next field with `f` when `gate` admits it, else `None`.
    ///
    /// The decode-side counterpart of
    /// [`MessageEncoder::encode_gated`](crate::encoder::MessageEncoder::encode_gated):
    /// calls must follow the wire order of the gated fields.
    pub fn decode_gated<T>(
        &mut self,
        gate: Gate,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if gate.admits(self.server_version, self.message_version) {
            f(self).map(Some)
        } else {
            Ok(None)
        }
    }

    // ========================================================================
    // Skip helpers
    // ========================================================================

    /// Skip the next field without decoding it.
    pub fn skip_field(&mut self) -> Result<()> {
        let _ = self.read_field_str()?;
        Ok(())
    }

    /// Skip N fields.
    pub fn skip_fields(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.skip_field()?;
        }
        Ok(())
    }

    /// Decode every remaining field as a string.
    pub fn decode_rest(&mut self) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        while self.has_remaining() {
            fields.push(self.decode_string()?);
        }
        Ok(fields)
    }
}

fn parse_f64(s: &str) -> Result<f64> {
    if s == "Infinity" {
        return Ok(f64::INFINITY);
    }
    s.parse::<f64>()
        .map_err(|e| EngineError::Decoding(format!("invalid f64 '{s}': {e}")))
}

// ============================================================================
// Tests
// ============================================================================
