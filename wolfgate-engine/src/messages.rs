//! Built-in message catalog.
//!
//! A small set of requests and reply decoders used by the bundled managers.
//! Other messages plug in through [`Request`] and
//! [`ReplyRegistry::register`].

use rust_decimal::Decimal;
use serde::Serialize;

use crate::decoder::MessageDecoder;
use crate::encoder::{Field, Gate, MessageEncoder};
use crate::errors::Result;
use crate::message::{require_server_version, ReplyBody, ReplyRegistry, Request};
use crate::protocol::{incoming, outgoing, server_version, WARNING_CODES};

// ============================================================================
// Payload types
// ============================================================================

/// Application-level error or warning reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
    pub id: i64,
    pub code: i32,
    pub message: String,
    pub advanced_order_reject_json: String,
    pub error_time: i64,
}

impl ServerError {
    /// Codes in the reserved warning range are informational.
    pub fn is_warning(&self) -> bool {
        WARNING_CODES.contains(&self.code)
    }
}

/// One position row from `POSITION_DATA`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub account: String,
    pub con_id: i64,
    pub symbol: String,
    pub sec_type: String,
    pub last_trade_date: String,
    pub strike: f64,
    pub right: String,
    pub multiplier: String,
    pub exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub position: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<f64>,
}

/// One `(account, tag) → value` row from `ACCOUNT_SUMMARY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValue {
    pub account: String,
    pub tag: String,
    pub value: String,
    pub currency: String,
}

// ============================================================================
// Requests
// ============================================================================

/// START_API: announces the client id once the handshake completes (V100+).
#[derive(Debug, Clone)]
pub struct StartApi {
    pub client_id: i32,
    pub optional_capabilities: String,
}

impl Request for StartApi {
    fn code(&self) -> i32 {
        outgoing::START_API
    }

    fn version(&self) -> Option<i32> {
        Some(2)
    }

    fn write(&self, _server_version: i32, enc: &mut MessageEncoder) -> Result<()> {
        enc.encode_field_i32(self.client_id);
        enc.encode_gated(&[(
            Gate::Server(server_version::OPTIONAL_CAPABILITIES),
            Field::Str(&self.optional_capabilities),
        )]);
        Ok(())
    }
}

/// REQ_CURRENT_TIME. Answered by an unmatched `CURRENT_TIME`.
#[derive(Debug, Clone, Default)]
pub struct ReqCurrentTime;

impl Request for ReqCurrentTime {
    fn code(&self) -> i32 {
        outgoing::REQ_CURRENT_TIME
    }

    fn version(&self) -> Option<i32> {
        Some(1)
    }

    fn write(&self, _server_version: i32, _enc: &mut MessageEncoder) -> Result<()> {
        Ok(())
    }
}

/// REQ_CURRENT_TIME_IN_MILLIS. Answered by `CURRENT_TIME_IN_MILLIS`.
#[derive(Debug, Clone, Default)]
pub struct ReqCurrentTimeInMillis;

impl Request for ReqCurrentTimeInMillis {
    fn code(&self) -> i32 {
        outgoing::REQ_CURRENT_TIME_IN_MILLIS
    }

    fn version(&self) -> Option<i32> {
        None
    }

    fn write(&self, server_version: i32, _enc: &mut MessageEncoder) -> Result<()> {
        require_server_version(
            server_version,
            server_version::CURRENT_TIME_IN_MILLIS,
            "current time in millis",
        )
    }
}

/// REQ_POSITIONS. Streams unmatched `POSITION_DATA` then `POSITION_END`.
#[derive(Debug, Clone, Default)]
pub struct ReqPositions;

impl Request for ReqPositions {
    fn code(&self) -> i32 {
        outgoing::REQ_POSITIONS
    }

    fn version(&self) -> Option<i32> {
        Some(1)
    }

    fn write(&self, server_version: i32, _enc: &mut MessageEncoder) -> Result<()> {
        require_server_version(server_version, server_version::POSITIONS, "positions request")
    }
}

/// CANCEL_POSITIONS.
#[derive(Debug, Clone, Default)]
pub struct CancelPositions;

impl Request for CancelPositions {
    fn code(&self) -> i32 {
        outgoing::CANCEL_POSITIONS
    }

    fn version(&self) -> Option<i32> {
        Some(1)
    }

    fn write(&self, server_version: i32, _enc: &mut MessageEncoder) -> Result<()> {
        require_server_version(server_version, server_version::POSITIONS, "positions cancellation")
    }
}

/// REQ_ACCOUNT_SUMMARY. Streams `ACCOUNT_SUMMARY` rows then
/// `ACCOUNT_SUMMARY_END`, all carrying `req_id`.
#[derive(Debug, Clone)]
pub struct ReqAccountSummary {
    pub req_id: i64,
    pub group: String,
    pub tags: Vec<String>,
}

impl Request for ReqAccountSummary {
    fn code(&self) -> i32 {
        outgoing::REQ_ACCOUNT_SUMMARY
    }

    fn version(&self) -> Option<i32> {
        Some(1)
    }

    fn id(&self) -> Option<i64> {
        Some(self.req_id)
    }

    fn write(&self, server_version: i32, enc: &mut MessageEncoder) -> Result<()> {
        require_server_version(
            server_version,
            server_version::ACCOUNT_SUMMARY,
            "account summary request",
        )?;
        enc.encode_field_i64(self.req_id)
            .encode_field_str(&self.group)
            .encode_field_str(&self.tags.join(","));
        Ok(())
    }
}

/// CANCEL_ACCOUNT_SUMMARY.
#[derive(Debug, Clone)]
pub struct CancelAccountSummary {
    pub req_id: i64,
}

impl Request for CancelAccountSummary {
    fn code(&self) -> i32 {
        outgoing::CANCEL_ACCOUNT_SUMMARY
    }

    fn version(&self) -> Option<i32> {
        Some(1)
    }

    fn id(&self) -> Option<i64> {
        Some(self.req_id)
    }

    fn write(&self, server_version: i32, enc: &mut MessageEncoder) -> Result<()> {
        require_server_version(
            server_version,
            server_version::ACCOUNT_SUMMARY,
            "account summary cancellation",
        )?;
        enc.encode_field_i64(self.req_id);
        Ok(())
    }
}

// ============================================================================
// Reply decoders
// ============================================================================

/// Register every decoder in this module.
pub fn register_catalog(registry: &mut ReplyRegistry) {
    registry
        .register(incoming::ERR_MSG, decode_err_msg)
        .register(incoming::NEXT_VALID_ID, decode_next_valid_id)
        .register(incoming::MANAGED_ACCTS, decode_managed_accts)
        .register(incoming::CURRENT_TIME, decode_current_time)
        .register(incoming::CURRENT_TIME_IN_MILLIS, decode_current_time_in_millis)
        .register(incoming::POSITION_DATA, decode_position)
        .register(incoming::POSITION_END, decode_position_end)
        .register(incoming::ACCOUNT_SUMMARY, decode_account_summary)
        .register(incoming::ACCOUNT_SUMMARY_END, decode_account_summary_end);
}

/// ERR_MSG (4).
///
/// Servers at `ERROR_TIME` and above drop the version field and append the
/// error time.
fn decode_err_msg(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    let version = dec
        .decode_gated(
            Gate::ServerBelow(server_version::ERROR_TIME),
            MessageDecoder::decode_version,
        )?
        .unwrap_or(2);

    if version < 2 {
        let message = dec.decode_string()?;
        let err = ServerError {
            id: -1,
            message,
            ..Default::default()
        };
        return Ok((None, ReplyBody::Error(err)));
    }

    let id = dec.decode_i64()?;
    let code = dec.decode_i32()?;
    let message = dec.decode_string()?;
    let advanced_order_reject_json = dec
        .decode_gated(
            Gate::Server(server_version::ADVANCED_ORDER_REJECT),
            MessageDecoder::decode_string,
        )?
        .unwrap_or_default();
    let error_time = dec
        .decode_gated(Gate::Server(server_version::ERROR_TIME), MessageDecoder::decode_i64)?
        .unwrap_or_default();

    let err = ServerError {
        id,
        code,
        message,
        advanced_order_reject_json,
        error_time,
    };
    Ok((Some(id), ReplyBody::Error(err)))
}

/// NEXT_VALID_ID (9).
fn decode_next_valid_id(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let order_id = dec.decode_i64()?;
    Ok((None, ReplyBody::NextValidId { order_id }))
}

/// MANAGED_ACCTS (15).
fn decode_managed_accts(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let list = dec.decode_string()?;
    let accounts = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    Ok((None, ReplyBody::ManagedAccounts { accounts }))
}

/// CURRENT_TIME (49).
fn decode_current_time(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let time = dec.decode_i64()?;
    Ok((None, ReplyBody::CurrentTime { time }))
}

/// CURRENT_TIME_IN_MILLIS (109).
fn decode_current_time_in_millis(
    dec: &mut MessageDecoder<'_>,
) -> Result<(Option<i64>, ReplyBody)> {
    let millis = dec.decode_i64()?;
    Ok((None, ReplyBody::CurrentTimeInMillis { millis }))
}

/// POSITION_DATA (61).
fn decode_position(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let mut p = Position {
        account: dec.decode_string()?,
        con_id: dec.decode_i64()?,
        symbol: dec.decode_string()?,
        sec_type: dec.decode_string()?,
        last_trade_date: dec.decode_string()?,
        strike: dec.decode_f64()?,
        right: dec.decode_string()?,
        multiplier: dec.decode_string()?,
        exchange: dec.decode_string()?,
        currency: dec.decode_string()?,
        local_symbol: dec.decode_string()?,
        ..Default::default()
    };
    p.trading_class = dec
        .decode_gated(Gate::Message(2), MessageDecoder::decode_string)?
        .unwrap_or_default();
    // Pre-fractional servers send an integer, which parses as a Decimal too.
    p.position = dec.decode_decimal()?;
    p.avg_cost = dec.decode_gated(Gate::Message(3), MessageDecoder::decode_f64)?;
    Ok((None, ReplyBody::Position(p)))
}

/// POSITION_END (62).
fn decode_position_end(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    Ok((None, ReplyBody::PositionEnd))
}

/// ACCOUNT_SUMMARY (63).
fn decode_account_summary(dec: &mut MessageDecoder<'_>) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let req_id = dec.decode_i64()?;
    let value = AccountValue {
        account: dec.decode_string()?,
        tag: dec.decode_string()?,
        value: dec.decode_string()?,
        currency: dec.decode_string()?,
    };
    Ok((Some(req_id), ReplyBody::AccountSummary(value)))
}

/// ACCOUNT_SUMMARY_END (64).
fn decode_account_summary_end(
    dec: &mut MessageDecoder<'_>,
) -> Result<(Option<i64>, ReplyBody)> {
    dec.decode_version()?;
    let req_id = dec.decode_i64()?;
    Ok((Some(req_id), ReplyBody::AccountSummaryEnd))
}

// ============================================================================
// Tests
// ============================================================================
