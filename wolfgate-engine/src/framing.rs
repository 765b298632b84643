//! Message framing.
//!
//! Two modes are supported:
//!
//! - **Legacy**: one continuous stream of NUL-terminated fields. Message
//!   boundaries are implicit; the receiver knows how many fields each message
//!   type carries.
//! - **V100+**: every message is `[4-byte BE length][legacy-encoded body]`.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::protocol::{HEADER_LEN, MAX_MSG_LEN};

/// Wire framing negotiated for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// NUL-delimited field stream without length prefixes.
    Legacy,
    /// Length-prefixed frames (`"API\0"` handshake).
    #[default]
    V100,
}

/// Wrap a body in a V100+ frame.
pub fn frame(body: &[u8]) -> Result<BytesMut> {
    if body.len() > MAX_MSG_LEN {
        return Err(EngineError::FrameTooLarge {
            len: body.len(),
            max: MAX_MSG_LEN,
        });
    }
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Parse one V100+ frame from the front of `data`.
///
/// Returns `Ok(None)` while the frame is incomplete, otherwise the body and
/// the total number of bytes the frame occupies (header included).
pub fn unframe(data: &[u8]) -> Result<Option<(&[u8], usize)>> {
    if data.len() < HEADER_LEN {
        return Ok(None);
    }
    let len_bytes: [u8; HEADER_LEN] = [data[0], data[1], data[2], data[3]];
    let msg_len = u32::from_be_bytes(len_bytes) as usize;
    if msg_len > MAX_MSG_LEN {
        return Err(EngineError::FrameTooLarge {
            len: msg_len,
            max: MAX_MSG_LEN,
        });
    }
    let total = HEADER_LEN + msg_len;
    if data.len() < total {
        return Ok(None);
    }
    Ok(Some((&data[HEADER_LEN..total], total)))
}
