//! Connection handshake.
//!
//! Runs once, sequentially, before the engine spawns any task:
//!
//! 1. send the supported version range (V100+) or the client version (legacy)
//! 2. read either a redirect or `(server_version, server_time)`
//! 3. enforce the configured minimum server version
//! 4. announce the client id

use crate::encoder::{build_connect_request, build_legacy_connect_request, MessageEncoder};
use crate::errors::{EngineError, Result};
use crate::framing::Framing;
use crate::message::encode_request;
use crate::messages::StartApi;
use crate::options::EngineOptions;
use crate::protocol::{server_version, MAX_CLIENT_VER, MIN_SERVER_VER_TIME};
use crate::transport::Transport;

/// Negotiated session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub server_version: i32,
    /// Server wall-clock time as sent; empty for very old servers.
    pub server_time: String,
}

enum ConnectAck {
    Redirect(String),
    Accepted { server_version: i32, server_time: String },
}

/// Negotiate the protocol version and announce the client id.
///
/// A redirect surfaces as [`EngineError::Redirect`]; following it is the
/// caller's job.
pub async fn negotiate(transport: &mut Transport, options: &EngineOptions) -> Result<Handshake> {
    let framing = transport.framing();
    let request = match framing {
        Framing::V100 => build_connect_request(options.connect_options.as_deref())?,
        Framing::Legacy => build_legacy_connect_request(),
    };
    transport.send(&request).await?;

    let ack = transport
        .read_with(|dec| {
            let sv = dec.decode_i32()?;
            if sv < 0 {
                return Ok(ConnectAck::Redirect(dec.decode_string()?));
            }
            let server_time = if sv >= MIN_SERVER_VER_TIME {
                dec.decode_string()?
            } else {
                String::new()
            };
            Ok(ConnectAck::Accepted {
                server_version: sv,
                server_time,
            })
        })
        .await?;

    let (sv, server_time) = match ack {
        ConnectAck::Redirect(address) => {
            tracing::info!(%address, "server requested redirect");
            return Err(EngineError::Redirect { address });
        }
        ConnectAck::Accepted {
            server_version,
            server_time,
        } => (server_version, server_time),
    };

    if sv < options.min_server_version {
        return Err(EngineError::VersionMismatch {
            server: sv,
            required: options.min_server_version,
        });
    }
    if framing == Framing::V100 && sv > MAX_CLIENT_VER {
        return Err(EngineError::Protocol(format!(
            "server version {sv} is outside the offered range (max {MAX_CLIENT_VER})"
        )));
    }
    transport.set_server_version(sv);

    start_api(transport, sv, options).await?;

    tracing::info!(
        server_version = sv,
        server_time = %server_time,
        client_id = options.client_id,
        "handshake complete"
    );

    Ok(Handshake {
        server_version: sv,
        server_time,
    })
}

/// Announce the client id: START_API on linking-capable servers, a bare
/// field before that.
async fn start_api(transport: &mut Transport, sv: i32, options: &EngineOptions) -> Result<()> {
    let framing = transport.framing();
    let bytes = if sv >= server_version::LINKING {
        let request = StartApi {
            client_id: options.client_id,
            optional_capabilities: options.optional_capabilities.clone(),
        };
        encode_request(&request, sv, framing)?
    } else {
        let mut enc = MessageEncoder::new(sv);
        enc.encode_field_i32(options.client_id);
        enc.finish(framing)?
    };
    transport.send(&bytes).await
}
