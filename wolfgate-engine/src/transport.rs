//! Async TCP transport.
//!
//! Owns the socket halves and the read buffer. Reading is framing-aware:
//! under V100+ a complete frame is buffered before decoding, under legacy
//! framing the decoder itself tells the reader when it ran out of bytes.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::decoder::MessageDecoder;
use crate::errors::{EngineError, Result};
use crate::framing::{unframe, Framing};
use crate::message::{Reply, ReplyRegistry};
use crate::protocol::MAX_MSG_LEN;

/// A connected socket, before it is split between the engine's tasks.
pub struct Transport {
    reader: TransportReader,
    writer: TransportWriter,
}

impl Transport {
    /// Open a TCP connection to `addr`.
    pub async fn connect(addr: &str, framing: Framing) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            EngineError::Connection(format!("failed to connect to {addr}: {e}"))
        })?;
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: TransportReader {
                half: reader,
                read_buf: BytesMut::with_capacity(8192),
                framing,
                server_version: 0,
            },
            writer: TransportWriter { half: writer },
        })
    }

    pub fn framing(&self) -> Framing {
        self.reader.framing
    }

    /// Version used by subsequent decodes.
    pub fn set_server_version(&mut self, server_version: i32) {
        self.reader.server_version = server_version;
    }

    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer.send(data).await
    }

    pub async fn read_with<T>(
        &mut self,
        f: impl FnMut(&mut MessageDecoder<'_>) -> Result<T>,
    ) -> Result<T> {
        self.reader.read_with(f).await
    }

    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        (self.reader, self.writer)
    }
}

// ============================================================================
// TransportReader
// ============================================================================

/// Read half: buffers socket bytes and decodes complete messages.
pub struct TransportReader {
    half: OwnedReadHalf,
    read_buf: BytesMut,
    framing: Framing,
    server_version: i32,
}

impl TransportReader {
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Decode the next message with `f`, reading from the socket as needed.
    ///
    /// Bytes are consumed only when `f` succeeds. Under V100+ framing a
    /// frame that ends inside a field is a decode error; under legacy
    /// framing it means more bytes are needed.
    pub async fn read_with<T>(
        &mut self,
        mut f: impl FnMut(&mut MessageDecoder<'_>) -> Result<T>,
    ) -> Result<T> {
        loop {
            match self.framing {
                Framing::V100 => {
                    if let Some((body, used)) = unframe(&self.read_buf)? {
                        tracing::trace!(len = body.len(), "frame received");
                        let mut dec = MessageDecoder::new(body, self.server_version);
                        let out = f(&mut dec).map_err(|e| match e {
                            EngineError::Truncated => {
                                EngineError::Decoding("frame ended inside a field".into())
                            }
                            other => other,
                        });
                        self.read_buf.advance(used);
                        return out;
                    }
                }
                Framing::Legacy => {
                    if !self.read_buf.is_empty() {
                        let mut dec = MessageDecoder::new(&self.read_buf, self.server_version);
                        match f(&mut dec) {
                            Ok(value) => {
                                let used = dec.position();
                                self.read_buf.advance(used);
                                return Ok(value);
                            }
                            Err(EngineError::Truncated) if self.read_buf.len() > MAX_MSG_LEN => {
                                return Err(EngineError::FrameTooLarge {
                                    len: self.read_buf.len(),
                                    max: MAX_MSG_LEN,
                                });
                            }
                            Err(EngineError::Truncated) => {}
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
            self.fill().await?;
        }
    }

    /// Read and decode the next reply.
    pub async fn read_reply(&mut self, registry: &ReplyRegistry) -> Result<Reply> {
        let framing = self.framing;
        self.read_with(|dec| registry.decode(dec, framing)).await
    }

    async fn fill(&mut self) -> Result<()> {
        let n = self.half.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            return Err(EngineError::Disconnected(
                "connection closed by peer".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TransportWriter
// ============================================================================

/// Write half of a split transport.
pub struct TransportWriter {
    half: OwnedWriteHalf,
}

impl TransportWriter {
    /// Write pre-encoded bytes in full.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.half
            .write_all(data)
            .await
            .map_err(|e| EngineError::Connection(format!("failed to send: {e}")))
    }

    /// Send a TCP FIN. The peer eventually closes its side.
    pub async fn shutdown(&mut self) {
        let _ = self.half.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::frame;
    use crate::message::ReplyBody;
    use tokio::net::TcpListener;

    fn fields(parts: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        for p in parts {
            body.extend_from_slice(p.as_bytes());
            body.push(0);
        }
        body
    }

    /// Accept one connection and write `chunks` with a pause between each.
    async fn mock_gateway(chunks: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            for chunk in chunks {
                stream.write_all(&chunk).await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
            // Keep the socket open until the client is done.
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink).await;
        });
        addr
    }

    #[tokio::test]
    async fn v100_reply_split_across_reads() {
        let framed = frame(&fields(&["49", "1", "1700000000"])).unwrap().to_vec();
        let (a, b) = framed.split_at(5);
        let addr = mock_gateway(vec![a.to_vec(), b.to_vec()]).await;

        let transport = Transport::connect(&addr, Framing::V100).await.unwrap();
        let (mut reader, _writer) = transport.into_split();
        let reply = reader
            .read_reply(&ReplyRegistry::with_catalog())
            .await
            .unwrap();
        assert_eq!(reply.body, ReplyBody::CurrentTime { time: 1_700_000_000 });
    }

    #[tokio::test]
    async fn legacy_reply_split_mid_field() {
        let mut stream = fields(&["9", "1", "100"]);
        stream.extend(fields(&["49", "1", "5"]));
        let (a, b) = stream.split_at(7);
        let addr = mock_gateway(vec![a.to_vec(), b.to_vec()]).await;

        let transport = Transport::connect(&addr, Framing::Legacy).await.unwrap();
        let (mut reader, _writer) = transport.into_split();
        let registry = ReplyRegistry::with_catalog();
        let first = reader.read_reply(&registry).await.unwrap();
        assert_eq!(first.body, ReplyBody::NextValidId { order_id: 100 });
        let second = reader.read_reply(&registry).await.unwrap();
        assert_eq!(second.body, ReplyBody::CurrentTime { time: 5 });
    }

    #[tokio::test]
    async fn v100_frame_ending_inside_field_is_decode_error() {
        let framed = frame(b"49\x001\x00170").unwrap().to_vec();
        let addr = mock_gateway(vec![framed]).await;

        let transport = Transport::connect(&addr, Framing::V100).await.unwrap();
        let (mut reader, _writer) = transport.into_split();
        let err = reader
            .read_reply(&ReplyRegistry::with_catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Decoding(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn eof_is_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let transport = Transport::connect(&addr, Framing::V100).await.unwrap();
        let (mut reader, _writer) = transport.into_split();
        let err = reader
            .read_reply(&ReplyRegistry::with_catalog())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Disconnected(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn connect_refused() {
        // Port 1 is almost certainly not listening
        let result = Transport::connect("127.0.0.1:1", Framing::V100).await;
        assert!(matches!(result, Err(EngineError::Connection(_))));
    }

    #[tokio::test]
    async fn writer_sends_bytes_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let transport = Transport::connect(&addr, Framing::V100).await.unwrap();
        let (_reader, mut writer) = transport.into_split();
        writer.send(b"49\x001\x00").await.unwrap();
        writer.shutdown().await;

        assert_eq!(handle.await.unwrap(), b"49\x001\x00");
    }
}
