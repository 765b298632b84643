//! In-process mock gateway for engine and manager tests.
#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use wolfgate_engine::{EngineOptions, Framing};

pub const WAIT: Duration = Duration::from_secs(5);

enum Action {
    Send(Vec<u8>),
    Close,
}

/// A V100+ gateway that accepts one client, completes the handshake and then
/// writes whatever the test scripts. Every frame the client sends after the
/// handshake header (START_API included) is exposed as its field list.
pub struct MockGateway {
    pub port: u16,
    actions: mpsc::UnboundedSender<Action>,
    requests: mpsc::UnboundedReceiver<Vec<String>>,
}

pub fn fields(parts: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for p in parts {
        body.extend_from_slice(p.as_bytes());
        body.push(0);
    }
    body
}

pub fn framed(parts: &[&str]) -> Vec<u8> {
    let body = fields(parts);
    let mut frame = (body.len() as u32).to_be_bytes().to_vec();
    frame.extend(body);
    frame
}

async fn read_frame(rd: &mut OwnedReadHalf) -> std::io::Result<Vec<String>> {
    let mut len = [0u8; 4];
    rd.read_exact(&mut len).await?;
    let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
    rd.read_exact(&mut body).await?;
    let mut parts: Vec<String> = body
        .split(|&b| b == 0)
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect();
    if body.ends_with(&[0]) {
        parts.pop();
    }
    Ok(parts)
}

async fn read_connect_request(rd: &mut OwnedReadHalf) -> std::io::Result<Vec<String>> {
    let mut sign = [0u8; 4];
    rd.read_exact(&mut sign).await?;
    assert_eq!(&sign, b"API\0");
    read_frame(rd).await
}

impl MockGateway {
    pub async fn start(server_version: i32) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (actions, mut action_rx) = mpsc::unbounded_channel();
        let (request_tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (mut rd, mut wr) = stream.into_split();
            if read_connect_request(&mut rd).await.is_err() {
                return;
            }
            let ack = framed(&[&server_version.to_string(), "20260101 12:00:00 EST"]);
            if wr.write_all(&ack).await.is_err() {
                return;
            }

            let reader = tokio::spawn(async move {
                while let Ok(request) = read_frame(&mut rd).await {
                    if request_tx.send(request).is_err() {
                        break;
                    }
                }
            });

            while let Some(action) = action_rx.recv().await {
                match action {
                    Action::Send(bytes) => {
                        if wr.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Action::Close => break,
                }
            }
            let _ = wr.shutdown().await;
            reader.abort();
        });

        Self {
            port,
            actions,
            requests,
        }
    }

    /// A gateway that answers the handshake with a redirect to `target`.
    pub async fn redirecting(target: String) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (mut rd, mut wr) = stream.into_split();
            if read_connect_request(&mut rd).await.is_ok() {
                let _ = wr.write_all(&framed(&["-1", &target])).await;
            }
        });
        port
    }

    pub fn options(&self) -> EngineOptions {
        EngineOptions::new("127.0.0.1", self.port).with_framing(Framing::V100)
    }

    /// Write one framed reply.
    pub fn reply(&self, parts: &[&str]) {
        let _ = self.actions.send(Action::Send(framed(parts)));
    }

    /// Shut the connection down from the gateway side.
    pub fn close(&self) {
        let _ = self.actions.send(Action::Close);
    }

    /// Next request whose message code is `code`, skipping others.
    pub async fn expect_request(&mut self, code: i32) -> Vec<String> {
        let code = code.to_string();
        tokio::time::timeout(WAIT, async {
            loop {
                let request = self.requests.recv().await.expect("gateway connection ended");
                if request.first() == Some(&code) {
                    return request;
                }
            }
        })
        .await
        .expect("timed out waiting for request")
    }

    /// Next request of any kind.
    pub async fn next_request(&mut self) -> Vec<String> {
        tokio::time::timeout(WAIT, self.requests.recv())
            .await
            .expect("timed out waiting for request")
            .expect("gateway connection ended")
    }
}

/// Receive with the standard test timeout.
pub async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting on channel")
        .expect("channel closed")
}
