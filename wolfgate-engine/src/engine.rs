//! Connection engine.
//!
//! `Engine` owns one gateway connection. After the handshake it runs three
//! tasks:
//!
//! - **receive**: decodes replies off the socket and forwards them
//! - **transmit**: writes encoded requests
//! - **dispatch**: owns the observer [`Registry`] and the engine state,
//!   routes every reply, and executes command closures submitted by the
//!   public subscribe/unsubscribe methods
//!
//! The registry is touched only by the dispatch task, so it needs no lock.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = Engine::connect(EngineOptions::new("127.0.0.1", 4002)).await?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! engine.subscribe(tx, UNMATCHED_REPLY_ID).await?;
//! engine.send(&ReqCurrentTime).await?;
//! let reply = rx.recv().await;
//! engine.stop().await;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::errors::{EngineError, Result};
use crate::handshake::{negotiate, Handshake};
use crate::message::{encode_request, Reply, ReplyKind, ReplyRegistry, Request};
use crate::options::EngineOptions;
use crate::protocol::{STATE_DELIVERY_ATTEMPTS, UNMATCHED_REPLY_ID};
use crate::signal::Latch;
use crate::transport::{Transport, TransportReader, TransportWriter};

/// Channel a caller registers to receive replies.
pub type ReplySink = mpsc::Sender<Reply>;

/// Channel a caller registers to learn the terminal engine state.
pub type StateSink = mpsc::Sender<EngineState>;

type Command = Box<dyn FnOnce(&mut Registry) + Send>;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Ready,
    /// Stopped by [`Engine::stop`].
    ExitNormal,
    /// A task failed; see [`Engine::fatal_error`].
    ExitError,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        self != EngineState::Ready
    }
}

struct Outbound {
    bytes: BytesMut,
    done: oneshot::Sender<Result<()>>,
}

// ============================================================================
// Engine
// ============================================================================

/// Handle to a running connection engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

struct Shared {
    options: EngineOptions,
    handshake: Handshake,
    next_id: AtomicI64,
    state: RwLock<EngineState>,
    fatal: OnceLock<EngineError>,
    commands: mpsc::Sender<Command>,
    outbound: mpsc::Sender<Outbound>,
    stop_requested: Latch,
    /// Fired when the engine leaves `Ready`; pending calls give up.
    terminated: Latch,
    /// Fired after the tasks have exited and state observers were notified.
    exited: Latch,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("address", &self.shared.options.address())
            .field("server_version", &self.shared.handshake.server_version)
            .field("state", &self.state())
            .finish()
    }
}

impl Engine {
    /// Connect with the built-in reply catalog.
    pub async fn connect(options: EngineOptions) -> Result<Self> {
        Self::connect_with(options, ReplyRegistry::with_catalog()).await
    }

    /// Connect, run the handshake (following redirects) and start the tasks.
    pub async fn connect_with(options: EngineOptions, registry: ReplyRegistry) -> Result<Self> {
        let mut options = options;
        let mut redirects = 0;
        loop {
            let addr = options.address();
            let mut transport = Transport::connect(&addr, options.framing).await?;
            match negotiate(&mut transport, &options).await {
                Ok(handshake) => return Ok(Self::start(transport, handshake, options, registry)),
                Err(EngineError::Redirect { address }) if redirects < options.max_redirects => {
                    redirects += 1;
                    let (host, port) = split_address(&address, options.port)?;
                    tracing::info!(from = %addr, to = %address, redirects, "following redirect");
                    options.host = host;
                    options.port = port;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn start(
        transport: Transport,
        handshake: Handshake,
        options: EngineOptions,
        registry: ReplyRegistry,
    ) -> Self {
        let capacity = options.capacity();
        let (commands, command_rx) = mpsc::channel(capacity);
        let (outbound, outbound_rx) = mpsc::channel(capacity);

        let shared = Arc::new(Shared {
            options,
            handshake,
            next_id: AtomicI64::new(1),
            state: RwLock::new(EngineState::Ready),
            fatal: OnceLock::new(),
            commands,
            outbound,
            stop_requested: Latch::new(),
            terminated: Latch::new(),
            exited: Latch::new(),
        });

        let (reader, writer) = transport.into_split();
        tokio::spawn(run(
            shared.clone(),
            reader,
            writer,
            registry,
            command_rx,
            outbound_rx,
        ));

        Self { shared }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Negotiated server version.
    pub fn server_version(&self) -> i32 {
        self.shared.handshake.server_version
    }

    /// Server time reported during the handshake.
    pub fn server_time(&self) -> &str {
        &self.shared.handshake.server_time
    }

    pub fn client_id(&self) -> i32 {
        self.shared.options.client_id
    }

    pub fn options(&self) -> &EngineOptions {
        &self.shared.options
    }

    /// Latest state. Becomes terminal once the tasks have shut down.
    pub fn state(&self) -> EngineState {
        *self.shared.state.read()
    }

    /// The error that terminated the engine, if any.
    pub fn fatal_error(&self) -> Option<EngineError> {
        self.shared.fatal.get().cloned()
    }

    /// Whether the engine has begun terminating.
    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.is_fired()
    }

    fn terminal_error(&self) -> EngineError {
        self.fatal_error().unwrap_or(EngineError::Terminated)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// A fresh correlation id: positive, increasing, never reused.
    pub fn next_request_id(&self) -> i64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Encode and write one request, waiting for the write to complete.
    ///
    /// Encoding happens here, so a request the server cannot accept fails
    /// with [`EngineError::Unsupported`] before anything is queued.
    pub async fn send(&self, request: &dyn Request) -> Result<()> {
        if self.is_terminated() {
            return Err(self.terminal_error());
        }
        let bytes = encode_request(request, self.server_version(), self.shared.options.framing)?;
        tracing::trace!(code = request.code(), id = ?request.id(), len = bytes.len(), "send");

        let (done, done_rx) = oneshot::channel();
        tokio::select! {
            sent = self.shared.outbound.send(Outbound { bytes, done }) => {
                if sent.is_err() {
                    return Err(self.terminal_error());
                }
            }
            _ = self.shared.terminated.wait() => return Err(self.terminal_error()),
        }
        tokio::select! {
            result = done_rx => result.unwrap_or_else(|_| Err(self.terminal_error())),
            _ = self.shared.terminated.wait() => Err(self.terminal_error()),
        }
    }

    /// Route replies carrying `id` to `sink`, replacing any previous sink
    /// for that id. [`UNMATCHED_REPLY_ID`] adds `sink` to the unmatched set.
    pub async fn subscribe(&self, sink: ReplySink, id: i64) -> Result<()> {
        self.command(move |registry| registry.subscribe(sink, id))
            .await
    }

    /// Undo [`subscribe`](Self::subscribe). A no-op if `sink` is not the
    /// one registered under `id`.
    pub async fn unsubscribe(&self, sink: &ReplySink, id: i64) -> Result<()> {
        let sink = sink.clone();
        self.command(move |registry| registry.unsubscribe(&sink, id))
            .await
    }

    /// Receive every reply regardless of id.
    pub async fn subscribe_all(&self, sink: ReplySink) -> Result<()> {
        self.command(move |registry| add_unique(&mut registry.all, sink))
            .await
    }

    pub async fn unsubscribe_all(&self, sink: &ReplySink) -> Result<()> {
        let sink = sink.clone();
        self.command(move |registry| remove_sink(&mut registry.all, &sink))
            .await
    }

    /// Be told the terminal state once. If the engine has already exited the
    /// state is delivered right away.
    pub async fn subscribe_state(&self, sink: StateSink) -> Result<()> {
        if !self.shared.exited.is_fired() {
            let (ack, ack_rx) = oneshot::channel();
            let pending = sink.clone();
            let cmd: Command = Box::new(move |registry: &mut Registry| {
                add_unique(&mut registry.state, pending);
                let _ = ack.send(());
            });
            // Commands queued before shutdown are still executed, so the
            // sink is either registered or the engine has already exited.
            if self.shared.commands.send(cmd).await.is_ok() {
                tokio::select! {
                    acked = ack_rx => if acked.is_ok() { return Ok(()) },
                    _ = self.shared.exited.wait() => {}
                }
            }
        }
        self.shared.exited.wait().await;
        let state = self.state();
        let timeout = self.shared.options.delivery_timeout();
        if sink.send_timeout(state, timeout).await.is_err() {
            tracing::warn!(?state, "state sink did not accept terminal state");
        }
        Ok(())
    }

    pub async fn unsubscribe_state(&self, sink: &StateSink) -> Result<()> {
        let sink = sink.clone();
        self.command(move |registry| remove_sink(&mut registry.state, &sink))
            .await
    }

    /// Request termination and wait until it has completed. Idempotent.
    pub async fn stop(&self) {
        if self.shared.stop_requested.fire() {
            tracing::debug!("engine stop requested");
        }
        self.shared.exited.wait().await;
    }

    /// Run `f` on the dispatch task and wait for it to finish.
    async fn command(&self, f: impl FnOnce(&mut Registry) + Send + 'static) -> Result<()> {
        if self.is_terminated() {
            return Err(self.terminal_error());
        }
        let (ack, ack_rx) = oneshot::channel();
        let cmd: Command = Box::new(move |registry: &mut Registry| {
            f(registry);
            let _ = ack.send(());
        });
        tokio::select! {
            sent = self.shared.commands.send(cmd) => {
                if sent.is_err() {
                    return Err(self.terminal_error());
                }
            }
            _ = self.shared.terminated.wait() => return Err(self.terminal_error()),
        }
        tokio::select! {
            acked = ack_rx => acked.map_err(|_| self.terminal_error()),
            _ = self.shared.terminated.wait() => Err(self.terminal_error()),
        }
    }
}

fn split_address(address: &str, default_port: u16) -> Result<(String, u16)> {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| {
                EngineError::Protocol(format!("invalid redirect address {address:?}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), default_port)),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Observer registry, owned by the dispatch task.
pub(crate) struct Registry {
    matched: HashMap<i64, ReplySink>,
    unmatched: Vec<ReplySink>,
    all: Vec<ReplySink>,
    state: Vec<StateSink>,
    delivery_timeout: Duration,
}

fn add_unique<T>(sinks: &mut Vec<mpsc::Sender<T>>, sink: mpsc::Sender<T>) {
    if !sinks.iter().any(|s| s.same_channel(&sink)) {
        sinks.push(sink);
    }
}

fn remove_sink<T>(sinks: &mut Vec<mpsc::Sender<T>>, sink: &mpsc::Sender<T>) {
    sinks.retain(|s| !s.same_channel(sink));
}

impl Registry {
    fn new(delivery_timeout: Duration) -> Self {
        Self {
            matched: HashMap::new(),
            unmatched: Vec::new(),
            all: Vec::new(),
            state: Vec::new(),
            delivery_timeout,
        }
    }

    fn subscribe(&mut self, sink: ReplySink, id: i64) {
        tracing::debug!(id, "subscribe");
        if id == UNMATCHED_REPLY_ID {
            add_unique(&mut self.unmatched, sink);
        } else {
            self.matched.insert(id, sink);
        }
    }

    fn unsubscribe(&mut self, sink: &ReplySink, id: i64) {
        tracing::debug!(id, "unsubscribe");
        if id == UNMATCHED_REPLY_ID {
            remove_sink(&mut self.unmatched, sink);
        } else if self
            .matched
            .get(&id)
            .is_some_and(|registered| registered.same_channel(sink))
        {
            self.matched.remove(&id);
        }
    }

    fn prune_closed(&mut self) {
        self.matched.retain(|_, s| !s.is_closed());
        self.unmatched.retain(|s| !s.is_closed());
        self.all.retain(|s| !s.is_closed());
    }

    /// Every distinct sink that should see `reply`, in delivery order.
    fn targets(&self, reply: &Reply) -> Vec<ReplySink> {
        let mut targets = Vec::new();
        match reply.kind {
            ReplyKind::Error => {
                for sink in self.matched.values().chain(&self.unmatched) {
                    add_unique(&mut targets, sink.clone());
                }
            }
            ReplyKind::Matched | ReplyKind::Unmatched => {
                match reply.id.and_then(|id| self.matched.get(&id)) {
                    Some(sink) => targets.push(sink.clone()),
                    None => targets.extend(self.unmatched.iter().cloned()),
                }
            }
        }
        for sink in &self.all {
            add_unique(&mut targets, sink.clone());
        }
        targets
    }

    async fn dispatch(&mut self, reply: Reply) {
        if let Some(err) = reply.server_error() {
            if err.is_warning() {
                tracing::warn!(id = err.id, code = err.code, message = %err.message, "server warning");
            } else {
                tracing::warn!(id = err.id, code = err.code, message = %err.message, "server error");
            }
        }

        self.prune_closed();
        for sink in self.targets(&reply) {
            match sink.send_timeout(reply.clone(), self.delivery_timeout).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(dropped)) => {
                    tracing::warn!(
                        code = dropped.code,
                        id = ?dropped.id,
                        timeout = ?self.delivery_timeout,
                        "sink did not accept reply in time; dropped"
                    );
                }
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(code = reply.code, "sink closed during delivery");
                }
            }
        }
    }

    async fn deliver_state(&mut self, state: EngineState) {
        for sink in self.state.drain(..) {
            for attempt in 1..=STATE_DELIVERY_ATTEMPTS {
                match sink.send_timeout(state, self.delivery_timeout).await {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(_)) => {
                        tracing::warn!(?state, attempt, "state sink did not accept state in time");
                    }
                    Err(SendTimeoutError::Closed(_)) => break,
                }
            }
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Dispatch task: owns the registry until the engine terminates.
async fn run(
    shared: Arc<Shared>,
    reader: TransportReader,
    writer: TransportWriter,
    decoders: ReplyRegistry,
    mut commands: mpsc::Receiver<Command>,
    outbound: mpsc::Receiver<Outbound>,
) {
    let capacity = shared.options.capacity();
    let (inbound_tx, mut inbound) = mpsc::channel(capacity);
    let (transmit_err_tx, mut transmit_err) = mpsc::channel(1);

    let receiver: JoinHandle<()> = tokio::spawn(receive_loop(
        reader,
        decoders,
        inbound_tx,
        shared.terminated.clone(),
    ));
    let transmitter: JoinHandle<()> = tokio::spawn(transmit_loop(
        writer,
        outbound,
        transmit_err_tx,
        shared.terminated.clone(),
    ));

    let mut registry = Registry::new(shared.options.delivery_timeout());

    let failure = loop {
        tokio::select! {
            _ = shared.stop_requested.wait() => break None,
            Some(err) = transmit_err.recv() => break Some(err),
            Some(result) = inbound.recv() => match result {
                Ok(reply) => registry.dispatch(reply).await,
                Err(err) => break Some(err),
            },
            Some(cmd) = commands.recv() => cmd(&mut registry),
        }
    };

    let state = match failure {
        None => EngineState::ExitNormal,
        Some(err) => {
            tracing::error!(error = %err, "engine terminating on error");
            let _ = shared.fatal.set(err);
            EngineState::ExitError
        }
    };
    shared.terminated.fire();

    let _ = receiver.await;
    let _ = transmitter.await;
    *shared.state.write() = state;

    commands.close();
    while let Ok(cmd) = commands.try_recv() {
        cmd(&mut registry);
    }
    registry.deliver_state(state).await;

    tracing::info!(?state, "engine exited");
    shared.exited.fire();
}

async fn receive_loop(
    mut reader: TransportReader,
    decoders: ReplyRegistry,
    inbound: mpsc::Sender<Result<Reply>>,
    terminated: Latch,
) {
    loop {
        let result = tokio::select! {
            _ = terminated.wait() => break,
            result = reader.read_reply(&decoders) => result,
        };
        let failed = result.is_err();
        if let Err(e) = &result {
            tracing::error!(error = %e, "receive failed");
        }
        tokio::select! {
            _ = terminated.wait() => break,
            sent = inbound.send(result) => if sent.is_err() { break },
        }
        if failed {
            break;
        }
    }
}

async fn transmit_loop(
    mut writer: TransportWriter,
    mut outbound: mpsc::Receiver<Outbound>,
    errors: mpsc::Sender<EngineError>,
    terminated: Latch,
) {
    loop {
        let next = tokio::select! {
            _ = terminated.wait() => break,
            next = outbound.recv() => next,
        };
        let Some(Outbound { bytes, done }) = next else {
            break;
        };
        match writer.send(&bytes).await {
            Ok(()) => {
                let _ = done.send(Ok(()));
            }
            Err(e) => {
                tracing::error!(error = %e, "transmit failed");
                let _ = done.send(Err(e.clone()));
                let _ = errors.try_send(e);
                break;
            }
        }
    }
    writer.shutdown().await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::Framing;
    use crate::message::ReplyBody;
    use crate::messages::ServerError;
    use crate::protocol::incoming;
    use tokio::net::TcpListener;

    fn reply(code: i32, id: Option<i64>) -> Reply {
        Reply::new(code, id, ReplyBody::AccountSummaryEnd)
    }

    fn error_reply() -> Reply {
        Reply::new(incoming::ERR_MSG, Some(7), ReplyBody::Error(ServerError::default()))
    }

    #[test]
    fn matched_reply_goes_to_its_sink_then_all() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (matched, _m) = mpsc::channel(4);
        let (unmatched, _u) = mpsc::channel(4);
        let (all, _a) = mpsc::channel(4);
        registry.subscribe(matched.clone(), 7);
        registry.subscribe(unmatched.clone(), UNMATCHED_REPLY_ID);
        add_unique(&mut registry.all, all.clone());

        let targets = registry.targets(&reply(incoming::ACCOUNT_SUMMARY_END, Some(7)));
        assert_eq!(targets.len(), 2);
        assert!(targets[0].same_channel(&matched));
        assert!(targets[1].same_channel(&all));
    }

    #[test]
    fn unknown_id_goes_to_unmatched() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (matched, _m) = mpsc::channel(4);
        let (unmatched, _u) = mpsc::channel(4);
        registry.subscribe(matched, 7);
        registry.subscribe(unmatched.clone(), UNMATCHED_REPLY_ID);

        let targets = registry.targets(&reply(incoming::ACCOUNT_SUMMARY_END, Some(8)));
        assert_eq!(targets.len(), 1);
        assert!(targets[0].same_channel(&unmatched));
    }

    #[test]
    fn error_fans_out_once_per_distinct_sink() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (shared_sink, _s) = mpsc::channel(4);
        let (other, _o) = mpsc::channel(4);
        registry.subscribe(shared_sink.clone(), 1);
        registry.subscribe(shared_sink.clone(), 2);
        registry.subscribe(shared_sink.clone(), UNMATCHED_REPLY_ID);
        registry.subscribe(other.clone(), 3);
        add_unique(&mut registry.all, shared_sink.clone());

        let targets = registry.targets(&error_reply());
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn resubscribe_replaces_and_unsubscribe_checks_owner() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (first, _f) = mpsc::channel(4);
        let (second, _s) = mpsc::channel(4);
        registry.subscribe(first.clone(), 5);
        registry.subscribe(second.clone(), 5);
        assert!(registry.matched[&5].same_channel(&second));

        registry.unsubscribe(&first, 5);
        assert!(registry.matched.contains_key(&5));
        registry.unsubscribe(&second, 5);
        assert!(!registry.matched.contains_key(&5));
    }

    #[tokio::test]
    async fn slow_sink_drops_reply_without_blocking() {
        let mut registry = Registry::new(Duration::from_millis(20));
        let (slow, mut slow_rx) = mpsc::channel(1);
        let (fast, mut fast_rx) = mpsc::channel(4);
        registry.subscribe(slow.clone(), UNMATCHED_REPLY_ID);
        registry.subscribe(fast, UNMATCHED_REPLY_ID);

        // Fill the slow sink so the next delivery times out.
        slow.send(reply(1, None)).await.unwrap();
        registry.dispatch(reply(2, None)).await;

        assert_eq!(fast_rx.recv().await.unwrap().code, 2);
        assert_eq!(slow_rx.recv().await.unwrap().code, 1);
        assert!(slow_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_sinks_are_pruned() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (sink, rx) = mpsc::channel(1);
        registry.subscribe(sink, 9);
        drop(rx);
        registry.dispatch(reply(1, Some(9))).await;
        assert!(registry.matched.is_empty());
    }

    #[tokio::test]
    async fn state_is_delivered_once_per_sink() {
        let mut registry = Registry::new(Duration::from_millis(10));
        let (sink, mut rx) = mpsc::channel(4);
        add_unique(&mut registry.state, sink.clone());
        add_unique(&mut registry.state, sink);
        registry.deliver_state(EngineState::ExitError).await;
        assert_eq!(rx.recv().await, Some(EngineState::ExitError));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn write_failure_reaches_sender_and_dispatcher() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let transport = Transport::connect(&addr, Framing::V100).await.unwrap();

        // Reset the connection from the gateway side.
        let peer = accept.await.unwrap();
        peer.set_linger(Some(Duration::ZERO)).unwrap();
        drop(peer);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (_reader, writer) = transport.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        let (errors_tx, mut errors_rx) = mpsc::channel(1);
        let transmitter = tokio::spawn(transmit_loop(
            writer,
            outbound_rx,
            errors_tx,
            Latch::new(),
        ));

        let mut failure = None;
        for _ in 0..50 {
            let (done, done_rx) = oneshot::channel();
            let bytes = BytesMut::from(&b"\0\0\0\x0349\0"[..]);
            outbound_tx.send(Outbound { bytes, done }).await.unwrap();
            match done_rx.await.unwrap() {
                Ok(()) => tokio::time::sleep(Duration::from_millis(10)).await,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let failure = failure.expect("writes to a reset connection kept succeeding");
        assert!(matches!(failure, EngineError::Connection(_)));

        let reported = errors_rx.recv().await.unwrap();
        assert_eq!(reported.to_string(), failure.to_string());
        transmitter.await.unwrap();
        assert!(outbound_tx.is_closed());
    }

    #[test]
    fn redirect_address_parsing() {
        assert_eq!(
            split_address("10.0.0.1:4001", 4002).unwrap(),
            ("10.0.0.1".to_string(), 4001)
        );
        assert_eq!(
            split_address("gateway", 4002).unwrap(),
            ("gateway".to_string(), 4002)
        );
        assert!(split_address("host:port", 4002).is_err());
    }
}
