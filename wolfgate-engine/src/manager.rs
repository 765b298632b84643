//! Generic request/reply lifecycle.
//!
//! A [`Manager`] drives one logical operation (a snapshot, a stream) over an
//! [`Engine`] using three caller-supplied hooks:
//!
//! - `pre_loop` runs once and typically allocates an id, subscribes and sends
//!   the initiating request
//! - `receive` runs for every delivered reply, one invocation at a time
//! - `pre_destroy` runs once during teardown, e.g. to cancel the request
//!
//! Consumers wait on [`Manager::refresh`], which yields `true` per update and
//! `false` once no further updates will arrive. [`Manager::fatal_error`] then
//! tells whether the operation failed.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::engine::{Engine, EngineState, ReplySink, StateSink};
use crate::errors::{EngineError, Result};
use crate::message::{Reply, Request};
use crate::protocol::UNMATCHED_REPLY_ID;
use crate::signal::Latch;

/// Outcome of one `receive` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    NoChange,
    /// New state is available; consumers are signalled.
    Updated,
    /// Signal once more, then shut the manager down.
    Finished,
}

/// The three hooks a concrete manager supplies.
#[async_trait]
pub trait ManagerHooks: Send + Sync + 'static {
    async fn pre_loop(&self, ctx: &ManagerContext) -> Result<()>;

    async fn receive(&self, ctx: &ManagerContext, reply: &Reply) -> Result<UpdateStatus>;

    async fn pre_destroy(&self, _ctx: &ManagerContext) {}
}

// ============================================================================
// ManagerContext
// ============================================================================

/// Engine access for hooks. Subscriptions made here are undone at teardown.
pub struct ManagerContext {
    engine: Engine,
    sink: ReplySink,
    subscriptions: Mutex<Vec<i64>>,
}

impl ManagerContext {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn next_request_id(&self) -> i64 {
        self.engine.next_request_id()
    }

    /// Route replies for `id` to this manager.
    pub async fn subscribe(&self, id: i64) -> Result<()> {
        self.engine.subscribe(self.sink.clone(), id).await?;
        self.subscriptions.lock().push(id);
        Ok(())
    }

    /// Route unmatched replies to this manager.
    pub async fn subscribe_unmatched(&self) -> Result<()> {
        self.subscribe(UNMATCHED_REPLY_ID).await
    }

    pub async fn send(&self, request: &dyn Request) -> Result<()> {
        self.engine.send(request).await
    }

    async fn unsubscribe_all(&self) {
        let ids = std::mem::take(&mut *self.subscriptions.lock());
        for id in ids {
            // Fails only once the engine is gone, which drops the sink anyway.
            let _ = self.engine.unsubscribe(&self.sink, id).await;
        }
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Handle to a running manager. Clones share the same instance.
pub struct Manager<H: ManagerHooks> {
    inner: Arc<Inner<H>>,
}

impl<H: ManagerHooks> Clone for Manager<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<H> {
    hooks: Arc<H>,
    ctx: Arc<ManagerContext>,
    state_sink: StateSink,
    refresh: tokio::sync::Mutex<mpsc::Receiver<()>>,
    fatal: OnceLock<EngineError>,
    close_requested: Latch,
    torn_down: Latch,
}

impl<H: ManagerHooks> Manager<H> {
    /// Subscribe to engine state and spawn the coordination task.
    pub async fn start(engine: &Engine, hooks: H) -> Result<Self> {
        let (state_sink, state_rx) = mpsc::channel(1);
        engine.subscribe_state(state_sink.clone()).await?;

        let (sink, replies) = mpsc::channel(engine.options().capacity());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        let inner = Arc::new(Inner {
            hooks: Arc::new(hooks),
            ctx: Arc::new(ManagerContext {
                engine: engine.clone(),
                sink,
                subscriptions: Mutex::new(Vec::new()),
            }),
            state_sink,
            refresh: tokio::sync::Mutex::new(refresh_rx),
            fatal: OnceLock::new(),
            close_requested: Latch::new(),
            torn_down: Latch::new(),
        });

        tokio::spawn(run(inner.clone(), replies, state_rx, refresh_tx));
        Ok(Self { inner })
    }

    pub fn hooks(&self) -> &H {
        &self.inner.hooks
    }

    /// Wait for the next update.
    ///
    /// Returns `false` once the manager has finished, failed or closed; every
    /// later call returns `false` immediately.
    ///
    /// The refresh channel holds one unread update. The manager parks on the
    /// second, so it stops consuming replies until this is called again.
    pub async fn refresh(&self) -> bool {
        self.inner.refresh.lock().await.recv().await.is_some()
    }

    /// Tear the manager down and wait until teardown has completed.
    ///
    /// Safe to call repeatedly and concurrently; teardown runs once.
    pub async fn close(&self) {
        if self.inner.close_requested.fire() {
            tracing::debug!("manager close requested");
        }
        self.inner.torn_down.wait().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.torn_down.is_fired()
    }

    /// The error that ended the manager, if any. Set at most once.
    pub fn fatal_error(&self) -> Option<EngineError> {
        self.inner.fatal.get().cloned()
    }
}

/// Coordination task.
async fn run<H: ManagerHooks>(
    inner: Arc<Inner<H>>,
    mut replies: mpsc::Receiver<Reply>,
    mut states: mpsc::Receiver<EngineState>,
    refresh: mpsc::Sender<()>,
) {
    if let Err(err) = drive(&inner, &mut replies, &mut states, &refresh).await {
        tracing::debug!(error = %err, "manager failed");
        let _ = inner.fatal.set(err);
    }

    inner.ctx.unsubscribe_all().await;
    let _ = inner.ctx.engine.unsubscribe_state(&inner.state_sink).await;
    inner.hooks.pre_destroy(&inner.ctx).await;
    drop(refresh);
    drop(replies);

    tracing::debug!("manager torn down");
    inner.torn_down.fire();
}

async fn drive<H: ManagerHooks>(
    inner: &Inner<H>,
    replies: &mut mpsc::Receiver<Reply>,
    states: &mut mpsc::Receiver<EngineState>,
    refresh: &mpsc::Sender<()>,
) -> Result<()> {
    tokio::select! {
        result = inner.hooks.pre_loop(&inner.ctx) => result?,
        _ = inner.close_requested.wait() => return Ok(()),
    }

    loop {
        tokio::select! {
            _ = inner.close_requested.wait() => return Ok(()),
            state = states.recv() => match state {
                Some(EngineState::ExitError) => {
                    let err = inner.ctx.engine.fatal_error().unwrap_or_else(|| {
                        EngineError::Disconnected("engine exited with an error".into())
                    });
                    return Err(err);
                }
                Some(EngineState::Ready) => {}
                Some(EngineState::ExitNormal) | None => return Ok(()),
            },
            reply = replies.recv() => {
                let Some(reply) = reply else { return Ok(()) };
                let hooks = inner.hooks.clone();
                let ctx = inner.ctx.clone();
                let status = tokio::spawn(async move { hooks.receive(&ctx, &reply).await })
                    .await
                    .map_err(|e| EngineError::Hook(format!("receive hook aborted: {e}")))??;
                match status {
                    UpdateStatus::NoChange => {}
                    UpdateStatus::Updated => {
                        if !signal(inner, refresh).await {
                            return Ok(());
                        }
                    }
                    UpdateStatus::Finished => {
                        signal(inner, refresh).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Hand one update to the consumer. `false` if the manager is closing.
///
/// Returns at once while the refresh slot is free, otherwise waits for the
/// consumer to take the pending update.
async fn signal<H>(inner: &Inner<H>, refresh: &mpsc::Sender<()>) -> bool {
    tokio::select! {
        biased;
        sent = refresh.send(()) => sent.is_ok(),
        _ = inner.close_requested.wait() => false,
    }
}
