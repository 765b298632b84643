//! Manager lifecycle tests: refresh signalling, teardown, and `sink_manager`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;

use tokio::sync::mpsc;

use common::{recv, MockGateway, WAIT};
use wolfgate_engine::managers::{AccountSummaryManager, CurrentTimeManager, PositionsManager};
use wolfgate_engine::messages::ReqCurrentTime;
use wolfgate_engine::protocol::outgoing;
use wolfgate_engine::{
    sink_manager, Engine, EngineError, Manager, ManagerContext, ManagerHooks, Reply,
    UpdateStatus,
};

const SV: i32 = 176;

async fn connected() -> (MockGateway, Engine) {
    let mut gw = MockGateway::start(SV).await;
    let engine = Engine::connect(gw.options()).await.unwrap();
    gw.expect_request(outgoing::START_API).await;
    (gw, engine)
}

fn position_row(con_id: &str, qty: &str) -> Vec<String> {
    [
        "61", "3", "DU1", con_id, "AAPL", "STK", "", "0", "", "", "NASDAQ", "USD", "AAPL",
        "NMS", qty, "150.5",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn reply_owned(gw: &MockGateway, parts: &[String]) {
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    gw.reply(&refs);
}

async fn refresh(manager: &Manager<impl ManagerHooks>) -> bool {
    tokio::time::timeout(WAIT, manager.refresh())
        .await
        .expect("timed out waiting for refresh")
}

// ============================================================================
// Refresh semantics
// ============================================================================

#[tokio::test]
async fn updated_then_finished_signals_twice_then_closes() {
    let (mut gw, engine) = connected().await;
    let summary = AccountSummaryManager::start(&engine, "All", vec!["NetLiquidation".into()])
        .await
        .unwrap();

    let request = gw.expect_request(outgoing::REQ_ACCOUNT_SUMMARY).await;
    let req_id = request[2].clone();
    assert_eq!(request[3], "All");
    assert_eq!(request[4], "NetLiquidation");
    assert_eq!(Some(req_id.parse::<i64>().unwrap()), summary.req_id());

    gw.reply(&["63", "1", &req_id, "DU1", "NetLiquidation", "1000.00", "USD"]);
    gw.reply(&["64", "1", &req_id]);

    let manager = summary.manager();
    assert!(refresh(manager).await);
    assert!(refresh(manager).await);
    assert!(!refresh(manager).await);
    assert!(!refresh(manager).await);
    assert!(manager.fatal_error().is_none());

    let values = summary.values();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, "1000.00");

    let cancel = gw.expect_request(outgoing::CANCEL_ACCOUNT_SUMMARY).await;
    assert_eq!(cancel[2], req_id);
    engine.stop().await;
}

#[tokio::test]
async fn server_error_for_request_is_fatal_to_manager_only() {
    let (mut gw, engine) = connected().await;
    let summary = AccountSummaryManager::start(&engine, "All", vec!["BuyingPower".into()])
        .await
        .unwrap();
    let req_id = gw.expect_request(outgoing::REQ_ACCOUNT_SUMMARY).await[2].clone();

    // A warning is informational.
    gw.reply(&["4", "2", "-1", "2104", "Market data farm connection is OK", ""]);
    gw.reply(&["4", "2", &req_id, "322", "Duplicate ticker id", ""]);

    let manager = summary.manager();
    assert!(!refresh(manager).await);
    match manager.fatal_error() {
        Some(EngineError::Server { code, .. }) => assert_eq!(code, 322),
        other => panic!("expected Server error, got {other:?}"),
    }
    assert!(engine.fatal_error().is_none());
    assert!(!engine.is_terminated());
    engine.stop().await;
}

#[tokio::test]
async fn engine_failure_closes_manager_without_finish() {
    let (mut gw, engine) = connected().await;
    let positions = PositionsManager::start(&engine).await.unwrap();
    gw.expect_request(outgoing::REQ_POSITIONS).await;

    reply_owned(&gw, &position_row("265598", "10"));
    let manager = positions.manager();
    assert!(refresh(manager).await);

    gw.close();
    assert!(!refresh(manager).await);
    assert!(matches!(
        manager.fatal_error(),
        Some(EngineError::Disconnected(_))
    ));
    assert!(engine.fatal_error().is_some());
    assert_eq!(positions.positions().len(), 1);
}

#[tokio::test]
async fn positions_replace_rows_for_same_contract() {
    let (mut gw, engine) = connected().await;
    let positions = PositionsManager::start(&engine).await.unwrap();
    gw.expect_request(outgoing::REQ_POSITIONS).await;

    reply_owned(&gw, &position_row("1", "10"));
    reply_owned(&gw, &position_row("2", "5"));
    reply_owned(&gw, &position_row("1", "12.5"));
    gw.reply(&["62", "1"]);

    let (updates, outcome) = sink_manager(positions.manager(), WAIT, usize::MAX).await;
    outcome.unwrap();
    // Three rows plus the final signal for POSITION_END.
    assert_eq!(updates, 4);

    let rows = positions.positions();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].con_id, 1);
    assert_eq!(rows[0].position, Decimal::new(125, 1));
    assert_eq!(rows[1].con_id, 2);
    gw.expect_request(outgoing::CANCEL_POSITIONS).await;
    engine.stop().await;
}

#[tokio::test]
async fn current_time_finishes_on_first_answer() {
    let (mut gw, engine) = connected().await;
    let clock = CurrentTimeManager::start(&engine).await.unwrap();
    assert_eq!(gw.next_request().await, vec!["49", "1"]);

    gw.reply(&["49", "1", "1700000000"]);
    let (updates, outcome) = sink_manager(clock.manager(), WAIT, 1).await;
    outcome.unwrap();
    assert_eq!(updates, 1);
    assert_eq!(clock.time().unwrap().timestamp(), 1_700_000_000);
    engine.stop().await;
}

#[derive(Default)]
struct EveryReplyUpdates {
    received: Arc<AtomicUsize>,
}

#[async_trait]
impl ManagerHooks for EveryReplyUpdates {
    async fn pre_loop(&self, ctx: &ManagerContext) -> wolfgate_engine::Result<()> {
        ctx.subscribe_unmatched().await?;
        ctx.send(&ReqCurrentTime).await
    }

    async fn receive(
        &self,
        _ctx: &ManagerContext,
        _reply: &Reply,
    ) -> wolfgate_engine::Result<UpdateStatus> {
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(UpdateStatus::Updated)
    }
}

#[tokio::test]
async fn unread_update_holds_back_further_replies() {
    let (mut gw, engine) = connected().await;
    let hooks = EveryReplyUpdates::default();
    let received = hooks.received.clone();
    let manager = Manager::start(&engine, hooks).await.unwrap();

    gw.expect_request(outgoing::REQ_CURRENT_TIME).await;
    let (all, mut all_rx) = mpsc::channel(8);
    engine.subscribe_all(all).await.unwrap();

    for _ in 0..3 {
        gw.reply(&["49", "1", "1700000001"]);
        recv(&mut all_rx).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    // One update sits unread in the refresh slot; the next receive is parked
    // handing over its update, so later replies wait in the manager's queue.
    assert_eq!(received.load(Ordering::SeqCst), 2);

    assert!(refresh(&manager).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(received.load(Ordering::SeqCst), 3);

    manager.close().await;
    assert!(manager.fatal_error().is_none());
    engine.stop().await;
}

// ============================================================================
// sink_manager
// ============================================================================

#[tokio::test]
async fn sink_manager_closes_after_min_updates() {
    let (mut gw, engine) = connected().await;
    let positions = PositionsManager::start(&engine).await.unwrap();
    gw.expect_request(outgoing::REQ_POSITIONS).await;

    let (all, mut all_rx) = mpsc::channel(8);
    engine.subscribe_all(all).await.unwrap();
    for con_id in ["1", "2", "3"] {
        reply_owned(&gw, &position_row(con_id, "1"));
    }
    // All-traffic sinks are served after the manager's sink, so every row
    // is queued for the manager once the third arrives here.
    for _ in 0..3 {
        recv(&mut all_rx).await;
    }

    let started = Instant::now();
    let (updates, outcome) = sink_manager(positions.manager(), Duration::from_secs(5), 2).await;
    outcome.unwrap();
    assert_eq!(updates, 3);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(positions.manager().is_closed());
    gw.expect_request(outgoing::CANCEL_POSITIONS).await;
    engine.stop().await;
}

#[tokio::test]
async fn sink_manager_times_out_and_closes() {
    let (mut gw, engine) = connected().await;
    let positions = PositionsManager::start(&engine).await.unwrap();
    gw.expect_request(outgoing::REQ_POSITIONS).await;

    reply_owned(&gw, &position_row("1", "1"));
    let (updates, outcome) =
        sink_manager(positions.manager(), Duration::from_millis(500), 2).await;
    assert!(matches!(outcome, Err(EngineError::Timeout(_))));
    assert_eq!(updates, 1);
    assert!(positions.manager().is_closed());
    engine.stop().await;
}

// ============================================================================
// Close
// ============================================================================

#[derive(Default)]
struct Counting {
    destroyed: Arc<AtomicUsize>,
}

#[async_trait]
impl ManagerHooks for Counting {
    async fn pre_loop(&self, ctx: &ManagerContext) -> wolfgate_engine::Result<()> {
        ctx.subscribe_unmatched().await
    }

    async fn receive(
        &self,
        _ctx: &ManagerContext,
        _reply: &Reply,
    ) -> wolfgate_engine::Result<UpdateStatus> {
        Ok(UpdateStatus::NoChange)
    }

    async fn pre_destroy(&self, _ctx: &ManagerContext) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn close_is_idempotent_and_waits_for_teardown() {
    let (_gw, engine) = connected().await;
    let hooks = Counting::default();
    let destroyed = hooks.destroyed.clone();
    let manager = Manager::start(&engine, hooks).await.unwrap();

    let other = manager.clone();
    let (_, _) = tokio::join!(manager.close(), other.close());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(manager.is_closed());

    manager.close().await;
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(!refresh(&manager).await);
    assert!(manager.fatal_error().is_none());
    engine.stop().await;
}

#[tokio::test]
async fn manager_on_stopped_engine_fails_to_start() {
    let (_gw, engine) = connected().await;
    engine.stop().await;
    // State subscription still succeeds after exit, so start reports the
    // failure through the manager itself.
    let manager = Manager::start(&engine, Counting::default()).await.unwrap();
    assert!(!refresh(&manager).await);
    assert!(matches!(
        manager.fatal_error(),
        Some(EngineError::Terminated)
    ));
}
