//! Wire shapes for the broker adapter's JSON snapshot (spec §3, §6).
//!
//! Every field the adapter might omit is given a schema-neutral default so a
//! partially-populated snapshot never fails to deserialize; the Feature
//! Engineer and Enhanced Context builder are responsible for treating those
//! defaults as "missing" where the spec calls for a degraded context.

use serde::Deserialize;
use std::collections::HashMap;

/// Ordered multi-timeframe bar keys, newest-first within each `Vec<Bar>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

/// A single OHLCV bar. `time` is unix seconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Minimum bars a timeframe must carry to not be treated as missing (spec §3).
pub const MIN_BARS_PER_TIMEFRAME: usize = 50;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CurrentPrice {
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last: f64,
}

impl CurrentPrice {
    /// Mid of bid/ask when both are present, otherwise `last`.
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            self.last
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Account {
    pub balance: f64,
    pub equity: f64,
    #[serde(default)]
    pub daily_pnl: f64,
    pub daily_start_balance: f64,
    pub peak_balance: f64,
    pub max_daily_loss: f64,
    pub max_total_drawdown: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SymbolInfo {
    #[serde(default = "default_contract_size")]
    pub contract_size: f64,
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    #[serde(default = "default_tick_value")]
    pub tick_value: f64,
    #[serde(default = "default_min_lot")]
    pub min_lot: f64,
    #[serde(default = "default_max_lot")]
    pub max_lot: f64,
    #[serde(default = "default_lot_step")]
    pub lot_step: f64,
}

fn default_contract_size() -> f64 {
    100_000.0
}
fn default_tick_size() -> f64 {
    0.0001
}
fn default_tick_value() -> f64 {
    1.0
}
fn default_min_lot() -> f64 {
    0.01
}
fn default_max_lot() -> f64 {
    100.0
}
fn default_lot_step() -> f64 {
    0.01
}

impl Default for SymbolInfo {
    fn default() -> Self {
        Self {
            contract_size: default_contract_size(),
            tick_size: default_tick_size(),
            tick_value: default_tick_value(),
            min_lot: default_min_lot(),
            max_lot: default_max_lot(),
            lot_step: default_lot_step(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct MacdComponents {
    #[serde(default)]
    pub macd: f64,
    #[serde(default)]
    pub signal: f64,
    #[serde(default)]
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct StochasticComponents {
    #[serde(default)]
    pub k: f64,
    #[serde(default)]
    pub d: f64,
}

/// Pre-computed scalar indicators, keyed per timeframe where the indicator
/// is timeframe-dependent (spec §3: "arrive pre-computed from the adapter").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub rsi: HashMap<Timeframe, f64>,
    #[serde(default)]
    pub macd: HashMap<Timeframe, MacdComponents>,
    #[serde(default)]
    pub atr: HashMap<Timeframe, f64>,
    #[serde(default)]
    pub stochastic: HashMap<Timeframe, StochasticComponents>,
    /// Close position relative to a moving average, in percent terms.
    #[serde(default)]
    pub ma_relative: HashMap<Timeframe, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PositionSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: PositionSide,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    #[serde(default)]
    pub sl: f64,
    #[serde(default)]
    pub tp: f64,
    pub profit: f64,
    pub time: i64,
    #[serde(default)]
    pub age_minutes: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecentTrade {
    pub ticket: u64,
    pub profit: f64,
    pub volume: f64,
}

/// Optional raw order-book pressure scalars (spec §3).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bid_pressure: Option<f64>,
    #[serde(default)]
    pub ask_pressure: Option<f64>,
}

/// The full adapter -> engine request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    #[serde(default)]
    pub snapshot_time: Option<i64>,
    #[serde(default)]
    pub market_closed: bool,
    #[serde(default)]
    pub current_price: CurrentPrice,
    pub account: Account,
    #[serde(default)]
    pub symbol_info: SymbolInfo,
    #[serde(default)]
    pub timeframes: HashMap<Timeframe, Vec<Bar>>,
    #[serde(default)]
    pub indicators: Indicators,
    #[serde(default)]
    pub positions: Vec<RawPosition>,
    #[serde(default)]
    pub recent_trades: Vec<RecentTrade>,
    #[serde(default)]
    pub order_book: Option<OrderBook>,
}

impl Default for CurrentPrice {
    fn default() -> Self {
        Self { bid: 0.0, ask: 0.0, last: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_prefers_bid_ask() {
        let p = CurrentPrice { bid: 1.1000, ask: 1.1002, last: 1.0999 };
        assert!((p.mid() - 1.1001).abs() < 1e-9);
    }

    #[test]
    fn mid_falls_back_to_last() {
        let p = CurrentPrice { bid: 0.0, ask: 0.0, last: 1.2345 };
        assert_eq!(p.mid(), 1.2345);
    }

    #[test]
    fn deserializes_minimal_snapshot() {
        let json = r#"{
            "symbol": "EURUSD",
            "account": {
                "balance": 100000.0, "equity": 100000.0,
                "daily_start_balance": 100000.0, "peak_balance": 100000.0,
                "max_daily_loss": 5000.0, "max_total_drawdown": 10000.0
            }
        }"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.symbol, "EURUSD");
        assert!(snap.timeframes.is_empty());
        assert_eq!(snap.symbol_info.lot_step, 0.01);
    }
}
