// Portfolio State
// Running totals of per-position risk, per-symbol exposure, recent-N
// closed-trade performance, and the static correlation matrix. Single
// writer discipline enforced by the orchestrator (spec §4.7, §5).

use crate::config::EngineConfig;
use decision_core::{CanonicalSymbol, RawPosition, Side};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct PositionRisk {
    pub symbol: CanonicalSymbol,
    pub side: Side,
    pub risk_dollars: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ClosedTrade {
    pub profit: f64,
    pub snapshot_index: u64,
}

pub struct PortfolioState {
    config: EngineConfig,
    open_risk: Vec<PositionRisk>,
    recent_trades: VecDeque<ClosedTrade>,
    snapshot_counter: u64,
}

impl PortfolioState {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, open_risk: Vec::new(), recent_trades: VecDeque::new(), snapshot_counter: 0 }
    }

    pub fn advance_snapshot(&mut self) {
        self.snapshot_counter += 1;
    }

    /// Replace the tracked risk for `symbol` with `positions`, leaving every
    /// other symbol's tracked risk untouched — each request only carries
    /// positions for its own symbol, so portfolio-wide heat is accumulated
    /// across requests rather than replaced wholesale (spec §4.7).
    pub fn set_open_risk(&mut self, symbol: CanonicalSymbol, positions: &[PositionRisk]) {
        self.open_risk.retain(|p| p.symbol != symbol);
        self.open_risk.extend_from_slice(positions);
    }

    /// Sum of per-position risk, as a fraction of `balance` (spec §4.7).
    pub fn total_portfolio_risk_pct(&self, balance: f64) -> f64 {
        if balance.abs() < 1e-9 {
            return 0.0;
        }
        self.open_risk.iter().map(|p| p.risk_dollars).sum::<f64>() / balance
    }

    pub fn per_symbol_risk_pct(&self, symbol: CanonicalSymbol, balance: f64) -> f64 {
        if balance.abs() < 1e-9 {
            return 0.0;
        }
        self.open_risk.iter().filter(|p| p.symbol == symbol).map(|p| p.risk_dollars).sum::<f64>() / balance
    }

    /// Correlation of `symbol`/`side` with existing open risk, in `[-1, 1]`
    /// after accounting for side; callers treat values `> 0.80` as a reject
    /// trigger and `< 0.3` / `> 0.6` as sizing bonus/penalty bands.
    pub fn correlation(&self, symbol: CanonicalSymbol, side: Side) -> f64 {
        if self.open_risk.is_empty() {
            return 0.0;
        }
        let weighted: f64 = self
            .open_risk
            .iter()
            .map(|p| {
                let base = self.config.correlation.coefficient(symbol, p.symbol);
                if p.side == side {
                    base
                } else {
                    -base
                }
            })
            .sum();
        (weighted / self.open_risk.len() as f64).clamp(-1.0, 1.0)
    }

    pub fn record_closed_trade(&mut self, profit: f64) {
        self.recent_trades.push_back(ClosedTrade { profit, snapshot_index: self.snapshot_counter });
        while self.recent_trades.len() > self.config.performance_window {
            self.recent_trades.pop_front();
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.recent_trades.is_empty() {
            return 0.5;
        }
        let wins = self.recent_trades.iter().filter(|t| t.profit > 0.0).count();
        wins as f64 / self.recent_trades.len() as f64
    }

    pub fn profit_factor(&self) -> f64 {
        let gains: f64 = self.recent_trades.iter().filter(|t| t.profit > 0.0).map(|t| t.profit).sum();
        let losses: f64 = self.recent_trades.iter().filter(|t| t.profit < 0.0).map(|t| -t.profit).sum();
        if losses < 1e-9 {
            if gains > 0.0 {
                5.0
            } else {
                1.0
            }
        } else {
            gains / losses
        }
    }

    pub fn consecutive_wins(&self) -> u32 {
        self.recent_trades.iter().rev().take_while(|t| t.profit > 0.0).count() as u32
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.recent_trades.iter().rev().take_while(|t| t.profit <= 0.0).count() as u32
    }

    pub fn time_since_last_trade_norm(&self) -> f64 {
        match self.recent_trades.back() {
            Some(last) => {
                let delta = self.snapshot_counter.saturating_sub(last.snapshot_index);
                (delta as f64 / 100.0).min(1.0)
            }
            None => 1.0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Per-position risk in account-currency units (spec §4.7):
/// `|entry - SL| * tick_value / tick_size * volume`.
pub fn position_risk_dollars(position: &RawPosition, tick_value: f64, tick_size: f64) -> f64 {
    if tick_size.abs() < 1e-12 {
        return 0.0;
    }
    let stop_distance = if position.sl > 0.0 { (position.price_open - position.sl).abs() } else { 0.0 };
    stop_distance / tick_size * tick_value * position.volume
}

pub fn risk_from_positions(
    positions: &[RawPosition],
    symbol: CanonicalSymbol,
    tick_value: f64,
    tick_size: f64,
) -> Vec<PositionRisk> {
    positions
        .iter()
        .filter_map(|p| {
            let side = match p.side {
                decision_core::PositionSide::Buy => Side::Buy,
                decision_core::PositionSide::Sell => Side::Sell,
            };
            if p.symbol != symbol.as_str() {
                return None;
            }
            Some(PositionRisk {
                symbol,
                side,
                risk_dollars: position_risk_dollars(p, tick_value, tick_size),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_defaults_to_half_with_no_history() {
        let portfolio = PortfolioState::new(EngineConfig::default());
        assert_eq!(portfolio.win_rate(), 0.5);
    }

    #[test]
    fn win_rate_reflects_recent_window() {
        let mut portfolio = PortfolioState::new(EngineConfig::default());
        for _ in 0..3 {
            portfolio.record_closed_trade(100.0);
        }
        portfolio.record_closed_trade(-50.0);
        assert_eq!(portfolio.win_rate(), 0.75);
        assert_eq!(portfolio.consecutive_losses(), 1);
    }

    #[test]
    fn correlation_is_zero_with_no_open_positions() {
        let portfolio = PortfolioState::new(EngineConfig::default());
        assert_eq!(portfolio.correlation(CanonicalSymbol::Eurusd, Side::Buy), 0.0);
    }

    #[test]
    fn high_correlation_triggers_reject_band() {
        let mut portfolio = PortfolioState::new(EngineConfig::default());
        portfolio.set_open_risk(
            CanonicalSymbol::Gbpusd,
            &[PositionRisk { symbol: CanonicalSymbol::Gbpusd, side: Side::Buy, risk_dollars: 500.0 }],
        );
        let corr = portfolio.correlation(CanonicalSymbol::Eurusd, Side::Buy);
        assert!(corr > 0.80);
    }
}
