// Elite Position Sizer
// (context, side, quality, ML, entry_price, stop_price) -> {should_trade,
// lots, risk_dollars, expected_return, reasoning} (spec §4.5).

use crate::config::EngineConfig;
use crate::context::EnhancedContext;
use crate::portfolio_state::PortfolioState;
use decision_core::{CanonicalSymbol, Side, SymbolInfo};

/// Base risk as a fraction of balance before any multiplier is applied
/// (spec §4.5 step 3: `base_risk = balance * 0.005`). Exposed so the entry
/// gate can project the heat a candidate trade would add before it's sized
/// (spec §4.4 rule 7, §8 invariant 5).
pub const BASE_RISK_FRACTION: f64 = 0.005;

pub struct SizingResult {
    pub should_trade: bool,
    pub lots: f64,
    pub risk_dollars: f64,
    pub expected_return: f64,
    pub reasoning: &'static str,
}

#[allow(clippy::too_many_arguments)]
pub fn size(
    context: &EnhancedContext,
    side: Side,
    quality: f64,
    portfolio: &PortfolioState,
    entry_price: f64,
    stop_price: f64,
    symbol_info: &SymbolInfo,
    config: &EngineConfig,
    max_risk_dollars_cap: f64,
) -> SizingResult {
    let reject = |reasoning: &'static str| SizingResult {
        should_trade: false,
        lots: 0.0,
        risk_dollars: 0.0,
        expected_return: 0.0,
        reasoning,
    };

    let risk_reward = risk_reward_ratio(entry_price, stop_price, context);
    let er = quality * (context.ml_confidence / 100.0) * context.regime.ev_multiplier() * risk_reward;

    if er < 0.0 {
        return reject("expected return negative");
    }
    if er < 0.3 {
        return reject("expected return below friction floor");
    }

    let correlation = portfolio.correlation(context.symbol, side);
    if correlation > 0.80 {
        return reject("portfolio correlation too high");
    }

    let win_rate = portfolio.win_rate();
    if win_rate < 0.40 && er < 1.0 {
        return reject("win rate and ER both too low");
    }

    let base_risk = context.account.balance * BASE_RISK_FRACTION;

    let quality_mult = (0.5 + quality).clamp(0.5, 1.5);
    let diversification_mult = diversification_multiplier(correlation);
    let performance_mult = performance_multiplier(win_rate, portfolio.profit_factor());
    let ev_mult = er.clamp(0.0, 1.0);
    let vol_mult = volatility_multiplier(context);

    let risk_dollars =
        (base_risk * quality_mult * diversification_mult * performance_mult * ev_mult * vol_mult)
            .min(max_risk_dollars_cap);

    let risk_per_lot = risk_per_lot(entry_price, stop_price, symbol_info);
    if risk_per_lot <= 0.0 {
        return reject("degenerate stop distance");
    }

    let raw_lots = risk_dollars / risk_per_lot;
    let stepped_lots = (raw_lots / symbol_info.lot_step).floor() * symbol_info.lot_step;
    let symbol_cap = config.symbol_max_lot(context.symbol).unwrap_or(symbol_info.max_lot);
    let lots = stepped_lots.clamp(symbol_info.min_lot, symbol_cap.min(symbol_info.max_lot));

    if lots < symbol_info.min_lot {
        return reject("sized lot below broker minimum");
    }

    SizingResult { should_trade: true, lots, risk_dollars, expected_return: er, reasoning: "sized" }
}

/// R:R from an ATR-based stop (1.5x H1 ATR) to the first market-structure
/// target; falls back to a neutral 1.5 when structure distance is unknown.
fn risk_reward_ratio(entry_price: f64, stop_price: f64, context: &EnhancedContext) -> f64 {
    let stop_distance = (entry_price - stop_price).abs();
    if stop_distance < 1e-9 {
        return 1.5;
    }
    let structure_distance = context.features.get("support_resistance_proximity").map(|p| {
        let base = context.atr_ref.max(1e-9) * 3.0;
        base * (1.0 - p).max(0.3)
    });
    let target_distance = structure_distance.unwrap_or(stop_distance * 1.5);
    (target_distance / stop_distance).clamp(0.5, 4.0)
}

fn risk_per_lot(entry_price: f64, stop_price: f64, symbol_info: &SymbolInfo) -> f64 {
    let stop_distance = (entry_price - stop_price).abs();
    if symbol_info.tick_size.abs() < 1e-12 {
        return 0.0;
    }
    stop_distance / symbol_info.tick_size * symbol_info.tick_value
}

fn diversification_multiplier(correlation: f64) -> f64 {
    if correlation < 0.3 {
        1.0
    } else if correlation > 0.6 {
        0.7
    } else {
        1.0 - (correlation - 0.3) / 0.3 * 0.3
    }
}

fn performance_multiplier(win_rate: f64, profit_factor: f64) -> f64 {
    let win_rate_term = (win_rate - 0.5) * 0.4;
    let profit_factor_term = ((profit_factor - 1.0) / 2.0).clamp(-0.2, 0.2);
    (1.0 + win_rate_term + profit_factor_term).clamp(0.8, 1.2)
}

fn volatility_multiplier(context: &EnhancedContext) -> f64 {
    let volatility = context.features.get("h1_volatility").unwrap_or(0.0);
    let atr_z = if volatility > 0.0 { (volatility - 0.01) / 0.01 } else { 0.0 };
    if atr_z > 1.5 {
        0.5
    } else if atr_z > 0.5 {
        1.0 - (atr_z - 0.5) * 0.5
    } else {
        1.0
    }
}

/// 1.5x H1 ATR, never tighter than `max(min_stop_ticks * tick_size, 1.5*ATR)`
/// (spec §4.5 "Stop & take-profit contract").
pub fn stop_price(entry_price: f64, side: Side, atr_ref: f64, symbol_info: &SymbolInfo, min_stop_ticks: f64) -> f64 {
    let atr_stop_distance = 1.5 * atr_ref;
    let min_distance = (min_stop_ticks * symbol_info.tick_size).max(atr_stop_distance);
    match side {
        Side::Buy => entry_price - min_distance,
        Side::Sell => entry_price + min_distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble_predictor::{MlDirection, Prediction};
    use decision_core::{Account, CurrentPrice, FeatureVector, Timeframe};
    use std::collections::HashMap;

    fn context() -> EnhancedContext {
        let mut trend = HashMap::new();
        trend.insert(Timeframe::H1, 0.58);
        trend.insert(Timeframe::H4, 0.60);
        trend.insert(Timeframe::D1, 0.57);

        let portfolio = PortfolioState::new(EngineConfig::default());
        EnhancedContext::build(
            CanonicalSymbol::Eurusd,
            CurrentPrice { bid: 1.1, ask: 1.1002, last: 1.1001 },
            Account {
                balance: 200_000.0,
                equity: 200_000.0,
                daily_pnl: 0.0,
                daily_start_balance: 200_000.0,
                peak_balance: 200_000.0,
                max_daily_loss: 4_000.0,
                max_total_drawdown: 10_000.0,
            },
            vec![],
            FeatureVector::neutral(),
            trend,
            Prediction { direction: MlDirection::Buy, confidence: 72.0 },
            false,
            0.0050,
            0.0,
            0.0,
            0.0,
            &portfolio,
            4_000.0,
            10_000.0,
        )
    }

    #[test]
    fn er_below_point_three_is_rejected() {
        let context = context();
        let portfolio = PortfolioState::new(EngineConfig::default());
        let symbol_info = SymbolInfo::default();
        let result = size(&context, Side::Buy, 0.05, &portfolio, 1.10, 1.0985, &symbol_info, &EngineConfig::default(), 100_000.0);
        assert!(!result.should_trade);
    }

    #[test]
    fn healthy_setup_sizes_a_trade() {
        let context = context();
        let portfolio = PortfolioState::new(EngineConfig::default());
        let symbol_info = SymbolInfo::default();
        let result = size(&context, Side::Buy, 0.68, &portfolio, 1.10, 1.0925, &symbol_info, &EngineConfig::default(), 100_000.0);
        assert!(result.should_trade, "{}", result.reasoning);
        assert!(result.lots >= symbol_info.min_lot);
    }

    #[test]
    fn high_correlation_is_rejected() {
        let context = context();
        let mut portfolio = PortfolioState::new(EngineConfig::default());
        portfolio.set_open_risk(
            CanonicalSymbol::Gbpusd,
            &[crate::portfolio_state::PositionRisk { symbol: CanonicalSymbol::Gbpusd, side: Side::Buy, risk_dollars: 1_000.0 }],
        );
        let symbol_info = SymbolInfo::default();
        let result = size(&context, Side::Buy, 0.68, &portfolio, 1.10, 1.0925, &symbol_info, &EngineConfig::default(), 100_000.0);
        assert!(!result.should_trade);
        assert_eq!(result.reasoning, "portfolio correlation too high");
    }
}
