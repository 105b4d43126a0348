// Position Manager
// (EnhancedContext, position, metadata, PortfolioState) -> decision, for one
// open position (spec §4.6). Rules evaluated in order; pyramiding and DCA
// are checked before exit logic.

use crate::context::EnhancedContext;
use decision_core::{Decision, PositionMetadata, RawPosition, Side};

const IGNORE_SMALL_LOSS_FLOOR: f64 = 0.005;

#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    context: &EnhancedContext,
    position: &RawPosition,
    metadata: &mut PositionMetadata,
    market_score: f64,
    symbol_risk_pct: f64,
    max_portfolio_heat_pct: f64,
) -> Decision {
    let side = match position.side {
        decision_core::PositionSide::Buy => Side::Buy,
        decision_core::PositionSide::Sell => Side::Sell,
    };
    metadata.record_ml_agreement(context.ml_direction.as_side() == Some(side));

    let initial_risk_dollars = initial_risk_dollars(position, metadata);
    let mut profit_pct_of_risk = if initial_risk_dollars.abs() > 1e-9 {
        position.profit / initial_risk_dollars
    } else {
        0.0
    };
    if profit_pct_of_risk.abs() < IGNORE_SMALL_LOSS_FLOOR {
        profit_pct_of_risk = 0.0;
    }

    let p_recover = recovery_probability(context, side);
    let p_cont = continuation_probability(context, side);
    let p_rev = reversal_probability(context, side);

    if let Some(decision) =
        try_pyramid(context, position, metadata, profit_pct_of_risk, p_cont, symbol_risk_pct, max_portfolio_heat_pct)
    {
        return decision;
    }

    if let Some(decision) = try_dca(context, side, metadata, profit_pct_of_risk, p_recover, market_score) {
        return decision;
    }

    let (progress, distance_to_target) = progress_to_target(context, position, side);
    if let Some(decision) = try_partial_exit(position, progress, p_rev, p_cont) {
        return decision;
    }

    if let Some(decision) = try_full_exit(profit_pct_of_risk, p_cont, distance_to_target, initial_risk_dollars) {
        return decision;
    }

    Decision::hold("no management action triggered")
}

fn initial_risk_dollars(position: &RawPosition, metadata: &PositionMetadata) -> f64 {
    if position.sl > 0.0 && metadata.initial_volume > 0.0 {
        (position.price_open - position.sl).abs() * metadata.initial_volume
    } else {
        1.0
    }
}

fn recovery_probability(context: &EnhancedContext, side: Side) -> f64 {
    let trend_strength = trend_strength_with_side(context, side);
    let ml_same_direction = if context.ml_direction.as_side() == Some(side) { context.ml_confidence / 100.0 } else { 0.0 };
    let volume_support = context.features.get("bid_ask_pressure").map(|p| (p.abs()).min(1.0)).unwrap_or(0.0);
    let alignment = context.alignment(side).1;
    let loss_severity_penalty = 1.0 - context.features.get("position_unrealized_pct").map(|p| (-p).clamp(0.0, 1.0)).unwrap_or(0.0);

    let raw = trend_strength * 0.35 + ml_same_direction * 0.25 + volume_support * 0.15 + alignment * 0.15 + loss_severity_penalty * 0.10;
    raw.max(0.15).min(1.0)
}

fn continuation_probability(context: &EnhancedContext, side: Side) -> f64 {
    let trend_strength = trend_strength_with_side(context, side);
    let momentum = context.features.get("h1_macd_alignment").unwrap_or(0.5);
    let regime_bonus = context.regime.ev_multiplier() / 1.2;
    let room_to_target = context.features.get("support_resistance_proximity").map(|p| 1.0 - p).unwrap_or(0.5);
    let low_vol_bonus = 1.0 - context.features.get("h1_volatility").unwrap_or(0.0).min(1.0);

    let raw = trend_strength * 0.40 + momentum * 0.20 + regime_bonus * 0.15 + room_to_target * 0.15 + low_vol_bonus * 0.10;
    raw.clamp(0.0, 1.0)
}

fn reversal_probability(context: &EnhancedContext, side: Side) -> f64 {
    let core = [decision_core::Timeframe::H1, decision_core::Timeframe::H4, decision_core::Timeframe::D1];
    let reversed = core
        .iter()
        .filter(|tf| {
            let t = context.trend(**tf);
            match side {
                Side::Buy => t < 0.5,
                Side::Sell => t > 0.5,
            }
        })
        .count() as f64
        / core.len() as f64;

    let ml_flip = if context.ml_direction.as_side() == Some(side.opposite()) { 1.0 } else { 0.0 };
    let volume_against = context.features.get("bid_ask_pressure").map(|p| (-p).max(0.0)).unwrap_or(0.0);
    let rsi_extreme = context.features.get("h1_rsi_value").map(|r| if r > 0.80 || r < 0.20 { 1.0 } else { 0.0 }).unwrap_or(0.0);

    (reversed * 0.50 + ml_flip * 0.20 + volume_against * 0.15 + rsi_extreme * 0.15).clamp(0.0, 1.0)
}

fn trend_strength_with_side(context: &EnhancedContext, side: Side) -> f64 {
    let t = context.trend(decision_core::Timeframe::H1);
    match side {
        Side::Buy => t,
        Side::Sell => 1.0 - t,
    }
}

#[allow(clippy::too_many_arguments)]
fn try_pyramid(
    context: &EnhancedContext,
    position: &RawPosition,
    metadata: &mut PositionMetadata,
    profit_pct_of_risk: f64,
    p_cont: f64,
    symbol_risk_pct: f64,
    max_portfolio_heat_pct: f64,
) -> Option<Decision> {
    if !(profit_pct_of_risk > 0.30) || !metadata.can_pyramid() {
        return None;
    }
    // spec §4.6 step 5: only pyramid a young position whose ML confidence
    // has stayed aligned since entry, and only if this symbol still has
    // heat budget to take on another lot.
    if position.age_minutes >= 30.0 || !metadata.ml_agreement_intact {
        return None;
    }
    if symbol_risk_pct >= max_portfolio_heat_pct {
        return None;
    }
    let room_to_target = context.features.get("support_resistance_proximity").map(|p| 1.0 - p).unwrap_or(0.5);
    let pyramid_score = 0.40 * p_cont + 0.30 * (context.ml_confidence / 100.0) + 0.30 * room_to_target;
    if pyramid_score > 0.70 {
        metadata.add_count += 1;
        return Some(Decision::ScaleIn {
            add_lots: 0.40 * metadata.initial_volume,
            reason: "pyramiding winner".to_string(),
        });
    }
    None
}

fn try_dca(
    context: &EnhancedContext,
    side: Side,
    metadata: &mut PositionMetadata,
    profit_pct_of_risk: f64,
    p_recover: f64,
    market_score: f64,
) -> Option<Decision> {
    if !(-0.80..=-0.30).contains(&profit_pct_of_risk) || !metadata.can_dca() {
        return None;
    }
    // spec §4.6 step 6 hard precondition: ML must still agree with the
    // position's side, or DCA cannot trigger even at a high recovery score.
    if context.ml_direction.as_side() != Some(side) {
        return None;
    }
    if context.regime == decision_core::Regime::Volatile {
        return None;
    }
    let dca_score = 0.40 * p_recover + 0.30 * (context.ml_confidence / 100.0) + 0.30 * (market_score / 100.0);
    if dca_score > 0.75 {
        metadata.dca_count += 1;
        return Some(Decision::Dca { add_lots: 0.30 * metadata.initial_volume, reason: "dca into conviction loser".to_string() });
    }
    None
}

fn progress_to_target(context: &EnhancedContext, position: &RawPosition, side: Side) -> (f64, f64) {
    let current_move = (position.price_current - position.price_open).abs();
    let proximity = context.features.get("support_resistance_proximity").unwrap_or(0.3);
    let distance_to_target = (context.atr_ref.max(1e-9) * 3.0 * (1.0 - proximity).max(0.1)).max(1e-9);
    let _ = side;
    let progress = current_move / (current_move + distance_to_target);
    (progress, distance_to_target)
}

fn try_partial_exit(position: &RawPosition, progress: f64, p_rev: f64, p_cont: f64) -> Option<Decision> {
    if (0.50..0.75).contains(&progress) {
        let threshold = 0.30 + 0.20 * (1.0 - p_cont);
        if p_rev > threshold {
            return Some(Decision::ScaleOut {
                reduce_lots: 0.25 * position.volume,
                reason: "partial exit at 50-75% to target".to_string(),
            });
        }
    } else if progress >= 0.75 {
        let threshold = 0.25 + 0.15 * (1.0 - p_cont);
        if p_rev > threshold {
            return Some(Decision::ScaleOut {
                reduce_lots: 0.25 * position.volume,
                reason: "partial exit beyond 75% to target".to_string(),
            });
        }
    }
    None
}

fn try_full_exit(profit_pct_of_risk: f64, p_cont: f64, distance_to_target: f64, initial_risk_dollars: f64) -> Option<Decision> {
    let target_in_risk_units = if initial_risk_dollars.abs() > 1e-9 {
        (distance_to_target / initial_risk_dollars).clamp(0.5, 3.0)
    } else {
        0.5
    };
    // "amplified by at most 1.425x" (spec §4.6 step 8): the amplification
    // scales with continuation confidence itself, capped at the 1.425x edge.
    let amplification = 1.0 + 0.425 * p_cont;
    let amplified = target_in_risk_units * amplification;
    let ev_hold = p_cont * amplified - (1.0 - p_cont) * 1.0;
    let ev_exit = profit_pct_of_risk;

    if ev_exit > ev_hold {
        return Some(Decision::Close { reason: "expected value favors closing".to_string() });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ensemble_predictor::{MlDirection, Prediction};
    use crate::portfolio_state::PortfolioState;
    use decision_core::{Account, CanonicalSymbol, CurrentPrice, FeatureVector, PositionSide, Timeframe};
    use std::collections::HashMap;

    fn context_with(h1_trend: f64, ml_confidence: f64, ml_direction: MlDirection) -> EnhancedContext {
        let mut trend = HashMap::new();
        trend.insert(Timeframe::H1, h1_trend);
        trend.insert(Timeframe::H4, h1_trend);
        trend.insert(Timeframe::D1, h1_trend);

        let portfolio = PortfolioState::new(EngineConfig::default());
        EnhancedContext::build(
            CanonicalSymbol::Xau,
            CurrentPrice { bid: 4175.0, ask: 4175.3, last: 4175.1 },
            Account {
                balance: 100_000.0,
                equity: 100_000.0,
                daily_pnl: 0.0,
                daily_start_balance: 100_000.0,
                peak_balance: 100_000.0,
                max_daily_loss: 2_000.0,
                max_total_drawdown: 5_000.0,
            },
            vec![],
            FeatureVector::neutral(),
            trend,
            Prediction { direction: ml_direction, confidence: ml_confidence },
            false,
            25.0,
            0.0,
            0.0,
            0.0,
            &portfolio,
            2_000.0,
            5_000.0,
        )
    }

    fn position(volume: f64, open: f64, current: f64, profit: f64) -> RawPosition {
        RawPosition {
            ticket: 1,
            symbol: "xau".to_string(),
            side: PositionSide::Buy,
            volume,
            price_open: open,
            price_current: current,
            sl: open - 25.0,
            tp: 0.0,
            profit,
            time: 1_700_000_000,
            age_minutes: 10.0,
        }
    }

    #[test]
    fn large_winner_with_no_reversal_signal_holds_or_manages() {
        let context = context_with(0.70, 75.0, MlDirection::Buy);
        let position = position(10.0, 4150.0, 4175.0, 250.0);
        let mut metadata = PositionMetadata::new(1, 10.0, 250.0, 1_699_999_000);
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.0, 0.05);
        assert!(!matches!(decision, Decision::Close { .. }));
    }

    #[test]
    fn dca_counter_never_exceeds_one() {
        let context = context_with(0.30, 78.0, MlDirection::Sell);
        let position = position(5.0, 4150.0, 4137.5, -62.5);
        let mut metadata = PositionMetadata::new(1, 5.0, -62.5, 1_699_999_000);
        metadata.dca_count = 1;
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.0, 0.05);
        assert!(!matches!(decision, Decision::Dca { .. }));
    }

    #[test]
    fn pyramid_is_rejected_once_position_is_older_than_thirty_minutes() {
        let context = context_with(0.70, 75.0, MlDirection::Buy);
        let mut position = position(10.0, 4150.0, 4175.0, 250.0);
        position.age_minutes = 45.0;
        let mut metadata = PositionMetadata::new(1, 10.0, 250.0, 1_699_999_000);
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.0, 0.05);
        assert!(!matches!(decision, Decision::ScaleIn { .. }));
    }

    #[test]
    fn pyramid_is_rejected_once_ml_agreement_has_broken() {
        let context = context_with(0.70, 75.0, MlDirection::Buy);
        let position = position(10.0, 4150.0, 4175.0, 250.0);
        let mut metadata = PositionMetadata::new(1, 10.0, 250.0, 1_699_999_000);
        metadata.ml_agreement_intact = false;
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.0, 0.05);
        assert!(!matches!(decision, Decision::ScaleIn { .. }));
    }

    #[test]
    fn pyramid_is_rejected_when_symbol_heat_budget_is_exhausted() {
        let context = context_with(0.70, 75.0, MlDirection::Buy);
        let position = position(10.0, 4150.0, 4175.0, 250.0);
        let mut metadata = PositionMetadata::new(1, 10.0, 250.0, 1_699_999_000);
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.05, 0.05);
        assert!(!matches!(decision, Decision::ScaleIn { .. }));
    }

    #[test]
    fn dca_is_rejected_when_ml_direction_flips_against_the_position() {
        let context = context_with(0.30, 78.0, MlDirection::Sell);
        let position = position(5.0, 4150.0, 4137.5, -62.5);
        let mut metadata = PositionMetadata::new(1, 5.0, -62.5, 1_699_999_000);
        let decision = evaluate(&context, &position, &mut metadata, 70.0, 0.0, 0.05);
        assert!(!matches!(decision, Decision::Dca { .. }));
    }
}
