// Entry Decider
// (EnhancedContext, score, ML) -> {approve, side, reason, quality} (spec §4.4).

use crate::context::EnhancedContext;
use crate::ensemble_predictor::MlDirection;
use crate::market_scorer::ScoreResult;
use decision_core::Side;

pub struct EntryDecision {
    pub approve: bool,
    pub side: Option<Side>,
    pub reason: &'static str,
    pub quality: f64,
}

pub fn decide(context: &EnhancedContext, score: &ScoreResult, portfolio_heat_pct: f64) -> EntryDecision {
    let reject = |reason: &'static str| EntryDecision { approve: false, side: None, reason, quality: 0.0 };

    let Some(side) = context.ml_direction.as_side() else {
        return reject("no model");
    };

    if score.score < 55.0 {
        return reject("score below entry floor");
    }

    let (agree_count, _) = context.alignment(side);
    if agree_count < 2 {
        return reject("core alignment below 2/3");
    }

    let required_confidence = match agree_count {
        3 => 60.0,
        2 => 65.0,
        1 => 73.0,
        _ => return reject("core alignment below 2/3"),
    };
    if context.ml_confidence < required_confidence {
        return reject("ml confidence below adaptive floor");
    }

    let trend_majority = [
        decision_core::Timeframe::H1,
        decision_core::Timeframe::H4,
        decision_core::Timeframe::D1,
    ]
    .iter()
    .map(|tf| context.trend(*tf))
    .sum::<f64>()
        / 3.0;
    let conflict = match (context.ml_direction, trend_majority) {
        (MlDirection::Buy, majority) if majority < 0.5 => true,
        (MlDirection::Sell, majority) if majority >= 0.5 => true,
        _ => false,
    };
    if conflict {
        return reject("ml/trend direction conflict");
    }

    // spec §4.4 rule 7: reject if *adding this trade at its base risk* would
    // push total portfolio risk past the ceiling, not just the heat already
    // on the books (spec §8 invariant 5, §8 scenario 6).
    if portfolio_heat_pct + crate::position_sizer::BASE_RISK_FRACTION >= 0.05 {
        return reject("portfolio heat");
    }

    EntryDecision { approve: true, side: Some(side), reason: "approved", quality: score.score / 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ensemble_predictor::Prediction;
    use crate::portfolio_state::PortfolioState;
    use decision_core::{Account, CanonicalSymbol, CurrentPrice, FeatureVector, Timeframe};
    use std::collections::HashMap;

    fn context(agree_trends: (f64, f64, f64), confidence: f64) -> EnhancedContext {
        let mut trend = HashMap::new();
        trend.insert(Timeframe::H1, agree_trends.0);
        trend.insert(Timeframe::H4, agree_trends.1);
        trend.insert(Timeframe::D1, agree_trends.2);

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
            Prediction { direction: MlDirection::Buy, confidence },
            false,
            0.0010,
            0.0,
            0.0,
            0.0,
            &portfolio,
            4_000.0,
            10_000.0,
        )
    }

    #[test]
    fn full_alignment_and_confidence_is_approved() {
        let context = context((0.58, 0.60, 0.57), 72.0);
        let score = crate::market_scorer::score(&context, Side::Buy, &EngineConfig::default());
        let decision = decide(&context, &score, 0.0);
        assert!(decision.approve, "{}", decision.reason);
    }

    #[test]
    fn confidence_one_point_below_adaptive_floor_is_rejected() {
        let context = context((0.58, 0.60, 0.57), 59.9);
        let score = crate::market_scorer::score(&context, Side::Buy, &EngineConfig::default());
        let decision = decide(&context, &score, 0.0);
        assert!(!decision.approve);
    }

    #[test]
    fn portfolio_heat_at_ceiling_is_rejected() {
        let context = context((0.58, 0.60, 0.57), 72.0);
        let score = crate::market_scorer::score(&context, Side::Buy, &EngineConfig::default());
        let decision = decide(&context, &score, 0.05);
        assert!(!decision.approve);
        assert_eq!(decision.reason, "portfolio heat");
    }
}
