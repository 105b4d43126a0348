// Market Scorer
// (EnhancedContext, hypothesised side) -> {score in [0,100], components} per
// the five weighted components of spec §4.3.

use crate::config::{BandThresholds, EngineConfig};
use crate::context::EnhancedContext;
use decision_core::{ScoreComponents, Side, Timeframe};

pub struct ScoreResult {
    pub score: f64,
    pub components: ScoreComponents,
    pub signals: Vec<String>,
}

pub fn score(context: &EnhancedContext, side: Side, config: &EngineConfig) -> ScoreResult {
    let mut signals = Vec::new();
    let bands = config.bands_for(context.symbol.class());

    let trend = trend_component(context, side, &bands, &mut signals);
    let momentum = momentum_component(context, side, &mut signals);
    let volume = volume_component(context, &mut signals);
    let structure = structure_component(context, &mut signals);
    let ml = ml_component(context);

    let weighted = trend * 0.30 + momentum * 0.25 + volume * 0.20 + structure * 0.15 + ml * 0.10;

    ScoreResult {
        score: weighted.clamp(0.0, 100.0),
        components: ScoreComponents { trend, momentum, volume, structure, ml },
        signals,
    }
}

fn trend_component(
    context: &EnhancedContext,
    side: Side,
    bands: &BandThresholds,
    signals: &mut Vec<String>,
) -> f64 {
    let weights = [(Timeframe::D1, 25.0), (Timeframe::H4, 20.0), (Timeframe::H1, 15.0), (Timeframe::M15, 10.0), (Timeframe::M5, 5.0)];
    let mut total = 0.0;

    for (tf, points) in weights {
        let t = context.trend(tf);
        let strong = match side {
            Side::Buy => t > bands.strong_buy,
            Side::Sell => t < bands.strong_sell,
        };
        let weak = match side {
            Side::Buy => t > bands.weak_buy_floor,
            Side::Sell => t < bands.weak_sell_ceiling,
        };
        if strong {
            total += points;
            signals.push(format!("{:?} trend strong for {:?}", tf, side));
        } else if weak {
            total += points / 2.0;
        }
    }

    let alignment = context.features.get("trend_alignment").unwrap_or(0.5);
    let alignment_strong = match side {
        Side::Buy => alignment >= bands.align_strong,
        Side::Sell => alignment <= bands.align_weak,
    };
    if alignment_strong {
        total += 25.0;
        signals.push("trend alignment strong".to_string());
    } else if (0.45..0.55).contains(&alignment) {
        total += 12.5;
    }

    total.clamp(0.0, 100.0)
}

fn momentum_component(context: &EnhancedContext, side: Side, signals: &mut Vec<String>) -> f64 {
    let core = [Timeframe::H1, Timeframe::H4, Timeframe::D1];
    let mut points = 0.0;

    for tf in core {
        let prefix = tf.as_str().to_lowercase();
        let rsi_alignment = context.features.get(&format!("{prefix}_rsi_alignment")).unwrap_or(0.0);
        let macd_alignment = context.features.get(&format!("{prefix}_macd_alignment")).unwrap_or(0.0);
        points += rsi_alignment * 18.0 + macd_alignment * 18.0;
    }

    if points > 0.0 {
        signals.push(format!("momentum agreement for {:?}", side));
    }

    points.min(110.0).min(100.0)
}

fn volume_component(context: &EnhancedContext, signals: &mut Vec<String>) -> f64 {
    let mut points = 0.0;

    if context.features.get("institutional_accumulation").unwrap_or(0.0) > 0.0
        || context.features.get("institutional_distribution").unwrap_or(0.0) > 0.0
    {
        points += 30.0;
        signals.push("institutional flow detected".to_string());
    }

    let pressure = context.features.get("bid_ask_pressure").unwrap_or(0.0);
    if pressure.abs() > 0.15 {
        points += 15.0;
    }

    let vol_ratio = context.features.get("h1_volume_ratio").unwrap_or(1.0);
    if vol_ratio >= 1.0 {
        points += 10.0;
    }

    if context.features.get("large_player_bar").unwrap_or(0.0) > 0.0 {
        points += 25.0;
    }

    if context.features.get("volume_spike").unwrap_or(0.0) > 0.0 {
        points += 15.0;
        signals.push("volume spike".to_string());
    }

    if pressure.abs() > 0.30 {
        points += 10.0;
    }

    points.clamp(0.0, 100.0)
}

fn structure_component(context: &EnhancedContext, signals: &mut Vec<String>) -> f64 {
    let proximity = context.features.get("support_resistance_proximity").unwrap_or(0.0);
    let confluence = context.features.get("round_number_confluence").unwrap_or(0.0)
        + context.features.get("pivot_confluence").unwrap_or(0.0);

    if proximity > 0.0 {
        signals.push("near H1 structure".to_string());
    }

    ((proximity * 60.0) + (confluence * 20.0)).clamp(0.0, 100.0)
}

fn ml_component(context: &EnhancedContext) -> f64 {
    context.ml_confidence.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble_predictor::{MlDirection, Prediction};
    use crate::portfolio_state::PortfolioState;
    use decision_core::{Account, CanonicalSymbol, CurrentPrice, FeatureVector};
    use std::collections::HashMap;

    fn context_with_trend(h1: f64, h4: f64, d1: f64) -> EnhancedContext {
        let mut trend = HashMap::new();
        trend.insert(Timeframe::H1, h1);
        trend.insert(Timeframe::H4, h4);
        trend.insert(Timeframe::D1, d1);

        let portfolio = PortfolioState::new(EngineConfig::default());
        EnhancedContext::build(
            CanonicalSymbol::Eurusd,
            CurrentPrice { bid: 1.1, ask: 1.1002, last: 1.1001 },
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
            Prediction { direction: MlDirection::Buy, confidence: 72.0 },
            false,
            0.0010,
            0.0,
            0.0,
            0.0,
            &portfolio,
            2_000.0,
            5_000.0,
        )
    }

    #[test]
    fn strong_uptrend_scores_high_on_trend_component() {
        let context = context_with_trend(0.58, 0.60, 0.57);
        let config = EngineConfig::default();
        let result = score(&context, Side::Buy, &config);
        assert!(result.components.trend > 60.0, "trend={}", result.components.trend);
    }

    #[test]
    fn flat_trend_scores_low() {
        let context = context_with_trend(0.50, 0.50, 0.50);
        let config = EngineConfig::default();
        let result = score(&context, Side::Buy, &config);
        assert!(result.components.trend < 30.0);
    }
}
