// Enhanced Context
// Immutable value-object combining the feature vector, account state,
// position list, ML prediction, and regime — constructed once per request
// and passed by reference into every pure scorer/decider (spec §9: replaces
// cyclic references between decision modules).

use crate::ensemble_predictor::{MlDirection, Prediction};
use crate::portfolio_state::PortfolioState;
use decision_core::{
    Account, CanonicalSymbol, CurrentPrice, FeatureVector, RawPosition, Regime, SymbolClass,
    Timeframe,
};
use std::collections::HashMap;

pub struct EnhancedContext {
    pub symbol: CanonicalSymbol,
    pub current_price: CurrentPrice,
    pub account: Account,
    pub positions: Vec<RawPosition>,
    pub ml_direction: MlDirection,
    pub ml_confidence: f64,
    pub regime: Regime,
    pub atr_ref: f64,
    pub degraded: bool,
    pub features: FeatureVector,
    pub trend_by_timeframe: HashMap<Timeframe, f64>,
    pub distance_daily: f64,
    pub distance_dd: f64,
}

impl EnhancedContext {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        symbol: CanonicalSymbol,
        current_price: CurrentPrice,
        account: Account,
        positions: Vec<RawPosition>,
        mut features: FeatureVector,
        trend_by_timeframe: HashMap<Timeframe, f64>,
        prediction: Prediction,
        degraded: bool,
        atr_h1: f64,
        atr_h4: f64,
        atr_d1: f64,
        atr_m15: f64,
        portfolio: &PortfolioState,
        distance_daily: f64,
        distance_dd: f64,
    ) -> Self {
        let regime = classify_regime(&trend_by_timeframe, &features);
        let atr_ref = fallback_atr(atr_h1, atr_d1, atr_h4, atr_m15);

        set_ml_features(&mut features, prediction);
        set_regime_features(&mut features, regime);
        set_symbol_class_features(&mut features, symbol.class());
        set_portfolio_features(&mut features, portfolio, symbol, account.balance);
        features.set("atr_ref_normalized", if current_price.mid() > 0.0 { atr_ref / current_price.mid() } else { 0.0 });
        features.set(
            "distance_daily_pct",
            if account.max_daily_loss.abs() > 1e-9 { distance_daily / account.max_daily_loss } else { 1.0 },
        );
        features.set(
            "distance_dd_pct",
            if account.max_total_drawdown.abs() > 1e-9 { distance_dd / account.max_total_drawdown } else { 1.0 },
        );
        if degraded {
            features.set("degraded", 1.0);
        }

        Self {
            symbol,
            current_price,
            account,
            positions,
            ml_direction: prediction.direction,
            ml_confidence: prediction.confidence,
            regime,
            atr_ref,
            degraded,
            features,
            trend_by_timeframe,
            distance_daily,
            distance_dd,
        }
    }

    pub fn trend(&self, tf: Timeframe) -> f64 {
        self.trend_by_timeframe.get(&tf).copied().unwrap_or(0.5)
    }

    /// Fraction of {H1, H4, D1} agreeing with the hypothesised side (spec
    /// GLOSSARY "Alignment").
    pub fn alignment(&self, side: decision_core::Side) -> (u8, f64) {
        let core = [Timeframe::H1, Timeframe::H4, Timeframe::D1];
        let agreeing = core
            .iter()
            .filter(|tf| {
                let t = self.trend(**tf);
                match side {
                    decision_core::Side::Buy => t > 0.5,
                    decision_core::Side::Sell => t < 0.5,
                }
            })
            .count() as u8;
        (agreeing, agreeing as f64 / core.len() as f64)
    }

    pub fn positions_for_symbol(&self) -> &[RawPosition] {
        &self.positions
    }
}

/// H1 ATR preferred, fallback ladder D1 -> H4 -> M15 (spec §3).
fn fallback_atr(h1: f64, d1: f64, h4: f64, m15: f64) -> f64 {
    for candidate in [h1, d1, h4, m15] {
        if candidate > 0.0 {
            return candidate;
        }
    }
    0.0
}

/// Regime derived from trend alignment and a volatility z-score (spec §3).
fn classify_regime(trend_by_timeframe: &HashMap<Timeframe, f64>, features: &FeatureVector) -> Regime {
    let h1_trend = trend_by_timeframe.get(&Timeframe::H1).copied().unwrap_or(0.5);
    let volatility = features.get("h1_volatility").unwrap_or(0.0);
    let vol_z = if volatility > 0.0 { (volatility - 0.01) / 0.01 } else { 0.0 };

    if vol_z > 1.5 {
        return Regime::Volatile;
    }

    let alignment = features.get("trend_alignment").unwrap_or(0.5);
    if alignment < 0.55 {
        return Regime::Ranging;
    }

    if h1_trend > 0.5 {
        Regime::TrendingUp
    } else {
        Regime::TrendingDown
    }
}

fn set_ml_features(features: &mut FeatureVector, prediction: Prediction) {
    features.set("ml_direction_buy", if prediction.direction == MlDirection::Buy { 1.0 } else { 0.0 });
    features.set("ml_direction_sell", if prediction.direction == MlDirection::Sell { 1.0 } else { 0.0 });
    features.set("ml_direction_hold", if prediction.direction == MlDirection::Hold { 1.0 } else { 0.0 });
    features.set("ml_confidence", prediction.confidence / 100.0);
}

fn set_regime_features(features: &mut FeatureVector, regime: Regime) {
    features.set("regime_trending_up", if regime == Regime::TrendingUp { 1.0 } else { 0.0 });
    features.set("regime_trending_down", if regime == Regime::TrendingDown { 1.0 } else { 0.0 });
    features.set("regime_ranging", if regime == Regime::Ranging { 1.0 } else { 0.0 });
    features.set("regime_volatile", if regime == Regime::Volatile { 1.0 } else { 0.0 });
}

fn set_symbol_class_features(features: &mut FeatureVector, class: SymbolClass) {
    features.set("symbol_class_forex", if class == SymbolClass::Forex { 1.0 } else { 0.0 });
    features.set("symbol_class_indices", if class == SymbolClass::Indices { 1.0 } else { 0.0 });
    features.set("symbol_class_commodities", if class == SymbolClass::Commodities { 1.0 } else { 0.0 });
}

fn set_portfolio_features(
    features: &mut FeatureVector,
    portfolio: &PortfolioState,
    symbol: CanonicalSymbol,
    balance: f64,
) {
    let heat = portfolio.total_portfolio_risk_pct(balance);
    features.set("portfolio_heat_pct", heat);
    features.set("correlation_buy", portfolio.correlation(symbol, decision_core::Side::Buy));
    features.set("correlation_sell", portfolio.correlation(symbol, decision_core::Side::Sell));
    features.set("win_rate_recent", portfolio.win_rate());
    features.set("profit_factor_recent", portfolio.profit_factor().min(5.0) / 5.0);
    features.set("consecutive_wins", portfolio.consecutive_wins() as f64);
    features.set("consecutive_losses", portfolio.consecutive_losses() as f64);
    features.set("time_since_last_trade_norm", portfolio.time_since_last_trade_norm());
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::Account;

    fn default_account() -> Account {
        Account {
            balance: 100_000.0,
            equity: 100_000.0,
            daily_pnl: 0.0,
            daily_start_balance: 100_000.0,
            peak_balance: 100_000.0,
            max_daily_loss: 2_000.0,
            max_total_drawdown: 5_000.0,
        }
    }

    #[test]
    fn atr_falls_back_in_order() {
        assert_eq!(fallback_atr(0.0, 0.0, 0.4, 0.2), 0.4);
        assert_eq!(fallback_atr(0.0, 0.0, 0.0, 0.2), 0.2);
        assert_eq!(fallback_atr(0.0, 0.3, 0.0, 0.0), 0.3);
    }

    #[test]
    fn high_volatility_forces_volatile_regime() {
        let mut trend = HashMap::new();
        trend.insert(Timeframe::H1, 0.7);
        let mut features = FeatureVector::neutral();
        features.set("h1_volatility", 0.05);
        features.set("trend_alignment", 0.8);
        assert_eq!(classify_regime(&trend, &features), Regime::Volatile);
    }

    #[test]
    fn build_context_smoke() {
        let portfolio = PortfolioState::new(Default::default());
        let features = FeatureVector::neutral();
        let context = EnhancedContext::build(
            CanonicalSymbol::Eurusd,
            CurrentPrice { bid: 1.1, ask: 1.1002, last: 1.1001 },
            default_account(),
            vec![],
            features,
            HashMap::new(),
            Prediction { direction: MlDirection::Buy, confidence: 70.0 },
            false,
            0.0010,
            0.0,
            0.0,
            0.0,
            &portfolio,
            2_000.0,
            5_000.0,
        );
        assert_eq!(context.symbol, CanonicalSymbol::Eurusd);
        assert_eq!(context.atr_ref, 0.0010);
    }
}
