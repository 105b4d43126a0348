//! The feature schema: a fixed-order, fixed-length numeric vector (spec §3,
//! §4.1). `F` is a compile-time constant; every request produces a vector of
//! exactly this length in exactly this order, which is the invariant the
//! Ensemble Predictor relies on.

use crate::snapshot::Timeframe;
use std::sync::OnceLock;

/// Per-timeframe feature suffixes, repeated for each of the 7 timeframes.
pub const PER_TIMEFRAME_FEATURES: [&str; 18] = [
    "return_1",
    "return_5",
    "return_10",
    "high_low_ratio",
    "close_position_in_range",
    "trend",
    "volatility",
    "rsi_alignment",
    "macd_alignment",
    "bollinger_position",
    "volume_ratio",
    "tf_missing",
    "rsi_value",
    "macd_histogram_sign",
    "stochastic_k",
    "stochastic_d",
    "ma_relative",
    "atr_normalized",
];

/// Cross-timeframe / account / regime derived features.
pub const GLOBAL_FEATURES: [&str; 44] = [
    "trend_alignment",
    "accumulation_distribution",
    "bid_ask_pressure",
    "ml_direction_buy",
    "ml_direction_sell",
    "ml_direction_hold",
    "ml_confidence",
    "regime_trending_up",
    "regime_trending_down",
    "regime_ranging",
    "regime_volatile",
    "atr_ref_normalized",
    "distance_daily_pct",
    "distance_dd_pct",
    "degraded",
    "position_count_this_symbol",
    "position_side_buy",
    "position_side_sell",
    "position_unrealized_pct",
    "portfolio_heat_pct",
    "correlation_buy",
    "correlation_sell",
    "symbol_class_forex",
    "symbol_class_indices",
    "symbol_class_commodities",
    "spread_bp",
    "hour_of_day_sin",
    "hour_of_day_cos",
    "day_of_week_sin",
    "day_of_week_cos",
    "volume_spike",
    "large_player_bar",
    "institutional_accumulation",
    "institutional_distribution",
    "round_number_confluence",
    "pivot_confluence",
    "support_resistance_proximity",
    "win_rate_recent",
    "profit_factor_recent",
    "consecutive_wins",
    "consecutive_losses",
    "daily_pnl_pct",
    "equity_to_balance_ratio",
    "time_since_last_trade_norm",
];

/// `F`, the fixed feature vector length (spec §3 invariant).
pub const FEATURE_COUNT: usize =
    Timeframe::ALL.len() * PER_TIMEFRAME_FEATURES.len() + GLOBAL_FEATURES.len();

fn schema_names() -> &'static Vec<String> {
    static NAMES: OnceLock<Vec<String>> = OnceLock::new();
    NAMES.get_or_init(|| {
        let mut names = Vec::with_capacity(FEATURE_COUNT);
        for tf in Timeframe::ALL {
            let prefix = tf.as_str().to_lowercase();
            for suffix in PER_TIMEFRAME_FEATURES {
                names.push(format!("{prefix}_{suffix}"));
            }
        }
        for name in GLOBAL_FEATURES {
            names.push(name.to_string());
        }
        debug_assert_eq!(names.len(), FEATURE_COUNT);
        names
    })
}

fn schema_index() -> &'static std::collections::HashMap<&'static str, usize> {
    static INDEX: OnceLock<std::collections::HashMap<&'static str, usize>> = OnceLock::new();
    INDEX.get_or_init(|| {
        schema_names()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect()
    })
}

/// Schema-defined neutral default for a feature, used when an input is
/// missing (spec §3): 0.5 for trend-ish/oscillator scores, 0.0 for
/// volume/count-ish indicators.
pub fn neutral_value(feature_name: &str) -> f64 {
    if feature_name.contains("volume")
        || feature_name.contains("missing")
        || feature_name.contains("count")
        || feature_name.contains("spike")
        || feature_name.contains("large_player")
        || feature_name.contains("degraded")
        || feature_name.ends_with("_buy")
        || feature_name.ends_with("_sell")
        || feature_name.ends_with("_hold")
        || feature_name.starts_with("regime_")
        || feature_name.starts_with("symbol_class_")
        || feature_name.contains("confluence")
    {
        0.0
    } else {
        0.5
    }
}

/// The fixed-order, fixed-length numeric feature vector (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build a vector already in schema order; panics (a programmer error,
    /// not a request error) if the length doesn't match `FEATURE_COUNT`.
    pub fn from_ordered(values: Vec<f64>) -> Self {
        assert_eq!(values.len(), FEATURE_COUNT, "feature vector length mismatch");
        Self { values }
    }

    /// All-neutral vector, used for malformed/degraded snapshots (spec §4.1).
    pub fn neutral() -> Self {
        let values = schema_names().iter().map(|n| neutral_value(n)).collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn names() -> &'static [String] {
        schema_names()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        schema_index().get(name).map(|&i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: f64) {
        if let Some(&i) = schema_index().get(name) {
            self.values[i] = value;
        }
    }

    /// Project onto an artifact's own expected feature-name ordering,
    /// dropping extras and filling gaps with schema defaults (spec §4.1,
    /// §4.2, §9 "Feature-name drift between trainer and predictor").
    pub fn project(&self, expected_names: &[String]) -> Vec<f64> {
        expected_names
            .iter()
            .map(|name| self.get(name).unwrap_or_else(|| neutral_value(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_length_is_feature_count() {
        assert_eq!(FeatureVector::names().len(), FEATURE_COUNT);
        assert_eq!(FEATURE_COUNT, 170);
    }

    #[test]
    fn neutral_vector_matches_schema_length() {
        let fv = FeatureVector::neutral();
        assert_eq!(fv.len(), FEATURE_COUNT);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut fv = FeatureVector::neutral();
        fv.set("h1_trend", 0.77);
        assert!((fv.get("h1_trend").unwrap() - 0.77).abs() < 1e-12);
    }

    #[test]
    fn project_fills_missing_with_neutral() {
        let fv = FeatureVector::neutral();
        let expected = vec!["h1_trend".to_string(), "not_a_real_feature".to_string()];
        let projected = fv.project(&expected);
        assert_eq!(projected.len(), 2);
        assert_eq!(projected[1], neutral_value("not_a_real_feature"));
    }
}
