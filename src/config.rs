// Engine Configuration
// Loads the implementer-configurable parameters spec §9 flags as open
// questions (rolling performance window, correlation matrix, market hours)
// through the `config` crate, layered TOML-defaults-then-environment, the
// same layering idiom the teacher crate's `ApiConfig::from_env` used for
// per-service credentials.

use decision_core::{CanonicalSymbol, SymbolClass};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weighted band thresholds for the Market Scorer's trend component,
/// symbol-class-specific (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandThresholds {
    pub strong_buy: f64,
    pub strong_sell: f64,
    pub weak_buy_floor: f64,
    pub weak_sell_ceiling: f64,
    pub align_strong: f64,
    pub align_weak: f64,
}

fn default_bands() -> HashMap<String, BandThresholds> {
    let mut bands = HashMap::new();
    bands.insert(
        "forex".to_string(),
        BandThresholds {
            strong_buy: 0.52,
            strong_sell: 0.48,
            weak_buy_floor: 0.50,
            weak_sell_ceiling: 0.50,
            align_strong: 0.60,
            align_weak: 0.40,
        },
    );
    bands.insert(
        "indices".to_string(),
        BandThresholds {
            strong_buy: 0.54,
            strong_sell: 0.46,
            weak_buy_floor: 0.50,
            weak_sell_ceiling: 0.50,
            align_strong: 0.62,
            align_weak: 0.38,
        },
    );
    bands.insert(
        "commodities".to_string(),
        BandThresholds {
            strong_buy: 0.56,
            strong_sell: 0.44,
            weak_buy_floor: 0.50,
            weak_sell_ceiling: 0.50,
            align_strong: 0.64,
            align_weak: 0.36,
        },
    );
    bands
}

/// A weekly trading window in a fixed reference timezone (UTC). Outside it,
/// the orchestrator emits HOLD before any feature construction (spec §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketHours {
    /// 0 = Sunday ... 6 = Saturday (`chrono::Weekday::num_days_from_sunday`).
    pub open_weekday: u32,
    pub open_utc_hour: u32,
    pub close_weekday: u32,
    pub close_utc_hour: u32,
}

impl Default for MarketHours {
    fn default() -> Self {
        // Standard FX week: Sunday 22:00 UTC through Friday 22:00 UTC.
        Self { open_weekday: 0, open_utc_hour: 22, close_weekday: 5, close_utc_hour: 22 }
    }
}

/// Static, calibrated correlation coefficients over the eight canonical
/// symbols (spec §9: "MUST treat the correlation matrix as calibrated
/// configuration, not learned"). Row/column order matches
/// [`CanonicalSymbol::ALL`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CorrelationMatrix(pub [[f64; 8]; 8]);

impl Default for CorrelationMatrix {
    fn default() -> Self {
        // eurusd gbpusd usdjpy   xau  usoil  us30  us100  us500
        Self([
            [1.00, 0.85, -0.55, 0.45, 0.15, 0.10, 0.10, 0.10],
            [0.85, 1.00, -0.45, 0.35, 0.15, 0.10, 0.10, 0.10],
            [-0.55, -0.45, 1.00, -0.40, -0.10, 0.20, 0.20, 0.20],
            [0.45, 0.35, -0.40, 1.00, 0.25, -0.15, -0.15, -0.15],
            [0.15, 0.15, -0.10, 0.25, 1.00, 0.30, 0.30, 0.30],
            [0.10, 0.10, 0.20, -0.15, 0.30, 1.00, 0.90, 0.95],
            [0.10, 0.10, 0.20, -0.15, 0.30, 0.90, 1.00, 0.92],
            [0.10, 0.10, 0.20, -0.15, 0.30, 0.95, 0.92, 1.00],
        ])
    }
}

impl CorrelationMatrix {
    pub fn coefficient(&self, a: CanonicalSymbol, b: CanonicalSymbol) -> f64 {
        self.0[a.index()][b.index()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling window size for recent-performance statistics (spec §9: "the
    /// exact rolling window ... SHOULD expose N as configuration, default 20").
    pub performance_window: usize,
    pub correlation: CorrelationMatrix,
    pub market_hours: MarketHours,
    pub bands: HashMap<String, BandThresholds>,
    /// Entry gate / sizer ceiling (spec §4.7): reject/cap if total portfolio
    /// risk would exceed this fraction of balance.
    pub max_portfolio_heat_pct: f64,
    /// Soft per-request deadline (spec §5).
    pub request_deadline_ms: u64,
    /// Per-symbol absolute lot caps overriding portfolio sizing (spec §4.5
    /// step 6, e.g. "USOIL ≤ 10 lots").
    pub symbol_max_lots: HashMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut symbol_max_lots = HashMap::new();
        symbol_max_lots.insert("usoil".to_string(), 10.0);

        Self {
            performance_window: 20,
            correlation: CorrelationMatrix::default(),
            market_hours: MarketHours::default(),
            bands: default_bands(),
            max_portfolio_heat_pct: 0.05,
            request_deadline_ms: 5_000,
            symbol_max_lots,
        }
    }
}

impl EngineConfig {
    pub fn bands_for(&self, class: SymbolClass) -> BandThresholds {
        let key = match class {
            SymbolClass::Forex => "forex",
            SymbolClass::Indices => "indices",
            SymbolClass::Commodities => "commodities",
        };
        self.bands.get(key).copied().unwrap_or(BandThresholds {
            strong_buy: 0.52,
            strong_sell: 0.48,
            weak_buy_floor: 0.50,
            weak_sell_ceiling: 0.50,
            align_strong: 0.60,
            align_weak: 0.40,
        })
    }

    pub fn symbol_max_lot(&self, symbol: CanonicalSymbol) -> Option<f64> {
        self.symbol_max_lots.get(symbol.as_str()).copied()
    }

    /// Layer `config/default.toml` (if present) and `ENGINE__*` environment
    /// variables on top of the built-in defaults above.
    pub fn load() -> Result<Self, crate::errors::EngineError> {
        let defaults_json = serde_json::to_string(&EngineConfig::default())
            .map_err(|e| crate::errors::EngineError::Config(e.to_string()))?;

        let builder = config::Config::builder()
            .add_source(config::File::from_str(&defaults_json, config::FileFormat::Json))
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("ENGINE").separator("__"));

        let built = builder.build().map_err(|e| crate::errors::EngineError::Config(e.to_string()))?;
        built
            .try_deserialize()
            .map_err(|e| crate::errors::EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let cfg = EngineConfig::load().expect("default config must load");
        assert_eq!(cfg.performance_window, 20);
        assert_eq!(cfg.symbol_max_lot(CanonicalSymbol::Usoil), Some(10.0));
    }

    #[test]
    fn correlation_matrix_is_symmetric_on_diagonal() {
        let m = CorrelationMatrix::default();
        for s in CanonicalSymbol::ALL {
            assert_eq!(m.coefficient(s, s), 1.0);
        }
    }

    #[test]
    fn bands_tighten_from_forex_to_commodities() {
        let cfg = EngineConfig::default();
        let forex = cfg.bands_for(SymbolClass::Forex);
        let commodities = cfg.bands_for(SymbolClass::Commodities);
        assert!(commodities.strong_buy > forex.strong_buy);
        assert!(commodities.align_strong > forex.align_strong);
    }
}
