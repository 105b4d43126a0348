use serde::{Deserialize, Serialize};

/// Coarse market-state label used only as a multiplier (spec GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
}

impl Regime {
    /// §4.5 step 1: `regime_multiplier` applied to expected-return sizing.
    pub fn ev_multiplier(&self) -> f64 {
        match self {
            Regime::TrendingUp | Regime::TrendingDown => 1.2,
            Regime::Ranging => 0.8,
            Regime::Volatile => 0.6,
        }
    }
}
