//! Per-ticket position metadata (spec §3, §4.8) — the one piece of process
//! state the engine carries across requests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionMetadata {
    pub ticket: u64,
    pub initial_volume: f64,
    pub add_count: u8,
    pub dca_count: u8,
    pub peak_profit: f64,
    pub entry_time: i64,
    /// Consecutive snapshots in which this ticket was absent from both
    /// `positions` and `recent_trades`; purged at 2 (spec §4.8 invariant).
    #[serde(default)]
    pub missing_streak: u8,
    /// Set once this ticket's closure has been folded into
    /// `PortfolioState`'s rolling performance window, so a trade resent
    /// across several snapshots is only counted once (spec §4.6 "Side
    /// effects").
    #[serde(default)]
    pub reconciled: bool,
    /// Whether ML direction has agreed with this position's side on every
    /// snapshot seen since entry; once broken, stays broken (spec §4.6 step
    /// 5 pyramiding precondition: "ML-confidence being sustained"). Defaults
    /// true so older persisted records (pre-dating this field) don't retroactively
    /// block pyramiding.
    #[serde(default = "default_true")]
    pub ml_agreement_intact: bool,
}

fn default_true() -> bool {
    true
}

pub const MAX_ADD_COUNT: u8 = 2;
pub const MAX_DCA_COUNT: u8 = 1;
pub const PURGE_AFTER_MISSING_STREAK: u8 = 2;

impl PositionMetadata {
    pub fn new(ticket: u64, initial_volume: f64, current_profit: f64, entry_time: i64) -> Self {
        Self {
            ticket,
            initial_volume,
            add_count: 0,
            dca_count: 0,
            peak_profit: current_profit,
            entry_time,
            missing_streak: 0,
            reconciled: false,
            ml_agreement_intact: true,
        }
    }

    pub fn observe_profit(&mut self, current_profit: f64) {
        if current_profit > self.peak_profit {
            self.peak_profit = current_profit;
        }
        self.missing_streak = 0;
    }

    /// Record whether ML direction agreed with the position's side on this
    /// snapshot; once disagreement is seen, sustained agreement is broken
    /// for the life of the position.
    pub fn record_ml_agreement(&mut self, agrees: bool) {
        self.ml_agreement_intact = self.ml_agreement_intact && agrees;
    }

    pub fn can_pyramid(&self) -> bool {
        self.add_count < MAX_ADD_COUNT
    }

    pub fn can_dca(&self) -> bool {
        self.dca_count == 0 && self.dca_count < MAX_DCA_COUNT
    }
}
