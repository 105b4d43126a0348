//! ============================================================
//! DECISION CORE — shared domain types for the funded-account engine
//! ============================================================
//! Snapshot/reply wire shapes, the canonical symbol set, the feature
//! schema, and the one piece of durable process state (position metadata).
//! Pure data and pure functions only — no I/O, no async, no business logic
//! beyond what's intrinsic to the types themselves.
//! ============================================================

pub mod action;
pub mod features;
pub mod metadata;
pub mod regime;
pub mod snapshot;
pub mod symbol;

pub use action::{Decision, Diagnostics, Reply, ScoreComponents, Side};
pub use features::{FeatureVector, FEATURE_COUNT};
pub use metadata::PositionMetadata;
pub use regime::Regime;
pub use snapshot::{
    Account, Bar, CurrentPrice, Indicators, OrderBook, PositionSide, RawPosition, RecentTrade,
    Snapshot, SymbolInfo, Timeframe, MIN_BARS_PER_TIMEFRAME,
};
pub use symbol::{normalize_symbol, CanonicalSymbol, SymbolClass};
