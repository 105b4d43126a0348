//! The engine's internal decision representation and its JSON boundary
//! encoding (spec §6, §9 "Dynamic dispatch on string action labels").
//!
//! `Decision` is a tagged variant type components pass around internally;
//! nothing upstream of the orchestrator serializes anything. `Reply` is the
//! flat JSON shape the broker adapter actually parses, built once at the
//! boundary by [`Decision::into_reply`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// The engine's decision for a single symbol, pairwise disjoint per spec §3.
#[derive(Debug, Clone)]
pub enum Decision {
    Hold { reason: String },
    Enter { side: Side, lots: f64, stop_loss: f64, reason: String },
    Close { reason: String },
    ScaleIn { add_lots: f64, reason: String },
    ScaleOut { reduce_lots: f64, reason: String },
    Dca { add_lots: f64, reason: String },
}

impl Decision {
    pub fn hold(reason: impl Into<String>) -> Self {
        Decision::Hold { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Hold { reason } => reason,
            Decision::Enter { reason, .. } => reason,
            Decision::Close { reason } => reason,
            Decision::ScaleIn { reason, .. } => reason,
            Decision::ScaleOut { reason, .. } => reason,
            Decision::Dca { reason, .. } => reason,
        }
    }

    /// Flatten into the broker-facing reply, attaching optional diagnostics.
    pub fn into_reply(self, diagnostics: Diagnostics) -> Reply {
        let mut reply = Reply {
            action: self.action_label(),
            side: None,
            lots: None,
            stop_loss: None,
            take_profit: None,
            add_lots: None,
            reduce_lots: None,
            reason: self.reason().to_string(),
            confidence: diagnostics.confidence,
            components: diagnostics.components,
            expected_return: diagnostics.expected_return,
            correlation: diagnostics.correlation,
        };

        match self {
            Decision::Enter { side, lots, stop_loss, .. } => {
                reply.side = Some(side.as_str().to_string());
                reply.lots = Some(lots);
                reply.stop_loss = Some(stop_loss);
                reply.take_profit = Some(0.0);
            }
            Decision::ScaleIn { add_lots, .. } | Decision::Dca { add_lots, .. } => {
                reply.add_lots = Some(add_lots);
            }
            Decision::ScaleOut { reduce_lots, .. } => {
                reply.reduce_lots = Some(reduce_lots);
            }
            Decision::Hold { .. } | Decision::Close { .. } => {}
        }

        reply
    }

    fn action_label(&self) -> &'static str {
        match self {
            Decision::Hold { .. } => "HOLD",
            Decision::Enter { side: Side::Buy, .. } => "BUY",
            Decision::Enter { side: Side::Sell, .. } => "SELL",
            Decision::Close { .. } => "CLOSE",
            Decision::ScaleIn { .. } => "SCALE_IN",
            Decision::ScaleOut { .. } => "SCALE_OUT",
            Decision::Dca { .. } => "DCA",
        }
    }

    /// Priority used by the orchestrator to pick one decision across several
    /// open positions on the same symbol (spec §4.10, step 6):
    /// CLOSE > SCALE_OUT > DCA > SCALE_IN > HOLD.
    pub fn priority(&self) -> u8 {
        match self {
            Decision::Close { .. } => 4,
            Decision::ScaleOut { .. } => 3,
            Decision::Dca { .. } => 2,
            Decision::ScaleIn { .. } => 1,
            Decision::Hold { .. } => 0,
            Decision::Enter { .. } => 0,
        }
    }
}

/// Non-decision-affecting diagnostics attached to a reply for observability.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub confidence: Option<f64>,
    pub components: Option<ScoreComponents>,
    pub expected_return: Option<f64>,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreComponents {
    pub trend: f64,
    pub momentum: f64,
    pub volume: f64,
    pub structure: f64,
    pub ml: f64,
}

/// The exact JSON shape the broker adapter parses (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lots: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_lots: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_lots: Option<f64>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ScoreComponents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_reply_always_carries_zero_take_profit() {
        let d = Decision::Enter { side: Side::Buy, lots: 1.2, stop_loss: 1.0950, reason: "ok".into() };
        let reply = d.into_reply(Diagnostics::default());
        assert_eq!(reply.action, "BUY");
        assert_eq!(reply.take_profit, Some(0.0));
        assert_eq!(reply.lots, Some(1.2));
    }

    #[test]
    fn priority_orders_close_above_scale_in() {
        let close = Decision::Close { reason: "ev".into() };
        let scale_in = Decision::ScaleIn { add_lots: 1.0, reason: "add".into() };
        assert!(close.priority() > scale_in.priority());
    }

    #[test]
    fn hold_reply_omits_optional_fields() {
        let d = Decision::hold("market closed");
        let reply = d.into_reply(Diagnostics::default());
        let json = serde_json::to_string(&reply).unwrap();
        assert!(!json.contains("lots"));
        assert!(!json.contains("stop_loss"));
    }
}
