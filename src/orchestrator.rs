// Request Orchestrator
// Single entry point: validates snapshot, dispatches to Entry or Position
// Management, formats reply (spec §4.10). Owns the single-writer mutex over
// PositionMetadata and PortfolioState (spec §5).

use crate::config::EngineConfig;
use crate::context::EnhancedContext;
use crate::errors::{EngineError, EngineResult};
use crate::metadata_store::MetadataStore;
use crate::portfolio_state::{risk_from_positions, PortfolioState};
use crate::{entry_decider, ensemble_predictor, feature_engineer, funded_account_guard, market_scorer, position_manager, position_sizer};
use decision_core::{normalize_symbol, Decision, Diagnostics, Reply, Side, Snapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Process-wide mutable state, guarded by a single mutex (spec §5).
pub struct EngineState {
    pub metadata: MetadataStore,
    pub portfolio: PortfolioState,
    pub last_snapshot_time: i64,
}

pub struct Orchestrator {
    config: EngineConfig,
    predictor: ensemble_predictor::EnsemblePredictor,
    state: Arc<Mutex<EngineState>>,
    monitoring: Arc<crate::monitoring::MonitoringSystem>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        predictor: ensemble_predictor::EnsemblePredictor,
        metadata: MetadataStore,
        monitoring: Arc<crate::monitoring::MonitoringSystem>,
    ) -> Self {
        let portfolio = PortfolioState::new(config.clone());
        Self {
            config,
            predictor,
            state: Arc::new(Mutex::new(EngineState { metadata, portfolio, last_snapshot_time: 0 })),
            monitoring,
        }
    }

    /// Single function `decide(snapshot) -> reply` (spec §4.10). Enforces
    /// the soft 5s deadline around the entire body.
    pub async fn decide(&self, snapshot: Snapshot) -> Reply {
        let started = std::time::Instant::now();
        let deadline = Duration::from_millis(self.config.request_deadline_ms);

        let reply = match tokio::time::timeout(deadline, self.decide_inner(snapshot)).await {
            Ok(reply) => reply,
            Err(_elapsed) => hold_reply(EngineError::Timeout.reason()),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.monitoring.record_request(reply.action, latency_ms).await;
        reply
    }

    async fn decide_inner(&self, snapshot: Snapshot) -> Reply {
        match self.try_decide(snapshot).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(reason = %err.reason(), "decision recovered into HOLD");
                hold_reply(err.reason())
            }
        }
    }

    async fn try_decide(&self, snapshot: Snapshot) -> EngineResult<Reply> {
        let span = tracing::info_span!("decide", request_id = %uuid::Uuid::new_v4(), symbol = %snapshot.symbol);
        let _enter = span.enter();

        let symbol = normalize_symbol(&snapshot.symbol).ok_or(EngineError::UnknownSymbol)?;

        if snapshot.market_closed {
            return Ok(hold_reply(EngineError::MarketClosed.reason()));
        }
        let snapshot_time = snapshot.snapshot_time.unwrap_or(0);
        if snapshot_time != 0 && !funded_account_guard::market_is_open(&self.config.market_hours, snapshot_time) {
            return Ok(hold_reply(EngineError::MarketClosed.reason()));
        }

        let guard = funded_account_guard::evaluate(&snapshot.account);

        let mut state = self.state.lock().await;
        let read_only = snapshot_time != 0 && snapshot_time < state.last_snapshot_time;
        if !read_only && snapshot_time != 0 {
            state.last_snapshot_time = snapshot_time;
        }
        state.metadata.upsert(&snapshot.positions, snapshot_time);
        let newly_closed = state.metadata.reconcile(&snapshot.recent_trades);
        if !read_only {
            state.portfolio.advance_snapshot();
            let risks =
                risk_from_positions(&snapshot.positions, symbol, snapshot.symbol_info.tick_value, snapshot.symbol_info.tick_size);
            state.portfolio.set_open_risk(symbol, &risks);
            for profit in newly_closed {
                state.portfolio.record_closed_trade(profit);
            }
        }

        if !guard.can_trade {
            if !read_only {
                let _ = state.metadata.persist().await;
            }
            return Ok(hold_reply(EngineError::AccountGuard(String::new()).reason()));
        }

        let engineered = feature_engineer::build(&snapshot);
        let prediction = self.predictor.predict(symbol, &engineered.vector);

        let context = EnhancedContext::build(
            symbol,
            snapshot.current_price.clone(),
            snapshot.account.clone(),
            snapshot.positions.iter().filter(|p| p.symbol == snapshot.symbol).cloned().collect(),
            engineered.vector,
            engineered.trend_by_timeframe,
            prediction,
            engineered.degraded,
            snapshot.indicators.atr.get(&decision_core::Timeframe::H1).copied().unwrap_or(0.0),
            snapshot.indicators.atr.get(&decision_core::Timeframe::H4).copied().unwrap_or(0.0),
            snapshot.indicators.atr.get(&decision_core::Timeframe::D1).copied().unwrap_or(0.0),
            snapshot.indicators.atr.get(&decision_core::Timeframe::M15).copied().unwrap_or(0.0),
            &state.portfolio,
            guard.distance_daily,
            guard.distance_dd,
        );

        if context.degraded {
            if !read_only {
                let _ = state.metadata.persist().await;
            }
            return Ok(hold_reply(EngineError::Degraded.reason()));
        }

        let heat = state.portfolio.total_portfolio_risk_pct(snapshot.account.balance);
        let symbol_positions = context.positions_for_symbol();

        let decision = if !symbol_positions.is_empty() {
            dispatch_position_management(&context, symbol_positions, &mut state, &self.config)
        } else {
            // spec §4.10 step 5 / §4.4 rule 7: reject before even scoring if
            // the candidate trade's base risk would push total heat past
            // the ceiling, not just heat already on the books.
            if heat + position_sizer::BASE_RISK_FRACTION >= 0.05 {
                Decision::hold(EngineError::PortfolioHeat.reason())
            } else {
                dispatch_entry(&context, &state.portfolio, &self.config, guard.max_risk_dollars, &snapshot.symbol_info)
            }
        };

        if !read_only {
            let _ = state.metadata.persist().await;
        }
        drop(state);

        let diagnostics = Diagnostics {
            confidence: Some(context.ml_confidence),
            components: None,
            expected_return: None,
            correlation: Some(state_correlation(&self.state, symbol, &decision).await),
        };

        Ok(decision.into_reply(diagnostics))
    }
}

async fn state_correlation(state: &Arc<Mutex<EngineState>>, symbol: decision_core::CanonicalSymbol, decision: &Decision) -> f64 {
    let side = match decision {
        Decision::Enter { side, .. } => *side,
        _ => Side::Buy,
    };
    state.lock().await.portfolio.correlation(symbol, side)
}

fn dispatch_position_management(
    context: &EnhancedContext,
    positions: &[decision_core::RawPosition],
    state: &mut EngineState,
    config: &EngineConfig,
) -> Decision {
    let market_score_buy = market_scorer::score(context, Side::Buy, config).score;
    let market_score_sell = market_scorer::score(context, Side::Sell, config).score;
    let symbol_risk_pct = state.portfolio.per_symbol_risk_pct(context.symbol, context.account.balance);

    let mut best: Option<Decision> = None;
    for position in positions {
        let side = match position.side {
            decision_core::PositionSide::Buy => Side::Buy,
            decision_core::PositionSide::Sell => Side::Sell,
        };
        let market_score = if side == Side::Buy { market_score_buy } else { market_score_sell };

        let Some(metadata) = state.metadata.get_mut(position.ticket) else {
            continue;
        };
        let decision = position_manager::evaluate(
            context,
            position,
            metadata,
            market_score,
            symbol_risk_pct,
            config.max_portfolio_heat_pct,
        );

        best = Some(match best {
            Some(existing) if existing.priority() >= decision.priority() => existing,
            _ => decision,
        });
    }

    best.unwrap_or_else(|| Decision::hold("no open position metadata"))
}

fn dispatch_entry(
    context: &EnhancedContext,
    portfolio: &PortfolioState,
    config: &EngineConfig,
    max_risk_dollars_cap: f64,
    symbol_info: &decision_core::SymbolInfo,
) -> Decision {
    let Some(side) = context.ml_direction.as_side() else {
        return Decision::hold(EngineError::NoModel.reason());
    };

    let score_result = market_scorer::score(context, side, config);
    let heat = portfolio.total_portfolio_risk_pct(context.account.balance);
    let entry = entry_decider::decide(context, &score_result, heat);

    if !entry.approve {
        return Decision::hold(entry.reason);
    }

    let approved_side = entry.side.unwrap_or(side);
    let entry_price = context.current_price.mid();
    let stop_price = position_sizer::stop_price(
        entry_price,
        approved_side,
        context.atr_ref,
        symbol_info,
        10.0,
    );

    let sizing = position_sizer::size(
        context,
        approved_side,
        entry.quality,
        portfolio,
        entry_price,
        stop_price,
        symbol_info,
        config,
        max_risk_dollars_cap,
    );

    if !sizing.should_trade {
        return Decision::hold(sizing.reasoning);
    }

    Decision::Enter {
        side: approved_side,
        lots: sizing.lots,
        stop_loss: stop_price,
        reason: "entry approved".to_string(),
    }
}

fn hold_reply(reason: impl Into<String>) -> Reply {
    Decision::hold(reason).into_reply(Diagnostics { confidence: None, components: None, expected_return: None, correlation: None })
}
