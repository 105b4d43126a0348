// Engine Error Handling
// Every error kind the orchestrator can locally recover into a HOLD reply (spec §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("bad snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("unknown symbol")]
    UnknownSymbol,

    #[error("no model")]
    NoModel,

    #[error("account guard: {0}")]
    AccountGuard(String),

    #[error("portfolio heat")]
    PortfolioHeat,

    #[error("market closed")]
    MarketClosed,

    #[error("degraded")]
    Degraded,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timeout")]
    Timeout,

    #[error("config error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Each error kind collapses to a short, stable reason string for the
    /// broker-facing HOLD reply (spec §7: "reply HOLD, reason=...").
    pub fn reason(&self) -> String {
        match self {
            EngineError::MalformedSnapshot(_) => "bad snapshot".to_string(),
            EngineError::UnknownSymbol => "unknown symbol".to_string(),
            EngineError::NoModel => "no model".to_string(),
            EngineError::AccountGuard(_) => "account guard".to_string(),
            EngineError::PortfolioHeat => "portfolio heat".to_string(),
            EngineError::MarketClosed => "market closed".to_string(),
            EngineError::Degraded => "degraded".to_string(),
            EngineError::Internal(_) => "internal error".to_string(),
            EngineError::Timeout => "timeout".to_string(),
            EngineError::Config(msg) => format!("config error: {msg}"),
        }
    }
}

pub fn validate_finite(value: f64, name: &str) -> EngineResult<f64> {
    if value.is_nan() || value.is_infinite() {
        return Err(EngineError::MalformedSnapshot(format!("{name} must be finite")));
    }
    Ok(value)
}

pub fn validate_bounds(value: f64, min: f64, max: f64, name: &str) -> EngineResult<f64> {
    validate_finite(value, name)?;
    if value < min || value > max {
        return Err(EngineError::Internal(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(value)
}

pub fn safe_divide(numerator: f64, denominator: f64, context: &str) -> EngineResult<f64> {
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(EngineError::Internal(format!("division by zero in {context}")));
    }
    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(EngineError::UnknownSymbol.reason(), "unknown symbol");
        assert_eq!(EngineError::Timeout.reason(), "timeout");
    }

    #[test]
    fn safe_divide_rejects_zero() {
        assert!(safe_divide(1.0, 0.0, "ctx").is_err());
        assert!(safe_divide(1.0, 2.0, "ctx").is_ok());
    }
}
