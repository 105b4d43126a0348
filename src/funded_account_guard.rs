// Funded-Account Guard & Market Hours
// (account) -> {can_trade, max_risk_dollars, reason} plus the weekly
// market-hours gate (spec §4.9).

use crate::config::MarketHours;
use decision_core::Account;

pub struct GuardResult {
    pub can_trade: bool,
    pub max_risk_dollars: f64,
    pub distance_daily: f64,
    pub distance_dd: f64,
    pub reason: Option<&'static str>,
}

pub fn evaluate(account: &Account) -> GuardResult {
    let loss_so_far = (account.daily_start_balance - account.equity).max(0.0);
    let distance_daily = account.max_daily_loss - loss_so_far;
    let distance_dd = account.max_total_drawdown - (account.peak_balance - account.equity);

    let max_risk_from_daily = distance_daily * 0.20;
    let max_risk_from_dd = distance_dd * 0.10;
    let max_risk_dollars = max_risk_from_daily.min(max_risk_from_dd).max(0.0);

    let can_trade = distance_daily > 0.0 && distance_dd > 0.0;

    GuardResult {
        can_trade,
        max_risk_dollars,
        distance_daily,
        distance_dd,
        reason: if can_trade { None } else { Some("account guard") },
    }
}

/// Outside the configured weekly window -> HOLD before feature construction,
/// PortfolioState untouched (spec §4.9).
pub fn market_is_open(hours: &MarketHours, unix_seconds: i64) -> bool {
    use chrono::{Datelike, TimeZone, Timelike, Utc};
    let dt = match Utc.timestamp_opt(unix_seconds, 0).single() {
        Some(dt) => dt,
        None => return false,
    };
    let weekday = dt.weekday().num_days_from_sunday();
    let hour = dt.hour();

    let after_open = weekday > hours.open_weekday
        || (weekday == hours.open_weekday && hour >= hours.open_utc_hour);
    let before_close = weekday < hours.close_weekday
        || (weekday == hours.close_weekday && hour < hours.close_utc_hour);

    after_open && before_close
}
