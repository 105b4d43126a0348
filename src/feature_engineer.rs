// Feature Engineer
// Maps a raw snapshot to the fixed-order FeatureVector the ensemble was
// trained against. Pure function, no I/O: (snapshot) -> (FeatureVector, degraded).

use decision_core::{
    Bar, CurrentPrice, FeatureVector, Indicators, RawPosition, Snapshot, Timeframe,
    MIN_BARS_PER_TIMEFRAME,
};

/// Output of feature construction: the vector plus whether the snapshot gave
/// us enough bars to trust it. A degraded context forces HOLD downstream.
pub struct EngineeredFeatures {
    pub vector: FeatureVector,
    pub degraded: bool,
    pub trend_by_timeframe: std::collections::HashMap<Timeframe, f64>,
}

pub fn build(snapshot: &Snapshot) -> EngineeredFeatures {
    let mut vector = FeatureVector::neutral();
    let mut degraded = true;
    let mut trend_by_timeframe = std::collections::HashMap::new();

    for tf in Timeframe::ALL {
        let bars = snapshot.timeframes.get(&tf).map(Vec::as_slice).unwrap_or(&[]);
        let present = bars.len() >= MIN_BARS_PER_TIMEFRAME;
        if present {
            degraded = false;
        }
        let prefix = tf.as_str().to_lowercase();
        set_timeframe_features(&mut vector, &prefix, bars, present, snapshot, tf);
        if present {
            trend_by_timeframe.insert(tf, vector.get(&format!("{prefix}_trend")).unwrap_or(0.5));
        }
    }

    set_global_features(&mut vector, snapshot, &trend_by_timeframe);

    EngineeredFeatures { vector, degraded, trend_by_timeframe }
}

fn set_timeframe_features(
    vector: &mut FeatureVector,
    prefix: &str,
    bars: &[Bar],
    present: bool,
    snapshot: &Snapshot,
    tf: Timeframe,
) {
    vector.set(&format!("{prefix}_tf_missing"), if present { 1.0 } else { 0.0 });

    if !present {
        return;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let c0 = closes[0];

    vector.set(&format!("{prefix}_return_1"), percent_return(&closes, 1));
    vector.set(&format!("{prefix}_return_5"), percent_return(&closes, 5));
    vector.set(&format!("{prefix}_return_10"), percent_return(&closes, 10));

    let high = bars[0].high;
    let low = bars[0].low;
    let range = (high - low).max(1e-9);
    vector.set(&format!("{prefix}_high_low_ratio"), high / low.max(1e-9));
    vector.set(&format!("{prefix}_close_position_in_range"), (c0 - low) / range);

    let trend = trend_from_bars(&closes);
    vector.set(&format!("{prefix}_trend"), trend);

    let volatility = bar_volatility(bars);
    vector.set(&format!("{prefix}_volatility"), volatility);

    let rsi = snapshot.indicators.rsi.get(&tf).copied().unwrap_or(50.0);
    vector.set(&format!("{prefix}_rsi_value"), rsi / 100.0);
    let rsi_alignment = if (rsi > 50.0) == (trend > 0.5) { 1.0 } else { 0.0 };
    vector.set(&format!("{prefix}_rsi_alignment"), rsi_alignment);

    let macd = snapshot.indicators.macd.get(&tf).copied().unwrap_or_default();
    let macd_alignment = if (macd.histogram > 0.0) == (trend > 0.5) { 1.0 } else { 0.0 };
    vector.set(&format!("{prefix}_macd_alignment"), macd_alignment);
    vector.set(&format!("{prefix}_macd_histogram_sign"), if macd.histogram >= 0.0 { 1.0 } else { 0.0 });

    let stoch = snapshot.indicators.stochastic.get(&tf).copied().unwrap_or_default();
    vector.set(&format!("{prefix}_stochastic_k"), stoch.k / 100.0);
    vector.set(&format!("{prefix}_stochastic_d"), stoch.d / 100.0);

    vector.set(&format!("{prefix}_bollinger_position"), bollinger_position(&closes));
    vector.set(&format!("{prefix}_volume_ratio"), volume_ratio(bars));

    let ma_relative = snapshot.indicators.ma_relative.get(&tf).copied().unwrap_or(0.5);
    vector.set(&format!("{prefix}_ma_relative"), ma_relative);

    let atr = snapshot.indicators.atr.get(&tf).copied().unwrap_or(0.0);
    vector.set(&format!("{prefix}_atr_normalized"), if c0 > 0.0 { atr / c0 } else { 0.0 });
}

/// `trend_t = clamp(0.5 + avg/10, 0, 1)` where `avg` is the mean of
/// `vs_20` and `vs_50`, each the percent distance of the latest close from
/// that SMA (spec §4.1).
fn trend_from_bars(closes: &[f64]) -> f64 {
    let c0 = closes[0];
    let vs = |k: usize| -> f64 {
        let window = &closes[..closes.len().min(k)];
        let sma = window.iter().sum::<f64>() / window.len() as f64;
        if sma.abs() < 1e-12 {
            0.0
        } else {
            100.0 * (c0 - sma) / sma
        }
    };
    let avg = (vs(20) + vs(50)) / 2.0;
    (0.5 + avg / 10.0).clamp(0.0, 1.0)
}

fn percent_return(closes: &[f64], lookback: usize) -> f64 {
    if closes.len() <= lookback {
        return 0.0;
    }
    let past = closes[lookback];
    if past.abs() < 1e-12 {
        return 0.0;
    }
    (closes[0] - past) / past
}

fn bar_volatility(bars: &[Bar]) -> f64 {
    let n = bars.len().min(20);
    if n < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = bars[..n]
        .windows(2)
        .map(|w| if w[1].close.abs() > 1e-12 { (w[0].close - w[1].close) / w[1].close } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}

fn bollinger_position(closes: &[f64]) -> f64 {
    let n = closes.len().min(20);
    if n < 2 {
        return 0.5;
    }
    let window = &closes[..n];
    let mean = window.iter().sum::<f64>() / n as f64;
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt().max(1e-9);
    let upper = mean + 2.0 * std_dev;
    let lower = mean - 2.0 * std_dev;
    ((closes[0] - lower) / (upper - lower).max(1e-9)).clamp(0.0, 1.0)
}

fn volume_ratio(bars: &[Bar]) -> f64 {
    let n = bars.len().min(20);
    if n < 2 {
        return 1.0;
    }
    let mean_vol = bars[..n].iter().map(|b| b.volume).sum::<f64>() / n as f64;
    if mean_vol < 1e-9 {
        1.0
    } else {
        bars[0].volume / mean_vol
    }
}

fn set_global_features(
    vector: &mut FeatureVector,
    snapshot: &Snapshot,
    trend_by_timeframe: &std::collections::HashMap<Timeframe, f64>,
) {
    let trend_alignment = trend_alignment(trend_by_timeframe);
    vector.set("trend_alignment", trend_alignment);

    let h1_vol_ratio = snapshot
        .timeframes
        .get(&Timeframe::H1)
        .map(|bars| volume_ratio(bars))
        .unwrap_or(1.0);
    let close_pos = snapshot
        .timeframes
        .get(&Timeframe::H1)
        .and_then(|bars| bars.first())
        .map(|bar| {
            let range = (bar.high - bar.low).max(1e-9);
            (bar.close - bar.low) / range
        })
        .unwrap_or(0.5);
    vector.set("accumulation_distribution", (close_pos - 0.5) * h1_vol_ratio);

    set_order_book_pressure(vector, snapshot, close_pos, h1_vol_ratio);

    vector.set("degraded", 0.0);
    vector.set("spread_bp", spread_bp(&snapshot.current_price));
    set_position_features(vector, snapshot);
    set_time_features(vector, snapshot.snapshot_time.unwrap_or(0));
    set_structure_and_volume_features(vector, snapshot);
}

/// Structure proximity (spec §4.3 Structure component) and the volume
/// ladder (spec §4.3 Volume component: institutional flow, large-player
/// bars, spikes). All computed from H1 bars only, per spec "Proximity to
/// H1 support/resistance".
fn set_structure_and_volume_features(vector: &mut FeatureVector, snapshot: &Snapshot) {
    let h1_bars = snapshot.timeframes.get(&Timeframe::H1).map(Vec::as_slice).unwrap_or(&[]);
    let current = snapshot.current_price.mid();

    vector.set("support_resistance_proximity", support_resistance_proximity(h1_bars, current));
    vector.set("round_number_confluence", round_number_confluence(current));

    let d1_bars = snapshot.timeframes.get(&Timeframe::D1).map(Vec::as_slice).unwrap_or(&[]);
    vector.set("pivot_confluence", pivot_confluence(d1_bars, current));

    let (accumulation, distribution) = institutional_flow(h1_bars);
    vector.set("institutional_accumulation", accumulation);
    vector.set("institutional_distribution", distribution);
    vector.set("large_player_bar", large_player_bar(h1_bars));
    vector.set("volume_spike", volume_spike(h1_bars));
}

/// Rolling 50-bar high/low treated as resistance/support; proximity is how
/// close `current` sits to the nearer of the two, relative to the range.
fn support_resistance_proximity(bars: &[Bar], current: f64) -> f64 {
    let n = bars.len().min(50);
    if n < 5 || current <= 0.0 {
        return 0.5;
    }
    let window = &bars[..n];
    let resistance = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let support = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let range = (resistance - support).max(1e-9);
    let dist_to_resistance = (resistance - current).abs() / range;
    let dist_to_support = (current - support).abs() / range;
    let nearest = dist_to_resistance.min(dist_to_support);
    (1.0 - nearest).clamp(0.0, 1.0)
}

/// Proximity to the nearest magnitude-appropriate round number (e.g. 50s
/// for indices, whole numbers for gold, pips for FX).
fn round_number_confluence(current: f64) -> f64 {
    if current <= 0.0 {
        return 0.0;
    }
    let increment = if current >= 1_000.0 {
        50.0
    } else if current >= 100.0 {
        10.0
    } else if current >= 10.0 {
        1.0
    } else {
        0.0050
    };
    let nearest = (current / increment).round() * increment;
    let distance = (current - nearest).abs();
    (1.0 - distance / (increment / 2.0)).clamp(0.0, 1.0)
}

/// Classic floor-trader pivot off the prior D1 bar; confluence is
/// proximity to the nearest of pivot/S1/R1 relative to the prior day range.
fn pivot_confluence(d1_bars: &[Bar], current: f64) -> f64 {
    let Some(prev) = d1_bars.first() else {
        return 0.0;
    };
    let range = (prev.high - prev.low).max(1e-9);
    let pivot = (prev.high + prev.low + prev.close) / 3.0;
    let r1 = 2.0 * pivot - prev.low;
    let s1 = 2.0 * pivot - prev.high;

    let nearest_distance = [pivot, r1, s1]
        .iter()
        .map(|level| (current - level).abs())
        .fold(f64::MAX, f64::min);
    (1.0 - nearest_distance / range).clamp(0.0, 1.0)
}

/// A high-volume bar closing in the top third of its range signals
/// accumulation; closing in the bottom third signals distribution.
fn institutional_flow(bars: &[Bar]) -> (f64, f64) {
    let n = bars.len().min(20);
    if n < 2 {
        return (0.0, 0.0);
    }
    let window = &bars[..n];
    let mean_vol = window.iter().map(|b| b.volume).sum::<f64>() / n as f64;
    if mean_vol < 1e-9 {
        return (0.0, 0.0);
    }

    let mut accumulation = 0.0_f64;
    let mut distribution = 0.0_f64;
    for bar in window {
        if bar.volume < mean_vol * 1.5 {
            continue;
        }
        let range = (bar.high - bar.low).max(1e-9);
        let close_pos = (bar.close - bar.low) / range;
        let strength = (bar.volume / mean_vol - 1.0).min(2.0) / 2.0;
        if close_pos > 0.6 {
            accumulation = accumulation.max(strength);
        } else if close_pos < 0.4 {
            distribution = distribution.max(strength);
        }
    }
    (accumulation, distribution)
}

/// Any of the last 5 bars carrying more than double the 20-bar mean volume.
fn large_player_bar(bars: &[Bar]) -> f64 {
    let n = bars.len().min(20);
    if n < 5 {
        return 0.0;
    }
    let mean_vol = bars[..n].iter().map(|b| b.volume).sum::<f64>() / n as f64;
    if mean_vol < 1e-9 {
        return 0.0;
    }
    let recent = n.min(5);
    if bars[..recent].iter().any(|b| b.volume > mean_vol * 2.0) {
        1.0
    } else {
        0.0
    }
}

/// The latest bar alone spiking past 2.5x the 20-bar mean volume.
fn volume_spike(bars: &[Bar]) -> f64 {
    let ratio = volume_ratio(bars);
    if ratio > 2.5 {
        1.0
    } else {
        0.0
    }
}

fn trend_alignment(trend_by_timeframe: &std::collections::HashMap<Timeframe, f64>) -> f64 {
    let core = [Timeframe::H1, Timeframe::H4, Timeframe::D1];
    let signs: Vec<f64> = core
        .iter()
        .filter_map(|tf| trend_by_timeframe.get(tf))
        .map(|v| if *v > 0.5 { 1.0 } else { -1.0 })
        .collect();
    if signs.len() < 2 {
        return 0.5;
    }
    let mut agree = 0;
    let mut total = 0;
    for i in 0..signs.len() {
        for j in (i + 1)..signs.len() {
            total += 1;
            if signs[i] == signs[j] {
                agree += 1;
            }
        }
    }
    if total == 0 {
        0.5
    } else {
        agree as f64 / total as f64
    }
}

fn set_order_book_pressure(
    vector: &mut FeatureVector,
    snapshot: &Snapshot,
    close_pos: f64,
    vol_ratio: f64,
) {
    let (bid, ask) = match &snapshot.order_book {
        Some(ob) => (ob.bid_pressure.unwrap_or(0.5), ob.ask_pressure.unwrap_or(0.5)),
        None => (close_pos * vol_ratio, (1.0 - close_pos) * vol_ratio),
    };
    vector.set("bid_ask_pressure", bid - ask);
}

fn spread_bp(price: &CurrentPrice) -> f64 {
    if price.bid > 0.0 && price.ask > 0.0 {
        let mid = price.mid();
        if mid > 0.0 {
            return (price.ask - price.bid) / mid * 10_000.0;
        }
    }
    0.0
}

fn set_position_features(vector: &mut FeatureVector, snapshot: &Snapshot) {
    let positions: Vec<&RawPosition> =
        snapshot.positions.iter().filter(|p| p.symbol == snapshot.symbol).collect();
    vector.set("position_count_this_symbol", positions.len() as f64);

    let buys = positions.iter().filter(|p| p.side == decision_core::PositionSide::Buy).count();
    let sells = positions.len() - buys;
    vector.set("position_side_buy", if buys > 0 { 1.0 } else { 0.0 });
    vector.set("position_side_sell", if sells > 0 { 1.0 } else { 0.0 });

    let unrealized_pct = if snapshot.account.balance.abs() > 1e-9 {
        positions.iter().map(|p| p.profit).sum::<f64>() / snapshot.account.balance
    } else {
        0.0
    };
    vector.set("position_unrealized_pct", unrealized_pct);

    let equity_ratio = if snapshot.account.balance.abs() > 1e-9 {
        snapshot.account.equity / snapshot.account.balance
    } else {
        1.0
    };
    vector.set("equity_to_balance_ratio", equity_ratio);

    let daily_pnl_pct = if snapshot.account.daily_start_balance.abs() > 1e-9 {
        snapshot.account.daily_pnl / snapshot.account.daily_start_balance
    } else {
        0.0
    };
    vector.set("daily_pnl_pct", daily_pnl_pct);
}

fn set_time_features(vector: &mut FeatureVector, unix_seconds: i64) {
    use chrono::{Datelike, TimeZone, Timelike, Utc};
    let dt = Utc.timestamp_opt(unix_seconds, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    let hour = dt.hour() as f64;
    let weekday = dt.weekday().num_days_from_sunday() as f64;

    vector.set("hour_of_day_sin", (std::f64::consts::TAU * hour / 24.0).sin());
    vector.set("hour_of_day_cos", (std::f64::consts::TAU * hour / 24.0).cos());
    vector.set("day_of_week_sin", (std::f64::consts::TAU * weekday / 7.0).sin());
    vector.set("day_of_week_cos", (std::f64::consts::TAU * weekday / 7.0).cos());
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::{Account, Snapshot};

    fn minimal_snapshot() -> Snapshot {
        Snapshot {
            symbol: "eurusd".to_string(),
            snapshot_time: Some(1_700_000_000),
            market_closed: false,
            current_price: CurrentPrice::default(),
            account: Account {
                balance: 10_000.0,
                equity: 10_000.0,
                daily_pnl: 0.0,
                daily_start_balance: 10_000.0,
                peak_balance: 10_000.0,
                max_daily_loss: 500.0,
                max_total_drawdown: 1_000.0,
            },
            symbol_info: Default::default(),
            timeframes: Default::default(),
            indicators: Indicators::default(),
            positions: vec![],
            recent_trades: vec![],
            order_book: None,
        }
    }

    #[test]
    fn empty_bars_yields_degraded_context() {
        let snapshot = minimal_snapshot();
        let engineered = build(&snapshot);
        assert!(engineered.degraded);
        assert_eq!(engineered.vector.len(), decision_core::FEATURE_COUNT);
    }

    #[test]
    fn sufficient_bars_clear_degraded_flag() {
        let mut snapshot = minimal_snapshot();
        let bars: Vec<Bar> = (0..60)
            .map(|i| Bar {
                time: 1_700_000_000 - i as i64 * 3600,
                open: 1.1,
                high: 1.105,
                low: 1.095,
                close: 1.1 + (i as f64) * 0.0001,
                volume: 100.0,
            })
            .collect();
        snapshot.timeframes.insert(Timeframe::H1, bars);
        let engineered = build(&snapshot);
        assert!(!engineered.degraded);
        assert!(engineered.trend_by_timeframe.contains_key(&Timeframe::H1));
    }
}
