// Health Monitoring Module
// Derives a diagnostic health score from recent request metrics. Exposed
// only via `MonitoringSystem::get_health_status`; never read by the
// orchestrator or any decision component (spec §4.12).

use super::{MetricType, TimeSeries};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

/// System health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub level: HealthLevel,
    pub score: f64, // 0-100
    pub message: String,
    pub components: Vec<ComponentHealth>,
    pub issues: Vec<HealthIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthLevel,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssue {
    pub severity: HealthLevel,
    pub component: String,
    pub description: String,
    pub recommendation: String,
}

pub struct HealthMonitor {
    thresholds: HealthThresholds,
}

#[derive(Debug, Clone)]
struct HealthThresholds {
    win_rate_critical: f64,
    win_rate_warning: f64,
    error_rate_warning: u32,
    error_rate_critical: u32,
    latency_warning_ms: f64,
    latency_critical_ms: f64,
    drawdown_warning_pct: f64,
    drawdown_critical_pct: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            win_rate_critical: 0.35,
            win_rate_warning: 0.45,
            error_rate_warning: 10,
            error_rate_critical: 50,
            latency_warning_ms: 1500.0,
            latency_critical_ms: 4500.0,
            drawdown_warning_pct: 0.10,
            drawdown_critical_pct: 0.20,
        }
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self { thresholds: HealthThresholds::default() }
    }

    pub async fn get_status(
        &self,
        metrics: &Arc<RwLock<HashMap<MetricType, TimeSeries>>>,
    ) -> HealthStatus {
        let metrics_guard = metrics.read().await;
        let mut components = Vec::new();
        let mut issues = Vec::new();
        let mut total_score: f64 = 100.0;

        if let Some(component) = self.check_decision_health(&metrics_guard, &mut issues) {
            if component.status != HealthLevel::Healthy {
                total_score -= match component.status {
                    HealthLevel::Degraded => 10.0,
                    HealthLevel::Unhealthy => 25.0,
                    HealthLevel::Critical => 50.0,
                    HealthLevel::Healthy => 0.0,
                };
            }
            components.push(component);
        }

        if let Some(component) = self.check_system_health(&metrics_guard, &mut issues) {
            if component.status != HealthLevel::Healthy {
                total_score -= match component.status {
                    HealthLevel::Degraded => 5.0,
                    HealthLevel::Unhealthy => 15.0,
                    HealthLevel::Critical => 30.0,
                    HealthLevel::Healthy => 0.0,
                };
            }
            components.push(component);
        }

        if let Some(component) = self.check_risk_health(&metrics_guard, &mut issues) {
            if component.status != HealthLevel::Healthy {
                total_score -= match component.status {
                    HealthLevel::Degraded => 10.0,
                    HealthLevel::Unhealthy => 20.0,
                    HealthLevel::Critical => 40.0,
                    HealthLevel::Healthy => 0.0,
                };
            }
            components.push(component);
        }

        let level = if total_score >= 90.0 {
            HealthLevel::Healthy
        } else if total_score >= 70.0 {
            HealthLevel::Degraded
        } else if total_score >= 50.0 {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Critical
        };

        let message = match level {
            HealthLevel::Healthy => "engine operating normally".to_string(),
            HealthLevel::Degraded => "engine performance degraded".to_string(),
            HealthLevel::Unhealthy => "multiple issues detected".to_string(),
            HealthLevel::Critical => "critical issues require attention".to_string(),
        };

        HealthStatus { level, score: total_score.max(0.0), message, components, issues }
    }

    fn check_decision_health(
        &self,
        metrics: &HashMap<MetricType, TimeSeries>,
        issues: &mut Vec<HealthIssue>,
    ) -> Option<ComponentHealth> {
        let mut status = HealthLevel::Healthy;
        let mut details = Vec::new();

        if let Some(win_rate_ts) = metrics.get(&MetricType::WinRateRecent) {
            if let Some(win_rate) = win_rate_ts.latest() {
                if win_rate < self.thresholds.win_rate_critical {
                    status = HealthLevel::Critical;
                    issues.push(HealthIssue {
                        severity: HealthLevel::Critical,
                        component: "Decisions".to_string(),
                        description: format!("rolling win rate critically low at {:.1}%", win_rate * 100.0),
                        recommendation: "review Position Manager exit thresholds".to_string(),
                    });
                } else if win_rate < self.thresholds.win_rate_warning {
                    status = status.max(HealthLevel::Unhealthy);
                    issues.push(HealthIssue {
                        severity: HealthLevel::Unhealthy,
                        component: "Decisions".to_string(),
                        description: format!("rolling win rate below target at {:.1}%", win_rate * 100.0),
                        recommendation: "monitor sizing multipliers".to_string(),
                    });
                }
                details.push(format!("win rate: {:.1}%", win_rate * 100.0));
            }
        }

        if let Some(degraded_ts) = metrics.get(&MetricType::DegradedCount) {
            if let Some(degraded) = degraded_ts.latest() {
                if degraded > 0.0 {
                    status = status.max(HealthLevel::Degraded);
                    details.push("degraded contexts observed".to_string());
                }
            }
        }

        Some(ComponentHealth { name: "Decision Quality".to_string(), status, details: details.join(", ") })
    }

    fn check_system_health(
        &self,
        metrics: &HashMap<MetricType, TimeSeries>,
        issues: &mut Vec<HealthIssue>,
    ) -> Option<ComponentHealth> {
        let mut status = HealthLevel::Healthy;
        let mut details = Vec::new();

        if let Some(error_ts) = metrics.get(&MetricType::ErrorCount) {
            if let Some(errors) = error_ts.latest() {
                if errors > self.thresholds.error_rate_critical as f64 {
                    status = HealthLevel::Critical;
                    issues.push(HealthIssue {
                        severity: HealthLevel::Critical,
                        component: "System".to_string(),
                        description: format!("high error rate: {} errors", errors as u32),
                        recommendation: "check logs for internal_error reasons".to_string(),
                    });
                } else if errors > self.thresholds.error_rate_warning as f64 {
                    status = status.max(HealthLevel::Degraded);
                }
                details.push(format!("errors: {}", errors as u32));
            }
        }

        if let Some(latency_ts) = metrics.get(&MetricType::RequestLatencyMs) {
            if let Some(latency) = latency_ts.latest() {
                if latency > self.thresholds.latency_critical_ms {
                    status = status.max(HealthLevel::Unhealthy);
                    issues.push(HealthIssue {
                        severity: HealthLevel::Unhealthy,
                        component: "System".to_string(),
                        description: format!("request latency at {:.0}ms, near the 5s deadline", latency),
                        recommendation: "check artifact load and I/O wait".to_string(),
                    });
                } else if latency > self.thresholds.latency_warning_ms {
                    status = status.max(HealthLevel::Degraded);
                }
                details.push(format!("latency: {:.0}ms", latency));
            }
        }

        Some(ComponentHealth { name: "System Performance".to_string(), status, details: details.join(", ") })
    }

    fn check_risk_health(
        &self,
        metrics: &HashMap<MetricType, TimeSeries>,
        issues: &mut Vec<HealthIssue>,
    ) -> Option<ComponentHealth> {
        let mut status = HealthLevel::Healthy;
        let mut details = Vec::new();

        if let Some(dd_ts) = metrics.get(&MetricType::DrawdownPct) {
            if let Some(drawdown) = dd_ts.latest() {
                if drawdown > self.thresholds.drawdown_critical_pct {
                    status = HealthLevel::Critical;
                    issues.push(HealthIssue {
                        severity: HealthLevel::Critical,
                        component: "Risk".to_string(),
                        description: format!("drawdown distance consumed to {:.1}%", drawdown * 100.0),
                        recommendation: "expect funded-account guard to block new entries".to_string(),
                    });
                } else if drawdown > self.thresholds.drawdown_warning_pct {
                    status = status.max(HealthLevel::Unhealthy);
                }
                details.push(format!("drawdown: {:.1}%", drawdown * 100.0));
            }
        }

        if let Some(heat_ts) = metrics.get(&MetricType::PortfolioHeatPct) {
            if let Some(heat) = heat_ts.latest() {
                if heat > 0.045 {
                    status = status.max(HealthLevel::Degraded);
                    details.push(format!("portfolio heat: {:.1}%", heat * 100.0));
                }
            }
        }

        Some(ComponentHealth { name: "Risk Management".to_string(), status, details: details.join(", ") })
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthLevel {
    fn max(self, other: Self) -> Self {
        match (self as u8, other as u8) {
            (a, b) if a > b => self,
            _ => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_monitor() {
        let monitor = HealthMonitor::new();
        let metrics = Arc::new(RwLock::new(HashMap::new()));

        {
            let mut metrics_guard = metrics.write().await;

            let mut win_rate_ts = TimeSeries::new(MetricType::WinRateRecent, 100);
            win_rate_ts.push(0.55);
            metrics_guard.insert(MetricType::WinRateRecent, win_rate_ts);

            let mut error_ts = TimeSeries::new(MetricType::ErrorCount, 100);
            error_ts.push(0.0);
            metrics_guard.insert(MetricType::ErrorCount, error_ts);
        }

        let status = monitor.get_status(&metrics).await;
        assert_eq!(status.level, HealthLevel::Healthy);
        assert!(status.score > 80.0);
    }
}
