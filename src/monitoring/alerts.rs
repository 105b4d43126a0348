// Alert Management System
// Handles alert rules, notifications, and alert history for the decision engine.

use super::MetricType;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

/// Alert record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub timestamp: SystemTime,
    pub acknowledged: bool,
}

/// Alert rule for automatic monitoring
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub metric_type: MetricType,
    pub condition: AlertCondition,
    pub level: AlertLevel,
    pub title: String,
    pub message_template: String,
}

/// Alert conditions
#[derive(Debug, Clone)]
pub enum AlertCondition {
    Above(f64),
    Below(f64),
    Equal(f64),
    OutsideRange(f64, f64),
    InsideRange(f64, f64),
}

/// Alert manager
pub struct AlertManager {
    alerts: Arc<RwLock<VecDeque<Alert>>>,
    rules: Arc<RwLock<Vec<AlertRule>>>,
    max_alerts: usize,
}

impl AlertManager {
    pub fn new() -> Self {
        let manager = Self {
            alerts: Arc::new(RwLock::new(VecDeque::new())),
            rules: Arc::new(RwLock::new(Vec::new())),
            max_alerts: 1000,
        };

        manager.setup_default_rules();
        manager
    }

    /// Setup default monitoring rules
    fn setup_default_rules(&self) {
        let default_rules = vec![
            AlertRule {
                metric_type: MetricType::WinRateRecent,
                condition: AlertCondition::Below(0.45),
                level: AlertLevel::Warning,
                title: "Low rolling win rate".to_string(),
                message_template: "win rate dropped to {value:.1}%".to_string(),
            },
            AlertRule {
                metric_type: MetricType::WinRateRecent,
                condition: AlertCondition::Below(0.35),
                level: AlertLevel::Critical,
                title: "Critical rolling win rate".to_string(),
                message_template: "win rate critically low at {value:.1}%".to_string(),
            },
            AlertRule {
                metric_type: MetricType::DailyPnlPct,
                condition: AlertCondition::Below(-0.8),
                level: AlertLevel::Error,
                title: "Approaching daily-loss envelope".to_string(),
                message_template: "daily P&L distance at {value:.2}".to_string(),
            },
            AlertRule {
                metric_type: MetricType::DrawdownPct,
                condition: AlertCondition::Above(0.10),
                level: AlertLevel::Warning,
                title: "High drawdown distance consumed".to_string(),
                message_template: "drawdown at {value:.1}%".to_string(),
            },
            AlertRule {
                metric_type: MetricType::PortfolioHeatPct,
                condition: AlertCondition::Above(0.045),
                level: AlertLevel::Warning,
                title: "Portfolio heat nearing ceiling".to_string(),
                message_template: "portfolio heat at {value:.1}%".to_string(),
            },
            AlertRule {
                metric_type: MetricType::ErrorCount,
                condition: AlertCondition::Above(10.0),
                level: AlertLevel::Error,
                title: "High internal error rate".to_string(),
                message_template: "{value} internal errors in monitoring window".to_string(),
            },
            AlertRule {
                metric_type: MetricType::RequestLatencyMs,
                condition: AlertCondition::Above(4500.0),
                level: AlertLevel::Warning,
                title: "Request latency nearing deadline".to_string(),
                message_template: "request latency at {value:.0}ms".to_string(),
            },
        ];

        let rules = self.rules.clone();
        tokio::spawn(async move {
            let mut rules_guard = rules.write().await;
            rules_guard.extend(default_rules);
        });
    }

    /// Check metric against rules
    pub async fn check_metric(&self, metric_type: &MetricType, value: f64) {
        let rules = self.rules.read().await;

        for rule in rules.iter() {
            if &rule.metric_type != metric_type {
                continue;
            }

            let triggered = match &rule.condition {
                AlertCondition::Above(threshold) => value > *threshold,
                AlertCondition::Below(threshold) => value < *threshold,
                AlertCondition::Equal(target) => (value - target).abs() < f64::EPSILON,
                AlertCondition::OutsideRange(min, max) => value < *min || value > *max,
                AlertCondition::InsideRange(min, max) => value >= *min && value <= *max,
            };

            if triggered {
                let message = rule.message_template.replace("{value}", &format!("{}", value));
                self.send_alert(rule.level, &rule.title, &message).await;
            }
        }
    }

    /// Send an alert
    pub async fn send_alert(&self, level: AlertLevel, title: &str, message: &str) {
        let alert = Alert {
            id: format!("{:?}-{}", SystemTime::now(), title),
            level,
            title: title.to_string(),
            message: message.to_string(),
            timestamp: SystemTime::now(),
            acknowledged: false,
        };

        match level {
            AlertLevel::Info => tracing::info!(%title, %message, "alert"),
            AlertLevel::Warning => tracing::warn!(%title, %message, "alert"),
            AlertLevel::Error => tracing::error!(%title, %message, "alert"),
            AlertLevel::Critical => tracing::error!(%title, %message, "critical alert"),
        }

        let mut alerts = self.alerts.write().await;
        alerts.push_back(alert.clone());

        while alerts.len() > self.max_alerts {
            alerts.pop_front();
        }
    }

    pub async fn get_alerts(&self, limit: usize) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts.iter().rev().take(limit).cloned().collect()
    }

    pub async fn get_unacknowledged_alerts(&self) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts.iter().filter(|a| !a.acknowledged).cloned().collect()
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) {
        let mut alerts = self.alerts.write().await;
        for alert in alerts.iter_mut() {
            if alert.id == alert_id {
                alert.acknowledged = true;
                break;
            }
        }
    }

    pub async fn clear_alerts(&self) {
        let mut alerts = self.alerts.write().await;
        alerts.clear();
    }

    pub async fn add_rule(&self, rule: AlertRule) {
        let mut rules = self.rules.write().await;
        rules.push(rule);
    }

    pub async fn remove_rule(&self, metric_type: &MetricType) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| &r.metric_type != metric_type);
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_alert_manager() {
        let manager = AlertManager::new();

        manager.send_alert(AlertLevel::Warning, "Test Alert", "this is a test alert message").await;

        let alerts = manager.get_alerts(10).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Test Alert");
        assert!(!alerts[0].acknowledged);

        let alert_id = alerts[0].id.clone();
        manager.acknowledge_alert(&alert_id).await;

        let unack_alerts = manager.get_unacknowledged_alerts().await;
        assert_eq!(unack_alerts.len(), 0);
    }
}
