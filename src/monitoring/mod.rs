// Real-time Monitoring Module
// Provides metrics, alerting, and process health for the decision engine.
// The health score is diagnostic only — it never feeds back into a decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

pub mod alerts;
pub mod metrics;
pub mod health;

/// Decision-engine metric types recorded once per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    RequestCount,
    HoldCount,
    BuyCount,
    SellCount,
    CloseCount,
    ScaleInCount,
    ScaleOutCount,
    DcaCount,
    ErrorCount,
    TimeoutCount,
    DegradedCount,
    UnknownSymbolCount,
    RequestLatencyMs,
    PortfolioHeatPct,
    DailyPnlPct,
    DrawdownPct,
    WinRateRecent,
}

/// Metric value with timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub timestamp: SystemTime,
}

/// Time series data for metrics
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub metric_type: MetricType,
    pub values: Vec<MetricValue>,
    pub max_size: usize,
}

impl TimeSeries {
    pub fn new(metric_type: MetricType, max_size: usize) -> Self {
        Self {
            metric_type,
            values: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, value: f64) {
        let metric_value = MetricValue {
            value,
            timestamp: SystemTime::now(),
        };

        self.values.push(metric_value);

        if self.values.len() > self.max_size {
            self.values.remove(0);
        }
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().map(|v| v.value)
    }

    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            let sum: f64 = self.values.iter().map(|v| v.value).sum();
            Some(sum / self.values.len() as f64)
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().map(|v| v.value).fold(None, |min, val| match min {
            None => Some(val),
            Some(m) => Some(m.min(val)),
        })
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().map(|v| v.value).fold(None, |max, val| match max {
            None => Some(val),
            Some(m) => Some(m.max(val)),
        })
    }
}

/// Main monitoring system. One `record_request` call per `decide()` call.
pub struct MonitoringSystem {
    metrics: Arc<RwLock<HashMap<MetricType, TimeSeries>>>,
    alert_manager: Arc<alerts::AlertManager>,
    health_monitor: Arc<health::HealthMonitor>,
}

impl MonitoringSystem {
    pub fn new() -> Self {
        let mut metrics = HashMap::new();

        for metric_type in [
            MetricType::RequestCount,
            MetricType::HoldCount,
            MetricType::BuyCount,
            MetricType::SellCount,
            MetricType::CloseCount,
            MetricType::ScaleInCount,
            MetricType::ScaleOutCount,
            MetricType::DcaCount,
            MetricType::ErrorCount,
            MetricType::TimeoutCount,
            MetricType::DegradedCount,
            MetricType::UnknownSymbolCount,
            MetricType::RequestLatencyMs,
            MetricType::PortfolioHeatPct,
            MetricType::DailyPnlPct,
            MetricType::DrawdownPct,
            MetricType::WinRateRecent,
        ] {
            metrics.insert(metric_type.clone(), TimeSeries::new(metric_type, 1000));
        }

        Self {
            metrics: Arc::new(RwLock::new(metrics)),
            alert_manager: Arc::new(alerts::AlertManager::new()),
            health_monitor: Arc::new(health::HealthMonitor::new()),
        }
    }

    pub async fn record_metric(&self, metric_type: MetricType, value: f64) {
        let mut metrics = self.metrics.write().await;
        if let Some(time_series) = metrics.get_mut(&metric_type) {
            time_series.push(value);
        }
        drop(metrics);
        self.alert_manager.check_metric(&metric_type, value).await;
    }

    /// Record the outcome of one `decide()` call: the action taken (or error
    /// kind) and how long it took.
    pub async fn record_request(&self, action_label: &str, latency_ms: f64) {
        self.record_metric(MetricType::RequestCount, 1.0).await;
        self.record_metric(MetricType::RequestLatencyMs, latency_ms).await;
        let counter = match action_label {
            "HOLD" => MetricType::HoldCount,
            "BUY" => MetricType::BuyCount,
            "SELL" => MetricType::SellCount,
            "CLOSE" => MetricType::CloseCount,
            "SCALE_IN" => MetricType::ScaleInCount,
            "SCALE_OUT" => MetricType::ScaleOutCount,
            "DCA" => MetricType::DcaCount,
            _ => MetricType::ErrorCount,
        };
        self.record_metric(counter, 1.0).await;
    }

    pub async fn get_metric(&self, metric_type: &MetricType) -> Option<f64> {
        let metrics = self.metrics.read().await;
        metrics.get(metric_type).and_then(|ts| ts.latest())
    }

    pub async fn get_metric_stats(&self, metric_type: &MetricType) -> Option<MetricStats> {
        let metrics = self.metrics.read().await;
        metrics.get(metric_type).map(|ts| MetricStats {
            latest: ts.latest().unwrap_or(0.0),
            average: ts.average().unwrap_or(0.0),
            min: ts.min().unwrap_or(0.0),
            max: ts.max().unwrap_or(0.0),
            count: ts.values.len(),
        })
    }

    /// Diagnostic snapshot only; never consulted by the orchestrator when
    /// making a decision (spec §0.4 / §4.12).
    pub async fn get_health_status(&self) -> health::HealthStatus {
        self.health_monitor.get_status(&self.metrics).await
    }

    pub async fn export_snapshot(&self) -> MetricsSnapshot {
        let metrics = self.metrics.read().await;
        let mut snapshot = HashMap::new();

        for metric_type in metrics.keys() {
            if let Some(stats) = self.get_metric_stats(metric_type).await {
                snapshot.insert(metric_type.clone(), stats);
            }
        }

        MetricsSnapshot {
            timestamp: SystemTime::now(),
            metrics: snapshot,
            health: self.get_health_status().await,
        }
    }
}

impl Default for MonitoringSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricStats {
    pub latest: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: SystemTime,
    pub metrics: HashMap<MetricType, MetricStats>,
    pub health: health::HealthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_time_series() {
        let mut ts = TimeSeries::new(MetricType::WinRateRecent, 5);

        ts.push(0.75);
        ts.push(0.80);
        ts.push(0.85);

        assert_eq!(ts.latest(), Some(0.85));
        assert_eq!(ts.average(), Some(0.80));
        assert_eq!(ts.min(), Some(0.75));
        assert_eq!(ts.max(), Some(0.85));
    }

    #[tokio::test]
    async fn test_monitoring_system_records_requests() {
        let monitor = MonitoringSystem::new();

        monitor.record_request("HOLD", 4.2).await;
        monitor.record_request("BUY", 6.8).await;

        assert_eq!(monitor.get_metric(&MetricType::RequestCount).await, Some(1.0));
        assert_eq!(monitor.get_metric(&MetricType::HoldCount).await, Some(1.0));
        assert_eq!(monitor.get_metric(&MetricType::BuyCount).await, Some(1.0));
    }
}
