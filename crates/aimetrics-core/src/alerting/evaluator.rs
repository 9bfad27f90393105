//! Threshold rule evaluation engine

use std::sync::Arc;

use serde_json::json;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analytics::{CostProjector, MetricsAggregator};
use crate::config::{AlertThresholds, AlertingConfig};
use crate::db::AlertStore;
use crate::error::Result;
use crate::models::{
    percentage, AckOutcome, Alert, AlertType, CostBreakdown, MetricsSummary, Severity, TimeRange,
};

/// Rules look at this window
const EVALUATION_RANGE: TimeRange = TimeRange::Last24Hours;

/// Checks the fixed threshold rules against the latest summary and persists
/// the alerts that fire. Alerts never resolve on their own; they stay open
/// until someone acknowledges them.
#[derive(Clone)]
pub struct AlertEngine {
    aggregator: MetricsAggregator,
    projector: CostProjector,
    alerts: Arc<dyn AlertStore>,
    config: AlertingConfig,
}

impl AlertEngine {
    /// Create a new engine
    pub fn new(
        aggregator: MetricsAggregator,
        projector: CostProjector,
        alerts: Arc<dyn AlertStore>,
        config: AlertingConfig,
    ) -> Self {
        Self {
            aggregator,
            projector,
            alerts,
            config,
        }
    }

    /// Run `check_thresholds` on every scheduler tick, forever
    pub async fn start(&self) {
        info!(interval = ?self.config.check_interval, "Starting threshold scheduler");

        let mut ticker = interval(self.config.check_interval);

        loop {
            ticker.tick().await;
            let open = self.check_thresholds().await;
            debug!(open_alerts = open.len(), "Threshold check finished");
        }
    }

    /// Evaluate every rule, persist what fired, and return the open alerts
    pub async fn check_thresholds(&self) -> Vec<Alert> {
        let summary = self.aggregator.summarize(EVALUATION_RANGE).await;
        let breakdown = self.projector.breakdown().await;

        let fired = evaluate_rules(&self.config.thresholds, &summary, &breakdown);
        debug!(
            total_requests = summary.total_requests,
            fired = fired.len(),
            "Evaluated threshold rules"
        );

        for alert in fired {
            let stored = if self.config.deduplicate {
                self.alerts.insert_alert_if_absent(&alert).await
            } else {
                self.alerts.insert_alert(&alert).await.map(|()| true)
            };

            match stored {
                Ok(true) => {
                    metrics::counter!("aimetrics_alerts_created_total", "type" => alert.alert_type.as_str())
                        .increment(1);
                    warn!(
                        alert_id = %alert.id,
                        alert_type = %alert.alert_type,
                        message = %alert.message,
                        "Alert raised"
                    );
                }
                Ok(false) => {
                    debug!(
                        alert_type = %alert.alert_type,
                        service = alert.service().unwrap_or_default(),
                        "Open alert already covers this incident"
                    );
                }
                Err(e) => {
                    error!(alert_type = %alert.alert_type, error = %e, "Failed to store alert");
                }
            }
        }

        self.unacknowledged_alerts().await
    }

    /// Most recent alerts first; empty when the store is unreachable
    pub async fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.recent_alerts(limit).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list recent alerts");
            Vec::new()
        })
    }

    /// Open alerts, most recent first; empty when the store is unreachable
    pub async fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.alerts.unacknowledged_alerts().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list unacknowledged alerts");
            Vec::new()
        })
    }

    /// Acknowledge an alert. A repeated acknowledgement returns the alert as
    /// first acknowledged.
    pub async fn acknowledge(&self, alert_id: Uuid, user_id: &str) -> Result<Alert> {
        match self.alerts.acknowledge(alert_id, user_id).await? {
            AckOutcome::Acknowledged(alert) => {
                info!(%alert_id, user_id, "Alert acknowledged");
                Ok(alert)
            }
            AckOutcome::AlreadyAcknowledged(alert) => {
                debug!(
                    %alert_id,
                    acknowledged_by = alert.acknowledged_by.as_deref().unwrap_or_default(),
                    "Alert was already acknowledged"
                );
                Ok(alert)
            }
        }
    }
}

/// Alerts for every rule that fires on the given figures
pub fn evaluate_rules(
    thresholds: &AlertThresholds,
    summary: &MetricsSummary,
    breakdown: &CostBreakdown,
) -> Vec<Alert> {
    let mut fired = Vec::new();

    if summary.success_rate < thresholds.min_success_rate
        && summary.total_requests > thresholds.error_rate_min_requests
    {
        let error_rate = percentage(summary.failed_requests, summary.total_requests);
        fired.push(Alert::new(
            AlertType::HighErrorRate,
            Severity::Warning,
            format!("High error rate detected: {error_rate:.1}% of requests failed in the last 24 hours"),
            json!({
                "error_rate": error_rate,
                "success_rate": summary.success_rate,
                "total_requests": summary.total_requests,
                "failed_requests": summary.failed_requests,
            }),
        ));
    }

    if summary.avg_response_time > thresholds.max_avg_response_time_ms {
        fired.push(Alert::new(
            AlertType::SlowResponse,
            Severity::Warning,
            format!(
                "Slow AI responses: average response time is {:.0}ms",
                summary.avg_response_time
            ),
            json!({
                "avg_response_time": summary.avg_response_time,
                "threshold": thresholds.max_avg_response_time_ms,
            }),
        ));
    }

    // Without any confidence values the mean is meaningless, not low
    if summary.confidence_distribution.total() > 0
        && summary.avg_confidence < thresholds.min_avg_confidence
        && summary.total_requests > thresholds.confidence_min_requests
    {
        fired.push(Alert::new(
            AlertType::LowConfidence,
            Severity::Warning,
            format!(
                "Low AI confidence: average confidence is {:.1}%",
                summary.avg_confidence * 100.0
            ),
            json!({
                "avg_confidence": summary.avg_confidence,
                "threshold": thresholds.min_avg_confidence,
            }),
        ));
    }

    for (service, cost) in &breakdown.services {
        if cost.usage_percentage > thresholds.max_usage_percentage {
            fired.push(Alert::new(
                AlertType::RateLimitWarning,
                Severity::Warning,
                format!(
                    "{service} usage at {:.1}% of free tier limit",
                    cost.usage_percentage
                ),
                json!({
                    "service": service.as_str(),
                    "usage_percentage": cost.usage_percentage,
                    "requests": cost.requests,
                    "free_limit": cost.free_limit,
                }),
            ));
        }
    }

    fired
}
