//! Process-level entry point wiring the components over one set of stores

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::alerting::AlertEngine;
use crate::analytics::{AccuracyAnalyzer, CostProjector, MetricsAggregator};
use crate::collector::{CostCalculator, Recorder};
use crate::config::Config;
use crate::db::{Database, DecisionStore, MetricStore};
use crate::error::Result;
use crate::models::{
    AccuracyMetrics, AiOperation, AiService, Alert, CostBreakdown, MetricsSummary,
    NewDecisionRecord, RecordOptions, TimeRange, TimelineDataPoint,
};

/// Usage monitor. Construct once at startup and share by clone.
#[derive(Clone)]
pub struct Monitor {
    recorder: Recorder,
    aggregator: MetricsAggregator,
    projector: CostProjector,
    accuracy: AccuracyAnalyzer,
    engine: AlertEngine,
    decisions: Arc<dyn DecisionStore>,
    metrics: Arc<dyn MetricStore>,
}

impl Monitor {
    /// Wire all components over `db` using the given configuration
    pub fn new(db: &Database, config: &Config) -> Self {
        let calculator = Arc::new(CostCalculator::from_config(&config.services));
        let aggregator = MetricsAggregator::new(db.metrics.clone(), config.storage.max_scan_rows);
        let projector = CostProjector::new(aggregator.clone(), calculator.clone());

        Self {
            recorder: Recorder::new(db.metrics.clone(), calculator),
            accuracy: AccuracyAnalyzer::new(aggregator.clone(), db.decisions.clone()),
            engine: AlertEngine::new(
                aggregator.clone(),
                projector.clone(),
                db.alerts.clone(),
                config.alerting.clone(),
            ),
            aggregator,
            projector,
            decisions: db.decisions.clone(),
            metrics: db.metrics.clone(),
        }
    }

    /// In-memory monitor with default configuration
    pub fn in_memory() -> Self {
        Self::new(&Database::in_memory(), &Config::default())
    }

    /// Whether the metric store answers
    pub async fn health_check(&self) -> Result<()> {
        self.metrics.health_check().await
    }

    /// The alert engine, for running the scheduler
    pub fn alert_engine(&self) -> &AlertEngine {
        &self.engine
    }

    /// Record one completed AI call; never fails
    pub async fn record_api_call(
        &self,
        service: AiService,
        operation: AiOperation,
        success: bool,
        response_time_ms: u64,
        options: RecordOptions,
    ) -> Option<Uuid> {
        self.recorder
            .record_api_call(service, operation, success, response_time_ms, options)
            .await
    }

    /// Record without waiting for the write
    pub fn record_detached(
        &self,
        service: AiService,
        operation: AiOperation,
        success: bool,
        response_time_ms: u64,
        options: RecordOptions,
    ) {
        self.recorder
            .record_detached(service, operation, success, response_time_ms, options);
    }

    /// Record a review or processing decision; never fails
    pub async fn record_decision(&self, decision: NewDecisionRecord) -> Option<Uuid> {
        match self.decisions.append_decision(decision).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to record decision");
                None
            }
        }
    }

    /// Summary over a range ending now
    pub async fn metrics_summary(&self, range: TimeRange) -> MetricsSummary {
        self.aggregator.summarize(range).await
    }

    /// Bucketed timeline over a range ending now
    pub async fn request_timeline(&self, range: TimeRange) -> Vec<TimelineDataPoint> {
        self.aggregator.timeline(range).await
    }

    /// Quota usage and projected monthly cost over the last 30 days
    pub async fn cost_breakdown(&self) -> CostBreakdown {
        self.projector.breakdown().await
    }

    /// Confidence and decision rates over the last 30 days
    pub async fn accuracy_metrics(&self) -> AccuracyMetrics {
        self.accuracy.accuracy().await
    }

    /// Most recent alerts first
    pub async fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.engine.recent_alerts(limit).await
    }

    /// Alerts nobody has acknowledged yet
    pub async fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.engine.unacknowledged_alerts().await
    }

    /// Evaluate the threshold rules now and return the open alerts
    pub async fn check_thresholds(&self) -> Vec<Alert> {
        self.engine.check_thresholds().await
    }

    /// Acknowledge an alert; unknown ids fail with `NotFound`
    pub async fn acknowledge_alert(&self, alert_id: Uuid, user_id: &str) -> Result<Alert> {
        self.engine.acknowledge(alert_id, user_id).await
    }
}
