//! Confidence and human-decision figures
//!
//! The metric records and the decision stream are read independently, so the
//! result is a best-effort snapshot: a decision written between the two reads
//! may be counted while its metric record is not, or the reverse. That skew is
//! accepted; the figures are trend indicators, not ledgers.

use std::sync::Arc;

use tracing::warn;

use crate::db::DecisionStore;
use crate::models::{
    percentage, AccuracyMetrics, DecisionOutcome, DecisionRecord, ProcessingStatus, ReviewStatus,
    Window,
};

use super::aggregator::MetricsAggregator;
use super::cost::REFERENCE_RANGE;

/// Joins the reference-window summary with the decision stream
#[derive(Clone)]
pub struct AccuracyAnalyzer {
    aggregator: MetricsAggregator,
    decisions: Arc<dyn DecisionStore>,
}

impl AccuracyAnalyzer {
    /// Create an analyzer over the given aggregator and decision store
    pub fn new(aggregator: MetricsAggregator, decisions: Arc<dyn DecisionStore>) -> Self {
        Self {
            aggregator,
            decisions,
        }
    }

    /// Accuracy figures over the last 30 days
    pub async fn accuracy(&self) -> AccuracyMetrics {
        let summary = self.aggregator.summarize(REFERENCE_RANGE).await;
        let window = Window {
            start: summary.start_date,
            end: summary.end_date,
        };

        let decisions = match self.decisions.query_decisions(window).await {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!(error = %e, "Decision query failed, reporting zero decision rates");
                Vec::new()
            }
        };

        let mut metrics = decision_rates(&decisions);
        metrics.avg_confidence = summary.avg_confidence;
        metrics.confidence_distribution = summary.confidence_distribution;
        metrics
    }
}

/// Approval, rejection and processing rates; confidence fields left at zero
pub fn decision_rates(decisions: &[DecisionRecord]) -> AccuracyMetrics {
    let mut reviews = 0;
    let mut approved = 0;
    let mut rejected = 0;
    let mut completed = 0;
    let mut failed = 0;

    for decision in decisions {
        match decision.outcome {
            DecisionOutcome::Review(status) => {
                reviews += 1;
                match status {
                    ReviewStatus::Approved => approved += 1,
                    ReviewStatus::Rejected => rejected += 1,
                    ReviewStatus::Pending => {}
                }
            }
            DecisionOutcome::Processing(ProcessingStatus::Completed) => completed += 1,
            DecisionOutcome::Processing(ProcessingStatus::Failed) => failed += 1,
            DecisionOutcome::Processing(ProcessingStatus::Queued) => {}
        }
    }

    AccuracyMetrics {
        total_decisions: reviews,
        approval_rate: percentage(approved, reviews),
        rejection_rate: percentage(rejected, reviews),
        processing_success_rate: percentage(completed, completed + failed),
        ..Default::default()
    }
}
