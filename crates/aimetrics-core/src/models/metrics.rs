//! Derived metrics data models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::{TimeRange, Window};
use super::record::{AiService, MetricRecord};

/// Aggregate counters for one backend over one window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetrics {
    /// Total request count
    pub total_requests: u64,

    /// Successful request count
    pub successful_requests: u64,

    /// Failed request count
    pub failed_requests: u64,

    /// Successful share in percent, 0 when there were no requests
    pub success_rate: f64,

    /// Mean response time in milliseconds
    pub avg_response_time: f64,

    /// Sum of estimated costs
    pub total_cost: f64,

    /// Mean confidence over records that carry one
    pub avg_confidence: Option<f64>,
}

/// Three-way histogram of confidence values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    /// Confidence above 0.8
    pub high: u64,
    /// Confidence in [0.6, 0.8]
    pub medium: u64,
    /// Confidence below 0.6
    pub low: u64,
}

impl ConfidenceDistribution {
    /// Count one confidence value into its bucket
    pub fn add(&mut self, confidence: f64) {
        if confidence > 0.8 {
            self.high += 1;
        } else if confidence >= 0.6 {
            self.medium += 1;
        } else {
            self.low += 1;
        }
    }

    /// Number of values counted
    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }
}

/// Overall aggregate over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Requested range
    pub time_range: TimeRange,

    /// Resolved window start (inclusive)
    pub start_date: DateTime<Utc>,

    /// Resolved window end (exclusive)
    pub end_date: DateTime<Utc>,

    /// Total request count
    pub total_requests: u64,

    /// Successful request count
    pub successful_requests: u64,

    /// Failed request count
    pub failed_requests: u64,

    /// Successful share in percent
    pub success_rate: f64,

    /// Mean response time in milliseconds
    pub avg_response_time: f64,

    /// Mean confidence over records that carry one, 0 when none do
    pub avg_confidence: f64,

    /// Sum of estimated costs
    pub total_cost: f64,

    /// One entry per known backend, zeroed when it saw no traffic
    pub by_service: BTreeMap<AiService, ServiceMetrics>,

    /// Confidence histogram over the whole window
    pub confidence_distribution: ConfidenceDistribution,

    /// Set when the scan cap dropped older records from the window
    pub truncated: bool,
}

impl MetricsSummary {
    /// A structurally valid summary with every figure at zero
    pub fn empty(time_range: TimeRange, window: Window) -> Self {
        Self {
            time_range,
            start_date: window.start,
            end_date: window.end,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            success_rate: 0.0,
            avg_response_time: 0.0,
            avg_confidence: 0.0,
            total_cost: 0.0,
            by_service: AiService::ALL
                .into_iter()
                .map(|service| (service, ServiceMetrics::default()))
                .collect(),
            confidence_distribution: ConfidenceDistribution::default(),
            truncated: false,
        }
    }

    /// Metrics for one backend
    pub fn service(&self, service: AiService) -> Option<&ServiceMetrics> {
        self.by_service.get(&service)
    }
}

/// One timeline bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDataPoint {
    /// Bucket start
    pub timestamp: DateTime<Utc>,

    /// Requests in the bucket, never zero
    pub requests: u64,

    /// Successful share in percent
    pub success_rate: f64,

    /// Mean response time in milliseconds
    pub avg_response_time: f64,

    /// Mean confidence over records that carry one
    pub avg_confidence: Option<f64>,
}

/// Uncapped request count and cost sum for one backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceUsage {
    /// Records in the window
    pub requests: u64,

    /// Sum of their estimated cost
    pub cost: f64,
}

impl ServiceUsage {
    /// Count one record
    pub fn add(&mut self, cost: f64) {
        self.requests += 1;
        self.cost += cost;
    }
}

/// Per-backend usage over a set of records
pub fn tally_usage<'a>(
    records: impl IntoIterator<Item = &'a MetricRecord>,
) -> BTreeMap<AiService, ServiceUsage> {
    let mut usage: BTreeMap<AiService, ServiceUsage> = BTreeMap::new();
    for record in records {
        usage.entry(record.service).or_default().add(record.estimated_cost);
    }
    usage
}

/// Quota usage for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    /// Requests in the reference window
    pub requests: u64,

    /// Cost in the reference window
    pub cost: f64,

    /// Free-tier request allowance for the reference period
    pub free_limit: u64,

    /// `requests / free_limit` in percent, clamped to [0, 100]
    pub usage_percentage: f64,
}

/// Cost and quota view over the reference window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Per-backend usage
    pub services: BTreeMap<AiService, ServiceCost>,

    /// Total cost in the reference window
    pub total: f64,

    /// Cost extrapolated to a 30-day month
    pub projected_monthly: f64,
}

impl CostBreakdown {
    /// A breakdown with zero usage against the given limits
    pub fn empty(free_limits: impl IntoIterator<Item = (AiService, u64)>) -> Self {
        Self {
            services: free_limits
                .into_iter()
                .map(|(service, free_limit)| {
                    (
                        service,
                        ServiceCost {
                            requests: 0,
                            cost: 0.0,
                            free_limit,
                            usage_percentage: 0.0,
                        },
                    )
                })
                .collect(),
            total: 0.0,
            projected_monthly: 0.0,
        }
    }
}

/// Model quality and human acceptance figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean confidence over the reference window
    pub avg_confidence: f64,

    /// Confidence histogram over the reference window
    pub confidence_distribution: ConfidenceDistribution,

    /// Review decisions seen
    pub total_decisions: u64,

    /// Approved share of review decisions in percent
    pub approval_rate: f64,

    /// Rejected share of review decisions in percent
    pub rejection_rate: f64,

    /// Completed share of finished processing jobs in percent
    pub processing_success_rate: f64,
}

/// `part / whole * 100`, or 0 for an empty whole
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
