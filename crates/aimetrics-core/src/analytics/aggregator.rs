//! Windowed summaries and timeline buckets over stored metric records

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tracing::{debug, warn};

use crate::db::MetricStore;
use crate::error::Result;
use crate::models::{
    percentage, AiService, MetricRecord, MetricsSummary, RecordFilter, ServiceMetrics,
    ServiceUsage, TimeRange, TimelineDataPoint, Window,
};

/// Computes summaries and timelines on demand. Reads only; safe to share.
#[derive(Clone)]
pub struct MetricsAggregator {
    store: Arc<dyn MetricStore>,
    max_scan_rows: usize,
}

impl MetricsAggregator {
    /// Create an aggregator reading from `store`, scanning at most
    /// `max_scan_rows` records per query
    pub fn new(store: Arc<dyn MetricStore>, max_scan_rows: usize) -> Self {
        Self {
            store,
            max_scan_rows: max_scan_rows.max(1),
        }
    }

    /// Summary over a named range ending now
    pub async fn summarize(&self, range: TimeRange) -> MetricsSummary {
        self.summarize_window(range, range.window()).await
    }

    /// Summary over an explicit window. A failed read yields the zeroed
    /// summary rather than an error.
    pub async fn summarize_window(&self, range: TimeRange, window: Window) -> MetricsSummary {
        match self.fetch(window).await {
            Ok((records, truncated)) => {
                let mut summary = summarize_records(range, window, &records);
                summary.truncated = truncated;
                summary
            }
            Err(e) => {
                warn!(time_range = %range, error = %e, "Metrics query failed, returning empty summary");
                MetricsSummary::empty(range, window)
            }
        }
    }

    /// Bucketed request timeline over a named range ending now
    pub async fn timeline(&self, range: TimeRange) -> Vec<TimelineDataPoint> {
        self.timeline_window(range, range.window()).await
    }

    /// Bucketed request timeline over an explicit window
    pub async fn timeline_window(&self, range: TimeRange, window: Window) -> Vec<TimelineDataPoint> {
        match self.fetch(window).await {
            Ok((records, _)) => bucket_records(&records, range.bucket_width()),
            Err(e) => {
                warn!(time_range = %range, error = %e, "Timeline query failed, returning no points");
                Vec::new()
            }
        }
    }

    /// Per-backend request counts and cost over the whole window, without the
    /// scan cap. Empty when the store is unreachable.
    pub async fn usage_by_service(&self, window: Window) -> BTreeMap<AiService, ServiceUsage> {
        self.store.usage_by_service(window).await.unwrap_or_else(|e| {
            warn!(error = %e, "Usage query failed, returning no usage");
            BTreeMap::new()
        })
    }

    async fn fetch(&self, window: Window) -> Result<(Vec<MetricRecord>, bool)> {
        // One extra row tells a full window apart from a capped one
        let filter = RecordFilter {
            limit: Some(self.max_scan_rows.saturating_add(1)),
            ..Default::default()
        };

        let mut records = self.store.query(window, &filter).await?;
        let truncated = records.len() > self.max_scan_rows;
        if truncated {
            let excess = records.len() - self.max_scan_rows;
            records.drain(..excess);
            warn!(
                max_scan_rows = self.max_scan_rows,
                "Scan cap reached, older records excluded from aggregation"
            );
        }

        debug!(count = records.len(), truncated, "Fetched metric records");
        Ok((records, truncated))
    }
}

/// Running totals for one group of records
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    total: u64,
    successful: u64,
    response_time_sum: f64,
    cost_sum: f64,
    confidence_sum: f64,
    confidence_count: u64,
}

impl Accumulator {
    fn push(&mut self, record: &MetricRecord) {
        self.total += 1;
        if record.success {
            self.successful += 1;
        }
        self.response_time_sum += record.response_time_ms as f64;
        self.cost_sum += record.estimated_cost;
        if let Some(confidence) = record.confidence {
            self.confidence_sum += confidence;
            self.confidence_count += 1;
        }
    }

    fn failed(&self) -> u64 {
        self.total - self.successful
    }

    fn success_rate(&self) -> f64 {
        percentage(self.successful, self.total)
    }

    fn avg_response_time(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.response_time_sum / self.total as f64
        }
    }

    fn avg_confidence(&self) -> Option<f64> {
        (self.confidence_count > 0).then(|| self.confidence_sum / self.confidence_count as f64)
    }

    fn to_service_metrics(self) -> ServiceMetrics {
        ServiceMetrics {
            total_requests: self.total,
            successful_requests: self.successful,
            failed_requests: self.failed(),
            success_rate: self.success_rate(),
            avg_response_time: self.avg_response_time(),
            total_cost: self.cost_sum,
            avg_confidence: self.avg_confidence(),
        }
    }
}

/// Aggregate already-fetched records into a summary
pub fn summarize_records(range: TimeRange, window: Window, records: &[MetricRecord]) -> MetricsSummary {
    let mut summary = MetricsSummary::empty(range, window);
    let mut overall = Accumulator::default();
    let mut per_service: BTreeMap<_, Accumulator> = BTreeMap::new();

    for record in records {
        overall.push(record);
        per_service.entry(record.service).or_default().push(record);
        if let Some(confidence) = record.confidence {
            summary.confidence_distribution.add(confidence);
        }
    }

    summary.total_requests = overall.total;
    summary.successful_requests = overall.successful;
    summary.failed_requests = overall.failed();
    summary.success_rate = overall.success_rate();
    summary.avg_response_time = overall.avg_response_time();
    summary.avg_confidence = overall.avg_confidence().unwrap_or(0.0);
    summary.total_cost = overall.cost_sum;

    for (service, acc) in per_service {
        summary.by_service.insert(service, acc.to_service_metrics());
    }

    summary
}

/// Group records into fixed-width buckets aligned to the Unix epoch. Empty
/// buckets are omitted; output is ascending by bucket start.
pub fn bucket_records(records: &[MetricRecord], width: Duration) -> Vec<TimelineDataPoint> {
    let width_ms = width.num_milliseconds().max(1);
    let mut buckets: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for record in records {
        let start = record.timestamp.timestamp_millis().div_euclid(width_ms) * width_ms;
        buckets.entry(start).or_default().push(record);
    }

    buckets
        .into_iter()
        .filter_map(|(start, acc)| {
            let timestamp = Utc.timestamp_millis_opt(start).single()?;
            Some(TimelineDataPoint {
                timestamp,
                requests: acc.total,
                success_rate: acc.success_rate(),
                avg_response_time: acc.avg_response_time(),
                avg_confidence: acc.avg_confidence(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::Error;
    use crate::models::{AiOperation, AiService, NewMetricRecord};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn record(
        timestamp: DateTime<Utc>,
        service: AiService,
        success: bool,
        response_time_ms: u64,
        confidence: Option<f64>,
    ) -> MetricRecord {
        MetricRecord {
            id: Uuid::new_v4(),
            timestamp,
            service,
            operation: AiOperation::Classification,
            success,
            response_time_ms,
            error: (!success).then(|| "failed".to_string()),
            tokens_used: None,
            estimated_cost: 0.0,
            confidence,
            suggestion_id: None,
            user_id: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    struct FailingStore;

    #[async_trait]
    impl MetricStore for FailingStore {
        async fn append(&self, _record: NewMetricRecord) -> Result<Uuid> {
            Err(Error::unavailable("store offline"))
        }

        async fn query(&self, _window: Window, _filter: &RecordFilter) -> Result<Vec<MetricRecord>> {
            Err(Error::unavailable("store offline"))
        }

        async fn usage_by_service(
            &self,
            _window: Window,
        ) -> Result<BTreeMap<AiService, ServiceUsage>> {
            Err(Error::unavailable("store offline"))
        }
    }

    #[test]
    fn test_summary_rates_and_means() {
        let now = fixed_now();
        let window = TimeRange::Last24Hours.window_at(now);
        let mut records: Vec<MetricRecord> = (0..9)
            .map(|i| record(now - Duration::minutes(i + 1), AiService::Groq, true, 200, None))
            .collect();
        records.push(record(now - Duration::hours(2), AiService::HuggingFace, false, 200, Some(0.5)));

        let summary = summarize_records(TimeRange::Last24Hours, window, &records);

        assert_eq!(summary.total_requests, 10);
        assert_eq!(summary.failed_requests, 1);
        assert_eq!(summary.success_rate, 90.0);
        assert_eq!(summary.avg_response_time, 200.0);
        assert_eq!(summary.avg_confidence, 0.5);
        assert_eq!(summary.confidence_distribution.low, 1);

        let groq = summary.service(AiService::Groq).unwrap();
        assert_eq!(groq.total_requests, 9);
        assert_eq!(groq.success_rate, 100.0);
        assert_eq!(groq.avg_confidence, None);

        let hf = summary.service(AiService::HuggingFace).unwrap();
        assert_eq!(hf.success_rate, 0.0);
        assert_eq!(hf.avg_confidence, Some(0.5));
    }

    #[test]
    fn test_confidence_mean_ignores_records_without_confidence() {
        let now = fixed_now();
        let window = TimeRange::Last24Hours.window_at(now);
        let records = vec![
            record(now - Duration::minutes(1), AiService::Groq, true, 100, Some(0.9)),
            record(now - Duration::minutes(2), AiService::Groq, true, 100, Some(0.7)),
            record(now - Duration::minutes(3), AiService::Groq, true, 100, None),
        ];

        let summary = summarize_records(TimeRange::Last24Hours, window, &records);

        assert!((summary.avg_confidence - 0.8).abs() < 1e-9);
        assert_eq!(summary.confidence_distribution.total(), 2);
        assert_eq!(summary.confidence_distribution.high, 1);
        assert_eq!(summary.confidence_distribution.medium, 1);
    }

    #[test]
    fn test_timeline_buckets_hourly_and_skips_empty_hours() {
        let base = Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap();
        let records = vec![
            record(base + Duration::minutes(5), AiService::Groq, true, 100, None),
            record(base + Duration::minutes(55), AiService::Groq, false, 300, Some(0.5)),
            record(base + Duration::hours(3) + Duration::minutes(1), AiService::HuggingFace, true, 50, None),
        ];

        let points = bucket_records(&records, Duration::hours(1));

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, base);
        assert_eq!(points[0].requests, 2);
        assert_eq!(points[0].success_rate, 50.0);
        assert_eq!(points[0].avg_response_time, 200.0);
        assert_eq!(points[0].avg_confidence, Some(0.5));
        assert_eq!(points[1].timestamp, base + Duration::hours(3));
        assert_eq!(points[1].avg_confidence, None);
    }

    #[test]
    fn test_timeline_daily_buckets_align_to_midnight_utc() {
        let records = vec![
            record(Utc.with_ymd_and_hms(2024, 6, 14, 23, 59, 0).unwrap(), AiService::Groq, true, 1, None),
            record(Utc.with_ymd_and_hms(2024, 6, 15, 0, 1, 0).unwrap(), AiService::Groq, true, 1, None),
        ];

        let points = bucket_records(&records, TimeRange::Last7Days.bucket_width());

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, Utc.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).unwrap());
        assert_eq!(points[1].timestamp, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_empty_all_range_is_zeroed() {
        let aggregator = MetricsAggregator::new(Arc::new(MemoryStore::new()), 1000);

        let summary = aggregator.summarize(TimeRange::All).await;

        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.avg_response_time, 0.0);
        assert_eq!(summary.avg_confidence, 0.0);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.by_service.len(), 2);
        assert!(summary.by_service.values().all(|s| s.total_requests == 0));
        assert!(aggregator.timeline(TimeRange::All).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty_results() {
        let aggregator = MetricsAggregator::new(Arc::new(FailingStore), 1000);

        let summary = aggregator.summarize(TimeRange::Last7Days).await;
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.by_service.len(), 2);

        assert!(aggregator.timeline(TimeRange::Last7Days).await.is_empty());
        assert!(aggregator
            .usage_by_service(TimeRange::Last30Days.window())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_summarize_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            store
                .append(NewMetricRecord {
                    timestamp: Utc::now() - Duration::minutes(i + 1),
                    service: AiService::Groq,
                    operation: AiOperation::Sentiment,
                    success: i % 2 == 0,
                    response_time_ms: 100 * i as u64,
                    error: None,
                    tokens_used: None,
                    estimated_cost: 0.0,
                    confidence: Some(0.7),
                    suggestion_id: None,
                    user_id: None,
                })
                .await
                .unwrap();
        }
        let aggregator = MetricsAggregator::new(store, 1000);
        let window = TimeRange::Last24Hours.window();

        let first = aggregator.summarize_window(TimeRange::Last24Hours, window).await;
        let second = aggregator.summarize_window(TimeRange::Last24Hours, window).await;

        assert_eq!(first, second);
        assert_eq!(first.total_requests, 5);
    }

    #[tokio::test]
    async fn test_scan_cap_sets_truncated_flag() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            store
                .append(NewMetricRecord {
                    timestamp: Utc::now() - Duration::minutes(i + 1),
                    service: AiService::HuggingFace,
                    operation: AiOperation::Extraction,
                    success: true,
                    response_time_ms: 10,
                    error: None,
                    tokens_used: None,
                    estimated_cost: 0.0,
                    confidence: None,
                    suggestion_id: None,
                    user_id: None,
                })
                .await
                .unwrap();
        }

        let capped = MetricsAggregator::new(store.clone(), 3).summarize(TimeRange::All).await;
        assert!(capped.truncated);
        assert_eq!(capped.total_requests, 3);

        let full = MetricsAggregator::new(store, 5).summarize(TimeRange::All).await;
        assert!(!full.truncated);
        assert_eq!(full.total_requests, 5);
    }

    fn arb_record() -> impl Strategy<Value = MetricRecord> {
        (
            0i64..30 * 24 * 60,
            prop::bool::ANY,
            prop::bool::ANY,
            0u64..20_000,
            prop::option::of(0.0f64..=1.0),
        )
            .prop_map(|(minutes_ago, groq, success, latency, confidence)| {
                let service = if groq { AiService::Groq } else { AiService::HuggingFace };
                record(fixed_now() - Duration::minutes(minutes_ago), service, success, latency, confidence)
            })
    }

    proptest! {
        #[test]
        fn prop_summary_laws(records in prop::collection::vec(arb_record(), 0..200)) {
            let window = TimeRange::Last30Days.window_at(fixed_now());
            let summary = summarize_records(TimeRange::Last30Days, window, &records);

            prop_assert!((0.0..=100.0).contains(&summary.success_rate));
            if summary.total_requests == 0 {
                prop_assert_eq!(summary.success_rate, 0.0);
            } else if summary.failed_requests == 0 {
                prop_assert_eq!(summary.success_rate, 100.0);
            }

            let partitioned: u64 = summary.by_service.values().map(|s| s.total_requests).sum();
            prop_assert_eq!(partitioned, summary.total_requests);

            let with_confidence = records.iter().filter(|r| r.confidence.is_some()).count() as u64;
            prop_assert_eq!(summary.confidence_distribution.total(), with_confidence);
        }

        #[test]
        fn prop_timeline_is_strictly_ascending_without_empty_buckets(
            records in prop::collection::vec(arb_record(), 0..200)
        ) {
            let points = bucket_records(&records, Duration::hours(1));

            prop_assert!(points.iter().all(|p| p.requests > 0));
            prop_assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            let bucketed: u64 = points.iter().map(|p| p.requests).sum();
            prop_assert_eq!(bucketed, records.len() as u64);
        }
    }
}
