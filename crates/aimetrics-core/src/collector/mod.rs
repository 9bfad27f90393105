//! Collector module - best-effort telemetry ingestion
//!
//! Every AI call site reports its outcome here once the call completes.
//! Recording never fails the caller: store and validation errors are logged
//! and counted, then dropped.

mod cost;

pub use cost::{CostCalculator, ServicePricing};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::MetricStore;
use crate::models::{AiOperation, AiService, NewMetricRecord, RecordOptions};

/// Turns call outcomes into stored metric records
#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn MetricStore>,
    cost_calculator: Arc<CostCalculator>,
}

impl Recorder {
    /// Create a recorder writing to the given store
    pub fn new(store: Arc<dyn MetricStore>, cost_calculator: Arc<CostCalculator>) -> Self {
        Self {
            store,
            cost_calculator,
        }
    }

    /// Record one completed call. Returns the record id, or `None` when the
    /// record was dropped.
    pub async fn record_api_call(
        &self,
        service: AiService,
        operation: AiOperation,
        success: bool,
        response_time_ms: u64,
        options: RecordOptions,
    ) -> Option<Uuid> {
        let record = self.build_record(service, operation, success, response_time_ms, options);

        match self.store.append(record).await {
            Ok(id) => {
                metrics::counter!("aimetrics_records_total", "service" => service.as_str())
                    .increment(1);
                debug!(%service, %operation, success, record_id = %id, "Recorded AI call");
                Some(id)
            }
            Err(e) => {
                metrics::counter!("aimetrics_records_dropped_total", "service" => service.as_str())
                    .increment(1);
                warn!(%service, %operation, error = %e, "Failed to record AI call metric");
                None
            }
        }
    }

    /// Record without waiting; the write runs on the current Tokio runtime.
    /// Outside a runtime the record is dropped and counted.
    pub fn record_detached(
        &self,
        service: AiService,
        operation: AiOperation,
        success: bool,
        response_time_ms: u64,
        options: RecordOptions,
    ) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            metrics::counter!("aimetrics_records_dropped_total", "service" => service.as_str())
                .increment(1);
            warn!(%service, %operation, "No Tokio runtime, dropping detached AI call metric");
            return;
        };

        let recorder = self.clone();
        handle.spawn(async move {
            recorder
                .record_api_call(service, operation, success, response_time_ms, options)
                .await;
        });
    }

    fn build_record(
        &self,
        service: AiService,
        operation: AiOperation,
        success: bool,
        response_time_ms: u64,
        options: RecordOptions,
    ) -> NewMetricRecord {
        let error = if success {
            if options.error.is_some() {
                debug!(%service, %operation, "Dropping error text on successful call");
            }
            None
        } else {
            options.error
        };

        let confidence = match options.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => Some(c),
            Some(c) => {
                warn!(%service, %operation, confidence = c, "Discarding out-of-range confidence");
                None
            }
            None => None,
        };

        NewMetricRecord {
            timestamp: Utc::now(),
            service,
            operation,
            success,
            response_time_ms,
            error,
            tokens_used: options.tokens_used,
            estimated_cost: self.cost_calculator.estimate(service, options.tokens_used),
            confidence,
            suggestion_id: options.suggestion_id,
            user_id: options.user_id,
        }
    }
}
