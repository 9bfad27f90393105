//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    AccuracyMetrics, AiOperation, AiService, Alert, CostBreakdown, DecisionOutcome,
    MetricsSummary, NewDecisionRecord, RecordOptions, TimeRange, TimelineDataPoint,
};
use crate::monitor::Monitor;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub monitor: Monitor,
    pub prometheus: Option<PrometheusHandle>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn error_response(e: Error) -> (StatusCode, String) {
    let status = match e {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint; 503 when the metric store does not answer
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = match state.monitor.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Prometheus text exposition of the process counters
pub async fn prometheus_metrics(
    State(state): State<AppState>,
) -> Result<String, (StatusCode, String)> {
    state
        .prometheus
        .map(|handle| handle.render())
        .ok_or((StatusCode::NOT_FOUND, "Metrics exporter not installed".to_string()))
}

/// Call outcome reported by an AI call site
#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub service: AiService,
    pub operation: AiOperation,
    pub success: bool,
    pub response_time_ms: u64,
    #[serde(flatten)]
    pub options: RecordOptions,
}

/// Ingestion acknowledgement; `id` is absent when the record was dropped
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordResponse {
    pub accepted: bool,
    pub id: Option<Uuid>,
}

/// Record one AI call. Always answers 202, ingestion is best-effort.
pub async fn ingest_record(
    State(state): State<AppState>,
    Json(req): Json<RecordRequest>,
) -> (StatusCode, Json<RecordResponse>) {
    let id = state
        .monitor
        .record_api_call(
            req.service,
            req.operation,
            req.success,
            req.response_time_ms,
            req.options,
        )
        .await;

    (
        StatusCode::ACCEPTED,
        Json(RecordResponse {
            accepted: id.is_some(),
            id,
        }),
    )
}

/// Decision reported by the review or processing workflow
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub suggestion_id: Option<String>,
    pub outcome: DecisionOutcome,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Record one decision
pub async fn ingest_decision(
    State(state): State<AppState>,
    Json(req): Json<DecisionRequest>,
) -> (StatusCode, Json<RecordResponse>) {
    let id = state
        .monitor
        .record_decision(NewDecisionRecord {
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            suggestion_id: req.suggestion_id,
            outcome: req.outcome,
        })
        .await;

    (
        StatusCode::ACCEPTED,
        Json(RecordResponse {
            accepted: id.is_some(),
            id,
        }),
    )
}

/// `?range=24h|7d|30d|all`, defaulting to 24h
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
}

impl RangeQuery {
    fn parse(&self) -> Result<TimeRange, (StatusCode, String)> {
        self.range
            .as_deref()
            .map_or(Ok(TimeRange::default()), str::parse::<TimeRange>)
            .map_err(error_response)
    }
}

/// Windowed summary
pub async fn get_metrics_summary(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<MetricsSummary> {
    let range = query.parse()?;
    Ok(Json(state.monitor.metrics_summary(range).await))
}

/// Bucketed request timeline
pub async fn get_timeline(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<TimelineDataPoint>> {
    let range = query.parse()?;
    Ok(Json(state.monitor.request_timeline(range).await))
}

/// 30-day cost breakdown
pub async fn get_cost_breakdown(State(state): State<AppState>) -> Json<CostBreakdown> {
    Json(state.monitor.cost_breakdown().await)
}

/// 30-day accuracy figures
pub async fn get_accuracy(State(state): State<AppState>) -> Json<AccuracyMetrics> {
    Json(state.monitor.accuracy_metrics().await)
}

/// Query parameters for listing alerts
#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub limit: Option<usize>,
}

/// Alert list response
#[derive(Debug, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub total: usize,
}

impl From<Vec<Alert>> for AlertsResponse {
    fn from(alerts: Vec<Alert>) -> Self {
        Self {
            total: alerts.len(),
            alerts,
        }
    }
}

/// Most recent alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Json<AlertsResponse> {
    let limit = query.limit.unwrap_or(50);
    Json(state.monitor.recent_alerts(limit).await.into())
}

/// Alerts nobody has acknowledged
pub async fn list_unacknowledged_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    Json(state.monitor.unacknowledged_alerts().await.into())
}

/// Run the threshold rules now
pub async fn check_thresholds(State(state): State<AppState>) -> Json<AlertsResponse> {
    Json(state.monitor.check_thresholds().await.into())
}

/// Acknowledgement request
#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub user_id: String,
}

/// Acknowledge an alert
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
    Json(req): Json<AcknowledgeRequest>,
) -> ApiResult<Alert> {
    if req.user_id.trim().is_empty() {
        return Err(error_response(Error::validation("user_id must not be empty")));
    }

    state
        .monitor
        .acknowledge_alert(alert_id, &req.user_id)
        .await
        .map(Json)
        .map_err(error_response)
}
