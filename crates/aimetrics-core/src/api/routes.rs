//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and process metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus_metrics))

        // Ingestion
        .route("/api/v1/records", post(handlers::ingest_record))
        .route("/api/v1/decisions", post(handlers::ingest_decision))

        // Analytics
        .route("/api/v1/metrics/summary", get(handlers::get_metrics_summary))
        .route("/api/v1/metrics/timeline", get(handlers::get_timeline))
        .route("/api/v1/metrics/costs", get(handlers::get_cost_breakdown))
        .route("/api/v1/metrics/accuracy", get(handlers::get_accuracy))

        // Alerts
        .route("/api/v1/alerts", get(handlers::list_alerts))
        .route("/api/v1/alerts/unacknowledged", get(handlers::list_unacknowledged_alerts))
        .route("/api/v1/alerts/check", post(handlers::check_thresholds))
        .route("/api/v1/alerts/:alert_id/acknowledge", post(handlers::acknowledge_alert))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiService, MetricsSummary};
    use crate::monitor::Monitor;
    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{Request, StatusCode};
    use handlers::{AlertsResponse, RecordResponse};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> (Router, Monitor) {
        let monitor = Monitor::in_memory();
        let router = create_router(AppState {
            monitor: monitor.clone(),
            prometheus: None,
        });
        (router, monitor)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    fn json<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Metric store whose backend never answers
    struct UnreachableStore;

    #[async_trait::async_trait]
    impl crate::db::MetricStore for UnreachableStore {
        async fn append(&self, _record: crate::models::NewMetricRecord) -> crate::Result<Uuid> {
            Err(crate::Error::unavailable("connection refused"))
        }

        async fn query(
            &self,
            _window: crate::models::Window,
            _filter: &crate::models::RecordFilter,
        ) -> crate::Result<Vec<crate::models::MetricRecord>> {
            Err(crate::Error::unavailable("connection refused"))
        }

        async fn usage_by_service(
            &self,
            _window: crate::models::Window,
        ) -> crate::Result<std::collections::BTreeMap<AiService, crate::models::ServiceUsage>>
        {
            Err(crate::Error::unavailable("connection refused"))
        }

        async fn health_check(&self) -> crate::Result<()> {
            Err(crate::Error::unavailable("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let (status, body) =
            send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json::<serde_json::Value>(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_store() {
        let memory = std::sync::Arc::new(crate::db::MemoryStore::new());
        let db = crate::db::Database {
            metrics: std::sync::Arc::new(UnreachableStore),
            decisions: memory.clone(),
            alerts: memory,
        };
        let router = create_router(AppState {
            monitor: Monitor::new(&db, &crate::Config::default()),
            prometheus: None,
        });

        let (status, body) =
            send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json::<serde_json::Value>(&body)["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_ingest_then_summarize() {
        let (router, _) = app();

        let (status, body) = send(
            &router,
            post_json(
                "/api/v1/records",
                serde_json::json!({
                    "service": "groq",
                    "operation": "summarization",
                    "success": true,
                    "response_time_ms": 420,
                    "confidence": 0.85,
                    "tokens_used": 1200
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(json::<RecordResponse>(&body).accepted);

        let (status, body) = send(
            &router,
            Request::get("/api/v1/metrics/summary?range=7d")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let summary: MetricsSummary = json(&body);
        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.service(AiService::Groq).map(|s| s.total_requests), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_range_is_bad_request() {
        let (router, _) = app();
        let (status, _) = send(
            &router,
            Request::get("/api/v1/metrics/timeline?range=90d")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_alert_is_not_found() {
        let (router, _) = app();
        let uri = format!("/api/v1/alerts/{}/acknowledge", Uuid::new_v4());
        let (status, _) = send(&router, post_json(&uri, serde_json::json!({"user_id": "ops"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_and_acknowledge_over_http() {
        let (router, monitor) = app();
        monitor
            .record_api_call(
                AiService::HuggingFace,
                crate::models::AiOperation::Extraction,
                true,
                12_000,
                Default::default(),
            )
            .await;

        let (status, body) = send(&router, post_json("/api/v1/alerts/check", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let open: AlertsResponse = json(&body);
        assert_eq!(open.total, 1);

        let uri = format!("/api/v1/alerts/{}/acknowledge", open.alerts[0].id);
        let (status, body) = send(&router, post_json(&uri, serde_json::json!({"user_id": "ops"}))).await;
        assert_eq!(status, StatusCode::OK);
        let acked: crate::models::Alert = json(&body);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("ops"));

        let (_, body) = send(
            &router,
            Request::get("/api/v1/alerts/unacknowledged")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(json::<AlertsResponse>(&body).total, 0);
    }
}
