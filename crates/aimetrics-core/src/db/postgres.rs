//! PostgreSQL connection and queries

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::Postgres;
use tracing::warn;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    AckOutcome, AiService, Alert, DecisionOutcome, DecisionRecord, MetricRecord,
    NewDecisionRecord, NewMetricRecord, RecordFilter, ServiceUsage, Window,
};

use super::{AlertStore, DecisionStore, MetricStore};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Store backed by the `metric_records`, `decision_records` and `alerts` tables
#[derive(Clone)]
pub struct PostgresStore {
    pool: PostgresPool,
}

impl PostgresStore {
    /// Create a new store on an existing pool
    pub fn new(pool: &PostgresPool) -> Self {
        Self { pool: pool.clone() }
    }
}

#[async_trait]
impl MetricStore for PostgresStore {
    async fn append(&self, record: NewMetricRecord) -> Result<Uuid> {
        record.validate()?;
        let id = Uuid::now_v7();

        sqlx::query(
            r#"
            INSERT INTO metric_records (
                id, timestamp, service, operation, success, response_time_ms,
                error, tokens_used, estimated_cost, confidence, suggestion_id, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(id)
        .bind(record.timestamp)
        .bind(record.service.as_str())
        .bind(record.operation.as_str())
        .bind(record.success)
        .bind(to_i64(record.response_time_ms))
        .bind(&record.error)
        .bind(record.tokens_used.map(to_i64))
        .bind(record.estimated_cost)
        .bind(record.confidence)
        .bind(&record.suggestion_id)
        .bind(&record.user_id)
        .execute(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn query(&self, window: Window, filter: &RecordFilter) -> Result<Vec<MetricRecord>> {
        // Newest rows win under a limit; the outer query restores ascending order
        let rows = sqlx::query_as::<_, MetricRecordRow>(
            r#"
            SELECT * FROM (
                SELECT * FROM metric_records
                WHERE timestamp >= $1 AND timestamp < $2
                  AND ($3::TEXT IS NULL OR service = $3)
                  AND ($4::TEXT IS NULL OR operation = $4)
                ORDER BY timestamp DESC, id DESC
                LIMIT $5
            ) recent
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(filter.service.map(|s| s.as_str()))
        .bind(filter.operation.map(|o| o.as_str()))
        .bind(filter.limit.map(|l| to_i64(l as u64)))
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                MetricRecord::try_from(row)
                    .map_err(|e| warn!(record_id = %id, error = %e, "Skipping malformed metric record"))
                    .ok()
            })
            .collect())
    }

    async fn usage_by_service(&self, window: Window) -> Result<BTreeMap<AiService, ServiceUsage>> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            r#"
            SELECT service, COUNT(*)::BIGINT, COALESCE(SUM(estimated_cost), 0)::DOUBLE PRECISION
            FROM metric_records
            WHERE timestamp >= $1 AND timestamp < $2
            GROUP BY service
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(self.pool.pool())
        .await?;

        let mut usage = BTreeMap::new();
        for (service, requests, cost) in rows {
            match service.parse::<AiService>() {
                Ok(service) => {
                    usage.insert(
                        service,
                        ServiceUsage {
                            requests: to_u64(requests),
                            cost,
                        },
                    );
                }
                Err(e) => warn!(%service, error = %e, "Skipping usage for unknown service"),
            }
        }
        Ok(usage)
    }

    async fn health_check(&self) -> Result<()> {
        self.pool.health_check().await
    }
}

#[async_trait]
impl DecisionStore for PostgresStore {
    async fn append_decision(&self, record: NewDecisionRecord) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let (kind, status) = record.outcome.as_parts();

        sqlx::query(
            r#"
            INSERT INTO decision_records (id, timestamp, suggestion_id, kind, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(record.timestamp)
        .bind(&record.suggestion_id)
        .bind(kind)
        .bind(status)
        .execute(self.pool.pool())
        .await?;

        Ok(id)
    }

    async fn query_decisions(&self, window: Window) -> Result<Vec<DecisionRecord>> {
        let rows = sqlx::query_as::<_, DecisionRecordRow>(
            r#"
            SELECT * FROM decision_records
            WHERE timestamp >= $1 AND timestamp < $2
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                DecisionRecord::try_from(row)
                    .map_err(|e| warn!(decision_id = %id, error = %e, "Skipping malformed decision record"))
                    .ok()
            })
            .collect())
    }
}

#[async_trait]
impl AlertStore for PostgresStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        insert_alert_query(alert).execute(self.pool.pool()).await?;
        Ok(())
    }

    async fn insert_alert_if_absent(&self, alert: &Alert) -> Result<bool> {
        let mut tx = self.pool.pool().begin().await?;

        // Concurrent evaluators for one incident queue here until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(alert.incident_key())
            .execute(&mut *tx)
            .await?;

        let open: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM alerts
                WHERE acknowledged = FALSE
                  AND alert_type = $1
                  AND metadata->>'service' IS NOT DISTINCT FROM $2
                  AND (timestamp AT TIME ZONE 'UTC')::DATE = $3
            )
            "#,
        )
        .bind(alert.alert_type.as_str())
        .bind(alert.service())
        .bind(alert.incident_day())
        .fetch_one(&mut *tx)
        .await?;

        if !open {
            insert_alert_query(alert).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(!open)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.map(Alert::try_from).transpose()
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT * FROM alerts
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(to_i64(limit as u64))
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn unacknowledged_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT * FROM alerts
            WHERE acknowledged = FALSE
            ORDER BY timestamp DESC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn acknowledge(&self, id: Uuid, user_id: &str) -> Result<AckOutcome> {
        let updated = sqlx::query_as::<_, AlertRow>(
            r#"
            UPDATE alerts
            SET acknowledged = TRUE, acknowledged_by = $2, acknowledged_at = $3
            WHERE id = $1 AND acknowledged = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        if let Some(row) = updated {
            return Ok(AckOutcome::Acknowledged(row.try_into()?));
        }

        match self.get_alert(id).await? {
            Some(existing) => Ok(AckOutcome::AlreadyAcknowledged(existing)),
            None => Err(Error::not_found("Alert", id.to_string())),
        }
    }
}

fn insert_alert_query(alert: &Alert) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO alerts (
            id, alert_type, severity, message, timestamp,
            acknowledged, acknowledged_by, acknowledged_at, metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(alert.id)
    .bind(alert.alert_type.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.message)
    .bind(alert.timestamp)
    .bind(alert.acknowledged)
    .bind(&alert.acknowledged_by)
    .bind(alert.acknowledged_at)
    .bind(&alert.metadata)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct MetricRecordRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    service: String,
    operation: String,
    success: bool,
    response_time_ms: i64,
    error: Option<String>,
    tokens_used: Option<i64>,
    estimated_cost: f64,
    confidence: Option<f64>,
    suggestion_id: Option<String>,
    user_id: Option<String>,
}

impl TryFrom<MetricRecordRow> for MetricRecord {
    type Error = Error;

    fn try_from(row: MetricRecordRow) -> Result<Self> {
        Ok(MetricRecord {
            id: row.id,
            timestamp: row.timestamp,
            service: row.service.parse()?,
            operation: row.operation.parse()?,
            success: row.success,
            response_time_ms: to_u64(row.response_time_ms),
            error: row.error,
            tokens_used: row.tokens_used.map(to_u64),
            estimated_cost: row.estimated_cost,
            confidence: row.confidence,
            suggestion_id: row.suggestion_id,
            user_id: row.user_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRecordRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    suggestion_id: Option<String>,
    kind: String,
    status: String,
}

impl TryFrom<DecisionRecordRow> for DecisionRecord {
    type Error = Error;

    fn try_from(row: DecisionRecordRow) -> Result<Self> {
        Ok(DecisionRecord {
            id: row.id,
            timestamp: row.timestamp,
            suggestion_id: row.suggestion_id,
            outcome: DecisionOutcome::from_parts(&row.kind, &row.status)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    alert_type: String,
    severity: String,
    message: String,
    timestamp: DateTime<Utc>,
    acknowledged: bool,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<DateTime<Utc>>,
    metadata: serde_json::Value,
}

impl TryFrom<AlertRow> for Alert {
    type Error = Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        Ok(Alert {
            id: row.id,
            alert_type: row.alert_type.parse()?,
            severity: row.severity.parse()?,
            message: row.message,
            timestamp: row.timestamp,
            acknowledged: row.acknowledged,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            metadata: row.metadata,
        })
    }
}
