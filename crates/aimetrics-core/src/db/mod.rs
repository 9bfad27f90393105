//! Storage layer for AIMetrics
//!
//! The analytics components only see the store traits below. Two
//! implementations ship with the crate: a process-local [`MemoryStore`] and a
//! PostgreSQL adapter.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresPool, PostgresStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::models::{
    AckOutcome, AiService, Alert, DecisionRecord, MetricRecord, NewDecisionRecord,
    NewMetricRecord, RecordFilter, ServiceUsage, Window,
};

/// Append-only log of call outcomes
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Persist a record and return its assigned id
    async fn append(&self, record: NewMetricRecord) -> Result<Uuid>;

    /// Records in the window matching the filter, ascending by timestamp.
    /// With `filter.limit` set, only the most recent matches are returned.
    async fn query(&self, window: Window, filter: &RecordFilter) -> Result<Vec<MetricRecord>>;

    /// Request count and cost sum per backend over every record in the
    /// window. Not bounded by any scan cap; backends without traffic are
    /// absent.
    async fn usage_by_service(&self, window: Window) -> Result<BTreeMap<AiService, ServiceUsage>>;

    /// Check that the backend answers
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Decision stream written by the review and processing workflows
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Persist a decision and return its assigned id
    async fn append_decision(&self, record: NewDecisionRecord) -> Result<Uuid>;

    /// Decisions in the window, ascending by timestamp
    async fn query_decisions(&self, window: Window) -> Result<Vec<DecisionRecord>>;
}

/// Alert persistence; acknowledgement is the only update
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist a newly raised alert
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Persist the alert unless an unacknowledged alert for the same
    /// incident exists. The check and the insert are one atomic step.
    /// Returns whether the alert was stored.
    async fn insert_alert_if_absent(&self, alert: &Alert) -> Result<bool>;

    /// Fetch one alert
    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;

    /// Most recent alerts first
    async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>>;

    /// Unacknowledged alerts, most recent first
    async fn unacknowledged_alerts(&self) -> Result<Vec<Alert>>;

    /// Acknowledge as one atomic check-then-set. Fails with `NotFound` for an
    /// unknown id; an earlier acknowledgement is kept as is.
    async fn acknowledge(&self, id: Uuid, user_id: &str) -> Result<AckOutcome>;
}

/// Store handles bundle
#[derive(Clone)]
pub struct Database {
    /// Metric record log
    pub metrics: Arc<dyn MetricStore>,
    /// Decision stream
    pub decisions: Arc<dyn DecisionStore>,
    /// Alerts
    pub alerts: Arc<dyn AlertStore>,
}

impl Database {
    /// Connect to the backend selected in the configuration
    pub async fn new(config: &Config) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::Postgres => {
                let pool = PostgresPool::new(&config.database).await?;
                Ok(Self::from_store(Arc::new(PostgresStore::new(&pool))))
            }
        }
    }

    /// Fresh process-local stores
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    /// Use one object for all three store roles
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: MetricStore + DecisionStore + AlertStore + 'static,
    {
        Self {
            metrics: store.clone(),
            decisions: store.clone(),
            alerts: store,
        }
    }
}
