//! Process-local store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    tally_usage, AckOutcome, AiService, Alert, DecisionRecord, MetricRecord, NewDecisionRecord,
    NewMetricRecord, RecordFilter, ServiceUsage, Window,
};

use super::{AlertStore, DecisionStore, MetricStore};

/// In-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<MetricRecord>>,
    decisions: RwLock<Vec<DecisionRecord>>,
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of metric records held
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn append(&self, record: NewMetricRecord) -> Result<Uuid> {
        record.validate()?;

        let id = Uuid::now_v7();
        self.records.write().push(record.with_id(id));
        Ok(id)
    }

    async fn query(&self, window: Window, filter: &RecordFilter) -> Result<Vec<MetricRecord>> {
        let mut matched: Vec<MetricRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| window.contains(r.timestamp) && filter.matches(r.service, r.operation))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        matched.sort_by_key(|r| r.timestamp);

        if let Some(limit) = filter.limit {
            let excess = matched.len().saturating_sub(limit);
            matched.drain(..excess);
        }

        Ok(matched)
    }

    async fn usage_by_service(&self, window: Window) -> Result<BTreeMap<AiService, ServiceUsage>> {
        let records = self.records.read();
        Ok(tally_usage(
            records.iter().filter(|r| window.contains(r.timestamp)),
        ))
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn append_decision(&self, record: NewDecisionRecord) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.decisions.write().push(record.with_id(id));
        Ok(id)
    }

    async fn query_decisions(&self, window: Window) -> Result<Vec<DecisionRecord>> {
        let mut matched: Vec<DecisionRecord> = self
            .decisions
            .read()
            .iter()
            .filter(|d| window.contains(d.timestamp))
            .cloned()
            .collect();
        matched.sort_by_key(|d| d.timestamp);
        Ok(matched)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts.write().push(alert.clone());
        Ok(())
    }

    async fn insert_alert_if_absent(&self, alert: &Alert) -> Result<bool> {
        let mut alerts = self.alerts.write();
        if alerts
            .iter()
            .any(|a| !a.acknowledged && a.same_incident(alert))
        {
            return Ok(false);
        }
        alerts.push(alert.clone());
        Ok(true)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.alerts.read().iter().find(|a| a.id == id).cloned())
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        let mut alerts = self.alerts.read().clone();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn unacknowledged_alerts(&self) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    }

    async fn acknowledge(&self, id: Uuid, user_id: &str) -> Result<AckOutcome> {
        // Single write lock: the check and the set cannot interleave
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("Alert", id.to_string()))?;

        if alert.acknowledge(user_id, Utc::now()) {
            Ok(AckOutcome::Acknowledged(alert.clone()))
        } else {
            Ok(AckOutcome::AlreadyAcknowledged(alert.clone()))
        }
    }
}
