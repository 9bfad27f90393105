//! Alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Threshold rule that raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Success rate dropped below the floor
    HighErrorRate,
    /// Mean latency exceeded the ceiling
    SlowResponse,
    /// Mean confidence dropped below the floor
    LowConfidence,
    /// A backend is close to its free-tier limit
    RateLimitWarning,
}

impl AlertType {
    /// Stable string form used in storage and labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighErrorRate => "high_error_rate",
            Self::SlowResponse => "slow_response",
            Self::LowConfidence => "low_confidence",
            Self::RateLimitWarning => "rate_limit_warning",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_error_rate" => Ok(Self::HighErrorRate),
            "slow_response" => Ok(Self::SlowResponse),
            "low_confidence" => Ok(Self::LowConfidence),
            "rate_limit_warning" => Ok(Self::RateLimitWarning),
            other => Err(Error::validation(format!("unknown alert type '{other}'"))),
        }
    }
}

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning
    #[default]
    Warning,
    /// Error
    Error,
    /// Critical
    Critical,
}

impl Severity {
    /// Stable string form used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(Error::validation(format!("unknown severity '{other}'"))),
        }
    }
}

/// A raised alert. Only the acknowledgement fields ever change, and only once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier
    pub id: Uuid,

    /// Rule that fired
    #[serde(rename = "type")]
    pub alert_type: AlertType,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// When the rule fired
    pub timestamp: DateTime<Utc>,

    /// Whether someone has acknowledged the alert
    pub acknowledged: bool,

    /// Who acknowledged it
    pub acknowledged_by: Option<String>,

    /// When it was acknowledged
    pub acknowledged_at: Option<DateTime<Utc>>,

    /// Numeric evidence that triggered the rule
    pub metadata: serde_json::Value,
}

impl Alert {
    /// Build a fresh, unacknowledged alert
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            metadata,
        }
    }

    /// Service named in the metadata, for per-service rules
    pub fn service(&self) -> Option<&str> {
        self.metadata.get("service").and_then(|v| v.as_str())
    }

    /// UTC day the alert belongs to for deduplication
    pub fn incident_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Same rule, same service, same UTC day
    pub fn same_incident(&self, other: &Alert) -> bool {
        self.alert_type == other.alert_type
            && self.service() == other.service()
            && self.incident_day() == other.incident_day()
    }

    /// Stable text form of the incident, used to serialize concurrent inserts
    pub fn incident_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.alert_type,
            self.service().unwrap_or_default(),
            self.incident_day()
        )
    }

    /// Apply the acknowledgement. Returns false, leaving the alert untouched,
    /// when it was already acknowledged.
    pub fn acknowledge(&mut self, user_id: &str, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_by = Some(user_id.to_string());
        self.acknowledged_at = Some(at);
        true
    }
}

/// Result of an acknowledgement attempt on an existing alert
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    /// This call performed the acknowledgement
    Acknowledged(Alert),
    /// Someone acknowledged it earlier; the stored alert is returned unchanged
    AlreadyAcknowledged(Alert),
}
