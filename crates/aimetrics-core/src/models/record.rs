//! Metric record data model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// AI backend that served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiService {
    /// Groq fast-inference API
    Groq,
    /// Hugging Face hosted-inference API
    HuggingFace,
}

impl AiService {
    /// Every tracked backend, in display order
    pub const ALL: [AiService; 2] = [AiService::Groq, AiService::HuggingFace];

    /// Stable string form used in storage and labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for AiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groq" => Ok(Self::Groq),
            "huggingface" => Ok(Self::HuggingFace),
            other => Err(Error::validation(format!("unknown AI service '{other}'"))),
        }
    }
}

/// Purpose of an AI call, independent of the backend that handled it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiOperation {
    /// Discovering candidate items
    Discovery,
    /// Classifying content into categories
    Classification,
    /// Sentiment scoring
    Sentiment,
    /// Summarizing content
    Summarization,
    /// Structured data extraction
    Extraction,
}

impl AiOperation {
    /// Stable string form used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Classification => "classification",
            Self::Sentiment => "sentiment",
            Self::Summarization => "summarization",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for AiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(Self::Discovery),
            "classification" => Ok(Self::Classification),
            "sentiment" => Ok(Self::Sentiment),
            "summarization" => Ok(Self::Summarization),
            "extraction" => Ok(Self::Extraction),
            other => Err(Error::validation(format!("unknown AI operation '{other}'"))),
        }
    }
}

/// Optional details attached to a recorded call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordOptions {
    /// Quality score in [0, 1]
    pub confidence: Option<f64>,
    /// Tokens consumed by the call
    pub tokens_used: Option<u64>,
    /// Failure reason (ignored for successful calls)
    pub error: Option<String>,
    /// Correlated suggestion
    pub suggestion_id: Option<String>,
    /// Acting user
    pub user_id: Option<String>,
}

/// A call outcome that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMetricRecord {
    /// When the call completed
    pub timestamp: DateTime<Utc>,
    /// Backend that served the call
    pub service: AiService,
    /// Purpose of the call
    pub operation: AiOperation,
    /// Whether the call succeeded
    pub success: bool,
    /// Wall-clock duration in milliseconds
    pub response_time_ms: u64,
    /// Failure reason, only set for failed calls
    pub error: Option<String>,
    /// Tokens consumed
    pub tokens_used: Option<u64>,
    /// Cost computed at write time
    pub estimated_cost: f64,
    /// Quality score in [0, 1]
    pub confidence: Option<f64>,
    /// Correlated suggestion
    pub suggestion_id: Option<String>,
    /// Acting user
    pub user_id: Option<String>,
}

impl NewMetricRecord {
    /// Check field invariants before the record reaches a store
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(Error::validation(format!(
                    "confidence {confidence} outside [0, 1]"
                )));
            }
        }

        if !self.estimated_cost.is_finite() || self.estimated_cost < 0.0 {
            return Err(Error::validation(format!(
                "estimated cost {} must be a non-negative amount",
                self.estimated_cost
            )));
        }

        if self.success && self.error.is_some() {
            return Err(Error::validation("successful call carries an error"));
        }

        Ok(())
    }

    /// Attach the store-assigned identifier
    pub fn with_id(self, id: Uuid) -> MetricRecord {
        MetricRecord {
            id,
            timestamp: self.timestamp,
            service: self.service,
            operation: self.operation,
            success: self.success,
            response_time_ms: self.response_time_ms,
            error: self.error,
            tokens_used: self.tokens_used,
            estimated_cost: self.estimated_cost,
            confidence: self.confidence,
            suggestion_id: self.suggestion_id,
            user_id: self.user_id,
        }
    }
}

/// One persisted observation of a single AI call. Never mutated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Store-assigned identifier
    pub id: Uuid,
    /// When the call completed
    pub timestamp: DateTime<Utc>,
    /// Backend that served the call
    pub service: AiService,
    /// Purpose of the call
    pub operation: AiOperation,
    /// Whether the call succeeded
    pub success: bool,
    /// Wall-clock duration in milliseconds
    pub response_time_ms: u64,
    /// Failure reason, only set for failed calls
    pub error: Option<String>,
    /// Tokens consumed
    pub tokens_used: Option<u64>,
    /// Cost computed at write time
    pub estimated_cost: f64,
    /// Quality score in [0, 1]
    pub confidence: Option<f64>,
    /// Correlated suggestion
    pub suggestion_id: Option<String>,
    /// Acting user
    pub user_id: Option<String>,
}
