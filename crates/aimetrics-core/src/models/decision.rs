//! Human decision records joined by the accuracy analyzer
//!
//! Decisions are written by the review and processing workflows, not by this
//! crate's recorder. The tagged [`DecisionOutcome`] is the shared schema both
//! sides agree on; rows that do not parse into it are rejected at the store
//! boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Review state of an AI suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Awaiting a human decision
    Pending,
    /// Accepted by a reviewer
    Approved,
    /// Rejected by a reviewer
    Rejected,
}

/// State of a processing job triggered by a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Not finished yet
    Queued,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Outcome carried by a decision record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Human review of a suggestion
    Review(ReviewStatus),
    /// Downstream processing of an approved suggestion
    Processing(ProcessingStatus),
}

impl DecisionOutcome {
    /// Storage form as `(kind, status)`
    pub fn as_parts(&self) -> (&'static str, &'static str) {
        match self {
            Self::Review(status) => (
                "review",
                match status {
                    ReviewStatus::Pending => "pending",
                    ReviewStatus::Approved => "approved",
                    ReviewStatus::Rejected => "rejected",
                },
            ),
            Self::Processing(status) => (
                "processing",
                match status {
                    ProcessingStatus::Queued => "queued",
                    ProcessingStatus::Completed => "completed",
                    ProcessingStatus::Failed => "failed",
                },
            ),
        }
    }

    /// Parse the storage form produced by [`DecisionOutcome::as_parts`]
    pub fn from_parts(kind: &str, status: &str) -> crate::Result<Self> {
        let outcome = match (kind, status) {
            ("review", "pending") => Self::Review(ReviewStatus::Pending),
            ("review", "approved") => Self::Review(ReviewStatus::Approved),
            ("review", "rejected") => Self::Review(ReviewStatus::Rejected),
            ("processing", "queued") => Self::Processing(ProcessingStatus::Queued),
            ("processing", "completed") => Self::Processing(ProcessingStatus::Completed),
            ("processing", "failed") => Self::Processing(ProcessingStatus::Failed),
            _ => {
                return Err(Error::validation(format!(
                    "unknown decision outcome {kind}/{status}"
                )))
            }
        };
        Ok(outcome)
    }
}

/// A decision that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDecisionRecord {
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Suggestion the decision applies to
    pub suggestion_id: Option<String>,
    /// What was decided
    pub outcome: DecisionOutcome,
}

impl NewDecisionRecord {
    /// Attach the store-assigned identifier
    pub fn with_id(self, id: Uuid) -> DecisionRecord {
        DecisionRecord {
            id,
            timestamp: self.timestamp,
            suggestion_id: self.suggestion_id,
            outcome: self.outcome,
        }
    }
}

/// A persisted decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Store-assigned identifier
    pub id: Uuid,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Suggestion the decision applies to
    pub suggestion_id: Option<String>,
    /// What was decided
    pub outcome: DecisionOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outcome_serializes_as_tagged_variant() {
        let outcome = DecisionOutcome::Review(ReviewStatus::Approved);
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "review", "status": "approved"}));
    }

    #[test]
    fn test_untyped_status_is_rejected() {
        let parsed: Result<DecisionOutcome, _> =
            serde_json::from_value(serde_json::json!({"kind": "review", "status": "maybe"}));
        assert!(parsed.is_err());
        assert!(DecisionOutcome::from_parts("review", "maybe").is_err());
    }

    #[test]
    fn test_parts_round_trip() {
        for outcome in [
            DecisionOutcome::Review(ReviewStatus::Pending),
            DecisionOutcome::Review(ReviewStatus::Rejected),
            DecisionOutcome::Processing(ProcessingStatus::Completed),
            DecisionOutcome::Processing(ProcessingStatus::Failed),
        ] {
            let (kind, status) = outcome.as_parts();
            assert_eq!(DecisionOutcome::from_parts(kind, status).unwrap(), outcome);
        }
    }
}
