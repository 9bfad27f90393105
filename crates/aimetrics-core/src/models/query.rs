//! Query types shared between the analytics and storage layers

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::record::{AiOperation, AiService};

/// Named relative window resolved against "now" at query time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeRange {
    /// Last 24 hours
    #[serde(rename = "24h")]
    #[default]
    Last24Hours,
    /// Last 7 days
    #[serde(rename = "7d")]
    Last7Days,
    /// Last 30 days
    #[serde(rename = "30d")]
    Last30Days,
    /// Everything since the Unix epoch
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    /// Length of the window, `None` for [`TimeRange::All`]
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Last24Hours => Some(Duration::hours(24)),
            Self::Last7Days => Some(Duration::days(7)),
            Self::Last30Days => Some(Duration::days(30)),
            Self::All => None,
        }
    }

    /// Resolve to an absolute `[start, end)` window ending at `now`
    pub fn window_at(&self, now: DateTime<Utc>) -> Window {
        let start = match self.duration() {
            Some(length) => now - length,
            // Default for DateTime<Utc> is the Unix epoch
            None => DateTime::<Utc>::default(),
        };
        Window { start, end: now }
    }

    /// Resolve against the current time
    pub fn window(&self) -> Window {
        self.window_at(Utc::now())
    }

    /// Timeline bucket width for this range
    pub fn bucket_width(&self) -> Duration {
        match self {
            Self::Last24Hours => Duration::hours(1),
            Self::Last7Days | Self::Last30Days | Self::All => Duration::days(1),
        }
    }

    /// Short label, as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last24Hours => "24h",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::All => "all",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::Last24Hours),
            "7d" => Ok(Self::Last7Days),
            "30d" => Ok(Self::Last30Days),
            "all" => Ok(Self::All),
            other => Err(Error::validation(format!(
                "unknown time range '{other}' (expected 24h, 7d, 30d or all)"
            ))),
        }
    }
}

/// Absolute half-open time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl Window {
    /// Check if a timestamp falls within this window
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Window length in fractional days
    pub fn days(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / Duration::days(1).num_milliseconds() as f64
    }
}

/// Equality filters and scan cap for record queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records served by this backend
    pub service: Option<AiService>,
    /// Only records for this operation
    pub operation: Option<AiOperation>,
    /// Keep at most this many of the most recent matching records
    pub limit: Option<usize>,
}

impl RecordFilter {
    /// Check the equality filters against a record's dimensions
    pub fn matches(&self, service: AiService, operation: AiOperation) -> bool {
        self.service.map_or(true, |s| s == service)
            && self.operation.map_or(true, |o| o == operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(TimeRange::Last24Hours, 1.0)]
    #[case(TimeRange::Last7Days, 7.0)]
    #[case(TimeRange::Last30Days, 30.0)]
    fn test_window_length(#[case] range: TimeRange, #[case] days: f64) {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let window = range.window_at(now);
        assert_eq!(window.end, now);
        assert!((window.days() - days).abs() < 1e-9);
    }

    #[test]
    fn test_all_range_starts_at_epoch() {
        let window = TimeRange::All.window();
        assert_eq!(window.start.timestamp(), 0);
    }

    #[test]
    fn test_window_is_half_open() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let window = TimeRange::Last24Hours.window_at(now);
        assert!(window.contains(window.start));
        assert!(!window.contains(now));
    }

    #[rstest]
    #[case(TimeRange::Last24Hours, Duration::hours(1))]
    #[case(TimeRange::Last7Days, Duration::days(1))]
    #[case(TimeRange::Last30Days, Duration::days(1))]
    fn test_bucket_width(#[case] range: TimeRange, #[case] width: Duration) {
        assert_eq!(range.bucket_width(), width);
    }

    #[test]
    fn test_parse_rejects_unknown_range() {
        assert!("1h".parse::<TimeRange>().is_err());
        assert_eq!("30d".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
    }

    #[test]
    fn test_filter_matching() {
        let filter = RecordFilter {
            service: Some(AiService::Groq),
            ..Default::default()
        };
        assert!(filter.matches(AiService::Groq, AiOperation::Discovery));
        assert!(!filter.matches(AiService::HuggingFace, AiOperation::Discovery));
    }
}
