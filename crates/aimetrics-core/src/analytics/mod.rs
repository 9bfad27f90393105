//! Read-side analytics over the metric record log
//!
//! Every operation here is a pure read. Store failures degrade to zeroed
//! results instead of errors so callers always get a renderable value.

mod accuracy;
mod aggregator;
mod cost;

pub use accuracy::{decision_rates, AccuracyAnalyzer};
pub use aggregator::{bucket_records, summarize_records, MetricsAggregator};
pub use cost::{build_breakdown, project_monthly, usage_percentage, CostProjector, REFERENCE_RANGE};
