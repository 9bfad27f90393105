//! Alerting for AIMetrics
//!
//! Fixed threshold rules over the 24-hour summary and the free-tier usage
//! projection. Alerts persist until acknowledged.

mod evaluator;

pub use evaluator::{evaluate_rules, AlertEngine};
