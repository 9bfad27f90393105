//! # AIMetrics
//!
//! Usage metrics and alerting for applications that call hosted AI backends.
//!
//! Every AI call site reports its outcome; AIMetrics keeps the raw records,
//! computes windowed summaries and timelines on demand, projects free-tier
//! usage, and raises alerts when fixed thresholds are crossed.
//!
//! ## Architecture
//!
//! - **Collector**: best-effort ingestion of call outcomes with cost estimates
//! - **Analytics**: summaries, timeline buckets, cost projection, accuracy
//! - **Alerting**: threshold rules, dedup, acknowledgement
//! - **Storage**: in-memory or PostgreSQL behind store traits
//! - **API**: REST API and Prometheus endpoint
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API and the threshold scheduler
//! aimetrics serve
//!
//! # Print the last week's summary
//! aimetrics summary --range 7d
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod alerting;
pub mod analytics;
pub mod api;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod monitor;

pub use config::Config;
pub use error::{Error, Result};
pub use monitor::Monitor;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::collector::Recorder;
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::Monitor;
}
