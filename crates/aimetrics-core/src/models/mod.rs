//! Data models for AIMetrics

mod alert;
mod decision;
mod metrics;
mod query;
mod record;

pub use alert::*;
pub use decision::*;
pub use metrics::*;
pub use query::*;
pub use record::*;
