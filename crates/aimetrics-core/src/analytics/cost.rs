//! Free-tier quota usage and monthly cost projection

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::CostCalculator;
use crate::models::{AiService, CostBreakdown, ServiceCost, ServiceUsage, TimeRange};

use super::aggregator::MetricsAggregator;

/// Quota tracking always looks at this window, whatever the caller views
pub const REFERENCE_RANGE: TimeRange = TimeRange::Last30Days;

/// Days in the month the projection extrapolates to
const PROJECTION_DAYS: f64 = 30.0;

/// Derives quota usage and projected cost from uncapped per-backend usage
/// over the reference window
#[derive(Clone)]
pub struct CostProjector {
    aggregator: MetricsAggregator,
    calculator: Arc<CostCalculator>,
}

impl CostProjector {
    /// Create a projector over the given aggregator and pricing table
    pub fn new(aggregator: MetricsAggregator, calculator: Arc<CostCalculator>) -> Self {
        Self {
            aggregator,
            calculator,
        }
    }

    /// Cost breakdown over the reference window. Counts every record in the
    /// window; the aggregator's scan cap does not apply.
    pub async fn breakdown(&self) -> CostBreakdown {
        let window = REFERENCE_RANGE.window();
        let usage = self.aggregator.usage_by_service(window).await;
        build_breakdown(&usage, window.days(), &self.calculator)
    }
}

/// Cost breakdown from per-backend usage observed over `days_in_window` days
pub fn build_breakdown(
    usage: &BTreeMap<AiService, ServiceUsage>,
    days_in_window: f64,
    calculator: &CostCalculator,
) -> CostBreakdown {
    let mut breakdown = CostBreakdown::empty(calculator.free_tier_limits());
    let mut total = 0.0;

    for service in AiService::ALL {
        let free_limit = calculator.free_tier_limit(service);
        let ServiceUsage { requests, cost } = usage.get(&service).copied().unwrap_or_default();
        total += cost;

        breakdown.services.insert(
            service,
            ServiceCost {
                requests,
                cost,
                free_limit,
                usage_percentage: usage_percentage(requests, free_limit),
            },
        );
    }

    breakdown.total = total;
    breakdown.projected_monthly = project_monthly(total, days_in_window);
    breakdown
}

/// `requests / free_limit` in percent, clamped to 100. A backend without a
/// free tier counts as fully used once it sees any traffic.
pub fn usage_percentage(requests: u64, free_limit: u64) -> f64 {
    if free_limit == 0 {
        return if requests == 0 { 0.0 } else { 100.0 };
    }
    (requests as f64 / free_limit as f64 * 100.0).min(100.0)
}

/// Extrapolate a cost observed over `days_in_window` days to a 30-day month
pub fn project_monthly(total_cost: f64, days_in_window: f64) -> f64 {
    if days_in_window <= 0.0 {
        return total_cost;
    }
    total_cost * (PROJECTION_DAYS / days_in_window)
}
