//! Cost calculator for AI calls
//!
//! Prices a call at write time from its backend and token usage. Free tiers
//! price at zero; the stored `estimated_cost` keeps aggregation independent of
//! whatever the pricing is today.

use std::collections::BTreeMap;

use crate::config::ServicesConfig;
use crate::models::AiService;

/// Pricing and quota for one backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServicePricing {
    /// Cost per million tokens
    pub per_million_tokens: f64,
    /// Free-tier request allowance per 30-day period
    pub free_tier_limit: u64,
}

/// Cost calculator with per-backend pricing
#[derive(Debug, Clone)]
pub struct CostCalculator {
    pricing: BTreeMap<AiService, ServicePricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::from_config(&ServicesConfig::default())
    }
}

impl CostCalculator {
    /// Build the pricing table from configuration
    pub fn from_config(services: &ServicesConfig) -> Self {
        let pricing = AiService::ALL
            .into_iter()
            .map(|service| {
                let config = services.get(service);
                (
                    service,
                    ServicePricing {
                        per_million_tokens: config.cost_per_million_tokens.max(0.0),
                        free_tier_limit: config.free_tier_limit,
                    },
                )
            })
            .collect();

        Self { pricing }
    }

    /// Estimated cost of one call
    pub fn estimate(&self, service: AiService, tokens_used: Option<u64>) -> f64 {
        let Some(pricing) = self.pricing.get(&service) else {
            tracing::debug!(%service, "No pricing for service");
            return 0.0;
        };

        let tokens = tokens_used.unwrap_or(0) as f64;
        (tokens / 1_000_000.0) * pricing.per_million_tokens
    }

    /// Free-tier allowance for a backend
    pub fn free_tier_limit(&self, service: AiService) -> u64 {
        self.pricing.get(&service).map_or(0, |p| p.free_tier_limit)
    }

    /// Free-tier allowance for every backend
    pub fn free_tier_limits(&self) -> impl Iterator<Item = (AiService, u64)> + '_ {
        self.pricing
            .iter()
            .map(|(service, pricing)| (*service, pricing.free_tier_limit))
    }

    /// Add or update pricing for a backend
    pub fn set_pricing(&mut self, service: AiService, pricing: ServicePricing) {
        self.pricing.insert(service, pricing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tiers_price_at_zero() {
        let calculator = CostCalculator::default();

        for service in AiService::ALL {
            assert_eq!(calculator.estimate(service, Some(1_000_000)), 0.0);
        }
    }

    #[test]
    fn test_paid_pricing_scales_with_tokens() {
        let mut calculator = CostCalculator::default();
        calculator.set_pricing(
            AiService::Groq,
            ServicePricing {
                per_million_tokens: 0.59,
                free_tier_limit: 0,
            },
        );

        // 500K tokens at $0.59/M = $0.295
        let cost = calculator.estimate(AiService::Groq, Some(500_000));
        assert!((cost - 0.295).abs() < 1e-9);

        assert_eq!(calculator.estimate(AiService::Groq, None), 0.0);
    }

    #[test]
    fn test_free_tier_limits_come_from_config() {
        let calculator = CostCalculator::default();
        assert_eq!(calculator.free_tier_limit(AiService::Groq), 432_000);
        assert_eq!(calculator.free_tier_limit(AiService::HuggingFace), 30_000);
        assert_eq!(calculator.free_tier_limits().count(), 2);
    }
}
