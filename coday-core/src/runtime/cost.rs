//! Per-run cost accounting and the `priceThreshold` stop condition (§4.7
//! *Cost accounting*, §9 Open Question on enforcement granularity).

use crate::runtime::provider::TokenUsage;
use std::collections::HashMap;

/// Dollars per token for one model, split input/output/cached since
/// providers price them differently.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_token: f64,
    pub output_per_token: f64,
    pub cached_per_token: f64,
}

/// Lookup table from provider-qualified model name (e.g.
/// `"anthropic:claude-opus-4"`) to its per-token price.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, model_key: impl Into<String>, price: ModelPrice) {
        self.prices.insert(model_key.into(), price);
    }

    pub fn price_of(&self, model_key: &str) -> Option<ModelPrice> {
        self.prices.get(model_key).copied()
    }

    fn cost_of(&self, model_key: &str, usage: TokenUsage) -> f64 {
        match self.price_of(model_key) {
            Some(price) => {
                usage.input_tokens as f64 * price.input_per_token
                    + usage.output_tokens as f64 * price.output_per_token
                    + usage.cached_tokens as f64 * price.cached_per_token
            }
            None => 0.0,
        }
    }
}

/// Running total for a single `run()` invocation. Checked after every
/// provider call (an iteration boundary, per the Open Question resolution
/// recorded in the design ledger), never mid-iteration.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    total_usd: f64,
    per_model: HashMap<String, f64>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one provider call's usage against the price table, returning
    /// the incremental cost in USD.
    pub fn record(&mut self, prices: &PriceTable, model_key: &str, usage: TokenUsage) -> f64 {
        let cost = prices.cost_of(model_key, usage);
        self.total_usd += cost;
        *self.per_model.entry(model_key.to_string()).or_insert(0.0) += cost;
        cost
    }

    pub fn total_usd(&self) -> f64 {
        self.total_usd
    }

    pub fn per_model(&self) -> &HashMap<String, f64> {
        &self.per_model
    }

    /// Whether the accumulated cost has crossed `threshold` (§7
    /// `CostThresholdExceeded`). `None` means no threshold is configured.
    pub fn exceeds(&self, threshold: Option<f64>) -> bool {
        matches!(threshold, Some(limit) if self.total_usd > limit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn price() -> ModelPrice {
        ModelPrice {
            input_per_token: 0.000_003,
            output_per_token: 0.000_015,
            cached_per_token: 0.000_000_3,
        }
    }

    #[test]
    fn records_cost_per_model() {
        let mut prices = PriceTable::new();
        prices.set("anthropic:claude", price());
        let mut ledger = CostLedger::new();

        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 200,
            cached_tokens: 0,
        };
        let cost = ledger.record(&prices, "anthropic:claude", usage);

        assert!((cost - 0.006).abs() < 1e-9);
        assert!((ledger.total_usd() - 0.006).abs() < 1e-9);
        assert_eq!(ledger.per_model().len(), 1);
    }

    #[test]
    fn unpriced_model_costs_nothing() {
        let prices = PriceTable::new();
        let mut ledger = CostLedger::new();
        let cost = ledger.record(&prices, "unknown:model", TokenUsage::default());
        assert_eq!(cost, 0.0);
        assert_eq!(ledger.total_usd(), 0.0);
    }

    #[test]
    fn exceeds_only_past_threshold() {
        let mut prices = PriceTable::new();
        prices.set("m", price());
        let mut ledger = CostLedger::new();
        ledger.record(
            &prices,
            "m",
            TokenUsage {
                input_tokens: 1_000_000,
                output_tokens: 0,
                cached_tokens: 0,
            },
        );

        assert!(ledger.exceeds(Some(1.0)));
        assert!(!ledger.exceeds(Some(10.0)));
        assert!(!ledger.exceeds(None));
    }
}
