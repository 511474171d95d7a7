use crate::pricing::usage::UsageCounts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model used when a requested model has no pricing entry
pub const DEFAULT_PRICING_MODEL: &str = "sonar-deep-research";

/// Version tag of the built-in price list
pub const PRICING_VERSION: &str = "2025-07";

/// Token prices are quoted per 1M tokens
pub const TOKEN_PRICE_UNIT: f64 = 1_000_000.0;

/// Search query prices are quoted per 1K queries
pub const SEARCH_QUERY_PRICE_UNIT: f64 = 1_000.0;

/// Per-unit prices for one model (USD)
///
/// All five fields are required when deserializing so that an override can
/// never produce a partially priced model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// USD per 1M input tokens
    pub input_price: f64,
    /// USD per 1M output tokens
    pub output_price: f64,
    /// USD per 1M citation tokens
    pub citation_price: f64,
    /// USD per 1K search queries
    pub search_query_price: f64,
    /// USD per 1M reasoning tokens
    pub reasoning_price: f64,
}

impl ModelPrice {
    const fn new(
        input_price: f64,
        output_price: f64,
        citation_price: f64,
        search_query_price: f64,
        reasoning_price: f64,
    ) -> Self {
        Self {
            input_price,
            output_price,
            citation_price,
            search_query_price,
            reasoning_price,
        }
    }

    /// Whether every price is a finite, non-negative number
    pub fn is_valid(&self) -> bool {
        [
            self.input_price,
            self.output_price,
            self.citation_price,
            self.search_query_price,
            self.reasoning_price,
        ]
        .iter()
        .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Perplexity Sonar price list
const BUILTIN_PRICES: [(&str, ModelPrice); 5] = [
    ("sonar", ModelPrice::new(1.0, 1.0, 0.0, 0.0, 0.0)),
    ("sonar-pro", ModelPrice::new(3.0, 15.0, 0.0, 0.0, 0.0)),
    ("sonar-reasoning", ModelPrice::new(1.0, 5.0, 0.0, 0.0, 0.0)),
    ("sonar-reasoning-pro", ModelPrice::new(2.0, 8.0, 0.0, 0.0, 0.0)),
    ("sonar-deep-research", ModelPrice::new(2.0, 8.0, 2.0, 5.0, 3.0)),
];

/// Immutable model → price mapping with a guaranteed fallback entry
#[derive(Debug, Clone)]
pub struct PricingTable {
    version: String,
    prices: HashMap<String, ModelPrice>,
    fallback: ModelPrice,
}

impl PricingTable {
    /// The built-in price list
    pub fn builtin() -> Self {
        let prices: HashMap<String, ModelPrice> = BUILTIN_PRICES
            .iter()
            .map(|(name, price)| (name.to_string(), *price))
            .collect();
        let fallback = BUILTIN_PRICES
            .iter()
            .find(|(name, _)| *name == DEFAULT_PRICING_MODEL)
            .map(|(_, price)| *price)
            .unwrap_or(ModelPrice::new(2.0, 8.0, 2.0, 5.0, 3.0));

        Self {
            version: PRICING_VERSION.to_string(),
            prices,
            fallback,
        }
    }

    /// Built-in list with configured entries added or replaced
    pub fn with_overrides(overrides: &HashMap<String, ModelPrice>) -> Self {
        let mut table = Self::builtin();
        if overrides.is_empty() {
            return table;
        }

        for (model, price) in overrides {
            table.prices.insert(model.clone(), *price);
            if model == DEFAULT_PRICING_MODEL {
                table.fallback = *price;
            }
        }
        table.version = format!("{}+overrides", PRICING_VERSION);
        table
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the model has its own entry
    pub fn contains(&self, model: &str) -> bool {
        self.prices.contains_key(model)
    }

    /// Price for `model`, falling back to the default model's price
    pub fn resolve(&self, model: &str) -> &ModelPrice {
        self.prices.get(model).unwrap_or(&self.fallback)
    }

    /// Known model names, sorted
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.prices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Per-kind costs, each rounded to 6 decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostItems {
    pub input_cost: f64,
    pub output_cost: f64,
    pub citation_cost: f64,
    pub search_cost: f64,
    pub reasoning_cost: f64,
}

impl CostItems {
    /// Sum of the five items (unrounded)
    pub fn sum(&self) -> f64 {
        self.input_cost + self.output_cost + self.citation_cost + self.search_cost + self.reasoning_cost
    }
}

/// Itemized cost for a usage bundle
///
/// Serializes to the shape consumers parse:
/// `{model, usage, costs, total_cost, total_cost_usd}` on success and
/// `{model, error, total_cost, total_cost_usd}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostItems>,
    pub total_cost: f64,
    pub total_cost_usd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CostBreakdown {
    /// Zero-cost breakdown carrying an error message
    pub fn failed(model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            usage: None,
            costs: None,
            total_cost: 0.0,
            total_cost_usd: format_usd(0.0),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// `$` followed by the amount with 6 decimals
pub fn format_usd(amount: f64) -> String {
    format!("${:.6}", amount)
}

/// Round to 6 decimal places (half away from zero)
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
