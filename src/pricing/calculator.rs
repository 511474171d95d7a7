use crate::pricing::models::{
    format_usd, round6, CostBreakdown, CostItems, ModelPrice, PricingTable,
    SEARCH_QUERY_PRICE_UNIT, TOKEN_PRICE_UNIT,
};
use crate::pricing::usage::{UsageCounts, UsageError};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Calculator for the cost of deep-research API usage
///
/// The model is resolved against the pricing table once, at construction.
/// After that the calculator is immutable and can be shared freely.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    model: String,
    price: ModelPrice,
}

impl CostCalculator {
    /// Create a calculator priced from the built-in table
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_table(&PricingTable::builtin(), model)
    }

    /// Create a calculator priced from a configured table
    pub fn with_table(table: &PricingTable, model: impl Into<String>) -> Self {
        let model = model.into();
        let price = *table.resolve(&model);
        Self { model, price }
    }

    /// Shared-table convenience for callers holding an `Arc<PricingTable>`
    pub fn from_shared(table: &Arc<PricingTable>, model: impl Into<String>) -> Self {
        Self::with_table(table.as_ref(), model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn price(&self) -> &ModelPrice {
        &self.price
    }

    /// Calculate cost from a raw usage object
    ///
    /// Never fails: malformed usage yields a zero-cost breakdown with `error`
    /// set, so accounting problems cannot block the research answer.
    pub fn calculate_cost(&self, usage: &Value) -> CostBreakdown {
        self.calculate_normalized(UsageCounts::from_json(usage))
    }

    /// Calculate cost from already normalized counters
    pub fn calculate_for_counts(&self, usage: &UsageCounts) -> CostBreakdown {
        self.calculate_normalized(Ok(*usage))
    }

    /// Calculate cost from the outcome of usage normalization
    pub fn calculate_normalized(&self, usage: Result<UsageCounts, UsageError>) -> CostBreakdown {
        let result = usage
            .map_err(|e| e.to_string())
            .and_then(|counts| self.compute(counts));

        match result {
            Ok(breakdown) => {
                info!(
                    "Cost calculation for {}: {}",
                    self.model, breakdown.total_cost_usd
                );
                breakdown
            }
            Err(e) => {
                error!("Error calculating cost: {}", e);
                CostBreakdown::failed(&self.model, e)
            }
        }
    }

    fn compute(&self, usage: UsageCounts) -> Result<CostBreakdown, String> {
        let costs = CostItems {
            input_cost: token_cost(usage.input_tokens, self.price.input_price),
            output_cost: token_cost(usage.output_tokens, self.price.output_price),
            citation_cost: token_cost(usage.citation_tokens, self.price.citation_price),
            search_cost: round6(
                usage.search_queries / SEARCH_QUERY_PRICE_UNIT * self.price.search_query_price,
            ),
            reasoning_cost: token_cost(usage.reasoning_tokens, self.price.reasoning_price),
        };

        // Total is the rounded sum of the individually rounded items
        let total_cost = round6(costs.sum());
        if !total_cost.is_finite() {
            return Err(format!("cost is not a finite number: {}", total_cost));
        }

        Ok(CostBreakdown {
            model: self.model.clone(),
            usage: Some(usage),
            costs: Some(costs),
            total_cost,
            total_cost_usd: format_usd(total_cost),
            error: None,
        })
    }

    /// Render a breakdown as human-readable text
    pub fn format_cost_summary(&self, breakdown: &CostBreakdown) -> String {
        format_cost_summary(breakdown)
    }
}

fn token_cost(tokens: f64, price_per_million: f64) -> f64 {
    round6(tokens / TOKEN_PRICE_UNIT * price_per_million)
}

/// Render a breakdown as human-readable text
pub fn format_cost_summary(breakdown: &CostBreakdown) -> String {
    if let Some(err) = &breakdown.error {
        return format!("Cost calculation error: {}", err);
    }

    let (Some(usage), Some(costs)) = (&breakdown.usage, &breakdown.costs) else {
        return "Cost calculation error: breakdown has no usage data".to_string();
    };

    format!(
        "Perplexity {model} usage cost\n\
         \n\
         Usage:\n\
         • Input Tokens: {input}\n\
         • Output Tokens: {output}\n\
         • Citation Tokens: {citation}\n\
         • Search Queries: {search}\n\
         • Reasoning Tokens: {reasoning}\n\
         \n\
         Cost breakdown:\n\
         • Input Cost: ${input_cost:.6}\n\
         • Output Cost: ${output_cost:.6}\n\
         • Citation Cost: ${citation_cost:.6}\n\
         • Search Cost: ${search_cost:.6}\n\
         • Reasoning Cost: ${reasoning_cost:.6}\n\
         \n\
         Total cost: {total}",
        model = breakdown.model,
        input = format_count(usage.input_tokens),
        output = format_count(usage.output_tokens),
        citation = format_count(usage.citation_tokens),
        search = format_count(usage.search_queries),
        reasoning = format_count(usage.reasoning_tokens),
        input_cost = costs.input_cost,
        output_cost = costs.output_cost,
        citation_cost = costs.citation_cost,
        search_cost = costs.search_cost,
        reasoning_cost = costs.reasoning_cost,
        total = breakdown.total_cost_usd,
    )
}

/// Format an integer with `,` thousands separators
pub fn group_thousands(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}", sign, group_digits(&value.unsigned_abs().to_string()))
}

/// Format a usage count: the integer part is grouped, a fraction is kept
///
/// `1500.5` -> `1,500.5`, `2000000.0` -> `2,000,000`
pub fn format_count(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs().to_string();
    match magnitude.split_once('.') {
        Some((whole, fraction)) => format!("{}{}.{}", sign, group_digits(whole), fraction),
        None => format!("{}{}", sign, group_digits(&magnitude)),
    }
}

fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
