pub mod calculator;
pub mod models;
pub mod usage;

pub use calculator::{format_cost_summary, format_count, group_thousands, CostCalculator};
pub use models::{
    format_usd, round6, CostBreakdown, CostItems, ModelPrice, PricingTable, DEFAULT_PRICING_MODEL,
    PRICING_VERSION,
};
pub use usage::{first_present, UsageAccumulator, UsageCounts, UsageError};
