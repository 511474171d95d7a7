use anyhow::{Context, Result};
use colored::Colorize;
use deep_research_agent::{
    config,
    pricing::{format_cost_summary, CostCalculator},
};
use serde_json::Value;
use std::path::Path;

/// Execute the cost command
///
/// Prices `usage` with the configured pricing table and prints the JSON
/// breakdown followed by the text summary
pub fn execute(config_path: &Path, model: &str, usage: &str) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let usage: Value = serde_json::from_str(usage).context("Usage must be a JSON object")?;

    let table = cfg.pricing_table();
    if !table.contains(model) {
        println!(
            "{}",
            format!("Unknown model '{}', using the default price list", model).yellow()
        );
    }

    let calculator = CostCalculator::with_table(&table, model);
    let breakdown = calculator.calculate_cost(&usage);

    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    println!();
    println!("{}", format_cost_summary(&breakdown));

    if breakdown.is_error() {
        anyhow::bail!("Cost calculation failed");
    }
    Ok(())
}
