/// Integration tests for usage-based cost accounting
use deep_research_agent::pricing::{
    format_cost_summary, round6, CostCalculator, ModelPrice, PricingTable, UsageAccumulator,
};
use serde_json::json;
use std::collections::HashMap;

#[test]
fn test_total_is_rounded_sum_of_rounded_items() {
    let calculator = CostCalculator::new("sonar-deep-research");
    let breakdown = calculator.calculate_cost(&json!({
        "prompt_tokens": 12_345,
        "completion_tokens": 67_891,
        "citation_tokens": 2_222,
        "num_search_queries": 17,
        "reasoning_tokens": 99_999
    }));

    let costs = breakdown.costs.unwrap();
    assert_eq!(costs.input_cost, 0.02469);
    assert_eq!(costs.output_cost, 0.543128);
    assert_eq!(costs.citation_cost, 0.004444);
    assert_eq!(costs.search_cost, 0.085);
    assert_eq!(costs.reasoning_cost, 0.299997);
    assert_eq!(breakdown.total_cost, round6(costs.sum()));
    assert_eq!(breakdown.total_cost_usd, "$0.957259");
}

#[test]
fn test_aliases_price_identically() {
    let calculator = CostCalculator::new("sonar-deep-research");
    let canonical = calculator.calculate_cost(&json!({"input_tokens": 1000}));
    let alias = calculator.calculate_cost(&json!({"prompt_tokens": 1000}));

    assert_eq!(canonical.costs.unwrap().input_cost, 0.002);
    assert_eq!(canonical, alias);
}

#[test]
fn test_sonar_one_dollar() {
    let breakdown = CostCalculator::new("sonar").calculate_cost(&json!({
        "prompt_tokens": 500_000,
        "completion_tokens": 500_000
    }));

    let costs = breakdown.costs.unwrap();
    assert_eq!(costs.input_cost, 0.5);
    assert_eq!(costs.output_cost, 0.5);
    assert_eq!(breakdown.total_cost, 1.0);
    assert_eq!(breakdown.total_cost_usd, "$1.000000");
}

#[test]
fn test_unknown_model_uses_default_prices() {
    let usage = json!({"input_tokens": 1_000_000, "search_queries": 1000, "reasoning_tokens": 10});
    let unknown = CostCalculator::new("gpt-unknown").calculate_cost(&usage);
    let default = CostCalculator::new("sonar-deep-research").calculate_cost(&usage);

    assert_eq!(unknown.model, "gpt-unknown");
    assert_eq!(unknown.costs, default.costs);
    assert_eq!(unknown.total_cost, default.total_cost);
}

#[test]
fn test_malformed_usage_reports_error() {
    let calculator = CostCalculator::new("sonar-pro");
    for usage in [
        json!({"input_tokens": "12"}),
        json!({"output_tokens": [1500]}),
        json!({"search_queries": {"count": 3}}),
        json!(["not", "an", "object"]),
    ] {
        let breakdown = calculator.calculate_cost(&usage);
        assert!(breakdown.error.is_some(), "usage {usage} should fail");
        assert_eq!(breakdown.total_cost, 0.0);
        assert_eq!(breakdown.total_cost_usd, "$0.000000");

        let value = serde_json::to_value(&breakdown).unwrap();
        assert!(value.get("costs").is_none());
        assert!(format_cost_summary(&breakdown).starts_with("Cost calculation error: "));
    }
}

#[test]
fn test_non_integer_counts_are_billed() {
    let calculator = CostCalculator::new("sonar-deep-research");

    // A boolean counts as one query: 1 / 1000 * $5
    let breakdown = calculator.calculate_cost(&json!({"search_queries": true}));
    assert!(breakdown.error.is_none());
    assert_eq!(breakdown.total_cost, 0.005);

    let breakdown = calculator.calculate_cost(&json!({"output_tokens": 2500.5}));
    assert!(breakdown.error.is_none());
    assert!(format_cost_summary(&breakdown).contains("Output Tokens: 2,500.5"));
}

#[test]
fn test_serialized_field_names() {
    let breakdown = CostCalculator::new("sonar").calculate_cost(&json!({}));
    let value = serde_json::to_value(&breakdown).unwrap();

    for field in ["model", "usage", "costs", "total_cost", "total_cost_usd"] {
        assert!(value.get(field).is_some(), "missing {field}");
    }
    for field in ["input_cost", "output_cost", "citation_cost", "search_cost", "reasoning_cost"] {
        assert!(value["costs"].get(field).is_some(), "missing costs.{field}");
    }
    assert!(value.get("error").is_none());
}

#[test]
fn test_summary_groups_thousands() {
    let calculator = CostCalculator::new("sonar-deep-research");
    let breakdown = calculator.calculate_cost(&json!({"completion_tokens": 1_234_567}));
    let summary = format_cost_summary(&breakdown);

    assert!(summary.contains("Output Tokens: 1,234,567"));
    assert!(summary.contains("Output Cost: $9.876536"));
    assert!(summary.ends_with("Total cost: $9.876536"));
}

#[test]
fn test_configured_override_table() {
    let mut overrides = HashMap::new();
    overrides.insert(
        "sonar-custom".to_string(),
        ModelPrice {
            input_price: 10.0,
            output_price: 0.0,
            citation_price: 0.0,
            search_query_price: 0.0,
            reasoning_price: 0.0,
        },
    );
    let table = PricingTable::with_overrides(&overrides);
    assert!(table.contains("sonar-custom"));

    let breakdown =
        CostCalculator::with_table(&table, "sonar-custom").calculate_cost(&json!({"input_tokens": 100_000}));
    assert_eq!(breakdown.total_cost, 1.0);
}

#[test]
fn test_accumulated_usage_across_tool_calls() {
    let mut usage = UsageAccumulator::new();
    usage.add_json(&json!({"prompt_tokens": 100, "completion_tokens": 5000, "num_search_queries": 20}));
    usage.add_json(&json!({"prompt_tokens": 50, "completion_tokens": 3000, "citation_tokens": 400}));

    let breakdown = CostCalculator::new("sonar-deep-research").calculate_normalized(usage.result());
    let counts = breakdown.usage.unwrap();
    assert_eq!(counts.input_tokens, 150.0);
    assert_eq!(counts.output_tokens, 8000.0);
    assert_eq!(counts.search_queries, 20.0);
    assert_eq!(counts.citation_tokens, 400.0);
    // 0.0003 + 0.064 + 0.0008 + 0.1
    assert_eq!(breakdown.total_cost, 0.1651);
}
