use crate::pricing::{CostBreakdown, UsageCounts};
use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    init_metric_descriptions();

    Ok(handle)
}

/// Handle backed by a recorder that is not installed globally
///
/// Used by tests and by commands that build an `AppState` without serving.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "deep_research_requests_total",
        "Total number of JSON-RPC requests by method"
    );
    describe_counter!(
        "deep_research_errors_total",
        "Total number of failed requests by error type"
    );
    describe_histogram!(
        "deep_research_request_duration_seconds",
        "Research task duration in seconds"
    );
    describe_counter!(
        "deep_research_usage_total",
        "Usage counters reported by the research provider"
    );
    describe_counter!(
        "deep_research_cost_usd_total",
        "Estimated research cost in USD"
    );
    describe_counter!(
        "deep_research_cache_events_total",
        "Cache hits, misses, fetch errors and evictions"
    );
    describe_counter!(
        "deep_research_tool_calls_total",
        "Tool invocations by outcome"
    );
    describe_gauge!(
        "deep_research_agent_info",
        "Agent version and pricing table information"
    );
}

/// Publish the info gauge once the pricing table is known
pub fn record_agent_info(agent: &str, pricing_version: &str) {
    gauge!(
        "deep_research_agent_info",
        "version" => env!("CARGO_PKG_VERSION"),
        "agent" => agent.to_string(),
        "pricing_version" => pricing_version.to_string(),
    )
    .set(1.0);
}

/// Record a JSON-RPC request
pub fn record_request(method: &str) {
    counter!(
        "deep_research_requests_total",
        "method" => method.to_string(),
    )
    .increment(1);
}

/// Record an error
pub fn record_error(method: &str, error_type: &str) {
    counter!(
        "deep_research_errors_total",
        "method" => method.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record research task duration
pub fn record_duration(model: &str, outcome: &str, duration: Duration) {
    histogram!(
        "deep_research_request_duration_seconds",
        "model" => model.to_string(),
        "outcome" => outcome.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record usage counters and the resulting cost of one research task
pub fn record_cost(breakdown: &CostBreakdown) {
    if let Some(usage) = &breakdown.usage {
        record_usage(&breakdown.model, usage);
    }
    if !breakdown.is_error() && breakdown.total_cost > 0.0 {
        counter!(
            "deep_research_cost_usd_total",
            "model" => breakdown.model.clone(),
        )
        .increment((breakdown.total_cost * 1_000_000.0).round() as u64);
    }
}

fn record_usage(model: &str, usage: &UsageCounts) {
    for (kind, count) in usage.iter().filter(|(_, count)| *count > 0.0) {
        counter!(
            "deep_research_usage_total",
            "model" => model.to_string(),
            "type" => kind,
        )
        .increment(count.round() as u64);
    }
}

/// Record a cache event (`hit`, `miss`, `fetch_error`)
pub fn record_cache_event(cache: &str, event: &'static str) {
    counter!(
        "deep_research_cache_events_total",
        "cache" => cache.to_string(),
        "event" => event,
    )
    .increment(1);
}

/// Record entries removed by invalidation or cleanup
pub fn record_cache_eviction(cache: &str, removed: usize) {
    counter!(
        "deep_research_cache_events_total",
        "cache" => cache.to_string(),
        "event" => "evicted",
    )
    .increment(removed as u64);
}

/// Record a tool invocation
pub fn record_tool_call(tool: &str, outcome: &'static str) {
    counter!(
        "deep_research_tool_calls_total",
        "tool" => tool.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}
