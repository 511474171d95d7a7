pub mod agent;
pub mod agent_card;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod prompt;
pub mod providers;
pub mod push;
pub mod retry;
pub mod server;
pub mod signals;
pub mod streaming;
pub mod tasks;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over `default_level`. Can only be called once.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
