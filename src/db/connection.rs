use crate::config::DatabaseConfig;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

/// Build the MySQL pool without connecting
///
/// Connections are opened on first use and recycled after
/// `pool_recycle_seconds`, so a database that is down at startup only
/// affects the requests that need it. Must be called inside a Tokio runtime.
pub fn create_pool(cfg: &DatabaseConfig) -> MySqlPool {
    let options = MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .charset("utf8mb4");

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        database = %cfg.name,
        "Database pool configured (lazy)"
    );

    MySqlPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.connect_timeout_seconds))
        .max_lifetime(Duration::from_secs(cfg.pool_recycle_seconds))
        .connect_lazy_with(options)
}

/// Whether the error points at the connection rather than the query
pub fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
    )
}
