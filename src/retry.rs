use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff
///
/// Attempt `n` (0-based) that fails with a retryable error is followed by a
/// sleep of `base_delay * 2^n`. The last attempt's error is returned as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sleep before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempts run out
///
/// `op` receives the 0-based attempt number.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if should_retry(&e) && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Determine if an error is worth retrying
///
/// ## Retryable (returns true):
/// - Connection failures (connection refused, DNS failures)
/// - Request timeouts
/// - Transport errors while sending the request or reading the body
///
/// ## Not retryable (returns false):
/// - Any HTTP status returned by the upstream, including 5xx; the caller
///   reports those immediately
/// - Decoding, configuration and protocol errors
pub fn is_retryable(error: &AppError) -> bool {
    match error {
        AppError::HttpRequest(e) => {
            if e.status().is_some() {
                return false;
            }
            e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
        }

        AppError::UpstreamError { .. } => false,

        AppError::ConfigError(_)
        | AppError::InvalidRequest(_)
        | AppError::MethodNotFound(_)
        | AppError::TaskNotFound(_)
        | AppError::UnsupportedOperation(_)
        | AppError::ConversionError(_)
        | AppError::Database(_)
        | AppError::InternalError(_) => false,
    }
}
