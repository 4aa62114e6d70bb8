//! Bounded retry with exponential backoff.

use std::future::Future;

use backoff::{backoff::Backoff, ExponentialBackoff};
use tracing::{debug, warn};

use memory_types::{RetryConfig, StrategyError};

/// Run `operation` until it succeeds, `should_retry` rejects the error,
/// or the retry ceiling is reached.
///
/// Delays grow exponentially from the configured base up to its cap. The
/// returned error is the last one observed. `should_retry` sees every
/// failure; returning false surfaces it immediately, so callers can layer
/// policy (say, retrying timeouts only for cheap strategies) on top of
/// plain recoverability.
pub async fn retry_with_backoff<T, Fut, Op, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: Op,
) -> Result<T, StrategyError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StrategyError>>,
    P: Fn(&StrategyError) -> bool,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: config.initial_backoff(),
        max_interval: config.max_backoff(),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut failures: u32 = 0;

    loop {
        debug!(operation = operation_name, attempt = failures + 1, "executing");

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                failures += 1;
                if !should_retry(&error) {
                    debug!(
                        operation = operation_name,
                        error = %error,
                        "error is not retryable, giving up"
                    );
                    return Err(error);
                }
                if failures > config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempts = failures,
                        error = %error,
                        "retry ceiling reached"
                    );
                    return Err(error);
                }

                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            operation = operation_name,
                            error = %error,
                            retry_in_ms = delay.as_millis(),
                            "operation failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(error),
                }
            }
        }
    }
}
