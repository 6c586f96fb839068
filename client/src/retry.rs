//! Retry logic for RPC operations.
//!
//! This module provides utilities for retrying failed operations with exponential backoff,
//! handling transient network errors, and managing retry attempts.

use crate::config::DaoConfig;
use crate::error::{DaoClientError, Result, RetryContext};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial retry delay
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl RetryStrategy {
    /// Create a new retry strategy from client config
    pub fn from_config(config: &DaoConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: config.retry_multiplier,
        }
    }

    /// Create an exponential backoff instance. Attempts are bounded by
    /// `max_retries`, not by elapsed time.
    pub(crate) fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.multiplier)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Check if an error is retryable
    pub fn is_retryable(error: &DaoClientError) -> bool {
        match error {
            DaoClientError::Network(_) => true,
            DaoClientError::RateLimitExceeded(_) => true,
            DaoClientError::Rpc(msg) => Self::is_transient_rpc_error(msg),
            DaoClientError::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// A gateway failure (`HTTP 5xx: ...`) or a node timeout. JSON-RPC errors
    /// read `<message>: <cause> ... (code: N)`, so only the cause name is
    /// compared; account IDs or block heights in the rest never match.
    fn is_transient_rpc_error(msg: &str) -> bool {
        if let Some(rest) = msg.strip_prefix("HTTP ") {
            return rest
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .is_some_and(|code| matches!(code, 500 | 502 | 503 | 504));
        }

        msg.split_once(": ")
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|cause| cause == "TIMEOUT_ERROR")
    }

    /// Execute a function with retry logic
    pub async fn retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_with_predicate(operation, Self::is_retryable)
            .await
    }

    /// Execute a function with retry logic and custom retry predicate
    pub async fn retry_with_predicate<F, Fut, T, P>(
        &self,
        operation: F,
        should_retry: P,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&DaoClientError) -> bool,
    {
        let mut backoff = self.create_backoff();
        let mut retry_ctx = RetryContext::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!("Attempt {} of {}", attempts, self.max_retries + 1);

            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!(
                            "Operation succeeded after {} attempts ({}ms waiting)",
                            attempts, retry_ctx.total_time_ms
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !should_retry(&error) {
                        warn!("Non-retryable error: {:?}", error);
                        return Err(error);
                    }

                    if attempts > self.max_retries {
                        warn!(
                            "Max retries ({}) exceeded. Last error: {:?}",
                            self.max_retries, error
                        );
                        return Err(DaoClientError::MaxRetriesExceeded(self.max_retries));
                    }

                    let delay = match backoff.next_backoff() {
                        Some(d) => d,
                        None => {
                            warn!("Backoff exhausted");
                            return Err(DaoClientError::MaxRetriesExceeded(self.max_retries));
                        }
                    };

                    retry_ctx.record_attempt(&error.to_string(), delay.as_millis() as u64);

                    warn!(
                        "Attempt {} failed: {:?}. Retrying in {:?}",
                        attempts, error, delay
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use test_case::test_case;

    fn fast_strategy(max_retries: usize) -> RetryStrategy {
        RetryStrategy {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_strategy_from_config() {
        let config = DaoConfig::testnet("dao.testnet");
        let strategy = RetryStrategy::from_config(&config);
        assert_eq!(strategy.max_retries, config.max_retries);
        assert_eq!(
            strategy.initial_delay,
            Duration::from_millis(config.retry_initial_delay_ms)
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(RetryStrategy::is_retryable(
            &DaoClientError::RateLimitExceeded(60)
        ));
        assert!(RetryStrategy::is_retryable(&DaoClientError::Rpc(
            "HTTP 503 Service Unavailable".to_string()
        )));

        // Contract failures and bad input never succeed on retry
        assert!(!RetryStrategy::is_retryable(
            &DaoClientError::ContractExecution {
                method: "add_proposal".to_string(),
                message: "ERR_PERMISSION_DENIED".to_string(),
            }
        ));
        assert!(!RetryStrategy::is_retryable(&DaoClientError::InvalidInput(
            "empty title".to_string()
        )));
        assert!(!RetryStrategy::is_retryable(
            &DaoClientError::EmptyWindow { from_index: 0 }
        ));
    }

    #[test_case("HTTP 503 Service Unavailable: upstream down", true ; "service unavailable")]
    #[test_case("HTTP 502 Bad Gateway", true ; "bad gateway")]
    #[test_case("HTTP 504 Gateway Timeout: ", true ; "gateway timeout")]
    #[test_case("HTTP 404 Not Found: 500 bytes", false ; "client error with 5xx digits")]
    #[test_case("HTTP 400 Bad Request: missing block 503", false ; "bad request")]
    #[test_case("Server error: TIMEOUT_ERROR (code: -32000)", true ; "node timeout")]
    #[test_case("Server error: UNKNOWN_BLOCK 5000 (code: -32000)", false ; "block height with 500")]
    #[test_case(
        r#"Server error: UNKNOWN_ACCOUNT {"requested_account_id":"dao502.testnet"} (code: -32000)"#,
        false ;
        "account id with 502"
    )]
    #[test_case("Server error: HANDLER_ERROR {\"reason\":\"TIMEOUT_ERROR\"} (code: -32000)", false ; "timeout outside cause")]
    fn test_rpc_error_classification(message: &str, retryable: bool) {
        assert_eq!(
            RetryStrategy::is_retryable(&DaoClientError::Rpc(message.to_string())),
            retryable
        );
    }

    #[test]
    fn test_backoff_not_bounded_by_elapsed_time() {
        let backoff = fast_strategy(3).create_backoff();
        assert!(backoff.max_elapsed_time.is_none());
        assert_eq!(backoff.initial_interval, Duration::from_millis(10));
        assert_eq!(backoff.max_interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(DaoClientError::Rpc("HTTP 502 Bad Gateway".to_string()))
                } else {
                    Ok::<u64, DaoClientError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_max_retries_exceeded() {
        let strategy = fast_strategy(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<u64, DaoClientError>(DaoClientError::InvalidResponse(
                    "truncated body".to_string(),
                ))
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            DaoClientError::MaxRetriesExceeded(2)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry(|| async {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                Err::<u64, DaoClientError>(DaoClientError::InvalidInput("bad".to_string()))
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            DaoClientError::InvalidInput(_)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_with_custom_predicate() {
        let strategy = fast_strategy(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = strategy
            .retry_with_predicate(
                || async {
                    let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                    if count == 0 {
                        Err(DaoClientError::EmptyWindow { from_index: 8 })
                    } else {
                        Ok::<u64, DaoClientError>(9)
                    }
                },
                DaoClientError::is_pending_correlation,
            )
            .await;

        assert_eq!(result.unwrap(), 9);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
