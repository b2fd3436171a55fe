//! Retry with exponential back-off and jitter for the draft generator.

use std::future::Future;
use std::time::Duration;

use crate::generator::GeneratorError;

/// Network failures, 5xx, and 429 are worth another attempt. Bad requests
/// and malformed drafts are not.
pub(crate) fn is_retriable(err: &GeneratorError) -> bool {
    match err {
        GeneratorError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        GeneratorError::Status { status, .. } => *status >= 500 || *status == 429,
        GeneratorError::Unconfigured
        | GeneratorError::InvalidEndpoint { .. }
        | GeneratorError::Deserialize(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` extra attempts. The delay before
/// attempt `n` is `backoff_base_ms * 2^(n-1)` with ±25% jitter, capped at 30s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, GeneratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeneratorError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "draft generator transient error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn status(code: u16) -> GeneratorError {
        GeneratorError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&status(400)));
        assert!(!is_retriable(&status(422)));
        assert!(!is_retriable(&GeneratorError::Unconfigured));
    }

    #[test]
    fn server_errors_and_throttling_are_retriable() {
        assert!(is_retriable(&status(503)));
        assert!(is_retriable(&status(429)));
    }

    #[tokio::test]
    async fn retries_until_the_budget_is_spent() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(status(502))
            }
        })
        .await;
        assert!(matches!(result, Err(GeneratorError::Status { status: 502, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_return_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(5, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(status(400))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
