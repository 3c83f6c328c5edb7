use std::future::Future;
use std::time::Duration;

use crate::client::SearchClient;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{SearchRequest, SearchResponse};

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given 1-based attempt: `initial * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `operation` until `done` accepts its result or the attempt ceiling is reached.
///
/// Transient errors are retried; anything else propagates at once. Once the ceiling is hit
/// the last successful result is returned, or the last transient error if none succeeded.
pub async fn poll_until<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    mut done: P,
) -> CatalogResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CatalogResult<T>>,
    P: FnMut(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_value: Option<T> = None;
    let mut last_error: Option<CatalogError> = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => {
                if done(&value) {
                    return Ok(value);
                }
                last_value = Some(value);
            }
            Err(error) if error.is_transient() => {
                log::warn!(
                    "Attempt {}/{} failed transiently: {}",
                    attempt,
                    max_attempts,
                    error
                );
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }

        if attempt < max_attempts {
            let delay = policy.delay_for(attempt);
            log::debug!("Retrying in {:?} (attempt {})", delay, attempt);
            tokio::time::sleep(delay).await;
        }
    }

    match (last_value, last_error) {
        (Some(value), _) => Ok(value),
        (None, Some(error)) => Err(error),
        (None, None) => Err(CatalogError::Unexpected(
            "poll finished without a result".to_string(),
        )),
    }
}

/// Search until `approximate_count` reaches `expected`, absorbing index lag
pub async fn retry_search_until<C>(
    client: &C,
    request: &SearchRequest,
    expected: u64,
    policy: &RetryPolicy,
) -> CatalogResult<SearchResponse>
where
    C: SearchClient + ?Sized,
{
    let response = poll_until(
        policy,
        || client.search(request),
        |response| response.approximate_count >= expected,
    )
    .await?;

    if response.approximate_count < expected {
        log::warn!(
            "Search settled at {} results, expected at least {}",
            response.approximate_count,
            expected
        );
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedSearch {
        script: Mutex<VecDeque<CatalogResult<u64>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSearch {
        fn new(script: Vec<CatalogResult<u64>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait::async_trait]
    impl SearchClient for ScriptedSearch {
        async fn search(&self, _request: &SearchRequest) -> CatalogResult<SearchResponse> {
            *self.calls.lock() += 1;
            let next = self
                .script
                .lock()
                .pop_front()
                .unwrap_or(Err(CatalogError::Unexpected("script exhausted".to_string())));
            next.map(|count| SearchResponse {
                approximate_count: count,
                ..SearchResponse::default()
            })
        }
    }

    #[tokio::test]
    async fn test_returns_on_first_sufficient_count() {
        let client = ScriptedSearch::new(vec![Ok(3), Ok(3), Ok(7), Ok(10), Ok(10)]);
        let response =
            retry_search_until(&client, &SearchRequest::new(), 10, &RetryPolicy::immediate(10))
                .await
                .unwrap();
        assert_eq!(response.approximate_count, 10);
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_zero_expected_returns_immediately() {
        let client = ScriptedSearch::new(vec![Ok(0), Ok(5)]);
        let response =
            retry_search_until(&client, &SearchRequest::new(), 0, &RetryPolicy::immediate(10))
                .await
                .unwrap();
        assert_eq!(response.approximate_count, 0);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_returns_last_response() {
        let client = ScriptedSearch::new(vec![Ok(1), Ok(2), Ok(7)]);
        let response =
            retry_search_until(&client, &SearchRequest::new(), 10, &RetryPolicy::immediate(3))
                .await
                .unwrap();
        assert_eq!(response.approximate_count, 7);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let client = ScriptedSearch::new(vec![
            Err(CatalogError::Transient("index warming".to_string())),
            Ok(4),
        ]);
        let response =
            retry_search_until(&client, &SearchRequest::new(), 4, &RetryPolicy::immediate(5))
                .await
                .unwrap();
        assert_eq!(response.approximate_count, 4);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_transient_errors_propagate() {
        let client = ScriptedSearch::new(vec![
            Err(CatalogError::InvalidRequest("bad query".to_string())),
            Ok(4),
        ]);
        let error =
            retry_search_until(&client, &SearchRequest::new(), 4, &RetryPolicy::immediate(5))
                .await
                .unwrap_err();
        assert!(error.is_invalid_request());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_transient_returns_last_error() {
        let client = ScriptedSearch::new(vec![
            Err(CatalogError::Transient("first".to_string())),
            Err(CatalogError::Transient("second".to_string())),
        ]);
        let error =
            retry_search_until(&client, &SearchRequest::new(), 1, &RetryPolicy::immediate(2))
                .await
                .unwrap_err();
        assert_eq!(error, CatalogError::Transient("second".to_string()));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }
}
