//! Retrying chains with exponential backoff.
//!
//! [`RetryExt::retrying`] wraps any cloneable chain. When the first outcome
//! of an attempt is a retryable failure, the chain is rebuilt from scratch
//! and received again after a backoff delay. Once an attempt delivers a
//! first outcome that is kept, its remaining outcomes are forwarded as-is.
//!
//! # Example
//!
//! ```rust
//! use composable_request_core::{Composable, Receivable, Request, RequestError};
//! use composable_request_runtime::retry::{RetryExt, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_max_retries(5)
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(10));
//!
//! let chain = Request::new("https://api.example.com")
//!     .append("status")
//!     .retrying(policy)
//!     .when(RequestError::is_transport);
//! ```

use async_stream::stream;
use composable_request_core::receivable::{Outcomes, Receivable};
use composable_request_core::{RequestError, Requester};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff settings for [`Retrying`].
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 100ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// The default policy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn never() -> Self {
        Self::new().with_max_retries(0)
    }

    /// Set the number of retries
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap on any single delay
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `min(initial_delay * multiplier^attempt, max_delay)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        if !seconds.is_finite() || seconds >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

type Predicate = Arc<dyn Fn(&RequestError) -> bool + Send + Sync>;

/// A chain received again while its first outcome is a retryable failure.
#[derive(Clone)]
pub struct Retrying<R> {
    receivable: R,
    policy: RetryPolicy,
    retryable: Option<Predicate>,
}

impl<R> Retrying<R> {
    /// Retry `receivable` under `policy`, on any failure.
    pub const fn new(receivable: R, policy: RetryPolicy) -> Self {
        Self {
            receivable,
            policy,
            retryable: None,
        }
    }

    /// Only retry failures matching `predicate`.
    #[must_use]
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RequestError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Some(Arc::new(predicate));
        self
    }

    /// The backoff settings.
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<R: fmt::Debug> fmt::Debug for Retrying<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("receivable", &self.receivable)
            .field("policy", &self.policy)
            .field("filtered", &self.retryable.is_some())
            .finish()
    }
}

impl<R> Receivable for Retrying<R>
where
    R: Receivable + Clone,
{
    type Success = R::Success;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<R::Success> {
        let Self {
            receivable,
            policy,
            retryable,
        } = self;

        Box::pin(stream! {
            let mut attempt = 0;
            loop {
                let mut outcomes = receivable.clone().receive(Arc::clone(&requester));
                let first = outcomes.next().await;
                match first {
                    None => break,
                    Some(Err(error))
                        if attempt < policy.max_retries
                            && retryable.as_ref().is_none_or(|retryable| retryable(&error)) =>
                    {
                        let delay = policy.delay_for_attempt(attempt);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "Request failed, retrying..."
                        );
                        drop(outcomes);
                        sleep(delay).await;
                        attempt += 1;
                    },
                    Some(outcome) => {
                        match &outcome {
                            Ok(_) if attempt > 0 => {
                                tracing::info!(attempt, "Request succeeded after retry");
                            },
                            Err(error) if attempt > 0 => {
                                tracing::error!(attempt, error = %error, "Request failed after retries");
                            },
                            _ => {},
                        }
                        yield outcome;
                        while let Some(outcome) = outcomes.next().await {
                            yield outcome;
                        }
                        break;
                    },
                }
            }
        })
    }
}

/// Adds [`retrying`](RetryExt::retrying) to every cloneable chain.
pub trait RetryExt: Receivable + Clone {
    /// Retry this chain under `policy`.
    fn retrying(self, policy: RetryPolicy) -> Retrying<Self> {
        Retrying::new(self, policy)
    }
}

impl<R: Receivable + Clone> RetryExt for R {}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use composable_request_core::Ready;
    use composable_request_core::receivable::Outcome;
    use composable_request_core::request::ResolvedRequest;
    use composable_request_core::requester::Delivery;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Unused;

    impl Requester for Unused {
        fn execute(&self, _request: ResolvedRequest) -> Delivery {
            Box::pin(async { Err(RequestError::custom("not expected")) })
        }
    }

    /// Fails until `failures` attempts were made.
    #[derive(Clone)]
    struct Flaky {
        attempts: Arc<AtomicU32>,
        failures: u32,
    }

    impl Receivable for Flaky {
        type Success = u32;

        fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<u32> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            let outcome: Outcome<u32> = if attempt < self.failures {
                Err(RequestError::custom(format!("attempt {attempt} failed")))
            } else {
                Ok(attempt)
            };
            Ready::new(outcome).receive(requester)
        }
    }

    fn flaky(failures: u32) -> (Flaky, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        (
            Flaky {
                attempts: Arc::clone(&attempts),
                failures,
            },
            attempts,
        )
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let (chain, attempts) = flaky(2);
        let outcome = chain.retrying(fast(3)).requested(Unused).resolve().await;
        assert_eq!(outcome.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_retries() {
        let (chain, attempts) = flaky(10);
        let outcome = chain.retrying(fast(2)).requested(Unused).resolve().await;
        assert_eq!(outcome.unwrap_err().to_string(), "attempt 2 failed");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_predicate_skips_non_retryable() {
        let (chain, attempts) = flaky(1);
        let outcome = chain
            .retrying(fast(3))
            .when(RequestError::is_transport)
            .requested(Unused)
            .resolve()
            .await;
        assert!(outcome.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_is_not_received_before_polling() {
        let (chain, attempts) = flaky(0);
        let stream = chain.retrying(RetryPolicy::never()).requested(Unused).stream();
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        drop(stream);
    }

    proptest! {
        #[test]
        fn delays_grow_until_capped(
            initial_ms in 1_u64..1_000,
            multiplier in 1_u32..5,
            max_secs in 1_u64..60,
            attempt in 0_u32..40,
        ) {
            let policy = RetryPolicy::new()
                .with_initial_delay(Duration::from_millis(initial_ms))
                .with_multiplier(f64::from(multiplier))
                .with_max_delay(Duration::from_secs(max_secs));

            let delay = policy.delay_for_attempt(attempt);
            prop_assert!(delay <= policy.max_delay);
            prop_assert!(delay <= policy.delay_for_attempt(attempt + 1));
        }

        #[test]
        fn enough_retries_always_recover(failures in 0_u32..6, spare in 0_u32..3) {
            let (chain, attempts) = flaky(failures);
            let policy = fast(failures + spare).with_initial_delay(Duration::ZERO);
            let outcome = tokio_test::block_on(chain.retrying(policy).requested(Unused).resolve());
            prop_assert_eq!(outcome.unwrap(), failures);
            prop_assert_eq!(attempts.load(Ordering::SeqCst), failures + 1);
        }
    }
}
