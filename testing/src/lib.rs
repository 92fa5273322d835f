//! # Composable Request Testing
//!
//! Testing utilities for Composable Request chains.
//!
//! This crate provides:
//! - [`MockRequester`]: a scripted [`Requester`] recording every request
//! - [`reference_date`]: a fixed instant for date coercion tests
//! - [`init_tracing`]: opt-in log output for test runs
//!
//! ## Example
//!
//! ```
//! use composable_request_core::{Composable, Receivable, Request};
//! use composable_request_testing::MockRequester;
//!
//! # tokio_test::block_on(async {
//! let requester = MockRequester::ok("pong");
//! let body = Request::new("https://example.com")
//!     .append("ping")
//!     .requested(requester.clone())
//!     .resolve()
//!     .await
//!     .unwrap();
//!
//! assert_eq!(body, b"pong");
//! assert_eq!(requester.count(), 1);
//! # });
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use composable_request_core::request::ResolvedRequest;
use composable_request_core::requester::Delivery;
use composable_request_core::{Atomic, RequestError, Requester, TransportError};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Responder = Arc<dyn Fn(&ResolvedRequest) -> Result<Vec<u8>, RequestError> + Send + Sync>;

/// A [`Requester`] answering from a closure and recording every request.
///
/// Requests are recorded when [`execute`](Requester::execute) is called,
/// so [`count`](Self::count) is the number of executions ever started.
/// Clones share the recorded requests.
#[derive(Clone)]
pub struct MockRequester {
    responder: Responder,
    requests: Atomic<Vec<ResolvedRequest>>,
    delay: Option<Duration>,
}

impl MockRequester {
    /// Answer every request with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ResolvedRequest) -> Result<Vec<u8>, RequestError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Atomic::default(),
            delay: None,
        }
    }

    /// Answer every request with `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self::new(move |_| Ok(body.clone()))
    }

    /// Answer with `outcomes` in order, then fail with a transport error.
    pub fn sequence<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<u8>, RequestError>>,
    {
        let remaining = Atomic::new(outcomes.into_iter().collect::<VecDeque<_>>());
        Self::new(move |request| {
            remaining.sync(VecDeque::pop_front).unwrap_or_else(|| {
                Err(TransportError::msg(format!("no response scripted for {}", request.url)).into())
            })
        })
    }

    /// Deliver every outcome after `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request executed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ResolvedRequest> {
        self.requests.value()
    }

    /// The number of requests executed so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.requests.sync(|requests| requests.len())
    }

    /// The value of query item `key` in every request executed so far.
    #[must_use]
    pub fn query_values(&self, key: &str) -> Vec<Option<String>> {
        self.requests.sync(|requests| {
            requests
                .iter()
                .map(|request| {
                    request
                        .url
                        .query_pairs()
                        .find(|(name, _)| name == key)
                        .map(|(_, value)| value.into_owned())
                })
                .collect()
        })
    }
}

impl fmt::Debug for MockRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRequester")
            .field("count", &self.count())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Requester for MockRequester {
    fn execute(&self, request: ResolvedRequest) -> Delivery {
        let outcome = (self.responder)(&request);
        self.requests.mutate(|requests| requests.push(request));
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        })
    }
}

/// `2001-01-01T00:00:00Z`, a fixed instant to resolve dates against.
#[must_use]
pub fn reference_date() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + TimeDelta::seconds(978_307_200)
}

/// Print logs filtered by `RUST_LOG` while tests run.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use composable_request_core::{Composable, Request, Requestable};

    fn resolved(query: Option<&str>) -> ResolvedRequest {
        Request::new("https://example.com")
            .query_item("page", query)
            .request()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sequence_then_exhaustion() {
        let requester = MockRequester::sequence([Ok(b"1".to_vec()), Err(RequestError::custom("2"))]);
        assert_eq!(requester.execute(resolved(Some("a"))).await.unwrap(), b"1");
        assert!(matches!(
            requester.execute(resolved(Some("b"))).await,
            Err(RequestError::Custom(_))
        ));
        assert!(requester.execute(resolved(None)).await.unwrap_err().is_transport());
        assert_eq!(
            requester.query_values("page"),
            [Some("a".to_string()), Some("b".to_string()), None]
        );
    }

    #[test]
    fn test_requests_are_recorded_before_polling() {
        let requester = MockRequester::ok("x");
        let clone = requester.clone();
        let delivery = requester.execute(resolved(None));
        assert_eq!(clone.count(), 1);
        drop(delivery);
    }

    #[test]
    fn test_reference_date() {
        assert_eq!(reference_date().to_rfc3339(), "2001-01-01T00:00:00+00:00");
    }
}
