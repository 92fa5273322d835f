//! Lazy computation chains over request outcomes.
//!
//! A chain is a plain value built out of nodes ([`Map`], [`FlatMap`],
//! [`Switch`], ...). Building it performs no work; nothing reaches the
//! [`Requester`] until the chain is bound with [`Receivable::requested`]
//! and its outcomes are polled.
//!
//! ```
//! use composable_request_core::{Composable, Receivable, Request};
//! # use composable_request_core::requester::{Delivery, Requester};
//! # use composable_request_core::request::ResolvedRequest;
//! # struct Pong;
//! # impl Requester for Pong {
//! #     fn execute(&self, _: ResolvedRequest) -> Delivery {
//! #         Box::pin(async { Ok(b"pong".to_vec()) })
//! #     }
//! # }
//! # tokio_test::block_on(async {
//! let length = Request::new("https://example.com")
//!     .append("ping")
//!     .map(|body| body.len())
//!     .requested(Pong)
//!     .resolve()
//!     .await;
//! assert_eq!(length.unwrap(), 4);
//! # });
//! ```

use crate::error::{CodingError, RequestError};
use crate::expected::Decodable;
use crate::request::{Request, Requestable};
use crate::requester::Requester;
use futures::future::{self, AbortHandle};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

/// The eventual result of one stage.
pub type Outcome<T> = Result<T, RequestError>;

/// The lazy sequence of outcomes produced by a chain.
pub type Outcomes<T> = Pin<Box<dyn Stream<Item = Outcome<T>> + Send>>;

/// A value that produces outcomes once given a [`Requester`].
pub trait Receivable: Send + Sized + 'static {
    /// The success type of every outcome.
    type Success: Send + 'static;

    /// Turn the chain into its outcome stream.
    ///
    /// Only builds the stream; no request is executed before it is polled.
    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<Self::Success>;

    /// Transform successes.
    fn map<F, U>(self, transform: F) -> Map<Self, F>
    where
        F: FnMut(Self::Success) -> U + Send + 'static,
        U: Send + 'static,
    {
        Map {
            parent: self,
            transform,
        }
    }

    /// Transform successes with a transform that may fail.
    fn flat_map<F, U>(self, transform: F) -> FlatMap<Self, F>
    where
        F: FnMut(Self::Success) -> Outcome<U> + Send + 'static,
        U: Send + 'static,
    {
        FlatMap {
            parent: self,
            transform,
        }
    }

    /// Transform successes with any fallible function, turning its error
    /// into [`RequestError::Custom`].
    fn try_map<F, U, E>(self, transform: F) -> TryMap<Self, F>
    where
        F: FnMut(Self::Success) -> Result<U, E> + Send + 'static,
        U: Send + 'static,
        E: fmt::Display,
    {
        TryMap {
            parent: self,
            transform,
        }
    }

    /// Transform failures.
    fn map_error<F>(self, transform: F) -> MapError<Self, F>
    where
        F: FnMut(RequestError) -> RequestError + Send + 'static,
    {
        MapError {
            parent: self,
            transform,
        }
    }

    /// Recover from failures, or replace them with other failures.
    fn flat_map_error<F>(self, transform: F) -> FlatMapError<Self, F>
    where
        F: FnMut(RequestError) -> Outcome<Self::Success> + Send + 'static,
    {
        FlatMapError {
            parent: self,
            transform,
        }
    }

    /// Replace every success with the outcomes of the chain `generator`
    /// builds out of it.
    fn switch<F, C>(self, generator: F) -> Switch<Self, F>
    where
        F: FnMut(Self::Success) -> Outcome<C> + Send + 'static,
        C: Receivable,
    {
        Switch {
            parent: self,
            generator,
        }
    }

    /// Log every outcome at `DEBUG` level without altering it.
    fn print(self, label: impl Into<String>) -> Print<Self>
    where
        Self::Success: fmt::Debug,
    {
        Print {
            parent: self,
            label: label.into(),
        }
    }

    /// Decode response bodies.
    fn decode<T: Decodable>(self) -> FlatMap<Self, fn(Vec<u8>) -> Outcome<T>>
    where
        Self: Receivable<Success = Vec<u8>>,
    {
        FlatMap {
            parent: self,
            transform: |data| T::decode(&data),
        }
    }

    /// Encode successes as JSON bytes.
    ///
    /// A [`Wrapper`](crate::wrapper::Wrapper) success is written with
    /// `snake_case` keys.
    fn encode(self) -> FlatMap<Self, fn(Self::Success) -> Outcome<Vec<u8>>>
    where
        Self::Success: Serialize,
    {
        FlatMap {
            parent: self,
            transform: |value| {
                serde_json::to_vec(&value)
                    .map_err(|e| CodingError::Encoding(e.to_string()).into())
            },
        }
    }

    /// Bind the chain to `requester`.
    fn requested(self, requester: impl Requester) -> Requested<Self> {
        Requested::new(self, Arc::new(requester))
    }
}

impl Receivable for Request {
    type Success = Vec<u8>;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<Vec<u8>> {
        stream::once(async move {
            let request = self.request()?;
            tracing::trace!(method = %request.method, url = %request.url, "executing request");
            requester.execute(request).await
        })
        .boxed()
    }
}

/// A source delivering one outcome known up front.
#[derive(Debug, Clone)]
pub struct Ready<T> {
    outcome: Outcome<T>,
}

impl<T> Ready<T> {
    /// Deliver `outcome`.
    pub const fn new(outcome: Outcome<T>) -> Self {
        Self { outcome }
    }

    /// Deliver a success.
    pub const fn ok(value: T) -> Self {
        Self::new(Ok(value))
    }

    /// Deliver a failure.
    pub const fn err(error: RequestError) -> Self {
        Self::new(Err(error))
    }
}

impl<T: Send + 'static> Receivable for Ready<T> {
    type Success = T;

    fn receive(self, _requester: Arc<dyn Requester>) -> Outcomes<T> {
        stream::once(future::ready(self.outcome)).boxed()
    }
}

/// See [`Receivable::map`].
#[derive(Clone)]
pub struct Map<R, F> {
    parent: R,
    transform: F,
}

impl<R, F, U> Receivable for Map<R, F>
where
    R: Receivable,
    F: FnMut(R::Success) -> U + Send + 'static,
    U: Send + 'static,
{
    type Success = U;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<U> {
        let mut transform = self.transform;
        self.parent
            .receive(requester)
            .map(move |outcome| outcome.map(&mut transform))
            .boxed()
    }
}

/// See [`Receivable::flat_map`].
#[derive(Clone)]
pub struct FlatMap<R, F> {
    parent: R,
    transform: F,
}

impl<R, F, U> Receivable for FlatMap<R, F>
where
    R: Receivable,
    F: FnMut(R::Success) -> Outcome<U> + Send + 'static,
    U: Send + 'static,
{
    type Success = U;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<U> {
        let mut transform = self.transform;
        self.parent
            .receive(requester)
            .map(move |outcome| outcome.and_then(&mut transform))
            .boxed()
    }
}

/// See [`Receivable::try_map`].
#[derive(Clone)]
pub struct TryMap<R, F> {
    parent: R,
    transform: F,
}

impl<R, F, U, E> Receivable for TryMap<R, F>
where
    R: Receivable,
    F: FnMut(R::Success) -> Result<U, E> + Send + 'static,
    U: Send + 'static,
    E: fmt::Display,
{
    type Success = U;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<U> {
        let mut transform = self.transform;
        self.parent
            .receive(requester)
            .map(move |outcome| {
                outcome.and_then(|value| {
                    transform(value).map_err(|e| RequestError::custom(e.to_string()))
                })
            })
            .boxed()
    }
}

/// See [`Receivable::map_error`].
#[derive(Clone)]
pub struct MapError<R, F> {
    parent: R,
    transform: F,
}

impl<R, F> Receivable for MapError<R, F>
where
    R: Receivable,
    F: FnMut(RequestError) -> RequestError + Send + 'static,
{
    type Success = R::Success;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<R::Success> {
        let mut transform = self.transform;
        self.parent
            .receive(requester)
            .map(move |outcome| outcome.map_err(&mut transform))
            .boxed()
    }
}

/// See [`Receivable::flat_map_error`].
#[derive(Clone)]
pub struct FlatMapError<R, F> {
    parent: R,
    transform: F,
}

impl<R, F> Receivable for FlatMapError<R, F>
where
    R: Receivable,
    F: FnMut(RequestError) -> Outcome<R::Success> + Send + 'static,
{
    type Success = R::Success;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<R::Success> {
        let mut transform = self.transform;
        self.parent
            .receive(requester)
            .map(move |outcome| outcome.or_else(&mut transform))
            .boxed()
    }
}

/// See [`Receivable::switch`].
///
/// Children run one after another, in the order their parents succeeded.
#[derive(Clone)]
pub struct Switch<R, F> {
    parent: R,
    generator: F,
}

impl<R, F, C> Receivable for Switch<R, F>
where
    R: Receivable,
    F: FnMut(R::Success) -> Outcome<C> + Send + 'static,
    C: Receivable,
{
    type Success = C::Success;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<C::Success> {
        let mut generator = self.generator;
        let children = Arc::clone(&requester);
        self.parent
            .receive(requester)
            .flat_map(move |outcome| match outcome.and_then(&mut generator) {
                Ok(child) => child.receive(Arc::clone(&children)),
                Err(error) => stream::once(future::ready(Err(error))).boxed(),
            })
            .boxed()
    }
}

/// See [`Receivable::print`].
#[derive(Debug, Clone)]
pub struct Print<R> {
    parent: R,
    label: String,
}

impl<R> Receivable for Print<R>
where
    R: Receivable,
    R::Success: fmt::Debug,
{
    type Success = R::Success;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<R::Success> {
        let label = self.label;
        self.parent
            .receive(requester)
            .inspect(move |outcome| match outcome {
                Ok(value) => tracing::debug!(label = %label, ?value, "received value"),
                Err(error) => tracing::debug!(label = %label, %error, "received failure"),
            })
            .boxed()
    }
}

/// A chain bound to the [`Requester`] executing it.
pub struct Requested<R> {
    receivable: R,
    requester: Arc<dyn Requester>,
}

impl<R: Receivable> Requested<R> {
    /// Bind `receivable` to a shared `requester`.
    pub fn new(receivable: R, requester: Arc<dyn Requester>) -> Self {
        Self {
            receivable,
            requester,
        }
    }

    /// The outcome stream. Requests are executed as it is polled.
    pub fn stream(self) -> Outcomes<R::Success> {
        self.receivable.receive(self.requester)
    }

    /// The first outcome.
    ///
    /// # Errors
    ///
    /// Returns the chain's failure, or [`RequestError::Construction`] if the
    /// chain completed without any outcome.
    pub async fn resolve(self) -> Outcome<R::Success> {
        self.stream().next().await.unwrap_or_else(|| {
            Err(RequestError::Construction(
                "chain completed without an outcome".to_string(),
            ))
        })
    }

    /// Drive the chain on a spawned task, calling `handler` with every
    /// outcome in delivery order.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<H>(self, handler: H) -> Subscription
    where
        H: FnMut(Outcome<R::Success>) + Send + 'static,
    {
        let (outcomes, abort) = stream::abortable(self.stream());
        let mut handler = handler;
        let task = tokio::spawn(async move {
            outcomes
                .for_each(move |outcome| {
                    handler(outcome);
                    future::ready(())
                })
                .await;
            tracing::trace!("subscription finished");
        });
        Subscription { abort, task }
    }
}

impl<R: fmt::Debug> fmt::Debug for Requested<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requested")
            .field("receivable", &self.receivable)
            .finish_non_exhaustive()
    }
}

/// A running chain started by [`Requested::subscribe`].
///
/// Dropping it detaches the task; call [`cancel`](Self::cancel) to stop it.
#[derive(Debug)]
pub struct Subscription {
    abort: AbortHandle,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering outcomes. A request in flight is dropped and no
    /// further request is started.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Whether the chain has stopped, either exhausted or cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the chain stops.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] of a handler that panicked.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::composable::Composable;
    use crate::requester::fake::Echo;
    use crate::wrapper::Wrapper;

    fn request(path: &str) -> Request {
        Request::new("https://example.com").append(path)
    }

    fn text(outcome: Outcome<Vec<u8>>) -> String {
        String::from_utf8(outcome.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_chains_are_lazy_until_polled() {
        let echo = Echo::default();
        let outcomes = request("a")
            .map(|body| body.len())
            .flat_map(Ok)
            .switch(|_| Ok(request("b")))
            .requested(echo.clone())
            .stream();
        assert!(echo.urls().is_empty());

        let collected: Vec<_> = outcomes.collect().await;
        assert_eq!(collected.len(), 1);
        assert_eq!(echo.urls(), ["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn test_switch_delivers_child_outcome_after_parent() {
        let echo = Echo::default();
        let outcome = request("parent")
            .switch(|body| Ok(request(&format!("child-of-{}", body.len()))))
            .requested(echo.clone())
            .resolve()
            .await;
        assert_eq!(text(outcome), "https://example.com/child-of-26");
        assert_eq!(echo.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_switch_skips_child_on_parent_failure() {
        let echo = Echo::default();
        let outcome = Ready::<u8>::err(RequestError::custom("boom"))
            .switch(|_| Ok(request("child")))
            .requested(echo.clone())
            .resolve()
            .await;
        assert_eq!(outcome.unwrap_err().to_string(), "boom");
        assert!(echo.urls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_channel_transforms() {
        let recovered = Ready::<u32>::err(RequestError::custom("404"))
            .map(|value| value + 1)
            .map_error(|error| RequestError::custom(format!("wrapped {error}")))
            .flat_map_error(|error| {
                assert_eq!(error.to_string(), "wrapped 404");
                Ok(7)
            })
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(recovered.unwrap(), 7);

        let replaced = Ready::ok(1)
            .flat_map(|_: i32| Err::<i32, _>(RequestError::custom("rejected")))
            .flat_map_error(|error| Err(RequestError::custom(format!("still {error}"))))
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(replaced.unwrap_err().to_string(), "still rejected");
    }

    #[tokio::test]
    async fn test_try_map_captures_errors() {
        let outcome = Ready::ok("x1".to_string())
            .try_map(|value| value.parse::<u8>())
            .requested(Echo::default())
            .resolve()
            .await;
        assert!(matches!(outcome.unwrap_err(), RequestError::Custom(_)));
    }

    #[tokio::test]
    async fn test_print_passes_outcomes_through() {
        let outcome = Ready::ok(3)
            .print("three")
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(outcome.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_decode_and_construction_failure() {
        let decoded = Ready::ok(br#"{"user_id": 5}"#.to_vec())
            .decode::<Wrapper>()
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(decoded.unwrap()["userId"].int(false), Some(5));

        let unresolvable = Request::default()
            .append("a")
            .requested(Echo::default())
            .resolve()
            .await;
        assert!(matches!(unresolvable.unwrap_err(), RequestError::Construction(_)));
    }

    #[tokio::test]
    async fn test_encode_writes_wire_keys() {
        let encoded = Ready::ok(crate::wrapper!({ "userId": 5 }))
            .encode()
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(encoded.unwrap(), br#"{"user_id":5}"#.to_vec());

        let round_trip = Ready::ok(vec![1, 2])
            .encode()
            .decode::<Wrapper>()
            .requested(Echo::default())
            .resolve()
            .await;
        assert_eq!(round_trip.unwrap()[1].int(false), Some(2));

        let unencodable = Ready::ok(Wrapper::Double(f64::NAN))
            .encode()
            .requested(Echo::default())
            .resolve()
            .await;
        assert!(matches!(
            unencodable.unwrap_err(),
            RequestError::Coding(CodingError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_to_handler() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let subscription = request("a")
            .map(|body| body.len())
            .requested(Echo::default())
            .subscribe(move |outcome| {
                sender.send(outcome.unwrap()).unwrap();
            });
        assert_eq!(receiver.recv().await, Some(21));
        subscription.join().await.unwrap();
    }
}
