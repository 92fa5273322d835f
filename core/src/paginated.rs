//! Cursor-based pagination.
//!
//! A [`Paginated`] descriptor pulls one page at a time. The cursor of each
//! page is written into a single query item and computed by a continuation
//! out of the previous page's outcome:
//!
//! ```text
//! Pending(initial) --pull--> outcome --next(outcome)--> Pending(cursor) --pull--> ...
//!                                                   \--> Terminated (None)
//! ```
//!
//! Failures are forwarded like successes; only a `None` from the
//! continuation (or [`Pages::terminate`]) ends the sequence. Pulls are
//! strictly sequential and only happen while the consumer polls, so taking
//! the first `n` outcomes performs exactly `n` requests.

use crate::composable::{Composable, composable_via};
use crate::error::RequestError;
use crate::expected::{Decodable, Expected};
use crate::lock::{Lockable, Unlockable};
use crate::receivable::{Outcome, Outcomes, Receivable};
use crate::reference::Atomic;
use crate::request::{Requestable, ResolvedRequest};
use crate::requester::Requester;
use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Computes the next cursor out of the latest outcome. `None` stops.
pub type Continuation<T> = Arc<dyn Fn(&Outcome<T>) -> Option<String> + Send + Sync>;

/// Where a pagination sequence stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// The next pull uses this cursor; `None` omits the query item
    Pending(Option<String>),
    /// No further pull will happen
    Terminated,
}

/// A descriptor producing a sequence of pages.
pub struct Paginated<R, T> {
    expecting: Expected<R, T>,
    key: String,
    initial: Option<String>,
    next: Continuation<T>,
}

impl<R, T> Paginated<R, T> {
    pub(crate) fn new<F>(
        expecting: Expected<R, T>,
        key: impl Into<String>,
        initial: Option<String>,
        next: F,
    ) -> Self
    where
        F: Fn(&Outcome<T>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            expecting,
            key: key.into(),
            initial,
            next: Arc::new(next),
        }
    }

    /// The query item carrying the cursor.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The cursor of the first page.
    #[must_use]
    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// The descriptor every page is derived from.
    pub const fn expected(&self) -> &Expected<R, T> {
        &self.expecting
    }
}

impl<R, T> Paginated<R, T>
where
    R: Composable + Requestable + Clone + Send + Sync + 'static,
    T: Decodable,
{
    /// Start pulling pages through `requester`.
    ///
    /// Nothing is requested until the returned stream is polled.
    pub fn pages(self, requester: Arc<dyn Requester>) -> Pages<T> {
        let state = Atomic::new(PageState::Pending(self.initial));
        let cursors = state.clone();
        let Self {
            expecting,
            key,
            next,
            ..
        } = self;
        let request = expecting.into_inner();

        let outcomes = stream! {
            loop {
                let cursor = match cursors.value() {
                    PageState::Pending(cursor) => cursor,
                    PageState::Terminated => break,
                };
                tracing::trace!(key = %key, cursor = ?cursor, "pulling page");

                let page = request.clone().query_item(key.clone(), cursor.as_deref());
                let outcome = match page.request() {
                    Ok(resolved) => requester
                        .execute(resolved)
                        .await
                        .and_then(|data| T::decode(&data)),
                    Err(error) => Err(error),
                };
                if let Err(error) = &outcome {
                    tracing::debug!(key = %key, cursor = ?cursor, %error, "page failed");
                }

                let following = next(&outcome);
                cursors.mutate(|state| {
                    if matches!(state, PageState::Pending(_)) {
                        *state = following.map_or(PageState::Terminated, |cursor| {
                            PageState::Pending(Some(cursor))
                        });
                    }
                });
                yield outcome;
            }
            tracing::trace!(key = %key, "pagination terminated");
        };

        Pages {
            outcomes: Box::pin(outcomes),
            state,
        }
    }
}

impl<R, T> Receivable for Paginated<R, T>
where
    R: Composable + Requestable + Clone + Send + Sync + 'static,
    T: Decodable,
{
    type Success = T;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<T> {
        Box::pin(self.pages(requester))
    }
}

/// The first page.
impl<R, T> Requestable for Paginated<R, T>
where
    R: Composable + Requestable + Clone,
{
    fn request(&self) -> Result<ResolvedRequest, RequestError> {
        self.expecting
            .inner()
            .clone()
            .query_item(self.key.clone(), self.initial.as_deref())
            .request()
    }
}

impl<R: Composable, T> Composable for Paginated<R, T> {
    composable_via!(expecting);
}

impl<S: ?Sized, R: Lockable<S>, T> Lockable<S> for Paginated<R, T> {
    fn authenticating(request: Self, secret: &S) -> Self {
        Self {
            expecting: Expected::authenticating(request.expecting, secret),
            ..request
        }
    }
}

impl<S: ?Sized, R: Unlockable<S, L>, L, T> Unlockable<S, Paginated<L, T>> for Paginated<R, T> {
    fn unlocking(self, secret: &S) -> Paginated<L, T> {
        Paginated {
            expecting: self.expecting.unlocking(secret),
            key: self.key,
            initial: self.initial,
            next: self.next,
        }
    }
}

impl<R: Clone, T> Clone for Paginated<R, T> {
    fn clone(&self) -> Self {
        Self {
            expecting: self.expecting.clone(),
            key: self.key.clone(),
            initial: self.initial.clone(),
            next: Arc::clone(&self.next),
        }
    }
}

impl<R: fmt::Debug, T> fmt::Debug for Paginated<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginated")
            .field("expecting", &self.expecting)
            .field("key", &self.key)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// The page outcomes of a running [`Paginated`] descriptor.
pub struct Pages<T> {
    outcomes: Outcomes<T>,
    state: Atomic<PageState>,
}

impl<T> Pages<T> {
    /// The current state.
    #[must_use]
    pub fn state(&self) -> PageState {
        self.state.value()
    }

    /// Stop pulling. A pull in flight still delivers its outcome.
    pub fn terminate(&self) {
        self.state.replace(PageState::Terminated);
    }

    /// A handle observing and terminating this sequence from elsewhere.
    #[must_use]
    pub fn handle(&self) -> PagesHandle {
        PagesHandle {
            state: self.state.clone(),
        }
    }
}

impl<T> Stream for Pages<T> {
    type Item = Outcome<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.outcomes.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for Pages<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pages")
            .field("state", &self.state.value())
            .finish_non_exhaustive()
    }
}

/// A cloneable handle on a [`Pages`] sequence.
#[derive(Debug, Clone)]
pub struct PagesHandle {
    state: Atomic<PageState>,
}

impl PagesHandle {
    /// The current state.
    #[must_use]
    pub fn state(&self) -> PageState {
        self.state.value()
    }

    /// Stop pulling. See [`Pages::terminate`].
    pub fn terminate(&self) {
        self.state.replace(PageState::Terminated);
    }
}
