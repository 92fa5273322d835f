//! Pairing a descriptor with the type its response decodes into.
//!
//! [`Expected<R, T>`] carries no `T` at runtime; `T` only selects the
//! [`Decodable`] implementation applied to the response bytes.

use crate::composable::{Composable, composable_via};
use crate::error::{CodingError, RequestError};
use crate::lock::{Lockable, Locked, Unlockable};
use crate::paginated::Paginated;
use crate::receivable::{Outcomes, Receivable};
use crate::request::{Request, Requestable, ResolvedRequest};
use crate::requester::Requester;
use crate::wrapper::Wrapper;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type a response body can be decoded into.
pub trait Decodable: Sized + Send + 'static {
    /// Decode the response body.
    ///
    /// # Errors
    ///
    /// Returns a [`CodingError`] when `data` does not match `Self`.
    fn decode(data: &[u8]) -> Result<Self, RequestError>;
}

impl Decodable for Vec<u8> {
    fn decode(data: &[u8]) -> Result<Self, RequestError> {
        Ok(data.to_vec())
    }
}

impl Decodable for String {
    fn decode(data: &[u8]) -> Result<Self, RequestError> {
        Self::from_utf8(data.to_vec())
            .map_err(|e| CodingError::Decoding(e.to_string()).into())
    }
}

impl Decodable for Wrapper {
    fn decode(data: &[u8]) -> Result<Self, RequestError> {
        Ok(Self::decode(data)?)
    }
}

/// Any `serde` type, decoded from JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned + Send + 'static> Decodable for Json<T> {
    fn decode(data: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(data)
            .map(Json)
            .map_err(|e| CodingError::Decoding(e.to_string()).into())
    }
}

/// A descriptor expecting a `T` response.
pub struct Expected<R, T> {
    request: R,
    response: PhantomData<fn() -> T>,
}

impl<R, T> Expected<R, T> {
    /// Expect a `T` out of `request`.
    pub const fn new(request: R) -> Self {
        Self {
            request,
            response: PhantomData,
        }
    }

    /// The wrapped descriptor.
    pub const fn inner(&self) -> &R {
        &self.request
    }

    /// Unwrap the descriptor.
    pub fn into_inner(self) -> R {
        self.request
    }

    /// Paginate through the `key` query item.
    ///
    /// The first page is requested with `initial` (or without `key` at
    /// all when `None`); every following cursor is computed by `next` out
    /// of the previous outcome, and `None` ends the sequence.
    pub fn paginating<F>(self, key: impl Into<String>, initial: Option<&str>, next: F) -> Paginated<R, T>
    where
        F: Fn(&Result<T, RequestError>) -> Option<String> + Send + Sync + 'static,
    {
        Paginated::new(self, key, initial.map(str::to_string), next)
    }
}

/// Wrap descriptors into an [`Expected`].
pub trait Expecting: Sized {
    /// Expect a `T` response.
    fn expecting<T>(self) -> Expected<Self, T> {
        Expected::new(self)
    }

    /// Paginate through the `key` query item, decoding every page into a
    /// [`Wrapper`]. See [`Expected::paginating`].
    fn paginating<F>(self, key: impl Into<String>, initial: Option<&str>, next: F) -> Paginated<Self, Wrapper>
    where
        F: Fn(&Result<Wrapper, RequestError>) -> Option<String> + Send + Sync + 'static,
    {
        self.expecting::<Wrapper>().paginating(key, initial, next)
    }
}

impl Expecting for Request {}

impl<R> Expecting for Locked<R> {}

impl<R: Clone, T> Clone for Expected<R, T> {
    fn clone(&self) -> Self {
        Self::new(self.request.clone())
    }
}

impl<R: fmt::Debug, T> fmt::Debug for Expected<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expected")
            .field("request", &self.request)
            .field("response", &std::any::type_name::<T>())
            .finish()
    }
}

impl<R: PartialEq, T> PartialEq for Expected<R, T> {
    fn eq(&self, other: &Self) -> bool {
        self.request == other.request
    }
}

impl<R: Composable, T> Composable for Expected<R, T> {
    composable_via!(request);
}

impl<R: Requestable, T> Requestable for Expected<R, T> {
    fn request(&self) -> Result<ResolvedRequest, RequestError> {
        self.request.request()
    }
}

impl<R, T> Receivable for Expected<R, T>
where
    R: Receivable<Success = Vec<u8>>,
    T: Decodable,
{
    type Success = T;

    fn receive(self, requester: Arc<dyn Requester>) -> Outcomes<T> {
        self.request
            .receive(requester)
            .map(|outcome| outcome.and_then(|data| T::decode(&data)))
            .boxed()
    }
}

impl<S: ?Sized, R: Lockable<S>, T> Lockable<S> for Expected<R, T> {
    fn authenticating(request: Self, secret: &S) -> Self {
        Self::new(R::authenticating(request.request, secret))
    }
}

impl<S: ?Sized, R: Unlockable<S, L>, L, T> Unlockable<S, Expected<L, T>> for Expected<R, T> {
    fn unlocking(self, secret: &S) -> Expected<L, T> {
        Expected::new(self.request.unlocking(secret))
    }
}
