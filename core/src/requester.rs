//! The executor seam.
//!
//! A [`Requester`] turns one [`ResolvedRequest`] into exactly one outcome.
//! The core never performs I/O itself; concrete requesters live in the
//! runtime crate (HTTP) and the testing crate (scripted responses).

use crate::error::RequestError;
use crate::request::ResolvedRequest;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The eventual response body of one execution.
pub type Delivery = Pin<Box<dyn Future<Output = Result<Vec<u8>, RequestError>> + Send>>;

/// Executes resolved requests.
///
/// The returned future is the cancellation handle: dropping it before it
/// completes abandons the request. Once it resolves the outcome is final.
pub trait Requester: Send + Sync + 'static {
    /// Execute `request`, producing the raw response body.
    ///
    /// # Errors
    ///
    /// Transport failures are reported as [`RequestError::Transport`];
    /// implementations may also report [`RequestError::Status`].
    fn execute(&self, request: ResolvedRequest) -> Delivery;
}

impl<Q: Requester + ?Sized> Requester for Arc<Q> {
    fn execute(&self, request: ResolvedRequest) -> Delivery {
        (**self).execute(request)
    }
}

impl<Q: Requester + ?Sized> Requester for Box<Q> {
    fn execute(&self, request: ResolvedRequest) -> Delivery {
        (**self).execute(request)
    }
}
