//! Authentication binding.
//!
//! Two capabilities cover the two ways a descriptor can be authenticated:
//!
//! - [`Lockable`]: a same-type transform, `authenticating(request, secret) -> Self`
//! - [`Unlockable`]: a type-level upgrade, `unlocking(secret) -> L`
//!
//! [`Locked`] is the canonical upgrade: it wraps a descriptor that still
//! needs a [`Secret`], stays composable, but is not
//! [`Requestable`](crate::request::Requestable) and therefore cannot be
//! executed until unlocked.
//!
//! ```
//! use composable_request_core::{BearerToken, Composable, Request, Requestable, Unlockable};
//!
//! let locked = Request::new("https://api.example.com").locking().append("me");
//! let request: Request = locked.unlocking(&BearerToken::new("t0k3n"));
//!
//! let resolved = request.request().unwrap();
//! assert_eq!(resolved.header_fields["Authorization"], "Bearer t0k3n");
//! ```

use crate::composable::{Composable, composable_via};
use crate::request::Request;
use std::collections::BTreeMap;
use std::fmt;

/// An opaque credential able to authenticate a descriptor.
pub trait Secret {
    /// Header fields carrying the credential.
    fn header_fields(&self) -> BTreeMap<String, String>;

    /// Form body parameters carrying the credential, if any.
    fn body_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Authenticate without changing type.
pub trait Lockable<S: ?Sized>: Sized {
    /// Bind `secret` to `request`.
    ///
    /// Must be pure: the same request and secret always give equal results.
    fn authenticating(request: Self, secret: &S) -> Self;
}

/// Authenticate by upgrading into another type `L`.
pub trait Unlockable<S: ?Sized, L> {
    /// Bind `secret`, producing the authenticated descriptor.
    ///
    /// Must be pure: the same descriptor and secret always give equal results.
    fn unlocking(self, secret: &S) -> L;
}

impl<S: Secret + ?Sized> Lockable<S> for Request {
    fn authenticating(request: Self, secret: &S) -> Self {
        let request = request.header(Some(
            secret
                .header_fields()
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect(),
        ));
        let parameters = secret.body_parameters();
        if parameters.is_empty() {
            return request;
        }
        request.body_parameters(Some(
            parameters
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect(),
        ))
    }
}

/// A descriptor that requires authentication before it can be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locked<R> {
    request: R,
}

impl<R> Locked<R> {
    /// Mark `request` as requiring authentication.
    pub const fn new(request: R) -> Self {
        Self { request }
    }
}

impl Request {
    /// Require authentication before this request can be executed.
    #[must_use]
    pub const fn locking(self) -> Locked<Self> {
        Locked::new(self)
    }
}

impl<R: Composable> Composable for Locked<R> {
    composable_via!(request);
}

impl<S: ?Sized, R: Lockable<S>> Unlockable<S, R> for Locked<R> {
    fn unlocking(self, secret: &S) -> R {
        R::authenticating(self.request, secret)
    }
}

/// A bearer token, sent as `Authorization: Bearer <token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl Secret for BearerToken {
    fn header_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("Authorization".to_string(), format!("Bearer {}", self.0))])
    }
}

/// A credential made of arbitrary header fields (cookies, API keys, ...).
#[derive(Clone, PartialEq, Eq, Default)]
pub struct HeaderSecret {
    header_fields: BTreeMap<String, String>,
}

impl HeaderSecret {
    /// Build from key/value pairs.
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            header_fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for HeaderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderSecret")
            .field("keys", &self.header_fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Secret for HeaderSecret {
    fn header_fields(&self) -> BTreeMap<String, String> {
        self.header_fields.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FormSecret;

    impl Secret for FormSecret {
        fn header_fields(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }

        fn body_parameters(&self) -> BTreeMap<String, String> {
            BTreeMap::from([("_csrftoken".to_string(), "abc".to_string())])
        }
    }

    fn request() -> Request {
        Request::new("https://example.com").append("inbox")
    }

    #[test]
    fn test_authenticating_is_repeatable() {
        let secret = BearerToken::new("one");
        let first = Request::authenticating(request(), &secret);
        let second = Request::authenticating(request(), &secret);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_secrets_give_different_requests() {
        let first = Request::authenticating(request(), &BearerToken::new("one"));
        let second = Request::authenticating(request(), &BearerToken::new("two"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_unlocking_matches_authenticating() {
        let secret = HeaderSecret::new([("Cookie", "sessionid=1"), ("X-Api-Key", "k")]);
        let unlocked: Request = request().locking().unlocking(&secret);
        assert_eq!(unlocked, Request::authenticating(request(), &secret));
        assert_eq!(unlocked.header_fields()["Cookie"], "sessionid=1");
    }

    #[test]
    fn test_locked_requests_stay_composable() {
        let unlocked: Request = request()
            .locking()
            .query_item("a", Some("1"))
            .unlocking(&BearerToken::new("t"));
        assert_eq!(unlocked.query_items()["a"], "1");
        assert_eq!(unlocked.path_components(), ["inbox"]);
    }

    #[test]
    fn test_secret_body_parameters_are_merged() {
        let request = Request::authenticating(request(), &FormSecret);
        assert!(matches!(
            request.payload(),
            crate::request::Body::Parameters(parameters) if parameters["_csrftoken"] == "abc"
        ));
    }

    #[test]
    fn test_secrets_are_redacted() {
        assert_eq!(format!("{:?}", BearerToken::new("hidden")), "BearerToken(<redacted>)");
        let header = HeaderSecret::new([("Cookie", "hidden")]);
        assert!(!format!("{header:?}").contains("hidden"));
    }
}
