//! The composition capability shared by every descriptor-like type.
//!
//! [`Composable`] exposes six primitives. Everything else (single key
//! updates, query replacement, the default header template, JSON bodies)
//! is derived from them and therefore available on any composable type,
//! including wrappers such as [`Expected`](crate::expected::Expected) and
//! [`Paginated`](crate::paginated::Paginated).
//!
//! # Example
//!
//! ```
//! use composable_request_core::{Composable, Method, Request, Requestable};
//!
//! let request = Request::new("https://api.example.com")
//!     .append("v1/users")
//!     .query_item("count", Some("20"))
//!     .method(Method::Get)
//!     .default_header();
//!
//! let resolved = request.request().unwrap();
//! assert_eq!(resolved.url.as_str(), "https://api.example.com/v1/users?count=20");
//! ```

use crate::error::RequestError;
use crate::request::{Body, Method};
use crate::wrapper::Wrapper;
use std::collections::BTreeMap;

/// Keyed updates: `Some` sets a value, `None` removes the key.
pub type Parameters = BTreeMap<String, Option<String>>;

/// Header fields applied by [`Composable::default_header`].
pub const DEFAULT_HEADER_FIELDS: [(&str, &str); 3] = [
    ("Accept", "application/json"),
    ("Accept-Language", "en-US"),
    ("Accept-Encoding", "gzip, deflate"),
];

/// A type whose outgoing request can be composed.
///
/// Every method consumes `self` and returns the updated value, so a
/// descriptor reachable through another binding is never affected.
pub trait Composable: Sized {
    /// Append path segments. `/` separates several segments at once.
    #[must_use]
    fn append(self, component: impl Into<String>) -> Self;

    /// Update query items. `None` removes every item.
    #[must_use]
    fn query(self, items: Option<Parameters>) -> Self;

    /// Set the HTTP method.
    #[must_use]
    fn method(self, method: Method) -> Self;

    /// Set the body.
    #[must_use]
    fn body(self, body: Body) -> Self;

    /// Update form body parameters. `None` empties the body.
    #[must_use]
    fn body_parameters(self, parameters: Option<Parameters>) -> Self;

    /// Update header fields. `None` removes every field.
    #[must_use]
    fn header(self, fields: Option<Parameters>) -> Self;

    /// Append every segment in order.
    #[must_use]
    fn path<I, S>(self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        components
            .into_iter()
            .fold(self, |composable, component| composable.append(component))
    }

    /// Set or remove a single query item.
    #[must_use]
    fn query_item(self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.query(Some(single(key, value)))
    }

    /// Replace every query item with `items`.
    #[must_use]
    fn replacing_query(self, items: Parameters) -> Self {
        self.query(None).query(Some(items))
    }

    /// Set or remove a single form body parameter.
    #[must_use]
    fn body_parameter(self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.body_parameters(Some(single(key, value)))
    }

    /// Set or remove a single header field.
    #[must_use]
    fn header_field(self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.header(Some(single(key, value)))
    }

    /// Apply [`DEFAULT_HEADER_FIELDS`].
    #[must_use]
    fn default_header(self) -> Self {
        self.header(Some(
            DEFAULT_HEADER_FIELDS
                .iter()
                .map(|(key, value)| ((*key).to_string(), Some((*value).to_string())))
                .collect(),
        ))
    }

    /// Use the encoded `value` as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a coding error if `value` cannot be encoded.
    fn json(self, value: &Wrapper) -> Result<Self, RequestError> {
        let data = value.encode()?;
        Ok(self
            .body(Body::Data(data))
            .header_field("Content-Type", Some("application/json")))
    }
}

fn single(key: impl Into<String>, value: Option<&str>) -> Parameters {
    std::iter::once((key.into(), value.map(str::to_string))).collect()
}

/// Implements [`Composable`] by forwarding every primitive to a field.
macro_rules! composable_via {
    ($field:ident) => {
        fn append(mut self, component: impl Into<String>) -> Self {
            self.$field = self.$field.append(component);
            self
        }

        fn query(mut self, items: Option<$crate::composable::Parameters>) -> Self {
            self.$field = self.$field.query(items);
            self
        }

        fn method(mut self, method: $crate::request::Method) -> Self {
            self.$field = self.$field.method(method);
            self
        }

        fn body(mut self, body: $crate::request::Body) -> Self {
            self.$field = self.$field.body(body);
            self
        }

        fn body_parameters(mut self, parameters: Option<$crate::composable::Parameters>) -> Self {
            self.$field = self.$field.body_parameters(parameters);
            self
        }

        fn header(mut self, fields: Option<$crate::composable::Parameters>) -> Self {
            self.$field = self.$field.header(fields);
            self
        }
    };
}

pub(crate) use composable_via;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::request::Request;
    use crate::wrapper;

    #[test]
    fn test_path_appends_each_segment() {
        let request = Request::new("https://example.com").path(["a", "b/c"]);
        assert_eq!(request.path_components(), ["a", "b", "c"]);
    }

    #[test]
    fn test_query_item_last_write_wins() {
        let request = Request::new("https://example.com")
            .query_item("page", Some("1"))
            .query_item("page", Some("2"))
            .query_item("count", Some("10"))
            .query_item("count", None);
        assert_eq!(request.query_items().len(), 1);
        assert_eq!(request.query_items()["page"], "2");
    }

    #[test]
    fn test_replacing_query_clears_first() {
        let request = Request::new("https://example.com")
            .query_item("a", Some("1"))
            .replacing_query([("b".to_string(), Some("2".to_string()))].into());
        assert!(!request.query_items().contains_key("a"));
        assert_eq!(request.query_items()["b"], "2");
    }

    #[test]
    fn test_default_header_goes_through_header() {
        let request = Request::new("https://example.com")
            .header_field("Accept", Some("text/plain"))
            .default_header();
        assert_eq!(request.header_fields()["Accept"], "application/json");
        assert_eq!(request.header_fields().len(), DEFAULT_HEADER_FIELDS.len());

        let cleared = request.header(None);
        assert!(cleared.header_fields().is_empty());
    }

    #[test]
    fn test_json_body() {
        let request = Request::new("https://example.com")
            .json(&wrapper!({ "userId": 1 }))
            .unwrap();
        assert_eq!(request.payload(), &Body::Data(br#"{"user_id":1}"#.to_vec()));
        assert_eq!(request.header_fields()["Content-Type"], "application/json");
    }

    #[test]
    fn test_composing_leaves_the_original_untouched() {
        let base = Request::new("https://example.com").append("users");
        let derived = base.clone().append("42").query_item("full", Some("1"));
        assert_eq!(base.path_components(), ["users"]);
        assert!(base.query_items().is_empty());
        assert_eq!(derived.path_components(), ["users", "42"]);
    }
}
