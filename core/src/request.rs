//! The concrete request descriptor and its resolution into an absolute request.

use crate::composable::{Composable, Parameters};
use crate::error::RequestError;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;
use url::form_urlencoded;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// `GET` without a body, `POST` otherwise
    #[default]
    Default,
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `CONNECT`
    Connect,
    /// `TRACE`
    Trace,
}

impl Method {
    /// The method actually sent, given whether a body is present.
    #[must_use]
    pub const fn resolve(self, has_body: bool) -> Self {
        match self {
            Self::Default if has_body => Self::Post,
            Self::Default => Self::Get,
            other => other,
        }
    }

    /// The method name. [`Method::Default`] reads as `GET`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default | Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    /// No body
    #[default]
    None,
    /// Raw bytes, sent as-is
    Data(Vec<u8>),
    /// Form parameters, sent `application/x-www-form-urlencoded`
    Parameters(BTreeMap<String, String>),
}

/// A request ready to be handed to a [`Requester`](crate::requester::Requester).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// The method to send, never [`Method::Default`]
    pub method: Method,
    /// Absolute URL, query included
    pub url: Url,
    /// Header fields
    pub header_fields: BTreeMap<String, String>,
    /// Encoded body
    pub body: Option<Vec<u8>>,
}

/// A type that can be resolved into a [`ResolvedRequest`].
pub trait Requestable {
    /// Resolve into an absolute request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Construction`] if no absolute URL can be built.
    fn request(&self) -> Result<ResolvedRequest, RequestError>;
}

/// An immutable description of an outgoing request.
///
/// The base URL is only validated on [`Requestable::request`], so
/// composition never fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    base: String,
    path: Vec<String>,
    query: BTreeMap<String, String>,
    method: Method,
    body: Body,
    header: BTreeMap<String, String>,
}

impl Request {
    /// A request targeting `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// The unresolved base URL.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path segments appended to the base URL.
    #[must_use]
    pub fn path_components(&self) -> &[String] {
        &self.path
    }

    /// Query items.
    #[must_use]
    pub const fn query_items(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// The requested method.
    #[must_use]
    pub const fn http_method(&self) -> Method {
        self.method
    }

    /// The body.
    #[must_use]
    pub const fn payload(&self) -> &Body {
        &self.body
    }

    /// Header fields.
    #[must_use]
    pub const fn header_fields(&self) -> &BTreeMap<String, String> {
        &self.header
    }
}

fn merge(target: &mut BTreeMap<String, String>, items: Option<Parameters>) {
    let Some(items) = items else {
        target.clear();
        return;
    };
    for (key, value) in items {
        match value {
            Some(value) => target.insert(key, value),
            None => target.remove(&key),
        };
    }
}

impl Composable for Request {
    fn append(mut self, component: impl Into<String>) -> Self {
        let component = component.into();
        self.path.extend(
            component
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        );
        self
    }

    fn query(mut self, items: Option<Parameters>) -> Self {
        merge(&mut self.query, items);
        self
    }

    fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    fn body_parameters(mut self, parameters: Option<Parameters>) -> Self {
        if parameters.is_none() {
            self.body = Body::None;
            return self;
        }
        let mut current = match std::mem::take(&mut self.body) {
            Body::Parameters(current) => current,
            Body::None | Body::Data(_) => BTreeMap::new(),
        };
        merge(&mut current, parameters);
        self.body = Body::Parameters(current);
        self
    }

    fn header(mut self, fields: Option<Parameters>) -> Self {
        merge(&mut self.header, fields);
        self
    }
}

impl Requestable for Request {
    fn request(&self) -> Result<ResolvedRequest, RequestError> {
        let mut url = Url::parse(&self.base).map_err(|e| {
            RequestError::Construction(format!("invalid base URL {:?}: {e}", self.base))
        })?;
        if !self.path.is_empty() {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RequestError::Construction(format!("{:?} cannot carry a path", self.base))
            })?;
            segments.pop_if_empty().extend(&self.path);
        }
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        let mut header_fields = self.header.clone();
        let body = match &self.body {
            Body::None => None,
            Body::Data(data) => Some(data.clone()),
            Body::Parameters(parameters) => {
                if !header_fields
                    .keys()
                    .any(|key| key.eq_ignore_ascii_case("Content-Type"))
                {
                    header_fields.insert(
                        "Content-Type".to_string(),
                        "application/x-www-form-urlencoded".to_string(),
                    );
                }
                Some(
                    form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(parameters)
                        .finish()
                        .into_bytes(),
                )
            },
        };

        Ok(ResolvedRequest {
            method: self.method.resolve(body.is_some()),
            url,
            header_fields,
            body,
        })
    }
}
