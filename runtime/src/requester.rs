//! A [`Requester`] backed by `reqwest`.

use crate::config::RequesterConfig;
use composable_request_core::request::ResolvedRequest;
use composable_request_core::requester::Delivery;
use composable_request_core::{Method, RequestError, Requester, TransportError};
use futures::StreamExt;
use reqwest::{Client, header};
use std::sync::Arc;

/// Executes requests over HTTP.
///
/// Cloning is cheap: clones share the connection pool and configuration.
/// Non-success statuses fail with [`RequestError::Status`]; network failures
/// and oversized responses fail with [`RequestError::Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
    config: Arc<RequesterConfig>,
}

impl Default for HttpRequester {
    fn default() -> Self {
        Self::new(RequesterConfig::default())
    }
}

impl HttpRequester {
    /// Create a requester with its own connection pool.
    #[must_use]
    pub fn new(config: RequesterConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create a requester sharing an existing `client`.
    #[must_use]
    pub fn with_client(client: Client, config: RequesterConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }
}

impl Requester for HttpRequester {
    fn execute(&self, request: ResolvedRequest) -> Delivery {
        Box::pin(send(self.client.clone(), Arc::clone(&self.config), request))
    }
}

const fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Default | Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Connect => reqwest::Method::CONNECT,
        Method::Trace => reqwest::Method::TRACE,
    }
}

#[tracing::instrument(
    name = "http_request",
    skip_all,
    fields(method = %request.method, url = %request.url)
)]
async fn send(
    client: Client,
    config: Arc<RequesterConfig>,
    request: ResolvedRequest,
) -> Result<Vec<u8>, RequestError> {
    let overrides = |name: &str| {
        request
            .header_fields
            .keys()
            .any(|key| key.eq_ignore_ascii_case(name))
    };

    let mut builder = client
        .request(method(request.method), request.url.clone())
        .timeout(config.timeout);
    if !overrides(header::USER_AGENT.as_str()) {
        builder = builder.header(header::USER_AGENT, &config.user_agent);
    }
    for (key, value) in &config.header_fields {
        if !overrides(key) {
            builder = builder.header(key, value);
        }
    }
    for (key, value) in &request.header_fields {
        builder = builder.header(key, value);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(TransportError::new)?;
    let status = response.status();
    let body = read_limited(response, config.max_response_bytes).await?;

    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "unexpected status");
        return Err(RequestError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    tracing::debug!(status = status.as_u16(), bytes = body.len(), "response received");
    Ok(body)
}

async fn read_limited(response: reqwest::Response, max: usize) -> Result<Vec<u8>, RequestError> {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(TransportError::new)?;
        if body.len() + chunk.len() > max {
            return Err(TransportError::msg(format!("response larger than {max} bytes")).into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
