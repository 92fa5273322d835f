//! Error types shared by every stage of a request chain.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while encoding or decoding a [`Wrapper`](crate::wrapper::Wrapper).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodingError {
    /// A leaf could not be represented on the wire
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// The payload was corrupted or did not match any supported shape
    #[error("Decoding failed: {0}")]
    Decoding(String),
}

/// Opaque failure produced by a [`Requester`](crate::requester::Requester).
///
/// The wrapped error is never inspected, only displayed and carried
/// through the failure channel of a chain.
#[derive(Clone)]
pub struct TransportError(Arc<dyn std::error::Error + Send + Sync>);

impl TransportError {
    /// Wrap any error coming from the transport layer.
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// Wrap a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(Message(message.into())))
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportError")
            .field(&self.0.to_string())
            .finish()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

#[derive(Error, Debug)]
#[error("{0}")]
struct Message(String);

/// The failure type flowing through every request chain.
#[derive(Error, Debug, Clone)]
pub enum RequestError {
    /// The descriptor could not be resolved into an absolute request
    #[error("Invalid request: {0}")]
    Construction(String),

    /// A payload could not be encoded or decoded
    #[error(transparent)]
    Coding(#[from] CodingError),

    /// The executor failed to deliver a response
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },

    /// A failure raised by a user-provided transform
    #[error("{0}")]
    Custom(String),
}

impl RequestError {
    /// Build a [`RequestError::Custom`] from any message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Whether this error came from the transport layer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Shorthand for results carrying a [`RequestError`].
pub type Result<T, E = RequestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_opaque_but_displayable() {
        let error = RequestError::from(TransportError::msg("connection reset"));
        assert!(error.is_transport());
        assert_eq!(error.to_string(), "Transport failed: connection reset");
    }

    #[test]
    fn test_coding_error_is_transparent() {
        let error = RequestError::from(CodingError::Decoding("eof".to_string()));
        assert_eq!(error.to_string(), "Decoding failed: eof");
    }
}
