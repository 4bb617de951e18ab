use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::response::{ResponseMeta, TransportResponse};
use crate::security::body_preview;

/// A device answered with a non-success HTTP status.
///
/// Carries the complete response so that a platform handler can inspect it,
/// and so that it can stand in as the response itself
/// (see [`to_response`](Self::to_response)).
#[derive(Debug, Clone)]
pub struct HttpStatusError {
    meta: ResponseMeta,
    body: Bytes,
}

impl HttpStatusError {
    #[must_use]
    pub fn new(meta: ResponseMeta, body: impl Into<Bytes>) -> Self {
        Self {
            meta,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.meta.status
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.meta.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.meta.headers
    }

    #[must_use]
    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The failed exchange as a regular response (cheap: the body is shared).
    #[must_use]
    pub fn to_response(&self) -> TransportResponse {
        TransportResponse::new(self.meta.clone(), self.body.clone())
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}", self.meta.status, self.meta.url)?;
        if !self.body.is_empty() {
            write!(f, ": {}", body_preview(&self.body))?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpStatusError {}

/// Transport error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// HTTP non-2xx status
    #[error(transparent)]
    Status(#[from] HttpStatusError),

    /// DNS, connect, reset, timeout: the device could not be reached
    #[error("could not connect to {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// TLS client configuration could not be built
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Malformed URL, proxy or header
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid header value
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Response body exceeded size limit
    #[error("response body from {url} exceeds limit of {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },

    /// Reading the response body failed midway
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Network failure without an underlying error value.
    #[must_use]
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// The HTTP status error, if this is one.
    #[must_use]
    pub fn as_status(&self) -> Option<&HttpStatusError> {
        match self {
            Self::Status(err) => Some(err),
            _ => None,
        }
    }
}
