use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Response metadata: everything but the body.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    /// Final URL of the exchange (after redirects)
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    #[must_use]
    pub fn new(url: impl Into<String>, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
        }
    }

    /// First value of `name` as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub meta: ResponseMeta,
    pub body: Bytes,
}

impl TransportResponse {
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
    pub fn into_parts(self) -> (ResponseMeta, Bytes) {
        (self.meta, self.body)
    }
}
