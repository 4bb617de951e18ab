use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;

use crate::error::{HttpStatusError, TransportError};
use crate::request::{TransportRequest, TransportSettings};
use crate::response::{ResponseMeta, TransportResponse};
use crate::tls;
use crate::transport::HttpTransport;

/// Default response body limit (64 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// User agent sent on every request.
pub const DEFAULT_USER_AGENT: &str = concat!("netapi/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AgentKey {
    settings: TransportSettings,
    tls: bool,
}

/// [`HttpTransport`] backed by a blocking `ureq` agent.
///
/// One agent (and its connection pool) is kept per distinct
/// [`TransportSettings`], so requests of one session reuse connections while
/// sessions with different TLS or proxy settings never share a pool.
/// [`reset`](HttpTransport::reset) drops every cached agent.
pub struct UreqTransport {
    agents: Mutex<HashMap<AgentKey, ureq::Agent>>,
    max_body_bytes: usize,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("cached_agents", &self.agents.lock().len())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl UreqTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject response bodies larger than `limit` bytes.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn agent(&self, request: &TransportRequest) -> Result<ureq::Agent, TransportError> {
        let key = AgentKey {
            settings: request.settings.clone(),
            tls: request.is_https(),
        };

        let mut agents = self.agents.lock();
        if let Some(agent) = agents.get(&key) {
            return Ok(agent.clone());
        }

        let agent = build_agent(&key)?;
        tracing::debug!(
            validate_certs = key.settings.validate_certs,
            use_proxy = key.settings.use_proxy,
            explicit_proxy = key.settings.proxy.is_some(),
            tls = key.tls,
            "created HTTP agent"
        );
        agents.insert(key, agent.clone());
        Ok(agent)
    }

    fn read_body(&self, url: &str, response: ureq::Response) -> Result<Bytes, TransportError> {
        let limit = self.max_body_bytes;
        let mut buf = Vec::new();
        response
            .into_reader()
            .take(u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|source| TransportError::Body {
                url: url.to_owned(),
                source,
            })?;

        if buf.len() > limit {
            return Err(TransportError::BodyTooLarge {
                url: url.to_owned(),
                limit,
            });
        }
        Ok(Bytes::from(buf))
    }

    fn buffer_response(
        &self,
        response: ureq::Response,
    ) -> Result<TransportResponse, TransportError> {
        let meta = response_meta(&response)?;
        let body = self.read_body(&meta.url, response)?;
        Ok(TransportResponse::new(meta, body))
    }
}

fn build_agent(key: &AgentKey) -> Result<ureq::Agent, TransportError> {
    let settings = &key.settings;
    let mut builder = ureq::AgentBuilder::new()
        .user_agent(DEFAULT_USER_AGENT)
        .try_proxy_from_env(settings.use_proxy && settings.proxy.is_none());

    if settings.use_proxy
        && let Some(proxy) = &settings.proxy
    {
        let proxy = ureq::Proxy::new(proxy)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid proxy {proxy}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    if key.tls {
        let config = tls::client_config(settings.validate_certs, settings.ciphers.as_deref())?;
        builder = builder.tls_config(Arc::new(config));
    }

    Ok(builder.build())
}

fn response_meta(response: &ureq::Response) -> Result<ResponseMeta, TransportError> {
    let status = StatusCode::from_u16(response.status()).map_err(|e| {
        TransportError::InvalidRequest(format!("invalid status {}: {e}", response.status()))
    })?;

    let mut headers = HeaderMap::new();
    for name in response.headers_names() {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::trace!(header = %name, "skipping invalid response header name");
            continue;
        };
        for value in response.all(&name) {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(header_name.clone(), value);
            }
        }
    }

    Ok(ResponseMeta::new(response.get_url(), status, headers))
}

fn map_transport_error(url: &str, err: ureq::Transport) -> TransportError {
    match err.kind() {
        ureq::ErrorKind::InvalidUrl
        | ureq::ErrorKind::UnknownScheme
        | ureq::ErrorKind::InvalidProxyUrl => {
            TransportError::InvalidRequest(format!("{url}: {err}"))
        }
        _ => TransportError::Network {
            url: url.to_owned(),
            reason: err.to_string(),
            source: Some(Box::new(err)),
        },
    }
}

impl HttpTransport for UreqTransport {
    fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let agent = self.agent(request)?;

        let mut call = agent
            .request(request.method.as_str(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.wire_headers()? {
            let value = value.to_str().map_err(|_| {
                TransportError::InvalidRequest(format!("header {name} is not visible ASCII"))
            })?;
            call = call.set(name.as_str(), value);
        }

        tracing::trace!(
            method = %request.method,
            url = %request.url,
            body_len = request.body.as_ref().map_or(0, Bytes::len),
            "sending HTTP request"
        );

        let result = match &request.body {
            Some(body) => call.send_bytes(body),
            None => call.call(),
        };

        match result {
            Ok(response) => self.buffer_response(response),
            Err(ureq::Error::Status(_, response)) => {
                let response = self.buffer_response(response)?;
                let (meta, body) = response.into_parts();
                Err(HttpStatusError::new(meta, body).into())
            }
            Err(ureq::Error::Transport(err)) => Err(map_transport_error(&request.url, err)),
        }
    }

    fn reset(&self) {
        let dropped = {
            let mut agents = self.agents.lock();
            let n = agents.len();
            agents.clear();
            n
        };
        tracing::debug!(dropped, "dropped cached HTTP agents");
    }
}
