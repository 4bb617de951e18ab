use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{AUTHORIZATION, HeaderName};
use http::{HeaderMap, HeaderValue, Method};
use netapi_utils::SecretString;

use crate::error::TransportError;

/// Per-attempt timeout used when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Username/password sent as `Authorization: Basic ...`.
///
/// `Debug` redacts the password.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: SecretString,
}

impl BasicAuth {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The encoded header value, marked sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidHeaderValue`] if the encoded value is
    /// not a valid header (cannot happen for base64 output, kept for API
    /// symmetry with other header builders).
    pub fn header_value(&self) -> Result<HeaderValue, TransportError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password.expose()));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password)
            .finish()
    }
}

/// Connection-level settings. Requests sharing these settings share a
/// client agent (see `UreqTransport`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportSettings {
    /// Verify the server certificate chain and hostname
    pub validate_certs: bool,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment
    pub use_proxy: bool,
    /// Proxy URL that overrides the environment
    pub proxy: Option<String>,
    /// TLS cipher suite allow-list (rustls suite names)
    pub ciphers: Option<Vec<String>>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            validate_certs: true,
            use_proxy: true,
            proxy: None,
            ciphers: None,
        }
    }
}

/// A single HTTP exchange to perform.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub settings: TransportSettings,
    pub basic_auth: Option<BasicAuth>,
}

impl TransportRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            settings: TransportSettings::default(),
            basic_auth: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TransportSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_basic_auth(mut self, auth: BasicAuth) -> Self {
        self.basic_auth = Some(auth);
        self
    }

    /// Headers as they go on the wire: request headers plus basic auth.
    ///
    /// # Errors
    ///
    /// Propagates [`BasicAuth::header_value`] failures.
    pub fn wire_headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = self.headers.clone();
        if let Some(auth) = &self.basic_auth {
            headers.insert(AUTHORIZATION, auth.header_value()?);
        }
        Ok(headers)
    }

    /// Whether the target URL uses TLS.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }
}
