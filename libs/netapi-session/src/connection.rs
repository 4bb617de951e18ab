use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use netapi_transport::{
    BasicAuth, HttpTransport, ResponseMeta, TransportError, TransportRequest, TransportResponse,
};
use netapi_utils::SecretString;

use crate::Result;
use crate::auth::{AuthHeaders, AuthSource, AuthState, Credentials};
use crate::config::ConnectionOptions;
use crate::context::PlayContext;
use crate::endpoint::Endpoint;
use crate::error::SessionError;
use crate::platform::{ErrorDisposition, PlatformHandler, PlatformRegistry};
use crate::state::ConnectionState;

/// Response body handed back by [`SessionConnection::send`], positioned at 0.
pub type ResponseBuffer = Cursor<Bytes>;

/// Per-call overrides for [`SessionConnection::send`]. Unset fields fall back
/// to the connection options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Defaults to POST with a body, GET without
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
    pub validate_certs: Option<bool>,
    pub use_proxy: Option<bool>,
    pub ciphers: Option<Vec<String>>,
}

impl SendOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = Some(validate);
        self
    }

    #[must_use]
    pub fn with_use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    #[must_use]
    pub fn with_ciphers(mut self, ciphers: Vec<String>) -> Self {
        self.ciphers = Some(ciphers);
        self
    }
}

/// One authenticated HTTP(S) API session to a device.
///
/// Connects lazily: the first [`send`](Self::send) resolves the platform
/// handler, sets up privilege escalation and authenticates.
///
/// `connect`, `send`, `close` and `update_play_context` take `&mut self`, so
/// calls on one connection never interleave. To share a connection between
/// threads wrap it in a `Mutex`.
pub struct SessionConnection {
    options: ConnectionOptions,
    endpoint: Endpoint,
    registry: Arc<PlatformRegistry>,
    transport: Arc<dyn HttpTransport>,
    handler: Option<Arc<dyn PlatformHandler>>,
    platform_type: Option<String>,
    state: ConnectionState,
    auth: AuthState,
    play_context: PlayContext,
    username: String,
    credentials: Credentials,
}

impl fmt::Debug for SessionConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConnection")
            .field("endpoint", &self.endpoint)
            .field("platform_type", &self.platform_type)
            .field("state", &self.state)
            .field("auth", &self.auth)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SessionConnection {
    #[must_use]
    pub fn new(
        options: ConnectionOptions,
        registry: Arc<PlatformRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let endpoint = options.endpoint();
        let username = options.username();
        let credentials = options.credentials();
        let play_context = PlayContext::from_options(&options);
        Self {
            options,
            endpoint,
            registry,
            transport,
            handler: None,
            platform_type: None,
            state: ConnectionState::Disconnected,
            auth: AuthState::default(),
            play_context,
            username,
            credentials,
        }
    }

    /// Bind the handler for `platform_type`, or for the configured platform
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PlatformResolution`] if no platform is given or
    /// configured and [`SessionError::PlatformLoad`] if the registry has no
    /// handler for it.
    pub fn resolve_platform(&mut self, platform_type: Option<&str>) -> Result<()> {
        let platform_type = platform_type
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| self.options.platform_type())
            .map(str::to_owned)
            .ok_or(SessionError::PlatformResolution)?;

        let handler = self
            .registry
            .resolve(&platform_type, &self.options)
            .ok_or_else(|| SessionError::PlatformLoad {
                platform_type: platform_type.clone(),
            })?;

        tracing::debug!(
            handler = handler.name(),
            platform_type = %platform_type,
            "loaded platform handler"
        );
        self.handler = Some(handler);
        self.platform_type = Some(platform_type);
        Ok(())
    }

    /// `scheme://host:port` of the device.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.endpoint.to_string()
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Authenticate unless already connected.
    ///
    /// Resolves the configured platform first if none is bound. A configured
    /// session key is adopted as-is; otherwise the handler logs in.
    ///
    /// # Errors
    ///
    /// Platform resolution errors pass through. Any login failure is reported
    /// as [`SessionError::Authentication`] and leaves the connection
    /// disconnected with no auth state.
    pub fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Ok(());
        }
        if self.handler.is_none() {
            self.resolve_platform(None)?;
        }
        let handler = self.bound_handler()?;

        tracing::info!(
            user = %self.username,
            url = %self.endpoint,
            platform = handler.name(),
            "establishing HTTP API connection"
        );
        self.state.transition(ConnectionState::Connecting)?;
        handler.set_become(&self.play_context);

        match self.authenticate(handler.as_ref()) {
            Ok(()) => {
                self.state.transition(ConnectionState::Connected)?;
                tracing::debug!(url = %self.endpoint, "connection established");
                Ok(())
            }
            Err(err) => {
                self.drop_session();
                tracing::debug!(url = %self.endpoint, error = %err, "login failed");
                Err(err.into_authentication())
            }
        }
    }

    fn authenticate(&mut self, handler: &dyn PlatformHandler) -> Result<()> {
        match &self.credentials {
            Credentials::SessionKey(key) => {
                let key = key.clone();
                tracing::debug!(headers = key.len(), "using session key");
                self.auth.adopt_session_key(key);
                Ok(())
            }
            Credentials::Password { username, password } => {
                let (username, password) = (username.clone(), password.clone());
                tracing::debug!(user = %username, platform = handler.name(), "logging in");
                handler.login(self, &username, password.as_ref())
            }
        }
    }

    /// Log out and drop the session. No-op unless connected.
    ///
    /// Logout failures are logged and otherwise ignored; the transport is
    /// reset and the auth state cleared regardless.
    pub fn close(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        if let Some(handler) = self.handler.clone()
            && let Err(err) = handler.logout(self)
        {
            tracing::warn!(platform = handler.name(), error = %err, "logout failed");
        }

        self.transport.reset();
        self.drop_session();
        tracing::info!(url = %self.endpoint, "connection closed");
    }

    /// Send a request to `path` (relative to [`base_url`](Self::base_url)),
    /// connecting first if needed.
    ///
    /// `retries` bounds how often a request the handler deems recoverable is
    /// sent again: `None` retries without limit (each attempt is still bounded
    /// by the request timeout), `Some(0)` never retries.
    ///
    /// # Errors
    ///
    /// - connect errors, see [`connect`](Self::connect)
    /// - [`SessionError::HttpStatus`] when the handler gives up on a status
    ///   or the retry budget is spent
    /// - [`SessionError::ConnectionFailure`] when the device is unreachable
    ///   (never retried)
    /// - errors returned by the handler's error hook; an
    ///   [`SessionError::Authentication`] from a failed re-login also
    ///   disconnects the session
    pub fn send(
        &mut self,
        path: &str,
        body: Option<Bytes>,
        retries: Option<u32>,
        options: &SendOptions,
    ) -> Result<(ResponseMeta, ResponseBuffer)> {
        self.ensure_connected()?;
        let handler = self.bound_handler()?;
        let template = self.request_template(&self.endpoint.url(path), body, options);

        let mut remaining = retries;
        let mut attempt: u32 = 0;
        let response = loop {
            attempt = attempt.saturating_add(1);
            let request = self.authorized(&template)?;
            tracing::trace!(
                attempt,
                method = %request.method,
                url = %request.url,
                body_len = request.body.as_ref().map_or(0, Bytes::len),
                "sending request"
            );

            let error = match self.transport.request(&request) {
                Ok(response) => break response,
                Err(TransportError::Status(error)) => error,
                Err(other) => return Err(other.into()),
            };

            let disposition = match handler.handle_http_error(self, &error) {
                Ok(disposition) => disposition,
                Err(err @ SessionError::Authentication { .. }) => {
                    self.drop_session();
                    tracing::debug!(url = %self.endpoint, error = %err, "re-login failed");
                    return Err(err);
                }
                Err(err) => return Err(err),
            };
            match disposition {
                ErrorDisposition::Substitute(response) => break response,
                ErrorDisposition::Fail => return Err(error.into()),
                ErrorDisposition::Retry => match remaining {
                    Some(0) => return Err(error.into()),
                    Some(n) => remaining = Some(n - 1),
                    None => {}
                },
            }
            tracing::debug!(
                attempt,
                status = error.status().as_u16(),
                url = %error.url(),
                remaining = %RetryBudget(remaining),
                "retrying request"
            );
        };

        Ok(self.finish(handler.as_ref(), response))
    }

    fn finish(
        &mut self,
        handler: &dyn PlatformHandler,
        response: TransportResponse,
    ) -> (ResponseMeta, ResponseBuffer) {
        let (meta, body) = response.into_parts();
        tracing::trace!(status = meta.status.as_u16(), body_len = body.len(), "response received");

        if let Some(headers) = handler.update_auth(&meta, &body) {
            tracing::debug!(
                headers = %headers.names().collect::<Vec<_>>().join(","),
                "auth headers updated"
            );
            self.auth.replace(headers, AuthSource::Handler);
        }
        (meta, Cursor::new(body))
    }

    /// Forget the auth state and fall back to `Disconnected`, so the next
    /// `send` connects again.
    fn drop_session(&mut self) {
        self.auth.clear();
        self.state = ConnectionState::Disconnected;
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.state.accepts_requests() {
            return Ok(());
        }
        self.connect()
    }

    fn bound_handler(&self) -> Result<Arc<dyn PlatformHandler>> {
        self.handler
            .clone()
            .ok_or(SessionError::PlatformResolution)
    }

    fn request_template(
        &self,
        url: &str,
        body: Option<Bytes>,
        options: &SendOptions,
    ) -> TransportRequest {
        let method = options.method.clone().unwrap_or(if body.is_some() {
            Method::POST
        } else {
            Method::GET
        });

        let mut settings = self.options.transport_settings();
        if let Some(validate) = options.validate_certs {
            settings.validate_certs = validate;
        }
        if let Some(use_proxy) = options.use_proxy {
            settings.use_proxy = use_proxy;
        }
        if let Some(ciphers) = &options.ciphers {
            settings.ciphers = Some(ciphers.clone());
        }

        let mut request = TransportRequest::new(method, url)
            .with_timeout(options.timeout.unwrap_or(self.options.command_timeout))
            .with_settings(settings);
        request.headers = options.headers.clone();
        request.body = body;
        request
    }

    /// Copy of `template` carrying the current auth: auth headers when
    /// present, basic auth otherwise.
    fn authorized(&self, template: &TransportRequest) -> Result<TransportRequest> {
        let mut request = template.clone();
        if self.auth.is_empty() {
            let (username, password) = self.login_credentials();
            if let Some(password) = password {
                request.basic_auth = Some(BasicAuth::new(username, password));
            }
        } else {
            self.auth.headers().apply(&mut request.headers)?;
        }
        Ok(request)
    }

    /// Replace the play context from an encoded blob, telling the handler
    /// when `become` toggles.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Context`] if the blob cannot be decoded; the
    /// current context is kept.
    pub fn update_play_context(&mut self, blob: &[u8]) -> Result<()> {
        let context = PlayContext::decode(blob)?;

        if context.become_enabled != self.play_context.become_enabled
            && let Some(handler) = &self.handler
        {
            if context.become_enabled {
                tracing::debug!(method = %context.become_method, "authorizing connection");
            } else {
                tracing::debug!("deauthorizing connection");
            }
            handler.set_become(&context);
        }

        self.play_context = context;
        Ok(())
    }

    /// Plain GET of the base URL to check that the device answers.
    ///
    /// No auth, no retries, no connect.
    ///
    /// # Errors
    ///
    /// The transport error, unmodified, including HTTP error statuses.
    pub fn probe_reachability(&self, timeout: Duration) -> Result<ResponseMeta, TransportError> {
        let request = TransportRequest::get(self.base_url())
            .with_timeout(timeout)
            .with_settings(self.options.transport_settings());
        let (meta, _) = self.transport.request(&request)?.into_parts();
        Ok(meta)
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Install auth headers obtained by a handler.
    pub fn set_auth(&mut self, headers: AuthHeaders) {
        self.auth.replace(headers, AuthSource::Handler);
    }

    pub fn clear_auth(&mut self) {
        self.auth.clear();
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    #[must_use]
    pub fn play_context(&self) -> &PlayContext {
        &self.play_context
    }

    /// Identifier the bound handler was resolved from.
    #[must_use]
    pub fn platform_type(&self) -> Option<&str> {
        self.platform_type.as_deref()
    }

    #[must_use]
    pub fn platform(&self) -> Option<&Arc<dyn PlatformHandler>> {
        self.handler.as_ref()
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Username and password for a (re-)login.
    pub(crate) fn login_credentials(&self) -> (String, Option<SecretString>) {
        match &self.credentials {
            Credentials::Password { username, password } => (username.clone(), password.clone()),
            Credentials::SessionKey(_) => (self.username.clone(), None),
        }
    }
}

struct RetryBudget(Option<u32>);

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("unbounded"),
        }
    }
}
