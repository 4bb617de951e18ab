use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use netapi_transport::{HttpStatusError, ResponseMeta, TransportResponse};
use netapi_utils::SecretString;

use crate::Result;
use crate::auth::{AuthHeaders, AuthSource};
use crate::config::ConnectionOptions;
use crate::connection::SessionConnection;
use crate::context::PlayContext;
use crate::error::SessionError;

/// What the request loop does with a failed HTTP exchange.
#[derive(Debug, Clone)]
pub enum ErrorDisposition {
    /// Recoverable; send the request again (subject to the retry budget)
    Retry,
    /// Not recoverable; surface the original error
    Fail,
    /// Treat this response as the outcome of the request
    Substitute(TransportResponse),
}

/// Device-specific session behaviour.
///
/// Every method has a default suited to devices that take HTTP basic auth on
/// each request and need no login exchange.
///
/// Methods that receive the session may issue requests through
/// [`SessionConnection::send`]; the session is in the
/// [`Connecting`](crate::ConnectionState::Connecting) state during `login`, so
/// such requests do not trigger another connect.
pub trait PlatformHandler: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Prepare privilege escalation for subsequent operations. Called on
    /// connect before `login` and whenever the play context toggles `become`.
    fn set_become(&self, _context: &PlayContext) {}

    /// Obtain a session from the device.
    ///
    /// On success the session's auth state is expected to be populated,
    /// usually by [`update_auth`](Self::update_auth) seeing the login
    /// response, unless the platform authenticates with basic auth throughout.
    ///
    /// # Errors
    ///
    /// Any error fails the connect with [`SessionError::Authentication`].
    fn login(
        &self,
        _session: &mut SessionConnection,
        _username: &str,
        _password: Option<&SecretString>,
    ) -> Result<()> {
        Ok(())
    }

    /// Best-effort session invalidation on close.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller and otherwise ignored.
    fn logout(&self, _session: &mut SessionConnection) -> Result<()> {
        Ok(())
    }

    /// Decide what to do about a non-success response.
    ///
    /// Default: a 401 while holding handler-issued auth headers clears them,
    /// logs in again and retries; a 401 without auth headers or with a
    /// session key fails; any other status is handed back to the caller as
    /// the response.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Authentication`] if the re-login fails.
    fn handle_http_error(
        &self,
        session: &mut SessionConnection,
        error: &HttpStatusError,
    ) -> Result<ErrorDisposition> {
        default_http_error_policy(self, session, error)
    }

    /// Inspect a successful response for new or refreshed auth headers.
    ///
    /// `Some` replaces the session's auth state, `None` keeps it.
    fn update_auth(&self, _meta: &ResponseMeta, _body: &[u8]) -> Option<AuthHeaders> {
        None
    }
}

/// The stock reaction to a failed exchange, for handlers that override
/// [`PlatformHandler::handle_http_error`] and want to fall back to it.
///
/// - 401 while holding handler-issued auth headers: clear them, log in
///   again, [`Retry`]
/// - 401 without auth headers, or with a configured session key: [`Fail`]
/// - anything else: [`Substitute`] the error response
///
/// [`Retry`]: ErrorDisposition::Retry
/// [`Fail`]: ErrorDisposition::Fail
/// [`Substitute`]: ErrorDisposition::Substitute
///
/// # Errors
///
/// Returns [`SessionError::Authentication`] if the re-login fails.
pub fn default_http_error_policy<H>(
    handler: &H,
    session: &mut SessionConnection,
    error: &HttpStatusError,
) -> Result<ErrorDisposition>
where
    H: PlatformHandler + ?Sized,
{
    if error.status() != StatusCode::UNAUTHORIZED {
        return Ok(ErrorDisposition::Substitute(error.to_response()));
    }
    // A session key is fixed for the life of the connection; logging in
    // again cannot replace it.
    if session.auth().is_empty() || session.auth().source() == Some(AuthSource::SessionKey) {
        return Ok(ErrorDisposition::Fail);
    }

    tracing::debug!(platform = handler.name(), "auth rejected, logging in again");
    session.clear_auth();
    let (username, password) = session.login_credentials();
    handler
        .login(session, &username, password.as_ref())
        .map_err(SessionError::into_authentication)?;
    Ok(ErrorDisposition::Retry)
}

/// Builds a handler for one connection.
pub type PlatformFactory =
    Arc<dyn Fn(&ConnectionOptions) -> Arc<dyn PlatformHandler> + Send + Sync>;

/// Platform identifier to handler factory.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    factories: HashMap<String, PlatformFactory>,
}

impl fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PlatformRegistry")
            .field("factories", &names)
            .finish()
    }
}

impl PlatformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in platforms (see [`crate::platforms`]).
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::platforms::register_builtin(&mut registry);
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ConnectionOptions) -> Arc<dyn PlatformHandler> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a shared handler instance returned for every connection.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn PlatformHandler>) {
        self.register(name, move |_: &ConnectionOptions| Arc::clone(&handler));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Handler for `platform_type`.
    ///
    /// A namespaced identifier such as `vendor.collection.restconf` falls back
    /// to its last segment.
    #[must_use]
    pub fn resolve(
        &self,
        platform_type: &str,
        options: &ConnectionOptions,
    ) -> Option<Arc<dyn PlatformHandler>> {
        let factory = self.factories.get(platform_type).or_else(|| {
            platform_type
                .rsplit_once('.')
                .and_then(|(_, short)| self.factories.get(short))
        })?;
        Some(factory(options))
    }
}
