use std::collections::BTreeMap;
use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue};
use netapi_utils::SecretString;
use serde::Deserialize;

use crate::error::SessionError;

/// Authentication headers: header name to secret value.
///
/// `Debug` lists header names only.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AuthHeaders(BTreeMap<String, SecretString>);

impl AuthHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single header, e.g. `X-Auth-Token: <token>`.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        let mut headers = Self::new();
        headers.insert(name, value);
        headers
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SecretString>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecretString> {
        self.0.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &SecretString)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write every header into `headers`, replacing same-named entries.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidHeader`] for a name or value that is not
    /// a valid HTTP header. The value is never included in the error.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        for (name, value) in &self.0 {
            let invalid = || SessionError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let mut header_value =
                HeaderValue::from_str(value.expose()).map_err(|_| invalid())?;
            header_value.set_sensitive(true);
            headers.insert(header_name, header_value);
        }
        Ok(())
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl<K: Into<String>, V: Into<SecretString>> FromIterator<(K, V)> for AuthHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Where the active auth headers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Pre-shared session key from configuration
    SessionKey,
    /// Issued by the device and picked up by the platform handler
    Handler,
}

/// Active authentication of a connection.
///
/// Empty until login or session-key adoption; replaced whenever the handler
/// reports refreshed headers; cleared on close.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    headers: AuthHeaders,
    source: Option<AuthSource>,
}

impl AuthState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    #[must_use]
    pub fn headers(&self) -> &AuthHeaders {
        &self.headers
    }

    #[must_use]
    pub fn source(&self) -> Option<AuthSource> {
        self.source
    }

    pub(crate) fn adopt_session_key(&mut self, key: AuthHeaders) {
        self.replace(key, AuthSource::SessionKey);
    }

    pub(crate) fn replace(&mut self, headers: AuthHeaders, source: AuthSource) {
        self.source = (!headers.is_empty()).then_some(source);
        self.headers = headers;
    }

    pub(crate) fn clear(&mut self) {
        self.headers = AuthHeaders::new();
        self.source = None;
    }
}

/// The credential a connection authenticates with. A configured session key
/// wins over a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    SessionKey(AuthHeaders),
    Password {
        username: String,
        password: Option<SecretString>,
    },
}
