use netapi_transport::{HttpStatusError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::context::ContextError;
use crate::state::ConnectionState;

/// Session error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SessionError {
    /// Neither the caller nor the options name a platform
    #[error("no platform type given and none configured (set network_os or platform_type)")]
    PlatformResolution,

    /// A platform was named but no handler is registered for it
    #[error("no platform handler registered for '{platform_type}'")]
    PlatformLoad { platform_type: String },

    /// Login failed
    #[error("authentication failed: {reason}")]
    Authentication {
        reason: String,
        #[source]
        source: Option<Box<SessionError>>,
    },

    /// The device could not be reached; never retried
    #[error("could not connect to {url}: {reason}")]
    ConnectionFailure { url: String, reason: String },

    /// The device answered with a non-success status the handler did not recover
    #[error(transparent)]
    HttpStatus(HttpStatusError),

    /// Lifecycle transition not allowed
    #[error("invalid connection state transition from {from} to {to}")]
    InvalidState {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// An auth header name or value cannot go on the wire
    #[error("invalid auth header '{name}'")]
    InvalidHeader { name: String },

    /// Platform handler reported a device-level failure
    #[error("{platform}: {message}")]
    Platform { platform: String, message: String },

    #[error("invalid play context: {0}")]
    Context(#[from] ContextError),

    /// TLS setup, malformed request or oversized response
    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Authentication failure without an underlying cause.
    #[must_use]
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn platform(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Platform {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// Wrap a login failure; authentication errors pass through unchanged.
    pub(crate) fn into_authentication(self) -> Self {
        match self {
            Self::Authentication { .. } => self,
            other => Self::Authentication {
                reason: "login failed".to_owned(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// The HTTP status error, if this is one.
    #[must_use]
    pub fn http_status(&self) -> Option<&HttpStatusError> {
        match self {
            Self::HttpStatus(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status(status) => Self::HttpStatus(status),
            TransportError::Network { url, reason, .. } => Self::ConnectionFailure { url, reason },
            other => Self::Transport(other),
        }
    }
}

impl From<HttpStatusError> for SessionError {
    fn from(err: HttpStatusError) -> Self {
        Self::HttpStatus(err)
    }
}
