#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated HTTP(S) API sessions to network devices
//!
//! A [`SessionConnection`] owns one logical session to a device:
//! - the [`Endpoint`] derived from [`ConnectionOptions`]
//! - the active [`AuthState`] (session key or handler-issued token headers)
//! - the [`ConnectionState`] lifecycle
//! - a [`PlatformHandler`] resolved by name from a [`PlatformRegistry`]
//!
//! Device specifics (login flow, token refresh, which HTTP errors are worth a
//! retry) live in the handler. The connection runs the request loop and asks
//! the handler at each decision point.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use netapi_session::{ConnectionOptions, PlatformRegistry, SendOptions, SessionConnection};
//! use netapi_transport::UreqTransport;
//!
//! let options = ConnectionOptions::load(Some("device.yaml".as_ref()))?;
//! let mut conn = SessionConnection::new(
//!     options,
//!     Arc::new(PlatformRegistry::with_builtin()),
//!     Arc::new(UreqTransport::new()),
//! );
//! let (meta, body) = conn.send("/restconf/data", None, Some(3), &SendOptions::default())?;
//! conn.close();
//! ```

mod auth;
pub mod config;
mod connection;
pub mod context;
mod endpoint;
mod error;
mod platform;
pub mod platforms;
mod state;

pub use auth::{AuthHeaders, AuthSource, AuthState, Credentials};
pub use config::{Ciphers, ConfigError, ConnectionOptions};
pub use connection::{ResponseBuffer, SendOptions, SessionConnection};
pub use context::{ContextError, PlayContext};
pub use endpoint::{Endpoint, Scheme};
pub use error::SessionError;
pub use platform::{
    ErrorDisposition, PlatformFactory, PlatformHandler, PlatformRegistry, default_http_error_policy,
};
pub use state::ConnectionState;

/// Result alias for session operations.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
