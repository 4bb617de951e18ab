//! Connection options and how they are loaded.
//!
//! Sources, later wins:
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. `NETAPI_*` environment variables (`__` separates nested keys)

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use netapi_transport::{DEFAULT_MAX_BODY_BYTES, TransportSettings};
use netapi_utils::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthHeaders, Credentials};
use crate::endpoint::{Endpoint, Scheme};

/// Prefix of environment variables read by [`ConnectionOptions::load`].
pub const ENV_PREFIX: &str = "NETAPI_";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BECOME_METHOD: &str = "sudo";

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to load connection options: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid connection options: {0}")]
    Invalid(String),
}

/// TLS cipher allow-list: a list, or one `:`-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Ciphers {
    List(Vec<String>),
    Joined(String),
}

impl Ciphers {
    /// Individual suite names, blanks dropped.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            Self::List(list) => list.iter().map(String::as_str).collect(),
            Self::Joined(joined) => joined.split(':').collect(),
        };
        names
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Everything a [`SessionConnection`](crate::SessionConnection) needs to know
/// about the device and how to reach it. Read-only to the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConnectionOptions {
    /// Device FQDN or IP address
    pub host: String,
    /// Explicit port; 80 or 443 by `use_ssl` when unset or 0
    pub port: Option<u16>,
    /// Platform identifier, checked first
    pub network_os: Option<String>,
    /// Platform identifier, used when `network_os` is unset
    pub platform_type: Option<String>,
    /// Login user; the OS user when unset
    pub remote_user: Option<String>,
    pub password: Option<SecretString>,
    /// Pre-shared auth headers; when set, `password` is ignored
    pub session_key: Option<AuthHeaders>,
    pub use_ssl: bool,
    pub validate_certs: bool,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`
    pub use_proxy: bool,
    /// Proxy for every request of the connection
    pub explicit_proxy: Option<String>,
    pub ciphers: Option<Ciphers>,
    #[serde(rename = "become")]
    pub become_enabled: bool,
    pub become_method: String,
    #[serde(deserialize_with = "netapi_utils::duration_serde::deserialize")]
    pub command_timeout: Duration,
    /// Timeout for reachability probes
    #[serde(deserialize_with = "netapi_utils::duration_serde::deserialize")]
    pub connect_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: None,
            network_os: None,
            platform_type: None,
            remote_user: None,
            password: None,
            session_key: None,
            use_ssl: false,
            validate_certs: true,
            use_proxy: true,
            explicit_proxy: None,
            ciphers: None,
            become_enabled: false,
            become_method: DEFAULT_BECOME_METHOD.to_owned(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ConnectionOptions {
    /// Options for `host` with every other field at its default.
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Load from an optional YAML file and `NETAPI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if `path` does not exist,
    /// [`ConfigError::Load`] on parse or type errors and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(&figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate options from a prepared figment.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let options: Self = figment.extract().map_err(Box::new)?;
        options.validate()?;
        Ok(options)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty host, a zero timeout or
    /// a zero body limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_owned()));
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "command_timeout must be greater than zero".to_owned(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect_timeout must be greater than zero".to_owned(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Configured platform: `network_os`, then `platform_type`.
    #[must_use]
    pub fn platform_type(&self) -> Option<&str> {
        [self.network_os.as_deref(), self.platform_type.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    /// Login user, falling back to the current OS user.
    #[must_use]
    pub fn username(&self) -> String {
        self.remote_user
            .clone()
            .filter(|user| !user.is_empty())
            .unwrap_or_else(whoami::username)
    }

    /// The active credential: a non-empty session key wins over the password.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        match &self.session_key {
            Some(key) if !key.is_empty() => Credentials::SessionKey(key.clone()),
            _ => Credentials::Password {
                username: self.username(),
                password: self.password.clone(),
            },
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(Scheme::from_use_ssl(self.use_ssl), self.host.trim(), self.port)
    }

    #[must_use]
    pub fn cipher_list(&self) -> Option<Vec<String>> {
        self.ciphers
            .as_ref()
            .map(Ciphers::to_list)
            .filter(|list| !list.is_empty())
    }

    /// Transport settings shared by every request of the connection.
    #[must_use]
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            validate_certs: self.validate_certs,
            use_proxy: self.use_proxy,
            proxy: self.explicit_proxy.clone().filter(|p| !p.is_empty()),
            ciphers: self.cipher_list(),
        }
    }
}
