//! Devices that hand out a session token from a login endpoint.
//!
//! Login POSTs `{"username": ..., "password": ...}` as JSON. The token is read
//! from the `X-Auth-Token` response header, or from a `token` or
//! `access_token` field of a JSON reply, and sent back as `X-Auth-Token`.
//! A device may rotate the token on any response.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use netapi_transport::ResponseMeta;
use netapi_utils::SecretString;
use serde::Serialize;

use crate::Result;
use crate::auth::AuthHeaders;
use crate::connection::{SendOptions, SessionConnection};
use crate::error::SessionError;
use crate::platform::PlatformHandler;

pub const NAME: &str = "token";

pub const DEFAULT_LOGIN_PATH: &str = "/api/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/api/logout";
pub const DEFAULT_TOKEN_HEADER: &str = "X-Auth-Token";

/// JSON reply fields that may carry the token, in lookup order.
const TOKEN_FIELDS: [&str; 2] = ["token", "access_token"];

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
pub struct TokenHandler {
    login_path: String,
    logout_path: String,
    token_header: String,
}

impl Default for TokenHandler {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            logout_path: DEFAULT_LOGOUT_PATH.to_owned(),
            token_header: DEFAULT_TOKEN_HEADER.to_owned(),
        }
    }
}

impl TokenHandler {
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    #[must_use]
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = header.into();
        self
    }

    fn json_post() -> SendOptions {
        SendOptions::new()
            .with_method(Method::POST)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    fn token_from_body(body: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        TOKEN_FIELDS
            .iter()
            .find_map(|field| value.get(field)?.as_str())
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
    }
}

impl PlatformHandler for TokenHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn login(
        &self,
        session: &mut SessionConnection,
        username: &str,
        password: Option<&SecretString>,
    ) -> Result<()> {
        let body = serde_json::to_vec(&LoginRequest {
            username,
            password: password.map_or("", SecretString::expose),
        })
        .map_err(|e| SessionError::platform(NAME, format!("cannot encode login request: {e}")))?;

        let (meta, _) = session.send(
            &self.login_path,
            Some(Bytes::from(body)),
            Some(0),
            &Self::json_post(),
        )?;

        if !meta.is_success() {
            return Err(SessionError::authentication(format!(
                "login rejected with {}",
                meta.status
            )));
        }
        if session.auth().is_empty() {
            return Err(SessionError::authentication(
                "login response carried no session token",
            ));
        }
        Ok(())
    }

    fn logout(&self, session: &mut SessionConnection) -> Result<()> {
        if session.auth().is_empty() {
            return Ok(());
        }
        session.send(&self.logout_path, None, Some(0), &Self::json_post())?;
        Ok(())
    }

    fn update_auth(&self, meta: &ResponseMeta, body: &[u8]) -> Option<AuthHeaders> {
        if !meta.is_success() {
            return None;
        }
        let token = meta
            .header(&self.token_header)
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .or_else(|| Self::token_from_body(body))?;
        Some(AuthHeaders::single(self.token_header.clone(), token))
    }
}
