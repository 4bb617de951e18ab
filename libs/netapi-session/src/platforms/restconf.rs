//! RESTCONF (RFC 8040) devices.
//!
//! Authentication is HTTP basic auth on every request, so the handler keeps
//! all the default policies. The module also carries JSON helpers for the
//! RESTCONF datastore.

use std::io::Read;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Method};
use netapi_transport::security::body_preview;
use serde_json::Value;

use crate::Result;
use crate::connection::{SendOptions, SessionConnection};
use crate::error::SessionError;
use crate::platform::PlatformHandler;

pub const NAME: &str = "restconf";

/// Root of the RESTCONF API on the device.
pub const RESTCONF_ROOT: &str = "/restconf";

/// Media type for YANG data encoded as JSON.
pub const YANG_DATA_JSON: &str = "application/yang-data+json";

#[derive(Debug, Clone, Copy, Default)]
pub struct RestconfHandler;

impl PlatformHandler for RestconfHandler {
    fn name(&self) -> &str {
        NAME
    }
}

fn resource_path(path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.starts_with("restconf/") || path == "restconf" {
        format!("/{path}")
    } else {
        format!("{RESTCONF_ROOT}/{path}")
    }
}

/// Send a RESTCONF request and decode the JSON reply.
///
/// `path` is relative to [`RESTCONF_ROOT`] unless it already starts with it.
/// An empty reply (e.g. `204 No Content`) yields `None`.
///
/// # Errors
///
/// - [`SessionError::Platform`] for a non-success status or a reply that is
///   not JSON
/// - any error from [`SessionConnection::send`]
pub fn request(
    session: &mut SessionConnection,
    method: Method,
    path: &str,
    content: Option<&Value>,
) -> Result<Option<Value>> {
    let mut options = SendOptions::new()
        .with_method(method)
        .with_header(ACCEPT, HeaderValue::from_static(YANG_DATA_JSON));
    let body = match content {
        Some(content) => {
            options = options.with_header(CONTENT_TYPE, HeaderValue::from_static(YANG_DATA_JSON));
            Some(Bytes::from(serde_json::to_vec(content).map_err(|e| {
                SessionError::platform(NAME, format!("cannot encode request: {e}"))
            })?))
        }
        None => None,
    };

    let (meta, mut reader) = session.send(&resource_path(path), body, None, &options)?;
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|e| SessionError::platform(NAME, format!("cannot read reply: {e}")))?;

    if !meta.is_success() {
        return Err(SessionError::platform(
            NAME,
            format!("{} {}: {}", meta.status, meta.url, body_preview(&raw)),
        ));
    }
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| SessionError::platform(NAME, format!("reply is not JSON: {e}")))
}

/// `GET` a datastore resource, e.g. `data/ietf-interfaces:interfaces`.
///
/// # Errors
///
/// See [`request`].
pub fn get(session: &mut SessionConnection, path: &str) -> Result<Option<Value>> {
    request(session, Method::GET, path, None)
}

/// Write `content` with `method` (`PUT`, `POST` or `PATCH`).
///
/// # Errors
///
/// See [`request`].
pub fn edit_config(
    session: &mut SessionConnection,
    method: Method,
    path: &str,
    content: &Value,
) -> Result<Option<Value>> {
    request(session, method, path, Some(content))
}
