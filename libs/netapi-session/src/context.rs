//! Play context: who runs the tasks and whether privileges are escalated.
//!
//! Callers hand the session an encoded context blob between tasks. The blob is
//! a JSON envelope:
//!
//! ```json
//! {"version": 1, "context": {"remote_user": "admin", "become": true, "become_method": "enable"}}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConnectionOptions, DEFAULT_BECOME_METHOD};

/// Envelope version written by [`PlayContext::encode`].
pub const CONTEXT_VERSION: u32 = 1;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContextError {
    #[error("malformed play context: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported play context version {found} (expected {CONTEXT_VERSION})")]
    UnsupportedVersion { found: u32 },
}

fn default_become_method() -> String {
    DEFAULT_BECOME_METHOD.to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayContext {
    #[serde(default)]
    pub remote_user: Option<String>,
    #[serde(rename = "become", default)]
    pub become_enabled: bool,
    #[serde(default = "default_become_method")]
    pub become_method: String,
    #[serde(default)]
    pub become_user: Option<String>,
}

impl Default for PlayContext {
    fn default() -> Self {
        Self {
            remote_user: None,
            become_enabled: false,
            become_method: default_become_method(),
            become_user: None,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    context: &'a PlayContext,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    context: serde_json::Value,
}

impl PlayContext {
    /// Initial context of a connection.
    #[must_use]
    pub fn from_options(options: &ConnectionOptions) -> Self {
        Self {
            remote_user: Some(options.username()),
            become_enabled: options.become_enabled,
            become_method: options.become_method.clone(),
            become_user: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`ContextError::UnsupportedVersion`] for an envelope version
    /// other than [`CONTEXT_VERSION`] and [`ContextError::Malformed`] for
    /// anything that is not a valid envelope.
    pub fn decode(blob: &[u8]) -> Result<Self, ContextError> {
        let envelope: Envelope = serde_json::from_slice(blob)?;
        if envelope.version != CONTEXT_VERSION {
            return Err(ContextError::UnsupportedVersion {
                found: envelope.version,
            });
        }
        Ok(serde_json::from_value(envelope.context)?)
    }

    /// # Errors
    ///
    /// Returns [`ContextError::Malformed`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, ContextError> {
        Ok(serde_json::to_vec(&EnvelopeRef {
            version: CONTEXT_VERSION,
            context: self,
        })?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn decode_fills_defaults() {
        let ctx = PlayContext::decode(br#"{"version":1,"context":{"become":true}}"#).unwrap();
        assert!(ctx.become_enabled);
        assert_eq!(ctx.become_method, "sudo");
        assert_eq!(ctx.remote_user, None);
    }

    #[test]
    fn encode_writes_envelope() {
        let ctx = PlayContext {
            remote_user: Some("admin".to_owned()),
            become_enabled: true,
            become_method: "enable".to_owned(),
            become_user: None,
        };
        let value: serde_json::Value = serde_json::from_slice(&ctx.encode().unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["context"]["become"], true);
        assert_eq!(value["context"]["become_method"], "enable");
        assert_eq!(PlayContext::decode(&ctx.encode().unwrap()).unwrap(), ctx);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = PlayContext::decode(br#"{"version":2,"context":{}}"#).unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedVersion { found: 2 }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            PlayContext::decode(b"not json").unwrap_err(),
            ContextError::Malformed(_)
        ));
        assert!(matches!(
            PlayContext::decode(br#"{"context":{}}"#).unwrap_err(),
            ContextError::Malformed(_)
        ));
    }

    #[test]
    fn from_options_copies_become_settings() {
        let options = ConnectionOptions {
            remote_user: Some("ops".to_owned()),
            become_enabled: true,
            become_method: "enable".to_owned(),
            ..ConnectionOptions::default()
        };
        let ctx = PlayContext::from_options(&options);
        assert_eq!(ctx.remote_user.as_deref(), Some("ops"));
        assert!(ctx.become_enabled);
        assert_eq!(ctx.become_method, "enable");
    }
}
