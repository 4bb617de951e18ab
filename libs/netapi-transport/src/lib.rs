#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport layer for netapi sessions
//!
//! The session core never talks to an HTTP client directly. It builds a
//! [`TransportRequest`] and hands it to an [`HttpTransport`], which returns
//! either a fully buffered [`TransportResponse`] or a [`TransportError`] that
//! keeps HTTP status failures ([`HttpStatusError`]) apart from network
//! failures.
//!
//! [`UreqTransport`] is the production implementation:
//! - blocking I/O via `ureq`, one cached agent per TLS/proxy combination
//! - rustls with cached native roots, optional certificate validation bypass
//! - cipher suite allow-lists
//! - explicit or environment proxies
//! - response body size limit
//!
//! # Example
//!
//! ```ignore
//! use netapi_transport::{HttpTransport, TransportRequest, UreqTransport};
//!
//! let transport = UreqTransport::new();
//! let response = transport.request(&TransportRequest::get("https://10.0.0.1:443/"))?;
//! println!("{}", response.meta.status);
//! ```

mod error;
mod request;
mod response;
pub mod security;
pub mod tls;
mod transport;
mod ureq_transport;

pub use error::{HttpStatusError, TransportError};
pub use request::{BasicAuth, DEFAULT_TIMEOUT, TransportRequest, TransportSettings};
pub use response::{ResponseMeta, TransportResponse};
pub use transport::HttpTransport;
pub use ureq_transport::{DEFAULT_MAX_BODY_BYTES, DEFAULT_USER_AGENT, UreqTransport};
