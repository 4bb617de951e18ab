use crate::error::TransportError;
use crate::request::TransportRequest;
use crate::response::TransportResponse;

/// Capability to perform one HTTP exchange.
///
/// Implementations must:
/// - buffer the whole body before returning
/// - report non-success statuses as [`TransportError::Status`] with the body
/// - report unreachable hosts as [`TransportError::Network`]
/// - never retry on their own
pub trait HttpTransport: Send + Sync {
    /// Perform `request`, blocking the caller until the exchange completes or
    /// `request.timeout` elapses.
    ///
    /// # Errors
    ///
    /// See the trait-level contract.
    fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Drop pooled connections. Called when a session closes.
    fn reset(&self) {}
}
