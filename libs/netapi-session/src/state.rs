//! Connection lifecycle

use std::fmt;

use crate::error::SessionError;

/// Lifecycle of a [`SessionConnection`](crate::SessionConnection).
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected
///                     |
///                     +-------> Disconnected   (login failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Platform setup and login in progress; handler requests are allowed
    Connecting,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if the move is not allowed; the
    /// state is left unchanged.
    pub fn transition(&mut self, next: Self) -> Result<(), SessionError> {
        if !self.can_transition_to(next) {
            return Err(SessionError::InvalidState {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Whether requests may go out in this state.
    #[must_use]
    pub fn accepts_requests(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
