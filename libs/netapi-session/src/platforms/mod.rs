//! Built-in platform handlers.
//!
//! | identifier | auth |
//! |------------|------|
//! | `restconf` | HTTP basic auth on every request |
//! | `token`    | login exchange issuing an `X-Auth-Token` header |

use std::sync::Arc;

use crate::config::ConnectionOptions;
use crate::platform::{PlatformHandler, PlatformRegistry};

pub mod restconf;
pub mod token;

pub use restconf::RestconfHandler;
pub use token::TokenHandler;

/// Register every built-in handler under its identifier.
pub fn register_builtin(registry: &mut PlatformRegistry) {
    registry.register(restconf::NAME, |_: &ConnectionOptions| {
        Arc::new(RestconfHandler) as Arc<dyn PlatformHandler>
    });
    registry.register(token::NAME, |_: &ConnectionOptions| {
        Arc::new(TokenHandler::default()) as Arc<dyn PlatformHandler>
    });
}
