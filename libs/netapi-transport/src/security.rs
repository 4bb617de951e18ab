//! HTTP security utilities.

/// Maximum body preview size for error messages (8KB).
///
/// When a device answers with a non-2xx status, the start of the body is
/// rendered into the error message for diagnostics. The full body stays
/// available on [`HttpStatusError::body`](crate::HttpStatusError::body).
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Render at most [`ERROR_BODY_PREVIEW_LIMIT`] bytes of `body` as lossy UTF-8.
#[must_use]
pub fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(ERROR_BODY_PREVIEW_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
