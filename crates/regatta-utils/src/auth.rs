//! Credential extraction from `Authorization` header values.
//!
//! The gateway never makes authorization decisions of its own; it only lifts
//! the caller's access token out of the request and relays it to the remote
//! host. Package managers present the token in different shapes: Composer
//! sends HTTP Basic credentials with the token in the password field, npm
//! sends a Bearer token.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Extracts an access token from an `Authorization` header value.
///
/// Supports `Basic` (token taken from the password field) and `Bearer`
/// schemes. Returns `None` for anything malformed or any other scheme.
pub fn extract_token(authorization: &str) -> Option<String> {
    let (scheme, payload) = authorization.split_once(' ')?;
    if scheme.is_empty() || payload.is_empty() {
        return None;
    }

    match scheme.to_ascii_lowercase().as_str() {
        "basic" => extract_basic(payload),
        "bearer" => Some(payload.to_string()),
        _ => None,
    }
}

fn extract_basic(payload: &str) -> Option<String> {
    let decoded = STANDARD.decode(payload).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let (user, password) = decoded.split_once(':')?;
    if user.is_empty() || password.is_empty() {
        return None;
    }

    Some(password.to_string())
}
