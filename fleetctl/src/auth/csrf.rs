//! Session-bound CSRF tokens.
//!
//! The token is `base64url(HMAC-SHA256(secret_key, "csrf:" + jti))`, so it is stable for the life
//! of a session and useless for any other one. It is only demanded from callers that
//! authenticated with the session cookie; bearer and header tokens are never sent automatically
//! by a browser.

use axum::http::Method;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::errors::Error;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, jti: Uuid) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| Error::Internal {
        operation: format!("initialise csrf hmac: {e}"),
    })?;
    mac.update(b"csrf:");
    mac.update(jti.to_string().as_bytes());
    Ok(mac)
}

pub fn issue_token(secret: &str, jti: Uuid) -> Result<String, Error> {
    Ok(URL_SAFE_NO_PAD.encode(mac_for(secret, jti)?.finalize().into_bytes()))
}

/// Constant-time check of a presented token.
pub fn verify_token(secret: &str, jti: Uuid, presented: &str) -> bool {
    let Ok(presented) = URL_SAFE_NO_PAD.decode(presented.trim()) else {
        return false;
    };
    mac_for(secret, jti).is_ok_and(|mac| mac.verify_slice(&presented).is_ok())
}

/// POST, PUT, PATCH and DELETE
pub fn is_unsafe_method(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let jti = Uuid::new_v4();
        let token = issue_token("secret", jti).unwrap();

        assert!(verify_token("secret", jti, &token));
        assert!(!token.contains('='));
        // Stable for the session
        assert_eq!(token, issue_token("secret", jti).unwrap());
    }

    #[test]
    fn test_bound_to_session_and_secret() {
        let jti = Uuid::new_v4();
        let token = issue_token("secret", jti).unwrap();

        assert!(!verify_token("secret", Uuid::new_v4(), &token));
        assert!(!verify_token("other-secret", jti, &token));
        assert!(!verify_token("secret", jti, "not base64!"));
        assert!(!verify_token("secret", jti, ""));
    }

    #[test]
    fn test_unsafe_methods() {
        assert!(is_unsafe_method(&Method::POST));
        assert!(is_unsafe_method(&Method::DELETE));
        assert!(is_unsafe_method(&Method::PATCH));
        assert!(is_unsafe_method(&Method::PUT));
        assert!(!is_unsafe_method(&Method::GET));
        assert!(!is_unsafe_method(&Method::HEAD));
        assert!(!is_unsafe_method(&Method::OPTIONS));
    }
}
