//! Authorization token record and bearer claim decoding

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The current authorization record for the session.
///
/// Persisted as `{secret, expiresAtEpochSeconds, isDeviceScoped}`. A
/// device-scoped token is a long-lived access grant and never constitutes an
/// interactive session on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    /// Opaque bearer string issued by the server
    pub secret: String,

    /// Absolute expiry in seconds since epoch; `None` means never expires
    #[serde(rename = "expiresAtEpochSeconds", default)]
    pub expires_at: Option<i64>,

    /// Device access grant rather than an interactive session token
    #[serde(rename = "isDeviceScoped")]
    pub device_scoped: bool,
}

impl AuthorizationToken {
    /// Interactive-session token obtained through username/password login
    pub fn session(secret: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
            device_scoped: false,
        }
    }

    /// Device access token issued out of band
    pub fn device(secret: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
            device_scoped: true,
        }
    }

    /// True when the token carries an expiry that has already passed
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(epoch_expired).unwrap_or(false)
    }
}

/// Check an epoch-seconds expiry against the current clock
pub fn epoch_expired(expiry: i64) -> bool {
    Utc::now().timestamp() >= expiry
}

/// Render an epoch-seconds expiry for log output
pub fn expiry_display(expiry: Option<i64>) -> String {
    match expiry.and_then(|e| DateTime::<Utc>::from_timestamp(e, 0)) {
        Some(date) => date.to_rfc3339(),
        None => "NEVER".to_string(),
    }
}

/// Extract the `exp` claim from a bearer token.
///
/// The token is the conventional three-segment dot-separated structure; only
/// the second segment is decoded (base64url, no padding) and only `exp` is
/// read. Returns `Ok(None)` when the payload decodes cleanly but carries no
/// `exp` claim. Any decode failure is a [`AuthError::MalformedToken`], never a
/// panic.
pub fn decode_expiry(bearer: &str) -> Result<Option<i64>, AuthError> {
    let payload = bearer
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::MalformedToken("missing payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    let claims: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not JSON: {}", e)))?;

    match claims.get("exp") {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| AuthError::MalformedToken("exp claim is not a number".to_string())),
    }
}

#[cfg(test)]
pub(crate) fn make_bearer(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_expiry_present() {
        let bearer = make_bearer(&serde_json::json!({ "exp": 1_900_000_000, "iat": 0 }));
        assert_eq!(decode_expiry(&bearer).unwrap(), Some(1_900_000_000));
    }

    #[test]
    fn test_decode_expiry_absent() {
        let bearer = make_bearer(&serde_json::json!({ "sub": "pilot" }));
        assert_eq!(decode_expiry(&bearer).unwrap(), None);
    }

    #[test]
    fn test_decode_expiry_malformed() {
        // No payload segment at all
        assert!(matches!(
            decode_expiry("just-one-segment"),
            Err(AuthError::MalformedToken(_))
        ));

        // Payload is not base64url
        assert!(matches!(
            decode_expiry("a.!!!.c"),
            Err(AuthError::MalformedToken(_))
        ));

        // Payload decodes but is not JSON
        let garbage = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            decode_expiry(&format!("a.{}.c", garbage)),
            Err(AuthError::MalformedToken(_))
        ));

        // exp present but not numeric
        let bearer = make_bearer(&serde_json::json!({ "exp": "soon" }));
        assert!(matches!(
            decode_expiry(&bearer),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now().timestamp();

        let token = AuthorizationToken::session("secret", Some(now + 3600));
        assert!(!token.is_expired());

        let token = AuthorizationToken::session("secret", Some(now - 3600));
        assert!(token.is_expired());

        let token = AuthorizationToken::device("secret", None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_wire_format() {
        let token = AuthorizationToken::device("abc", Some(42));
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["secret"], "abc");
        assert_eq!(json["expiresAtEpochSeconds"], 42);
        assert_eq!(json["isDeviceScoped"], true);

        let parsed: AuthorizationToken = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_expiry_display() {
        assert_eq!(expiry_display(None), "NEVER");
        assert!(expiry_display(Some(0)).starts_with("1970-01-01"));
    }
}
