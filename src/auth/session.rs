//! Session management
//!
//! The `session` cookie carries the identity. Two encodings exist:
//!
//! - **Plain** (default): the cookie value *is* the identity. Nothing is
//!   verified, so anyone able to set a cookie can claim any identity. Trust
//!   is only established when the OAuth callback issues the cookie.
//! - **Signed** (when `auth.session_secret` is configured): HMAC-signed
//!   tokens with an expiry. Forged or expired cookies are rejected.
//!
//! Either way a session only says who the request claims to be; whether
//! that identity may read anything is decided by the allow-list.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

/// Claimed identity of a request, normally an email address
///
/// Opaque beyond this layer: never parsed or normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a plain bearer token to an identity
///
/// # Errors
/// `AppError::Unauthorized` if the token is absent or empty.
pub fn resolve_identity(token: Option<&str>) -> Result<Identity, AppError> {
    match token {
        Some(token) if !token.is_empty() => Ok(Identity(token.to_owned())),
        _ => Err(AppError::Unauthorized),
    }
}

/// Payload of a signed session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedSession {
    /// Verified email from the identity provider
    pub email: String,
    /// When session was created
    pub issued_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl SignedSession {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// How session cookies are issued and read back
#[derive(Debug, Clone)]
pub enum SessionCodec {
    Plain,
    Signed { secret: String, max_age: Duration },
}

impl SessionCodec {
    /// Pick the codec from configuration
    ///
    /// # Errors
    /// `AppError::Config` if `session_max_age` does not fit a
    /// `chrono::Duration`.
    pub fn from_config(auth: &crate::config::AuthConfig) -> Result<Self, AppError> {
        let Some(secret) = &auth.session_secret else {
            return Ok(SessionCodec::Plain);
        };

        let max_age = session_lifetime(auth.session_max_age).ok_or_else(|| {
            AppError::Config(format!(
                "auth.session_max_age {} is out of range",
                auth.session_max_age
            ))
        })?;

        Ok(SessionCodec::Signed {
            secret: secret.clone(),
            max_age,
        })
    }

    /// Produce the cookie value for a verified identity
    pub fn issue(&self, email: &str) -> Result<String, AppError> {
        match self {
            SessionCodec::Plain => Ok(email.to_owned()),
            SessionCodec::Signed { secret, max_age } => {
                let now = Utc::now();
                let expires_at = now.checked_add_signed(*max_age).ok_or_else(|| {
                    AppError::Encryption("session expiry is out of range".to_string())
                })?;
                let session = SignedSession {
                    email: email.to_owned(),
                    issued_at: now,
                    expires_at,
                };
                create_session_token(&session, secret)
            }
        }
    }

    /// Turn a cookie value back into an identity
    ///
    /// # Errors
    /// `AppError::Unauthorized` for a missing, empty, forged, malformed or
    /// expired token.
    pub fn resolve(&self, token: Option<&str>) -> Result<Identity, AppError> {
        match self {
            SessionCodec::Plain => resolve_identity(token),
            SessionCodec::Signed { secret, .. } => {
                let token = token
                    .filter(|t| !t.is_empty())
                    .ok_or(AppError::Unauthorized)?;
                let session = verify_session_token(token, secret)?;
                resolve_identity(Some(&session.email))
            }
        }
    }
}

/// `seconds` as a lifetime, if it is positive and the resulting expiry
/// is representable from now
pub(crate) fn session_lifetime(seconds: i64) -> Option<Duration> {
    let lifetime = Duration::try_seconds(seconds).filter(|d| *d > Duration::zero())?;
    Utc::now().checked_add_signed(lifetime)?;
    Some(lifetime)
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
pub fn create_session_token(session: &SignedSession, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a signed session token
///
/// # Errors
/// `AppError::Unauthorized` if the signature is invalid, the token is
/// malformed, or the session has expired.
pub fn verify_session_token(token: &str, secret: &str) -> Result<SignedSession, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let session: SignedSession =
        serde_json::from_slice(&payload).map_err(|_| AppError::Unauthorized)?;

    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}
