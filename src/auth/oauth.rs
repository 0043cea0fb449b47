//! Google OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Google. The only
//! thing the rest of the gateway needs from it is a verified email, which
//! becomes the session identity.

use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use super::session::SESSION_COOKIE;
use crate::AppState;
use crate::config::GoogleOAuthConfig;
use crate::error::AppError;
use crate::metrics::SESSIONS_ISSUED_TOTAL;

/// Issuers Google uses in ID tokens
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to Google
/// - GET /googleauth/ - OAuth callback
/// - GET /logout - Clear session
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/googleauth/", get(google_callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Google client
// =============================================================================

/// Token endpoint response (only the field we use)
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    id_token: String,
}

/// Claims returned by the tokeninfo endpoint for a valid ID token
#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    iss: Option<String>,
    email: Option<String>,
    /// `"true"` from tokeninfo, `true` in some deployments
    email_verified: Option<serde_json::Value>,
}

impl GoogleTokenInfo {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(verified)) => *verified,
            Some(serde_json::Value::String(verified)) => verified == "true",
            _ => false,
        }
    }
}

/// Client for Google's authorization, token, and tokeninfo endpoints
pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent("Gatehouse/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self { config, http })
    }

    /// URL of Google's consent screen for this client
    pub fn authorization_url(&self) -> Result<String, AppError> {
        let url = url::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", "email profile"),
            ],
        )
        .map_err(|e| AppError::Config(format!("auth.google.auth_url: {e}")))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for a verified email
    ///
    /// # Steps
    /// 1. POST the code to the token endpoint
    /// 2. Verify the returned ID token with the tokeninfo endpoint
    /// 3. Check audience, issuer, and that the email is verified
    ///
    /// # Errors
    /// `AppError::OAuth` with a human-readable reason on any failure.
    pub async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: GoogleTokenResponse = Self::json_or_error(response, "token exchange").await?;

        let response = self
            .http
            .get(&self.config.tokeninfo_url)
            .query(&[("id_token", token.id_token.as_str())])
            .send()
            .await?;
        let info: GoogleTokenInfo = Self::json_or_error(response, "ID token verification").await?;

        if info.aud != self.config.client_id {
            return Err(AppError::OAuth(
                "ID token was issued for a different client".to_string(),
            ));
        }

        if !info
            .iss
            .as_deref()
            .is_some_and(|iss| GOOGLE_ISSUERS.contains(&iss))
        {
            return Err(AppError::OAuth(
                "ID token was not issued by Google".to_string(),
            ));
        }

        if !info.email_verified() {
            return Err(AppError::OAuth("Email address is not verified".to_string()));
        }

        info.email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::OAuth("ID token carries no email".to_string()))
    }

    async fn json_or_error<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        step: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OAuth(format!(
                "{step} failed with {status}: {}",
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("{step} returned an invalid response: {e}")))
    }
}

// =============================================================================
// Routes
// =============================================================================

/// GET /login
///
/// Redirects the user to Google's consent screen.
async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    Ok(Redirect::temporary(&state.google.authorization_url()?))
}

/// Query parameters from Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    /// Authorization code
    code: String,
}

/// GET /googleauth/
///
/// Handles the OAuth callback from Google.
///
/// # Steps
/// 1. Exchange code for a verified email
/// 2. Issue a session for that email and set the cookie
/// 3. Redirect to the site root
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let email = state
        .google
        .exchange_code(&query.code)
        .await
        .inspect_err(|error| tracing::warn!(%error, "OAuth code exchange failed"))?;

    let token = state.sessions.issue(&email)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.auth.secure_cookies)
        .same_site(SameSite::Lax);

    tracing::info!(identity = %email, "Session issued");
    SESSIONS_ISSUED_TOTAL.inc();

    Ok((jar.add(cookie), Redirect::temporary("/")))
}

/// GET /logout
///
/// Clears session cookie and redirects to login.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::temporary("/login"),
    )
}
