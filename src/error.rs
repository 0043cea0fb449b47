//! Error types for Gatehouse
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Responses never carry filesystem paths or internal details; those
//! go to the log instead.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Missing files, traversal attempts and hidden files all collapse into
/// `NotFound` so that a probe cannot tell them apart.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// No usable session (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Valid session, identity not on the allow-list (403)
    #[error("Access denied for {identity}")]
    Forbidden { identity: String },

    /// Identity provider exchange failed (400)
    #[error("{0}")]
    OAuth(String),

    /// Allow-list source could not be read (500)
    #[error("Allow-list error: {0}")]
    AllowList(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::OAuth(err.to_string())
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden { .. } => "forbidden",
            AppError::OAuth(_) => "oauth",
            AppError::AllowList(_) => "allowlist",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to its status code. The denial page is
    /// HTML; everything else is a small JSON body.
    fn into_response(self) -> Response {
        use axum::Json;

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.error_type()])
            .inc();

        let (status, error_message) = match &self {
            AppError::Forbidden { identity } => {
                return (
                    StatusCode::FORBIDDEN,
                    Html(crate::pages::unauthorized_html(identity)),
                )
                    .into_response();
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::OAuth(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AllowList(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
