//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (GATEHOUSE__*, override)
//! 4. `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `REDIRECT_URI`, `PORT`
//!    (also read from `.env`)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub site: SiteConfig,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
}

/// Served file tree
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Directory served to authorized users (default: working directory)
    pub root: PathBuf,
    /// Allow-list file, one pattern per line (default: ".auth")
    ///
    /// Absent file means every authenticated identity is allowed.
    pub allowlist_path: PathBuf,
    /// Cache-Control header on served files
    pub cache_control: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret (32+ bytes) for signed session cookies
    ///
    /// When unset, the cookie holds the bare identity.
    pub session_secret: Option<String>,
    /// Signed session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Set the `Secure` attribute on the session cookie
    pub secure_cookies: bool,
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with Google, ending in `/googleauth/`
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub tokeninfo_url: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Expose `/metrics` to authorized sessions
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        // A missing .env is normal.
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("site.root", ".")?
            .set_default("site.allowlist_path", ".auth")?
            .set_default("site.cache_control", "private, max-age=3600")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.secure_cookies", true)?
            .set_default("auth.google.client_id", "")?
            .set_default("auth.google.client_secret", "")?
            .set_default("auth.google.redirect_uri", "")?
            .set_default(
                "auth.google.auth_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default("auth.google.token_url", "https://oauth2.googleapis.com/token")?
            .set_default(
                "auth.google.tokeninfo_url",
                "https://oauth2.googleapis.com/tokeninfo",
            )?
            .set_default("metrics.enabled", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (GATEHOUSE__*)
            .add_source(
                Environment::with_prefix("GATEHOUSE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain variable names used by existing deployments
            .set_override_option("auth.google.client_id", env_var("GOOGLE_CLIENT_ID"))?
            .set_override_option(
                "auth.google.client_secret",
                env_var("GOOGLE_CLIENT_SECRET"),
            )?
            .set_override_option("auth.google.redirect_uri", env_var("REDIRECT_URI"))?
            .set_override_option("server.port", env_var("PORT"))?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if let Some(secret) = &self.auth.session_secret {
            if secret.len() < MIN_SESSION_SECRET_BYTES {
                return Err(crate::error::AppError::Config(format!(
                    "auth.session_secret must be at least {} bytes",
                    MIN_SESSION_SECRET_BYTES
                )));
            }
        } else {
            tracing::warn!(
                "auth.session_secret is not set; session cookies carry the bare identity and are not verified"
            );
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if crate::auth::session::session_lifetime(self.auth.session_max_age).is_none() {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_max_age {} is too large",
                self.auth.session_max_age
            )));
        }

        if self.auth.google.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.google.client_id (GOOGLE_CLIENT_ID) is required".to_string(),
            ));
        }

        url::Url::parse(&self.auth.google.redirect_uri).map_err(|e| {
            crate::error::AppError::Config(format!(
                "auth.google.redirect_uri (REDIRECT_URI) is not a valid URL: {e}"
            ))
        })?;

        if !self.auth.secure_cookies {
            tracing::warn!("Session cookies are sent without the Secure attribute");
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            site: SiteConfig {
                root: PathBuf::from("."),
                allowlist_path: PathBuf::from(".auth"),
                cache_control: "private, max-age=3600".to_string(),
            },
            auth: AuthConfig {
                session_secret: None,
                session_max_age: 604_800,
                secure_cookies: true,
                google: GoogleOAuthConfig {
                    client_id: "fake-client-id".to_string(),
                    client_secret: "fake-secret".to_string(),
                    redirect_uri: "http://testserver/googleauth/".to_string(),
                    auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                    token_url: "https://oauth2.googleapis.com/token".to_string(),
                    tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
                },
            },
            metrics: MetricsConfig { enabled: false },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_plain_sessions() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_accepts_long_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = Some("x".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = Some("short-secret".to_string());

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_missing_client_id() {
        let mut config = valid_config();
        config.auth.google.client_id = "  ".to_string();

        let error = config.validate().expect_err("client id is required");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("GOOGLE_CLIENT_ID")
        ));
    }

    #[test]
    fn validate_rejects_bad_redirect_uri() {
        let mut config = valid_config();
        config.auth.google.redirect_uri = "not a url".to_string();

        let error = config.validate().expect_err("redirect uri must parse");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("REDIRECT_URI")
        ));
    }

    #[test]
    fn validate_rejects_oversized_max_age() {
        for max_age in [i64::MAX, 9_000_000_000_000] {
            let mut config = valid_config();
            config.auth.session_max_age = max_age;

            let error = config.validate().expect_err("max age must fit a timestamp");
            assert!(matches!(
                error,
                crate::error::AppError::Config(message)
                    if message.contains("auth.session_max_age")
            ));
        }
    }

    #[test]
    fn validate_rejects_non_positive_max_age() {
        let mut config = valid_config();
        config.auth.session_max_age = 0;
        assert!(config.validate().is_err());
    }
}
