//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use axum::{
    Form, Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gatehouse::{AppState, config};
use serde::Deserialize;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const CLIENT_ID: &str = "test-client-id";

/// Authorization code the fake provider accepts for `test@example.com`
pub const VALID_CODE: &str = "valid-code";
/// Authorization code whose ID token was minted for another client
pub const FOREIGN_AUDIENCE_CODE: &str = "foreign-audience-code";
/// Authorization code whose email is not verified
pub const UNVERIFIED_CODE: &str = "unverified-code";

/// Knobs for a test server
#[derive(Default)]
pub struct TestOptions {
    /// Initial allow-list contents; `None` leaves the file absent
    pub allowlist: Option<&'static str>,
    pub session_secret: Option<String>,
    pub metrics: bool,
    /// Point the OAuth client at a port nobody listens on
    pub unreachable_provider: bool,
}

/// Test server instance
///
/// ```text
/// <tmp>/secret.txt
/// <tmp>/site/index.html
/// <tmp>/site/README.md
/// <tmp>/site/docs/guide.html
/// <tmp>/site/.env
/// <tmp>/site/.auth        (when an allow-list is given)
/// ```
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub site: PathBuf,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance with a public site
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    /// Create a test server with the given allow-list
    pub async fn with_allowlist(patterns: &'static str) -> Self {
        Self::with_options(TestOptions {
            allowlist: Some(patterns),
            ..TestOptions::default()
        })
        .await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        gatehouse::metrics::init_metrics();

        let temp_dir = TempDir::new().unwrap();
        let site = temp_dir.path().join("site");
        std::fs::create_dir_all(site.join("docs")).unwrap();
        std::fs::write(temp_dir.path().join("secret.txt"), "top secret").unwrap();
        std::fs::write(site.join("index.html"), "<h1>Welcome</h1>").unwrap();
        std::fs::write(site.join("README.md"), "# Read me").unwrap();
        std::fs::write(site.join("docs/guide.html"), "<p>guide</p>").unwrap();
        std::fs::write(site.join(".env"), "GOOGLE_CLIENT_SECRET=hunter2").unwrap();
        if let Some(patterns) = options.allowlist {
            write_with_mtime(&site.join(".auth"), patterns, epoch_plus(1_000));
        }

        let provider = if options.unreachable_provider {
            "http://127.0.0.1:9".to_string()
        } else {
            spawn_fake_google().await
        };

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            site: config::SiteConfig {
                root: site.clone(),
                allowlist_path: site.join(".auth"),
                cache_control: "private, max-age=3600".to_string(),
            },
            auth: config::AuthConfig {
                session_secret: options.session_secret,
                session_max_age: 604800,
                secure_cookies: true,
                google: config::GoogleOAuthConfig {
                    client_id: CLIENT_ID.to_string(),
                    client_secret: "test-client-secret".to_string(),
                    redirect_uri: "http://testserver/googleauth/".to_string(),
                    auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                    token_url: format!("{provider}/token"),
                    tokeninfo_url: format!("{provider}/tokeninfo"),
                },
            },
            metrics: config::MetricsConfig {
                enabled: options.metrics,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = gatehouse::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            site,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path` with an optional `session` cookie
    pub async fn get(&self, path: &str, session: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(session) = session {
            request = request.header("Cookie", format!("session={session}"));
        }
        request.send().await.expect("request succeeds")
    }

    /// Replace the allow-list, stamping it with `mtime_secs` since the epoch
    pub fn write_allowlist(&self, patterns: &str, mtime_secs: u64) {
        write_with_mtime(&self.site.join(".auth"), patterns, epoch_plus(mtime_secs));
    }

    pub fn remove_allowlist(&self) {
        std::fs::remove_file(self.site.join(".auth")).unwrap();
    }
}

fn epoch_plus(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn write_with_mtime(path: &Path, contents: &str, mtime: SystemTime) {
    std::fs::write(path, contents).unwrap();
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

// =============================================================================
// Fake Google endpoints
// =============================================================================

#[derive(Deserialize)]
struct TokenForm {
    code: String,
    client_id: String,
    grant_type: String,
}

#[derive(Deserialize)]
struct TokenInfoQuery {
    id_token: String,
}

async fn fake_token(Form(form): Form<TokenForm>) -> Response {
    if form.client_id != CLIENT_ID || form.grant_type != "authorization_code" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    match form.code.as_str() {
        VALID_CODE | FOREIGN_AUDIENCE_CODE | UNVERIFIED_CODE => Json(serde_json::json!({
            "access_token": "fake-access-token",
            "id_token": format!("id-token-for-{}", form.code),
            "token_type": "Bearer",
            "expires_in": 3599,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request",
            })),
        )
            .into_response(),
    }
}

async fn fake_tokeninfo(Query(query): Query<TokenInfoQuery>) -> Response {
    let claims = |aud: &str, verified: &str| {
        Json(serde_json::json!({
            "iss": "https://accounts.google.com",
            "aud": aud,
            "sub": "1234567890",
            "email": "test@example.com",
            "email_verified": verified,
        }))
        .into_response()
    };

    match query.id_token.strip_prefix("id-token-for-") {
        Some(VALID_CODE) => claims(CLIENT_ID, "true"),
        Some(FOREIGN_AUDIENCE_CODE) => claims("someone-else", "true"),
        Some(UNVERIFIED_CODE) => claims(CLIENT_ID, "false"),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid_token" })),
        )
            .into_response(),
    }
}

/// Start the fake provider and return its base URL
async fn spawn_fake_google() -> String {
    let app = Router::new()
        .route("/token", post(fake_token))
        .route("/tokeninfo", get(fake_tokeninfo));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
