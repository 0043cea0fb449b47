//! Gatehouse - an OAuth-gated static file server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /login, /googleauth/, /logout (Google OAuth)             │
//! │  - /, /*path (gated file tree)                              │
//! │  - /metrics (optional)                                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Core                                  │
//! │  - session cookie → identity                                │
//! │  - identity × allow-list → permit / deny                    │
//! │  - request path → file under the root                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `access`: allow-list store and wildcard matching
//! - `auth`: Google OAuth, session cookies, extractors
//! - `files`: safe path resolution and file streaming
//! - `gateway`: the request handler tying it all together
//! - `pages`: the 403 page
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod metrics;
pub mod pages;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Hot-reloading allow-list
    pub allowlist: Arc<access::AllowListStore>,

    /// Served file tree
    pub files: Arc<files::StaticFiles>,

    /// Session cookie encoding
    pub sessions: Arc<auth::SessionCodec>,

    /// Google OAuth client
    pub google: Arc<auth::GoogleOAuthClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Canonicalize the served root
    /// 2. Load the allow-list (a read failure here aborts startup)
    /// 3. Pick the session codec
    /// 4. Build the OAuth client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Served root
        let root = files::SiteRoot::open(&config.site.root)?;
        let files = files::StaticFiles::new(root, &config.site.cache_control)?;
        tracing::info!(root = %files.root().path().display(), "Site root ready");

        // 2. Allow-list
        let allowlist = access::AllowListStore::load(&config.site.allowlist_path).await?;
        warn_if_allowlist_is_served(&allowlist, files.root());

        // 3. Sessions
        let sessions = auth::SessionCodec::from_config(&config.auth)?;

        // 4. OAuth client
        let google = auth::GoogleOAuthClient::new(config.auth.google.clone())?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            allowlist: Arc::new(allowlist),
            files: Arc::new(files),
            sessions: Arc::new(sessions),
            google: Arc::new(google),
        })
    }
}

/// The allow-list is hidden from clients only when its path under the root
/// has a component starting with `.` (the default `.auth` does).
fn warn_if_allowlist_is_served(allowlist: &access::AllowListStore, root: &files::SiteRoot) {
    let Ok(source) = allowlist.source().canonicalize() else {
        return;
    };
    let Some(relative) = source
        .strip_prefix(root.path())
        .ok()
        .and_then(|path| path.to_str())
    else {
        return;
    };

    if root.resolve(relative).is_ok() {
        tracing::warn!(
            source = %source.display(),
            "Allow-list file is inside the site root and will be served to authorized users"
        );
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::trace::TraceLayer;

    let mut router = Router::new()
        .merge(auth::auth_router())
        .merge(gateway::gateway_router());

    if state.config.metrics.enabled {
        router = router.merge(metrics::metrics_router().route_layer(
            middleware::from_fn_with_state(state.clone(), auth::require_authorized),
        ));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
