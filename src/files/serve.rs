//! File streaming with the gateway's response headers

use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::resolve::{ResolvedTarget, SiteRoot};
use crate::error::AppError;

/// Served root plus the caching policy applied to every file
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: SiteRoot,
    cache_control: HeaderValue,
}

impl StaticFiles {
    /// # Errors
    /// Returns `AppError::Config` if `cache_control` is not a valid header value.
    pub fn new(root: SiteRoot, cache_control: &str) -> Result<Self, AppError> {
        let cache_control = HeaderValue::from_str(cache_control)
            .map_err(|e| AppError::Config(format!("site.cache_control: {e}")))?;

        Ok(Self {
            root,
            cache_control,
        })
    }

    pub fn root(&self) -> &SiteRoot {
        &self.root
    }

    /// Resolve a request path on the blocking pool
    ///
    /// Canonicalization stats every path component, so it stays off the
    /// async workers.
    pub async fn resolve(&self, requested: String) -> Result<ResolvedTarget, AppError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || root.resolve(&requested))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    /// Stream a resolved file
    ///
    /// `ServeFile` picks the content type from the extension and honours
    /// range and conditional headers on `request`. The body is read
    /// asynchronously and dropped if the client disconnects.
    pub async fn serve(&self, target: &ResolvedTarget, request: Request) -> Response {
        let mut response = ServeFile::new(target.as_path())
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
            .into_response();

        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );

        response
    }
}
