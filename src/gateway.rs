//! Authenticated static file serving
//!
//! Every request goes through the same fixed sequence:
//!
//! ```text
//! session cookie ──▶ identity ──▶ allow-list ──▶ safe path ──▶ file
//!        │               │              │
//!       401             403            404
//! ```
//!
//! Authorization is decided before the path is looked at, so a denied
//! identity learns nothing about which files exist.

use axum::{
    Router,
    extract::{Path, Request, State, rejection::PathRejection},
    response::Response,
    routing::get,
};

use crate::AppState;
use crate::auth::{CurrentIdentity, authorize};
use crate::error::AppError;
use crate::metrics::FILES_SERVED_TOTAL;

/// Routes for the served tree
///
/// - GET / - `index.html`
/// - GET /*path - any file under the root
pub fn gateway_router() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_index))
        .route("/*path", get(serve_path))
}

async fn serve_index(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    request: Request,
) -> Result<Response, AppError> {
    serve(state, identity, Ok(String::new()), request).await
}

async fn serve_path(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    path: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, AppError> {
    // Undecodable paths (e.g. invalid UTF-8) are reported only after
    // authorization, and as a plain 404.
    let path = path.map(|Path(path)| path).map_err(|rejection| {
        tracing::debug!(%rejection, "Rejected request path");
        AppError::NotFound
    });
    serve(state, identity, path, request).await
}

async fn serve(
    state: AppState,
    identity: crate::auth::Identity,
    path: Result<String, AppError>,
    request: Request,
) -> Result<Response, AppError> {
    authorize(&state, &identity).await?;

    let target = state.files.resolve(path?).await?;

    tracing::debug!(identity = %identity, file = %target.as_path().display(), "Serving file");
    FILES_SERVED_TOTAL.inc();

    Ok(state.files.serve(&target, request).await)
}
