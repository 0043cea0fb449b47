//! Authentication extractors and authorization middleware

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::{Identity, SESSION_COOKIE};
use crate::AppState;
use crate::error::AppError;

fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

/// Check the identity against the current allow-list
///
/// # Errors
/// - `AppError::Forbidden` if no pattern matches
/// - `AppError::AllowList` if the allow-list file cannot be read
pub async fn authorize(state: &AppState, identity: &Identity) -> Result<(), AppError> {
    let allowlist = state.allowlist.patterns().await?;

    if allowlist.permits(identity.as_str()) {
        Ok(())
    } else {
        tracing::info!(identity = %identity, "Identity not on allow-list");
        Err(AppError::Forbidden {
            identity: identity.to_string(),
        })
    }
}

/// Middleware requiring an authenticated *and* authorized session
///
/// Adds the `Identity` to request extensions.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/metrics", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_authorized));
/// ```
pub async fn require_authorized(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers());
    let identity = state.sessions.resolve(token.as_deref())?;

    authorize(&state, &identity).await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extractor for the identity claimed by the session cookie
///
/// Rejects with 401 when there is no usable session. Says nothing about
/// authorization.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
///     format!("Hello, {identity}")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(CurrentIdentity(identity));
        }

        let state = AppState::from_ref(state);
        let token = session_token(&parts.headers);
        let identity = state.sessions.resolve(token.as_deref())?;
        parts.extensions.insert(identity.clone());

        Ok(CurrentIdentity(identity))
    }
}
