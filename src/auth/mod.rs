//! Google OAuth authentication
//!
//! Handles:
//! - Google OAuth flow
//! - Session cookies
//! - Authentication extractor and authorization middleware

mod middleware;
mod oauth;
pub mod session;

pub use middleware::{CurrentIdentity, authorize, require_authorized};
pub use oauth::{GoogleOAuthClient, auth_router};
pub use session::{Identity, SESSION_COOKIE, SessionCodec, resolve_identity};
