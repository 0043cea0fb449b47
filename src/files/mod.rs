//! Static file tree
//!
//! - `resolve`: request path → file under the served root, or NotFound
//! - `serve`: stream a resolved file with caching headers

pub mod resolve;
mod serve;

pub use resolve::{INDEX_FILE, ResolvedTarget, SiteRoot, resolve_safe};
pub use serve::StaticFiles;
