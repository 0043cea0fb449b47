//! Access control
//!
//! Handles:
//! - Allow-list loading and hot reload
//! - Wildcard matching of identities against the allow-list

pub mod allowlist;
pub mod pattern;

pub use allowlist::{AllowList, AllowListStore};
pub use pattern::{glob_match, is_authorized};
