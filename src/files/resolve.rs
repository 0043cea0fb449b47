//! Safe path resolution
//!
//! Maps a request path onto a file under the served root. A request is
//! rejected if it escapes the root, touches anything whose name starts
//! with `.`, or names something other than an existing regular file.
//! All rejections are the same `AppError::NotFound`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// File served for an empty request path
pub const INDEX_FILE: &str = "index.html";

/// Canonicalized directory that all served files must live under
#[derive(Debug, Clone)]
pub struct SiteRoot {
    root: PathBuf,
}

impl SiteRoot {
    /// Canonicalize `path` and check that it is a directory
    ///
    /// # Errors
    /// Returns `AppError::Config` if the root does not exist or is not a
    /// directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let root = path
            .canonicalize()
            .map_err(|e| AppError::Config(format!("site root {}: {}", path.display(), e)))?;

        if !root.is_dir() {
            return Err(AppError::Config(format!(
                "site root {} is not a directory",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Canonical root path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path to a servable file
    ///
    /// # Steps
    /// 1. Substitute `index.html` for an empty path
    /// 2. Canonicalize root + request (symlinks and `..` resolved)
    /// 3. Containment: canonical path must be under the root
    /// 4. Hidden files: no component below the root may start with `.`
    /// 5. Existence: must be a regular file
    ///
    /// Only metadata is consulted; file contents are never read here.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedTarget, AppError> {
        let requested = if requested.is_empty() {
            INDEX_FILE
        } else {
            requested
        };
        let request_path = Path::new(requested);

        let canonical = canonicalize_lenient(&self.root.join(request_path));

        // Component-wise, so `/srv/app2` is not inside `/srv/app`.
        let relative = canonical
            .strip_prefix(&self.root)
            .map_err(|_| AppError::NotFound)?;

        if has_hidden_component(relative) || has_hidden_component(request_path) {
            return Err(AppError::NotFound);
        }

        match fs::metadata(&canonical) {
            Ok(metadata) if metadata.is_file() => Ok(ResolvedTarget(canonical)),
            _ => Err(AppError::NotFound),
        }
    }
}

/// Resolve `requested` under `trusted_root`
///
/// Convenience over [`SiteRoot::resolve`] that canonicalizes the root on
/// every call.
pub fn resolve_safe(requested: &str, trusted_root: &Path) -> Result<ResolvedTarget, AppError> {
    let root = SiteRoot::open(trusted_root).map_err(|_| AppError::NotFound)?;
    root.resolve(requested)
}

/// Absolute, canonical path of an existing regular file under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget(PathBuf);

impl ResolvedTarget {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// Canonicalize as far as the filesystem allows
///
/// Each existing prefix is resolved through the filesystem. Past the first
/// missing component the remainder is applied lexically, with `..` popping
/// the previous component.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if let Ok(canonical) = resolved.canonicalize() {
                    resolved = canonical;
                }
            }
        }
    }

    resolved
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.as_encoded_bytes().starts_with(b"."),
        _ => false,
    })
}
