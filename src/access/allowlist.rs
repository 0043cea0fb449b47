//! Hot-reloading allow-list
//!
//! The allow-list lives in a plain text file, one pattern per line. The
//! store re-reads it only when its modification time moves forward, so
//! the file can be edited while the server runs.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use super::pattern::is_authorized;
use crate::error::AppError;
use crate::metrics::ALLOWLIST_RELOADS_TOTAL;

/// Pattern that admits every identity
pub const PUBLIC_PATTERN: &str = "*";

/// Immutable allow-list snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    patterns: Vec<String>,
    /// Modification time of the source at load; `None` if never loaded
    version: Option<SystemTime>,
}

impl AllowList {
    /// The list used while no allow-list file exists
    pub fn public() -> Self {
        Self {
            patterns: vec![PUBLIC_PATTERN.to_string()],
            version: None,
        }
    }

    /// Parse file contents: trim every line, drop blank ones, keep order.
    pub fn parse(contents: &str, version: SystemTime) -> Self {
        let patterns = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Self {
            patterns,
            version: Some(version),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn version(&self) -> Option<SystemTime> {
        self.version
    }

    /// Whether `identity` matches any pattern in this snapshot
    pub fn permits(&self, identity: &str) -> bool {
        is_authorized(identity, &self.patterns)
    }

    fn is_current(&self, modified: SystemTime) -> bool {
        self.version.is_some_and(|loaded| modified <= loaded)
    }
}

/// Owner of the cached allow-list
///
/// Concurrent requests share one snapshot. A reload builds a new
/// `AllowList` and swaps the `Arc`, so readers never observe a partially
/// updated list.
#[derive(Debug)]
pub struct AllowListStore {
    source: PathBuf,
    current: RwLock<Arc<AllowList>>,
    public: Arc<AllowList>,
}

impl AllowListStore {
    /// Create the store and perform the initial load
    ///
    /// # Errors
    /// Returns `AppError::AllowList` if the file exists but cannot be read.
    pub async fn load(source: impl Into<PathBuf>) -> Result<Self, AppError> {
        let store = Self {
            source: source.into(),
            current: RwLock::new(Arc::new(AllowList::public())),
            public: Arc::new(AllowList::public()),
        };

        let initial = store.patterns().await?;
        tracing::info!(
            source = %store.source.display(),
            patterns = initial.patterns().len(),
            public = initial.version().is_none(),
            "Allow-list loaded"
        );

        Ok(store)
    }

    /// Path of the backing file
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Current allow-list, reloaded first if the file changed
    ///
    /// # Returns
    /// - the public list `["*"]` while the file is absent (cache untouched)
    /// - a freshly parsed list if the file's mtime advanced past the cache
    /// - the cached snapshot otherwise
    ///
    /// # Errors
    /// Any I/O failure other than "not found" is `AppError::AllowList`.
    /// It is never turned into the public default.
    pub async fn patterns(&self) -> Result<Arc<AllowList>, AppError> {
        let modified = match self.source_modified().await {
            Ok(Some(modified)) => modified,
            Ok(None) => return Ok(self.public.clone()),
            Err(e) => return Err(self.read_error(e)),
        };

        {
            let current = self.current.read().await;
            if current.is_current(modified) {
                return Ok(current.clone());
            }
        }

        let mut current = self.current.write().await;
        // Another request may have reloaded while we waited for the lock.
        if current.is_current(modified) {
            return Ok(current.clone());
        }

        let contents = match tokio::fs::read_to_string(&self.source).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(self.public.clone()),
            Err(e) => return Err(self.read_error(e)),
        };

        let fresh = Arc::new(AllowList::parse(&contents, modified));
        if fresh.patterns().is_empty() {
            tracing::warn!(
                source = %self.source.display(),
                "Allow-list file has no patterns; every identity will be denied"
            );
        }
        tracing::info!(
            source = %self.source.display(),
            patterns = fresh.patterns().len(),
            "Allow-list reloaded"
        );
        ALLOWLIST_RELOADS_TOTAL.inc();

        *current = fresh.clone();
        Ok(fresh)
    }

    async fn source_modified(&self) -> io::Result<Option<SystemTime>> {
        match tokio::fs::metadata(&self.source).await {
            Ok(metadata) => metadata.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read_error(&self, error: io::Error) -> AppError {
        AppError::AllowList(format!("{}: {}", self.source.display(), error))
    }
}
