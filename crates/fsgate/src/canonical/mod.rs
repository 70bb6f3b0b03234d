//! Path canonicalization with timeout and a time-bounded cache.
//!
//! Permission intent is defined on real files, not link names, so every
//! requested path is resolved to its [`CanonicalPath`] before rules are
//! consulted. Resolution always follows symbolic links.
//!
//! # Architecture
//!
//! ```text
//! canonicalize(path)
//!   │
//!   ├─ cache hit (fresh)? ──────────────► CanonicalPath
//!   │
//!   ├─ timeout(resolver.resolve(path))
//!   │     ├─ elapsed ──► ResolutionTimeout   (late result dropped)
//!   │     ├─ io error ─► ResolutionError
//!   │     └─ ok ───────► cache insert (absolute + existing only)
//!   ▼
//! CanonicalPath
//! ```
//!
//! The cache only affects latency. A result is trusted for at most the TTL.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::error::GateError;

mod cache;
mod resolver;

pub use cache::ResolvedEntry;
pub use resolver::{FsResolver, PathResolver, Resolution, resolve_blocking};

use cache::ResolutionCache;

/// How to treat a target that does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolveMode {
    /// The target must exist
    #[default]
    Existing,
    /// The target may be created by the operation; resolve against the
    /// nearest existing ancestor
    MissingOk,
}

/// The absolute, symlink-free form of a path
///
/// Two requested paths with the same canonical path are permission-equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath(PathBuf);

impl CanonicalPath {
    /// Wrap a path the caller already knows to be canonical
    ///
    /// Intended for custom resolvers and tests. No file-system access happens.
    pub fn assume_canonical(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrow as a `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Unwrap into a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for CanonicalPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolves requested paths to canonical form
///
/// # Example
///
/// ```no_run
/// use fsgate::canonical::{Canonicalizer, FsResolver, ResolveMode};
/// use std::path::Path;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), fsgate::error::GateError> {
/// let canonicalizer = Canonicalizer::new(
///     Arc::new(FsResolver),
///     Duration::from_secs(5),
///     10_000,
///     Duration::from_secs(3600),
/// );
/// let real = canonicalizer
///     .canonicalize(Path::new("/tmp/../tmp"), ResolveMode::Existing)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Canonicalizer {
    resolver: Arc<dyn PathResolver>,
    cache: ResolutionCache,
    timeout: Duration,
}

impl Canonicalizer {
    /// Create a canonicalizer
    ///
    /// # Arguments
    ///
    /// * `resolver` - Performs the actual real-path resolution
    /// * `resolution_timeout` - Bound on a single resolution
    /// * `cache_capacity` - Maximum cached entries (0 disables caching)
    /// * `cache_ttl` - How long a cached resolution may be reused
    pub fn new(
        resolver: Arc<dyn PathResolver>,
        resolution_timeout: Duration,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            cache: ResolutionCache::new(cache_capacity, cache_ttl),
            timeout: resolution_timeout,
        }
    }

    /// Resolve `path` to its canonical form
    ///
    /// # Errors
    ///
    /// - [`GateError::ResolutionTimeout`] if the resolver does not finish in time
    /// - [`GateError::ResolutionError`] if the path cannot be resolved (including
    ///   a missing target in [`ResolveMode::Existing`])
    pub async fn canonicalize(
        &self,
        path: &Path,
        mode: ResolveMode,
    ) -> Result<CanonicalPath, GateError> {
        let key = cache_key(path);

        if let Some(key) = key {
            if let Some(hit) = self.cache.get(key) {
                trace!(path = key, "canonicalize cache hit");
                return Ok(hit);
            }
            trace!(path = key, "canonicalize cache miss");
        }

        let resolution = match timeout(self.timeout, self.resolver.resolve(path, mode)).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                return Err(GateError::ResolutionError {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(path = %path.display(), timeout = ?self.timeout, "path resolution timed out");
                return Err(GateError::ResolutionTimeout {
                    path: path.display().to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let canonical = CanonicalPath(resolution.path);
        if let (Some(key), true) = (key, resolution.exists) {
            self.cache.insert(key.to_string(), canonical.clone());
        }
        Ok(canonical)
    }

    /// Drop any cached resolution for `path`
    pub fn invalidate(&self, path: &Path) -> bool {
        cache_key(path).is_some_and(|key| self.cache.invalidate(key))
    }

    /// Drop every cached resolution
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached resolutions, including expired ones not yet dropped
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// The cached entry for `path`, if any, regardless of age
    pub fn cached_entry(&self, path: &Path) -> Option<ResolvedEntry> {
        cache_key(path).and_then(|key| self.cache.peek(key))
    }

    /// The configured resolution bound
    pub fn resolution_timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canonicalizer")
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Relative paths depend on the working directory and are never cached.
fn cache_key(path: &Path) -> Option<&str> {
    if path.is_absolute() { path.to_str() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolves from a fixed table and counts calls
    struct TableResolver {
        table: HashMap<PathBuf, Resolution>,
        calls: AtomicUsize,
    }

    impl TableResolver {
        fn new(entries: &[(&str, &str, bool)]) -> Self {
            let table = entries
                .iter()
                .map(|(from, to, exists)| {
                    (
                        PathBuf::from(from),
                        Resolution {
                            path: PathBuf::from(to),
                            exists: *exists,
                        },
                    )
                })
                .collect();
            Self {
                table,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PathResolver for TableResolver {
        async fn resolve(&self, path: &Path, _mode: ResolveMode) -> io::Result<Resolution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    /// Never finishes within any sane timeout
    struct SlowResolver;

    #[async_trait]
    impl PathResolver for SlowResolver {
        async fn resolve(&self, path: &Path, _mode: ResolveMode) -> io::Result<Resolution> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Resolution::existing(path))
        }
    }

    fn canonicalizer(resolver: Arc<dyn PathResolver>) -> Canonicalizer {
        Canonicalizer::new(
            resolver,
            Duration::from_millis(5000),
            100,
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_aliases_resolve_to_same_canonical() {
        let resolver = Arc::new(TableResolver::new(&[
            ("/link/x.json", "/app/data/x.json", true),
            ("/app/data/x.json", "/app/data/x.json", true),
        ]));
        let c = canonicalizer(resolver);

        let a = c.canonicalize(Path::new("/link/x.json"), ResolveMode::Existing).await.unwrap();
        let b = c.canonicalize(Path::new("/app/data/x.json"), ResolveMode::Existing).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let resolver = Arc::new(TableResolver::new(&[("/a", "/real/a", true)]));
        let c = canonicalizer(resolver.clone());

        let first = c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();
        let second = c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.cached_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_re_resolved() {
        let resolver = Arc::new(TableResolver::new(&[("/a", "/real/a", true)]));
        let c = canonicalizer(resolver.clone());

        c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_targets_are_not_cached() {
        let resolver = Arc::new(TableResolver::new(&[("/dir/new.txt", "/real/dir/new.txt", false)]));
        let c = canonicalizer(resolver.clone());

        for _ in 0..3 {
            let p = c.canonicalize(Path::new("/dir/new.txt"), ResolveMode::MissingOk).await.unwrap();
            assert_eq!(p.as_path(), Path::new("/real/dir/new.txt"));
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert_eq!(c.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_relative_paths_are_not_cached() {
        let resolver = Arc::new(TableResolver::new(&[("rel/a", "/cwd/rel/a", true)]));
        let c = canonicalizer(resolver.clone());

        c.canonicalize(Path::new("rel/a"), ResolveMode::Existing).await.unwrap();
        c.canonicalize(Path::new("rel/a"), ResolveMode::Existing).await.unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolution_error() {
        let c = canonicalizer(Arc::new(TableResolver::new(&[])));
        let err = c
            .canonicalize(Path::new("/missing"), ResolveMode::Existing)
            .await
            .unwrap_err();
        match err {
            GateError::ResolutionError { path, .. } => assert_eq!(path, "/missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_authoritative() {
        let c = canonicalizer(Arc::new(SlowResolver));
        let err = c
            .canonicalize(Path::new("/slow"), ResolveMode::Existing)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::ResolutionTimeout { .. }));
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(c.cached_len(), 0);
        assert!(c.cached_entry(Path::new("/slow")).is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let resolver = Arc::new(TableResolver::new(&[("/a", "/real/a", true)]));
        let c = canonicalizer(resolver.clone());

        c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();
        assert!(c.invalidate(Path::new("/a")));
        c.canonicalize(Path::new("/a"), ResolveMode::Existing).await.unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

        c.clear();
        assert_eq!(c.cached_len(), 0);
    }

    #[test]
    fn test_canonical_path_display() {
        let p = CanonicalPath::assume_canonical("/app/x");
        assert_eq!(p.to_string(), "/app/x");
        assert_eq!(p.as_ref(), Path::new("/app/x"));
    }
}
