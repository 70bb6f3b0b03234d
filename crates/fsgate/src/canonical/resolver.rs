//! Real-path resolution against the file system.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::ResolveMode;

/// Maximum dangling symlinks followed while resolving a missing target
const MAX_SYMLINK_DEPTH: usize = 40;

/// Outcome of one real-path resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Absolute, symlink-free path
    pub path: PathBuf,
    /// `false` when the target was missing and was resolved against its
    /// nearest existing ancestor
    pub exists: bool,
}

impl Resolution {
    /// A resolution of a target that exists
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: true,
        }
    }
}

/// Resolves requested paths to their real form
///
/// [`FsResolver`] is the default. Implement this trait to put resolution
/// somewhere else (a virtual file system, a remote mount, a test double).
///
/// # Example
///
/// ```
/// use fsgate::canonical::{PathResolver, Resolution, ResolveMode};
/// use async_trait::async_trait;
/// use std::io;
/// use std::path::Path;
///
/// /// Treats every path as already canonical.
/// struct Identity;
///
/// #[async_trait]
/// impl PathResolver for Identity {
///     async fn resolve(&self, path: &Path, _mode: ResolveMode) -> io::Result<Resolution> {
///         Ok(Resolution::existing(path))
///     }
/// }
/// ```
#[async_trait]
pub trait PathResolver: Send + Sync {
    /// Resolve `path`, following every symbolic link
    ///
    /// # Errors
    ///
    /// Any I/O failure. `NotFound` in [`ResolveMode::Existing`] when the
    /// target is missing.
    async fn resolve(&self, path: &Path, mode: ResolveMode) -> io::Result<Resolution>;
}

/// Resolver backed by the host file system
///
/// Runs the blocking syscalls on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

#[async_trait]
impl PathResolver for FsResolver {
    async fn resolve(&self, path: &Path, mode: ResolveMode) -> io::Result<Resolution> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || resolve_blocking(&path, mode))
            .await
            .map_err(io::Error::other)?
    }
}

/// Resolve synchronously
///
/// In [`ResolveMode::MissingOk`], a missing target is resolved by walking
/// its components against the file system: symlinks met on the way are
/// followed (dangling ones included) and `..` always pops a directory that
/// has already been resolved, so the result names the place the OS would
/// actually create the target.
pub fn resolve_blocking(path: &Path, mode: ResolveMode) -> io::Result<Resolution> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path"));
    }

    match std::fs::canonicalize(path) {
        Ok(resolved) => Ok(Resolution::existing(resolved)),
        Err(e) if e.kind() == io::ErrorKind::NotFound && mode == ResolveMode::MissingOk => {
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()?.join(path)
            };
            resolve_missing(&absolute, 0)
        }
        Err(e) => Err(e),
    }
}

fn resolve_missing(path: &Path, depth: usize) -> io::Result<Resolution> {
    if depth > MAX_SYMLINK_DEPTH {
        return Err(io::Error::other("too many levels of symbolic links"));
    }

    let components: Vec<Component<'_>> = path.components().collect();
    // `resolved` is canonical except for its last `missing` components,
    // which do not exist and so cannot be links
    let mut resolved = PathBuf::new();
    let mut missing = 0usize;
    let mut ever_missing = false;

    for (idx, component) in components.iter().enumerate() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                missing = missing.saturating_sub(1);
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                if missing > 0 {
                    resolved = candidate;
                    missing += 1;
                    continue;
                }

                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        match std::fs::canonicalize(&candidate) {
                            Ok(real) => resolved = real,
                            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                                // Dangling: continue from the link target
                                let target = std::fs::read_link(&candidate)?;
                                let mut next = resolved.join(target);
                                for rest in &components[idx + 1..] {
                                    next.push(rest);
                                }
                                return resolve_missing(&next, depth + 1);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    Ok(_) => resolved = candidate,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        resolved = candidate;
                        missing = 1;
                        ever_missing = true;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(Resolution {
        path: resolved,
        exists: !ever_missing,
    })
}
