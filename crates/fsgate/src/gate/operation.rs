//! Operation descriptors and verdicts.

use std::path::{Path, PathBuf};

use crate::canonical::{CanonicalPath, ResolveMode};
use crate::error::GateError;
use crate::permissions::PermissionKind;
use crate::tracker::DescriptorId;

/// What a check is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A path still to be canonicalized
    Path {
        /// Path as requested by the caller
        path: PathBuf,
        /// Whether the target may be missing
        mode: ResolveMode,
    },
    /// An already-open descriptor or handle
    Descriptor(DescriptorId),
}

impl Target {
    /// A path that must exist
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Target::Path {
            path: path.into(),
            mode: ResolveMode::Existing,
        }
    }

    /// A path the operation may create
    pub fn creatable(path: impl Into<PathBuf>) -> Self {
        Target::Path {
            path: path.into(),
            mode: ResolveMode::MissingOk,
        }
    }

    /// Caller-visible label: the requested path or the descriptor id
    pub fn label(&self) -> String {
        match self {
            Target::Path { path, .. } => path.display().to_string(),
            Target::Descriptor(id) => id.to_string(),
        }
    }
}

impl From<DescriptorId> for Target {
    fn from(id: DescriptorId) -> Self {
        Target::Descriptor(id)
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        Target::path(path)
    }
}

impl From<PathBuf> for Target {
    fn from(path: PathBuf) -> Self {
        Target::path(path)
    }
}

/// One (target, required permission) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// What is accessed
    pub target: Target,
    /// What must be granted there
    pub permission: PermissionKind,
}

/// An intercepted call, reduced to the checks it needs
///
/// Multi-path primitives (rename, copy, link) carry one check per side; all
/// of them must pass. An operation without checks is always allowed.
///
/// # Example
///
/// ```
/// use fsgate::gate::Operation;
/// use fsgate::permissions::PermissionKind;
///
/// let rename = Operation::new("rename")
///     .require_path("/app/old.txt", PermissionKind::Delete)
///     .require_creatable("/app/new.txt", PermissionKind::Write);
/// assert_eq!(rename.checks().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    checks: Vec<Check>,
}

impl Operation {
    /// An operation with no checks yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
        }
    }

    /// Add a check
    pub fn require(mut self, target: impl Into<Target>, permission: PermissionKind) -> Self {
        self.checks.push(Check {
            target: target.into(),
            permission,
        });
        self
    }

    /// Require `permission` on an existing path
    pub fn require_path(self, path: impl Into<PathBuf>, permission: PermissionKind) -> Self {
        self.require(Target::path(path), permission)
    }

    /// Require `permission` on a path the operation may create
    pub fn require_creatable(self, path: impl Into<PathBuf>, permission: PermissionKind) -> Self {
        self.require(Target::creatable(path), permission)
    }

    /// Require `permission` on an open descriptor
    pub fn require_descriptor(self, id: DescriptorId, permission: PermissionKind) -> Self {
        self.require(id, permission)
    }

    /// Append a check in place
    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Primitive name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks in evaluation order
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }
}

/// A check that passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCheck {
    /// The permission that was granted
    pub permission: PermissionKind,
    /// Where it was granted
    pub canonical_path: CanonicalPath,
}

/// Proof that every check of an operation passed
///
/// Carries the canonical paths so the call site can act on exactly what was
/// authorized. Not for display to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Authorization {
    pub(crate) checks: Vec<AuthorizedCheck>,
}

impl Authorization {
    /// Authorized checks in evaluation order (reserved-permission checks omitted)
    pub fn checks(&self) -> &[AuthorizedCheck] {
        &self.checks
    }

    /// Canonical path of the first check, the one an open binds to
    pub fn primary_path(&self) -> Option<&CanonicalPath> {
        self.checks.first().map(|c| &c.canonical_path)
    }
}

/// Why an operation was denied
///
/// `target` is what the caller supplied, never the resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Primitive name
    pub operation: String,
    /// The first missing permission
    pub permission: PermissionKind,
    /// Requested path or descriptor label
    pub target: String,
    /// Position of the failing check
    pub check_index: usize,
}

impl Denial {
    /// Convert into the error a direct call would raise
    pub fn into_error(self) -> GateError {
        GateError::PermissionDenied {
            operation: self.operation,
            permission: self.permission,
            path: self.target,
        }
    }
}

/// Outcome of [`Gate::authorize`](super::Gate::authorize)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every check passed
    Allow(Authorization),
    /// At least one check failed
    Deny(Denial),
}

impl Verdict {
    /// Whether the operation may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }

    /// `Allow` as `Ok`, `Deny` as [`GateError::PermissionDenied`]
    pub fn into_result(self) -> Result<Authorization, GateError> {
        match self {
            Verdict::Allow(authorization) => Ok(authorization),
            Verdict::Deny(denial) => Err(denial.into_error()),
        }
    }
}
