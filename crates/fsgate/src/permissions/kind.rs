//! The closed permission taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single kind of file-system permission
///
/// # Examples
///
/// ```
/// use fsgate::permissions::PermissionKind;
///
/// let kind: PermissionKind = "delete-recursive".parse().unwrap();
/// assert_eq!(kind, PermissionKind::DeleteRecursive);
/// assert_eq!(kind.to_string(), "delete-recursive");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionKind {
    /// Read file contents or list a directory
    Read,
    /// Create, modify or truncate
    Write,
    /// Remove a single entry
    Delete,
    /// Remove a directory tree
    #[serde(alias = "delete_recursive")]
    DeleteRecursive,
    /// Run as a program
    Execute,
    /// Query metadata or existence
    Stat,
    /// Change mode or ownership
    Chmod,
    /// Reserved. Never consulted by the gate; checks requiring it always pass.
    Traverse,
}

impl PermissionKind {
    /// Every kind, in bit order
    pub const ALL: [PermissionKind; 8] = [
        PermissionKind::Read,
        PermissionKind::Write,
        PermissionKind::Delete,
        PermissionKind::DeleteRecursive,
        PermissionKind::Execute,
        PermissionKind::Stat,
        PermissionKind::Chmod,
        PermissionKind::Traverse,
    ];

    /// Canonical kebab-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Read => "read",
            PermissionKind::Write => "write",
            PermissionKind::Delete => "delete",
            PermissionKind::DeleteRecursive => "delete-recursive",
            PermissionKind::Execute => "execute",
            PermissionKind::Stat => "stat",
            PermissionKind::Chmod => "chmod",
            PermissionKind::Traverse => "traverse",
        }
    }

    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Whether the gate consults this kind at all
    pub fn is_reserved(&self) -> bool {
        matches!(self, PermissionKind::Traverse)
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown permission name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermission(pub String);

impl fmt::Display for UnknownPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission '{}'", self.0)
    }
}

impl std::error::Error for UnknownPermission {}

impl FromStr for PermissionKind {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PermissionKind::Read),
            "write" => Ok(PermissionKind::Write),
            "delete" => Ok(PermissionKind::Delete),
            "delete-recursive" | "delete_recursive" => Ok(PermissionKind::DeleteRecursive),
            "execute" => Ok(PermissionKind::Execute),
            "stat" => Ok(PermissionKind::Stat),
            "chmod" => Ok(PermissionKind::Chmod),
            "traverse" => Ok(PermissionKind::Traverse),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}
