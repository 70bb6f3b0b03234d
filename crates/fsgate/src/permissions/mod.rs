//! Permission taxonomy for file-system access control.
//!
//! Every intercepted primitive requires one or more [`PermissionKind`]s on the
//! paths it touches. A rule grants a [`PermissionSet`] to the paths its
//! pattern matches.
//!
//! # Kinds
//!
//! - `read` - Read file contents or list a directory
//! - `write` - Create, modify or truncate
//! - `delete` - Remove a single entry
//! - `delete-recursive` - Remove a directory tree
//! - `execute` - Run as a program
//! - `stat` - Query metadata or existence
//! - `chmod` - Change mode or ownership
//! - `traverse` - Reserved, never consulted
//!
//! # Examples
//!
//! ```rust
//! use fsgate::permissions::{PermissionKind, PermissionSet};
//!
//! let read_only = PermissionSet::from(PermissionKind::Read);
//! let mut read_write = read_only;
//! read_write.insert(PermissionKind::Write);
//!
//! assert!(read_write.contains(PermissionKind::Write));
//! assert!(!read_only.contains(PermissionKind::Write));
//! ```

mod kind;
mod set;

pub use kind::{PermissionKind, UnknownPermission};
pub use set::PermissionSet;
