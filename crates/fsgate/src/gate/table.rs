//! Static mapping from primitive names to the checks they require.

use std::collections::HashMap;
use std::path::PathBuf;

use super::operation::{Operation, Target};
use crate::canonical::ResolveMode;
use crate::error::GateError;
use crate::permissions::PermissionKind;
use crate::tracker::DescriptorId;

/// Access requested by an open-style flags argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only
    Read,
    /// Write, append or truncate
    Write,
    /// Both
    ReadWrite,
}

impl OpenMode {
    /// Parse a flags string such as `"r"`, `"w+"` or `"ax"`
    ///
    /// Returns the mode and whether the flags may create the target.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsgate::gate::OpenMode;
    ///
    /// assert_eq!(OpenMode::parse("r"), Some((OpenMode::Read, false)));
    /// assert_eq!(OpenMode::parse("r+"), Some((OpenMode::ReadWrite, false)));
    /// assert_eq!(OpenMode::parse("a"), Some((OpenMode::Write, true)));
    /// assert_eq!(OpenMode::parse("bogus"), None);
    /// ```
    pub fn parse(flags: &str) -> Option<(OpenMode, bool)> {
        match flags {
            "r" | "rs" | "sr" => Some((OpenMode::Read, false)),
            "r+" | "rs+" | "sr+" => Some((OpenMode::ReadWrite, false)),
            "w" | "wx" | "xw" | "a" | "ax" | "xa" | "as" | "sa" => Some((OpenMode::Write, true)),
            "w+" | "wx+" | "xw+" | "a+" | "ax+" | "xa+" | "as+" | "sa+" => {
                Some((OpenMode::ReadWrite, true))
            }
            _ => None,
        }
    }

    /// Permissions required, in check order
    pub fn permissions(&self) -> &'static [PermissionKind] {
        match self {
            OpenMode::Read => &[PermissionKind::Read],
            OpenMode::Write => &[PermissionKind::Write],
            OpenMode::ReadWrite => &[PermissionKind::Read, PermissionKind::Write],
        }
    }
}

/// How the required permission of an argument is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Always this permission
    Fixed(PermissionKind),
    /// Decided by the flags at `mode_position`; absent flags mean `"r"`
    FromOpenMode {
        /// Argument position of the flags
        mode_position: usize,
    },
}

/// One path-bearing argument of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgRequirement {
    /// Argument position
    pub position: usize,
    /// Required permission
    pub requirement: Requirement,
    /// Whether the primitive may create the target
    pub missing_ok: bool,
}

impl ArgRequirement {
    /// A fixed permission on an existing target
    pub const fn fixed(position: usize, permission: PermissionKind) -> Self {
        Self {
            position,
            requirement: Requirement::Fixed(permission),
            missing_ok: false,
        }
    }

    /// A fixed permission on a target that may be created
    pub const fn creating(position: usize, permission: PermissionKind) -> Self {
        Self {
            position,
            requirement: Requirement::Fixed(permission),
            missing_ok: true,
        }
    }

    /// Permission decided by an open-flags argument
    pub const fn open_mode(position: usize, mode_position: usize) -> Self {
        Self {
            position,
            requirement: Requirement::FromOpenMode { mode_position },
            missing_ok: false,
        }
    }
}

/// An argument as seen by the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpArg {
    /// A path argument
    Path(PathBuf),
    /// A descriptor argument
    Descriptor(DescriptorId),
    /// An open-flags argument
    Flags(String),
    /// Anything the table doesn't inspect
    Other,
}

impl From<&str> for OpArg {
    fn from(path: &str) -> Self {
        OpArg::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for OpArg {
    fn from(path: PathBuf) -> Self {
        OpArg::Path(path)
    }
}

impl From<DescriptorId> for OpArg {
    fn from(id: DescriptorId) -> Self {
        OpArg::Descriptor(id)
    }
}

/// Maps primitive names to the (argument, permission) pairs they require
///
/// # Example
///
/// ```
/// use fsgate::gate::{OpArg, OperationTable};
/// use fsgate::permissions::PermissionKind;
///
/// let table = OperationTable::standard();
/// let op = table
///     .build("rename", &["/app/a.txt".into(), "/app/b.txt".into()])
///     .unwrap();
///
/// assert_eq!(op.checks()[0].permission, PermissionKind::Delete);
/// assert_eq!(op.checks()[1].permission, PermissionKind::Write);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    entries: HashMap<String, Vec<ArgRequirement>>,
}

impl OperationTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The default table for common file-system primitives
    pub fn standard() -> Self {
        use ArgRequirement as A;
        use PermissionKind::*;

        let mut table = Self::new();
        let entries: &[(&str, &[ArgRequirement])] = &[
            // Metadata
            ("access", &[A::fixed(0, Stat)]),
            ("exists", &[A::creating(0, Stat)]),
            ("stat", &[A::fixed(0, Stat)]),
            ("lstat", &[A::fixed(0, Stat)]),
            ("realpath", &[A::fixed(0, Stat)]),
            ("fstat", &[A::fixed(0, Stat)]),
            // Contents
            ("read_file", &[A::fixed(0, Read)]),
            ("readlink", &[A::fixed(0, Read)]),
            ("read", &[A::fixed(0, Read)]),
            ("create_read_stream", &[A::fixed(0, Read)]),
            ("write_file", &[A::creating(0, Write)]),
            ("append_file", &[A::creating(0, Write)]),
            ("create_write_stream", &[A::creating(0, Write)]),
            ("write", &[A::fixed(0, Write)]),
            ("truncate", &[A::fixed(0, Write)]),
            ("ftruncate", &[A::fixed(0, Write)]),
            ("fsync", &[A::fixed(0, Write)]),
            ("utimes", &[A::fixed(0, Write)]),
            ("open", &[A::open_mode(0, 1)]),
            // Directories
            ("mkdir", &[A::creating(0, Write)]),
            ("mkdtemp", &[A::creating(0, Write)]),
            ("readdir", &[A::fixed(0, Read)]),
            ("opendir", &[A::fixed(0, Read)]),
            ("watch", &[A::fixed(0, Read)]),
            // Removal
            ("unlink", &[A::fixed(0, Delete)]),
            ("rmdir", &[A::fixed(0, Delete)]),
            ("rm", &[A::fixed(0, DeleteRecursive)]),
            // Multi-path
            ("rename", &[A::fixed(0, Delete), A::creating(1, Write)]),
            ("copy_file", &[A::fixed(0, Read), A::creating(1, Write)]),
            ("link", &[A::fixed(0, Read), A::creating(1, Write)]),
            ("symlink", &[A::creating(1, Write)]),
            // Mode and ownership
            ("chmod", &[A::fixed(0, Chmod)]),
            ("chown", &[A::fixed(0, Chmod)]),
            ("fchmod", &[A::fixed(0, Chmod)]),
            ("fchown", &[A::fixed(0, Chmod)]),
            // Execution
            ("execute", &[A::fixed(0, Execute)]),
            // No authorization needed
            ("close", &[]),
            ("unwatch", &[]),
        ];

        for (name, reqs) in entries {
            table.insert(*name, reqs.to_vec());
        }
        table
    }

    /// Add or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, requirements: Vec<ArgRequirement>) {
        self.entries.insert(name.into(), requirements);
    }

    /// The entry for `name`
    pub fn get(&self, name: &str) -> Option<&[ArgRequirement]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn a primitive call into an [`Operation`]
    ///
    /// # Errors
    ///
    /// - [`GateError::UnknownOperation`] if `name` has no entry
    /// - [`GateError::InvalidArgument`] if a required argument is missing, of
    ///   the wrong kind, or has unrecognized open flags
    pub fn build(&self, name: &str, args: &[OpArg]) -> Result<Operation, GateError> {
        let requirements = self
            .get(name)
            .ok_or_else(|| GateError::UnknownOperation(name.to_string()))?;

        let invalid = |reason: String| GateError::InvalidArgument {
            operation: name.to_string(),
            reason,
        };

        let mut operation = Operation::new(name);
        for req in requirements {
            let (permissions, missing_ok): (&[PermissionKind], bool) = match req.requirement {
                Requirement::Fixed(ref kind) => (std::slice::from_ref(kind), req.missing_ok),
                Requirement::FromOpenMode { mode_position } => {
                    let flags = match args.get(mode_position) {
                        None | Some(OpArg::Other) => "r",
                        Some(OpArg::Flags(flags)) => flags.as_str(),
                        Some(other) => {
                            return Err(invalid(format!(
                                "argument {mode_position} must be open flags, got {other:?}"
                            )));
                        }
                    };
                    let (mode, creates) = OpenMode::parse(flags)
                        .ok_or_else(|| invalid(format!("unrecognized open flags '{flags}'")))?;
                    (mode.permissions(), creates || req.missing_ok)
                }
            };

            let target = match args.get(req.position) {
                Some(OpArg::Path(path)) => Target::Path {
                    path: path.clone(),
                    mode: if missing_ok {
                        ResolveMode::MissingOk
                    } else {
                        ResolveMode::Existing
                    },
                },
                Some(OpArg::Descriptor(id)) => Target::Descriptor(*id),
                Some(other) => {
                    return Err(invalid(format!(
                        "argument {} must be a path or descriptor, got {other:?}",
                        req.position
                    )));
                }
                None => {
                    return Err(invalid(format!("missing argument {}", req.position)));
                }
            };

            for permission in permissions {
                operation = operation.require(target.clone(), *permission);
            }
        }
        Ok(operation)
    }
}
