//! Error types for fsgate
//!
//! This module defines the error hierarchy for the fsgate crate using `thiserror`.
//! Every fallible gate operation returns `Result<T, GateError>`.
//!
//! # Error Variants
//!
//! - [`GateError::PermissionDenied`]: At least one check of an operation failed
//! - [`GateError::ResolutionTimeout`]: Real-path resolution exceeded the configured bound
//! - [`GateError::ResolutionError`]: The path does not exist or cannot be resolved
//! - [`GateError::UnknownDescriptor`]: Lookup against an id never registered or already released
//! - [`GateError::ResourceExhausted`]: The live descriptor ceiling was reached
//! - [`GateError::InvalidPattern`]: A rule pattern is not a valid glob
//! - [`GateError::UnknownOperation`]: No operation table entry for a primitive name
//! - [`GateError::InvalidArgument`]: Operation arguments don't fit the table entry
//! - [`GateError::Io`]: Stream transfer and file opens (auto-converts from `std::io::Error`)
//! - [`GateError::Config`]: Configuration parsing (auto-converts from `serde_json::Error`)
//!
//! None of these are retried by the gate. Retry policy belongs to the caller.
//!
//! # Example
//!
//! ```rust
//! use fsgate::error::GateError;
//! use fsgate::permissions::PermissionKind;
//!
//! let err = GateError::PermissionDenied {
//!     operation: "read_file".to_string(),
//!     permission: PermissionKind::Read,
//!     path: "/etc/shadow".to_string(),
//! };
//! assert!(err.is_permission_denied());
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::permissions::PermissionKind;
use crate::tracker::DescriptorId;

/// The main error type for all fsgate operations
///
/// Path-bearing variants only ever carry the path string the caller supplied,
/// never the canonical path it resolved to, so symlink targets are not disclosed.
#[derive(Error, Debug)]
pub enum GateError {
    /// An operation check failed against the current rule set
    #[error("Permission denied: {operation} requires {permission} on {path}")]
    PermissionDenied {
        /// Name of the operation that was denied
        operation: String,
        /// The first permission that was missing
        permission: PermissionKind,
        /// The requested path or descriptor label
        path: String,
    },

    /// Real-path resolution did not finish in time
    ///
    /// The late result, if any, is discarded and never cached.
    #[error("Path resolution timed out after {timeout:?}: {path}")]
    ResolutionTimeout {
        /// The requested path
        path: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// The path does not exist or resolution failed
    #[error("Failed to resolve path {path}: {reason}")]
    ResolutionError {
        /// The requested path
        path: String,
        /// Underlying failure description
        reason: String,
    },

    /// The descriptor was never registered or was already released
    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(DescriptorId),

    /// Registering another descriptor would exceed the ceiling
    #[error("Descriptor limit reached: {limit} already open")]
    ResourceExhausted {
        /// The configured maximum
        limit: usize,
    },

    /// A rule pattern failed to compile
    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler error
        reason: String,
    },

    /// No table entry exists for the primitive
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The arguments passed for a primitive don't match its table entry
    #[error("Invalid argument for {operation}: {reason}")]
    InvalidArgument {
        /// Primitive name
        operation: String,
        /// What was wrong
        reason: String,
    },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl GateError {
    /// Whether this error is a permission denial
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GateError::PermissionDenied { .. })
    }
}
