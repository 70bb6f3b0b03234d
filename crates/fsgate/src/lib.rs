//! fsgate - path-based permission decisions for file-system access
//!
//! fsgate decides whether a file-system operation may proceed. Access is
//! granted by glob rules mapped to permission sets; everything else is denied.
//!
//! # Overview
//!
//! - Rules are matched against the *canonical* path, so symlinks and relative
//!   components can't be used to reach a path the rules don't allow
//! - Exactly one rule decides for a path: exact beats wildcard, more path
//!   segments beat fewer, earlier insertion breaks ties
//! - Open descriptors and stream handles stay bound to the path they were
//!   authorized on, and every later use is re-checked against the current rules
//! - Denials name the path the caller supplied, never where it resolved to
//!
//! # Architecture
//!
//! - `rules`: the rule store and pattern precedence
//! - `canonical`: real-path resolution with a timeout and a TTL/LRU cache
//! - `tracker`: descriptor and handle bindings with a ceiling
//! - `gate`: the decision engine and the operation table
//! - `stream`: authorize-once byte streams with re-checked linking
//! - `options`: configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,no_run
//! use fsgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GateError> {
//!     let options = GateOptions::builder()
//!         .rule("/srv/app/**", [PermissionKind::Read, PermissionKind::Stat])
//!         .rule("/srv/app/uploads/**", PermissionSet::all())
//!         .build();
//!     let gate = Gate::new(options)?;
//!
//!     let verdict = gate
//!         .authorize_call("rename", &["/srv/app/uploads/a.tmp".into(), "/srv/app/a.txt".into()])
//!         .await?;
//!
//!     match verdict {
//!         Verdict::Allow(_) => println!("allowed"),
//!         Verdict::Deny(denial) => println!("{}", denial.into_error()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! fsgate emits [`tracing`] events and installs no subscriber. Denials are
//! logged at `debug`, timeouts and descriptor rebinds at `warn`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types
///
/// This module defines the `GateError` enum covering every failure:
///
/// - `PermissionDenied` - A check failed against the current rules
/// - `ResolutionTimeout` - Real-path resolution exceeded its bound
/// - `ResolutionError` - The path could not be resolved
/// - `UnknownDescriptor` - The descriptor is not tracked
/// - `ResourceExhausted` - The descriptor ceiling was reached
/// - `InvalidPattern` - A rule glob did not compile
/// - `UnknownOperation` / `InvalidArgument` - Operation table lookup failures
/// - `Io` - I/O failures (auto-converts from `std::io::Error`)
/// - `Config` - Configuration parse failures (auto-converts from `serde_json::Error`)
pub mod error;

/// Permission kinds and sets
pub mod permissions;

/// Rule patterns and the rule store
///
/// See `RuleStore` for precedence rules.
pub mod rules;

/// Path canonicalization
///
/// `Canonicalizer` resolves requested paths through a `PathResolver`
/// (`FsResolver` by default) under a timeout, caching results for a bounded
/// time.
pub mod canonical;

/// Descriptor and handle tracking
pub mod tracker;

/// The decision engine
///
/// `Gate` evaluates `Operation`s built by hand or from the `OperationTable`.
pub mod gate;

/// Configuration options and builder
pub mod options;

/// Guarded byte streams
pub mod stream;

// Prelude module for common imports
pub mod prelude {
    //! Common imports for fsgate users
    //!
    //! Use `use fsgate::prelude::*;` to import commonly used types.

    pub use crate::canonical::{CanonicalPath, FsResolver, PathResolver, ResolveMode};
    pub use crate::error::GateError;
    pub use crate::gate::{
        Authorization, Denial, Gate, OpArg, Operation, OperationTable, Target, Verdict,
    };
    pub use crate::options::GateOptions;
    pub use crate::permissions::{PermissionKind, PermissionSet};
    pub use crate::rules::{RuleSpec, RuleStore};
    pub use crate::stream::{GuardedReader, GuardedWriter};
    pub use crate::tracker::{DescriptorId, DescriptorTracker, HandleRegistration};
}
