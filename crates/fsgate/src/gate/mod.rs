//! The decision engine
//!
//! A [`Gate`] ties the three stateful components together:
//!
//! ```text
//!            Operation { checks }
//!                   │
//!     ┌─────────────┴──────────────┐
//!     │ Target::Path               │ Target::Descriptor
//!     ▼                            ▼
//! Canonicalizer               DescriptorTracker
//!     │                            │
//!     └──────────► CanonicalPath ◄─┘
//!                       │
//!                       ▼
//!           RuleStore::effective_permissions
//!                       │
//!              Allow / Deny(first failing check)
//! ```
//!
//! Every decision reads the *current* rules. Nothing about a verdict is
//! remembered, so a revocation applies to the next operation on any path or
//! open descriptor.
//!
//! # Example
//!
//! ```no_run
//! use fsgate::prelude::*;
//!
//! # async fn example() -> Result<(), GateError> {
//! let gate = Gate::new(GateOptions::default())?;
//! gate.grant("/srv/app/**", [PermissionKind::Read, PermissionKind::Stat])?;
//!
//! let op = Operation::new("read_file").require_path("/srv/app/config.json", PermissionKind::Read);
//! let authorization = gate.check(&op).await?;
//! let real = authorization.primary_path().expect("one check");
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::canonical::{CanonicalPath, Canonicalizer, FsResolver, PathResolver, ResolveMode};
use crate::error::GateError;
use crate::options::GateOptions;
use crate::permissions::{PermissionKind, PermissionSet};
use crate::rules::{RuleSpec, RuleStore};
use crate::tracker::{DescriptorId, DescriptorTracker, HandleRegistration};

mod operation;
mod table;

pub use operation::{AuthorizedCheck, Authorization, Check, Denial, Operation, Target, Verdict};
pub use table::{ArgRequirement, OpArg, OpenMode, OperationTable, Requirement};

/// The permission decision engine
///
/// Cheap to clone; clones share rules, cache and tracker.
#[derive(Clone, Debug)]
pub struct Gate {
    rules: RuleStore,
    canonicalizer: Arc<Canonicalizer>,
    tracker: DescriptorTracker,
    table: Arc<OperationTable>,
}

impl Gate {
    /// Create a gate resolving paths on the local file system
    ///
    /// # Errors
    ///
    /// [`GateError::InvalidPattern`] if an initial rule does not compile.
    pub fn new(options: GateOptions) -> Result<Self, GateError> {
        Self::with_resolver(options, Arc::new(FsResolver))
    }

    /// Create a gate with a custom resolver
    pub fn with_resolver(
        options: GateOptions,
        resolver: Arc<dyn PathResolver>,
    ) -> Result<Self, GateError> {
        let rules = RuleStore::new();
        rules.set_rules(&options.rules)?;

        debug!(
            rules = rules.len(),
            max_descriptors = options.max_descriptors,
            cache_capacity = options.cache_capacity,
            "gate created"
        );

        Ok(Self {
            rules,
            canonicalizer: Arc::new(Canonicalizer::new(
                resolver,
                options.resolution_timeout,
                options.cache_capacity,
                options.cache_ttl,
            )),
            tracker: DescriptorTracker::new(options.max_descriptors),
            table: Arc::new(OperationTable::standard()),
        })
    }

    /// Replace the operation table used by [`authorize_call`](Self::authorize_call)
    pub fn with_table(mut self, table: OperationTable) -> Self {
        self.table = Arc::new(table);
        self
    }

    /// The rule store
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// The descriptor tracker
    pub fn tracker(&self) -> &DescriptorTracker {
        &self.tracker
    }

    /// The path canonicalizer
    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// The operation table
    pub fn table(&self) -> &OperationTable {
        &self.table
    }

    /// Add permissions for a pattern
    pub fn grant(
        &self,
        pattern: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<(), GateError> {
        self.rules.grant(pattern, permissions)
    }

    /// Remove permissions from a pattern
    pub fn revoke(&self, pattern: &str, permissions: impl Into<PermissionSet>) -> bool {
        self.rules.revoke(pattern, permissions)
    }

    /// Set the exact permissions of a pattern
    pub fn set_rule(
        &self,
        pattern: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<(), GateError> {
        self.rules.set_rule(pattern, permissions)
    }

    /// Atomically replace every rule
    pub fn set_rules(&self, specs: &[RuleSpec]) -> Result<(), GateError> {
        self.rules.set_rules(specs)
    }

    /// Decide whether `operation` may proceed
    ///
    /// Checks run in order and stop at the first failure. Resolution errors
    /// and unknown descriptors are returned as `Err`, not as a denial.
    pub async fn authorize(&self, operation: &Operation) -> Result<Verdict, GateError> {
        let mut authorization = Authorization::default();

        for (index, check) in operation.checks().iter().enumerate() {
            if check.permission.is_reserved() {
                trace!(operation = operation.name(), permission = %check.permission, "skipping reserved permission");
                continue;
            }

            let canonical = self.resolve_target(&check.target).await?;
            let granted = self.rules.effective_permissions(canonical.as_path());
            trace!(
                operation = operation.name(),
                canonical = %canonical,
                %granted,
                "evaluated check"
            );

            if !granted.contains(check.permission) {
                let target = check.target.label();
                debug!(
                    operation = operation.name(),
                    permission = %check.permission,
                    target = %target,
                    "denied"
                );
                return Ok(Verdict::Deny(Denial {
                    operation: operation.name().to_string(),
                    permission: check.permission,
                    target,
                    check_index: index,
                }));
            }

            authorization.checks.push(AuthorizedCheck {
                permission: check.permission,
                canonical_path: canonical,
            });
        }

        Ok(Verdict::Allow(authorization))
    }

    /// Like [`authorize`](Self::authorize), with a denial as
    /// [`GateError::PermissionDenied`]
    pub async fn check(&self, operation: &Operation) -> Result<Authorization, GateError> {
        self.authorize(operation).await?.into_result()
    }

    /// Build `name` from the operation table and authorize it
    ///
    /// # Errors
    ///
    /// Table errors ([`GateError::UnknownOperation`], [`GateError::InvalidArgument`])
    /// in addition to those of [`authorize`](Self::authorize).
    pub async fn authorize_call(&self, name: &str, args: &[OpArg]) -> Result<Verdict, GateError> {
        let operation = self.table.build(name, args)?;
        self.authorize(&operation).await
    }

    /// Authorize an open and bind `id` to the path it opened
    ///
    /// # Errors
    ///
    /// - [`GateError::PermissionDenied`] if the open is not allowed
    /// - [`GateError::ResourceExhausted`] if the descriptor ceiling is reached
    /// - [`GateError::InvalidArgument`] if the operation checks no path
    pub async fn open(
        &self,
        operation: &Operation,
        id: DescriptorId,
    ) -> Result<Authorization, GateError> {
        let authorization = self.check(operation).await?;
        let path = bound_path(operation, &authorization)?;
        self.tracker.register(id, path)?;
        Ok(authorization)
    }

    /// Authorize an open and register a fresh handle for it
    ///
    /// The handle slot is released when the registration is dropped.
    pub async fn open_handle(
        &self,
        operation: &Operation,
    ) -> Result<(Authorization, HandleRegistration), GateError> {
        let authorization = self.check(operation).await?;
        let path = bound_path(operation, &authorization)?;
        let registration = self.tracker.register_handle(path)?;
        Ok((authorization, registration))
    }

    /// Bind `id` to an already-authorized canonical path
    pub fn track_open(&self, id: DescriptorId, canonical: CanonicalPath) -> Result<(), GateError> {
        self.tracker.register(id, canonical)
    }

    /// Forget `id`; returns whether it was live
    pub fn track_close(&self, id: DescriptorId) -> bool {
        self.tracker.release(id)
    }

    /// Canonicalize `path` and report what the rules grant there
    pub async fn effective_permissions_for(
        &self,
        path: &Path,
    ) -> Result<PermissionSet, GateError> {
        let canonical = self
            .canonicalizer
            .canonicalize(path, ResolveMode::Existing)
            .await?;
        Ok(self.rules.effective_permissions(canonical.as_path()))
    }

    /// Authorize a single permission on a single path
    pub(crate) async fn check_path(
        &self,
        operation: &str,
        path: &Path,
        mode: ResolveMode,
        permission: PermissionKind,
    ) -> Result<Authorization, GateError> {
        let op = Operation::new(operation).require(
            Target::Path {
                path: path.to_path_buf(),
                mode,
            },
            permission,
        );
        self.check(&op).await
    }

    async fn resolve_target(&self, target: &Target) -> Result<CanonicalPath, GateError> {
        match target {
            Target::Path { path, mode } => self.canonicalizer.canonicalize(path, *mode).await,
            Target::Descriptor(id) => Ok(self.tracker.lookup(*id)?.canonical_path),
        }
    }
}

fn bound_path(
    operation: &Operation,
    authorization: &Authorization,
) -> Result<CanonicalPath, GateError> {
    authorization
        .primary_path()
        .cloned()
        .ok_or_else(|| GateError::InvalidArgument {
            operation: operation.name().to_string(),
            reason: "operation checks no path to bind".to_string(),
        })
}
