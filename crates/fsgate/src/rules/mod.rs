//! Rule storage and precedence resolution.
//!
//! A [`Rule`] binds a glob [`RulePattern`] to a
//! [`PermissionSet`](crate::permissions::PermissionSet). The [`RuleStore`]
//! answers "what may be done at this canonical path right now" by selecting a
//! single winning rule.
//!
//! # Precedence
//!
//! 1. **Exact** - A pattern without wildcards beats any wildcard pattern
//! 2. **Specific** - More path segments beat fewer
//! 3. **First** - The earlier-registered rule wins remaining ties
//! 4. **Default** - No matching rule means no permissions
//!
//! Permissions are never inherited from an ancestor directory's rule, and never
//! unioned across rules.
//!
//! # Example
//!
//! ```rust
//! use fsgate::rules::RuleStore;
//! use fsgate::permissions::{PermissionKind::*, PermissionSet};
//! use std::path::Path;
//!
//! let store = RuleStore::new();
//! store.set_rule("/app/data/**", [Read, Write]).unwrap();
//! store.set_rule("/app/data/secret.json", PermissionSet::empty()).unwrap();
//!
//! assert!(store.effective_permissions(Path::new("/app/data/secret.json")).is_empty());
//! ```

mod pattern;
mod store;

pub use pattern::RulePattern;
pub use store::{Rule, RuleSpec, RuleStore};
