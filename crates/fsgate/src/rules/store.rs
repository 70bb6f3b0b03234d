//! Shared, linearizable rule collection.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::GateError;
use crate::permissions::PermissionSet;
use crate::rules::RulePattern;

/// A rule as supplied by configuration or by [`RuleStore::set_rules`]
///
/// # Example
///
/// ```
/// use fsgate::rules::RuleSpec;
///
/// let spec: RuleSpec = serde_json::from_str(
///     r#"{ "pattern": "/srv/**", "permissions": ["read", "stat"] }"#,
/// ).unwrap();
/// assert_eq!(spec.pattern, "/srv/**");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Glob pattern
    pub pattern: String,
    /// Permissions granted to matching paths
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl RuleSpec {
    /// Create a rule spec
    pub fn new(pattern: impl Into<String>, permissions: impl Into<PermissionSet>) -> Self {
        Self {
            pattern: pattern.into(),
            permissions: permissions.into(),
        }
    }
}

/// A stored rule with its precedence rank
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: RulePattern,
    permissions: PermissionSet,
    sequence: u64,
}

impl Rule {
    /// The compiled pattern
    pub fn pattern(&self) -> &RulePattern {
        &self.pattern
    }

    /// Granted permissions
    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    /// Insertion index. Lower registers first and wins ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether `self` takes precedence over `other`
    fn outranks(&self, other: &Rule) -> bool {
        self.pattern
            .specificity_cmp(&other.pattern)
            .then(other.sequence.cmp(&self.sequence))
            .is_gt()
    }
}

#[derive(Debug, Default)]
struct RuleSet {
    /// Kept sorted by sequence
    rules: Vec<Rule>,
    next_sequence: u64,
}

impl RuleSet {
    fn position(&self, pattern: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.pattern.as_str() == pattern)
    }

    fn upsert(&mut self, pattern: RulePattern, update: impl FnOnce(PermissionSet) -> PermissionSet) {
        match self.position(pattern.as_str()) {
            Some(idx) => {
                let rule = &mut self.rules[idx];
                rule.permissions = update(rule.permissions);
            }
            None => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.rules.push(Rule {
                    pattern,
                    permissions: update(PermissionSet::empty()),
                    sequence,
                });
            }
        }
    }

    fn winner(&self, path: &Path) -> Option<&Rule> {
        let mut best: Option<&Rule> = None;
        for rule in self.rules.iter().filter(|r| r.pattern.matches(path)) {
            best = match best {
                Some(current) if !rule.outranks(current) => Some(current),
                _ => Some(rule),
            };
        }
        best
    }
}

/// Holds permission rules and answers precedence queries
///
/// Exactly one matching rule decides a path's permissions; sets are never
/// unioned across rules. Precedence among matching rules:
///
/// 1. An exact pattern beats any wildcard pattern
/// 2. More path segments beat fewer
/// 3. The earlier-registered rule wins
///
/// A path no rule matches gets the empty set.
///
/// # Thread Safety
///
/// The rule collection sits behind a single `RwLock`. Every mutation is visible
/// to every query that starts after it returns. Clones share the same rules.
///
/// # Example
///
/// ```
/// use fsgate::rules::RuleStore;
/// use fsgate::permissions::{PermissionKind::*, PermissionSet};
/// use std::path::Path;
///
/// let store = RuleStore::new();
/// store.set_rule("/app/**", Read).unwrap();
/// store.set_rule("/app/data/**", [Read, Write]).unwrap();
///
/// assert_eq!(
///     store.effective_permissions(Path::new("/app/data/x.json")),
///     PermissionSet::from([Read, Write])
/// );
/// assert_eq!(
///     store.effective_permissions(Path::new("/app/other.txt")),
///     PermissionSet::from(Read)
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct RuleStore {
    inner: Arc<RwLock<RuleSet>>,
}

impl RuleStore {
    /// Create an empty store (everything denied)
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule or replace the permissions of an existing pattern
    ///
    /// A replaced rule keeps its original sequence so repeated grants never
    /// jump precedence. An empty set is a legal explicit-deny rule.
    pub fn set_rule(
        &self,
        pattern: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<(), GateError> {
        let compiled = RulePattern::new(pattern)?;
        let permissions = permissions.into();
        debug!(pattern = compiled.as_str(), %permissions, "set rule");
        self.inner.write().upsert(compiled, |_| permissions);
        Ok(())
    }

    /// Add permissions to a pattern, inserting the rule if needed
    pub fn grant(
        &self,
        pattern: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<(), GateError> {
        let compiled = RulePattern::new(pattern)?;
        let permissions = permissions.into();
        debug!(pattern = compiled.as_str(), %permissions, "grant");
        self.inner
            .write()
            .upsert(compiled, |existing| existing.union(permissions));
        Ok(())
    }

    /// Subtract permissions from a pattern's rule
    ///
    /// The rule is deleted when nothing remains. Revoking from a pattern with
    /// no rule does nothing.
    ///
    /// # Returns
    ///
    /// Whether a rule existed for the pattern.
    pub fn remove_rule(&self, pattern: &str, permissions: impl Into<PermissionSet>) -> bool {
        let key = super::pattern::normalize(pattern);
        let permissions = permissions.into();
        let mut set = self.inner.write();
        let Some(idx) = set.position(&key) else {
            return false;
        };

        let remaining = set.rules[idx].permissions.difference(permissions);
        if remaining.is_empty() {
            set.rules.remove(idx);
            debug!(pattern = %key, "revoke removed rule");
        } else {
            set.rules[idx].permissions = remaining;
            debug!(pattern = %key, %remaining, "revoke");
        }
        true
    }

    /// Alias for [`remove_rule`](Self::remove_rule)
    pub fn revoke(&self, pattern: &str, permissions: impl Into<PermissionSet>) -> bool {
        self.remove_rule(pattern, permissions)
    }

    /// Atomically replace every rule
    ///
    /// Sequences follow list order. A pattern repeated later in the list
    /// replaces the permissions but keeps the first sequence. If any pattern is
    /// invalid the store is left untouched.
    pub fn set_rules(&self, specs: &[RuleSpec]) -> Result<(), GateError> {
        let mut fresh = RuleSet::default();
        for spec in specs {
            let compiled = RulePattern::new(&spec.pattern)?;
            fresh.upsert(compiled, |_| spec.permissions);
        }
        debug!(count = fresh.rules.len(), "replace rule set");
        *self.inner.write() = fresh;
        Ok(())
    }

    /// The permission set of the single rule that wins for `path`
    pub fn effective_permissions(&self, path: &Path) -> PermissionSet {
        let set = self.inner.read();
        let permissions = set
            .winner(path)
            .map(|rule| rule.permissions)
            .unwrap_or_default();
        trace!(path = %path.display(), %permissions, "effective permissions");
        permissions
    }

    /// The rule that wins for `path`, for diagnostics
    pub fn matching_rule(&self, path: &Path) -> Option<Rule> {
        self.inner.read().winner(path).cloned()
    }

    /// Snapshot of every rule in sequence order
    pub fn rules(&self) -> Vec<Rule> {
        self.inner.read().rules.clone()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.inner.read().rules.len()
    }

    /// Whether the store holds no rules
    pub fn is_empty(&self) -> bool {
        self.inner.read().rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionKind::*;

    fn perms(store: &RuleStore, path: &str) -> PermissionSet {
        store.effective_permissions(Path::new(path))
    }

    #[test]
    fn test_longer_pattern_wins() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        store.set_rule("/app/data/**", [Read, Write]).unwrap();

        assert_eq!(perms(&store, "/app/data/x.json"), PermissionSet::from([Read, Write]));
        assert_eq!(perms(&store, "/app/other.txt"), PermissionSet::from(Read));
    }

    #[test]
    fn test_longer_pattern_wins_regardless_of_order() {
        let store = RuleStore::new();
        store.set_rule("/app/data/**", [Read, Write]).unwrap();
        store.set_rule("/app/**", Read).unwrap();

        assert_eq!(perms(&store, "/app/data/x.json"), PermissionSet::from([Read, Write]));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let store = RuleStore::new();
        store.set_rule("/app/data/**", [Read, Write]).unwrap();
        store.set_rule("/app/data/secret.json", PermissionSet::empty()).unwrap();

        assert!(perms(&store, "/app/data/secret.json").is_empty());
        assert_eq!(perms(&store, "/app/data/public.json"), PermissionSet::from([Read, Write]));
    }

    #[test]
    fn test_results_never_union() {
        let store = RuleStore::new();
        store.set_rule("/app/**", [Read, Stat]).unwrap();
        store.set_rule("/app/data/**", Write).unwrap();

        let result = perms(&store, "/app/data/x");
        assert_eq!(result, PermissionSet::from(Write));
        assert!(!result.contains(Read));
    }

    #[test]
    fn test_first_registered_wins_tie() {
        let store = RuleStore::new();
        store.set_rule("/app/*.txt", Read).unwrap();
        store.set_rule("/app/**", Write).unwrap();

        assert_eq!(perms(&store, "/app/notes.txt"), PermissionSet::from(Read));

        let store = RuleStore::new();
        store.set_rule("/app/**", Write).unwrap();
        store.set_rule("/app/*.txt", Read).unwrap();

        assert_eq!(perms(&store, "/app/notes.txt"), PermissionSet::from(Write));
    }

    #[test]
    fn test_trailing_separator_is_same_pattern() {
        let store = RuleStore::new();
        store.set_rule("/srv/data/", Read).unwrap();
        store.set_rule("/srv/data", Write).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(perms(&store, "/srv/data"), PermissionSet::from(Write));
    }

    #[test]
    fn test_no_match_is_empty() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        assert!(perms(&store, "/etc/passwd").is_empty());
        assert!(perms(&RuleStore::new(), "/anything").is_empty());
    }

    #[test]
    fn test_no_inheritance_from_ancestor_rule() {
        let store = RuleStore::new();
        store.set_rule("/app", PermissionSet::all()).unwrap();
        assert!(perms(&store, "/app/file").is_empty());
    }

    #[test]
    fn test_set_rule_keeps_sequence() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        store.set_rule("/app/*.txt", Write).unwrap();
        store.set_rule("/app/**", Stat).unwrap();

        let rules = store.rules();
        assert_eq!(rules[0].pattern().as_str(), "/app/**");
        assert_eq!(rules[0].sequence(), 0);
        assert_eq!(rules[0].permissions(), PermissionSet::from(Stat));
        assert_eq!(perms(&store, "/app/a.txt"), PermissionSet::from(Stat));
    }

    #[test]
    fn test_grant_unions() {
        let store = RuleStore::new();
        store.grant("/app/**", Read).unwrap();
        store.grant("/app/**", Write).unwrap();
        assert_eq!(perms(&store, "/app/x"), PermissionSet::from([Read, Write]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_rule_subtracts_then_deletes() {
        let store = RuleStore::new();
        store.set_rule("/app/**", [Read, Write]).unwrap();

        assert!(store.remove_rule("/app/**", Write));
        assert_eq!(perms(&store, "/app/x"), PermissionSet::from(Read));

        assert!(store.revoke("/app/**", Read));
        assert!(store.is_empty());
        assert!(!store.revoke("/app/**", Read));
    }

    #[test]
    fn test_revoke_falls_through_to_next_rule() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        store.set_rule("/app/data/**", Write).unwrap();

        store.revoke("/app/data/**", Write);
        assert_eq!(perms(&store, "/app/data/x"), PermissionSet::from(Read));
    }

    #[test]
    fn test_invalid_pattern_leaves_store_unchanged() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();

        assert!(store.set_rule("/app/[", Write).is_err());
        assert!(store
            .set_rules(&[RuleSpec::new("/ok/**", Read), RuleSpec::new("/bad/{", Read)])
            .is_err());

        assert_eq!(store.len(), 1);
        assert_eq!(perms(&store, "/app/x"), PermissionSet::from(Read));
    }

    #[test]
    fn test_set_rules_replaces_everything() {
        let store = RuleStore::new();
        store.set_rule("/old/**", Read).unwrap();

        store
            .set_rules(&[
                RuleSpec::new("/a/**", Read),
                RuleSpec::new("/b/**", Write),
                RuleSpec::new("/a/**", Stat),
            ])
            .unwrap();

        let rules = store.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].pattern().as_str(), "/a/**");
        assert_eq!(rules[0].permissions(), PermissionSet::from(Stat));
        assert!(perms(&store, "/old/x").is_empty());
    }

    #[test]
    fn test_matching_rule() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        let rule = store.matching_rule(Path::new("/app/x")).unwrap();
        assert_eq!(rule.pattern().as_str(), "/app/**");
        assert!(store.matching_rule(Path::new("/nope")).is_none());
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let store = RuleStore::new();
        store.set_rule("/app/**", Read).unwrap();
        store.set_rule("/app/*.json", Write).unwrap();
        store.set_rule("/app/data/**", Stat).unwrap();

        let first = perms(&store, "/app/data/x.json");
        for _ in 0..10 {
            assert_eq!(perms(&store, "/app/data/x.json"), first);
        }
    }

    #[test]
    fn test_clones_share_rules() {
        let store = RuleStore::new();
        let other = store.clone();
        other.set_rule("/shared/**", Read).unwrap();
        assert_eq!(perms(&store, "/shared/x"), PermissionSet::from(Read));
    }

    #[test]
    fn test_concurrent_grants_are_all_visible() {
        let store = RuleStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.grant(&format!("/t{i}/**"), Read).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            assert!(perms(&store, &format!("/t{i}/f")).contains(Read));
        }
    }
}
