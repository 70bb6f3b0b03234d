//! Bitset of permission kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::PermissionKind;

/// A small set of [`PermissionKind`]s
///
/// Serializes as a list of kind names.
///
/// # Examples
///
/// ```
/// use fsgate::permissions::{PermissionKind, PermissionSet};
///
/// let set = PermissionSet::from([PermissionKind::Read, PermissionKind::Write]);
/// assert!(set.contains(PermissionKind::Read));
/// assert!(!set.contains(PermissionKind::Delete));
/// assert_eq!(set.to_string(), "read,write");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PermissionKind>", into = "Vec<PermissionKind>")]
pub struct PermissionSet {
    bits: u8,
}

impl PermissionSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every kind
    pub const fn all() -> Self {
        Self { bits: u8::MAX }
    }

    /// Whether `kind` is a member
    pub fn contains(&self, kind: PermissionKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Add a kind
    pub fn insert(&mut self, kind: PermissionKind) {
        self.bits |= kind.bit();
    }

    /// Remove a kind
    pub fn remove(&mut self, kind: PermissionKind) {
        self.bits &= !kind.bit();
    }

    /// Union of two sets
    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Kinds in `self` but not in `other`
    pub fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
        }
    }

    /// Whether no kind is present
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of kinds present
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterate members in bit order
    pub fn iter(&self) -> impl Iterator<Item = PermissionKind> + '_ {
        PermissionKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl FromIterator<PermissionKind> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl<const N: usize> From<[PermissionKind; N]> for PermissionSet {
    fn from(kinds: [PermissionKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<PermissionKind> for PermissionSet {
    fn from(kind: PermissionKind) -> Self {
        Self { bits: kind.bit() }
    }
}

impl From<Vec<PermissionKind>> for PermissionSet {
    fn from(kinds: Vec<PermissionKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<PermissionSet> for Vec<PermissionKind> {
    fn from(set: PermissionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let names: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        f.write_str(&names.join(","))
    }
}
