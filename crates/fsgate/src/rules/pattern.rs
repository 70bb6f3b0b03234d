//! Compiled rule patterns and their specificity.

use globset::{GlobBuilder, GlobMatcher};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use crate::error::GateError;

const WILDCARD_CHARS: &[char] = &['*', '?', '[', '{'];

/// A normalized, compiled glob pattern
///
/// Syntax follows `globset` with literal separators:
/// - `*` and `?` never match `/`
/// - `**` matches across directories
/// - a pattern without wildcard characters matches only the identical path
///
/// Trailing separators are dropped (except for the root `/`), so
/// `/app/data/` and `/app/data` are the same pattern.
///
/// # Examples
///
/// ```
/// use fsgate::rules::RulePattern;
/// use std::path::Path;
///
/// let pattern = RulePattern::new("/app/**").unwrap();
/// assert!(pattern.matches(Path::new("/app/data/x.json")));
/// assert!(!pattern.matches(Path::new("/other/x.json")));
/// assert!(pattern.is_wildcard());
/// ```
#[derive(Clone)]
pub struct RulePattern {
    source: String,
    matcher: Option<GlobMatcher>,
    segments: usize,
}

impl RulePattern {
    /// Normalize and compile a pattern
    ///
    /// # Errors
    ///
    /// [`GateError::InvalidPattern`] if the pattern is empty or not a valid glob.
    pub fn new(pattern: &str) -> Result<Self, GateError> {
        let source = normalize(pattern);
        if source.is_empty() {
            return Err(GateError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let matcher = if source.contains(WILDCARD_CHARS) {
            let glob = GlobBuilder::new(&source)
                .literal_separator(true)
                .build()
                .map_err(|e| GateError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Some(glob.compile_matcher())
        } else {
            None
        };

        let segments = source.split('/').filter(|s| !s.is_empty()).count();

        Ok(Self {
            source,
            matcher,
            segments,
        })
    }

    /// The normalized pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains wildcard characters
    pub fn is_wildcard(&self) -> bool {
        self.matcher.is_some()
    }

    /// Number of non-empty path segments
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Whether the pattern matches a canonical path
    pub fn matches(&self, path: &Path) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(path),
            None => path.to_string_lossy() == self.source,
        }
    }

    /// Compare specificity: `Greater` means `self` is more specific
    ///
    /// An exact pattern beats any wildcard pattern. Between two patterns of the
    /// same kind, more segments win. Ties are left to insertion order.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        other
            .is_wildcard()
            .cmp(&self.is_wildcard())
            .then(self.segments.cmp(&other.segments))
    }
}

impl fmt::Debug for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulePattern")
            .field("source", &self.source)
            .field("wildcard", &self.is_wildcard())
            .field("segments", &self.segments)
            .finish()
    }
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Trim whitespace and trailing separators, keeping a lone `/`.
pub(crate) fn normalize(pattern: &str) -> String {
    let trimmed = pattern.trim();
    let stripped = trimmed.trim_end_matches('/');
    if stripped.is_empty() && trimmed.starts_with('/') {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}
