//! Configuration options and builder for a [`Gate`](crate::gate::Gate)
//!
//! # Example
//!
//! ```
//! use fsgate::options::GateOptions;
//! use fsgate::permissions::PermissionKind;
//! use std::time::Duration;
//!
//! let options = GateOptions::builder()
//!     .max_descriptors(256)
//!     .resolution_timeout(Duration::from_secs(2))
//!     .rule("/srv/app/**", [PermissionKind::Read, PermissionKind::Stat])
//!     .build();
//!
//! assert_eq!(options.max_descriptors, 256);
//! assert_eq!(options.rules.len(), 1);
//! ```
//!
//! # JSON
//!
//! Options can be loaded from JSON. Every field is optional:
//!
//! ```
//! use fsgate::options::GateOptions;
//!
//! let options = GateOptions::from_json(r#"{
//!     "max_descriptors": 64,
//!     "cache_ttl_secs": 60,
//!     "rules": [{ "pattern": "/tmp/**", "permissions": ["read", "write"] }]
//! }"#).unwrap();
//!
//! assert_eq!(options.max_descriptors, 64);
//! assert_eq!(options.cache_capacity, 10_000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::GateError;
use crate::permissions::PermissionSet;
use crate::rules::RuleSpec;

/// Default ceiling on live descriptors and handles
pub const DEFAULT_MAX_DESCRIPTORS: usize = 1000;
/// Default bound on a single path resolution
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default number of cached resolutions
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Default lifetime of a cached resolution
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateOptions {
    /// Maximum simultaneously tracked descriptors and handles
    pub max_descriptors: usize,
    /// Bound on a single real-path resolution
    #[serde(rename = "resolution_timeout_ms", with = "duration_ms")]
    pub resolution_timeout: Duration,
    /// Maximum cached resolutions (0 disables the cache)
    pub cache_capacity: usize,
    /// How long a cached resolution may be reused
    #[serde(rename = "cache_ttl_secs", with = "duration_secs")]
    pub cache_ttl: Duration,
    /// Initial rules, in insertion order
    pub rules: Vec<RuleSpec>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            rules: Vec::new(),
        }
    }
}

impl GateOptions {
    /// Create a new options builder
    pub fn builder() -> GateOptionsBuilder {
        GateOptionsBuilder::default()
    }

    /// Parse options from a JSON string
    ///
    /// # Errors
    ///
    /// [`GateError::Config`] if the JSON is malformed or a permission name is
    /// unknown.
    pub fn from_json(json: &str) -> Result<Self, GateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse options from a JSON file
    ///
    /// # Errors
    ///
    /// [`GateError::Io`] if the file cannot be read, [`GateError::Config`] if
    /// it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GateError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Builder for [`GateOptions`]
#[derive(Debug, Default)]
pub struct GateOptionsBuilder {
    inner: GateOptions,
}

impl GateOptionsBuilder {
    /// Set the descriptor ceiling
    pub fn max_descriptors(mut self, max: usize) -> Self {
        self.inner.max_descriptors = max;
        self
    }

    /// Set the resolution timeout
    pub fn resolution_timeout(mut self, timeout: Duration) -> Self {
        self.inner.resolution_timeout = timeout;
        self
    }

    /// Set the cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.inner.cache_capacity = capacity;
        self
    }

    /// Set the cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.inner.cache_ttl = ttl;
        self
    }

    /// Append an initial rule
    pub fn rule(mut self, pattern: impl Into<String>, permissions: impl Into<PermissionSet>) -> Self {
        self.inner.rules.push(RuleSpec::new(pattern, permissions));
        self
    }

    /// Replace the initial rules
    pub fn rules(mut self, rules: Vec<RuleSpec>) -> Self {
        self.inner.rules = rules;
        self
    }

    /// Build the options
    pub fn build(self) -> GateOptions {
        self.inner
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
