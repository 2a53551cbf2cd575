//! Validation for capped collection namespaces
//!
//! A namespace names one collection as `<database>.<collection>`, the form
//! used in every log line and diagnostic the allocator emits.

use crate::core::error::{CappedError, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A validated `<database>.<collection>` name
///
/// # Rules
/// - Database part: ASCII letters, digits, `_` and `-`
/// - Collection part: ASCII letters, digits and `_ $ . -`
/// - Exactly one separator dot before the collection part begins
/// - Length: 1-120 bytes
///
/// # Examples
///
/// Valid namespaces:
/// - "test.events"
/// - "local.oplog.rs"
/// - "app_1.system.profile"
///
/// Invalid namespaces:
/// - "events" (no database part)
/// - ".events" (empty database)
/// - "test." (empty collection)
/// - "my db.events" (space)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    const PATTERN: &'static str = r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_$.-]+$";

    const MAX_LENGTH: usize = 120;

    /// Create a new validated namespace
    ///
    /// # Errors
    ///
    /// Returns `InvalidNamespace` if the name doesn't meet the rules above.
    ///
    /// # Examples
    ///
    /// ```
    /// use cartridge_capped::Namespace;
    ///
    /// let ns = Namespace::new("local.oplog.rs").unwrap();
    /// assert_eq!(ns.database(), "local");
    /// assert_eq!(ns.collection(), "oplog.rs");
    ///
    /// assert!(Namespace::new("events").is_err());
    /// ```
    pub fn new(ns: impl Into<String>) -> Result<Self> {
        let ns = ns.into();
        Self::validate_namespace(&ns)?;
        Ok(Namespace(ns))
    }

    fn validate_namespace(ns: &str) -> Result<()> {
        if ns.is_empty() {
            return Err(CappedError::InvalidNamespace(
                "namespace cannot be empty".to_string(),
            ));
        }

        if ns.len() > Self::MAX_LENGTH {
            return Err(CappedError::InvalidNamespace(format!(
                "namespace too long (max {} bytes)",
                Self::MAX_LENGTH
            )));
        }

        let re = Regex::new(Self::PATTERN)
            .map_err(|e| CappedError::InvalidNamespace(e.to_string()))?;
        if !re.is_match(ns) {
            return Err(CappedError::InvalidNamespace(format!(
                "namespace '{}' must look like <database>.<collection>",
                ns
            )));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the first dot
    pub fn database(&self) -> &str {
        self.0.split_once('.').map_or(&self.0[..], |(db, _)| db)
    }

    /// Everything after the first dot
    pub fn collection(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, coll)| coll)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Namespace::new(s).map_err(serde::de::Error::custom)
    }
}
