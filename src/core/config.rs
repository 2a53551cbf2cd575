//! Collection configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! namespace = "local.oplog.rs"
//! extent_sizes = [1048576, 1048576, 4194304]
//! max_records = 10000
//!
//! [limits]
//! max_request_len = 400000000
//! ```

use crate::core::arena::check_extent_size;
use crate::core::error::{CappedError, Result};
use crate::core::validation::Namespace;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Bounds of one allocation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AllocLimits {
    /// Requests of this many bytes or more are refused outright
    #[validate(range(min = 1))]
    pub max_request_len: u32,

    /// Floor of the eviction pass budget
    #[validate(range(min = 1))]
    pub min_passes: u32,

    /// One extra eviction pass is allowed per this many requested bytes
    #[validate(range(min = 1))]
    pub bytes_per_pass: u32,
}

impl Default for AllocLimits {
    fn default() -> Self {
        AllocLimits {
            max_request_len: 400_000_000,
            min_passes: 5000,
            bytes_per_pass: 30,
        }
    }
}

impl AllocLimits {
    /// Eviction passes granted to a request of `len` bytes
    pub fn pass_budget(&self, len: u32) -> u32 {
        let scaled = (len / self.bytes_per_pass.max(1)).saturating_add(2);
        scaled.max(self.min_passes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CappedConfig {
    pub namespace: Namespace,

    /// Extent lengths in ring order, headers included
    #[validate(length(min = 1, message = "at least one extent is required"))]
    pub extent_sizes: Vec<u32>,

    /// Record count bound; absent means only the extents bound the collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<u64>,

    #[serde(default)]
    #[validate(nested)]
    pub limits: AllocLimits,
}

impl CappedConfig {
    pub fn new(namespace: &str, extent_sizes: Vec<u32>) -> Result<Self> {
        let config = CappedConfig {
            namespace: Namespace::new(namespace)?,
            extent_sizes,
            max_records: None,
            limits: AllocLimits::default(),
        };
        config.check()?;
        Ok(config)
    }

    pub fn with_max_records(mut self, max: u64) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn with_limits(mut self, limits: AllocLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CappedConfig = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate field bounds and the extent sizes
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| CappedError::InvalidConfig(e.to_string()))?;

        for (i, &size) in self.extent_sizes.iter().enumerate() {
            check_extent_size(i, size)?;
        }

        if self.max_records == Some(0) {
            return Err(CappedError::InvalidConfig(
                "max_records must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = AllocLimits::default();
        assert_eq!(limits.max_request_len, 400_000_000);
        assert_eq!(limits.pass_budget(100), 5000);
        assert_eq!(limits.pass_budget(300_000), 10_002);
    }

    #[test]
    fn test_pass_budget_saturates() {
        let limits = AllocLimits {
            max_request_len: u32::MAX,
            min_passes: 1,
            bytes_per_pass: 1,
        };
        assert!(limits.validate().is_ok());
        assert_eq!(limits.pass_budget(u32::MAX - 1), u32::MAX);
        assert_eq!(limits.pass_budget(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_from_toml_minimal() {
        let config = CappedConfig::from_toml_str(
            r#"
            namespace = "test.events"
            extent_sizes = [4096, 8192]
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace.as_str(), "test.events");
        assert_eq!(config.extent_sizes, vec![4096, 8192]);
        assert_eq!(config.max_records, None);
        assert_eq!(config.limits, AllocLimits::default());
    }

    #[test]
    fn test_from_toml_full() {
        let config = CappedConfig::from_toml_str(
            r#"
            namespace = "local.oplog.rs"
            extent_sizes = [4096]
            max_records = 10

            [limits]
            min_passes = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.max_records, Some(10));
        assert_eq!(config.limits.min_passes, 3);
        assert_eq!(config.limits.bytes_per_pass, 30);
    }

    #[test]
    fn test_rejects_bad_configs() {
        assert!(CappedConfig::new("test.events", vec![]).is_err());
        assert!(CappedConfig::new("test.events", vec![100]).is_err());
        assert!(CappedConfig::new("test.events", vec![4097]).is_err());
        assert!(CappedConfig::new("events", vec![4096]).is_err());

        let zero_passes = CappedConfig::from_toml_str(
            r#"
            namespace = "test.events"
            extent_sizes = [4096]

            [limits]
            bytes_per_pass = 0
            "#,
        );
        assert!(matches!(zero_passes, Err(CappedError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_namespace_in_toml_is_parse_error() {
        let result = CappedConfig::from_toml_str(
            r#"
            namespace = "nodot"
            extent_sizes = [4096]
            "#,
        );
        assert!(matches!(result, Err(CappedError::ConfigParse(_))));
    }
}
