//! Database configuration.

use crate::error::{MainError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Default number of entries compared per block when inserting into a sorted
/// type list.
pub const DEFAULT_SORT_CHUNK_SIZE: usize = 512;

/// Tunables of a [`Main`](crate::Main).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Block size of the backward search used by sorted insertion.
    sort_chunk_size: usize,
    /// Re-validate the name maps after every rename (debugging aid).
    validate_names_on_change: bool,
    /// Delete data-blocks whose never-null references would be cleared by a
    /// deletion, instead of clearing those references.
    cascade_never_null_on_delete: bool,
    /// Deliver change events to subscribers.
    notify_changes: bool,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            sort_chunk_size: DEFAULT_SORT_CHUNK_SIZE,
            validate_names_on_change: false,
            cascade_never_null_on_delete: true,
            notify_changes: true,
        }
    }
}

impl MainConfig {
    /// Create a new builder.
    pub fn builder() -> MainConfigBuilder {
        MainConfigBuilder::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDMAIN_SORT_CHUNK`: sorted insertion block size
    /// - `IDMAIN_VALIDATE_NAMES`: "true" to validate names after each rename
    /// - `IDMAIN_CASCADE_DELETE`: "false" to clear never-null references
    ///   instead of cascading deletions
    /// - `IDMAIN_NOTIFY`: "false" to silence change events
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            var(key)
                .map(|s| match s.to_lowercase().as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => default,
                })
                .unwrap_or(default)
        };

        Self {
            sort_chunk_size: var("IDMAIN_SORT_CHUNK")
                .and_then(|s| s.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.sort_chunk_size),
            validate_names_on_change: flag(
                "IDMAIN_VALIDATE_NAMES",
                defaults.validate_names_on_change,
            ),
            cascade_never_null_on_delete: flag(
                "IDMAIN_CASCADE_DELETE",
                defaults.cascade_never_null_on_delete,
            ),
            notify_changes: flag("IDMAIN_NOTIFY", defaults.notify_changes),
        }
    }

    /// Load configuration from a JSON file. Missing fields keep defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| MainError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MainError::Serialization(e.to_string()))?;
        std::fs::write(path, content).with_path(path)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.sort_chunk_size == 0 {
            return Err(MainError::InvalidConfig {
                field: "sort_chunk_size".to_string(),
                cause: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the sorted insertion block size.
    pub fn sort_chunk_size(&self) -> usize {
        self.sort_chunk_size
    }

    /// Check if names are validated after every rename.
    pub fn validate_names_on_change(&self) -> bool {
        self.validate_names_on_change
    }

    /// Check if deletions cascade over never-null references.
    pub fn cascade_never_null_on_delete(&self) -> bool {
        self.cascade_never_null_on_delete
    }

    /// Check if change events are delivered.
    pub fn notify_changes(&self) -> bool {
        self.notify_changes
    }
}

/// Builder for [`MainConfig`].
#[derive(Debug, Clone, Default)]
pub struct MainConfigBuilder {
    sort_chunk_size: Option<usize>,
    validate_names_on_change: Option<bool>,
    cascade_never_null_on_delete: Option<bool>,
    notify_changes: Option<bool>,
}

impl MainConfigBuilder {
    /// Set the sorted insertion block size.
    pub fn sort_chunk_size(mut self, size: usize) -> Self {
        self.sort_chunk_size = Some(size);
        self
    }

    /// Enable name validation after every rename.
    pub fn validate_names_on_change(mut self, enabled: bool) -> Self {
        self.validate_names_on_change = Some(enabled);
        self
    }

    /// Choose between cascading deletions and clearing never-null references.
    pub fn cascade_never_null_on_delete(mut self, enabled: bool) -> Self {
        self.cascade_never_null_on_delete = Some(enabled);
        self
    }

    /// Enable or silence change events.
    pub fn notify_changes(mut self, enabled: bool) -> Self {
        self.notify_changes = Some(enabled);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<MainConfig> {
        let defaults = MainConfig::default();
        let config = MainConfig {
            sort_chunk_size: self.sort_chunk_size.unwrap_or(defaults.sort_chunk_size),
            validate_names_on_change: self
                .validate_names_on_change
                .unwrap_or(defaults.validate_names_on_change),
            cascade_never_null_on_delete: self
                .cascade_never_null_on_delete
                .unwrap_or(defaults.cascade_never_null_on_delete),
            notify_changes: self.notify_changes.unwrap_or(defaults.notify_changes),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = MainConfig::default();
        assert_eq!(config.sort_chunk_size(), DEFAULT_SORT_CHUNK_SIZE);
        assert!(config.cascade_never_null_on_delete());
        assert!(config.notify_changes());
        assert!(!config.validate_names_on_change());
    }

    #[test]
    fn builder_validates() {
        let config = MainConfig::builder()
            .sort_chunk_size(8)
            .notify_changes(false)
            .build()
            .unwrap();
        assert_eq!(config.sort_chunk_size(), 8);
        assert!(!config.notify_changes());

        let err = MainConfig::builder().sort_chunk_size(0).build().unwrap_err();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn vars_override_defaults() {
        let vars: HashMap<&str, &str> = [
            ("IDMAIN_SORT_CHUNK", "64"),
            ("IDMAIN_CASCADE_DELETE", "false"),
            ("IDMAIN_VALIDATE_NAMES", "1"),
        ]
        .into_iter()
        .collect();
        let config = MainConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.sort_chunk_size(), 64);
        assert!(!config.cascade_never_null_on_delete());
        assert!(config.validate_names_on_change());
        assert!(config.notify_changes());
    }

    #[test]
    fn invalid_vars_keep_defaults() {
        let config = MainConfig::from_vars(|key| match key {
            "IDMAIN_SORT_CHUNK" => Some("0".to_string()),
            "IDMAIN_NOTIFY" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, MainConfig::default());
    }
}
