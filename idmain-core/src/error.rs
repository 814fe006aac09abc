//! Error types for the data-block database.
//!
//! Legitimate no-ops (deleting an already freed ID, copying a type that cannot
//! be copied) are reported through `Option`/`bool` return values. The errors
//! here cover API misuse that a caller can act on: stale handles, mismatched
//! remap rules and broken configuration.

use crate::types::{IdHandle, IdType};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for database operations.
#[derive(Error, Debug)]
pub enum MainError {
    // =========================================================================
    // Handle Errors (E001-E099)
    // =========================================================================
    /// The handle does not resolve to a live data-block.
    #[error("E001: Stale or unknown data-block handle {handle}")]
    StaleHandle {
        /// The handle that failed to resolve.
        handle: IdHandle,
    },

    /// The data-block is not part of this database.
    #[error("E002: Data-block '{name}' is not in the database")]
    NotInMain {
        /// Name of the data-block.
        name: String,
    },

    /// The data-block is already part of a database.
    #[error("E003: Data-block '{name}' is already in a database")]
    AlreadyInMain {
        /// Name of the data-block.
        name: String,
    },

    /// Embedded data-blocks live inside their owner and cannot be listed.
    #[error("E004: Embedded data-block '{name}' cannot be handled independently of its owner")]
    EmbeddedId {
        /// Name of the embedded data-block.
        name: String,
    },

    /// A handle was expected to point at a data-block of another type.
    #[error("E005: Expected a {expected} data-block, found {found} for {handle}")]
    WrongIdType {
        /// The handle that was checked.
        handle: IdHandle,
        /// The type the operation needs.
        expected: IdType,
        /// The type actually found.
        found: IdType,
    },

    // =========================================================================
    // Remap Errors (E100-E199)
    // =========================================================================
    /// A remap rule pairs data-blocks of different types.
    #[error("E101: Cannot remap {old_type} data-block {old} to {new_type} data-block {new}")]
    RemapTypeMismatch {
        /// Source of the rule.
        old: IdHandle,
        /// Type of the source.
        old_type: IdType,
        /// Destination of the rule.
        new: IdHandle,
        /// Type of the destination.
        new_type: IdType,
    },

    /// Two data-blocks passed to a swap have different types.
    #[error("E102: Cannot swap {first_type} data-block with {second_type} data-block")]
    SwapTypeMismatch {
        /// Type of the first data-block.
        first_type: IdType,
        /// Type of the second data-block.
        second_type: IdType,
    },

    // =========================================================================
    // Configuration Errors (E200-E299)
    // =========================================================================
    /// A configuration value is out of range.
    #[error("E201: Invalid configuration for '{field}': {cause}")]
    InvalidConfig {
        /// The offending field.
        field: String,
        /// Why the value is rejected.
        cause: String,
    },

    /// Failed to install the logging subscriber.
    #[error("E202: Failed to initialize tracing: {cause}")]
    TracingInit {
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// Serialization/deserialization error.
    #[error("E901: Serialization error: {0}")]
    Serialization(
        /// The serialization error message.
        String,
    ),

    /// File I/O error.
    #[error("E902: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },
}

impl MainError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::StaleHandle { .. } => "E001",
            Self::NotInMain { .. } => "E002",
            Self::AlreadyInMain { .. } => "E003",
            Self::EmbeddedId { .. } => "E004",
            Self::WrongIdType { .. } => "E005",
            Self::RemapTypeMismatch { .. } => "E101",
            Self::SwapTypeMismatch { .. } => "E102",
            Self::InvalidConfig { .. } => "E201",
            Self::TracingInit { .. } => "E202",
            Self::Serialization(_) => "E901",
            Self::Io { .. } => "E902",
        }
    }

    /// Check if this error is caused by a handle that no longer resolves.
    #[must_use]
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, Self::StaleHandle { .. })
    }

    /// Check if this error is a configuration/validation error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::Serialization(_) | Self::Io { .. }
        )
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, MainError>;

/// Extension trait for turning foreign errors into [`MainError`].
pub trait ResultExt<T> {
    /// Attach the file path to an I/O failure.
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Report a failure as a configuration error on `field`.
    fn with_config_field(self, field: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| MainError::Io {
            path: path.into(),
            cause: e.to_string(),
        })
    }

    fn with_config_field(self, field: &str) -> Result<T> {
        self.map_err(|e| MainError::InvalidConfig {
            field: field.to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = MainError::StaleHandle {
            handle: IdHandle::new(3, 1),
        };
        assert_eq!(err.code(), "E001");

        let err = MainError::RemapTypeMismatch {
            old: IdHandle::new(0, 0),
            old_type: IdType::Mesh,
            new: IdHandle::new(1, 0),
            new_type: IdType::Object,
        };
        assert_eq!(err.code(), "E101");
    }

    #[test]
    fn error_display() {
        let err = MainError::WrongIdType {
            handle: IdHandle::new(7, 2),
            expected: IdType::Library,
            found: IdType::Mesh,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("E005"));
        assert!(msg.contains("LI"));
        assert!(msg.contains("ME"));
        assert!(msg.contains("id_7v2"));
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(MainError::Serialization("bad json".to_string()).is_config_error());
        assert!(
            !MainError::StaleHandle {
                handle: IdHandle::new(0, 0)
            }
            .is_config_error()
        );
    }

    #[test]
    fn result_ext_maps_io_failures() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = failed.with_path("/tmp/idmain.json").unwrap_err();
        assert_eq!(err.code(), "E902");
        assert!(err.to_string().contains("idmain.json"));
    }
}
