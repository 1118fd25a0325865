//! Error types for policy registration and loading.
//!
//! Only registration-time and load-time failures surface as errors.
//! Request-time problems (missing attributes, failed coercions, bad
//! patterns) are resolved to "no match" inside the evaluator.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for the ABAC engine.
#[derive(Debug, Error)]
pub enum AbacError {
    /// A policy, rule, condition or configuration value is structurally invalid.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A regex condition carries a pattern that is invalid or too expensive.
    #[error("Invalid pattern '{pattern}' in condition on '{attribute}': {reason}")]
    InvalidPattern {
        attribute: String,
        pattern: String,
        reason: String,
    },

    /// A policy with the same id is already registered.
    #[error("Policy '{0}' is already registered")]
    DuplicatePolicy(String),

    /// No policy with the given id is registered.
    #[error("Policy '{0}' not found")]
    PolicyNotFound(String),

    /// A lock guarding engine state was poisoned by a panicking thread.
    #[error("Engine state unavailable: {0} lock poisoned")]
    Poisoned(&'static str),

    /// A policy or request document is not well-formed JSON.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// A policy file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AbacError {
    /// Shorthand for [`AbacError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns true for errors caused by a malformed policy rather than I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidPattern { .. } | Self::DuplicatePolicy(_)
        )
    }
}

/// Result type for ABAC operations.
pub type Result<T> = std::result::Result<T, AbacError>;
