//! Error types for changelogd.
//!
//! Library crates use [`ChangelogError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all changelogd operations.
#[derive(Debug, thiserror::Error)]
pub enum ChangelogError {
    /// No changelog is configured for the requested workspace/changelog
    /// ids or host. Never retried.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The content backend failed for a listing or metadata call.
    /// Fails the whole load operation.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Malformed or missing authentication configuration. Raised at
    /// source-construction time, before any network call.
    #[error("auth config error: {message}")]
    AuthConfig { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Response cache backend error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChangelogError>;

impl ChangelogError {
    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create an auth config error from any displayable message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthConfig {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if this error maps to a user-visible "not configured" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ChangelogError::not_found("no changelog for host demo.example.com");
        assert_eq!(
            err.to_string(),
            "not found: no changelog for host demo.example.com"
        );
        assert!(err.is_not_found());

        let err = ChangelogError::auth("github app private key is empty");
        assert!(err.to_string().contains("private key"));
        assert!(!err.is_not_found());
    }
}
