//! Error types for boardpress.
//!
//! Library crates use [`BoardpressError`] via `thiserror` for failures that
//! abort an operation. Problems that only affect one directive or one asset
//! are not errors in this sense: they are recorded as [`crate::Issue`]s and
//! returned alongside the output.
//!
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all boardpress operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardpressError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error during setup (reading the root, creating the output root).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing an output artifact failed; the whole operation is abandoned.
    #[error("write error at {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input (bad scope syntax, unknown strategy name, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The requested scope does not exist in the board.
    #[error("scope error: {message}")]
    Scope { message: String },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BoardpressError>;

impl BoardpressError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a scope error from any displayable message.
    pub fn scope(msg: impl Into<String>) -> Self {
        Self::Scope {
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

    /// Wrap a `std::io::Error` raised while writing an output artifact.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BoardpressError::config("unknown asset strategy 'zip'");
        assert_eq!(err.to_string(), "config error: unknown asset strategy 'zip'");

        let err = BoardpressError::scope("section index 7 out of range (3 sections)");
        assert!(err.to_string().contains("section index 7"));

        assert_eq!(BoardpressError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn write_error_keeps_path() {
        let err = BoardpressError::write(
            "/out/board.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("write error"));
        assert!(msg.contains("board.md"));
    }
}
