//! Error types for the presetconv-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use crate::model::FormatTag;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for presetconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all presetconv operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input path does not exist
    #[error("file not found: '{path}'")]
    NotFound {
        /// The missing path
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to back up an existing file before overwriting it
    #[error("failed to back up '{path}': {source}")]
    Backup {
        /// Path of the file being backed up
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Written bytes did not read back identically
    #[error("verification of '{path}' failed: written bytes differ from the serialized preset")]
    VerifyFailed {
        /// The destination that failed verification
        path: PathBuf,
    },

    /// Expected a directory
    #[error("not a directory: '{path}'")]
    NotADirectory {
        /// The offending path
        path: PathBuf,
    },

    /// Zero-length buffer handed to the parser
    #[error("empty preset data")]
    EmptyInput,

    /// The buffer does not match any registered format signature
    #[error("unrecognized preset format")]
    UnrecognizedFormat,

    /// Cursor access past the end of the buffer
    #[error("out of bounds: cannot access {requested} bytes at offset {offset} ({available} available)")]
    OutOfBounds {
        /// Cursor position of the failed access
        offset: usize,
        /// Number of bytes requested
        requested: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// The validator rejected a preset
    #[error("invalid preset: {}", violations.join("; "))]
    InvalidModel {
        /// Every violation found
        violations: Vec<String>,
    },

    /// The per-format checksum did not match
    #[error("checksum mismatch for {format} preset")]
    ChecksumMismatch {
        /// Format whose checksum failed
        format: FormatTag,
    },

    /// Two registered layouts would make detection ambiguous
    #[error("layout for {format} conflicts with registered {existing}: signatures overlap")]
    LayoutConflict {
        /// Format being registered
        format: FormatTag,
        /// Format already holding an overlapping signature
        existing: FormatTag,
    },

    /// No layout is registered for a format
    #[error("no layout registered for {0}")]
    UnsupportedFormat(FormatTag),

    /// The engine cannot convert between these formats
    #[error("cannot convert {from} preset to {to}")]
    UnsupportedConversion {
        /// Source format
        from: FormatTag,
        /// Target format
        to: FormatTag,
    },

    /// Malformed rule set or layout table
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new not-found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new backup error
    pub fn backup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }

    /// Creates a new out-of-bounds error
    pub fn out_of_bounds(offset: usize, requested: usize, available: usize) -> Self {
        Self::OutOfBounds {
            offset,
            requested,
            available,
        }
    }

    /// Creates a new invalid model error
    pub fn invalid_model(violations: Vec<String>) -> Self {
        Self::InvalidModel { violations }
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if a batch driver may skip this file and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput
                | Self::UnrecognizedFormat
                | Self::OutOfBounds { .. }
                | Self::InvalidModel { .. }
                | Self::ChecksumMismatch { .. }
                | Self::UnsupportedConversion { .. }
                | Self::NotFound { .. }
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::out_of_bounds(12, 4, 2);
        assert_eq!(
            err.to_string(),
            "out of bounds: cannot access 4 bytes at offset 12 (2 available)"
        );

        let err = Error::not_found("/presets/missing.gp5");
        assert!(err.to_string().contains("missing.gp5"));
    }

    #[test]
    fn test_invalid_model_lists_every_violation() {
        let err = Error::invalid_model(vec!["name is blank".into(), "input_gain out of range".into()]);
        let msg = err.to_string();
        assert!(msg.contains("name is blank"));
        assert!(msg.contains("input_gain out of range"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::EmptyInput.is_recoverable());
        assert!(Error::invalid_model(vec![]).is_recoverable());
        assert!(!Error::file_write("/out", std::io::Error::other("disk full")).is_recoverable());
    }
}
