//! Relocation specification models and top-level error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Existing destination file conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumRelocateConflictStrategy {
    /// Fail with [`RelocateError::DestinationExists`].
    #[default]
    Error,
    /// Replace destination file with source file.
    Overwrite,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `relocate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRelocateOptions {
    /// Conflict behavior for an existing destination file.
    pub rule_conflict: EnumRelocateConflictStrategy,
    /// Carry permissions, timestamps and xattrs over on cross-device copies.
    pub if_preserve_metadata: bool,
}

impl Default for SpecRelocateOptions {
    fn default() -> Self {
        Self {
            rule_conflict: EnumRelocateConflictStrategy::Error,
            if_preserve_metadata: true,
        }
    }
}

/// "Top-level call failed" errors. The source file is intact whenever one is returned.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Source path is missing or not a regular file.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Destination parent directory is missing.
    #[error("Destination parent directory does not exist: {}", .0.display())]
    DestinationParentMissing(PathBuf),
    /// Destination file exists and the conflict policy is `Error`.
    #[error("Destination exists: {}", .0.display())]
    DestinationExists(PathBuf),
    /// Destination path is an existing directory.
    #[error("Destination is a directory: {}", .0.display())]
    DestinationIsDirectory(PathBuf),
    /// Underlying filesystem failure.
    #[error("Failed to relocate {} -> {}: {source}", .path_src.display(), .path_dst.display())]
    Io {
        /// Source file.
        path_src: PathBuf,
        /// Requested destination.
        path_dst: PathBuf,
        /// OS error.
        source: io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
