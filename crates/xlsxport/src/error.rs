//! Top-level error types for the export pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use xlsxport_io_fs::RelocateError;
use xlsxport_io_xlsx::SpreadsheetError;

/// Data-source failures.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query text does not match the accepted grammar.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Named table is not known to the source.
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// Table exists but could not be materialized.
    #[error("Failed to read table {table:?}: {message}")]
    Read {
        /// Table name from the query.
        table: String,
        /// Reason text.
        message: String,
    },
}

/// Failure of one `ExportPipeline` run, by phase.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Fetch phase failed; nothing was written.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The transient file could not be created or kept.
    #[error("Transient file in {} failed: {source}", .path_dir.display())]
    Transient {
        /// Configured transient directory.
        path_dir: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Write or finalize phase failed; the transient file was discarded.
    #[error(transparent)]
    Xlsx(#[from] SpreadsheetError),
    /// Relocation failed; the finished file is still at `path_transient`.
    #[error("{source} (finished file kept at {})", .path_transient.display())]
    Relocate {
        /// Underlying relocation error.
        source: RelocateError,
        /// Location of the finished, unrelocated document.
        path_transient: PathBuf,
    },
}
