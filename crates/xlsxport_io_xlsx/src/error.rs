//! Top-level error type for document and export calls.

use std::path::PathBuf;

use thiserror::Error;

/// "Call failed" errors raised by the XLSX kernel.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// Requested writer engine is not available in this build.
    #[error("Unsupported writer engine: {0:?} (available: \"xlsxwriter\")")]
    UnsupportedEngine(String),
    /// A column (or cell) has no spreadsheet representation.
    #[error("Cannot serialize column {column:?}: {message}")]
    Serialization {
        /// Offending column name.
        column: String,
        /// Reason text.
        message: String,
    },
    /// Write attempted after the document was finalized.
    #[error("Document already finalized: {}", .0.display())]
    DocumentClosed(PathBuf),
    /// Column names are duplicated or otherwise unusable.
    #[error("{0}")]
    InvalidColumns(String),
    /// Option combination is not allowed.
    #[error("{0}")]
    InvalidOptions(String),
    /// Sheet was never created in this document.
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),
    /// Underlying writer failure.
    #[error("xlsx write error: {0}")]
    Write(String),
    /// Underlying reader failure.
    #[error("xlsx read error: {0}")]
    Read(String),
}

impl SpreadsheetError {
    pub(crate) fn serialization(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            column: column.into(),
            message: message.into(),
        }
    }
}
