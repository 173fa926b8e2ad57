//! `xlsxport`:
//! Query a tabular source, export the result as a styled XLSX sheet, and
//! relocate the finished file to its durable target.
//!
//! - `source`   : data-source seam and built-in sources
//! - `pipeline` : end-to-end export orchestration
//! - `error`    : top-level error types

pub mod error;
pub mod pipeline;
pub mod source;

pub use error::{ExportError, QueryError};
pub use pipeline::{EnumExportMode, ExportPipeline, ReportExport, SpecExportOptions};
pub use source::{IpcDirSource, MemorySource, SpecTableQuery, TabularSource};

pub use xlsxport_io_fs::{EnumRelocateConflictStrategy, ReportRelocate, SpecRelocateOptions};
pub use xlsxport_io_xlsx::{
    SpecBasicExportOptions, SpecCellFormat, SpecStyledExportOptions, derive_header_format,
};
