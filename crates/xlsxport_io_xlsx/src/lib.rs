//! `xlsxport_io_xlsx` v1:
//! Rust-side XLSX export kernel.
//!
//! Module layout:
//! - `conf`   : constants and default presets
//! - `error`  : top-level error type
//! - `spec`   : specs/models/options
//! - `util`   : pure helper functions
//! - `writer` : document session and export entry points
//! - `reader` : read-back of produced documents
pub mod conf;
pub mod error;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_ENGINE_DEFAULT, C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL, derive_default_xlsx_formats, derive_header_format,
};
pub use error::SpreadsheetError;
pub use reader::{SpecXlsxReadOptions, read_dataset, read_sheet_grid};
pub use spec::{
    EnumCellValue, EnumXlsxEngine, SpecBasicExportOptions, SpecCellFormat,
    SpecFrameWriteOptions, SpecStyledExportOptions, SpecXlsxReport, SpecXlsxValuePolicy, SpecXlsxWriteOptions,
};
pub use util::{convert_any_value, sanitize_sheet_name, validate_frame_writable};
pub use writer::{
    XlsxDocument, export_basic, export_basic_with_options, export_styled,
    export_styled_with_options, with_document,
};
