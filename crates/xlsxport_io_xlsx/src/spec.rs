//! Shared XLSX specification models.

use std::str::FromStr;

use crate::conf::{C_ENGINE_DEFAULT, C_SHEET_NAME_DEFAULT};
use crate::error::SpreadsheetError;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Reusable cell style. Immutable once built; derive variants with [`Self::with_`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Bold-only format.
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Default::default()
        }
    }

    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Calendar date as Excel serial day number.
    Date(f64),
    /// Timestamp as fractional Excel serial day number.
    DateTime(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Engine

/// Writer engine a document is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumXlsxEngine {
    /// Built-in `rust_xlsxwriter` backend.
    #[default]
    XlsxWriter,
}

impl EnumXlsxEngine {
    /// Canonical engine name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::XlsxWriter => C_ENGINE_DEFAULT,
        }
    }
}

impl FromStr for EnumXlsxEngine {
    type Err = SpreadsheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsxwriter" | "rust_xlsxwriter" => Ok(Self::XlsxWriter),
            _ => Err(SpreadsheetError::UnsupportedEngine(s.to_string())),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Value conversion policy for missing/NaN/Inf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxValuePolicy {
    /// Replacement text for missing value when keep-missing is enabled.
    pub missing_value_str: String,
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecXlsxValuePolicy {
    fn default() -> Self {
        Self {
            missing_value_str: "NA".to_string(),
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

/// Document-wide options controlling value conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Value conversion policy.
    pub value_policy: SpecXlsxValuePolicy,
    /// Keep missing/NaN/Inf as text instead of blank.
    pub keep_missing_values: bool,
    /// Format applied to date cells.
    pub fmt_date: SpecCellFormat,
    /// Format applied to datetime cells.
    pub fmt_datetime: SpecCellFormat,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        let mut dict_fmt = crate::conf::derive_default_xlsx_formats();
        Self {
            value_policy: SpecXlsxValuePolicy::default(),
            keep_missing_values: false,
            fmt_date: dict_fmt.remove("date").unwrap_or_default(),
            fmt_datetime: dict_fmt.remove("datetime").unwrap_or_default(),
        }
    }
}

/// Placement of one dataframe inside a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFrameWriteOptions {
    /// First grid row used by the frame (header row when written).
    pub row_start: usize,
    /// First grid column used by the frame (index column when written).
    pub col_start: usize,
    /// Emit column names as a plain header row.
    pub if_write_header: bool,
    /// Emit a leading 0-based row-index column.
    pub if_write_index: bool,
}

impl Default for SpecFrameWriteOptions {
    fn default() -> Self {
        Self {
            row_start: 0,
            col_start: 0,
            if_write_header: true,
            if_write_index: true,
        }
    }
}

/// Options for the single-call plain export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBasicExportOptions {
    /// Writer engine name.
    pub engine: String,
    /// Frame placement; header and index on by default.
    pub frame: SpecFrameWriteOptions,
    /// Document-wide value options.
    pub write_options: SpecXlsxWriteOptions,
}

impl Default for SpecBasicExportOptions {
    fn default() -> Self {
        Self {
            engine: C_ENGINE_DEFAULT.to_string(),
            frame: SpecFrameWriteOptions::default(),
            write_options: SpecXlsxWriteOptions::default(),
        }
    }
}

/// Options for the deferred-header export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecStyledExportOptions {
    /// Writer engine name.
    pub engine: String,
    /// Rows reserved above the data; the header goes into the last one.
    pub n_rows_reserved: usize,
    /// Emit a leading 0-based row-index column.
    pub if_write_index: bool,
    /// Document-wide value options.
    pub write_options: SpecXlsxWriteOptions,
}

impl Default for SpecStyledExportOptions {
    fn default() -> Self {
        Self {
            engine: C_ENGINE_DEFAULT.to_string(),
            n_rows_reserved: 1,
            if_write_index: true,
            write_options: SpecXlsxWriteOptions::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-frame write report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxReport {
    /// Actual sheet name in workbook.
    pub sheet_name: String,
    /// Data rows written.
    pub n_rows: usize,
    /// Data columns written (index column excluded).
    pub n_cols: usize,
    /// First grid row holding data.
    pub row_data_start: usize,
    /// First grid column holding data.
    pub col_data_start: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl Default for SpecXlsxReport {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            n_rows: 0,
            n_cols: 0,
            row_data_start: 0,
            col_data_start: 0,
            warnings: Vec::new(),
        }
    }
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
