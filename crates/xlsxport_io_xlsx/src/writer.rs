//! XLSX document session and export entry points.
//!
//! A [`XlsxDocument`] is one open workbook bound to an output path and an
//! engine. Frames, header rows and single cells are written through the same
//! handle; [`XlsxDocument::close`] flushes the workbook to disk once.
//!
//! [`export_styled`] uses the deferred-header protocol: data rows are written
//! below a reserved row first, then the header row is written into the
//! reserved row with its own format. Header styling stays independent of the
//! body without re-opening the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::{AnyValue, DataFrame};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::{debug, info, warn};

use crate::conf::C_SHEET_NAME_DEFAULT;
use crate::error::SpreadsheetError;
use crate::spec::{
    EnumCellValue, EnumXlsxEngine, SpecBasicExportOptions, SpecCellFormat,
    SpecFrameWriteOptions, SpecStyledExportOptions, SpecXlsxReport, SpecXlsxWriteOptions,
};
use crate::util::{
    cast_col_num, cast_row_num, convert_any_value, derive_column_names, derive_sheet_key,
    sanitize_sheet_name, validate_frame_writable,
};

/// Stateful workbook session.
///
/// The workbook is buffered in memory until [`Self::close`] is called. A
/// session dropped without `close` is finalized on drop; failures there are
/// logged only.
pub struct XlsxDocument {
    path_file_out: PathBuf,
    enum_engine: EnumXlsxEngine,
    workbook: Workbook,
    write_options: SpecXlsxWriteOptions,
    dict_sheet_idx: BTreeMap<String, usize>,
    l_sheet_names: Vec<String>,
    if_closed: bool,
}

impl XlsxDocument {
    /// Open a new document at `path_file_out` bound to `engine`.
    ///
    /// Fails with [`SpreadsheetError::UnsupportedEngine`] before anything is
    /// written when the engine name does not resolve.
    pub fn open(
        path_file_out: impl Into<PathBuf>,
        engine: &str,
    ) -> Result<Self, SpreadsheetError> {
        Self::open_with_options(path_file_out, engine, SpecXlsxWriteOptions::default())
    }

    /// Same as [`Self::open`] with explicit value options.
    pub fn open_with_options(
        path_file_out: impl Into<PathBuf>,
        engine: &str,
        write_options: SpecXlsxWriteOptions,
    ) -> Result<Self, SpreadsheetError> {
        let enum_engine: EnumXlsxEngine = engine.parse()?;
        let path_file_out = path_file_out.into();
        debug!(
            path = %path_file_out.display(),
            engine = enum_engine.name(),
            "xlsx document opened"
        );
        Ok(Self {
            path_file_out,
            enum_engine,
            workbook: Workbook::new(),
            write_options,
            dict_sheet_idx: BTreeMap::new(),
            l_sheet_names: Vec::new(),
            if_closed: false,
        })
    }

    /// Output file path.
    pub fn file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// `true` once [`Self::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.if_closed
    }

    /// Sheet names in creation order.
    pub fn sheet_names(&self) -> &[String] {
        &self.l_sheet_names
    }

    /// Create sheet `sheet_name` (sanitized) or return the existing one's name.
    pub fn add_sheet(&mut self, sheet_name: &str) -> Result<String, SpreadsheetError> {
        self.ensure_open()?;
        let n_idx = self.resolve_sheet_idx(sheet_name, true)?;
        Ok(self.l_sheet_names[n_idx].clone())
    }

    /// Write `df` into `sheet_name`, creating the sheet when missing.
    ///
    /// Layout with `row_start = r0`, `col_start = c0`:
    /// - header (optional): column names at `(r0, c0 + idx_offset + i)`;
    ///   the index header cell stays blank
    /// - index (optional): row position `r` at `(data_row(r), c0)`
    /// - data: value of row `r`, column `i` at `(data_row(r), c0 + idx_offset + i)`
    ///
    /// where `data_row(r) = r0 + header_rows + r`. Data cells use default
    /// styling; date/datetime cells only get a number format.
    pub fn write_frame(
        &mut self,
        df: &DataFrame,
        sheet_name: &str,
        options: &SpecFrameWriteOptions,
    ) -> Result<SpecXlsxReport, SpreadsheetError> {
        self.ensure_open()?;
        validate_frame_writable(df, options)?;

        let n_idx_sheet = self.resolve_sheet_idx(sheet_name, true)?;
        let sheet_name_actual = self.l_sheet_names[n_idx_sheet].clone();

        let l_colnames = derive_column_names(df);
        let n_col_offset_index = usize::from(options.if_write_index);
        let n_row_data_start = options.row_start + usize::from(options.if_write_header);
        let n_col_data_start = options.col_start + n_col_offset_index;

        let fmt_date = derive_rust_xlsx_format(&self.write_options.fmt_date);
        let fmt_datetime = derive_rust_xlsx_format(&self.write_options.fmt_datetime);
        let if_keep_missing_values = self.write_options.keep_missing_values;
        let value_policy = &self.write_options.value_policy;

        let worksheet = self
            .workbook
            .worksheet_from_index(n_idx_sheet)
            .map_err(derive_xlsx_error)?;

        if options.if_write_header {
            for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
                write_cell_with_format(
                    worksheet,
                    options.row_start,
                    n_col_data_start + n_idx_col,
                    &EnumCellValue::String(c_name.clone()),
                    None,
                )?;
            }
        }

        let l_cols = df.get_columns();
        let mut l_n_non_finite = vec![0usize; l_cols.len()];
        let mut l_n_dates_as_text = vec![0usize; l_cols.len()];
        for n_idx_row in 0..df.height() {
            let n_row_grid = n_row_data_start + n_idx_row;
            if options.if_write_index {
                write_cell_with_format(
                    worksheet,
                    n_row_grid,
                    options.col_start,
                    &EnumCellValue::Number(n_idx_row as f64),
                    None,
                )?;
            }
            for (n_idx_col, col) in l_cols.iter().enumerate() {
                let value_raw = col.get(n_idx_row).map_err(|err| {
                    SpreadsheetError::serialization(
                        col.name().to_string(),
                        format!("failed to access row {n_idx_row}: {err}"),
                    )
                })?;
                let if_non_finite = match value_raw {
                    AnyValue::Float32(x) => !x.is_finite(),
                    AnyValue::Float64(x) => !x.is_finite(),
                    _ => false,
                };
                let if_temporal = matches!(value_raw, AnyValue::Date(_) | AnyValue::Datetime(..));
                let value = convert_any_value(value_raw, if_keep_missing_values, value_policy);
                if if_non_finite {
                    l_n_non_finite[n_idx_col] += 1;
                }
                if if_temporal && matches!(value, EnumCellValue::String(_)) {
                    l_n_dates_as_text[n_idx_col] += 1;
                }
                let fmt = match value {
                    EnumCellValue::Date(_) => Some(&fmt_date),
                    EnumCellValue::DateTime(_) => Some(&fmt_datetime),
                    _ => None,
                };
                write_cell_with_format(
                    worksheet,
                    n_row_grid,
                    n_col_data_start + n_idx_col,
                    &value,
                    fmt,
                )?;
            }
        }

        let mut report = SpecXlsxReport {
            sheet_name: sheet_name_actual,
            n_rows: df.height(),
            n_cols: df.width(),
            row_data_start: n_row_data_start,
            col_data_start: n_col_data_start,
            warnings: Vec::new(),
        };
        let c_non_finite_as = if if_keep_missing_values {
            "placeholder text"
        } else {
            "blank cells"
        };
        for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
            if l_n_non_finite[n_idx_col] > 0 {
                report.warn(format!(
                    "column '{c_name}': {} NaN/Inf value(s) written as {c_non_finite_as}",
                    l_n_non_finite[n_idx_col]
                ));
            }
            if l_n_dates_as_text[n_idx_col] > 0 {
                report.warn(format!(
                    "column '{c_name}': {} date value(s) outside the Excel calendar written as text",
                    l_n_dates_as_text[n_idx_col]
                ));
            }
        }
        for c_warning in &report.warnings {
            warn!(sheet = %report.sheet_name, "{c_warning}");
        }
        debug!(
            sheet = %report.sheet_name,
            rows = report.n_rows,
            cols = report.n_cols,
            row_start = report.row_data_start,
            "frame written"
        );
        Ok(report)
    }

    /// Write `names` as one styled row at `(row, col_start + i)` of an existing sheet.
    pub fn write_header_row<S: AsRef<str>>(
        &mut self,
        sheet_name: &str,
        row: usize,
        col_start: usize,
        names: &[S],
        fmt_header: &SpecCellFormat,
    ) -> Result<(), SpreadsheetError> {
        self.ensure_open()?;
        let n_idx_sheet = self.resolve_sheet_idx(sheet_name, false)?;
        let fmt = derive_rust_xlsx_format(fmt_header);
        let worksheet = self
            .workbook
            .worksheet_from_index(n_idx_sheet)
            .map_err(derive_xlsx_error)?;

        for (n_idx_col, c_name) in names.iter().enumerate() {
            write_cell_with_format(
                worksheet,
                row,
                col_start + n_idx_col,
                &EnumCellValue::String(c_name.as_ref().to_string()),
                Some(&fmt),
            )?;
        }
        debug!(sheet = sheet_name, row, cols = names.len(), "header row written");
        Ok(())
    }

    /// Write one cell of an existing sheet, optionally styled.
    pub fn write_cell(
        &mut self,
        sheet_name: &str,
        row: usize,
        col: usize,
        value: &EnumCellValue,
        fmt: Option<&SpecCellFormat>,
    ) -> Result<(), SpreadsheetError> {
        self.ensure_open()?;
        let n_idx_sheet = self.resolve_sheet_idx(sheet_name, false)?;
        let fmt = fmt.map(derive_rust_xlsx_format);
        let worksheet = self
            .workbook
            .worksheet_from_index(n_idx_sheet)
            .map_err(derive_xlsx_error)?;
        write_cell_with_format(worksheet, row, col, value, fmt.as_ref())
    }

    /// Flush workbook to disk. Runs once; later calls are no-ops.
    ///
    /// The document counts as finalized even when the flush fails; the file
    /// at [`Self::file_out`] must then be treated as unusable.
    pub fn close(&mut self) -> Result<(), SpreadsheetError> {
        if self.if_closed {
            return Ok(());
        }
        self.if_closed = true;
        if self.l_sheet_names.is_empty() {
            self.resolve_sheet_idx(C_SHEET_NAME_DEFAULT, true)?;
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error)?;
        info!(
            path = %self.path_file_out.display(),
            engine = self.enum_engine.name(),
            sheets = self.l_sheet_names.len(),
            "xlsx document finalized"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SpreadsheetError> {
        if self.if_closed {
            return Err(SpreadsheetError::DocumentClosed(self.path_file_out.clone()));
        }
        Ok(())
    }

    fn resolve_sheet_idx(
        &mut self,
        sheet_name: &str,
        if_create: bool,
    ) -> Result<usize, SpreadsheetError> {
        let c_name = sanitize_sheet_name(sheet_name, "_");
        let c_key = derive_sheet_key(&c_name);
        if let Some(n_idx) = self.dict_sheet_idx.get(&c_key) {
            return Ok(*n_idx);
        }
        if !if_create {
            return Err(SpreadsheetError::SheetNotFound(sheet_name.to_string()));
        }

        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&c_name).map_err(derive_xlsx_error)?;
        let n_idx = self.l_sheet_names.len();
        self.l_sheet_names.push(c_name);
        self.dict_sheet_idx.insert(c_key, n_idx);
        Ok(n_idx)
    }
}

impl Drop for XlsxDocument {
    fn drop(&mut self) {
        if self.if_closed {
            return;
        }
        if let Err(err) = self.close() {
            warn!(
                path = %self.path_file_out.display(),
                error = %err,
                "xlsx document finalization on drop failed"
            );
        }
    }
}

/// Open a document, run `f` against it, and finalize it on every exit path.
///
/// When `f` fails the document is still finalized and `f`'s error wins.
pub fn with_document<T, F>(
    path_file_out: impl Into<PathBuf>,
    engine: &str,
    write_options: SpecXlsxWriteOptions,
    f: F,
) -> Result<T, SpreadsheetError>
where
    F: FnOnce(&mut XlsxDocument) -> Result<T, SpreadsheetError>,
{
    let mut document = XlsxDocument::open_with_options(path_file_out, engine, write_options)?;
    let res_body = f(&mut document);
    let res_close = document.close();
    match (res_body, res_close) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err_close)) => Err(err_close),
        (Err(err_body), res_close) => {
            if let Err(err_close) = res_close {
                warn!(error = %err_close, "finalization failed after write error");
            }
            Err(err_body)
        }
    }
}

/// Write `df` with header and index, default styling, to `path` in sheet `Sheet1`.
pub fn export_basic(
    df: &DataFrame,
    path: impl AsRef<Path>,
) -> Result<SpecXlsxReport, SpreadsheetError> {
    export_basic_with_options(
        df,
        path,
        C_SHEET_NAME_DEFAULT,
        &SpecBasicExportOptions::default(),
    )
}

/// Single-call export with explicit sheet name, engine, placement and value options.
///
/// Nothing is created on disk when the engine does not resolve or the frame
/// fails validation.
pub fn export_basic_with_options(
    df: &DataFrame,
    path: impl AsRef<Path>,
    sheet_name: &str,
    options: &SpecBasicExportOptions,
) -> Result<SpecXlsxReport, SpreadsheetError> {
    let _: EnumXlsxEngine = options.engine.parse()?;
    validate_frame_writable(df, &options.frame)?;
    with_document(
        path.as_ref(),
        &options.engine,
        options.write_options.clone(),
        |document| document.write_frame(df, sheet_name, &options.frame),
    )
}

/// Deferred-header export with the default engine and one reserved row.
pub fn export_styled(
    df: &DataFrame,
    path: impl AsRef<Path>,
    sheet_name: &str,
    fmt_header: &SpecCellFormat,
) -> Result<SpecXlsxReport, SpreadsheetError> {
    export_styled_with_options(
        df,
        path,
        sheet_name,
        fmt_header,
        &SpecStyledExportOptions::default(),
    )
}

/// Deferred-header export.
///
/// 1. open a document bound to `options.engine`
/// 2. write data rows from row `n_rows_reserved`, no header
/// 3. write the header row into row `n_rows_reserved - 1` with `fmt_header`
/// 4. finalize once
pub fn export_styled_with_options(
    df: &DataFrame,
    path: impl AsRef<Path>,
    sheet_name: &str,
    fmt_header: &SpecCellFormat,
    options: &SpecStyledExportOptions,
) -> Result<SpecXlsxReport, SpreadsheetError> {
    if options.n_rows_reserved == 0 {
        return Err(SpreadsheetError::InvalidOptions(
            "n_rows_reserved must be >= 1 to hold the header row.".to_string(),
        ));
    }
    let options_frame = SpecFrameWriteOptions {
        row_start: options.n_rows_reserved,
        col_start: 0,
        if_write_header: false,
        if_write_index: options.if_write_index,
    };
    let _: EnumXlsxEngine = options.engine.parse()?;
    validate_frame_writable(df, &options_frame)?;

    let l_colnames = derive_column_names(df);
    with_document(
        path.as_ref(),
        &options.engine,
        options.write_options.clone(),
        |document| {
            let report = document.write_frame(df, sheet_name, &options_frame)?;
            document.write_header_row(
                &report.sheet_name,
                options.n_rows_reserved - 1,
                report.col_data_start,
                &l_colnames,
                fmt_header,
            )?;
            Ok(report)
        },
    )
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<(), SpreadsheetError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    let res = match (value, format) {
        (EnumCellValue::None, Some(fmt)) => worksheet.write_blank(n_row, n_col, fmt),
        (EnumCellValue::None, None) => return Ok(()),
        (EnumCellValue::String(val), Some(fmt)) => {
            worksheet.write_string_with_format(n_row, n_col, val, fmt)
        }
        (EnumCellValue::String(val), None) => worksheet.write_string(n_row, n_col, val),
        (EnumCellValue::Boolean(val), Some(fmt)) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, fmt)
        }
        (EnumCellValue::Boolean(val), None) => worksheet.write_boolean(n_row, n_col, *val),
        (
            EnumCellValue::Number(val) | EnumCellValue::Date(val) | EnumCellValue::DateTime(val),
            Some(fmt),
        ) => worksheet.write_number_with_format(n_row, n_col, *val, fmt),
        (
            EnumCellValue::Number(val) | EnumCellValue::Date(val) | EnumCellValue::DateTime(val),
            None,
        ) => worksheet.write_number(n_row, n_col, *val),
    };
    res.map_err(derive_xlsx_error)?;
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    // Vertical variants live in `FormatAlign` too; `set_align` keeps the
    // horizontal and vertical settings apart.
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if let Some(val) = spec.left {
        format = format.set_border_left(derive_format_border(val));
    }
    if let Some(val) = spec.right {
        format = format.set_border_right(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn derive_xlsx_error(err: XlsxError) -> SpreadsheetError {
    SpreadsheetError::Write(err.to_string())
}
