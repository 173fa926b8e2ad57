//! Stateless helper utilities used by the XLSX writer kernel.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::{AnyValue, DataFrame, DataType, TimeUnit};
use rust_xlsxwriter::ExcelDateTime;

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::error::SpreadsheetError;
use crate::spec::{EnumCellValue, SpecFrameWriteOptions, SpecXlsxValuePolicy};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert `NaN`/`Inf` to policy string; return error for finite values.
pub fn convert_nan_inf_to_str(
    x: f64,
    value_policy: &SpecXlsxValuePolicy,
) -> Result<String, String> {
    if x.is_nan() {
        return Ok(value_policy.nan_str.clone());
    }
    if x.is_infinite() {
        return Ok(if x.is_sign_positive() {
            value_policy.posinf_str.clone()
        } else {
            value_policy.neginf_str.clone()
        });
    }
    Err("Input is neither NaN nor Inf.".to_string())
}

fn convert_float(
    x: f64,
    if_keep_missing_values: bool,
    value_policy: &SpecXlsxValuePolicy,
) -> EnumCellValue {
    if x.is_finite() {
        return EnumCellValue::Number(x);
    }
    if !if_keep_missing_values {
        return EnumCellValue::None;
    }
    EnumCellValue::String(
        convert_nan_inf_to_str(x, value_policy).unwrap_or_else(|_| value_policy.nan_str.clone()),
    )
}

/// Proleptic Gregorian `(year, month, day)` for days since 1970-01-01.
fn derive_civil_from_days(n_days: i64) -> (i64, u8, u8) {
    let n_shifted = n_days + 719_468;
    let n_era = n_shifted.div_euclid(146_097);
    let n_doe = n_shifted.rem_euclid(146_097);
    let n_yoe = (n_doe - n_doe / 1_460 + n_doe / 36_524 - n_doe / 146_096) / 365;
    let n_doy = n_doe - (365 * n_yoe + n_yoe / 4 - n_yoe / 100);
    let n_mp = (5 * n_doy + 2) / 153;
    let n_day = (n_doy - (153 * n_mp + 2) / 5 + 1) as u8;
    let n_month = (if n_mp < 10 { n_mp + 3 } else { n_mp - 9 }) as u8;
    let n_year = n_yoe + n_era * 400 + i64::from(n_month <= 2);
    (n_year, n_month, n_day)
}

/// Excel serial day number for days since the Unix epoch.
///
/// `None` outside Excel's 1900..=9999 calendar. The 1900 leap-year quirk is
/// handled by `ExcelDateTime`.
pub fn derive_excel_serial_from_days(n_days: i64) -> Option<f64> {
    let (n_year, n_month, n_day) = derive_civil_from_days(n_days);
    let n_year = u16::try_from(n_year).ok().filter(|y| (1900..=9999).contains(y))?;
    ExcelDateTime::from_ymd(n_year, n_month, n_day)
        .ok()
        .map(|dt| dt.to_excel())
}

/// Excel serial day number for a Unix timestamp in `time_unit`.
pub fn derive_excel_serial_from_timestamp(n_value: i64, time_unit: TimeUnit) -> Option<f64> {
    let n_units_per_day: i64 = match time_unit {
        TimeUnit::Nanoseconds => 86_400_000_000_000,
        TimeUnit::Microseconds => 86_400_000_000,
        TimeUnit::Milliseconds => 86_400_000,
    };
    let n_serial_day = derive_excel_serial_from_days(n_value.div_euclid(n_units_per_day))?;
    Some(n_serial_day + n_value.rem_euclid(n_units_per_day) as f64 / n_units_per_day as f64)
}

/// Normalize one dataframe value into a writable cell value.
///
/// Scalars without a native cell type (time, duration, categorical, ...) and
/// dates outside Excel's calendar are written as their display text.
pub fn convert_any_value(
    value: AnyValue<'_>,
    if_keep_missing_values: bool,
    value_policy: &SpecXlsxValuePolicy,
) -> EnumCellValue {
    match value {
        AnyValue::Null => {
            if if_keep_missing_values {
                EnumCellValue::String(value_policy.missing_value_str.clone())
            } else {
                EnumCellValue::None
            }
        }
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => convert_float(val as f64, if_keep_missing_values, value_policy),
        AnyValue::Float64(val) => convert_float(val, if_keep_missing_values, value_policy),
        AnyValue::Date(n_days) => match derive_excel_serial_from_days(i64::from(n_days)) {
            Some(n_serial) => EnumCellValue::Date(n_serial),
            None => EnumCellValue::String(value.to_string()),
        },
        AnyValue::Datetime(n_value, time_unit, _) => {
            match derive_excel_serial_from_timestamp(n_value, time_unit) {
                Some(n_serial) => EnumCellValue::DateTime(n_serial),
                None => EnumCellValue::String(value.to_string()),
            }
        }
        other => EnumCellValue::String(other.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameLikeUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), SpreadsheetError> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!(
                    "{c_name:?} x{} at indices {:?}",
                    l_pos.len(),
                    l_pos
                ))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(SpreadsheetError::InvalidColumns(format!(
        "Duplicate column names detected: {c_msg}"
    )))
}

/// Reject columns whose dtype has no cell representation (nested, binary).
pub fn validate_supported_dtypes(df: &DataFrame) -> Result<(), SpreadsheetError> {
    for col in df.get_columns() {
        let dtype = col.dtype();
        if dtype.is_nested() || matches!(dtype, DataType::Binary | DataType::BinaryOffset) {
            return Err(SpreadsheetError::serialization(
                col.name().to_string(),
                format!("dtype {dtype} has no spreadsheet cell representation"),
            ));
        }
    }
    Ok(())
}

/// Check that the frame fits one sheet at the requested placement.
pub fn validate_grid_bounds(
    height_df: usize,
    width_df: usize,
    options: &SpecFrameWriteOptions,
) -> Result<(), SpreadsheetError> {
    let n_rows_needed = options.row_start + usize::from(options.if_write_header) + height_df;
    if n_rows_needed > N_NROWS_EXCEL_MAX {
        return Err(SpreadsheetError::serialization(
            "<rows>",
            format!("{n_rows_needed} rows exceed the Excel limit of {N_NROWS_EXCEL_MAX}"),
        ));
    }
    let n_cols_needed = options.col_start + usize::from(options.if_write_index) + width_df;
    if n_cols_needed > N_NCOLS_EXCEL_MAX {
        return Err(SpreadsheetError::serialization(
            "<columns>",
            format!("{n_cols_needed} columns exceed the Excel limit of {N_NCOLS_EXCEL_MAX}"),
        ));
    }
    Ok(())
}

/// Column names of `df` as owned strings.
pub fn derive_column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

/// All pre-write checks for one frame: unique names, supported dtypes, bounds.
pub fn validate_frame_writable(
    df: &DataFrame,
    options: &SpecFrameWriteOptions,
) -> Result<(), SpreadsheetError> {
    validate_unique_columns(&derive_column_names(df))?;
    validate_supported_dtypes(df)?;
    validate_grid_bounds(df.height(), df.width(), options)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Case-folded key used for sheet-name uniqueness (Excel ignores case).
pub fn derive_sheet_key(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn cast_row_num(value: usize) -> Result<u32, SpreadsheetError> {
    u32::try_from(value)
        .map_err(|_| SpreadsheetError::Write(format!("row index overflow: {value}")))
}

pub(crate) fn cast_col_num(value: usize) -> Result<u16, SpreadsheetError> {
    u16::try_from(value)
        .map_err(|_| SpreadsheetError::Write(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
