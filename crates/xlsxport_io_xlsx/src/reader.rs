//! Read-back of produced documents.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use crate::error::SpreadsheetError;
use crate::spec::EnumCellValue;

/// Layout hints for [`read_dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxReadOptions {
    /// Grid row holding column names; data starts on the next row.
    pub header_row: usize,
    /// Column 0 holds a row index and is skipped.
    pub if_has_index: bool,
}

impl Default for SpecXlsxReadOptions {
    fn default() -> Self {
        Self {
            header_row: 0,
            if_has_index: true,
        }
    }
}

fn convert_data(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty => EnumCellValue::None,
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Bool(val) => EnumCellValue::Boolean(*val),
        Data::DateTime(val) => EnumCellValue::Number(val.as_f64()),
        Data::DateTimeIso(val) => EnumCellValue::String(val.clone()),
        Data::DurationIso(val) => EnumCellValue::String(val.clone()),
        Data::Error(err) => EnumCellValue::String(format!("#ERROR: {err:?}")),
    }
}

/// Read `sheet_name` as a dense grid anchored at cell (0, 0).
///
/// Blank cells come back as [`EnumCellValue::None`]; dates as serial numbers.
pub fn read_sheet_grid(
    path: impl AsRef<Path>,
    sheet_name: &str,
) -> Result<Vec<Vec<EnumCellValue>>, SpreadsheetError> {
    let mut workbook: Xlsx<BufReader<File>> = open_workbook(path.as_ref())
        .map_err(|err: calamine::XlsxError| SpreadsheetError::Read(err.to_string()))?;
    if !workbook.sheet_names().iter().any(|c_name| c_name == sheet_name) {
        return Err(SpreadsheetError::SheetNotFound(sheet_name.to_string()));
    }
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|err| SpreadsheetError::Read(err.to_string()))?;

    let Some((n_row_end, n_col_end)) = range.end() else {
        return Ok(Vec::new());
    };

    let mut l_grid = Vec::with_capacity(n_row_end as usize + 1);
    for n_row in 0..=n_row_end {
        let l_row = (0..=n_col_end)
            .map(|n_col| {
                range
                    .get_value((n_row, n_col))
                    .map(convert_data)
                    .unwrap_or(EnumCellValue::None)
            })
            .collect::<Vec<_>>();
        l_grid.push(l_row);
    }
    Ok(l_grid)
}

/// Read `sheet_name` back into a dataframe.
///
/// Column dtypes are re-inferred per column: all-numeric → `Float64`,
/// all-boolean → `Boolean`, anything else → `String`.
pub fn read_dataset(
    path: impl AsRef<Path>,
    sheet_name: &str,
    options: &SpecXlsxReadOptions,
) -> Result<DataFrame, SpreadsheetError> {
    let l_grid = read_sheet_grid(path, sheet_name)?;
    let Some(l_header) = l_grid.get(options.header_row) else {
        return Ok(DataFrame::empty());
    };

    let n_col_first = usize::from(options.if_has_index);
    let l_rows_body = &l_grid[options.header_row + 1..];
    let mut l_cols: Vec<Column> = Vec::new();
    for (n_idx_col, value_header) in l_header.iter().enumerate().skip(n_col_first) {
        let c_name = match value_header {
            EnumCellValue::String(val) => val.clone(),
            EnumCellValue::None => continue,
            other => derive_cell_text(other),
        };
        let l_values = l_rows_body
            .iter()
            .map(|row| row.get(n_idx_col).cloned().unwrap_or(EnumCellValue::None))
            .collect::<Vec<_>>();
        l_cols.push(derive_series(&c_name, &l_values).into());
    }

    DataFrame::new(l_cols).map_err(|err| SpreadsheetError::Read(err.to_string()))
}

fn derive_series(c_name: &str, l_values: &[EnumCellValue]) -> Series {
    let if_all_numeric = l_values
        .iter()
        .all(|val| matches!(val, EnumCellValue::None | EnumCellValue::Number(_)));
    if if_all_numeric {
        let l_numbers = l_values
            .iter()
            .map(|val| match val {
                EnumCellValue::Number(n) => Some(*n),
                _ => None,
            })
            .collect::<Vec<_>>();
        return Series::new(c_name.into(), l_numbers);
    }

    let if_all_boolean = l_values
        .iter()
        .all(|val| matches!(val, EnumCellValue::None | EnumCellValue::Boolean(_)));
    if if_all_boolean {
        let l_bools = l_values
            .iter()
            .map(|val| match val {
                EnumCellValue::Boolean(b) => Some(*b),
                _ => None,
            })
            .collect::<Vec<_>>();
        return Series::new(c_name.into(), l_bools);
    }

    let l_texts = l_values
        .iter()
        .map(|val| match val {
            EnumCellValue::None => None,
            other => Some(derive_cell_text(other)),
        })
        .collect::<Vec<_>>();
    Series::new(c_name.into(), l_texts)
}

fn derive_cell_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(val) => val.clone(),
        EnumCellValue::Boolean(val) => val.to_string(),
        EnumCellValue::Number(val) | EnumCellValue::Date(val) | EnumCellValue::DateTime(val) => {
            val.to_string()
        }
    }
}
