//! XLSX constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Sheet name used by single-call exports.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";
/// Engine name resolved when the caller does not pick one.
pub const C_ENGINE_DEFAULT: &str = "xlsxwriter";

/// Header fill color used by the header preset.
pub const C_HEADER_FILL_COLOR: &str = "#D7E4BC";

/// Build default named format presets.
///
/// - `header`   : bold, wrapped, top-aligned, green fill, thin border
/// - `date`     : `yyyy-mm-dd` number format
/// - `datetime` : `yyyy-mm-dd hh:mm:ss` number format
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(
        "header".to_string(),
        SpecCellFormat {
            bold: Some(true),
            text_wrap: Some(true),
            valign: Some("top".to_string()),
            bg_color: Some(C_HEADER_FILL_COLOR.to_string()),
            border: Some(1),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        "date".to_string(),
        SpecCellFormat {
            num_format: Some("yyyy-mm-dd".to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        "datetime".to_string(),
        SpecCellFormat {
            num_format: Some("yyyy-mm-dd hh:mm:ss".to_string()),
            ..Default::default()
        },
    );
    dict_fmt
}

/// Header preset from [`derive_default_xlsx_formats`].
pub fn derive_header_format() -> SpecCellFormat {
    derive_default_xlsx_formats()
        .remove("header")
        .unwrap_or_default()
}
