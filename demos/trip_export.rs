//! Export a small taxi-trip table twice: once plain, once with a styled
//! header, then move both files onto an export "volume".
//!
//! Run with `cargo run -p xlsxport --example trip_export [volume_dir]`.

use std::error::Error;
use std::path::PathBuf;

use polars::prelude::*;
use xlsxport::{
    EnumRelocateConflictStrategy, ExportPipeline, MemorySource, SpecExportOptions,
    SpecRelocateOptions,
};

const C_TABLE: &str = "main.sampledatabase.sample_taxi_trips_identity";

fn derive_trips() -> PolarsResult<DataFrame> {
    df!(
        "trip_id" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        "vendor" => ["CMT", "VTS", "CMT", "VTS", "VTS", "CMT", "CMT", "VTS", "CMT", "VTS", "CMT", "VTS"],
        "trip_distance" => [1.2f64, 0.4, 9.9, 3.3, 2.0, 17.8, 0.9, 4.4, 6.1, 1.1, 2.7, 12.3],
        "fare_amount" => [7.5f64, 4.0, 29.5, 13.0, 9.5, 52.0, 5.5, 16.5, 21.0, 6.0, 11.0, 38.5],
        "pickup_zip" => [10001i32, 10003, 11371, 10011, 10014, 11430, 10019, 10022, 10036, 10128, 10003, 11201],
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    xlsxport_log::init_logging("xlsxport=info,xlsxport_io_fs=info,xlsxport_io_xlsx=info");

    let path_dir_volume = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("xlsxport_volume"));
    std::fs::create_dir_all(&path_dir_volume)?;

    let source = MemorySource::new().with_table(C_TABLE, derive_trips()?);
    let query = format!("SELECT * FROM {C_TABLE} LIMIT 10");
    let relocate_options = SpecRelocateOptions {
        rule_conflict: EnumRelocateConflictStrategy::Overwrite,
        ..Default::default()
    };

    let pipeline_basic = ExportPipeline::new(SpecExportOptions {
        relocate_options: relocate_options.clone(),
        ..Default::default()
    });
    let report = pipeline_basic.run_basic(
        &source,
        &query,
        path_dir_volume.join("excel_file.xlsx"),
    )?;
    println!("{report}");

    let pipeline_styled = ExportPipeline::new(SpecExportOptions {
        sheet_name: "Drews Sheet".to_string(),
        relocate_options,
        ..Default::default()
    });
    let report = pipeline_styled.run(
        &source,
        &query,
        path_dir_volume.join("excel_with_header.xlsx"),
    )?;
    println!("{report}");

    Ok(())
}
