use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use xlsxport::{
    EnumRelocateConflictStrategy, ExportError, ExportPipeline, IpcDirSource, MemorySource,
    QueryError, SpecExportOptions, SpecRelocateOptions, SpecStyledExportOptions,
};
use xlsxport_io_fs::RelocateError;
use xlsxport_io_xlsx::{
    EnumCellValue, SpecXlsxReadOptions, SpreadsheetError, read_dataset, read_sheet_grid,
};

fn derive_trips() -> DataFrame {
    df!(
        "id" => [1i64, 2],
        "fare" => [12.5f64, 7.0],
    )
    .expect("frame")
}

fn derive_pipeline(path_dir_transient: &Path) -> ExportPipeline {
    ExportPipeline::new(SpecExportOptions {
        path_dir_transient: path_dir_transient.to_path_buf(),
        sheet_name: "Trips".to_string(),
        ..Default::default()
    })
}

fn list_names(path_dir: &Path) -> Vec<String> {
    let mut l_names = std::fs::read_dir(path_dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect::<Vec<_>>();
    l_names.sort();
    l_names
}

struct TestDirs {
    _tmp: tempfile::TempDir,
    local: std::path::PathBuf,
    volume: std::path::PathBuf,
}

fn derive_dirs() -> TestDirs {
    let tmp = tempfile::tempdir().expect("tempdir");
    let local = tmp.path().join("local");
    let volume = tmp.path().join("volume");
    std::fs::create_dir_all(&local).expect("create local");
    std::fs::create_dir_all(&volume).expect("create volume");
    TestDirs {
        _tmp: tmp,
        local,
        volume,
    }
}

#[test]
fn styled_export_lands_at_target_with_deferred_header() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("main.db.trips", derive_trips());
    let path_target = dirs.volume.join("excel_with_header.xlsx");

    let report = derive_pipeline(&dirs.local)
        .run(&source, "SELECT * FROM main.db.trips LIMIT 10", &path_target)
        .expect("run");

    assert_eq!(report.sheet_name(), "Trips");
    assert_eq!(report.n_rows(), 2);
    assert_eq!(report.n_cols(), 2);
    assert_eq!(report.path_target(), path_target.as_path());
    assert!(list_names(&dirs.local).is_empty());

    let grid = read_sheet_grid(&path_target, "Trips").expect("read grid");
    assert_eq!(
        grid,
        vec![
            vec![
                EnumCellValue::None,
                EnumCellValue::String("id".to_string()),
                EnumCellValue::String("fare".to_string()),
            ],
            vec![
                EnumCellValue::Number(0.0),
                EnumCellValue::Number(1.0),
                EnumCellValue::Number(12.5),
            ],
            vec![
                EnumCellValue::Number(1.0),
                EnumCellValue::Number(2.0),
                EnumCellValue::Number(7.0),
            ],
        ]
    );
}

#[test]
fn exported_document_reads_back_as_dataset() {
    let dirs = derive_dirs();
    let df = df!(
        "vendor" => ["CMT", "VTS", "CMT"],
        "distance" => [1.2f64, 0.4, 9.9],
        "paid" => [true, false, true],
    )
    .expect("frame");
    let source = MemorySource::new().with_table("trips", df);
    let path_target = dirs.volume.join("trips.xlsx");

    derive_pipeline(&dirs.local)
        .run(&source, "trips", &path_target)
        .expect("run");

    let df_back =
        read_dataset(&path_target, "Trips", &SpecXlsxReadOptions::default()).expect("read back");
    assert_eq!(
        df_back.get_column_names_str(),
        vec!["vendor", "distance", "paid"]
    );
    let s_vendor = df_back.column("vendor").expect("vendor").str().expect("str");
    assert_eq!(
        s_vendor.into_iter().collect::<Vec<_>>(),
        vec![Some("CMT"), Some("VTS"), Some("CMT")]
    );
    let s_distance = df_back.column("distance").expect("distance").f64().expect("f64");
    assert_eq!(s_distance.get(2), Some(9.9));
    let s_paid = df_back.column("paid").expect("paid").bool().expect("bool");
    assert_eq!(s_paid.get(1), Some(false));
}

#[test]
fn empty_result_produces_header_only_document() {
    let dirs = derive_dirs();
    let df = df!(
        "a" => [1i64],
        "b" => ["x"],
        "c" => [0.5f64],
    )
    .expect("frame");
    let source = MemorySource::new().with_table("t", df);
    let path_target = dirs.volume.join("empty.xlsx");

    let report = derive_pipeline(&dirs.local)
        .run(&source, "SELECT * FROM t LIMIT 0", &path_target)
        .expect("run");
    assert_eq!(report.n_rows(), 0);

    let grid = read_sheet_grid(&path_target, "Trips").expect("read grid");
    assert_eq!(grid.len(), 1);
    assert_eq!(grid[0][1], EnumCellValue::String("a".to_string()));
    assert_eq!(grid[0][3], EnumCellValue::String("c".to_string()));
}

#[test]
fn relocation_failure_keeps_finished_transient_file() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let path_target = dirs.volume.join("missing/trips.xlsx");

    let err = derive_pipeline(&dirs.local)
        .run(&source, "trips", &path_target)
        .expect_err("missing parent");
    let (source, path_transient) = match err {
        ExportError::Relocate {
            source,
            path_transient,
        } => (source, path_transient),
        other => panic!("expected relocation error, got {other:?}"),
    };
    assert!(matches!(source, RelocateError::DestinationParentMissing(_)));
    assert_eq!(path_transient.parent(), Some(dirs.local.as_path()));
    let c_name = path_transient
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .into_owned();
    assert!(c_name.starts_with("trips.") && c_name.ends_with(".xlsx"));
    assert_eq!(list_names(&dirs.local), vec![c_name]);

    let grid = read_sheet_grid(&path_transient, "Trips").expect("transient is complete");
    assert_eq!(grid.len(), 3);
    assert!(!path_target.exists());
}

#[test]
fn existing_target_follows_conflict_policy() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let path_target = dirs.volume.join("trips.xlsx");
    std::fs::write(&path_target, b"previous").expect("write previous");

    let err = derive_pipeline(&dirs.local)
        .run(&source, "trips", &path_target)
        .expect_err("conflict");
    let path_kept = match err {
        ExportError::Relocate {
            source: RelocateError::DestinationExists(_),
            path_transient,
        } => path_transient,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert_eq!(std::fs::read(&path_target).expect("read"), b"previous");

    let pipeline = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        sheet_name: "Trips".to_string(),
        relocate_options: SpecRelocateOptions {
            rule_conflict: EnumRelocateConflictStrategy::Overwrite,
            ..Default::default()
        },
        ..Default::default()
    });
    let report = pipeline
        .run(&source, "trips", &path_target)
        .expect("overwrite run");
    assert!(report.report_relocate.if_overwritten);
    assert_eq!(
        list_names(&dirs.local),
        vec![path_kept.file_name().expect("name").to_string_lossy().into_owned()]
    );
    assert_eq!(
        read_sheet_grid(&path_target, "Trips").expect("read grid").len(),
        3
    );
}

#[test]
fn unsupported_engine_writes_nothing() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let pipeline = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        export_options: SpecStyledExportOptions {
            engine: "openpyxl".to_string(),
            ..Default::default()
        },
        ..Default::default()
    });

    let err = pipeline
        .run(&source, "trips", dirs.volume.join("trips.xlsx"))
        .expect_err("engine");
    assert!(matches!(
        err,
        ExportError::Xlsx(SpreadsheetError::UnsupportedEngine(_))
    ));
    assert!(list_names(&dirs.local).is_empty());
    assert!(list_names(&dirs.volume).is_empty());
}

#[test]
fn write_failure_relocates_nothing() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let pipeline = derive_pipeline(&dirs.local.join("not_created"));

    let err = pipeline
        .run(&source, "trips", dirs.volume.join("trips.xlsx"))
        .expect_err("transient dir missing");
    assert!(matches!(err, ExportError::Transient { .. }));
    assert!(list_names(&dirs.volume).is_empty());
}

#[test]
fn runs_never_touch_other_files_in_the_transient_dir() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let path_local_own = dirs.local.join("trips.xlsx");
    std::fs::write(&path_local_own, b"not ours").expect("write local file");

    let pipeline_failing = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        export_options: SpecStyledExportOptions {
            engine: "openpyxl".to_string(),
            ..Default::default()
        },
        ..Default::default()
    });
    pipeline_failing
        .run(&source, "trips", dirs.volume.join("trips.xlsx"))
        .expect_err("engine");
    assert_eq!(std::fs::read(&path_local_own).expect("read"), b"not ours");

    derive_pipeline(&dirs.local)
        .run(&source, "trips", dirs.volume.join("trips.xlsx"))
        .expect("run");
    assert_eq!(std::fs::read(&path_local_own).expect("read"), b"not ours");
    assert_eq!(list_names(&dirs.local), vec!["trips.xlsx".to_string()]);
    assert_eq!(
        read_sheet_grid(dirs.volume.join("trips.xlsx"), "Trips")
            .expect("read grid")
            .len(),
        3
    );
}

#[test]
fn query_errors_surface_before_any_write() {
    let dirs = derive_dirs();
    let source = MemorySource::new();
    let pipeline = derive_pipeline(&dirs.local);

    let err = pipeline
        .run(&source, "SELECT * FROM nope", dirs.volume.join("x.xlsx"))
        .expect_err("missing table");
    assert!(matches!(err, ExportError::Query(QueryError::TableNotFound(_))));

    let err = pipeline
        .run(&source, "DELETE FROM trips", dirs.volume.join("x.xlsx"))
        .expect_err("bad query");
    assert!(matches!(err, ExportError::Query(QueryError::InvalidQuery(_))));
    assert!(list_names(&dirs.local).is_empty());
}

#[test]
fn basic_run_writes_plain_layout() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());
    let path_target = dirs.volume.join("excel_file.xlsx");

    let report = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        ..Default::default()
    })
    .run_basic(&source, "trips", &path_target)
    .expect("run basic");
    assert_eq!(report.sheet_name(), "Sheet1");

    let grid = read_sheet_grid(&path_target, "Sheet1").expect("read grid");
    assert_eq!(grid[0][1], EnumCellValue::String("id".to_string()));
    assert_eq!(grid[2][2], EnumCellValue::Number(7.0));
}

#[test]
fn basic_run_honors_engine_and_index_options() {
    let dirs = derive_dirs();
    let source = MemorySource::new().with_table("trips", derive_trips());

    let err = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        export_options: SpecStyledExportOptions {
            engine: "openpyxl".to_string(),
            ..Default::default()
        },
        ..Default::default()
    })
    .run_basic(&source, "trips", dirs.volume.join("plain.xlsx"))
    .expect_err("engine");
    assert!(matches!(
        err,
        ExportError::Xlsx(SpreadsheetError::UnsupportedEngine(_))
    ));
    assert!(list_names(&dirs.local).is_empty());
    assert!(list_names(&dirs.volume).is_empty());

    let path_target = dirs.volume.join("plain.xlsx");
    ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        export_options: SpecStyledExportOptions {
            if_write_index: false,
            ..Default::default()
        },
        ..Default::default()
    })
    .run_basic(&source, "trips", &path_target)
    .expect("run basic");
    let grid = read_sheet_grid(&path_target, "Sheet1").expect("read grid");
    assert_eq!(grid[0][0], EnumCellValue::String("id".to_string()));
    assert_eq!(grid[1][1], EnumCellValue::Number(12.5));
}

#[test]
fn ipc_directory_source_feeds_the_pipeline() {
    let dirs = derive_dirs();
    let path_dir_tables = dirs.local.join("tables");
    std::fs::create_dir_all(&path_dir_tables).expect("create tables dir");
    let mut df = derive_trips();
    let mut file = File::create(path_dir_tables.join("trips.arrow")).expect("create");
    IpcWriter::new(&mut file).finish(&mut df).expect("write ipc");

    let source = IpcDirSource::new(&path_dir_tables);
    let path_target = dirs.volume.join("trips.xlsx");
    let report = ExportPipeline::new(SpecExportOptions {
        path_dir_transient: dirs.local.clone(),
        sheet_name: "Trips".to_string(),
        file_name: Some("scratch.xlsx".to_string()),
        ..Default::default()
    })
    .run(&source, "SELECT * FROM trips LIMIT 1", &path_target)
    .expect("run");

    assert_eq!(report.n_rows(), 1);
    assert_eq!(list_names(&dirs.local), vec!["tables".to_string()]);
    let grid = read_sheet_grid(&path_target, "Trips").expect("read grid");
    assert_eq!(grid.len(), 2);
    assert_eq!(grid[1][2], EnumCellValue::Number(12.5));
}
