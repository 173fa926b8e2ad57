//! End-to-end export: fetch, write body, write header, finalize, relocate.

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile, TempPath};
use tracing::{debug, info, warn};
use xlsxport_io_fs::{ReportRelocate, SpecRelocateOptions, relocate};
use xlsxport_io_xlsx::{
    C_SHEET_NAME_DEFAULT, SpecBasicExportOptions, SpecCellFormat, SpecFrameWriteOptions,
    SpecStyledExportOptions, SpecXlsxReport, derive_header_format, export_basic_with_options,
    export_styled_with_options,
};

use crate::error::ExportError;
use crate::source::TabularSource;

const C_FILE_NAME_FALLBACK: &str = "export.xlsx";

/// How the sheet is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumExportMode {
    /// Deferred header write with the configured header format.
    #[default]
    Styled,
    /// Plain header and body in one pass.
    Basic,
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportOptions {
    /// Local scratch directory the document is written into. Must exist.
    pub path_dir_transient: PathBuf,
    /// Name pattern for the transient file; `None` reuses the target's file
    /// name. Each run adds a random infix, so `a.xlsx` becomes `a.<rand>.xlsx`.
    pub file_name: Option<String>,
    /// Sheet receiving the dataset.
    pub sheet_name: String,
    /// Header row style for [`EnumExportMode::Styled`].
    pub fmt_header: SpecCellFormat,
    /// Engine, reserved rows, index column and value options.
    pub export_options: SpecStyledExportOptions,
    /// Conflict policy and metadata handling for the final move.
    pub relocate_options: SpecRelocateOptions,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            path_dir_transient: std::env::temp_dir(),
            file_name: None,
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            fmt_header: derive_header_format(),
            export_options: SpecStyledExportOptions::default(),
            relocate_options: SpecRelocateOptions::default(),
        }
    }
}

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportExport {
    /// Sheet layout and warnings from the write phase.
    pub report_xlsx: SpecXlsxReport,
    /// Final move details.
    pub report_relocate: ReportRelocate,
}

impl ReportExport {
    pub fn sheet_name(&self) -> &str {
        &self.report_xlsx.sheet_name
    }

    pub fn n_rows(&self) -> usize {
        self.report_xlsx.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.report_xlsx.n_cols
    }

    /// Where the document ended up.
    pub fn path_target(&self) -> &Path {
        &self.report_relocate.path_dst
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} sheet={} rows={} cols={} dst={} bytes={} warnings={}",
            self.sheet_name(),
            self.n_rows(),
            self.n_cols(),
            self.path_target().display(),
            self.report_relocate.n_bytes,
            self.report_xlsx.warnings.len()
        )
    }
}

impl fmt::Display for ReportExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[EXPORT]"))
    }
}

/// Query → spreadsheet → durable target.
#[derive(Debug, Clone, Default)]
pub struct ExportPipeline {
    options: SpecExportOptions,
}

impl ExportPipeline {
    pub fn new(options: SpecExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SpecExportOptions {
        &self.options
    }

    /// Styled export of `query`'s result to `path_target`.
    ///
    /// The document is finalized in a fresh, uniquely named file inside the
    /// transient directory before it is moved. A write/finalize failure
    /// discards that file and skips relocation; a relocation failure keeps
    /// it and reports its path. Other files in the directory are never
    /// touched.
    pub fn run<S>(
        &self,
        source: &S,
        query: &str,
        path_target: impl AsRef<Path>,
    ) -> Result<ReportExport, ExportError>
    where
        S: TabularSource + ?Sized,
    {
        self.run_with_mode(source, query, path_target.as_ref(), EnumExportMode::Styled)
    }

    /// Same as [`Self::run`] with the plain one-pass export.
    pub fn run_basic<S>(
        &self,
        source: &S,
        query: &str,
        path_target: impl AsRef<Path>,
    ) -> Result<ReportExport, ExportError>
    where
        S: TabularSource + ?Sized,
    {
        self.run_with_mode(source, query, path_target.as_ref(), EnumExportMode::Basic)
    }

    pub fn run_with_mode<S>(
        &self,
        source: &S,
        query: &str,
        path_target: &Path,
        mode: EnumExportMode,
    ) -> Result<ReportExport, ExportError>
    where
        S: TabularSource + ?Sized,
    {
        let df = source.query(query)?;
        info!(
            query,
            rows = df.height(),
            cols = df.width(),
            "dataset fetched"
        );

        let path_transient = self.create_transient(path_target)?;
        let res_xlsx = match mode {
            EnumExportMode::Styled => export_styled_with_options(
                &df,
                &path_transient,
                &self.options.sheet_name,
                &self.options.fmt_header,
                &self.options.export_options,
            ),
            EnumExportMode::Basic => {
                let options_basic = SpecBasicExportOptions {
                    engine: self.options.export_options.engine.clone(),
                    frame: SpecFrameWriteOptions {
                        if_write_index: self.options.export_options.if_write_index,
                        ..Default::default()
                    },
                    write_options: self.options.export_options.write_options.clone(),
                };
                export_basic_with_options(
                    &df,
                    &path_transient,
                    &self.options.sheet_name,
                    &options_basic,
                )
            }
        };
        let report_xlsx = match res_xlsx {
            Ok(v) => v,
            Err(err) => {
                discard_transient(path_transient);
                return Err(err.into());
            }
        };

        let path_transient = path_transient
            .keep()
            .map_err(|err| ExportError::Transient {
                path_dir: self.options.path_dir_transient.clone(),
                source: err.error,
            })?;
        let report_relocate = relocate(
            &path_transient,
            path_target,
            &self.options.relocate_options,
        )
        .map_err(|source| {
            warn!(
                path = %path_transient.display(),
                error = %source,
                "relocation failed, finished file kept"
            );
            ExportError::Relocate {
                source,
                path_transient: path_transient.clone(),
            }
        })?;

        let report = ReportExport {
            report_xlsx,
            report_relocate,
        };
        info!("{report}");
        Ok(report)
    }

    /// Transient file name pattern, defaulting to the target's file name.
    pub fn derive_transient_file_name(&self, path_target: &Path) -> String {
        match &self.options.file_name {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => path_target
                .file_name()
                .map(|v| v.to_string_lossy().into_owned())
                .unwrap_or_else(|| C_FILE_NAME_FALLBACK.to_string()),
        }
    }

    /// Create an empty, uniquely named file in the transient directory.
    ///
    /// The returned handle deletes the file when dropped.
    fn create_transient(&self, path_target: &Path) -> Result<TempPath, ExportError> {
        let name_file = self.derive_transient_file_name(path_target);
        let path_name = Path::new(&name_file);
        let c_stem = path_name
            .file_stem()
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        let c_suffix = path_name
            .extension()
            .map(|v| format!(".{}", v.to_string_lossy()))
            .unwrap_or_default();

        let path_transient = Builder::new()
            .prefix(&format!("{c_stem}."))
            .suffix(&c_suffix)
            .tempfile_in(&self.options.path_dir_transient)
            .map(NamedTempFile::into_temp_path)
            .map_err(|source| ExportError::Transient {
                path_dir: self.options.path_dir_transient.clone(),
                source,
            })?;
        debug!(path = %path_transient.display(), "transient file created");
        Ok(path_transient)
    }
}

fn discard_transient(path_transient: TempPath) {
    let path_display = path_transient.to_path_buf();
    match path_transient.close() {
        Ok(()) => warn!(
            path = %path_display.display(),
            "export failed, transient file discarded"
        ),
        Err(e) => warn!(
            path = %path_display.display(),
            error = %e,
            "export failed, transient file could not be removed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    #[test]
    fn transient_name_reuses_target_file_name() {
        let pipeline = ExportPipeline::new(SpecExportOptions {
            path_dir_transient: PathBuf::from("/tmp/scratch"),
            ..Default::default()
        });
        assert_eq!(
            pipeline.derive_transient_file_name(Path::new("/mnt/volume/excel_with_header.xlsx")),
            "excel_with_header.xlsx"
        );
        assert_eq!(
            pipeline.derive_transient_file_name(Path::new("/")),
            "export.xlsx"
        );
    }

    #[test]
    fn transient_files_are_unique_per_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pipeline = ExportPipeline::new(SpecExportOptions {
            path_dir_transient: tmp.path().to_path_buf(),
            file_name: Some("local.xlsx".to_string()),
            ..Default::default()
        });
        std::fs::write(tmp.path().join("local.xlsx"), b"other").expect("write");

        let path_a = pipeline
            .create_transient(Path::new("/mnt/volume/out.xlsx"))
            .expect("transient a");
        let path_b = pipeline
            .create_transient(Path::new("/mnt/volume/out.xlsx"))
            .expect("transient b");
        assert_ne!(path_a.to_path_buf(), path_b.to_path_buf());
        for path in [&path_a, &path_b] {
            assert_eq!(path.parent(), Some(tmp.path()));
            let c_name = path.file_name().expect("name").to_string_lossy().into_owned();
            assert!(c_name.starts_with("local.") && c_name.ends_with(".xlsx"));
            assert_ne!(c_name, "local.xlsx");
        }

        let path_kept = path_a.to_path_buf();
        drop(path_a);
        assert!(!path_kept.exists());
        assert_eq!(
            std::fs::read(tmp.path().join("local.xlsx")).expect("read"),
            b"other"
        );
    }

    #[test]
    fn default_options_use_header_preset() {
        let options = SpecExportOptions::default();
        assert_eq!(options.fmt_header, derive_header_format());
        assert_eq!(options.sheet_name, "Sheet1");
        assert_eq!(options.export_options.n_rows_reserved, 1);
    }
}
