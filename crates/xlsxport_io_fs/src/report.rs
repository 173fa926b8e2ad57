//! Relocation report model.

use std::fmt;
use std::path::PathBuf;

/// Outcome of one successful `relocate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRelocate {
    /// Source file (no longer present).
    pub path_src: PathBuf,
    /// Final destination file.
    pub path_dst: PathBuf,
    /// Size of the moved file.
    pub n_bytes: u64,
    /// Moved by copy + delete because an in-place move was unavailable
    /// (different devices, or no hard-link support).
    pub if_cross_device: bool,
    /// An existing destination file was replaced.
    pub if_overwritten: bool,
}

impl ReportRelocate {
    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} src={} dst={} bytes={} cross_device={} overwritten={}",
            self.path_src.display(),
            self.path_dst.display(),
            self.n_bytes,
            self.if_cross_device,
            self.if_overwritten
        )
    }
}

impl fmt::Display for ReportRelocate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[RELOCATE]"))
    }
}
