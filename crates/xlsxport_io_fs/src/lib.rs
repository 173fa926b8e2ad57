//! `xlsxport_io_fs`:
//! Rust-side file relocation kernel.
//!
//! - `relocate` : move orchestration (rename, cross-device copy fallback)
//! - `spec`     : enums/options/errors
//! - `report`   : per-move report model
//! - `util`     : shared helper functions

pub mod relocate;
pub mod report;
pub mod spec;
mod util;

pub use relocate::relocate;
pub use report::ReportRelocate;
pub use spec::{EnumRelocateConflictStrategy, RelocateError, SpecRelocateOptions};
