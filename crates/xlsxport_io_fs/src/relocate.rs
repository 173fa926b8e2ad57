//! Single-file move with conflict policy and cross-device fallback.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::report::ReportRelocate;
use crate::spec::{EnumRelocateConflictStrategy, RelocateError, SpecRelocateOptions};
use crate::util::{copy_file_with_metadata, derive_parent_dir};

const C_SCRATCH_PREFIX: &str = ".xlsxport.";
const C_SCRATCH_SUFFIX: &str = ".tmp";

/// Move `path_src` to `path_dst`.
///
/// Checks run before anything is touched:
/// - `path_src` must be an existing regular file,
/// - the parent of `path_dst` must be an existing directory,
/// - `path_dst` must not be a directory, and an existing file there is
///   handled by [`SpecRelocateOptions::rule_conflict`].
///
/// The placement itself never replaces a file under
/// [`EnumRelocateConflictStrategy::Error`], even one created after the
/// checks: a same-filesystem move is a hard link followed by removal of the
/// source. Under `Overwrite` it is one `rename`. When source and destination
/// live on different devices (or links are unsupported), the file is copied
/// into a hidden scratch file inside the destination directory, moved into
/// place with the same conflict rule, and only then is the source removed.
///
/// On any returned error the source file is left untouched and no scratch
/// file remains. Nothing is retried.
pub fn relocate<P, Q>(
    path_src: P,
    path_dst: Q,
    options: &SpecRelocateOptions,
) -> Result<ReportRelocate, RelocateError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = path_src.as_ref();
    let path_dst = path_dst.as_ref();

    let stat_src = match fs::metadata(path_src) {
        Ok(v) if v.is_file() => v,
        _ => return Err(RelocateError::SourceNotFound(path_src.to_path_buf())),
    };

    let path_dir_dst = derive_parent_dir(path_dst);
    if !path_dir_dst.is_dir() {
        return Err(RelocateError::DestinationParentMissing(path_dir_dst));
    }

    let mut if_overwritten = false;
    match fs::metadata(path_dst) {
        Ok(meta_dst) if meta_dst.is_dir() => {
            return Err(RelocateError::DestinationIsDirectory(path_dst.to_path_buf()));
        }
        Ok(_) => match options.rule_conflict {
            EnumRelocateConflictStrategy::Error => {
                return Err(RelocateError::DestinationExists(path_dst.to_path_buf()));
            }
            EnumRelocateConflictStrategy::Overwrite => if_overwritten = true,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(derive_io_error(path_src, path_dst, e)),
    }

    let mut report = ReportRelocate {
        path_src: path_src.to_path_buf(),
        path_dst: path_dst.to_path_buf(),
        n_bytes: stat_src.len(),
        if_cross_device: false,
        if_overwritten,
    };

    if let Some(n_bytes) = place_file(path_src, path_dst, options)? {
        report.n_bytes = n_bytes;
        report.if_cross_device = true;
    }

    info!(
        src = %path_src.display(),
        dst = %path_dst.display(),
        bytes = report.n_bytes,
        cross_device = report.if_cross_device,
        overwritten = report.if_overwritten,
        "file relocated"
    );
    Ok(report)
}

/// Move `path_src` onto `path_dst` under `options.rule_conflict`.
///
/// Returns `Some(bytes)` when the move fell back to a copy.
pub(crate) fn place_file(
    path_src: &Path,
    path_dst: &Path,
    options: &SpecRelocateOptions,
) -> Result<Option<u64>, RelocateError> {
    let rule_conflict = options.rule_conflict;
    // `link` fails with `AlreadyExists` instead of replacing the destination.
    let res_fast = match rule_conflict {
        EnumRelocateConflictStrategy::Error => fs::hard_link(path_src, path_dst),
        EnumRelocateConflictStrategy::Overwrite => fs::rename(path_src, path_dst),
    };
    match res_fast {
        Ok(()) if rule_conflict == EnumRelocateConflictStrategy::Error => {
            remove_linked_source(path_src, path_dst)?;
            return Ok(None);
        }
        Ok(()) => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(RelocateError::DestinationExists(path_dst.to_path_buf()));
        }
        Err(e) if if_needs_copy(&e) => {
            debug!(
                src = %path_src.display(),
                dst = %path_dst.display(),
                error = %e,
                "in-place move unavailable, falling back to copy"
            );
        }
        Err(e) => return Err(derive_io_error(path_src, path_dst, e)),
    }

    match relocate_by_copy(path_src, path_dst, options.if_preserve_metadata, rule_conflict) {
        Ok(n_bytes) => Ok(Some(n_bytes)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(RelocateError::DestinationExists(path_dst.to_path_buf()))
        }
        Err(e) => Err(derive_io_error(path_src, path_dst, e)),
    }
}

fn if_needs_copy(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::CrossesDevices
            | io::ErrorKind::Unsupported
            | io::ErrorKind::PermissionDenied
    )
}

// Drop the source name of a fresh link; on failure the link is undone.
fn remove_linked_source(path_src: &Path, path_dst: &Path) -> Result<(), RelocateError> {
    let Err(e) = fs::remove_file(path_src) else {
        return Ok(());
    };
    if let Err(e_rollback) = fs::remove_file(path_dst) {
        warn!(
            path = %path_dst.display(),
            error = %e_rollback,
            "failed to roll back destination link"
        );
    }
    Err(derive_io_error(path_src, path_dst, e))
}

/// Copy into a scratch file beside `path_dst`, move it into place, remove the source.
///
/// Under `Error` the scratch file is persisted without replacing an existing
/// destination. If the final source removal fails, the destination is kept
/// and the error is returned; both files then exist.
pub(crate) fn relocate_by_copy(
    path_src: &Path,
    path_dst: &Path,
    if_preserve_metadata: bool,
    rule_conflict: EnumRelocateConflictStrategy,
) -> Result<u64, io::Error> {
    // The scratch file is deleted on drop until persisted.
    let file_tmp = Builder::new()
        .prefix(C_SCRATCH_PREFIX)
        .suffix(C_SCRATCH_SUFFIX)
        .tempfile_in(derive_parent_dir(path_dst))?;
    let n_bytes = copy_file_with_metadata(path_src, file_tmp.path(), if_preserve_metadata)?;

    let res_persist = match rule_conflict {
        EnumRelocateConflictStrategy::Error => file_tmp.persist_noclobber(path_dst),
        EnumRelocateConflictStrategy::Overwrite => file_tmp.persist(path_dst),
    };
    res_persist.map_err(|err| err.error)?;

    fs::remove_file(path_src)?;
    Ok(n_bytes)
}

fn derive_io_error(path_src: &Path, path_dst: &Path, source: io::Error) -> RelocateError {
    RelocateError::Io {
        path_src: path_src.to_path_buf(),
        path_dst: path_dst.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{place_file, relocate, relocate_by_copy};
    use crate::spec::{EnumRelocateConflictStrategy, RelocateError, SpecRelocateOptions};

    fn write_bytes(path: &Path, raw: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, raw).expect("write bytes");
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

    #[test]
    fn relocate_moves_file_and_removes_source() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("local/report.xlsx");
        let dst = tmp.path().join("export/report.xlsx");
        write_bytes(&src, b"PK\x03\x04payload");
        std::fs::create_dir_all(dst.parent().expect("parent")).expect("create dst dir");

        let report = relocate(&src, &dst, &SpecRelocateOptions::default()).expect("relocate");
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"PK\x03\x04payload");
        assert_eq!(report.n_bytes, 11);
        assert!(!report.if_overwritten);
        assert_eq!(report.path_dst, dst);
    }

    #[test]
    fn relocate_twice_fails_with_source_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("a.xlsx");
        let dst = tmp.path().join("b.xlsx");
        write_bytes(&src, b"data");

        relocate(&src, &dst, &SpecRelocateOptions::default()).expect("first relocate");
        let err = relocate(&src, &dst, &SpecRelocateOptions::default())
            .expect_err("second relocate must fail");
        assert!(matches!(err, RelocateError::SourceNotFound(path) if path == src));
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"data");
    }

    #[test]
    fn relocate_missing_parent_keeps_source_intact() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("a.xlsx");
        let dst = tmp.path().join("missing/dir/a.xlsx");
        write_bytes(&src, b"unchanged bytes");

        let err = relocate(&src, &dst, &SpecRelocateOptions::default())
            .expect_err("missing parent must fail");
        assert!(matches!(err, RelocateError::DestinationParentMissing(_)));
        assert_eq!(std::fs::read(&src).expect("read src"), b"unchanged bytes");
        assert_eq!(list_names(tmp.path()), vec!["a.xlsx"]);
    }

    #[test]
    fn relocate_existing_destination_errors_by_default() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("new.xlsx");
        let dst = tmp.path().join("old.xlsx");
        write_bytes(&src, b"new");
        write_bytes(&dst, b"old");

        let err = relocate(&src, &dst, &SpecRelocateOptions::default())
            .expect_err("conflict must fail");
        assert!(matches!(err, RelocateError::DestinationExists(_)));
        assert_eq!(std::fs::read(&src).expect("read src"), b"new");
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"old");
    }

    #[test]
    fn relocate_overwrite_replaces_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("new.xlsx");
        let dst = tmp.path().join("old.xlsx");
        write_bytes(&src, b"new");
        write_bytes(&dst, b"old");

        let options = SpecRelocateOptions {
            rule_conflict: EnumRelocateConflictStrategy::Overwrite,
            ..Default::default()
        };
        let report = relocate(&src, &dst, &options).expect("relocate");
        assert!(report.if_overwritten);
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"new");
    }

    #[test]
    fn relocate_rejects_directory_destination_and_source() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("a.xlsx");
        let dir = tmp.path().join("out");
        write_bytes(&src, b"data");
        std::fs::create_dir_all(&dir).expect("create dir");

        let options = SpecRelocateOptions {
            rule_conflict: EnumRelocateConflictStrategy::Overwrite,
            ..Default::default()
        };
        let err = relocate(&src, &dir, &options).expect_err("directory destination");
        assert!(matches!(err, RelocateError::DestinationIsDirectory(_)));

        let err = relocate(&dir, tmp.path().join("b"), &options).expect_err("directory source");
        assert!(matches!(err, RelocateError::SourceNotFound(_)));
        assert!(src.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn relocate_by_copy_preserves_linux_metadata() {
        use filetime::{FileTime, set_file_times};
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src/meta.xlsx");
        let dst = tmp.path().join("dst/meta.xlsx");
        write_bytes(&src, b"meta");
        std::fs::create_dir_all(dst.parent().expect("parent")).expect("create dst dir");

        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o640))
            .expect("set permissions");
        set_file_times(
            &src,
            FileTime::from_unix_time(1_700_000_010, 0),
            FileTime::from_unix_time(1_700_000_020, 0),
        )
        .expect("set times");

        let c_xattr_name = "user.xlsxport_fs_test";
        let if_has_xattr = xattr::set(&src, c_xattr_name, b"meta_value").is_ok();

        let n_bytes = relocate_by_copy(&src, &dst, true, EnumRelocateConflictStrategy::Error)
            .expect("relocate by copy");
        assert_eq!(n_bytes, 4);
        assert!(!src.exists());

        let stat_dst = std::fs::metadata(&dst).expect("dst metadata");
        assert_eq!(stat_dst.permissions().mode() & 0o777, 0o640);
        assert_eq!(
            FileTime::from_last_modification_time(&stat_dst),
            FileTime::from_unix_time(1_700_000_020, 0)
        );
        if if_has_xattr {
            let raw_value_dst = xattr::get(&dst, c_xattr_name)
                .expect("get dst xattr")
                .expect("xattr exists");
            assert_eq!(raw_value_dst, b"meta_value");
        }
        assert_eq!(list_names(dst.parent().expect("parent")), vec!["meta.xlsx"]);
    }

    #[test]
    fn relocate_by_copy_failure_leaves_no_scratch_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("a.xlsx");
        let dir_dst = tmp.path().join("out");
        write_bytes(&src, b"data");
        std::fs::create_dir_all(dir_dst.join("a.xlsx")).expect("create blocking dir");

        relocate_by_copy(
            &src,
            &dir_dst.join("a.xlsx"),
            true,
            EnumRelocateConflictStrategy::Overwrite,
        )
        .expect_err("rename onto a directory must fail");
        assert_eq!(std::fs::read(&src).expect("read src"), b"data");
        assert_eq!(list_names(&dir_dst), vec!["a.xlsx"]);
    }

    #[test]
    fn relocate_by_copy_never_replaces_destination_under_error_policy() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src/a.xlsx");
        let dst = tmp.path().join("dst/a.xlsx");
        write_bytes(&src, b"new");
        write_bytes(&dst, b"appeared meanwhile");

        let err = relocate_by_copy(&src, &dst, true, EnumRelocateConflictStrategy::Error)
            .expect_err("existing destination must not be replaced");
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&src).expect("read src"), b"new");
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"appeared meanwhile");
        assert_eq!(list_names(dst.parent().expect("parent")), vec!["a.xlsx"]);
    }

    #[test]
    fn place_file_keeps_destination_created_after_checks() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("new.xlsx");
        let dst = tmp.path().join("target.xlsx");
        write_bytes(&src, b"new");
        // Destination shows up between validation and placement.
        write_bytes(&dst, b"concurrent writer");

        let err = place_file(&src, &dst, &SpecRelocateOptions::default())
            .expect_err("conflict must fail");
        assert!(matches!(err, RelocateError::DestinationExists(path) if path == dst));
        assert_eq!(std::fs::read(&src).expect("read src"), b"new");
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"concurrent writer");

        let options = SpecRelocateOptions {
            rule_conflict: EnumRelocateConflictStrategy::Overwrite,
            ..Default::default()
        };
        let n_bytes_copied = place_file(&src, &dst, &options).expect("overwrite");
        assert_eq!(n_bytes_copied, None);
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).expect("read dst"), b"new");
    }
}
