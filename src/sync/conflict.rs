use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use fs2::FileExt;

use super::{coordinated, naming, paths};

/// One unresolved version of a cloud file, as reported by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct FileVersion {
    pub url: PathBuf,
    pub last_modification_date: i64,
}

/// Outcome of settling a version conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSettlement {
    /// Where the losing current bytes were preserved. `None` when another
    /// observer raced us to the fresh url, which counts as success.
    pub preserved_as: Option<PathBuf>,
}

pub fn latest_version(versions: &[FileVersion]) -> Option<&FileVersion> {
    versions.iter().max_by_key(|v| v.last_modification_date)
}

/// Settles a cloud file whose platform reports unresolved versions: the
/// current bytes are copied to a fresh url, then the current file is
/// replaced with the version carrying the greatest modification date.
/// Marking the other versions resolved is the caller's (platform) step.
///
/// Blocking; both urls are written under coordination.
pub(crate) fn settle_version_conflict(
    current: &Path,
    versions: &[FileVersion],
) -> io::Result<Option<VersionSettlement>> {
    let Some(latest) = latest_version(versions) else {
        return Ok(None);
    };

    let _current_guard = coordinated::write(current)?;

    let fresh = naming::fresh_url(current, None);
    let preserved_as = match OpenOptions::new().create_new(true).write(true).open(&fresh) {
        Ok(dest) => {
            dest.lock_exclusive()?;
            let mut source = File::open(current)?;
            let mut dest = dest;
            io::copy(&mut source, &mut dest)?;
            dest.sync_all()?;
            let _ = dest.unlock();
            Some(fresh)
        }
        // An observer raced us to the rename; the loser is already safe.
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => None,
        Err(err) => return Err(err),
    };

    replace_with(current, &latest.url, latest.last_modification_date)?;
    Ok(Some(VersionSettlement { preserved_as }))
}

/// Copies a local file aside under a device-suffixed fresh name, keeping
/// its modification date, so the device's history survives an initial
/// collision. Blocking; the source is read under coordination.
pub(crate) fn preserve_local_history(url: &Path, device: &str) -> io::Result<PathBuf> {
    let _read_guard = coordinated::read(url)?;
    let fresh = naming::fresh_url(url, Some(device));
    std::fs::copy(url, &fresh)?;
    let modified = FileTime::from_last_modification_time(&std::fs::metadata(url)?);
    filetime::set_file_mtime(&fresh, modified)?;
    Ok(fresh)
}

/// Atomic replace of `target` with `source`'s bytes, stamped with the
/// given modification date.
pub(crate) fn replace_with(target: &Path, source: &Path, modified: i64) -> io::Result<()> {
    let partial = paths::partial_path(target);
    std::fs::copy(source, &partial)?;
    filetime::set_file_mtime(&partial, FileTime::from_unix_time(modified, 0))?;
    std::fs::rename(&partial, target)?;
    Ok(())
}
