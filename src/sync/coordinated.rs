use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// Coordinated access to files shared with other processes (the platform's
/// cloud daemon, the app's bookmark loader). Reads take a shared advisory
/// lock on the source, writes an exclusive lock on the destination; the lock
/// is held for the lifetime of the guard and released on drop.
pub struct ReadGuard {
    file: File,
}

pub struct WriteGuard {
    file: File,
}

pub fn read(url: &Path) -> io::Result<ReadGuard> {
    let file = File::open(url)?;
    file.lock_shared()?;
    Ok(ReadGuard { file })
}

pub fn write(url: &Path) -> io::Result<WriteGuard> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(url)?;
    file.lock_exclusive()?;
    Ok(WriteGuard { file })
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
