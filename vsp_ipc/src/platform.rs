//! Linux-specific shared memory plumbing

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Directory backing POSIX shared memory
pub const SHM_ROOT: &str = "/dev/shm";

/// Prefix of every region file created by this crate
pub const SHM_PREFIX: &str = "vsp_";

/// Path of the file backing region `name`
pub fn region_path(name: &str) -> PathBuf {
    Path::new(SHM_ROOT).join(format!("{SHM_PREFIX}{name}"))
}

/// Create (or replace) a region file of `size` bytes and map it
pub fn create_region_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;

    // Truncate-then-extend leaves every byte zeroed.
    file.set_len(size as u64)?;

    let mmap = unsafe { MmapOptions::new().len(size).populate().map_mut(&file)? };
    Ok(mmap)
}

/// Map an existing region file
pub fn attach_region_mmap(path: &Path, name: &str) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShmError::NotFound {
                name: name.to_string(),
            },
            ErrorKind::PermissionDenied => ShmError::PermissionDenied {
                name: name.to_string(),
            },
            _ => ShmError::Io { source: e },
        })?;

    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}
