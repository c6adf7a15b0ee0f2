//! Filesystem plumbing: atomic replacement, gzip files, read-only maps.
//!
//! Every committed write goes through temp-file-then-rename so readers only
//! ever observe complete files; a crash at any point leaves the previous
//! file intact under its old inode.

use std::fs::{self, File, FileTimes};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::error::{Result, SummaryError};

/// Atomically replace `path` with `bytes`.
///
/// The temp file is created in the target directory so the final rename
/// stays on one filesystem. The new file's mtime is forced past the old
/// one's, so pollers watching mtime always observe the change. Readers
/// holding a map of the old file keep their old inode.
pub fn atomic_replace(path: &Path, bytes: &[u8], fsync: bool) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|e| SummaryError::io_path(path, e))?;
    tmp.write_all(bytes)
        .map_err(|e| SummaryError::io_path(path, e))?;

    if let Ok(old_mtime) = fs::metadata(path).and_then(|m| m.modified()) {
        let new_mtime = tmp
            .as_file()
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| SummaryError::io_path(path, e))?;
        if new_mtime <= old_mtime {
            tmp.as_file()
                .set_times(FileTimes::new().set_modified(old_mtime + Duration::from_secs(1)))
                .map_err(|e| SummaryError::io_path(path, e))?;
        }
    }

    if fsync {
        tmp.as_file()
            .sync_data()
            .map_err(|e| SummaryError::io_path(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| SummaryError::io_path(path, e.error))?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SummaryError::io_path(path, e)),
    }
}

// ─── Gzip ───────────────────────────────────────────────────────────

pub fn gz_compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn gz_decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Load and decompress a gzipped file. Returns `None` when the file is
/// missing or empty; an interrupted writer can leave a zero-length name
/// behind, which readers must treat as absent.
///
/// The compressed bytes are mapped rather than read: sub-summaries pulled
/// in for diffing can be large, and the single writer never mutates a
/// committed digest-named file in place.
pub fn load_gz_file(path: &Path) -> Result<Option<Vec<u8>>> {
    let Some(map) = map_file(path)? else {
        return Ok(None);
    };
    let mut out = Vec::new();
    GzDecoder::new(&map[..])
        .read_to_end(&mut out)
        .map_err(|e| SummaryError::io_path(path, e))?;
    Ok(Some(out))
}

// ─── Read-only maps ─────────────────────────────────────────────────

/// Map a file read-only. Returns `None` for missing or zero-length files.
/// Callers replacing the underlying file must drop the map first; some
/// filesystems refuse unlink-while-mapped.
pub fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SummaryError::io_path(path, e)),
    };
    let len = file
        .metadata()
        .map_err(|e| SummaryError::io_path(path, e))?
        .len();
    if len == 0 {
        return Ok(None);
    }
    // Safety: the repository has a single writer (exclusive lock held by the
    // caller), and committed digest-named files are never rewritten in
    // place; replacement goes through rename, which keeps the mapped inode.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| SummaryError::io_path(path, e))?;
    Ok(Some(map))
}
