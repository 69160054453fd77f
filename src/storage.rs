//! File persistence primitives
//!
//! Readers of an atomically written file only ever see the previous complete
//! content or the new complete content: data goes to a temporary file in the
//! same directory, is synced, and is then renamed over the destination.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Atomically replace `path` with `data` through a uniquely named temporary
/// file. The temporary file is removed if anything fails before the rename.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> io::Result<usize> {
    let path = path.as_ref();
    let prefix = path
        .file_name()
        .map(|name| format!(".{}.", name.to_string_lossy()))
        .unwrap_or_else(|| ".framecap.".to_string());

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(parent_dir(path))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    persist(tmp, path)?;

    Ok(data.len())
}

fn persist(tmp: NamedTempFile, path: &Path) -> io::Result<()> {
    // On failure the temp file is handed back inside the error and dropped,
    // which deletes it
    tmp.persist(path).map(drop).map_err(|e| e.error)
}

/// Staging name used by [`write_atomic_staged`]: `<path>.tmp`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Atomically replace `path` with `data`, staging through `<path>.tmp`.
///
/// A fixed staging name means an interrupted run leaves at most one stray
/// file next to the output. Only one writer per path is supported.
pub fn write_atomic_staged(path: impl AsRef<Path>, data: &[u8]) -> io::Result<usize> {
    let path = path.as_ref();
    let staged = staging_path(path);

    let result = write_synced(&staged, data).and_then(|_| fs::rename(&staged, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }

    Ok(data.len())
}

/// Create or truncate `path`, write `data` and sync it to disk.
pub fn write_synced(path: impl AsRef<Path>, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Read a whole file into memory.
pub fn read_file(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    fs::read(path)
}
