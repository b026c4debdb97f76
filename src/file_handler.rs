//! Whole-file helpers used by the key store and the file codec.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Reads a whole file.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::io(path, &e))
}

/// Writes `data` to `path` atomically.
///
/// The data goes to a temporary file in the destination directory which then
/// replaces `path`. On failure `path` is left as it was.
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let tmp = stage(path, data)?;
    tmp.persist(path).map_err(|e| Error::io(path, &e.error))?;
    Ok(())
}

// Writes `data` to a synced temporary file next to `path`.
fn stage(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(path, &e))?;
    tmp.write_all(data).map_err(|e| Error::io(path, &e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(path, &e))?;
    Ok(tmp)
}

/// Reads a key file, rejecting empty files.
pub fn read_key_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = read_file(path)?;
    if data.is_empty() {
        return Err(Error::Io {
            path: path.to_path_buf(),
            message: "key file is empty".to_string(),
        });
    }
    Ok(data)
}

/// Writes a key file, refusing empty key data.
pub fn write_key_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if data.is_empty() {
        return Err(Error::Io {
            path: path.to_path_buf(),
            message: "refusing to write empty key data".to_string(),
        });
    }
    write_file(path, data)
}

/// Writes several key files together.
///
/// Every file is staged first; none of the destinations is touched unless all of them
/// were written out.
pub fn write_key_files(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for &(path, data) in files {
        if data.is_empty() {
            return Err(Error::Io {
                path: path.to_path_buf(),
                message: "refusing to write empty key data".to_string(),
            });
        }
        staged.push((path, stage(path, data)?));
    }
    for (path, tmp) in staged {
        tmp.persist(path).map_err(|e| Error::io(path, &e.error))?;
    }
    Ok(())
}

/// Size of the file at `path` in bytes, or 0 if it cannot be read.
#[must_use]
pub fn file_size(path: impl AsRef<Path>) -> u64 {
    fs::metadata(path).map_or(0, |m| m.len())
}

#[must_use]
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}
