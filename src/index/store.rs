//! Persisting indexes to disk.
//!
//! Writes go through a temporary file in the destination directory that is
//! renamed over the target only once everything has been written, so readers
//! never see a partial index. The path `-` means stdin/stdout.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use tempfile::NamedTempFile;

use super::codec::{self, IndexReader};
use super::Index;
use crate::error::Result;

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Writes `index` to `path` atomically.
pub fn write_index(path: &Path, index: &Index, comment: &str) -> Result<()> {
    if is_stdio(path) {
        let stdout = io::stdout();
        return codec::write_index(&mut stdout.lock(), index, comment);
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir)?;

    // Dropping the temp file on any error path removes it.
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        codec::write_index(&mut w, index, comment)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::debug!(path = %path.display(), entries = index.len(), "index written");

    Ok(())
}

/// Reads a whole index from `path`.
///
/// A missing file is reported as an I/O `NotFound` error, see
/// [`TagrefError::is_not_found`](crate::error::TagrefError::is_not_found).
pub fn read_index(path: &Path) -> Result<Index> {
    let index = if is_stdio(path) {
        let stdin = io::stdin();
        IndexReader::new(stdin.lock()).collect::<Result<Index>>()?
    } else {
        let file = File::open(path)?;
        IndexReader::new(BufReader::new(file)).collect::<Result<Index>>()?
    };

    tracing::debug!(path = %path.display(), entries = index.len(), "index read");

    Ok(index)
}
