//! Atomic write-back of resolved documents.
//!
//! Arena-style: every document is resolved in memory before anything
//! here runs, and each file is committed by write-to-temp-then-rename.
//! A killed run leaves every document either original or fully
//! resolved, never truncated.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// A fully resolved document waiting to be committed.
pub struct PlannedWrite {
    /// The complete new document text.
    pub content: String,
    /// Destination path on disk.
    pub path: PathBuf,
}

/// Commit every planned write.
///
/// # Errors
///
/// Returns `Error::Io` if a temp file cannot be created, written, or
/// renamed over its destination.
pub fn persist_all(writes: &[PlannedWrite]) -> Result<(), Error> {
    for write in writes {
        persist_one(write)?;
    }
    return Ok(());
}

/// Commit one document atomically within its own directory, so the
/// rename never crosses a filesystem boundary.
fn persist_one(write: &PlannedWrite) -> Result<(), Error> {
    let dir = write
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(write.content.as_bytes())?;
    tmp.persist(&write.path).map_err(|e| Error::Io(e.error))?;
    return Ok(());
}
