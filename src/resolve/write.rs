//! Artifact writes: temp file + rename, never overwriting a content-addressed output.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

use super::hash::ContentHash;

/// What happened to an artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// An identical artifact was already present.
    Reused,
}

/// Write `bytes` to `path` atomically.
///
/// With `content_addressed`, an existing file at `path` is trusted to hold
/// the same bytes and is left untouched. Otherwise the existing file's hash
/// is compared and the file replaced only when it differs.
pub fn write_artifact(path: &Path, bytes: &[u8], content_addressed: bool) -> Result<WriteOutcome> {
    if is_reusable(path, bytes, content_addressed) {
        return Ok(WriteOutcome::Reused);
    }

    let write_err = |source: std::io::Error| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(write_err)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    if content_addressed {
        match temp.persist_noclobber(path) {
            Ok(_) => Ok(WriteOutcome::Written),
            // Lost the race against another resolver writing the same hash
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(WriteOutcome::Reused),
            Err(e) => Err(write_err(e.error)),
        }
    } else {
        temp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(WriteOutcome::Written)
    }
}

fn is_reusable(path: &Path, bytes: &[u8], content_addressed: bool) -> bool {
    if !path.is_file() {
        return false;
    }
    if content_addressed {
        return true;
    }
    fs::read(path)
        .map(|existing| ContentHash::of(&existing) == ContentHash::of(bytes))
        .unwrap_or(false)
}
