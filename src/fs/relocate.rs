//! Document relocation between review areas.
//!
//! A plan's directory encodes its review phase, so most transitions relocate
//! the document. The rewritten content always lands in the destination first
//! (atomic write), and the source is removed only after that write succeeds.
//! A crash between the two steps leaves a duplicate, never a lost document.

use crate::error::{Result, WardenError};
use crate::fs::atomic_write_str;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;

/// Write `content` to `destination`, then remove `source`.
///
/// An occupied destination is moved into `archive_dir` under a timestamped
/// name before the write. Nothing is ever silently overwritten.
pub fn relocate_rewritten(
    source: &Path,
    destination: &Path,
    content: &str,
    archive_dir: &Path,
    now: DateTime<Utc>,
) -> Result<()> {
    if destination.exists() {
        let archived = archive_dir.join(timestamped_file_name(destination, now)?);
        move_file(destination, &archived)?;
    }

    atomic_write_str(destination, content)?;

    fs::remove_file(source).map_err(|e| {
        WardenError::UserError(format!(
            "wrote '{}' but failed to remove source '{}': {}",
            destination.display(),
            source.display(),
            e
        ))
    })
}

/// `{stem}-{timestamp}.{ext}` for `path`, e.g. `plan-001-20260214093015.md`.
pub fn timestamped_file_name(path: &Path, now: DateTime<Utc>) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            WardenError::UserError(format!("invalid file path '{}'", path.display()))
        })?;
    let stamp = now.format("%Y%m%d%H%M%S");
    Ok(match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, stamp, ext),
        None => format!("{}-{}", name, stamp),
    })
}

/// Move a single file, creating destination directories as needed.
///
/// `rename(2)` when possible; some mounts surface EXDEV even for local-looking
/// paths, so a copy + delete fallback covers cross-device moves.
pub fn move_file<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Result<()> {
    let source = source.as_ref();
    let destination = destination.as_ref();

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            WardenError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => copy_then_delete(source, destination, e),
        Err(e) => Err(WardenError::UserError(format!(
            "failed to move '{}' to '{}': {}",
            source.display(),
            destination.display(),
            e
        ))),
    }
}

fn copy_then_delete(source: &Path, destination: &Path, rename_error: io::Error) -> Result<()> {
    let content = fs::read(source).map_err(|e| {
        WardenError::UserError(format!(
            "failed to read '{}' for cross-device move: {} (rename error: {})",
            source.display(),
            e,
            rename_error
        ))
    })?;

    crate::fs::atomic_write(destination, &content)?;

    fs::remove_file(source).map_err(|e| {
        WardenError::UserError(format!(
            "copied '{}' across devices but failed to delete the source: {}",
            source.display(),
            e
        ))
    })
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
}
