//! File copying helpers for the staging tree.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// Ensure all parent directories of a path exist.
///
/// If the path has no parent, does nothing.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Copy one regular file, keeping permission bits and mtime.
///
/// Returns the raw `io::Error` so callers can tell a permission denial apart
/// from every other failure.
pub fn copy_preserving(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::metadata(src)?;
    let mut reader = fs::File::open(src)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = fs::File::create(dst)?;
    io::copy(&mut reader, &mut writer)?;
    if let Ok(mtime) = meta.modified() {
        writer.set_modified(mtime)?;
    }
    drop(writer);
    // Mode last, so read-only sources don't block the mtime update
    fs::set_permissions(dst, meta.permissions())
}

/// Recreate a symlink at `dst` pointing where `src` points.
pub fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(target, dst)
}

/// Remove a file or directory tree if present. Idempotent.
pub fn remove_path(path: &Path) {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            let _ = fs::remove_dir_all(path);
        }
        Ok(_) => {
            let _ = fs::remove_file(path);
        }
        Err(_) => {}
    }
}

/// Give the owner `rwx` on every directory under `root`.
///
/// Copies keep source directory modes, so a read-only source directory is
/// read-only in the staging tree too and its children can't be unlinked.
pub fn make_removable(root: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(root)?;
    if !meta.is_dir() {
        return Ok(());
    }
    let mode = meta.permissions().mode();
    if mode & 0o700 != 0o700 {
        fs::set_permissions(root, fs::Permissions::from_mode(mode | 0o700))?;
    }
    for item in fs::read_dir(root)? {
        let item = item?;
        if item.file_type()?.is_dir() {
            make_removable(&item.path())?;
        }
    }
    Ok(())
}

/// Delete a temporary directory, reporting what `TempDir`'s drop would
/// swallow.
pub fn discard_temp_dir(dir: TempDir) -> Result<()> {
    let path = dir.path().to_path_buf();
    if let Err(e) = make_removable(&path) {
        tracing::debug!(path = %path.display(), error = %e, "could not open up directory modes");
    }
    dir.close()
        .with_context(|| format!("Failed to remove {}", path.display()))
}

/// True for a permission denial, the only error that justifies escalation.
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}
