//! Recursive directory copies.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{aggregate, CopyOutcome, Copier, Method};
use crate::catalog::{NameFilter, SourceEntry};
use crate::common::{copy_preserving, copy_symlink, ensure_parent_exists, is_permission_denied, remove_path};
use crate::config::ElevatedExclusions;
use crate::process::argv;
use crate::runlog::RunLog;

/// Per-file tally of a direct tree walk.
#[derive(Debug, Default)]
struct TreeStats {
    copied: usize,
    failures: Vec<(PathBuf, String)>,
}

pub(super) fn copy_tree(
    copier: &Copier<'_>,
    entry: &SourceEntry,
    dest: &Path,
    log: &mut RunLog,
) -> CopyOutcome {
    match walk_copy(&entry.path, dest, entry.filter) {
        Ok(stats) => {
            for (path, error) in &stats.failures {
                log.detail(format!("❌ Failed to backup {}: {}", path.display(), error));
            }
            aggregate(stats.copied, stats.failures.len(), false)
        }
        // Already elevated: a denial is final
        Err(e) if copier.identity.elevated => CopyOutcome::Failed {
            error: e.to_string(),
        },
        Err(e) => {
            tracing::debug!(path = %entry.path.display(), error = %e, "tree copy denied, escalating");
            remove_path(dest);
            copy_tree_elevated(copier, entry, dest, log)
        }
    }
}

/// Walk `src` and mirror it under `dest`.
///
/// Symlinks are recreated, not followed. Sockets, fifos and device nodes are
/// skipped. Names rejected by `filter` are not copied and excluded
/// directories are not descended into. The first permission denial aborts
/// the walk with `Err`; every other error is tallied and the walk continues.
fn walk_copy(src: &Path, dest: &Path, filter: Option<NameFilter>) -> io::Result<TreeStats> {
    let mut stats = TreeStats::default();
    let mut dir_modes = Vec::new();

    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || filter.map_or(true, |f| f.admits(&e.file_name().to_string_lossy()))
        });

    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
                let io_err = io::Error::from(e);
                if is_permission_denied(&io_err) {
                    return Err(io_err);
                }
                stats.failures.push((path, io_err.to_string()));
                continue;
            }
        };

        let rel = item.path().strip_prefix(src).unwrap_or(Path::new(""));
        let target = dest.join(rel);
        let file_type = item.file_type();

        let result = if file_type.is_dir() {
            fs::create_dir_all(&target).and_then(|_| {
                let mode = item.metadata().map_err(io::Error::from)?.permissions().mode();
                dir_modes.push((target.clone(), mode));
                Ok(())
            })
        } else if file_type.is_symlink() {
            copy_symlink(item.path(), &target)
        } else if file_type.is_file() {
            copy_preserving(item.path(), &target)
        } else {
            tracing::debug!(path = %item.path().display(), "skipping special file");
            continue;
        };

        match result {
            Ok(()) if file_type.is_dir() => {}
            Ok(()) => stats.copied += 1,
            Err(e) if is_permission_denied(&e) => return Err(e),
            Err(e) => stats.failures.push((item.path().to_path_buf(), e.to_string())),
        }
    }

    // Deepest first, so a read-only parent never blocks its children
    for (dir, mode) in dir_modes.iter().rev() {
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(mode & 0o7777)) {
            tracing::debug!(dir = %dir.display(), error = %e, "could not restore directory mode");
        }
    }

    Ok(stats)
}

/// `cp -a` of the whole tree through the elevator.
///
/// Name filters are only re-applied when configured to; by default the
/// elevated copy is taken as-is.
fn copy_tree_elevated(
    copier: &Copier<'_>,
    entry: &SourceEntry,
    dest: &Path,
    log: &mut RunLog,
) -> CopyOutcome {
    if let Err(e) = ensure_parent_exists(dest) {
        return CopyOutcome::Failed {
            error: format!("{:#}", e),
        };
    }

    let result = copier.elevator.run_elevated_checked(&argv([
        "cp",
        "-a",
        &entry.path.to_string_lossy(),
        &dest.to_string_lossy(),
    ]));
    if let Err(e) = result {
        return CopyOutcome::Failed {
            error: format!("{:#}", e),
        };
    }
    copier.reclaim(dest, log);

    if let (ElevatedExclusions::Reapply, Some(filter)) = (copier.elevated_exclusions, entry.filter) {
        prune(dest, filter);
    }

    CopyOutcome::Succeeded {
        method: Method::Elevated,
        count: count_files(dest),
    }
}

/// Remove everything under `root` that `filter` rejects.
fn prune(root: &Path, filter: NameFilter) {
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    let mut rejected = Vec::new();
    while let Some(item) = walker.next() {
        let Ok(item) = item else { continue };
        if filter.admits(&item.file_name().to_string_lossy()) {
            continue;
        }
        if item.file_type().is_dir() {
            walker.skip_current_dir();
        }
        rejected.push(item.into_path());
    }

    for path in rejected {
        remove_path(&path);
    }
}

/// Non-directory entries under `root`.
fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count()
}
