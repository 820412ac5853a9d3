//! Top-level regular files of a directory, no recursion.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::Path;

use super::{aggregate, CopyOutcome, Copier, Method};
use crate::catalog::SourceEntry;
use crate::common::is_permission_denied;
use crate::process::{argv, Elevator};
use crate::runlog::RunLog;

pub(super) fn copy_flat(
    copier: &Copier<'_>,
    entry: &SourceEntry,
    dest: &Path,
    log: &mut RunLog,
) -> CopyOutcome {
    let names = match list_direct(&entry.path) {
        Ok(names) => names,
        Err(e) if is_permission_denied(&e) => {
            tracing::debug!(path = %entry.path.display(), "listing denied, listing elevated");
            match list_elevated(&entry.path, copier.elevator) {
                Ok(names) => names,
                Err(e) => {
                    return CopyOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            }
        }
        Err(e) => {
            return CopyOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    if let Err(e) = fs::create_dir_all(dest) {
        return CopyOutcome::Failed {
            error: e.to_string(),
        };
    }

    let mut ok = 0;
    let mut failed = 0;
    let mut any_elevated = false;
    for name in names
        .iter()
        .filter(|n| entry.filter.map_or(true, |f| f.admits(n)))
    {
        match copier.copy_file(&entry.path.join(name), &dest.join(name), log) {
            Ok(Method::Direct) => {
                ok += 1;
                log.detail(format!("✅ Backed up file: {}", name));
            }
            Ok(Method::Elevated) => {
                ok += 1;
                any_elevated = true;
                log.detail(format!("✅ Backed up file: {} (with sudo)", name));
            }
            Err(e) => {
                failed += 1;
                log.detail(format!("❌ Failed to backup file {}: {:#}", name, e));
            }
        }
    }

    aggregate(ok, failed, any_elevated)
}

/// Names of the regular files directly inside `dir`, sorted.
fn list_direct(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for item in fs::read_dir(dir)? {
        let item = item?;
        if item.file_type()?.is_file() {
            names.push(item.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Same listing, through the elevator.
fn list_elevated(dir: &Path, elevator: &dyn Elevator) -> Result<Vec<String>> {
    let result = elevator.run_elevated_checked(&argv([
        "find",
        &dir.to_string_lossy(),
        "-mindepth",
        "1",
        "-maxdepth",
        "1",
        "-type",
        "f",
        "-printf",
        "%f\\n",
    ]))?;
    Ok(parse_listing(&result.stdout))
}

fn parse_listing(stdout: &str) -> Vec<String> {
    let mut names: Vec<String> = stdout
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}
