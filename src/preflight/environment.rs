//! Filesystem checks: where the archive goes and what the catalog reads.

use std::fs;
use std::path::Path;

use super::types::CheckResult;

/// Check the archive destination can be created and written.
pub fn check_destination(dest_dir: &Path) -> CheckResult {
    let name = "Archive destination";
    let existing = dest_dir.ancestors().find(|p| p.exists());

    match existing {
        Some(dir) if is_writable(dir) && dir == dest_dir => {
            CheckResult::pass_with(name, &dest_dir.display().to_string())
        }
        Some(dir) if is_writable(dir) => CheckResult::pass_with(
            name,
            &format!("{} (will be created)", dest_dir.display()),
        ),
        Some(dir) => CheckResult::fail(name, &format!("{} is not writable", dir.display())),
        None => CheckResult::fail(name, &format!("{} is unreachable", dest_dir.display())),
    }
}

/// Check the restic profiles file, which is optional.
pub fn check_profiles(profiles: &Path) -> CheckResult {
    let name = "Restic profiles";
    match fs::read_to_string(profiles) {
        Ok(_) => CheckResult::pass_with(name, &profiles.display().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::warn(
            name,
            &format!("{} not found, no additional sources", profiles.display()),
        ),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => CheckResult::pass_with(
            name,
            &format!("{} (read with elevation)", profiles.display()),
        ),
        Err(e) => CheckResult::warn(name, &format!("{}: {}", profiles.display(), e)),
    }
}

/// Writable by this process, probed by creating a file.
fn is_writable(dir: &Path) -> bool {
    tempfile::tempfile_in(dir).is_ok()
}
