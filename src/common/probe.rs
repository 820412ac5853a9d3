//! Privilege-aware existence checks.
//!
//! A plain `stat` of `/root/.ssh` from an ordinary user fails with EACCES,
//! which says nothing about whether the path exists. In that case the
//! question is asked again through the elevator.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::Path;

use crate::process::{argv, Elevator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Missing,
    /// Exists and is not a directory.
    File,
    Dir,
}

impl Presence {
    pub fn exists(self) -> bool {
        self != Presence::Missing
    }
}

/// Probe a path, following symlinks like `test -e` does.
pub fn probe(path: &Path, elevator: &dyn Elevator) -> Result<Presence> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(Presence::Dir),
        Ok(_) => Ok(Presence::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Presence::Missing),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(path = %path.display(), "stat denied, probing elevated");
            probe_elevated(path, elevator)
        }
        Err(e) => Err(e.into()),
    }
}

fn probe_elevated(path: &Path, elevator: &dyn Elevator) -> Result<Presence> {
    let path = path.to_string_lossy();
    if elevator.run_elevated(&argv(["test", "-d", &path]))?.success() {
        return Ok(Presence::Dir);
    }
    if elevator.run_elevated(&argv(["test", "-e", &path]))?.success() {
        return Ok(Presence::File);
    }
    Ok(Presence::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SudoElevator;
    use tempfile::TempDir;

    #[test]
    fn test_probe_kinds() {
        let tmp = TempDir::new().unwrap();
        let elevator = SudoElevator::new("sudo", true);
        let file = tmp.path().join("fstab");
        fs::write(&file, "").unwrap();

        assert_eq!(probe(tmp.path(), &elevator).unwrap(), Presence::Dir);
        assert_eq!(probe(&file, &elevator).unwrap(), Presence::File);
        assert_eq!(
            probe(&tmp.path().join("missing"), &elevator).unwrap(),
            Presence::Missing
        );
    }

    #[test]
    fn test_dangling_symlink_is_missing() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        std::os::unix::fs::symlink("nowhere", &link).unwrap();
        let elevator = SudoElevator::new("sudo", true);
        assert_eq!(probe(&link, &elevator).unwrap(), Presence::Missing);
    }
}
