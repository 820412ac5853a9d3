//! Privilege-aware copying of catalog entries into the staging tree.
//!
//! Every copy is attempted directly first. A permission denial, and nothing
//! else, triggers exactly one retry through the [`Elevator`]. Files copied
//! with elevation are handed back to this process with `chown` so the
//! archive pass can read them.

mod flat;
mod tree;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::catalog::{SourceEntry, SourceKind};
use crate::common::{copy_preserving, ensure_parent_exists, is_permission_denied, probe, Presence};
use crate::config::ElevatedExclusions;
use crate::identity::Identity;
use crate::process::{argv, Elevator};
use crate::runlog::RunLog;

/// How a successful copy got its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Direct,
    Elevated,
}

/// Result of copying one catalog entry. Exactly one per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum CopyOutcome {
    Skipped { reason: String },
    Succeeded { method: Method, count: usize },
    PartiallyFailed { ok: usize, failed: usize },
    Failed { error: String },
}

impl CopyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CopyOutcome::Succeeded { .. })
    }

    /// The Run Log line for this outcome.
    pub fn render(&self, entry: &SourceEntry) -> String {
        let path = entry.path.display();
        match self {
            CopyOutcome::Skipped { reason } => format!("⚠️ {} {}, skipping", path, reason),
            CopyOutcome::Succeeded { method, count } => {
                let suffix = match method {
                    Method::Direct => "",
                    Method::Elevated => " (with sudo)",
                };
                match entry.kind {
                    SourceKind::File => format!("✅ Backed up {}{}", path, suffix),
                    _ if *count == 0 => format!("⚠️ No matching files found in {}", path),
                    _ => format!("✅ Backed up {} files from {}{}", count, path, suffix),
                }
            }
            CopyOutcome::PartiallyFailed { ok, failed } => {
                format!("⚠️ Backed up {} files from {}, {} failed", ok, path, failed)
            }
            CopyOutcome::Failed { error } => format!("❌ Failed to backup {}: {}", path, error),
        }
    }
}

/// Fold per-file results of a directory copy into one outcome.
fn aggregate(ok: usize, failed: usize, any_elevated: bool) -> CopyOutcome {
    let method = if any_elevated {
        Method::Elevated
    } else {
        Method::Direct
    };
    match (ok, failed) {
        (_, 0) => CopyOutcome::Succeeded { method, count: ok },
        (0, _) => CopyOutcome::Failed {
            error: format!("all {} files failed", failed),
        },
        _ => CopyOutcome::PartiallyFailed { ok, failed },
    }
}

/// Copies catalog entries into one staging root.
pub struct Copier<'a> {
    identity: &'a Identity,
    staging: &'a Path,
    elevator: &'a dyn Elevator,
    elevated_exclusions: ElevatedExclusions,
}

impl<'a> Copier<'a> {
    pub fn new(
        identity: &'a Identity,
        staging: &'a Path,
        elevator: &'a dyn Elevator,
        elevated_exclusions: ElevatedExclusions,
    ) -> Self {
        Self {
            identity,
            staging,
            elevator,
            elevated_exclusions,
        }
    }

    /// Copy one entry. Per-file detail lines go to `log`; the outcome line
    /// is left to the caller.
    pub fn copy(&self, entry: &SourceEntry, log: &mut RunLog) -> CopyOutcome {
        let presence = match probe(&entry.path, self.elevator) {
            Ok(presence) => presence,
            Err(e) => {
                return CopyOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        };

        let dest = self.staging.join(&entry.destination);
        match (entry.kind, presence) {
            (_, Presence::Missing) => CopyOutcome::Skipped {
                reason: "does not exist".to_string(),
            },
            (SourceKind::File, Presence::Dir) => CopyOutcome::Failed {
                error: "is a directory".to_string(),
            },
            (SourceKind::Tree | SourceKind::Flat, Presence::File) => CopyOutcome::Failed {
                error: "not a directory".to_string(),
            },
            (SourceKind::File, _) => match self.copy_file(&entry.path, &dest, log) {
                Ok(method) => CopyOutcome::Succeeded { method, count: 1 },
                Err(e) => CopyOutcome::Failed {
                    error: format!("{:#}", e),
                },
            },
            (SourceKind::Tree, _) => tree::copy_tree(self, entry, &dest, log),
            (SourceKind::Flat, _) => flat::copy_flat(self, entry, &dest, log),
        }
    }

    /// Direct copy of one file, escalating once on a permission denial.
    fn copy_file(&self, src: &Path, dst: &Path, log: &mut RunLog) -> Result<Method> {
        match copy_preserving(src, dst) {
            Ok(()) => Ok(Method::Direct),
            Err(e) if is_permission_denied(&e) => {
                tracing::debug!(path = %src.display(), "direct copy denied, escalating");
                self.copy_file_elevated(src, dst, log)?;
                Ok(Method::Elevated)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn copy_file_elevated(&self, src: &Path, dst: &Path, log: &mut RunLog) -> Result<()> {
        ensure_parent_exists(dst)?;
        self.elevator.run_elevated_checked(&argv([
            "cp",
            "-p",
            &src.to_string_lossy(),
            &dst.to_string_lossy(),
        ]))?;
        self.reclaim(dst, log);
        Ok(())
    }

    /// Give an elevated copy back to this process. Failure is logged only.
    fn reclaim(&self, dst: &Path, log: &mut RunLog) {
        if self.identity.elevated {
            return;
        }
        let owner = format!("{}:{}", self.identity.uid, self.identity.gid);
        let result = self.elevator.run_elevated_checked(&argv([
            "chown",
            "-R",
            &owner,
            &dst.to_string_lossy(),
        ]));
        if let Err(e) = result {
            log.detail(format!(
                "⚠️ Could not take ownership of {}: {:#}",
                dst.display(),
                e
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceEntry;

    #[test]
    fn test_aggregate() {
        assert_eq!(
            aggregate(3, 0, false),
            CopyOutcome::Succeeded {
                method: Method::Direct,
                count: 3
            }
        );
        assert_eq!(
            aggregate(2, 0, true),
            CopyOutcome::Succeeded {
                method: Method::Elevated,
                count: 2
            }
        );
        assert_eq!(
            aggregate(2, 1, true),
            CopyOutcome::PartiallyFailed { ok: 2, failed: 1 }
        );
        assert!(matches!(aggregate(0, 4, false), CopyOutcome::Failed { .. }));
    }

    #[test]
    fn test_render_lines() {
        let file = SourceEntry::file("/etc/fstab", "etc/fstab");
        let dir = SourceEntry::flat("/home/u/.bashrc.d", "user/u/.bashrc.d");

        let skipped = CopyOutcome::Skipped {
            reason: "does not exist".into(),
        };
        assert_eq!(
            skipped.render(&dir),
            "⚠️ /home/u/.bashrc.d does not exist, skipping"
        );

        let elevated = CopyOutcome::Succeeded {
            method: Method::Elevated,
            count: 1,
        };
        assert_eq!(elevated.render(&file), "✅ Backed up /etc/fstab (with sudo)");

        let many = CopyOutcome::Succeeded {
            method: Method::Direct,
            count: 4,
        };
        assert_eq!(many.render(&dir), "✅ Backed up 4 files from /home/u/.bashrc.d");

        let none = CopyOutcome::Succeeded {
            method: Method::Direct,
            count: 0,
        };
        assert!(none.render(&dir).starts_with("⚠️ No matching files found"));

        let failed = CopyOutcome::Failed {
            error: "boom".into(),
        };
        assert_eq!(failed.render(&file), "❌ Failed to backup /etc/fstab: boom");
    }
}
