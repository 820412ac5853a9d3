//! Extra sources listed in restic's `profiles.toml`.
//!
//! Only `[local.backup] source = [...]` is read. Everything about this file
//! is best effort: a missing file, a syntax error or an unexpected shape each
//! produce a log line and zero entries.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{SourceEntry, EXTRA_SEGMENT};
use crate::common::{probe, Presence};
use crate::process::{argv, Elevator};
use crate::runlog::RunLog;

/// What `[local.backup]` turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSources {
    NoBackupSection,
    NoSourceArray,
    Listed {
        paths: Vec<PathBuf>,
        /// Items that are not absolute path strings, rendered as TOML.
        rejected: Vec<String>,
    },
}

/// Parse profiles text. Only a TOML syntax error is an `Err`.
pub fn parse_profiles(text: &str) -> Result<ProfileSources> {
    let table: toml::Table = text.parse().context("invalid TOML")?;

    let Some(backup) = table
        .get("local")
        .and_then(toml::Value::as_table)
        .and_then(|local| local.get("backup"))
        .and_then(toml::Value::as_table)
    else {
        return Ok(ProfileSources::NoBackupSection);
    };

    let Some(items) = backup.get("source").and_then(toml::Value::as_array) else {
        return Ok(ProfileSources::NoSourceArray);
    };

    let mut paths = Vec::new();
    let mut rejected = Vec::new();
    for item in items {
        match item.as_str().map(Path::new) {
            Some(path) if path.is_absolute() => paths.push(path.to_path_buf()),
            _ => rejected.push(item.to_string()),
        }
    }

    Ok(ProfileSources::Listed { paths, rejected })
}

/// Read the profiles file, escalating once if it is not readable.
///
/// `Ok(None)` means the file does not exist.
fn read_profiles(path: &Path, elevator: &dyn Elevator) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(path = %path.display(), "profiles not readable, reading elevated");
            // Distinguish "missing" from "unreadable" before cat
            if !probe(path, elevator)?.exists() {
                return Ok(None);
            }
            let result =
                elevator.run_elevated_checked(&argv(["cat", &path.to_string_lossy()]))?;
            Ok(Some(result.stdout))
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Staging name for a source: its basename, suffixed on collision.
fn unique_name(path: &Path, taken: &mut HashSet<String>) -> Option<String> {
    let base = path.file_name()?.to_string_lossy().into_owned();
    let mut name = base.clone();
    let mut n = 2;
    while !taken.insert(name.clone()) {
        name = format!("{}-{}", base, n);
        n += 1;
    }
    Some(name)
}

/// Turn the profiles file into catalog entries under `additional_sources/`.
pub fn resolve_extra_sources(
    profiles_path: &Path,
    elevator: &dyn Elevator,
    log: &mut RunLog,
) -> Vec<SourceEntry> {
    let shown = profiles_path.display();

    let text = match read_profiles(profiles_path, elevator) {
        Ok(Some(text)) => text,
        Ok(None) => {
            log.warn(format!("{} does not exist, skipping additional sources", shown));
            return Vec::new();
        }
        Err(e) => {
            log.fail(format!("Failed to read {}: {:#}", shown, e));
            return Vec::new();
        }
    };

    let (paths, rejected) = match parse_profiles(&text) {
        Ok(ProfileSources::Listed { paths, rejected }) => (paths, rejected),
        Ok(ProfileSources::NoBackupSection) => {
            log.warn(format!("No [local.backup] section found in {}", shown));
            return Vec::new();
        }
        Ok(ProfileSources::NoSourceArray) => {
            log.warn("No 'source' array found in [local.backup] section");
            return Vec::new();
        }
        Err(e) => {
            log.fail(format!("Failed to parse {}: {:#}", shown, e));
            return Vec::new();
        }
    };

    log.blank();
    log.ok(format!(
        "Found {} sources in [local.backup] section",
        paths.len() + rejected.len()
    ));
    for item in &rejected {
        log.detail(format!("⚠️ Ignoring source {}: not an absolute path", item));
    }

    let mut taken = HashSet::new();
    let mut entries = Vec::new();
    for path in paths {
        let presence = match probe(&path, elevator) {
            Ok(presence) => presence,
            Err(e) => {
                log.detail(format!("❌ Could not check source {}: {:#}", path.display(), e));
                continue;
            }
        };

        if presence == Presence::Missing {
            log.detail(format!("⚠️ Source {} does not exist, skipping", path.display()));
            continue;
        }

        let Some(name) = unique_name(&path, &mut taken) else {
            log.detail(format!("⚠️ Source {} has no file name, skipping", path.display()));
            continue;
        };

        let destination = Path::new(EXTRA_SEGMENT).join(name);
        entries.push(match presence {
            Presence::Dir => SourceEntry::tree(path, destination),
            _ => SourceEntry::file(path, destination),
        });
    }

    entries
}
