//! Archive content digests.
//!
//! Used to prove that amending an archive with the run log left every other
//! entry untouched.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use super::{open_tar, LOG_ENTRY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// What an entry holds, minus metadata that a rebuild may legitimately touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDigest {
    pub kind: EntryKind,
    pub size: u64,
    /// Hex SHA-256 of the entry data (empty data for non-files).
    pub sha256: String,
    pub link: Option<String>,
}

/// Archive path of an entry, without `./` or a trailing `/`.
pub(super) fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let path = entry.path().context("Invalid entry path")?;
    let name = path.to_string_lossy();
    let name = name.strip_prefix("./").unwrap_or(&name);
    Ok(name.trim_end_matches('/').to_string())
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub(super) fn digest_entries(path: &Path) -> Result<BTreeMap<String, EntryDigest>> {
    let mut archive = open_tar(path)?;
    let mut digests = BTreeMap::new();

    for entry in archive.entries().context("Failed to read archive entries")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        let name = entry_name(&entry)?;
        if name.is_empty() || name == "." {
            continue;
        }

        let header_type = entry.header().entry_type();
        let kind = if header_type.is_dir() {
            EntryKind::Dir
        } else if header_type.is_symlink() {
            EntryKind::Symlink
        } else if header_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let link = entry
            .link_name()
            .context("Invalid link name")?
            .map(|l| l.to_string_lossy().into_owned());

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to read {}", name))?;

        digests.insert(
            name,
            EntryDigest {
                kind,
                size: data.len() as u64,
                sha256: sha256_hex(&data),
                link,
            },
        );
    }

    Ok(digests)
}

/// Check that `after` is `before` plus exactly one log entry holding `log_text`.
pub(super) fn check_amendment(
    before: &BTreeMap<String, EntryDigest>,
    after: &BTreeMap<String, EntryDigest>,
    log_text: &str,
) -> Result<()> {
    for (name, digest) in before.iter().filter(|(name, _)| name.as_str() != LOG_ENTRY) {
        match after.get(name) {
            Some(d) if d == digest => {}
            Some(_) => bail!("archive entry {} changed during log injection", name),
            None => bail!("archive entry {} lost during log injection", name),
        }
    }

    let extra: Vec<&String> = after
        .keys()
        .filter(|name| name.as_str() != LOG_ENTRY && !before.contains_key(*name))
        .collect();
    if !extra.is_empty() {
        bail!("unexpected archive entries after log injection: {:?}", extra);
    }

    match after.get(LOG_ENTRY) {
        Some(d) if d.kind == EntryKind::File && d.sha256 == sha256_hex(log_text.as_bytes()) => Ok(()),
        Some(_) => bail!("{} in rebuilt archive does not match the run log", LOG_ENTRY),
        None => bail!("{} missing from rebuilt archive", LOG_ENTRY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &str) -> EntryDigest {
        EntryDigest {
            kind: EntryKind::File,
            size: content.len() as u64,
            sha256: sha256_hex(content.as_bytes()),
            link: None,
        }
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_amendment_accepts_added_log() {
        let before = BTreeMap::from([("etc/fstab".to_string(), file("x"))]);
        let mut after = before.clone();
        after.insert(LOG_ENTRY.to_string(), file("log\n"));
        check_amendment(&before, &after, "log\n").unwrap();
    }

    #[test]
    fn test_amendment_accepts_replaced_log() {
        let before = BTreeMap::from([
            ("etc/fstab".to_string(), file("x")),
            (LOG_ENTRY.to_string(), file("old")),
        ]);
        let mut after = before.clone();
        after.insert(LOG_ENTRY.to_string(), file("new"));
        check_amendment(&before, &after, "new").unwrap();
    }

    #[test]
    fn test_amendment_rejects_changed_entry() {
        let before = BTreeMap::from([("etc/fstab".to_string(), file("x"))]);
        let after = BTreeMap::from([
            ("etc/fstab".to_string(), file("y")),
            (LOG_ENTRY.to_string(), file("log")),
        ]);
        let err = check_amendment(&before, &after, "log").unwrap_err();
        assert!(err.to_string().contains("changed"));
    }

    #[test]
    fn test_amendment_rejects_wrong_log() {
        let before = BTreeMap::new();
        let after = BTreeMap::from([(LOG_ENTRY.to_string(), file("stale"))]);
        assert!(check_amendment(&before, &after, "fresh").is_err());
    }
}
