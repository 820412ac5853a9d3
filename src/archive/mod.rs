//! Two-pass archive building.
//!
//! Pass one seals the staging tree into a gzip tarball. Pass two amends the
//! sealed archive with the run log. A gzip tar stream can't have a single
//! entry replaced in place, so amendment is a rebuild: unpack into a scratch
//! directory, write `script.output`, repack, then check that nothing else
//! changed.
//!
//! Both passes write `<archive>.partial` and rename it into place, so the
//! archive path only ever holds a complete tarball.

mod verify;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::common::{discard_temp_dir, ensure_parent_exists};

pub use verify::{EntryDigest, EntryKind};

/// Name of the run log entry at the archive root.
pub const LOG_ENTRY: &str = "script.output";

/// Archive file name prefix.
pub const ARCHIVE_PREFIX: &str = "backup-pre_upgrade";

/// `<dest_dir>/backup-pre_upgrade-<hostname>-<YYYYMMDD-HHMMSS>.tgz`
pub fn archive_path<Tz: TimeZone>(dest_dir: &Path, hostname: &str, at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    dest_dir.join(format!(
        "{}-{}-{}.tgz",
        ARCHIVE_PREFIX,
        hostname,
        at.format("%Y%m%d-%H%M%S")
    ))
}

/// A sealed archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    /// Refer to an existing archive.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry with its kind and content digest, keyed by archive path.
    pub fn entries(&self) -> Result<BTreeMap<String, EntryDigest>> {
        verify::digest_entries(&self.path)
    }

    /// Contents of one regular-file entry, if present.
    pub fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = open_tar(&self.path)?;
        for entry in archive.entries().context("Failed to read archive entries")? {
            let mut entry = entry.context("Corrupt archive entry")?;
            if verify::entry_name(&entry)? == name {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    /// Size of the archive file in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

/// Pass one: pack everything under `staging` into a new archive at `dest`.
pub fn seal(staging: &Path, dest: &Path) -> Result<Archive> {
    ensure_parent_exists(dest)?;
    pack_dir(staging, dest, |_| Ok(()))
        .with_context(|| format!("Failed to create archive {}", dest.display()))?;
    Ok(Archive::open(dest))
}

/// Pass two: add or replace `script.output` with `log_text`.
///
/// Every other entry must come out of the rebuild unchanged; the rebuilt
/// tarball is checked before it replaces the archive, so on any error the
/// sealed archive is left as it was. The scratch directory and the
/// standalone log file are removed on every path.
pub fn inject_log(archive: &Archive, log_text: &str) -> Result<()> {
    let standalone = tempfile::Builder::new()
        .prefix("script.output-")
        .tempfile()
        .context("Failed to create standalone log file")?;
    fs::write(standalone.path(), log_text).context("Failed to write standalone log file")?;

    let scratch = tempfile::Builder::new()
        .prefix("backup-repack-")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let result = repack_with_log(archive, standalone.path(), scratch.path(), log_text);

    if let Err(e) = discard_temp_dir(scratch) {
        tracing::warn!(error = %format!("{:#}", e), "scratch directory left behind");
    }
    result
}

fn repack_with_log(archive: &Archive, standalone: &Path, scratch: &Path, log_text: &str) -> Result<()> {
    let before = archive.entries()?;
    unpack(archive.path(), scratch)?;

    let log_path = scratch.join(LOG_ENTRY);
    if log_path.is_dir() {
        bail!("{} in archive is a directory", LOG_ENTRY);
    }
    fs::copy(standalone, &log_path).with_context(|| format!("Failed to place {}", LOG_ENTRY))?;

    pack_dir(scratch, archive.path(), |rebuilt| {
        let after = verify::digest_entries(rebuilt)?;
        verify::check_amendment(&before, &after, log_text)
    })
    .with_context(|| format!("Failed to rewrite archive {}", archive.path().display()))
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Write a tarball of `src` to `<dest>.partial`, run `check` on it, and only
/// then rename it over `dest`.
fn pack_dir(src: &Path, dest: &Path, check: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let partial = partial_path(dest);
    let result = write_tarball(src, &partial)
        .and_then(|()| check(&partial))
        .and_then(|()| {
            fs::rename(&partial, dest)
                .with_context(|| format!("Failed to move {} into place", partial.display()))
        });
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_tarball(src: &Path, out: &Path) -> Result<()> {
    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for item in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let item = item.context("Failed to walk staging tree")?;
        let file_type = item.file_type();
        if !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()) {
            tracing::debug!(path = %item.path().display(), "not archiving special file");
            continue;
        }
        let rel = item.path().strip_prefix(src)?;
        builder
            .append_path_with_name(item.path(), rel)
            .with_context(|| format!("Failed to add {}", rel.display()))?;
    }

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    let file = encoder.finish().context("Failed to finish gzip stream")?;
    file.sync_all()?;
    Ok(())
}

fn open_tar(path: &Path) -> Result<tar::Archive<GzDecoder<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

/// Extract an archive into `into`, keeping modes and mtimes.
pub fn unpack(archive: &Path, into: &Path) -> Result<()> {
    let mut tar = open_tar(archive)?;
    tar.set_preserve_permissions(true);
    tar.set_preserve_mtime(true);
    tar.unpack(into)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(())
}
