//! One backup run, start to finish.
//!
//! Collect every catalog entry into a staging tree, seal it, run the
//! diagnostics, then amend the archive with the complete run log. Only a
//! failure to seal makes the run fail.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::{self, Archive};
use crate::catalog::{self, SourceEntry};
use crate::common::discard_temp_dir;
use crate::config::Config;
use crate::copier::{CopyOutcome, Copier};
use crate::diagnostics::{self, Diagnostic};
use crate::identity::Identity;
use crate::process::Elevator;
use crate::runlog::RunLog;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the archive goes when nothing overrides it.
pub fn default_dest_dir(config: &Config, identity: &Identity) -> PathBuf {
    config
        .dest_dir
        .clone()
        .unwrap_or_else(|| identity.home.join("Documents"))
}

/// What happened to one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub outcome: CopyOutcome,
}

/// Machine-readable result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// The sealed archive, if sealing succeeded.
    pub archive: Option<PathBuf>,
    pub log_injected: bool,
    pub successes: usize,
    pub total: usize,
    pub entries: Vec<EntryReport>,
}

impl RunSummary {
    /// The run succeeded iff the archive was sealed.
    pub fn sealed(&self) -> bool {
        self.archive.is_some()
    }
}

/// Everything a run needs, borrowed from the caller.
pub struct Backup<'a> {
    config: &'a Config,
    identity: &'a Identity,
    elevator: &'a dyn Elevator,
    dest_dir: PathBuf,
    hostname: String,
    diagnostics: &'a [Diagnostic],
}

impl<'a> Backup<'a> {
    pub fn new(config: &'a Config, identity: &'a Identity, elevator: &'a dyn Elevator) -> Self {
        Self {
            config,
            identity,
            elevator,
            dest_dir: default_dest_dir(config, identity),
            hostname: config.resolved_hostname(),
            diagnostics: diagnostics::DEFAULT_DIAGNOSTICS,
        }
    }

    pub fn dest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dest_dir = dir.into();
        self
    }

    /// Replace the diagnostic sequence (empty disables it).
    pub fn diagnostics(mut self, diagnostics: &'a [Diagnostic]) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Run the backup. `Err` only when no staging tree could be created;
    /// every later failure is recorded in `log` and the summary.
    pub fn run(&self, log: &mut RunLog) -> Result<RunSummary> {
        let started = Local::now();
        log.line(format!(
            "Starting pre-upgrade backup at: {}",
            started.format(TIMESTAMP_FORMAT)
        ));
        self.announce_identity(log);

        let staging = tempfile::Builder::new()
            .prefix("backup-pre_upgrade-")
            .tempdir()
            .context("Failed to create staging directory")?;

        let entries = self.collect(staging.path(), log);
        let successes = entries.iter().filter(|e| e.outcome.is_success()).count();
        let mut summary = RunSummary {
            archive: None,
            log_injected: false,
            successes,
            total: entries.len(),
            entries,
        };
        log.blank();
        log.line(format!(
            "Backed up {} of {} sources",
            summary.successes, summary.total
        ));

        let sealed = self.seal(staging.path(), &started, log);
        if let Err(e) = discard_temp_dir(staging) {
            log.warn(format!("Could not remove staging directory: {:#}", e));
        }
        let Some(archive) = sealed else {
            log.line("Backup process failed.");
            return Ok(summary);
        };
        summary.archive = Some(archive.path().to_path_buf());
        log.line("Backup process completed successfully.");

        if !self.diagnostics.is_empty() {
            log.blank();
            log.line("Executing requested commands:");
            diagnostics::run_all(self.diagnostics, self.identity, self.elevator, log);
        }

        log.blank();
        log.line(format!(
            "Backup completed at: {}",
            Local::now().format(TIMESTAMP_FORMAT)
        ));

        // Lines after this point are not part of script.output
        summary.log_injected = self.amend(&archive, log);
        Ok(summary)
    }

    fn announce_identity(&self, log: &mut RunLog) {
        let identity = self.identity;
        if identity.degraded {
            log.warn(format!(
                "Running elevated without SUDO_USER, backing up {} as {}",
                identity.home.display(),
                identity.username
            ));
        } else if identity.elevated {
            log.line(format!("Running with sudo as {}", identity.username));
        }
    }

    /// Enumerate the catalog and copy every entry, in order.
    fn collect(&self, staging: &Path, log: &mut RunLog) -> Vec<EntryReport> {
        let layout = self.config.layout();
        let sources: Vec<SourceEntry> =
            catalog::enumerate_sources(self.identity, &layout, self.elevator, log);
        let copier = Copier::new(
            self.identity,
            staging,
            self.elevator,
            self.config.elevated_exclusions,
        );

        sources
            .into_iter()
            .map(|entry| {
                let outcome = copier.copy(&entry, log);
                log.line(outcome.render(&entry));
                EntryReport {
                    source: entry.path,
                    destination: entry.destination,
                    outcome,
                }
            })
            .collect()
    }

    fn seal(&self, staging: &Path, started: &DateTime<Local>, log: &mut RunLog) -> Option<Archive> {
        let dest = archive::archive_path(&self.dest_dir, &self.hostname, started);
        match archive::seal(staging, &dest) {
            Ok(archive) => {
                log.blank();
                log.ok(format!("Backup successfully created at: {}", dest.display()));
                Some(archive)
            }
            Err(e) => {
                log.fail(format!("Failed to create backup archive: {:#}", e));
                None
            }
        }
    }

    /// Pass two. A failure leaves the sealed archive as it was.
    fn amend(&self, archive: &Archive, log: &mut RunLog) -> bool {
        let text = log.render();
        match archive::inject_log(archive, &text) {
            Ok(()) => {
                log.blank();
                log.ok(format!(
                    "Archive updated with {} at: {}",
                    archive::LOG_ENTRY,
                    archive.path().display()
                ));
                true
            }
            Err(e) => {
                log.blank();
                log.fail(format!(
                    "Failed to update archive with {}: {:#}",
                    archive::LOG_ENTRY,
                    e
                ));
                false
            }
        }
    }
}
