//! Configuration management.
//!
//! Reads configuration from a `.env` file and environment variables.
//! Environment variables take precedence over `.env`.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::Layout;

/// Default location of the restic profiles file.
pub const DEFAULT_PROFILES_PATH: &str = "/etc/restic/profiles.toml";

/// How `~/.ssh` is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SshPolicy {
    /// Whole directory tree, minus live control sockets.
    Tree,
    /// Top-level key files only (`id*`, `*local*`).
    KeyPatterns,
}

/// Whether name filters survive the elevated fallback of a tree copy.
///
/// `Drop` copies the whole tree once escalated, exactly as `cp -a` sees it.
/// `Reapply` prunes the excluded names from the staged copy afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElevatedExclusions {
    Drop,
    Reapply,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Where the archive is written (default: `<home>/Documents`).
    pub dest_dir: Option<PathBuf>,
    pub profiles_path: PathBuf,
    pub root_home: PathBuf,
    pub etc_dir: PathBuf,
    pub ssh_policy: SshPolicy,
    pub elevated_exclusions: ElevatedExclusions,
    /// Program used to escalate (`sudo`, `doas`, ...).
    pub elevate_with: String,
    /// Overrides the system hostname in the archive name.
    pub hostname: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dest_dir: None,
            profiles_path: PathBuf::from(DEFAULT_PROFILES_PATH),
            root_home: PathBuf::from("/root"),
            etc_dir: PathBuf::from("/etc"),
            ssh_policy: SshPolicy::Tree,
            elevated_exclusions: ElevatedExclusions::Drop,
            elevate_with: "sudo".to_string(),
            hostname: None,
        }
    }
}

impl Config {
    /// Load configuration from `.env` (if present) and the environment.
    pub fn load() -> Result<Self> {
        // Missing .env is fine
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(dir) = get("BACKUP_DEST_DIR") {
            config.dest_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get("BACKUP_PROFILES_PATH") {
            config.profiles_path = PathBuf::from(path);
        }
        if let Some(path) = get("BACKUP_ROOT_HOME") {
            config.root_home = PathBuf::from(path);
        }
        if let Some(path) = get("BACKUP_ETC_DIR") {
            config.etc_dir = PathBuf::from(path);
        }
        if let Some(policy) = get("BACKUP_SSH_POLICY") {
            config.ssh_policy = match policy {
                "tree" => SshPolicy::Tree,
                "patterns" => SshPolicy::KeyPatterns,
                other => bail!("BACKUP_SSH_POLICY must be 'tree' or 'patterns', got '{}'", other),
            };
        }
        if let Some(mode) = get("BACKUP_ELEVATED_EXCLUSIONS") {
            config.elevated_exclusions = match mode {
                "drop" => ElevatedExclusions::Drop,
                "reapply" => ElevatedExclusions::Reapply,
                other => bail!(
                    "BACKUP_ELEVATED_EXCLUSIONS must be 'drop' or 'reapply', got '{}'",
                    other
                ),
            };
        }
        if let Some(program) = get("BACKUP_ELEVATE_WITH") {
            config.elevate_with = program.to_string();
        }
        if let Some(host) = get("BACKUP_HOSTNAME") {
            config.hostname = Some(host.to_string());
        }

        Ok(config)
    }

    /// Filesystem locations the catalog reads from.
    pub fn layout(&self) -> Layout {
        Layout {
            root_home: self.root_home.clone(),
            etc_dir: self.etc_dir.clone(),
            profiles_path: self.profiles_path.clone(),
            ssh_policy: self.ssh_policy,
        }
    }

    /// Hostname for the archive name.
    pub fn resolved_hostname(&self) -> String {
        if let Some(host) = &self.hostname {
            return host.clone();
        }
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        match &self.dest_dir {
            Some(dir) => println!("  BACKUP_DEST_DIR: {}", dir.display()),
            None => println!("  BACKUP_DEST_DIR: <home>/Documents"),
        }
        println!("  BACKUP_PROFILES_PATH: {}", self.profiles_path.display());
        println!("  BACKUP_ROOT_HOME: {}", self.root_home.display());
        println!("  BACKUP_ETC_DIR: {}", self.etc_dir.display());
        println!("  BACKUP_SSH_POLICY: {:?}", self.ssh_policy);
        println!("  BACKUP_ELEVATED_EXCLUSIONS: {:?}", self.elevated_exclusions);
        println!("  BACKUP_ELEVATE_WITH: {}", self.elevate_with);
        println!("  Hostname: {}", self.resolved_hostname());
    }
}
