//! Shared test utilities for backup tests.

#![allow(dead_code)]

use anyhow::Result;
use preupgrade_backup::config::Config;
use preupgrade_backup::identity::Identity;
use preupgrade_backup::process::{Cmd, CommandResult, Elevator};
use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A sandboxed machine: a user home, root's home, an `/etc` and an archive
/// destination, all under one temporary directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub home: PathBuf,
    pub root_home: PathBuf,
    pub etc: PathBuf,
    pub dest: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let home = base.join("home/alice");
        let root_home = base.join("root");
        let etc = base.join("etc");
        let dest = base.join("backups");

        fs::create_dir_all(&home).expect("Failed to create home");
        fs::create_dir_all(&root_home).expect("Failed to create root home");
        fs::create_dir_all(&etc).expect("Failed to create etc");

        Self {
            _temp_dir: temp_dir,
            home,
            root_home,
            etc,
            dest,
        }
    }

    /// Configuration pointing every catalog location into the sandbox.
    pub fn config(&self) -> Config {
        Config {
            dest_dir: Some(self.dest.clone()),
            profiles_path: self.etc.join("restic/profiles.toml"),
            root_home: self.root_home.clone(),
            etc_dir: self.etc.clone(),
            hostname: Some("testbox".to_string()),
            ..Config::default()
        }
    }

    /// Non-elevated alice, uid/gid of this process.
    pub fn identity(&self) -> Identity {
        // SAFETY: no preconditions.
        let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Identity {
            elevated: false,
            username: "alice".to_string(),
            home: self.home.clone(),
            uid,
            gid,
            degraded: false,
        }
    }

    /// Write a file relative to the sandbox root, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self._temp_dir.path().join(rel);
        fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self._temp_dir.path().join(rel)
    }
}

/// Stands in for sudo without real privileges.
///
/// `cp` and `find` first open up read access on their source with
/// `chmod -R u+rX`, `chown` hands the copy back by making it owner-readable,
/// and everything else runs as-is. Programs listed in `refuse` exit 1.
#[derive(Default)]
pub struct FakeRoot {
    pub calls: RefCell<Vec<Vec<String>>>,
    pub refuse: Vec<String>,
}

impl FakeRoot {
    pub fn refusing(programs: &[&str]) -> Self {
        Self {
            refuse: programs.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c[0].clone()).collect()
    }
}

fn grant_read(path: &str) -> Result<CommandResult> {
    Cmd::new("chmod").args(["u+rX", path]).run()?;
    Cmd::new("chmod").args(["-R", "u+rX", path]).run()
}

impl Elevator for FakeRoot {
    fn run_elevated(&self, argv: &[String]) -> Result<CommandResult> {
        self.calls.borrow_mut().push(argv.to_vec());
        if self.refuse.contains(&argv[0]) {
            return Cmd::new("false").allow_fail().run();
        }
        match argv[0].as_str() {
            "chown" => Cmd::new("chmod")
                .args(["-R", "u+rwX", &argv[argv.len() - 1]])
                .allow_fail()
                .run(),
            "cp" => {
                grant_read(&argv[argv.len() - 2])?;
                Cmd::new("cp").args(&argv[1..]).allow_fail().run()
            }
            "find" => {
                grant_read(&argv[1])?;
                Cmd::new("find").args(&argv[1..]).allow_fail().run()
            }
            program => Cmd::new(program).args(&argv[1..]).allow_fail().run(),
        }
    }
}

/// Permission checks do not apply to root, so denial tests cannot run as root.
pub fn running_as_root() -> bool {
    // SAFETY: no preconditions.
    unsafe { libc::geteuid() == 0 }
}

pub fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("Failed to set mode");
}

/// Replace timestamps so two run logs can be compared.
pub fn mask_timestamps(text: &str) -> String {
    let clock = regex::Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap();
    let stamp = regex::Regex::new(r"\d{8}-\d{6}").unwrap();
    let text = clock.replace_all(text, "<time>");
    stamp.replace_all(&text, "<stamp>").into_owned()
}
