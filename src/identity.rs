//! Who the backup is acting for.
//!
//! Under `sudo` the process is root but the files worth saving belong to the
//! user who typed the command, so the acting home is taken from `SUDO_USER`.

use serde::Serialize;
use std::path::PathBuf;

use crate::process::Cmd;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Effective uid is 0.
    pub elevated: bool,
    /// User whose dotfiles are collected under `user/<name>`.
    pub username: String,
    pub home: PathBuf,
    /// Effective ids of this process, used to reclaim elevated copies.
    pub uid: u32,
    pub gid: u32,
    /// Elevated without a known real user.
    pub degraded: bool,
}

/// Raw facts the resolver decides from.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub euid: u32,
    pub egid: u32,
    pub sudo_user: Option<String>,
    pub user: Option<String>,
    pub home: Option<PathBuf>,
}

impl Probe {
    /// Gather facts from the running process.
    pub fn current() -> Self {
        // SAFETY: geteuid/getegid have no preconditions and cannot fail.
        let (euid, egid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Self {
            euid,
            egid,
            sudo_user: non_empty_var("SUDO_USER"),
            user: non_empty_var("USER").or_else(|| non_empty_var("LOGNAME")),
            home: dirs::home_dir(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the identity of the running process. Never fails.
pub fn resolve_identity() -> Identity {
    let identity = resolve_from(Probe::current());
    if identity.degraded {
        tracing::warn!(
            home = %identity.home.display(),
            "elevated without SUDO_USER, using the elevated identity's own home"
        );
    }
    identity
}

/// Decide the identity from probed facts.
pub fn resolve_from(probe: Probe) -> Identity {
    let elevated = probe.euid == 0;

    if elevated {
        if let Some(sudo_user) = probe.sudo_user.filter(|u| u != "root") {
            return Identity {
                elevated,
                home: PathBuf::from("/home").join(&sudo_user),
                username: sudo_user,
                uid: probe.euid,
                gid: probe.egid,
                degraded: false,
            };
        }

        return Identity {
            elevated,
            username: probe.user.unwrap_or_else(|| "root".to_string()),
            home: probe.home.unwrap_or_else(|| PathBuf::from("/root")),
            uid: probe.euid,
            gid: probe.egid,
            degraded: true,
        };
    }

    let username = probe
        .user
        .or_else(login_name)
        .unwrap_or_else(|| format!("uid{}", probe.euid));
    let home = probe
        .home
        .unwrap_or_else(|| PathBuf::from("/home").join(&username));

    Identity {
        elevated,
        username,
        home,
        uid: probe.euid,
        gid: probe.egid,
        degraded: false,
    }
}

fn login_name() -> Option<String> {
    let result = Cmd::new("id").arg("-un").run().ok()?;
    let name = result.stdout_trimmed();
    (!name.is_empty()).then(|| name.to_string())
}
