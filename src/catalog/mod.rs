//! The fixed list of things worth saving before an upgrade.
//!
//! Static entries cover the acting user's dotfiles, root's equivalents and a
//! handful of system files. Extra entries come from the `[local.backup]`
//! section of the restic profiles file, see [`extra`].

pub mod extra;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::SshPolicy;
use crate::identity::Identity;
use crate::process::Elevator;
use crate::runlog::RunLog;

/// Top-level staging segment for the acting user's files.
pub const USER_SEGMENT: &str = "user";
/// Top-level staging segment for root's files.
pub const ROOT_SEGMENT: &str = "root";
/// Top-level staging segment mirroring `/etc`.
pub const ETC_SEGMENT: &str = "etc";
/// Top-level staging segment for `[local.backup]` sources.
pub const EXTRA_SEGMENT: &str = "additional_sources";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A single file.
    File,
    /// A directory, recursively.
    Tree,
    /// Only the regular files directly inside a directory.
    Flat,
}

/// Name predicate applied while copying a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameFilter {
    /// Keep only key material: `id*` and anything mentioning `local`.
    SshKeys,
    /// Drop live ssh multiplexing sockets and their directories.
    ControlSockets,
}

impl NameFilter {
    /// Whether a directory child named `name` is copied.
    pub fn admits(self, name: &str) -> bool {
        match self {
            NameFilter::SshKeys => name.starts_with("id") || name.contains("local"),
            NameFilter::ControlSockets => !is_control_socket_name(name),
        }
    }
}

fn is_control_socket_name(name: &str) -> bool {
    name.starts_with("control-")
        || name.starts_with("cm-")
        || name.ends_with(".sock")
        || name.ends_with(".socket")
        || name == "sockets"
        || name == "controlmasters"
}

/// One catalog item: where it lives, how to copy it, where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Relative path inside the staging tree.
    pub destination: PathBuf,
    pub filter: Option<NameFilter>,
}

impl SourceEntry {
    pub fn file(path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::File,
            destination: destination.into(),
            filter: None,
        }
    }

    pub fn tree(path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::Tree,
            ..Self::file(path, destination)
        }
    }

    pub fn flat(path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::Flat,
            ..Self::file(path, destination)
        }
    }

    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Where the catalog looks. Overridable so tests can point it at a sandbox.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root_home: PathBuf,
    pub etc_dir: PathBuf,
    pub profiles_path: PathBuf,
    pub ssh_policy: SshPolicy,
}

/// The static part of the catalog, in collection order.
pub fn static_sources(identity: &Identity, layout: &Layout) -> Vec<SourceEntry> {
    let user_dest = Path::new(USER_SEGMENT).join(&identity.username);
    let root_dest = PathBuf::from(ROOT_SEGMENT);
    let etc_dest = PathBuf::from(ETC_SEGMENT);

    let mut entries = home_sources(&identity.home, &user_dest, layout.ssh_policy);
    entries.extend(home_sources(&layout.root_home, &root_dest, layout.ssh_policy));

    entries.push(SourceEntry::tree(
        layout.etc_dir.join("restic"),
        etc_dest.join("restic"),
    ));
    entries.push(SourceEntry::file(
        layout.etc_dir.join("network/interfaces"),
        etc_dest.join("network/interfaces"),
    ));
    entries.push(SourceEntry::flat(
        layout.etc_dir.join("network/interfaces.d"),
        etc_dest.join("network/interfaces.d"),
    ));
    entries.push(SourceEntry::file(
        layout.etc_dir.join("fstab"),
        etc_dest.join("fstab"),
    ));

    entries
}

/// Shell history, ssh material and `.bashrc.d` of one home directory.
fn home_sources(home: &Path, dest: &Path, ssh_policy: SshPolicy) -> Vec<SourceEntry> {
    let ssh = match ssh_policy {
        SshPolicy::Tree => SourceEntry::tree(home.join(".ssh"), dest.join(".ssh"))
            .with_filter(NameFilter::ControlSockets),
        SshPolicy::KeyPatterns => SourceEntry::flat(home.join(".ssh"), dest.join(".ssh"))
            .with_filter(NameFilter::SshKeys),
    };

    vec![
        SourceEntry::file(home.join(".bash_history"), dest.join(".bash_history")),
        ssh,
        SourceEntry::flat(home.join(".bashrc.d"), dest.join(".bashrc.d")),
    ]
}

/// Full catalog: static entries followed by the configured extra sources.
///
/// Problems with the profiles file are logged and never cut the static part
/// short.
pub fn enumerate_sources(
    identity: &Identity,
    layout: &Layout,
    elevator: &dyn Elevator,
    log: &mut RunLog,
) -> Vec<SourceEntry> {
    let mut entries = static_sources(identity, layout);
    entries.extend(extra::resolve_extra_sources(
        &layout.profiles_path,
        elevator,
        log,
    ));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            elevated: false,
            username: "alice".into(),
            home: PathBuf::from("/home/alice"),
            uid: 1000,
            gid: 1000,
            degraded: false,
        }
    }

    fn layout(ssh_policy: SshPolicy) -> Layout {
        Layout {
            root_home: PathBuf::from("/root"),
            etc_dir: PathBuf::from("/etc"),
            profiles_path: PathBuf::from("/etc/restic/profiles.toml"),
            ssh_policy,
        }
    }

    #[test]
    fn test_static_catalog_order_and_destinations() {
        let entries = static_sources(&identity(), &layout(SshPolicy::Tree));
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.path.to_str().unwrap(), e.destination.to_str().unwrap()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("/home/alice/.bash_history", "user/alice/.bash_history"),
                ("/home/alice/.ssh", "user/alice/.ssh"),
                ("/home/alice/.bashrc.d", "user/alice/.bashrc.d"),
                ("/root/.bash_history", "root/.bash_history"),
                ("/root/.ssh", "root/.ssh"),
                ("/root/.bashrc.d", "root/.bashrc.d"),
                ("/etc/restic", "etc/restic"),
                ("/etc/network/interfaces", "etc/network/interfaces"),
                ("/etc/network/interfaces.d", "etc/network/interfaces.d"),
                ("/etc/fstab", "etc/fstab"),
            ]
        );
    }

    #[test]
    fn test_kinds() {
        let entries = static_sources(&identity(), &layout(SshPolicy::Tree));
        assert_eq!(entries[0].kind, SourceKind::File);
        assert_eq!(entries[1].kind, SourceKind::Tree);
        assert_eq!(entries[1].filter, Some(NameFilter::ControlSockets));
        assert_eq!(entries[2].kind, SourceKind::Flat);
        assert_eq!(entries[6].kind, SourceKind::Tree);
        assert_eq!(entries[8].kind, SourceKind::Flat);
    }

    #[test]
    fn test_key_pattern_policy_uses_flat_allow_list() {
        let entries = static_sources(&identity(), &layout(SshPolicy::KeyPatterns));
        for ssh in [&entries[1], &entries[4]] {
            assert_eq!(ssh.kind, SourceKind::Flat);
            assert_eq!(ssh.filter, Some(NameFilter::SshKeys));
        }
    }

    #[test]
    fn test_ssh_key_filter() {
        let f = NameFilter::SshKeys;
        assert!(f.admits("id_ed25519"));
        assert!(f.admits("id_rsa.pub"));
        assert!(f.admits("local"));
        assert!(f.admits("config.local"));
        assert!(!f.admits("known_hosts"));
        assert!(!f.admits("config"));
    }

    #[test]
    fn test_control_socket_filter() {
        let f = NameFilter::ControlSockets;
        assert!(f.admits("id_ed25519"));
        assert!(f.admits("known_hosts"));
        assert!(!f.admits("control-git@github.com:22"));
        assert!(!f.admits("cm-alice@host:22"));
        assert!(!f.admits("agent.sock"));
        assert!(!f.admits("sockets"));
    }
}
