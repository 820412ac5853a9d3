//! Identity resolution and environment-driven configuration.

use preupgrade_backup::config::{Config, SshPolicy};
use preupgrade_backup::identity::{resolve_from, Probe};
use serial_test::serial;
use std::path::PathBuf;

#[test]
fn test_sudo_user_home_is_used() {
    let identity = resolve_from(Probe {
        euid: 0,
        egid: 0,
        sudo_user: Some("alice".to_string()),
        user: Some("root".to_string()),
        home: Some(PathBuf::from("/root")),
    });

    assert!(identity.elevated);
    assert!(!identity.degraded);
    assert_eq!(identity.username, "alice");
    assert_eq!(identity.home, PathBuf::from("/home/alice"));
}

#[test]
fn test_root_login_without_sudo_is_degraded() {
    let identity = resolve_from(Probe {
        euid: 0,
        egid: 0,
        sudo_user: None,
        user: Some("root".to_string()),
        home: Some(PathBuf::from("/root")),
    });

    assert!(identity.degraded);
    assert_eq!(identity.home, PathBuf::from("/root"));
}

#[test]
#[serial]
fn test_probe_reads_sudo_user() {
    std::env::set_var("SUDO_USER", "alice");
    let probe = Probe::current();
    std::env::remove_var("SUDO_USER");

    assert_eq!(probe.sudo_user.as_deref(), Some("alice"));
}

#[test]
#[serial]
fn test_config_load_reads_environment() {
    std::env::set_var("BACKUP_SSH_POLICY", "patterns");
    std::env::set_var("BACKUP_DEST_DIR", "/srv/backups");
    let config = Config::load();
    std::env::remove_var("BACKUP_SSH_POLICY");
    std::env::remove_var("BACKUP_DEST_DIR");

    let config = config.unwrap();
    assert_eq!(config.ssh_policy, SshPolicy::KeyPatterns);
    assert_eq!(config.dest_dir, Some(PathBuf::from("/srv/backups")));
}

#[test]
#[serial]
fn test_config_load_rejects_bad_value() {
    std::env::set_var("BACKUP_ELEVATED_EXCLUSIONS", "sometimes");
    let result = Config::load();
    std::env::remove_var("BACKUP_ELEVATED_EXCLUSIONS");

    assert!(result.is_err());
}
