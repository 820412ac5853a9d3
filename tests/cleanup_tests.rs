//! Temporary directories never outlive a run.
//!
//! Kept in its own test binary because it points `TMPDIR` at a sandbox.

mod helpers;

use helpers::{set_mode, FakeRoot, TestEnv};
use preupgrade_backup::archive::Archive;
use preupgrade_backup::backup::Backup;
use preupgrade_backup::runlog::RunLog;
use std::fs;

#[test]
fn test_read_only_source_directory_leaves_no_temp_copies() {
    let env = TestEnv::new();
    let project = env.path("srv/project");
    env.write("srv/project/ro/secret.txt", "hunter2\n");
    set_mode(&project.join("ro"), 0o555);
    env.write(
        "etc/restic/profiles.toml",
        &format!("[local.backup]\nsource = [\"{}\"]\n", project.display()),
    );
    let tmp = env.path("tmp");
    fs::create_dir_all(&tmp).unwrap();

    let config = env.config();
    let identity = env.identity();
    let elevator = FakeRoot::default();
    let mut log = RunLog::quiet();

    std::env::set_var("TMPDIR", &tmp);
    let summary = Backup::new(&config, &identity, &elevator)
        .diagnostics(&[])
        .run(&mut log);
    std::env::remove_var("TMPDIR");
    set_mode(&project.join("ro"), 0o755);

    let summary = summary.unwrap();
    assert!(summary.sealed());
    assert!(summary.log_injected);

    let left: Vec<_> = fs::read_dir(&tmp)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(left.is_empty(), "left in TMPDIR: {:?}", left);
    assert!(!log.render().contains("Could not remove staging directory"));

    let archive = Archive::open(summary.archive.unwrap());
    assert_eq!(
        archive
            .read_entry("additional_sources/project/ro/secret.txt")
            .unwrap()
            .unwrap(),
        b"hunter2\n"
    );
}
