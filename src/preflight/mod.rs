//! Preflight checks.
//!
//! Verifies the tools the backup shells out to and the paths it touches.
//! Run with `backup-pre-upgrade preflight`.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::identity::Identity;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(config: &Config, identity: &Identity, dest_dir: &Path) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools(identity, &config.elevate_with));

    println!("Checking paths...");
    checks.push(environment::check_destination(dest_dir));
    checks.push(environment::check_profiles(&config.profiles_path));

    println!();

    PreflightReport { checks }
}

/// Run preflight checks and fail if any required check fails.
pub fn run_preflight_or_fail(config: &Config, identity: &Identity, dest_dir: &Path) -> Result<()> {
    let report = run_preflight(config, identity, dest_dir);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before running a backup.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
