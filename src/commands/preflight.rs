//! Preflight command - verifies host tools and paths.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::identity::Identity;
use crate::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, identity: &Identity, dest_dir: &Path, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(config, identity, dest_dir)?;
    } else {
        let report = preflight::run_preflight(config, identity, dest_dir);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to exit non-zero.");
        }
    }
    Ok(())
}
