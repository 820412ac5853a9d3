//! Run command - performs one backup.

use anyhow::Result;
use std::path::PathBuf;

use crate::backup::{Backup, RunSummary};
use crate::config::Config;
use crate::identity::Identity;
use crate::process::SudoElevator;
use crate::runlog::RunLog;

/// Options for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub dest_dir: Option<PathBuf>,
    pub no_diagnostics: bool,
    pub json: bool,
}

/// Execute the run command. Returns the summary so the caller can pick the
/// exit code.
pub fn cmd_run(config: &Config, identity: &Identity, args: RunArgs) -> Result<RunSummary> {
    let elevator = SudoElevator::new(&config.elevate_with, identity.elevated);

    let mut backup = Backup::new(config, identity, &elevator);
    if let Some(dir) = args.dest_dir {
        backup = backup.dest_dir(dir);
    }
    if args.no_diagnostics {
        backup = backup.diagnostics(&[]);
    }

    // With --json, stdout carries only the summary
    let mut log = if args.json { RunLog::quiet() } else { RunLog::new() };
    let summary = backup.run(&mut log)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(summary)
}
