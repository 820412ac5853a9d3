//! backup-pre-upgrade - snapshot a machine's irreplaceable config before an
//! OS upgrade.
//!
//! Collects shell history, ssh material, `.bashrc.d`, root's equivalents,
//! restic and network config into a staging tree, seals it as a `.tgz`,
//! runs a few diagnostic commands and finally stores the full run log in the
//! archive as `script.output`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use preupgrade_backup::backup::default_dest_dir;
use preupgrade_backup::commands::{self, show::ShowTarget as ShowWhat, RunArgs};
use preupgrade_backup::config::Config;
use preupgrade_backup::identity::resolve_identity;

#[derive(Parser)]
#[command(name = "backup-pre-upgrade")]
#[command(about = "Pre-upgrade backup of user and system configuration")]
#[command(
    after_help = "QUICK START:\n  backup-pre-upgrade preflight    Check host tools\n  sudo backup-pre-upgrade         Back up everything\n  backup-pre-upgrade show config  Show configuration"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up everything (the default)
    Run {
        /// Directory for the archive (default: ~/Documents)
        #[arg(long)]
        dest_dir: Option<PathBuf>,

        /// Skip the post-backup diagnostic commands
        #[arg(long)]
        no_diagnostics: bool,

        /// Print a JSON summary instead of the run log
        #[arg(long)]
        json: bool,
    },

    /// Run preflight checks (verify host tools before a backup)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the resolved identity as JSON
    Identity,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let identity = resolve_identity();

    let command = cli.command.unwrap_or(Commands::Run {
        dest_dir: None,
        no_diagnostics: false,
        json: false,
    });

    match command {
        Commands::Run {
            dest_dir,
            no_diagnostics,
            json,
        } => {
            let summary = commands::cmd_run(
                &config,
                &identity,
                RunArgs {
                    dest_dir,
                    no_diagnostics,
                    json,
                },
            )?;
            if !summary.sealed() {
                std::process::exit(1);
            }
        }
        Commands::Preflight { strict } => {
            let dest_dir = default_dest_dir(&config, &identity);
            commands::cmd_preflight(&config, &identity, &dest_dir, strict)?;
        }
        Commands::Show { what } => {
            let target = match what {
                ShowTarget::Config => ShowWhat::Config,
                ShowTarget::Identity => ShowWhat::Identity,
            };
            commands::cmd_show(target, &config, &identity)?;
        }
    }

    Ok(())
}
