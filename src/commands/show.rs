//! Show command - displays information.

use anyhow::Result;

use crate::config::Config;
use crate::identity::Identity;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the resolved identity
    Identity,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config, identity: &Identity) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
            println!();
            print_identity(identity);
        }
        ShowTarget::Identity => {
            println!("{}", serde_json::to_string_pretty(identity)?);
        }
    }
    Ok(())
}

fn print_identity(identity: &Identity) {
    println!("Identity:");
    println!("  User: {}", identity.username);
    println!("  Home: {}", identity.home.display());
    println!("  Elevated: {}", identity.elevated);
    if identity.degraded {
        println!("  (no SUDO_USER, using the elevated identity's own home)");
    }
}
