//! CLI command handlers.
//!
//! - `run` - Collect, seal and amend a backup archive
//! - `preflight` - Check host tools and paths
//! - `show` - Display information

mod preflight;
mod run;
pub mod show;

pub use preflight::cmd_preflight;
pub use run::{cmd_run, RunArgs};
pub use show::cmd_show;
