//! Post-backup diagnostic commands.
//!
//! Their output is not needed to build the archive, only to document the
//! machine's state next to it, so nothing here can fail the run: a command
//! that cannot be started becomes an `ERROR:` block in the log.

use crate::identity::Identity;
use crate::process::{argv, shell, CommandResult, Elevator};
use crate::runlog::RunLog;

/// Which identity a diagnostic command runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAs {
    /// The real user (via `su -` when the process is elevated).
    User,
    /// Elevated, through the [`Elevator`].
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    pub command: &'static str,
    pub run_as: RunAs,
}

/// The fixed diagnostic sequence, in run order.
pub const DEFAULT_DIAGNOSTICS: &[Diagnostic] = &[
    Diagnostic { command: "yadm status", run_as: RunAs::User },
    Diagnostic { command: "gita ll", run_as: RunAs::User },
    Diagnostic { command: "docker ps -a", run_as: RunAs::User },
    Diagnostic { command: "df -h", run_as: RunAs::Root },
    Diagnostic { command: "fdisk -l", run_as: RunAs::Root },
    Diagnostic { command: "ip addr", run_as: RunAs::Root },
];

/// Header line naming the command and who ran it.
pub fn header(command: &str, run_as: RunAs, identity: &Identity) -> String {
    match run_as {
        RunAs::User if identity.elevated && !identity.degraded => {
            format!("COMMAND AS USER {}: {}", identity.username, command)
        }
        RunAs::User => format!("COMMAND: {}", command),
        RunAs::Root => format!("COMMAND AS ROOT: {}", command),
    }
}

/// Run one command and return its stdout, or an `ERROR:` block.
pub fn run(command: &str, run_as: RunAs, identity: &Identity, elevator: &dyn Elevator) -> String {
    let result: anyhow::Result<CommandResult> = match run_as {
        RunAs::User if identity.elevated && !identity.degraded => elevator
            .run_elevated(&argv(["su", "-", &identity.username, "-c", command])),
        RunAs::User => shell(command),
        RunAs::Root => elevator.run_elevated(&argv(["sh", "-c", command])),
    };

    match result {
        Ok(result) => {
            if !result.success() {
                tracing::debug!(command, code = result.code(), stderr = %result.stderr_trimmed(), "diagnostic exited non-zero");
            }
            result.stdout
        }
        Err(e) => format!("ERROR: {:#}", e),
    }
}

/// Run every diagnostic in order, framing each output in the log.
pub fn run_all(
    diagnostics: &[Diagnostic],
    identity: &Identity,
    elevator: &dyn Elevator,
    log: &mut RunLog,
) {
    for diagnostic in diagnostics {
        log.header(header(diagnostic.command, diagnostic.run_as, identity));
        let output = run(diagnostic.command, diagnostic.run_as, identity, elevator);
        log.line(output.trim_end());
    }
}
