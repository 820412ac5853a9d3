//! Command execution and privilege escalation.
//!
//! Every external program the backup touches (`cp`, `find`, `cat`, `chown`,
//! diagnostic tools) goes through [`Cmd`], so stderr is always captured and
//! failures carry a readable message. Escalation is modelled as the
//! [`Elevator`] capability so the copier and catalog can be exercised
//! without real root access.

use anyhow::{bail, Context, Result};
use std::process::{Command, ExitStatus};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }

    /// Turn a non-zero exit into an error carrying stderr.
    pub fn ensure_success(self, what: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        let stderr = self.stderr_trimmed();
        if stderr.is_empty() {
            bail!("{} (exit code {})", what, self.code());
        }
        bail!("{} (exit code {}): {}", what, self.code(), stderr);
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        tracing::debug!(program = %self.program, args = ?self.args, "spawning");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if self.allow_fail {
            return Ok(result);
        }

        result.ensure_success(&format!("'{}' failed", self.program))
    }
}

/// Run a shell command via `sh -c`, tolerating a non-zero exit.
pub fn shell(command: &str) -> Result<CommandResult> {
    Cmd::new("sh").args(["-c", command]).allow_fail().run()
}

/// Check if a program exists in PATH, returning its full path.
pub fn which(program: &str) -> Option<String> {
    which::which(program)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

// =============================================================================
// Elevation
// =============================================================================

/// Capability to run a command with elevated privileges.
///
/// Returns the captured output even for non-zero exits; callers decide
/// whether the exit status matters. An `Err` means the command could not be
/// started at all.
pub trait Elevator {
    fn run_elevated(&self, argv: &[String]) -> Result<CommandResult>;

    /// Run elevated and fail on a non-zero exit.
    fn run_elevated_checked(&self, argv: &[String]) -> Result<CommandResult> {
        let what = format!("elevated '{}' failed", argv.join(" "));
        self.run_elevated(argv)?.ensure_success(&what)
    }
}

/// Elevation through `sudo` (or a configured equivalent such as `doas`).
///
/// When the process is already elevated the command runs directly.
#[derive(Debug, Clone)]
pub struct SudoElevator {
    program: String,
    already_elevated: bool,
}

impl SudoElevator {
    pub fn new(program: impl Into<String>, already_elevated: bool) -> Self {
        Self {
            program: program.into(),
            already_elevated,
        }
    }

    /// The argv that will actually be spawned for `argv`.
    pub fn command_line(&self, argv: &[String]) -> Vec<String> {
        let mut line = Vec::with_capacity(argv.len() + 1);
        if !self.already_elevated {
            line.push(self.program.clone());
        }
        line.extend(argv.iter().cloned());
        line
    }
}

impl Elevator for SudoElevator {
    fn run_elevated(&self, argv: &[String]) -> Result<CommandResult> {
        let line = self.command_line(argv);
        let Some((program, args)) = line.split_first() else {
            bail!("empty elevated command");
        };
        Cmd::new(program).args(args).allow_fail().run()
    }
}

/// Build an argv from string-ish parts.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts.into_iter().map(|s| s.as_ref().to_string()).collect()
}
