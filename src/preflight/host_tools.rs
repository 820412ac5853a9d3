//! Host tool availability checks.

use crate::diagnostics::DEFAULT_DIAGNOSTICS;
use crate::identity::Identity;
use crate::process;

use super::types::CheckResult;

/// Tools the copier shells out to when escalating.
const ELEVATED_COPY_TOOLS: &[&str] = &["cp", "find", "chown", "cat", "test"];

pub fn check_host_tools(identity: &Identity, elevate_with: &str) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if identity.elevated {
        results.push(CheckResult::pass_with(elevate_with, "not needed, already root"));
    } else {
        results.push(check_tool_exists(
            elevate_with,
            "Required to collect files owned by other users",
            true,
        ));
    }

    for tool in ELEVATED_COPY_TOOLS {
        results.push(check_tool_exists(tool, "Required for elevated copies", true));
    }

    if identity.elevated {
        results.push(check_tool_exists("su", "Required to run user diagnostics", false));
    }

    for diagnostic in DEFAULT_DIAGNOSTICS {
        let tool = program_of(diagnostic.command);
        let purpose = format!("'{}' output will be an error block", diagnostic.command);
        results.push(check_tool_exists(tool, &purpose, false));
    }

    results
}

/// First word of a shell command.
fn program_of(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

fn check_tool_exists(tool: &str, purpose: &str, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path),
        None => {
            let msg = format!("Not found in PATH. {}", purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
