//! External tool adapters.
//!
//! The pipeline talks to version control, environment provisioning, and the
//! post-command runner through the narrow traits defined here; the concrete
//! adapters shell out to the real tools. All adapter failures are auxiliary
//! from the pipeline's point of view: they are accumulated on the outcome,
//! never allowed to destroy an otherwise-successful generation.

pub mod env;
pub mod exec;
pub mod vcs;

pub use env::{EnvProvisioner, PythonEnvProvisioner};
pub use exec::{AllowListRunner, CommandRunner, ExecOutcome};
pub use vcs::{GitVcs, Vcs, VcsIdentity};

use crate::error::{LatheError, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Captured output of a finished subprocess (trimmed).
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Standard output, trimmed.
    pub stdout: String,
    /// Standard error, trimmed.
    pub stderr: String,
}

impl ToolOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// The more informative of stderr/stdout, for error messages.
    pub fn message(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Run a tool to completion with captured output.
///
/// Returns `Ok` only for exit code 0; a non-zero exit becomes an error
/// built by `err` so each adapter keeps its own error variant.
pub(crate) fn run_capture(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    err: impl Fn(String) -> LatheError,
) -> Result<ToolOutput> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command
        .output()
        .map_err(|e| err(format!("failed to execute {}: {}", program, e)))?;

    let tool_output = ToolOutput::from_output(&output);
    if output.status.success() {
        Ok(tool_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        Err(err(format!(
            "{} {} failed (exit code {}): {}",
            program,
            args.first().unwrap_or(&""),
            exit_code,
            tool_output.message()
        )))
    }
}

/// Probe whether a tool responds to `--version`.
pub(crate) fn probe(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
