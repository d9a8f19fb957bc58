//! Isolated environment provisioning.
//!
//! Creates a Python virtual environment inside the generated project, trying
//! a priority-ordered tool list with automatic fallback: `uv`, `virtualenv`,
//! `python3 -m venv`, `python -m venv`. The first tool that is present and
//! succeeds wins; if every candidate fails, the aggregated attempts surface
//! as a single `EnvError` (auxiliary).

use crate::error::{LatheError, Result};
use crate::tools::{probe, run_capture};
use std::path::Path;

/// Default tool priority, first match wins.
pub const DEFAULT_TOOL_PRIORITY: &[&str] = &["uv", "virtualenv", "python3", "python"];

/// Environment collaborator contract.
pub trait EnvProvisioner: Send + Sync {
    /// Create an environment named `name` under `path`. Returns the tool
    /// that was used.
    fn create(&self, path: &Path, name: &str, python_version: Option<&str>) -> Result<String>;
}

/// Subprocess-backed provisioner over a configurable tool priority list.
#[derive(Debug, Clone)]
pub struct PythonEnvProvisioner {
    priority: Vec<String>,
}

impl Default for PythonEnvProvisioner {
    fn default() -> Self {
        Self {
            priority: DEFAULT_TOOL_PRIORITY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PythonEnvProvisioner {
    /// Provisioner with the default tool priority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisioner with an explicit tool priority (config override).
    pub fn with_priority(priority: Vec<String>) -> Self {
        Self { priority }
    }

    /// Run one candidate tool. `env_dir` is the environment directory path
    /// as passed on the command line.
    fn try_tool(
        &self,
        tool: &str,
        cwd: &Path,
        env_dir: &str,
        python_version: Option<&str>,
    ) -> Result<()> {
        match tool {
            "uv" => {
                let mut args = vec!["venv", env_dir];
                let version_arg;
                if let Some(version) = python_version {
                    version_arg = format!("--python={}", version);
                    args.push(&version_arg);
                }
                run_capture("uv", &args, Some(cwd), LatheError::EnvError).map(|_| ())
            }
            "virtualenv" => {
                let mut args = vec![env_dir];
                let version_arg;
                if let Some(version) = python_version {
                    version_arg = format!("--python=python{}", version);
                    args.push(&version_arg);
                }
                run_capture("virtualenv", &args, Some(cwd), LatheError::EnvError).map(|_| ())
            }
            // Plain interpreters use the stdlib venv module; it cannot pick a
            // different interpreter version, so a requested version is only
            // honored by the tools above.
            interpreter => run_capture(
                interpreter,
                &["-m", "venv", env_dir],
                Some(cwd),
                LatheError::EnvError,
            )
            .map(|_| ()),
        }
    }
}

impl EnvProvisioner for PythonEnvProvisioner {
    fn create(&self, path: &Path, name: &str, python_version: Option<&str>) -> Result<String> {
        let mut attempts: Vec<String> = Vec::new();

        for tool in &self.priority {
            if !probe(tool) {
                attempts.push(format!("{}: not installed", tool));
                continue;
            }
            match self.try_tool(tool, path, name, python_version) {
                Ok(()) => return Ok(tool.clone()),
                Err(e) => attempts.push(format!("{}: {}", tool, e)),
            }
        }

        Err(LatheError::EnvError(format!(
            "no environment tool succeeded ({})",
            attempts.join("; ")
        )))
    }
}
