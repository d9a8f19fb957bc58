//! Git adapter.
//!
//! Thin wrapper around the `git` binary with captured stdout/stderr and
//! structured errors. All VCS operations the pipeline performs go through
//! this module; failures surface as `VcsError` and are always auxiliary.

use crate::error::{LatheError, Result};
use crate::tools::{ToolOutput, probe, run_capture};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Commit identity applied to a freshly initialized repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsIdentity {
    /// `user.name` value.
    pub name: String,
    /// `user.email` value.
    pub email: String,
}

/// Version-control collaborator contract.
pub trait Vcs: Send + Sync {
    /// Whether the underlying tool is installed and responding.
    fn available(&self) -> bool;

    /// Initialize a repository at `path`, optionally configuring a local
    /// commit identity.
    fn init(&self, path: &Path, identity: Option<&VcsIdentity>) -> Result<()>;

    /// Stage everything under `path` and create a commit.
    fn commit(&self, path: &Path, message: &str) -> Result<()>;
}

/// The real git adapter.
#[derive(Debug, Default)]
pub struct GitVcs;

impl GitVcs {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<ToolOutput> {
    run_capture("git", args, Some(cwd), LatheError::VcsError)
}

impl Vcs for GitVcs {
    fn available(&self) -> bool {
        probe("git")
    }

    fn init(&self, path: &Path, identity: Option<&VcsIdentity>) -> Result<()> {
        run_git(path, &["init"])?;
        if let Some(identity) = identity {
            run_git(path, &["config", "user.name", &identity.name])?;
            run_git(path, &["config", "user.email", &identity.email])?;
        }
        Ok(())
    }

    fn commit(&self, path: &Path, message: &str) -> Result<()> {
        run_git(path, &["add", "-A"])?;
        run_git(path, &["commit", "-m", message])?;
        Ok(())
    }
}
