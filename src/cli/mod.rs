//! CLI argument parsing for lathe.
//!
//! Uses clap derive macros for declarative argument definitions. This module
//! defines the command structure; actual implementations are in the
//! `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lathe: transactional project scaffolding.
///
/// Renders a template into a fresh project tree with all-or-nothing
/// filesystem effects: a failure at any stage rolls the tree back, never
/// leaving a partial project behind.
#[derive(Parser, Debug)]
#[command(name = "lathe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ./lathe.yaml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Templates root, overriding the config.
    #[arg(long, global = true, value_name = "DIR")]
    pub templates_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for lathe.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a project from a template.
    ///
    /// Validates the target, creates the directory structure, renders the
    /// template files, and optionally initializes version control, creates
    /// an environment, and runs post-generation commands.
    Generate(GenerateArgs),

    /// List templates under the templates root.
    Templates,

    /// Validate a template definition without generating anything.
    ///
    /// Reports every problem found: invalid entry names, missing sources,
    /// bad variable declarations, unparseable post commands.
    Check(CheckArgs),
}

/// Arguments for the `generate` command.
#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Template id.
    pub template: String,

    /// Target directory for the new project.
    pub target: String,

    /// Template variable, repeatable (KEY=VALUE).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Validate everything, mutate nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Initialize a repository and commit the generated tree.
    #[arg(long)]
    pub vcs: bool,

    /// Create an isolated environment inside the target.
    #[arg(long)]
    pub env: bool,

    /// Environment directory name.
    #[arg(long, default_value = ".venv", value_name = "NAME")]
    pub env_name: String,

    /// Interpreter version for the environment tool.
    #[arg(long, value_name = "VERSION")]
    pub python: Option<String>,

    /// Run the template's post-generation commands.
    #[arg(long)]
    pub run_commands: bool,

    /// Attach a failure digest to the outcome.
    #[arg(long)]
    pub diagnostics: bool,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,

    /// Maximum seconds to wait for the generation to finish.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Append NDJSON progress events to this file.
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,
}

/// Arguments for the `check` command.
#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Template id to validate.
    pub template: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "lathe",
            "generate",
            "python-lib",
            "/tmp/out/demo",
            "--var",
            "project_name=demo",
            "--var",
            "license=MIT",
            "--vcs",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.template, "python-lib");
                assert_eq!(args.target, "/tmp/out/demo");
                assert_eq!(args.vars, vec!["project_name=demo", "license=MIT"]);
                assert!(args.vcs);
                assert!(args.dry_run);
                assert!(!args.env);
                assert_eq!(args.env_name, ".venv");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_templates_with_global_root() {
        let cli =
            Cli::try_parse_from(["lathe", "templates", "--templates-root", "/srv/templates"])
                .unwrap();
        assert_eq!(
            cli.templates_root,
            Some(PathBuf::from("/srv/templates"))
        );
        assert!(matches!(cli.command, Command::Templates));
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["lathe", "check", "python-lib"]).unwrap();
        match cli.command {
            Command::Check(args) => assert_eq!(args.template, "python-lib"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_requires_template_and_target() {
        assert!(Cli::try_parse_from(["lathe", "generate", "only-template"]).is_err());
    }
}
