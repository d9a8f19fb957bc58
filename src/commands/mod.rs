//! Command dispatch for the lathe CLI.
//!
//! Each subcommand handler is thin: it assembles the library components
//! (config, store, pipeline, host) and formats results for the terminal.

mod check;
mod generate;
mod templates;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::Result;
use crate::paths;
use crate::template::TemplateStore;

/// Default config filename looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lathe.yaml";

/// Resolved invocation context shared by all commands.
pub(crate) struct CommandContext {
    pub config: Config,
    pub store: TemplateStore,
}

impl CommandContext {
    /// Resolve config and template store from CLI globals.
    pub(crate) fn resolve(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(DEFAULT_CONFIG_FILE)?,
        };

        let root_raw = cli
            .templates_root
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.templates_root.clone());
        let root = paths::normalize(&root_raw)?;

        Ok(Self {
            config,
            store: TemplateStore::new(root),
        })
    }
}

/// Dispatch a parsed CLI invocation to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let ctx = CommandContext::resolve(&cli)?;
    match cli.command {
        Command::Generate(args) => generate::cmd_generate(&ctx, args),
        Command::Templates => templates::cmd_templates(&ctx),
        Command::Check(args) => check::cmd_check(&ctx, &args),
    }
}
