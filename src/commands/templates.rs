//! Implementation of the `lathe templates` command.

use crate::commands::CommandContext;
use crate::error::Result;

pub(crate) fn cmd_templates(ctx: &CommandContext) -> Result<()> {
    let summaries = ctx.store.list()?;

    if summaries.is_empty() {
        println!("no templates found in '{}'", ctx.store.root());
        return Ok(());
    }

    for summary in summaries {
        if summary.description.is_empty() {
            println!("{}", summary.id);
        } else {
            println!("{:<24} {}", summary.id, summary.description);
        }
    }
    Ok(())
}
