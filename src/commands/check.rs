//! Implementation of the `lathe check` command.

use crate::cli::CheckArgs;
use crate::commands::CommandContext;
use crate::error::{LatheError, Result};

pub(crate) fn cmd_check(ctx: &CommandContext, args: &CheckArgs) -> Result<()> {
    let problems = ctx.store.check(&args.template)?;

    if problems.is_empty() {
        println!("template '{}' is valid", args.template);
        return Ok(());
    }

    for problem in &problems {
        eprintln!("problem: {}", problem);
    }
    Err(LatheError::TemplateSyntax(format!(
        "{} problem(s) in template '{}'",
        problems.len(),
        args.template
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::TemplateFixture;

    fn context(fixture: &TemplateFixture) -> CommandContext {
        CommandContext {
            config: Config::default(),
            store: fixture.store(),
        }
    }

    #[test]
    fn test_check_valid_template() {
        let fixture = TemplateFixture::with_basic_template();
        let ctx = context(&fixture);
        let args = CheckArgs {
            template: "python-lib".to_string(),
        };
        assert!(cmd_check(&ctx, &args).is_ok());
    }

    #[test]
    fn test_check_broken_template_fails() {
        let fixture = TemplateFixture::with_broken_template();
        let ctx = context(&fixture);
        let args = CheckArgs {
            template: "broken".to_string(),
        };
        let err = cmd_check(&ctx, &args).unwrap_err();
        assert!(matches!(err, LatheError::TemplateSyntax(_)));
    }

    #[test]
    fn test_check_unknown_template_fails() {
        let fixture = TemplateFixture::new();
        let ctx = context(&fixture);
        let args = CheckArgs {
            template: "missing".to_string(),
        };
        let err = cmd_check(&ctx, &args).unwrap_err();
        assert!(matches!(err, LatheError::TemplateNotFound(_)));
    }
}
