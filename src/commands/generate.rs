//! Implementation of the `lathe generate` command.
//!
//! Assembles the pipeline with the real tool adapters, submits the
//! generation to the background host, waits for the result (optionally with
//! a timeout), and formats the outcome for the terminal or as JSON.

use crate::cli::GenerateArgs;
use crate::commands::CommandContext;
use crate::error::{LatheError, Result};
use crate::host::{Host, TaskState, default_worker_count};
use crate::pipeline::{
    GenerationOptions, GenerationOutcome, GenerationPipeline, GenerationRequest,
};
use crate::progress::EventLogSink;
use crate::tools::{AllowListRunner, GitVcs, PythonEnvProvisioner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn cmd_generate(ctx: &CommandContext, args: GenerateArgs) -> Result<()> {
    let variables = parse_vars(&args.vars)?;

    let options = GenerationOptions {
        create_vcs: args.vcs,
        create_env: args.env,
        env_name: args.env_name.clone(),
        env_python_version: args.python.clone(),
        run_post_commands: args.run_commands,
        vcs_identity: ctx.config.vcs_identity(),
        enable_diagnostics: args.diagnostics,
    };
    let request = GenerationRequest {
        template_id: args.template.clone(),
        target: args.target.clone(),
        variables,
        options,
        dry_run: args.dry_run,
    };

    let runner = AllowListRunner::new(
        ctx.config.allowed_commands.clone(),
        &ctx.config.deny_patterns,
    )?;
    let pipeline = GenerationPipeline::new(
        ctx.store.clone(),
        Box::new(GitVcs::new()),
        Box::new(PythonEnvProvisioner::with_priority(
            ctx.config.env_tools.clone(),
        )),
        Box::new(runner),
    )
    .with_command_timeout(Duration::from_secs(ctx.config.command_timeout_secs));

    let host = Host::with_workers(
        pipeline,
        ctx.config.workers.unwrap_or_else(default_worker_count),
    );

    let log_path = args
        .log
        .clone()
        .or_else(|| ctx.config.event_log.as_ref().map(PathBuf::from));
    let id = match log_path {
        Some(path) => host.submit_with_sink(request, Arc::new(EventLogSink::new(path)))?,
        None => host.submit(request)?,
    };

    let timeout = args.timeout_secs.map(Duration::from_secs);
    let report = match host.get_result(&id, timeout) {
        Ok(report) => {
            host.shutdown();
            report
        }
        Err(err) => {
            // Result-wait timeout: cancel what we can and exit without
            // waiting for checkpoints.
            host.shutdown_now();
            return Err(err);
        }
    };

    match report.state {
        TaskState::Completed => {
            let outcome = report.outcome.expect("completed task carries an outcome");
            print_outcome(&outcome, &args)?;
            Ok(())
        }
        TaskState::Failed => {
            if let Some(outcome) = report.outcome {
                print_outcome(&outcome, &args)?;
                Err(LatheError::StructuralFailure(
                    outcome
                        .errors
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "generation failed".to_string()),
                ))
            } else {
                Err(LatheError::UserError(
                    report
                        .error
                        .unwrap_or_else(|| "generation failed".to_string()),
                ))
            }
        }
        TaskState::Cancelled => Err(LatheError::Cancelled),
        state => Err(LatheError::ConcurrencyError(format!(
            "task ended in non-terminal state {:?}",
            state
        ))),
    }
}

/// Parse repeated `KEY=VALUE` arguments.
fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(LatheError::UserError(format!(
                "invalid --var '{}': expected KEY=VALUE",
                pair
            )));
        };
        if key.trim().is_empty() {
            return Err(LatheError::UserError(format!(
                "invalid --var '{}': empty key",
                pair
            )));
        }
        vars.insert(key.trim().to_string(), value.to_string());
    }
    Ok(vars)
}

fn print_outcome(outcome: &GenerationOutcome, args: &GenerateArgs) -> Result<()> {
    if args.json {
        let json = serde_json::to_string_pretty(outcome).map_err(|e| {
            LatheError::UserError(format!("failed to serialize outcome: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    if outcome.success {
        if args.dry_run {
            println!("dry run passed: {}", outcome.target_path.display());
        } else {
            println!(
                "generated {} ({} file(s), {} ms)",
                outcome.target_path.display(),
                outcome.files_created.len(),
                outcome.duration.as_millis()
            );
        }
        if outcome.vcs_initialized {
            println!("  vcs: initialized");
        }
        if let Some(tool) = &outcome.env_tool {
            println!("  env: created with {}", tool);
        }
        if outcome.commands_run > 0 {
            println!("  commands: {} run", outcome.commands_run);
        }
        for warning in &outcome.errors {
            eprintln!("  warning: {}", warning);
        }
    } else {
        eprintln!("generation failed: {}", outcome.target_path.display());
        for error in &outcome.errors {
            eprintln!("  error: {}", error);
        }
    }
    if let Some(diagnostic) = &outcome.diagnostic {
        eprintln!("  diagnostic: {}", diagnostic);
    }
    Ok(())
}
