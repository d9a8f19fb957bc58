//! Generation pipeline: staged execution with rollback.
//!
//! A generation runs through a fixed stage sequence with no backward
//! transitions: Validating, PreparingVariables, CreatingDirectories,
//! RenderingFiles, then the optional auxiliary stages (InitializingVcs,
//! CreatingEnvironment, RunningPostCommands, CommittingVcs), and Complete.
//!
//! Failure classification is the central design decision:
//!
//! - **Structural** failures (path validation, directory creation, file
//!   rendering, missing required variables) are fatal. The pipeline invokes
//!   every registered rollback handler in reverse registration order and
//!   returns a failed outcome. A panic during a structural stage also rolls
//!   back, then resumes unwinding with the original payload.
//! - **Auxiliary** failures (VCS init/commit, environment creation, post
//!   commands) are caught, accumulated on the outcome's error list, and the
//!   pipeline proceeds. A missing `git` binary must not destroy an
//!   otherwise-successful generation.
//!
//! Cooperative cancellation is observed at checkpoints: each progress-sink
//! invocation before a stage starts. Cancellation observed during the
//! structural stages rolls back created state; observed later, the finished
//! tree is kept and only the remaining auxiliary stages are abandoned.

pub mod vars;

use crate::error::{LatheError, Result};
use crate::paths::{self, ResolvedPath};
use crate::progress::{ProgressEvent, ProgressSink, safe_notify};
use crate::staging::{DirectoryCreator, FileCreator, RollbackReport};
use crate::template::{self, TemplateDescriptor, TemplateStore};
use crate::tools::{CommandRunner, EnvProvisioner, Vcs, VcsIdentity};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    PreparingVariables,
    CreatingDirectories,
    RenderingFiles,
    InitializingVcs,
    CreatingEnvironment,
    RunningPostCommands,
    CommittingVcs,
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::PreparingVariables => "preparing_variables",
            Stage::CreatingDirectories => "creating_directories",
            Stage::RenderingFiles => "rendering_files",
            Stage::InitializingVcs => "initializing_vcs",
            Stage::CreatingEnvironment => "creating_environment",
            Stage::RunningPostCommands => "running_post_commands",
            Stage::CommittingVcs => "committing_vcs",
            Stage::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// Cooperative cancellation flag shared between a submitter and a running
/// generation. This is the only state a submitting thread writes into a
/// running task, so it is a plain atomic flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed at the next checkpoint, if any.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Immutable per-run options.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Initialize a repository and commit the generated tree.
    pub create_vcs: bool,
    /// Create an isolated environment inside the target.
    pub create_env: bool,
    /// Environment directory name.
    pub env_name: String,
    /// Interpreter version requested from the environment tool.
    pub env_python_version: Option<String>,
    /// Run the template's post-generation commands.
    pub run_post_commands: bool,
    /// Commit identity for a freshly initialized repository.
    pub vcs_identity: Option<VcsIdentity>,
    /// Attach a plain-text failure digest to the outcome.
    pub enable_diagnostics: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            create_vcs: false,
            create_env: false,
            env_name: ".venv".to_string(),
            env_python_version: None,
            run_post_commands: false,
            vcs_identity: None,
            enable_diagnostics: false,
        }
    }
}

/// One generation invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Template id in the store.
    pub template_id: String,
    /// Raw target path (validated and normalized by the pipeline).
    pub target: String,
    /// Caller-supplied variables.
    pub variables: HashMap<String, String>,
    /// Per-run options.
    pub options: GenerationOptions,
    /// Validate everything, mutate nothing.
    pub dry_run: bool,
}

/// Structured result of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    /// Whether the structural stages succeeded.
    pub success: bool,
    /// Resolved target path.
    pub target_path: PathBuf,
    /// Files written, in creation order.
    pub files_created: Vec<PathBuf>,
    /// Structural error (on failure) plus accumulated auxiliary errors.
    pub errors: Vec<String>,
    /// Wall-clock duration of the run.
    #[serde(serialize_with = "serialize_duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    /// Whether a repository was initialized.
    pub vcs_initialized: bool,
    /// Whether an environment was created.
    pub env_created: bool,
    /// Tool that created the environment, when one was.
    pub env_tool: Option<String>,
    /// Post-generation commands that completed successfully.
    pub commands_run: usize,
    /// Optional failure digest; never affects `success`.
    pub diagnostic: Option<String>,
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

type RollbackHandler = Box<dyn FnMut() -> RollbackReport>;

/// Output of the structural phase, consumed by the auxiliary phase.
struct StructuralOutput {
    target: ResolvedPath,
    descriptor: TemplateDescriptor,
    variables: HashMap<String, String>,
    files_created: Vec<PathBuf>,
    warnings: Vec<String>,
}

/// The generation orchestrator.
///
/// Owns the template store and the external tool collaborators; one
/// pipeline instance serves any number of sequential or concurrent runs
/// (each run's ledgers and handler lists are call-local).
pub struct GenerationPipeline {
    store: TemplateStore,
    vcs: Box<dyn Vcs>,
    env: Box<dyn EnvProvisioner>,
    runner: Box<dyn CommandRunner>,
    command_timeout: Duration,
}

impl GenerationPipeline {
    /// Default timeout for a single post-generation command.
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

    /// Build a pipeline over a store and tool adapters.
    pub fn new(
        store: TemplateStore,
        vcs: Box<dyn Vcs>,
        env: Box<dyn EnvProvisioner>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            store,
            vcs,
            env,
            runner,
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run one generation to completion.
    ///
    /// Structural failures produce `Ok` with a failed outcome (`success =
    /// false`, non-empty errors) after rollback; auxiliary failures are
    /// accumulated on a successful outcome. The only `Err` this returns is
    /// [`LatheError::Cancelled`], when cancellation was observed at a
    /// checkpoint. Panics roll back created state, then resume unwinding.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();
        let mut handlers: Vec<RollbackHandler> = Vec::new();

        let structural = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.run_structural(request, sink, cancel, &mut handlers)
        }));

        let output = match structural {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                let rollback_failures = run_rollback(&mut handlers);
                if matches!(err, LatheError::Cancelled) {
                    return Err(LatheError::Cancelled);
                }
                let mut errors = vec![err.to_string()];
                errors.extend(rollback_failures);
                let diagnostic = request
                    .options
                    .enable_diagnostics
                    .then(|| diagnostic_digest(&errors, 0));
                return Ok(GenerationOutcome {
                    success: false,
                    target_path: PathBuf::from(&request.target),
                    files_created: Vec::new(),
                    errors,
                    duration: started.elapsed(),
                    vcs_initialized: false,
                    env_created: false,
                    env_tool: None,
                    commands_run: 0,
                    diagnostic,
                });
            }
            Err(panic) => {
                // Non-domain failure: roll back, then re-raise with the
                // original payload intact.
                run_rollback(&mut handlers);
                std::panic::resume_unwind(panic);
            }
        };

        let mut errors = output.warnings.clone();
        let mut vcs_initialized = false;
        let mut env_created = false;
        let mut env_tool = None;
        let mut commands_run = 0;

        if !request.dry_run {
            let options = &request.options;

            if options.create_vcs {
                checkpoint(Stage::InitializingVcs, &output.target.to_string(), sink, cancel)?;
                if !self.vcs.available() {
                    errors.push("vcs: tool is not available".to_string());
                } else {
                    match self
                        .vcs
                        .init(output.target.as_path(), options.vcs_identity.as_ref())
                    {
                        Ok(()) => vcs_initialized = true,
                        Err(e) => errors.push(e.to_string()),
                    }
                }
            }

            if options.create_env {
                checkpoint(Stage::CreatingEnvironment, &options.env_name, sink, cancel)?;
                match self.env.create(
                    output.target.as_path(),
                    &options.env_name,
                    options.env_python_version.as_deref(),
                ) {
                    Ok(tool) => {
                        env_created = true;
                        env_tool = Some(tool);
                    }
                    Err(e) => errors.push(e.to_string()),
                }
            }

            if options.run_post_commands && !output.descriptor.post_commands.is_empty() {
                checkpoint(
                    Stage::RunningPostCommands,
                    &format!("{} command(s)", output.descriptor.post_commands.len()),
                    sink,
                    cancel,
                )?;
                for command in &output.descriptor.post_commands {
                    match template::render(command, &output.variables) {
                        Err(e) => errors.push(format!("command {:?}: {}", command, e)),
                        Ok(line) => match self.runner.run(
                            &line,
                            output.target.as_path(),
                            self.command_timeout,
                        ) {
                            Ok(outcome) if outcome.is_success() => commands_run += 1,
                            Ok(outcome) if outcome.timed_out => {
                                errors.push(format!("command {:?} timed out", line));
                            }
                            Ok(outcome) => errors.push(format!(
                                "command {:?} failed (exit {:?}): {}",
                                line,
                                outcome.exit_code,
                                outcome.stderr.trim()
                            )),
                            Err(e) => errors.push(e.to_string()),
                        },
                    }
                }
            }

            if vcs_initialized {
                checkpoint(Stage::CommittingVcs, &output.target.to_string(), sink, cancel)?;
                if let Err(e) = self
                    .vcs
                    .commit(output.target.as_path(), "Initial project structure")
                {
                    errors.push(e.to_string());
                }
            }
        }

        // Terminal notification; not a cancellation point, the work is done.
        safe_notify(
            sink,
            &ProgressEvent {
                stage: Stage::Complete,
                message: format!("{} file(s)", output.files_created.len()),
            },
        );

        let diagnostic = (request.options.enable_diagnostics && !errors.is_empty())
            .then(|| diagnostic_digest(&errors, output.files_created.len()));

        Ok(GenerationOutcome {
            success: true,
            target_path: output.target.into_path_buf(),
            files_created: output.files_created,
            errors,
            duration: started.elapsed(),
            vcs_initialized,
            env_created,
            env_tool,
            commands_run,
            diagnostic,
        })
    }

    /// The structural phase: validation, variable preparation, staging.
    /// Everything here is fatal on error; the caller rolls back.
    fn run_structural(
        &self,
        request: &GenerationRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
        handlers: &mut Vec<RollbackHandler>,
    ) -> Result<StructuralOutput> {
        checkpoint(Stage::Validating, &request.template_id, sink, cancel)?;

        let descriptor = self.store.load(&request.template_id)?;
        descriptor.tree.validate()?;
        let raw_copy = template::build_globset(&descriptor.raw_copy)?;
        let target = validate_target(&request.target)?;

        checkpoint(Stage::PreparingVariables, &target.to_string(), sink, cancel)?;

        let project_name = request
            .variables
            .get("project_name")
            .cloned()
            .unwrap_or_else(|| derive_project_name(target.as_path()));
        let variables = vars::prepare_variables(
            &descriptor.variables,
            &request.variables,
            vars::generated_variables(&project_name, &target),
        )?;

        if request.dry_run {
            // Short-circuit to Complete, having still performed every
            // validation a live run would: tree walk, path composition,
            // source classification, in-memory renders.
            let mut dir_creator = DirectoryCreator::new();
            dir_creator.create_structure(&descriptor.tree, &target, true)?;
            let mut file_creator = FileCreator::new();
            file_creator.render_structure(
                &descriptor.tree,
                &descriptor.root,
                &target,
                &variables,
                &raw_copy,
                true,
            )?;
            return Ok(StructuralOutput {
                target,
                descriptor,
                variables,
                files_created: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let target = paths::ensure_directory(&target)?;

        checkpoint(Stage::CreatingDirectories, &target.to_string(), sink, cancel)?;
        let dir_creator = Rc::new(RefCell::new(DirectoryCreator::new()));
        // Registered up front: rolling back an empty ledger is a no-op, and
        // this way a partial create_structure is always covered.
        handlers.push(Box::new({
            let creator = dir_creator.clone();
            move || creator.borrow_mut().rollback()
        }));
        dir_creator
            .borrow_mut()
            .create_structure(&descriptor.tree, &target, false)?;

        checkpoint(Stage::RenderingFiles, &target.to_string(), sink, cancel)?;
        let file_creator = Rc::new(RefCell::new(FileCreator::new()));
        handlers.push(Box::new({
            let creator = file_creator.clone();
            move || creator.borrow_mut().rollback()
        }));
        file_creator.borrow_mut().render_structure(
            &descriptor.tree,
            &descriptor.root,
            &target,
            &variables,
            &raw_copy,
            false,
        )?;

        // Success: drain the ledgers and drop the handlers; from here on
        // nothing will undo the tree.
        let files_created: Vec<PathBuf> = file_creator
            .borrow_mut()
            .take_created()
            .into_iter()
            .map(ResolvedPath::into_path_buf)
            .collect();
        let warnings = file_creator.borrow().warnings().to_vec();
        dir_creator.borrow_mut().take_created();
        handlers.clear();

        Ok(StructuralOutput {
            target,
            descriptor,
            variables,
            files_created,
            warnings,
        })
    }
}

/// One checkpoint: notify the sink, then observe the cancellation flag.
fn checkpoint(
    stage: Stage,
    detail: &str,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<()> {
    safe_notify(
        sink,
        &ProgressEvent {
            stage,
            message: detail.to_string(),
        },
    );
    if cancel.is_cancelled() {
        return Err(LatheError::Cancelled);
    }
    Ok(())
}

/// Invoke handlers in reverse registration order, best-effort, returning
/// the collected failure messages.
fn run_rollback(handlers: &mut Vec<RollbackHandler>) -> Vec<String> {
    let mut failures = Vec::new();
    for handler in handlers.iter_mut().rev() {
        let report = handler();
        failures.extend(report.failures);
    }
    handlers.clear();
    failures
}

/// Validate the caller-supplied target path.
///
/// A target carrying a parent-directory segment is rejected outright with
/// `SecurityViolation` before any filesystem interaction: a generator target
/// is a destination, never a relative escape route.
fn validate_target(raw: &str) -> Result<ResolvedPath> {
    if Path::new(raw)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(LatheError::SecurityViolation(format!(
            "target '{}' contains a parent-directory segment",
            raw
        )));
    }
    let target = paths::normalize(raw)?;
    if target.as_path().exists() && !target.as_path().is_dir() {
        return Err(LatheError::StructuralFailure(format!(
            "target '{}' exists and is not a directory",
            target
        )));
    }
    Ok(target)
}

/// Project name derived from the final target component.
fn derive_project_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

/// Plain-text failure digest attached when diagnostics are enabled.
fn diagnostic_digest(errors: &[String], files_created: usize) -> String {
    let first = errors.first().map(String::as_str).unwrap_or("none");
    format!(
        "{} problem(s); first: {}; files created: {}",
        errors.len(),
        first,
        files_created
    )
}
