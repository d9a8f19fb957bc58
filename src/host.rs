//! Background execution host for generation runs.
//!
//! Wraps pipeline invocations as cancellable, observable tasks multiplexed
//! over a bounded worker pool. One generation runs start-to-terminal on a
//! single worker; the submitting thread never blocks on submission, only on
//! explicit result retrieval or shutdown.
//!
//! Cancellation is cooperative, not preemptive: [`Host::cancel`] sets the
//! task's flag, and the pipeline observes it at its checkpoints (each
//! progress-sink invocation, before a stage starts). A task that has not
//! started is prevented from starting; a task past its last checkpoint runs
//! to completion and reports its natural outcome. A long external tool call
//! with no intervening checkpoint cannot be interrupted mid-flight; that is
//! an accepted limitation of the checkpoint model.

use crate::error::{LatheError, Result};
use crate::pipeline::{CancelToken, GenerationOutcome, GenerationPipeline, GenerationRequest};
use crate::progress::{CollectingSink, ProgressEvent, ProgressSink, safe_notify};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, not yet picked up by a worker.
    Pending,
    /// Executing on a worker.
    Running,
    /// Finished with a successful outcome.
    Completed,
    /// Finished with a failed outcome, an error, or a panic.
    Failed,
    /// Cancellation was observed before or during execution.
    Cancelled,
}

impl TaskState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Terminal report retrieved for a task.
#[derive(Debug)]
pub struct TaskReport {
    /// Task id.
    pub id: String,
    /// Terminal state.
    pub state: TaskState,
    /// The generation outcome, when the pipeline produced one.
    pub outcome: Option<GenerationOutcome>,
    /// Error description for tasks that died without an outcome.
    pub error: Option<String>,
    /// Progress events accumulated up to termination.
    pub progress: Vec<ProgressEvent>,
}

struct TaskInner {
    state: TaskState,
    outcome: Option<GenerationOutcome>,
    error: Option<String>,
}

/// Per-task shared state. The cancellation token is the only field a
/// submitting thread writes while a worker runs the task.
struct TaskHandle {
    id: String,
    inner: Mutex<TaskInner>,
    done: Condvar,
    cancel: CancelToken,
    progress: CollectingSink,
}

impl TaskHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            inner: Mutex::new(TaskInner {
                state: TaskState::Pending,
                outcome: None,
                error: None,
            }),
            done: Condvar::new(),
            cancel: CancelToken::new(),
            progress: CollectingSink::new(),
        }
    }

    fn state(&self) -> TaskState {
        self.lock().state
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TaskInner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn finish(&self, state: TaskState, outcome: Option<GenerationOutcome>, error: Option<String>) {
        let mut inner = self.lock();
        inner.state = state;
        inner.outcome = outcome;
        inner.error = error;
        drop(inner);
        self.done.notify_all();
    }
}

/// Records progress into the task handle and forwards to a caller sink.
struct JobSink {
    task: Arc<TaskHandle>,
    external: Option<Arc<dyn ProgressSink>>,
}

impl ProgressSink for JobSink {
    fn notify(&self, event: &ProgressEvent) {
        self.task.progress.notify(event);
        if let Some(external) = &self.external {
            safe_notify(external.as_ref(), event);
        }
    }
}

struct Job {
    task: Arc<TaskHandle>,
    request: GenerationRequest,
    sink: Option<Arc<dyn ProgressSink>>,
}

/// Bounded worker pool plus task tracking table.
pub struct Host {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    tasks: Mutex<HashMap<String, Arc<TaskHandle>>>,
    next_id: AtomicU64,
}

/// Worker count: twice the hardware parallelism, clamped to [2, 8].
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
        .clamp(2, 8)
}

impl Host {
    /// Host with the default worker count.
    pub fn new(pipeline: GenerationPipeline) -> Self {
        Self::with_workers(pipeline, default_worker_count())
    }

    /// Host with an explicit worker count (minimum 1).
    pub fn with_workers(pipeline: GenerationPipeline, workers: usize) -> Self {
        let pipeline = Arc::new(pipeline);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let worker_handles = (0..workers.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                let pipeline = pipeline.clone();
                thread::spawn(move || worker_loop(&receiver, &pipeline))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: worker_handles,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Submit a generation; returns the assigned task id immediately.
    pub fn submit(&self, request: GenerationRequest) -> Result<String> {
        let id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.submit_inner(id.clone(), request, None)?;
        Ok(id)
    }

    /// Submit with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// `ConcurrencyError` when the id is already tracked.
    pub fn submit_with_id(&self, id: &str, request: GenerationRequest) -> Result<()> {
        self.submit_inner(id.to_string(), request, None)
    }

    /// Submit with a caller sink that streams progress as the task runs.
    pub fn submit_with_sink(
        &self,
        request: GenerationRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<String> {
        let id = format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.submit_inner(id.clone(), request, Some(sink))?;
        Ok(id)
    }

    fn submit_inner(
        &self,
        id: String,
        request: GenerationRequest,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            LatheError::ConcurrencyError("host is shut down".to_string())
        })?;

        let task = Arc::new(TaskHandle::new(id.clone()));
        {
            let mut tasks = self.lock_tasks();
            if tasks.contains_key(&id) {
                return Err(LatheError::ConcurrencyError(format!(
                    "duplicate task id '{}'",
                    id
                )));
            }
            tasks.insert(id.clone(), task.clone());
        }
        sender
            .send(Job {
                task,
                request,
                sink,
            })
            .map_err(|_| {
                self.lock_tasks().remove(&id);
                LatheError::ConcurrencyError("host is shut down".to_string())
            })?;
        Ok(())
    }

    /// Request cooperative cancellation of a task.
    ///
    /// Observed at the task's next checkpoint; "at most one checkpoint
    /// away", never instantaneous. A task that has not started will not
    /// start.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let task = self.find(id)?;
        task.cancel.cancel();
        Ok(())
    }

    /// Current lifecycle state of a task.
    pub fn state(&self, id: &str) -> Result<TaskState> {
        Ok(self.find(id)?.state())
    }

    /// Progress events accumulated so far for a task.
    pub fn progress(&self, id: &str) -> Result<Vec<ProgressEvent>> {
        Ok(self.find(id)?.progress.events())
    }

    /// Block until the task is terminal, then retrieve and evict it.
    ///
    /// # Errors
    ///
    /// * `ConcurrencyError` - unknown task, or `timeout` elapsed (the task
    ///   stays tracked and running).
    pub fn get_result(&self, id: &str, timeout: Option<Duration>) -> Result<TaskReport> {
        let report = self.wait_terminal(id, timeout)?;
        self.lock_tasks().remove(id);
        Ok(report)
    }

    /// Like [`Host::get_result`] but leaves the task tracked.
    pub fn get_result_retained(&self, id: &str, timeout: Option<Duration>) -> Result<TaskReport> {
        self.wait_terminal(id, timeout)
    }

    /// Evict every terminal task without individual retrieval. Returns the
    /// number evicted.
    pub fn sweep(&self) -> usize {
        let mut tasks = self.lock_tasks();
        let before = tasks.len();
        tasks.retain(|_, task| !task.state().is_terminal());
        before - tasks.len()
    }

    /// Number of tracked tasks (any state).
    pub fn tracked(&self) -> usize {
        self.lock_tasks().len()
    }

    /// Wait for all in-flight and queued tasks to reach a terminal state,
    /// then tear the pool down.
    pub fn shutdown(mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }

    /// Request cancellation of every tracked task and tear the pool down
    /// without waiting for checkpoints.
    ///
    /// Side effects a task performed up to its last observed checkpoint may
    /// remain on disk; this is a documented limitation of non-waiting
    /// shutdown, not a rollback guarantee.
    pub fn shutdown_now(mut self) {
        {
            let tasks = self.lock_tasks();
            for task in tasks.values() {
                task.cancel.cancel();
            }
        }
        self.sender.take();
        // Workers are detached, not joined; each in-flight task stops at its
        // next checkpoint.
        self.workers.clear();
    }

    fn wait_terminal(&self, id: &str, timeout: Option<Duration>) -> Result<TaskReport> {
        let task = self.find(id)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut inner = task.lock();
        while !inner.state.is_terminal() {
            match deadline {
                None => {
                    inner = task
                        .done
                        .wait(inner)
                        .unwrap_or_else(|poison| poison.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LatheError::ConcurrencyError(format!(
                            "timed out waiting for task '{}'",
                            id
                        )));
                    }
                    let (guard, _) = task
                        .done
                        .wait_timeout(inner, deadline - now)
                        .unwrap_or_else(|poison| poison.into_inner());
                    inner = guard;
                }
            }
        }

        Ok(TaskReport {
            id: task.id.clone(),
            state: inner.state,
            outcome: inner.outcome.clone(),
            error: inner.error.clone(),
            progress: task.progress.events(),
        })
    }

    fn find(&self, id: &str) -> Result<Arc<TaskHandle>> {
        self.lock_tasks()
            .get(id)
            .cloned()
            .ok_or_else(|| LatheError::ConcurrencyError(format!("task '{}' not found", id)))
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<TaskHandle>>> {
        self.tasks.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        // Matches waiting shutdown: let in-flight tasks reach terminal state.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(receiver: &Mutex<mpsc::Receiver<Job>>, pipeline: &GenerationPipeline) {
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(|poison| poison.into_inner());
            receiver.recv()
        };
        let Ok(job) = job else {
            // Channel closed and drained: the host is shutting down.
            return;
        };

        // Cancellation before start prevents the task from starting.
        if job.task.cancel.is_cancelled() {
            job.task.finish(TaskState::Cancelled, None, None);
            continue;
        }
        job.task.lock().state = TaskState::Running;

        let sink = JobSink {
            task: job.task.clone(),
            external: job.sink.clone(),
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pipeline.generate(&job.request, &sink, &job.task.cancel)
        }));

        match result {
            Ok(Ok(outcome)) => {
                let state = if outcome.success {
                    TaskState::Completed
                } else {
                    TaskState::Failed
                };
                job.task.finish(state, Some(outcome), None);
            }
            Ok(Err(LatheError::Cancelled)) => {
                job.task.finish(TaskState::Cancelled, None, None);
            }
            Ok(Err(err)) => {
                job.task.finish(TaskState::Failed, None, Some(err.to_string()));
            }
            Err(panic) => {
                job.task
                    .finish(TaskState::Failed, None, Some(panic_message(&panic)));
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("generation panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("generation panicked: {}", s)
    } else {
        "generation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::GenerationOptions;
    use crate::test_support::TemplateFixture;
    use crate::tools::{CommandRunner, EnvProvisioner, ExecOutcome, Vcs, VcsIdentity};
    use std::path::Path;

    struct NoopVcs;
    impl Vcs for NoopVcs {
        fn available(&self) -> bool {
            false
        }
        fn init(&self, _path: &Path, _identity: Option<&VcsIdentity>) -> Result<()> {
            Ok(())
        }
        fn commit(&self, _path: &Path, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NoopEnv;
    impl EnvProvisioner for NoopEnv {
        fn create(
            &self,
            _path: &Path,
            _name: &str,
            _python_version: Option<&str>,
        ) -> Result<String> {
            Ok("noop".to_string())
        }
    }

    /// Runner that sleeps, to hold a worker busy in cancellation tests.
    struct SlowRunner {
        delay: Duration,
    }
    impl CommandRunner for SlowRunner {
        fn run(&self, _command_line: &str, _cwd: &Path, _timeout: Duration) -> Result<ExecOutcome> {
            thread::sleep(self.delay);
            Ok(ExecOutcome {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                timed_out: false,
            })
        }
    }

    fn pipeline(fixture: &TemplateFixture, command_delay: Option<Duration>) -> GenerationPipeline {
        GenerationPipeline::new(
            fixture.store(),
            Box::new(NoopVcs),
            Box::new(NoopEnv),
            Box::new(SlowRunner {
                delay: command_delay.unwrap_or(Duration::ZERO),
            }),
        )
    }

    fn request(fixture: &TemplateFixture, target_name: &str) -> GenerationRequest {
        GenerationRequest {
            template_id: "python-lib".to_string(),
            target: fixture.target(target_name),
            variables: [("project_name".to_string(), target_name.to_string())]
                .into_iter()
                .collect(),
            options: GenerationOptions::default(),
            dry_run: false,
        }
    }

    /// A request whose post command keeps a worker busy for `delay`.
    fn slow_request(fixture: &TemplateFixture, target_name: &str) -> GenerationRequest {
        let mut request = request(fixture, target_name);
        request.options.run_post_commands = true;
        request
    }

    #[test]
    fn test_submit_completes_generation() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 2);

        let id = host.submit(request(&fixture, "demo")).unwrap();
        let report = host.get_result(&id, Some(Duration::from_secs(30))).unwrap();

        assert_eq!(report.state, TaskState::Completed);
        let outcome = report.outcome.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.files_created.len(), 2);
        assert!(Path::new(&fixture.target("demo")).join("src/__init__.py").is_file());
    }

    #[test]
    fn test_more_tasks_than_workers_all_complete() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 2);

        let ids: Vec<String> = (0..6)
            .map(|i| host.submit(request(&fixture, &format!("proj-{}", i))).unwrap())
            .collect();

        for (i, id) in ids.iter().enumerate() {
            let report = host.get_result(id, Some(Duration::from_secs(60))).unwrap();
            assert_eq!(report.state, TaskState::Completed, "task {} failed", id);
            let outcome = report.outcome.unwrap();
            // Each task's ledger covered exactly its own target subtree.
            assert_eq!(outcome.files_created.len(), 2);
            let target = fixture.target(&format!("proj-{}", i));
            assert!(outcome
                .files_created
                .iter()
                .all(|f| f.starts_with(&target)));
        }
    }

    #[test]
    fn test_failed_generation_reports_failed_state() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        let mut bad = request(&fixture, "demo");
        bad.template_id = "no-such-template".to_string();
        let id = host.submit(bad).unwrap();

        let report = host.get_result(&id, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(report.state, TaskState::Failed);
        let outcome = report.outcome.unwrap();
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("Template not found"));
    }

    #[test]
    fn test_duplicate_id_is_concurrency_error() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        host.submit_with_id("job-1", request(&fixture, "a")).unwrap();
        let err = host
            .submit_with_id("job-1", request(&fixture, "b"))
            .unwrap_err();
        assert!(matches!(err, LatheError::ConcurrencyError(_)));
    }

    #[test]
    fn test_unknown_task_is_concurrency_error() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        assert!(matches!(
            host.get_result("ghost", None),
            Err(LatheError::ConcurrencyError(_))
        ));
        assert!(matches!(
            host.cancel("ghost"),
            Err(LatheError::ConcurrencyError(_))
        ));
        assert!(matches!(
            host.state("ghost"),
            Err(LatheError::ConcurrencyError(_))
        ));
    }

    #[test]
    fn test_get_result_evicts_by_default() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        let id = host.submit(request(&fixture, "demo")).unwrap();
        host.get_result(&id, Some(Duration::from_secs(30))).unwrap();

        let err = host.get_result(&id, None).unwrap_err();
        assert!(matches!(err, LatheError::ConcurrencyError(_)));
        assert_eq!(host.tracked(), 0);
    }

    #[test]
    fn test_get_result_retained_keeps_task() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        let id = host.submit(request(&fixture, "demo")).unwrap();
        host.get_result_retained(&id, Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(host.tracked(), 1);

        // Still retrievable afterwards.
        let report = host.get_result(&id, None).unwrap();
        assert_eq!(report.state, TaskState::Completed);
        assert_eq!(host.tracked(), 0);
    }

    #[test]
    fn test_result_wait_timeout_leaves_task_tracked() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, Some(Duration::from_millis(500))), 1);

        let id = host.submit(slow_request(&fixture, "slow")).unwrap();
        let err = host
            .get_result(&id, Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, LatheError::ConcurrencyError(_)));
        assert_eq!(host.tracked(), 1);

        // The task keeps running and finishes normally.
        let report = host.get_result(&id, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(report.state, TaskState::Completed);
    }

    #[test]
    fn test_cancel_queued_task_has_no_side_effects() {
        let fixture = TemplateFixture::with_basic_template();
        // One worker, held busy by a slow task, so the second task stays
        // queued until after it is cancelled.
        let host = Host::with_workers(pipeline(&fixture, Some(Duration::from_millis(300))), 1);

        let blocker = host.submit(slow_request(&fixture, "blocker")).unwrap();
        let victim = host.submit(request(&fixture, "victim")).unwrap();
        host.cancel(&victim).unwrap();

        let report = host
            .get_result(&victim, Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(report.state, TaskState::Cancelled);
        assert!(report.outcome.is_none());
        assert!(report.progress.is_empty());
        assert!(!Path::new(&fixture.target("victim")).exists());

        let blocker_report = host
            .get_result(&blocker, Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(blocker_report.state, TaskState::Completed);
    }

    #[test]
    fn test_cancel_past_last_checkpoint_completes_naturally() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, Some(Duration::from_millis(300))), 1);

        // The slow post command is past the RunningPostCommands checkpoint;
        // cancelling while it runs must not flip the result to Cancelled.
        let id = host.submit(slow_request(&fixture, "finishing")).unwrap();

        // Wait until the task is actually running its post command.
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let events = host.progress(&id).unwrap();
            if events
                .iter()
                .any(|e| e.stage == crate::pipeline::Stage::RunningPostCommands)
            {
                break;
            }
            assert!(Instant::now() < deadline, "task never reached post commands");
            thread::sleep(Duration::from_millis(10));
        }
        host.cancel(&id).unwrap();

        let report = host.get_result(&id, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(report.state, TaskState::Completed);
        assert!(report.outcome.unwrap().success);
    }

    #[test]
    fn test_progress_events_accumulate() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 1);

        let id = host.submit(request(&fixture, "demo")).unwrap();
        let report = host.get_result(&id, Some(Duration::from_secs(30))).unwrap();

        let stages: Vec<String> = report.progress.iter().map(|e| e.stage.to_string()).collect();
        assert_eq!(stages.first().map(String::as_str), Some("validating"));
        assert_eq!(stages.last().map(String::as_str), Some("complete"));
    }

    #[test]
    fn test_sweep_evicts_terminal_tasks() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 2);

        let a = host.submit(request(&fixture, "a")).unwrap();
        let b = host.submit(request(&fixture, "b")).unwrap();
        host.get_result_retained(&a, Some(Duration::from_secs(30)))
            .unwrap();
        host.get_result_retained(&b, Some(Duration::from_secs(30)))
            .unwrap();

        assert_eq!(host.tracked(), 2);
        assert_eq!(host.sweep(), 2);
        assert_eq!(host.tracked(), 0);
    }

    #[test]
    fn test_shutdown_waits_for_in_flight_tasks() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, None), 2);

        for i in 0..4 {
            host.submit(request(&fixture, &format!("wait-{}", i))).unwrap();
        }
        host.shutdown();

        for i in 0..4 {
            let target = fixture.target(&format!("wait-{}", i));
            assert!(
                Path::new(&target).join("README.md").is_file(),
                "task {} did not finish before shutdown returned",
                i
            );
        }
    }

    #[test]
    fn test_shutdown_now_cancels_queued_tasks() {
        let fixture = TemplateFixture::with_basic_template();
        let host = Host::with_workers(pipeline(&fixture, Some(Duration::from_millis(200))), 1);

        // The blocker occupies the only worker; the victim sits in the queue.
        host.submit(slow_request(&fixture, "blocker")).unwrap();
        host.submit(request(&fixture, "victim")).unwrap();
        host.shutdown_now();

        // Non-waiting shutdown: give the detached worker time to observe the
        // cancellation. The queued victim must never start.
        thread::sleep(Duration::from_secs(1));
        assert!(!Path::new(&fixture.target("victim")).exists());
    }

    #[test]
    fn test_default_worker_count_is_clamped() {
        let count = default_worker_count();
        assert!((2..=8).contains(&count));
    }
}
