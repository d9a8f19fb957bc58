//! Allow-listed post-generation command runner.
//!
//! Commands declared by a template run through two gates before anything is
//! spawned: the executable name must be on the allow-list, and no argument
//! may carry a shell metacharacter or match a deny pattern. Validation
//! failures are `SecurityViolation`, distinct from a runtime failure of the
//! command itself (non-zero exit, timeout), which is reported in the
//! [`ExecOutcome`].
//!
//! Commands are executed directly, never through a shell; the metacharacter
//! deny rules exist so a template cannot even try.

use crate::error::{LatheError, Result};
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Shell metacharacters rejected anywhere in a command line.
const METACHARACTERS: &[char] = &[';', '&', '|', '<', '>', '`', '$', '\n'];

/// Default executable allow-list for post-generation commands.
pub const DEFAULT_ALLOWED: &[&str] = &[
    "git", "python", "python3", "pip", "pip3", "uv", "cargo", "npm", "make", "pre-commit",
];

/// Default deny patterns matched against each argument.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[r"^-c$", r"^--?exec(=|$)", r"^--eval(=|$)"];

/// Result of a finished (or killed) post-generation command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Exit code, `None` when the process was killed.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process was killed on timeout.
    pub timed_out: bool,
}

impl ExecOutcome {
    /// True for a clean zero exit within the timeout.
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Command-exec collaborator contract.
pub trait CommandRunner: Send + Sync {
    /// Validate and run one command line in `cwd` with a hard timeout.
    fn run(&self, command_line: &str, cwd: &Path, timeout: Duration) -> Result<ExecOutcome>;
}

/// Runner enforcing the allow-list/deny-pattern policy.
#[derive(Debug)]
pub struct AllowListRunner {
    allowed: Vec<String>,
    deny_patterns: Vec<Regex>,
}

impl AllowListRunner {
    /// Build a runner from an executable allow-list and deny-pattern regexes.
    ///
    /// # Errors
    ///
    /// `UserError` if a deny pattern is not a valid regex (these come from
    /// configuration, so the message points at the pattern).
    pub fn new(allowed: Vec<String>, deny_patterns: &[String]) -> Result<Self> {
        let deny_patterns = deny_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    LatheError::UserError(format!("invalid deny pattern {:?}: {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            allowed,
            deny_patterns,
        })
    }

    /// Runner with the built-in defaults.
    pub fn with_defaults() -> Self {
        let deny: Vec<String> = DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()).collect();
        Self::new(
            DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect(),
            &deny,
        )
        .expect("built-in deny patterns are valid")
    }

    /// Parse and validate a command line without executing it.
    ///
    /// Returns the argv on success.
    pub fn validate(&self, command_line: &str) -> Result<Vec<String>> {
        if let Some(bad) = command_line.chars().find(|c| METACHARACTERS.contains(c)) {
            return Err(LatheError::SecurityViolation(format!(
                "command {:?} contains shell metacharacter {:?}",
                command_line, bad
            )));
        }

        let args = shell_words::split(command_line).map_err(|e| {
            LatheError::SecurityViolation(format!(
                "command {:?} fails to parse: {}",
                command_line, e
            ))
        })?;
        if args.is_empty() {
            return Err(LatheError::SecurityViolation(
                "command is empty".to_string(),
            ));
        }

        // The executable is matched by basename so templates cannot smuggle
        // an arbitrary binary in via an absolute path.
        let program = Path::new(&args[0])
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&args[0]);
        if args[0] != program {
            return Err(LatheError::SecurityViolation(format!(
                "command executable {:?} must be a bare name, not a path",
                args[0]
            )));
        }
        if !self.allowed.iter().any(|a| a == program) {
            return Err(LatheError::SecurityViolation(format!(
                "executable {:?} is not on the allow-list",
                program
            )));
        }

        for arg in &args[1..] {
            if let Some(pattern) = self.deny_patterns.iter().find(|p| p.is_match(arg)) {
                return Err(LatheError::SecurityViolation(format!(
                    "argument {:?} matches deny pattern {:?}",
                    arg,
                    pattern.as_str()
                )));
            }
        }

        Ok(args)
    }
}

impl CommandRunner for AllowListRunner {
    fn run(&self, command_line: &str, cwd: &Path, timeout: Duration) -> Result<ExecOutcome> {
        let args = self.validate(command_line)?;

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                LatheError::UserError(format!(
                    "failed to execute {:?}: {} (is it installed?)",
                    args[0], e
                ))
            })?;

        // Drain pipes on reader threads so a chatty command cannot deadlock
        // against a full pipe buffer while we poll for exit.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        Ok(ExecOutcome {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }
}

/// Collect a pipe to a string on a background thread.
fn spawn_reader(
    pipe: Option<impl Read + Send + 'static>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    })
}

/// Wait for a child process with timeout. Returns (exit_code, timed_out).
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status.code(), false)),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok((None, true));
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(LatheError::UserError(format!(
                    "failed to check process status: {}",
                    e
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner_with(allowed: &[&str]) -> AllowListRunner {
        let deny: Vec<String> = DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()).collect();
        AllowListRunner::new(allowed.iter().map(|s| s.to_string()).collect(), &deny).unwrap()
    }

    #[test]
    fn test_validate_accepts_allowed_command() {
        let runner = runner_with(&["git"]);
        let args = runner.validate("git status --porcelain").unwrap();
        assert_eq!(args, vec!["git", "status", "--porcelain"]);
    }

    #[test]
    fn test_validate_rejects_unlisted_executable() {
        let runner = runner_with(&["git"]);
        let err = runner.validate("rm -rf /").unwrap_err();
        assert!(matches!(err, LatheError::SecurityViolation(_)));
    }

    #[test]
    fn test_validate_rejects_metacharacters() {
        let runner = runner_with(&["git"]);
        for line in [
            "git status; rm -rf /",
            "git status && ls",
            "git status | tee log",
            "git status > out",
            "git log `whoami`",
            "git log $HOME",
        ] {
            let err = runner.validate(line).unwrap_err();
            assert!(
                matches!(err, LatheError::SecurityViolation(_)),
                "{:?} must be rejected",
                line
            );
        }
    }

    #[test]
    fn test_validate_rejects_path_executable() {
        let runner = runner_with(&["git"]);
        let err = runner.validate("/usr/bin/git status").unwrap_err();
        assert!(matches!(err, LatheError::SecurityViolation(_)));
    }

    #[test]
    fn test_validate_rejects_deny_pattern_argument() {
        let runner = runner_with(&["python", "git"]);
        for line in ["python -c print(1)", "git --exec=evil log", "python --eval x"] {
            let err = runner.validate(line).unwrap_err();
            assert!(
                matches!(err, LatheError::SecurityViolation(_)),
                "{:?} must be rejected",
                line
            );
        }
    }

    #[test]
    fn test_validate_rejects_unparseable_and_empty() {
        let runner = runner_with(&["git"]);
        assert!(matches!(
            runner.validate("git 'unterminated"),
            Err(LatheError::SecurityViolation(_))
        ));
        assert!(matches!(
            runner.validate("   "),
            Err(LatheError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_run_captures_output() {
        let runner = runner_with(&["git"]);
        let temp = TempDir::new().unwrap();

        let outcome = runner
            .run("git --version", temp.path(), Duration::from_secs(10))
            .unwrap();
        assert!(outcome.is_success());
        assert!(outcome.stdout.contains("git version"));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn test_run_reports_nonzero_exit() {
        let runner = runner_with(&["git"]);
        let temp = TempDir::new().unwrap();

        // `git not-a-command` exits non-zero without needing a repository.
        let outcome = runner
            .run("git not-a-command", temp.path(), Duration::from_secs(10))
            .unwrap();
        assert!(!outcome.is_success());
        assert_ne!(outcome.exit_code, Some(0));
    }

    #[test]
    fn test_run_refuses_before_spawn() {
        let runner = runner_with(&["git"]);
        let temp = TempDir::new().unwrap();

        let err = runner
            .run("nonexistent-tool --version", temp.path(), Duration::from_secs(10))
            .unwrap_err();
        // Validation failure, not a spawn failure.
        assert!(matches!(err, LatheError::SecurityViolation(_)));
    }

    #[test]
    fn test_default_runner_policy() {
        let runner = AllowListRunner::with_defaults();
        assert!(runner.validate("git init").is_ok());
        assert!(runner.validate("pip install -e .").is_ok());
        assert!(matches!(
            runner.validate("bash script.sh"),
            Err(LatheError::SecurityViolation(_))
        ));
        assert!(matches!(
            runner.validate("python -c os.system('x')"),
            Err(LatheError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_invalid_deny_pattern_is_user_error() {
        let err =
            AllowListRunner::new(vec!["git".to_string()], &["[unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, LatheError::UserError(_)));
    }

    #[test]
    fn test_exec_outcome_success() {
        let outcome = ExecOutcome {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        };
        assert!(outcome.is_success());

        let outcome = ExecOutcome {
            exit_code: Some(1),
            ..outcome
        };
        assert!(!outcome.is_success());

        let outcome = ExecOutcome {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        };
        assert!(!outcome.is_success());
    }
}
