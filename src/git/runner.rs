//! Resilient git command execution.
//!
//! Every external git command in warden goes through [`GitRunner`]: one place
//! that bounds execution time, captures output, classifies failures into the
//! closed taxonomy, retries transient lock contention, and reports every
//! attempt to the audit sink.
//!
//! The wait loop polls `try_wait` and kills the child on deadline; output is
//! drained on reader threads so a chatty command can never deadlock the loop
//! on a full pipe.

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config::Config;
use crate::error::{GitFailure, GitResult};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }

    /// Returns stdout lines as a vector.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Per-call execution options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall-clock bound; the child is killed when it expires.
    pub timeout: Duration,
    /// Retry lock-held failures with backoff. Only safe for operations that
    /// have not started when the lock refuses them (add, commit, branch).
    pub retry_on_lock: bool,
    /// Trace id attached to the audit record of each attempt.
    pub trace: Option<String>,
}

impl RunOptions {
    pub fn with_lock_retry(mut self) -> Self {
        self.retry_on_lock = true;
        self
    }

    pub fn with_trace(mut self, trace: Option<&str>) -> Self {
        self.trace = trace.map(str::to_string);
        self
    }
}

/// Executes git commands for one repository.
///
/// Holds the repository root, the configured timeout and retry policy, and
/// the audit sink every attempt is reported to.
pub struct GitRunner<'a> {
    repo_root: PathBuf,
    timeout: Duration,
    lock_retry_limit: u32,
    lock_retry_base: Duration,
    audit: &'a dyn AuditSink,
}

impl<'a> GitRunner<'a> {
    pub fn new(repo_root: impl Into<PathBuf>, config: &Config, audit: &'a dyn AuditSink) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout: config.command_timeout(),
            lock_retry_limit: config.lock_retry_limit,
            lock_retry_base: config.lock_retry_base(),
            audit,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Default options: configured timeout, no retry, no trace.
    pub fn options(&self) -> RunOptions {
        RunOptions {
            timeout: self.timeout,
            retry_on_lock: false,
            trace: None,
        }
    }

    /// Run a git command with default options.
    pub fn run(&self, args: &[&str]) -> GitResult<GitOutput> {
        self.run_with(args, &self.options())
    }

    /// Run a git command with explicit options.
    ///
    /// When `retry_on_lock` is set, a lock-held failure is retried up to the
    /// configured limit with exponential backoff (`base * 2^(attempt-1)`),
    /// each attempt under the same timeout. Every attempt is reported to the
    /// audit sink whether it succeeds or not; the report never changes the
    /// returned value.
    pub fn run_with(&self, args: &[&str], options: &RunOptions) -> GitResult<GitOutput> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.attempt(args, options.timeout);
            let trace = options.trace.as_deref();
            self.record_attempt(args, attempt, started.elapsed(), trace, &result);

            match result {
                Err(GitFailure::LockHeld { .. })
                    if options.retry_on_lock && attempt <= self.lock_retry_limit =>
                {
                    let backoff = self.lock_retry_base * 2u32.saturating_pow(attempt - 1);
                    thread::sleep(backoff);
                }
                other => return other,
            }
        }
    }

    /// Execute one attempt: spawn, drain output, wait under the timeout.
    fn attempt(&self, args: &[&str], timeout: Duration) -> GitResult<GitOutput> {
        let command_name = args.first().copied().unwrap_or("").to_string();

        let mut child = Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitFailure::Command {
                command: command_name.clone(),
                code: -1,
                stderr: format!("failed to execute git (is git installed?): {}", e),
            })?;

        let stdout_handle = spawn_stdout_reader(child.stdout.take());
        let stderr_handle = spawn_stderr_reader(child.stderr.take());

        let (exit_code, timed_out) =
            wait_with_timeout(&mut child, timeout).map_err(|e| GitFailure::Command {
                command: command_name.clone(),
                code: -1,
                stderr: format!("failed to wait for git: {}", e),
            })?;

        // The kill (or exit) closed the pipes, so the readers finish promptly.
        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        if timed_out {
            return Err(GitFailure::Timeout {
                command: command_name,
                timeout,
            });
        }

        let output = GitOutput { stdout, stderr };
        match exit_code {
            Some(0) => Ok(output),
            code => {
                let failure_text = if output.stderr.is_empty() {
                    output.stdout.as_str()
                } else {
                    output.stderr.as_str()
                };
                Err(classify(&command_name, code.unwrap_or(-1), failure_text))
            }
        }
    }

    fn record_attempt(
        &self,
        args: &[&str],
        attempt: u32,
        duration: Duration,
        trace: Option<&str>,
        result: &GitResult<GitOutput>,
    ) {
        let outcome = match result {
            Ok(_) => "success",
            Err(failure) => failure.kind(),
        };
        // Null on success; on failure, tells log consumers whether a
        // re-run can succeed without operator intervention.
        let recoverable = result.as_ref().err().map(GitFailure::is_recoverable);
        let event = AuditEvent::new(AuditAction::GitCommand)
            .with_target(args.first().copied().unwrap_or(""))
            .with_trace_opt(trace)
            .with_details(json!({
                "args": args,
                "attempt": attempt,
                "duration_ms": duration.as_millis() as u64,
                "outcome": outcome,
                "recoverable": recoverable,
            }));
        self.audit.record(&event);
    }
}

/// Classify a failed git command into the failure taxonomy.
///
/// This is the only place failure text is interpreted. `failure_text` is
/// stderr, or stdout when stderr is empty (which is where `git commit`
/// reports a clean tree). First match wins, checked in taxonomy order:
/// repository state, lock held, corruption, nothing to commit, then the
/// generic fallback. The matching is a deliberate substring heuristic over
/// messages git has kept stable for years.
fn classify(command: &str, code: i32, failure_text: &str) -> GitFailure {
    let lower = failure_text.to_lowercase();

    if lower.contains("not a git repository")
        || lower.contains("does not have a commit checked out")
    {
        return GitFailure::RepositoryState {
            command: command.to_string(),
            stderr: failure_text.to_string(),
        };
    }

    if lower.contains("index.lock")
        || lower.contains("cannot lock ref")
        || lower.contains("another git process")
        || (lower.contains("unable to create") && lower.contains(".lock"))
    {
        return GitFailure::LockHeld {
            command: command.to_string(),
            stderr: failure_text.to_string(),
        };
    }

    if lower.contains("corrupt") || lower.contains("bad object") || lower.contains("broken link") {
        return GitFailure::Corruption {
            command: command.to_string(),
            stderr: failure_text.to_string(),
        };
    }

    if lower.contains("nothing to commit")
        || lower.contains("nothing added to commit")
        || lower.contains("no changes added to commit")
    {
        return GitFailure::NothingToCommit;
    }

    GitFailure::Command {
        command: command.to_string(),
        code,
        stderr: failure_text.to_string(),
    }
}

/// Wait for a child process with timeout. Returns (exit_code, timed_out).
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<(Option<i32>, bool)> {
    let start = Instant::now();

    loop {
        match child.try_wait()? {
            Some(status) => return Ok((status.code(), false)),
            None => {
                if start.elapsed() >= timeout {
                    // SIGKILL on Unix, TerminateProcess on Windows; the
                    // follow-up wait reaps the child.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok((None, true));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn spawn_stdout_reader(stream: Option<ChildStdout>) -> thread::JoinHandle<String> {
    thread::spawn(move || match stream {
        Some(mut stream) => read_trimmed(&mut stream),
        None => String::new(),
    })
}

fn spawn_stderr_reader(stream: Option<ChildStderr>) -> thread::JoinHandle<String> {
    thread::spawn(move || match stream {
        Some(mut stream) => read_trimmed(&mut stream),
        None => String::new(),
    })
}

fn read_trimmed<R: Read>(reader: &mut R) -> String {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::test_support::{RecordingAudit, create_test_repo};
    use tempfile::TempDir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.command_timeout_secs = 10;
        config.lock_retry_limit = 4;
        config.lock_retry_base_ms = 50;
        config
    }

    #[test]
    fn run_succeeds_and_captures_stdout() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        let output = git.run(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap();
        assert_eq!(output.stdout, "main");
    }

    #[test]
    fn run_reports_every_attempt_to_the_audit_sink() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        git.run(&["status", "--porcelain"]).unwrap();

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::GitCommand);
        assert_eq!(events[0].target.as_deref(), Some("status"));
        assert_eq!(events[0].details["attempt"], 1);
        assert_eq!(events[0].details["outcome"], "success");
        assert!(events[0].details["recoverable"].is_null());
        assert!(events[0].details["duration_ms"].is_u64());
    }

    #[test]
    fn failure_is_classified_not_retried_by_default() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        let err = git.run(&["checkout", "no-such-branch"]).unwrap_err();
        assert!(matches!(err, GitFailure::Command { .. }));
        assert_eq!(audit.events().len(), 1);
    }

    #[test]
    fn lock_retry_succeeds_once_the_lock_clears() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        let lock_path = temp.path().join(".git").join("index.lock");
        std::fs::write(&lock_path, "").unwrap();

        let unlock_path = lock_path.clone();
        let unlocker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            let _ = std::fs::remove_file(&unlock_path);
        });

        std::fs::write(temp.path().join("file.txt"), "content").unwrap();
        let options = git.options().with_lock_retry();
        let result = git.run_with(&["add", "-A"], &options);
        unlocker.join().unwrap();

        result.unwrap();
        let events = audit.events();
        assert!(events.len() > 1, "expected at least one retry");
        assert_eq!(events.last().unwrap().details["outcome"], "success");
    }

    #[test]
    fn lock_retry_exhausts_into_lock_held() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let mut config = test_config();
        config.lock_retry_limit = 2;
        config.lock_retry_base_ms = 10;
        let git = GitRunner::new(temp.path(), &config, &audit);

        std::fs::write(temp.path().join(".git").join("index.lock"), "").unwrap();
        std::fs::write(temp.path().join("file.txt"), "content").unwrap();

        let options = git.options().with_lock_retry();
        let err = git.run_with(&["add", "-A"], &options).unwrap_err();

        assert!(matches!(err, GitFailure::LockHeld { .. }));
        // Initial attempt plus the configured number of retries.
        let events = audit.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].details["outcome"], "lock_held");
        assert_eq!(events[0].details["recoverable"], true);
    }

    #[test]
    fn lock_failure_without_opt_in_is_not_retried() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        std::fs::write(temp.path().join(".git").join("index.lock"), "").unwrap();
        std::fs::write(temp.path().join("file.txt"), "content").unwrap();

        let err = git.run(&["add", "-A"]).unwrap_err();

        assert!(matches!(err, GitFailure::LockHeld { .. }));
        assert_eq!(audit.events().len(), 1);
    }

    #[test]
    fn trace_id_flows_into_attempt_records() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let audit = RecordingAudit::default();
        let git = GitRunner::new(temp.path(), &test_config(), &audit);

        let options = git
            .options()
            .with_trace(Some("550e8400-e29b-41d4-a716-446655440000"));
        git.run_with(&["status", "--porcelain"], &options).unwrap();

        let events = audit.events();
        assert_eq!(
            events[0].trace.as_deref(),
            Some("550e8400-e29b-41d4-a716-446655440000")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn wait_with_timeout_kills_a_hung_child() {
        let mut child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        let started = Instant::now();
        let (code, timed_out) =
            wait_with_timeout(&mut child, Duration::from_millis(100)).unwrap();

        assert!(timed_out);
        assert_eq!(code, None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(not(windows))]
    #[test]
    fn wait_with_timeout_returns_exit_code_when_fast() {
        let mut child = Command::new("true").spawn().unwrap();
        let (code, timed_out) = wait_with_timeout(&mut child, Duration::from_secs(5)).unwrap();
        assert!(!timed_out);
        assert_eq!(code, Some(0));
    }

    #[test]
    fn classify_repository_state() {
        let err = classify(
            "status",
            128,
            "fatal: not a git repository (or any of the parent directories): .git",
        );
        assert!(matches!(err, GitFailure::RepositoryState { .. }));
    }

    #[test]
    fn classify_lock_held_variants() {
        let err = classify(
            "add",
            128,
            "fatal: Unable to create '/repo/.git/index.lock': File exists.",
        );
        assert!(matches!(err, GitFailure::LockHeld { .. }));

        let err = classify(
            "checkout",
            128,
            "fatal: cannot lock ref 'refs/heads/feat/x': is at abc but expected def",
        );
        assert!(matches!(err, GitFailure::LockHeld { .. }));

        let err = classify(
            "commit",
            128,
            "Another git process seems to be running in this repository",
        );
        assert!(matches!(err, GitFailure::LockHeld { .. }));
    }

    #[test]
    fn classify_corruption() {
        let err = classify("fsck", 128, "error: object file .git/objects/ab/cd is empty\nfatal: loose object abcd is corrupt");
        assert!(matches!(err, GitFailure::Corruption { .. }));

        let err = classify("log", 128, "fatal: bad object HEAD");
        assert!(matches!(err, GitFailure::Corruption { .. }));
    }

    #[test]
    fn classify_nothing_to_commit() {
        let err = classify(
            "commit",
            1,
            "On branch main\nnothing to commit, working tree clean",
        );
        assert!(matches!(err, GitFailure::NothingToCommit));
    }

    #[test]
    fn classify_falls_back_to_generic_command() {
        let err = classify("merge", 128, "fatal: refusing to merge unrelated histories");
        match err {
            GitFailure::Command { command, code, stderr } => {
                assert_eq!(command, "merge");
                assert_eq!(code, 128);
                assert!(stderr.contains("unrelated histories"));
            }
            other => panic!("expected Command, got {:?}", other),
        }
    }

    #[test]
    fn classify_order_prefers_repository_state() {
        // A message mentioning both a missing repository and a lock file
        // classifies as repository state; first match wins.
        let err = classify(
            "add",
            128,
            "fatal: not a git repository; also index.lock exists",
        );
        assert!(matches!(err, GitFailure::RepositoryState { .. }));
    }
}
