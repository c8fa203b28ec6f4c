//! Error types for the warden CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error
//! messages. Git failures form a closed taxonomy produced by the runner's
//! stderr classifier and propagated unchanged to the top level.

use std::time::Duration;

use crate::exit_codes;
use thiserror::Error;

/// Failure classes for external git command execution.
///
/// Produced in exactly one place (`git::runner::classify`) and never widened
/// along the way: callers match on the variant they know how to handle and
/// propagate the rest with `?`.
#[derive(Error, Debug)]
pub enum GitFailure {
    /// The command exceeded its timeout and was killed.
    #[error("git {command} timed out after {}s and was killed", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Another process holds a repository lock. Retryable: the operation
    /// never started, so re-running it is safe.
    #[error("git {command} is blocked by a repository lock: {stderr}")]
    LockHeld { command: String, stderr: String },

    /// The directory is not a repository or the repository is in a state
    /// the command cannot run against.
    #[error("repository state prevents git {command}: {stderr}")]
    RepositoryState { command: String, stderr: String },

    /// The object store is damaged. Surfaced verbatim so the operator sees
    /// exactly what git saw.
    #[error("repository corruption detected during git {command}: {stderr}")]
    Corruption { command: String, stderr: String },

    /// The working tree has no changes to record. Expected during normal
    /// operation; callers handle it explicitly rather than treating it as
    /// an error path.
    #[error("nothing to commit: the working tree has no changes")]
    NothingToCommit,

    /// Fallback for any non-zero exit the classifier does not recognize,
    /// and for spawn failures (exit code -1).
    #[error("git {command} failed (exit code {code}): {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },
}

impl GitFailure {
    /// Whether the caller may sensibly continue after this failure.
    ///
    /// `LockHeld` means the operation never began; `NothingToCommit` means
    /// there was no work to do. Everything else signals a condition the
    /// workflow cannot repair on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GitFailure::LockHeld { .. } | GitFailure::NothingToCommit)
    }

    /// Short machine-readable name, used in audit payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            GitFailure::Timeout { .. } => "timeout",
            GitFailure::LockHeld { .. } => "lock_held",
            GitFailure::RepositoryState { .. } => "repository_state",
            GitFailure::Corruption { .. } => "corruption",
            GitFailure::NothingToCommit => "nothing_to_commit",
            GitFailure::Command { .. } => "command",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            GitFailure::Timeout { .. } => exit_codes::TIMEOUT_FAILURE,
            GitFailure::LockHeld { .. } => exit_codes::LOCK_FAILURE,
            GitFailure::NothingToCommit => exit_codes::NOTHING_TO_COMMIT,
            GitFailure::RepositoryState { .. }
            | GitFailure::Corruption { .. }
            | GitFailure::Command { .. } => exit_codes::GIT_FAILURE,
        }
    }
}

/// Main error type for warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// User provided invalid arguments or the workflow is in a state the
    /// requested transition does not accept.
    #[error("{0}")]
    UserError(String),

    /// A git command failed; carries the classified failure unchanged.
    #[error(transparent)]
    Git(#[from] GitFailure),
}

impl WardenError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            WardenError::UserError(_) => exit_codes::USER_ERROR,
            WardenError::Git(failure) => failure.exit_code(),
        }
    }
}

/// Result type alias for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Result type alias for the git layer, before failures reach the CLI.
pub type GitResult<T> = std::result::Result<T, GitFailure>;
