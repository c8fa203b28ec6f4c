//! Commit recording with trace trailers.
//!
//! Every workflow-authored commit carries a `Trace-Id:` trailer linking
//! it back to the work item that produced it, so history alone is enough
//! to reconstruct which change belonged to which request.

use crate::error::{GitFailure, GitResult};
use crate::git::GitRunner;

/// Trailer key for the trace id line in commit messages.
pub const TRACE_TRAILER: &str = "Trace-Id";

/// What to record: a summary line, an optional long description, and the
/// trace id to embed as a trailer.
#[derive(Debug, Clone, Copy)]
pub struct CommitRequest<'a> {
    pub summary: &'a str,
    pub description: Option<&'a str>,
    pub trace_id: Option<&'a str>,
}

/// Stage everything outstanding and commit it, returning the new commit id.
///
/// A clean working tree is reported as `NothingToCommit` before anything
/// is staged; callers treat that as an expected condition, not a crash.
pub fn record_commit(git: &GitRunner, request: &CommitRequest<'_>) -> GitResult<String> {
    let status = git.run(&["status", "--porcelain"])?;
    if status.is_empty() {
        return Err(GitFailure::NothingToCommit);
    }

    let options = git.options().with_lock_retry().with_trace(request.trace_id);
    git.run_with(&["add", "-A"], &options)?;

    let message = build_message(request);
    git.run_with(&["commit", "-m", &message], &options)?;

    let head = git.run(&["rev-parse", "HEAD"])?;
    Ok(head.stdout)
}

/// Assemble summary, description, and trailer into one commit message.
pub fn build_message(request: &CommitRequest<'_>) -> String {
    let mut message = request.summary.trim().to_string();

    if let Some(description) = request.description {
        let description = description.trim();
        if !description.is_empty() {
            message.push_str("\n\n");
            message.push_str(description);
        }
    }

    if let Some(trace) = request.trace_id {
        message.push_str(&format!("\n\n{}: {}", TRACE_TRAILER, trace));
    }

    message
}

/// Pull the trace id out of a commit message, if it carries the trailer.
pub fn trace_from_message(message: &str) -> Option<&str> {
    message.lines().rev().find_map(|line| {
        line.strip_prefix(TRACE_TRAILER)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
            .filter(|trace| !trace.is_empty())
    })
}
