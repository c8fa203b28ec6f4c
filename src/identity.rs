//! Reviewer identity resolution.
//!
//! Approvals and rejections record who made the call. The lookup is
//! best-effort: repo-local git identity first, then the OS username, then
//! `"unknown"`. The gate never refuses an otherwise valid decision because
//! the environment lacks an identity; the audit trail independently records
//! the actor string.

use crate::git::GitRunner;

/// Resolve the reviewer identity for `*_by` metadata fields.
pub fn reviewer_identity(git: &GitRunner) -> String {
    if let Ok(output) = git.run(&["config", "user.name"])
        && !output.stdout.is_empty()
    {
        return output.stdout;
    }

    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
