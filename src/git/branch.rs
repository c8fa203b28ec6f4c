//! Branch allocation and manipulation for review branches.
//!
//! Review branches are named `feat/{request_id}-{trace prefix}`. The
//! allocator guarantees the returned branch did not exist at call time:
//! an occupied candidate gets a timestamp token, and creation failures
//! from concurrent allocation get a short random suffix and another try.

use crate::config::Config;
use crate::error::{GitFailure, GitResult};
use crate::git::GitRunner;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Prefix for every branch this tool creates.
pub const BRANCH_PREFIX: &str = "feat/";

/// How much of the trace id is embedded in the branch name.
const TRACE_PREFIX_LEN: usize = 8;

/// The `feat/{request_id}-{trace prefix}` name before disambiguation.
pub fn candidate_name(request_id: &str, trace_id: &str) -> String {
    let prefix = trace_id.get(..TRACE_PREFIX_LEN).unwrap_or(trace_id);
    format!("{}{}-{}", BRANCH_PREFIX, request_id, prefix)
}

/// Create and check out a fresh review branch, returning its name.
///
/// The working tree is left as-is apart from the branch switch. Name
/// collisions and ref-lock races are resolved by renaming and retrying
/// up to the configured ceiling; every other failure aborts.
pub fn create_review_branch(
    git: &GitRunner,
    config: &Config,
    request_id: &str,
    trace_id: &str,
    now: DateTime<Utc>,
) -> GitResult<String> {
    let base = candidate_name(request_id, trace_id);
    let options = git.options().with_trace(Some(trace_id));

    let mut name = base.clone();
    if branch_exists(git, &name)? {
        name = format!("{}-{}", base, now.format("%Y%m%d%H%M%S"));
    }

    let mut attempt: u32 = 0;
    loop {
        match git.run_with(&["checkout", "-b", &name], &options) {
            Ok(_) => return Ok(name),
            Err(e) if attempt < config.branch_retry_limit && is_name_collision(&e) => {
                attempt += 1;
                name = format!("{}-{}", base, random_suffix());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Collisions worth renaming over: the name is taken, or another process
/// is mid-way through touching the same ref.
fn is_name_collision(failure: &GitFailure) -> bool {
    match failure {
        GitFailure::LockHeld { .. } => true,
        GitFailure::Command { stderr, .. } => stderr.to_lowercase().contains("already exists"),
        _ => false,
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    format!("{:04x}", rng.r#gen::<u16>())
}

/// Whether a local branch with this name exists.
pub fn branch_exists(git: &GitRunner, name: &str) -> GitResult<bool> {
    let refname = format!("refs/heads/{}", name);
    match git.run(&["show-ref", "--verify", "--quiet", &refname]) {
        Ok(_) => Ok(true),
        Err(GitFailure::Command { code: 1, .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// The branch HEAD currently points at.
pub fn current_branch(git: &GitRunner) -> GitResult<String> {
    let out = git.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(out.stdout)
}

/// All local review branches, sorted by name.
pub fn list_review_branches(git: &GitRunner) -> GitResult<Vec<String>> {
    let out = git.run(&[
        "for-each-ref",
        "--format=%(refname:short)",
        "--sort=refname",
        &format!("refs/heads/{}", BRANCH_PREFIX),
    ])?;
    Ok(out.lines().iter().map(|s| s.to_string()).collect())
}

/// Force-delete a branch. Lock contention is retried; the deletion has
/// not happened yet when the lock fails, so a retry is safe.
pub fn delete_branch(git: &GitRunner, name: &str, trace: Option<&str>) -> GitResult<()> {
    let options = git.options().with_lock_retry().with_trace(trace);
    git.run_with(&["branch", "-D", name], &options)?;
    Ok(())
}

/// Merge `branch` into the current branch with an explicit merge commit,
/// returning the merge commit id. Never retried: a failed merge can
/// leave conflict state behind that a blind re-run would compound.
pub fn merge_no_ff(
    git: &GitRunner,
    branch: &str,
    message: &str,
    trace: Option<&str>,
) -> GitResult<String> {
    let options = git.options().with_trace(trace);
    git.run_with(&["merge", "--no-ff", branch, "-m", message], &options)?;
    let head = git.run(&["rev-parse", "HEAD"])?;
    Ok(head.stdout)
}

/// Request id and trace prefix recovered from a review branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReviewBranch {
    pub request_id: String,
    pub trace_prefix: String,
}

/// Recover the request id and trace prefix from a branch name.
///
/// Request ids may themselves contain hyphens, so the name is scanned
/// from the right for the first segment shaped like a trace prefix
/// (8 hex chars); disambiguator segments after it are ignored. When no
/// segment matches, the last segment is taken as the trace prefix.
pub fn parse_review_branch(name: &str) -> Option<ParsedReviewBranch> {
    let rest = name.strip_prefix(BRANCH_PREFIX)?;
    let segments: Vec<&str> = rest.split('-').collect();
    if segments.len() < 2 {
        return None;
    }

    let trace_index = segments
        .iter()
        .rposition(|s| s.len() == TRACE_PREFIX_LEN && s.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(segments.len() - 1);
    if trace_index == 0 {
        return None;
    }

    Some(ParsedReviewBranch {
        request_id: segments[..trace_index].join("-"),
        trace_prefix: segments[trace_index].to_string(),
    })
}
