//! Implementation of the `warden commit` command.
//!
//! Records every outstanding working-tree change as one commit with a
//! `Trace-Id:` trailer. The trace id comes from the first source that
//! has one: the --trace flag, the current branch's existing commits, or
//! the plan whose trace id matches the branch name's trace prefix.

use crate::audit::{AuditAction, AuditEvent, AuditSink, FileAuditLog};
use crate::cli::CommitArgs;
use crate::config::Config;
use crate::context::{ReviewContext, require_initialized};
use crate::document::PlanDocument;
use crate::document::codec::is_uuid;
use crate::error::{Result, WardenError};
use crate::git::GitRunner;
use crate::git::branch::{current_branch, parse_review_branch};
use crate::git::commit::{CommitRequest, record_commit};
use crate::git::history::branch_trace_id;
use crate::git::repository::ensure_identity;
use crate::review::PlanIndex;
use serde_json::json;

use super::require_repository;

/// Execute the `warden commit` command.
pub fn cmd_commit(args: CommitArgs) -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);

    // A repository created outside `warden init` may have no committer
    // identity; fall back to the configured bot identity.
    ensure_identity(&git, &config)?;

    let branch = current_branch(&git)?;
    let trace_id = resolve_trace(&ctx, &config, &git, &branch, args.trace.as_deref())?;

    let request = CommitRequest {
        summary: &args.summary,
        description: args.description.as_deref(),
        trace_id: trace_id.as_deref(),
    };
    let sha = record_commit(&git, &request)?;

    audit.record(
        &AuditEvent::new(AuditAction::CommitRecorded)
            .with_target(&sha)
            .with_trace_opt(trace_id.as_deref())
            .with_details(json!({
                "branch": branch,
                "summary": args.summary,
            })),
    );

    println!("Recorded commit {} on {}.", sha, branch);
    if let Some(trace) = &trace_id {
        println!();
        println!("  Trace: {}", trace);
    }

    Ok(())
}

/// Resolve the trace id for a new commit.
///
/// Precedence: explicit --trace, then the trace already carried by the
/// branch's commits, then the plan whose trace id matches the branch
/// name's trace prefix. A commit on trunk resolves to no trace.
fn resolve_trace(
    ctx: &ReviewContext,
    config: &Config,
    git: &GitRunner,
    branch: &str,
    explicit: Option<&str>,
) -> Result<Option<String>> {
    if let Some(trace) = explicit {
        if !is_uuid(trace) {
            return Err(WardenError::UserError(format!(
                "invalid trace id '{}': expected a UUID",
                trace
            )));
        }
        return Ok(Some(trace.to_string()));
    }

    if let Some(trace) = branch_trace_id(git, &config.trunk_branch, branch)? {
        return Ok(Some(trace));
    }

    // First commit on a fresh review branch: the branch has no trailers
    // yet, so recover the full trace id from the plan index.
    if let Some(parsed) = parse_review_branch(branch)
        && !parsed.trace_prefix.is_empty()
    {
        let index = PlanIndex::build(ctx)?;
        for entry in index.sorted_plans() {
            let Ok(plan) = PlanDocument::load(&entry.path) else {
                continue;
            };
            if let Some(trace) = plan.trace_id()
                && trace.starts_with(&parsed.trace_prefix)
            {
                return Ok(Some(trace.to_string()));
            }
        }
    }

    Ok(None)
}
