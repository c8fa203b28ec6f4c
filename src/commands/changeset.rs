//! Implementation of the `warden changeset` commands.
//!
//! Changesets travel as `feat/` branches. `changeset open` allocates one
//! for an approved plan (or an explicit trace id); the decision commands
//! finish it: approve merges into trunk with a merge commit, reject
//! force-deletes the branch and keeps only the audit record.

use crate::audit::{AuditAction, AuditEvent, AuditSink, FileAuditLog};
use crate::cli::{
    ChangesetApproveArgs, ChangesetOpenArgs, ChangesetRejectArgs, ChangesetShowArgs,
};
use crate::config::Config;
use crate::context::{ReviewContext, require_initialized};
use crate::document::codec::is_uuid;
use crate::document::{PlanDocument, PlanStatus};
use crate::error::{Result, WardenError};
use crate::git::GitRunner;
use crate::git::branch::create_review_branch;
use crate::identity::reviewer_identity;
use crate::review::{Changeset, ChangesetReview};
use chrono::Utc;
use serde_json::json;

use super::require_repository;

/// Execute the `warden changeset open` command.
///
/// Allocates and checks out a review branch named after the request id
/// and the trace id's first eight characters. Without `--trace`, the
/// request id must name an approved plan and the plan's trace id is used.
pub fn cmd_open(args: ChangesetOpenArgs) -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);

    let (request_id, trace_id) = match args.trace {
        Some(trace) => {
            if !is_uuid(&trace) {
                return Err(WardenError::UserError(format!(
                    "invalid trace id '{}': expected a UUID",
                    trace
                )));
            }
            (args.request_id, trace)
        }
        None => trace_from_approved_plan(&ctx, &args.request_id)?,
    };

    let branch = create_review_branch(&git, &config, &request_id, &trace_id, Utc::now())?;

    audit.record(
        &AuditEvent::new(AuditAction::BranchCreated)
            .with_target(&branch)
            .with_trace(&trace_id)
            .with_details(json!({
                "request_id": request_id,
            })),
    );

    // Print success message
    println!("Opened changeset branch: {}", branch);
    println!();
    println!("  Request: {}", request_id);
    println!("  Trace:   {}", trace_id);
    println!();
    println!("Next steps:");
    println!("  1. Make the planned changes in the working tree");
    println!("  2. Run `warden commit \"summary\"` to record them");
    println!(
        "  3. From {}, run `warden changeset approve {}` to merge",
        config.trunk_branch, request_id
    );

    Ok(())
}

/// Resolve the trace id for a request that names an approved plan.
fn trace_from_approved_plan(ctx: &ReviewContext, request_id: &str) -> Result<(String, String)> {
    let entry = super::plan::find_plan_entry(ctx, request_id)?;
    let plan = PlanDocument::load(&entry.path)?;

    let status = plan.status()?;
    if status != PlanStatus::Approved {
        let hint = if status.is_open() {
            "approve the plan before opening a changeset, or pass an explicit trace id with --trace"
        } else {
            "pass an explicit trace id with --trace to open one anyway"
        };
        return Err(WardenError::UserError(format!(
            "Plan '{}' has status '{}'; {}.",
            entry.id, status, hint
        )));
    }

    // The trace lands in a branch name, so a hand-edited header gets
    // checked here rather than surfacing as a git error.
    plan.validate()?;

    let trace = plan.trace_id().ok_or_else(|| {
        WardenError::UserError(format!(
            "Plan '{}' has no trace id; pass one with --trace.",
            entry.id
        ))
    })?;

    Ok((entry.id.clone(), trace.to_string()))
}

/// Execute the `warden changeset list` command.
pub fn cmd_list() -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let review = ChangesetReview::new(&ctx, &config, &git, &audit);

    let changesets = review.list()?;
    if changesets.is_empty() {
        println!(
            "No open changesets. Run `warden changeset open <plan-id>` to start one."
        );
        return Ok(());
    }

    println!("Changesets");
    println!("==========");
    println!();
    for changeset in &changesets {
        println!(
            "  {:44} {:9} {:10} {:>3} file(s)",
            changeset.branch,
            changeset.status.as_str(),
            changeset.request_id,
            changeset.files_changed
        );
    }
    println!();
    println!("Total: {} changeset(s)", changesets.len());

    Ok(())
}

/// Execute the `warden changeset show` command.
pub fn cmd_show(args: ChangesetShowArgs) -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let review = ChangesetReview::new(&ctx, &config, &git, &audit);

    let changeset = review.find(&args.reference)?;
    print_changeset(&changeset, &config);

    Ok(())
}

fn print_changeset(changeset: &Changeset, config: &Config) {
    println!("================================================================================");
    println!("{} [{}]", changeset.branch, changeset.status);
    println!("================================================================================");
    println!();

    println!("Request:    {}", changeset.request_id);
    if let Some(trace) = &changeset.trace_id {
        println!("Trace:      {}", trace);
    }
    if let Some(agent) = &changeset.agent_id {
        println!("Agent:      {}", agent);
    }
    if let Some(created) = changeset.created_at {
        println!("Created:    {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "Files:      {} changed since {}",
        changeset.files_changed, config.trunk_branch
    );

    println!();
    if changeset.commits.is_empty() {
        println!("No commits beyond {} yet.", config.trunk_branch);
    } else {
        println!("Commits:");
        for commit in &changeset.commits {
            let short = commit.sha.get(..8).unwrap_or(&commit.sha);
            println!(
                "  {}  {}  {}",
                short,
                commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                commit.summary
            );
        }
    }

    println!();
    println!(
        "Decide with `warden changeset approve {}` or `warden changeset reject {} --reason \"...\"`.",
        changeset.request_id, changeset.request_id
    );
}

/// Execute the `warden changeset approve` command.
pub fn cmd_approve(args: ChangesetApproveArgs) -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let reviewer = reviewer_identity(&git);
    let review = ChangesetReview::new(&ctx, &config, &git, &audit);

    let merge_commit = review.approve(&args.reference, &reviewer)?;

    println!(
        "Merged changeset '{}' into {}.",
        args.reference, config.trunk_branch
    );
    println!();
    println!("  Reviewer:     {}", reviewer);
    println!("  Merge commit: {}", merge_commit);

    Ok(())
}

/// Execute the `warden changeset reject` command.
pub fn cmd_reject(args: ChangesetRejectArgs) -> Result<()> {
    let ctx = require_initialized()?;
    require_repository(&ctx)?;

    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let reviewer = reviewer_identity(&git);
    let review = ChangesetReview::new(&ctx, &config, &git, &audit);

    review.reject(&args.reference, &reviewer, &args.reason)?;

    println!("Rejected changeset '{}'.", args.reference);
    println!();
    println!("  Reviewer: {}", reviewer);
    println!("  Reason:   {}", args.reason.trim());
    println!();
    println!("The branch has been deleted; the audit log keeps the record.");

    Ok(())
}
