//! Implementation of the `warden plan` commands.
//!
//! Plans are markdown documents proposed by agents. `plan new` lands them
//! in the review area; the decision commands move them on: approve to
//! approved/, reject to rejected/ under a timestamped name, revise leaves
//! them in place with status `needs_revision` and reviewer comments
//! appended.

use crate::audit::{AuditAction, AuditEvent, AuditSink, FileAuditLog};
use crate::cli::{PlanApproveArgs, PlanNewArgs, PlanRejectArgs, PlanReviseArgs, PlanShowArgs};
use crate::config::Config;
use crate::context::require_initialized;
use crate::document::codec::is_uuid;
use crate::document::{PlanDocument, keys};
use crate::error::{Result, WardenError};
use crate::git::GitRunner;
use crate::identity::reviewer_identity;
use crate::review::index::{generate_plan_id, plan_file_name, validate_plan_id};
use crate::review::{PlanArea, PlanEntry, PlanIndex, PlanReview};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

/// Default plan body template.
const PLAN_BODY_TEMPLATE: &str = r#"
## Objective
<!-- Single sentence describing the outcome this plan delivers -->

## Proposed Changes
<!-- Files, modules, and behavior the implementation will touch -->

## Verification
<!-- How a reviewer can check the implemented result -->
"#;

/// Execute the `warden plan new` command.
///
/// Creates a new plan document in the review area with:
/// - Auto-generated numeric id (monotonic, scanning all areas)
/// - Slugified title for the filename
/// - A fresh trace id unless one is supplied
/// - Standard body template unless a body is supplied
pub fn cmd_new(args: PlanNewArgs) -> Result<()> {
    let ctx = require_initialized()?;

    let trace_id = match args.trace {
        Some(trace) => {
            if !is_uuid(&trace) {
                return Err(WardenError::UserError(format!(
                    "invalid trace id '{}': expected a UUID",
                    trace
                )));
            }
            trace
        }
        None => Uuid::new_v4().to_string(),
    };

    // Build the plan index to find the next available id
    let index = PlanIndex::build(&ctx)?;
    let plan_id = generate_plan_id(index.next_number());
    let file_name = plan_file_name(&plan_id, &args.title);
    let plan_path = ctx.review_dir().join(&file_name);

    // Ids are monotonic across all areas, so a collision means the index
    // and the filesystem disagree. Refuse rather than overwrite.
    if plan_path.exists() {
        return Err(WardenError::UserError(format!(
            "plan file already exists: {}",
            plan_path.display()
        )));
    }

    let body = args.body.as_deref().unwrap_or(PLAN_BODY_TEMPLATE);
    let plan = PlanDocument::new(&args.title, &trace_id, body, Utc::now());
    plan.save(&plan_path)?;

    let audit = FileAuditLog::new(ctx.audit_file());
    audit.record(
        &AuditEvent::new(AuditAction::PlanCreated)
            .with_target(&plan_id)
            .with_trace(&trace_id)
            .with_details(json!({
                "title": args.title,
                "path": plan_path.display().to_string(),
            })),
    );

    // Print success message
    println!("Created plan: {}", plan_id);
    println!();
    println!("  Title: {}", args.title);
    println!("  Trace: {}", trace_id);
    println!("  Path:  {}", plan_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the plan body and refine the proposed changes");
    println!("  2. Run `warden plan approve {}` to approve it", plan_id);

    Ok(())
}

/// Execute the `warden plan list` command.
///
/// Lists plans grouped by review area, with each plan's current status
/// and title read from its document.
pub fn cmd_list() -> Result<()> {
    let ctx = require_initialized()?;
    let index = PlanIndex::build(&ctx)?;

    if index.is_empty() {
        println!("No plans in the review workflow. Run `warden plan new \"title\"` to create one.");
        return Ok(());
    }

    println!("Plans");
    println!("=====");

    let mut total = 0;
    for &area in PlanArea::ALL {
        let mut plans = index.plans_in_area(area);
        if plans.is_empty() {
            continue;
        }
        plans.sort_by_key(|p| p.number);
        total += plans.len();

        println!();
        println!("{}:", area);
        for entry in plans {
            let (status, title) = match PlanDocument::load(&entry.path) {
                Ok(plan) => (
                    plan.get(keys::STATUS).unwrap_or("?").to_string(),
                    plan.title().unwrap_or("(untitled)").to_string(),
                ),
                Err(_) => ("?".to_string(), "(unreadable)".to_string()),
            };
            println!("  {:10} {:15} {}", entry.id, status, title);
        }
    }

    println!();
    println!("Total: {} plan(s)", total);

    Ok(())
}

/// Execute the `warden plan show` command.
///
/// Locates a plan by id in any area and displays its metadata and body,
/// including the area name in the header.
pub fn cmd_show(args: PlanShowArgs) -> Result<()> {
    let ctx = require_initialized()?;

    let plan_id = validate_plan_id(&args.plan_id)?;
    let index = PlanIndex::build(&ctx)?;

    let entry = index.find(&plan_id).ok_or_else(|| {
        WardenError::UserError(format!(
            "Plan '{}' not found.\n\n\
             Use `warden plan list` to see known plans.",
            plan_id
        ))
    })?;

    let plan = PlanDocument::load(&entry.path)?;

    // Print plan header
    println!("================================================================================");
    println!("{} [{}]", entry.id, entry.area);
    println!("================================================================================");
    println!();

    // Print key metadata
    println!("Title:      {}", plan.title().unwrap_or("(untitled)"));
    println!("Status:     {}", plan.get(keys::STATUS).unwrap_or("?"));
    if let Some(trace) = plan.trace_id() {
        println!("Trace:      {}", trace);
    }
    if let Some(created) = plan.get(keys::CREATED_AT) {
        println!("Created:    {}", created);
    }

    print_decision_stamps(&plan);

    // Print body
    println!();
    println!("--------------------------------------------------------------------------------");
    println!();

    let body = plan.body.trim();
    if !body.is_empty() {
        println!("{}", body);
    } else {
        println!("(No body content)");
    }

    println!();
    println!("--------------------------------------------------------------------------------");
    println!("Path: {}", entry.path.display());

    Ok(())
}

/// Print whichever decision stamps the plan carries.
fn print_decision_stamps(plan: &PlanDocument) {
    if let Some(by) = plan.get(keys::APPROVED_BY) {
        let at = plan.get(keys::APPROVED_AT).unwrap_or("?");
        println!("Approved:   by {} at {}", by, at);
    }
    if let Some(by) = plan.get(keys::REJECTED_BY) {
        let at = plan.get(keys::REJECTED_AT).unwrap_or("?");
        println!("Rejected:   by {} at {}", by, at);
    }
    if let Some(reason) = plan.get(keys::REJECTION_REASON) {
        println!("Reason:     {}", reason);
    }
    if let Some(by) = plan.get(keys::REVIEWED_BY) {
        let at = plan.get(keys::REVIEWED_AT).unwrap_or("?");
        println!("Reviewed:   by {} at {}", by, at);
    }
}

/// Execute the `warden plan approve` command.
pub fn cmd_approve(args: PlanApproveArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let reviewer = reviewer_identity(&git);

    let review = PlanReview::new(&ctx, &audit);
    let destination = review.approve(&args.plan_id, &reviewer, Utc::now())?;

    println!("Approved plan {}.", args.plan_id);
    println!();
    println!("  Reviewer: {}", reviewer);
    println!("  Moved to: {}", destination.display());
    println!();
    println!(
        "Open a review branch for the implementation with `warden changeset open {}`.",
        args.plan_id
    );

    Ok(())
}

/// Execute the `warden plan reject` command.
pub fn cmd_reject(args: PlanRejectArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let reviewer = reviewer_identity(&git);

    let review = PlanReview::new(&ctx, &audit);
    let destination = review.reject(&args.plan_id, &reviewer, &args.reason, Utc::now())?;

    println!("Rejected plan {}.", args.plan_id);
    println!();
    println!("  Reviewer: {}", reviewer);
    println!("  Reason:   {}", args.reason.trim());
    println!("  Moved to: {}", destination.display());

    Ok(())
}

/// Execute the `warden plan revise` command.
pub fn cmd_revise(args: PlanReviseArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let config = Config::load(ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);
    let reviewer = reviewer_identity(&git);

    let review = PlanReview::new(&ctx, &audit);
    review.revise(&args.plan_id, &reviewer, &args.comments, Utc::now())?;

    println!("Sent plan {} back for revision.", args.plan_id);
    println!();
    println!("  Reviewer: {}", reviewer);
    println!();
    println!("The plan stays in the review area with status 'needs_revision'.");

    Ok(())
}

/// Find a plan entry for other commands that need one (e.g., changeset open).
pub fn find_plan_entry(ctx: &crate::context::ReviewContext, plan_id: &str) -> Result<PlanEntry> {
    let plan_id = validate_plan_id(plan_id)?;
    let index = PlanIndex::build(ctx)?;
    index.find(&plan_id).cloned().ok_or_else(|| {
        WardenError::UserError(format!(
            "Plan '{}' not found.\n\n\
             Use `warden plan list` to see known plans.",
            plan_id
        ))
    })
}
