//! Plan review transitions: approve, reject, revise.
//!
//! Every transition follows the same shape: check preconditions before
//! any mutation, rewrite the document, land it in the area matching its
//! new status, and append an audit event. Relocations write the
//! destination before removing the source, so a crash can leave a
//! duplicate but never lose the document.

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::context::ReviewContext;
use crate::document::{PlanDocument, PlanStatus};
use crate::error::{Result, WardenError};
use crate::fs::{relocate_rewritten, timestamped_file_name};
use crate::review::index::{PlanEntry, PlanIndex, validate_plan_id};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::PathBuf;

/// Plan review operations over one workspace.
pub struct PlanReview<'a> {
    ctx: &'a ReviewContext,
    audit: &'a dyn AuditSink,
}

impl<'a> PlanReview<'a> {
    pub fn new(ctx: &'a ReviewContext, audit: &'a dyn AuditSink) -> Self {
        Self { ctx, audit }
    }

    /// Approve a plan in review: stamp `approved_by`/`approved_at` and
    /// relocate it to the approved area. Returns the new path.
    pub fn approve(&self, plan_id: &str, reviewer: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        let entry = self.find_plan(plan_id)?;
        let mut plan = PlanDocument::load(&entry.path)?;
        self.require_open_for_decision(&entry, &plan)?;

        plan.mark_approved(reviewer, now);

        let destination = self.ctx.approved_dir().join(file_name_of(&entry)?);
        relocate_rewritten(
            &entry.path,
            &destination,
            &plan.render(),
            &self.ctx.archive_dir(),
            now,
        )?;

        self.audit.record(
            &AuditEvent::new(AuditAction::PlanApproved)
                .with_target(&entry.id)
                .with_trace_opt(plan.trace_id())
                .with_details(json!({
                    "reviewer": reviewer,
                    "destination": destination.to_string_lossy(),
                })),
        );

        Ok(destination)
    }

    /// Reject a plan in review with a mandatory reason: stamp the reason
    /// fields and relocate it to the rejected area under a timestamped
    /// name. Returns the new path.
    pub fn reject(
        &self,
        plan_id: &str,
        reviewer: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        // The reason gate runs before any filesystem access.
        let reason = require_reason(reason, "reject")?;

        let entry = self.find_plan(plan_id)?;
        let mut plan = PlanDocument::load(&entry.path)?;
        self.require_open_for_decision(&entry, &plan)?;

        plan.mark_rejected(reviewer, reason, now);

        let destination = self
            .ctx
            .rejected_dir()
            .join(timestamped_file_name(&entry.path, now)?);
        relocate_rewritten(
            &entry.path,
            &destination,
            &plan.render(),
            &self.ctx.archive_dir(),
            now,
        )?;

        self.audit.record(
            &AuditEvent::new(AuditAction::PlanRejected)
                .with_target(&entry.id)
                .with_trace_opt(plan.trace_id())
                .with_details(json!({
                    "reviewer": reviewer,
                    "reason": reason,
                    "destination": destination.to_string_lossy(),
                })),
        );

        Ok(destination)
    }

    /// Send a plan back for revision: set `needs_revision`, append the
    /// reviewer's comments to the document body, and leave the file in
    /// place for its producer.
    pub fn revise(
        &self,
        plan_id: &str,
        reviewer: &str,
        comments: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let comments = require_reason(comments, "request revision of")?;

        let entry = self.find_plan(plan_id)?;
        let mut plan = PlanDocument::load(&entry.path)?;
        self.require_open_for_decision(&entry, &plan)?;

        plan.mark_needs_revision(reviewer, now);
        plan.append_review_comments(comments, now);
        plan.save(&entry.path)?;

        self.audit.record(
            &AuditEvent::new(AuditAction::PlanRevisionRequested)
                .with_target(&entry.id)
                .with_trace_opt(plan.trace_id())
                .with_details(json!({
                    "reviewer": reviewer,
                    "comments": comments,
                })),
        );

        Ok(())
    }

    fn find_plan(&self, plan_id: &str) -> Result<PlanEntry> {
        let plan_id = validate_plan_id(plan_id)?;
        let index = PlanIndex::build(self.ctx)?;
        index.find(&plan_id).cloned().ok_or_else(|| {
            WardenError::UserError(format!(
                "Plan '{}' not found.\n\n\
                 Use `warden plan list` to see known plans.",
                plan_id
            ))
        })
    }

    /// Decisions are only taken on plans whose status is `review`.
    fn require_open_for_decision(&self, entry: &PlanEntry, plan: &PlanDocument) -> Result<()> {
        let status = plan.status().map_err(|e| {
            WardenError::UserError(format!("Plan '{}' is unreadable: {}", entry.id, e))
        })?;
        if status != PlanStatus::Review {
            return Err(WardenError::UserError(format!(
                "Plan '{}' has status '{}'; only plans in review can be decided.",
                entry.id, status
            )));
        }
        Ok(())
    }
}

/// Reject empty or whitespace-only reviewer input up front.
fn require_reason<'r>(reason: &'r str, verb: &str) -> Result<&'r str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(WardenError::UserError(format!(
            "A non-empty reason is required to {} a plan.",
            verb
        )));
    }
    Ok(trimmed)
}

fn file_name_of(entry: &PlanEntry) -> Result<&str> {
    entry
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            WardenError::UserError(format!("Invalid plan path '{}'", entry.path.display()))
        })
}
