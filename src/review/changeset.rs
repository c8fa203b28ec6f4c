//! Changeset review: branch-backed work items.
//!
//! A changeset has no document of its own. Its commits, file counts, and
//! trace id come from repository history; its status comes from the audit
//! trail, where the latest terminal event for its trace id wins. Approval
//! merges the branch into trunk, rejection force-deletes it.

use crate::audit::{AuditAction, AuditEvent, AuditSink, read_events};
use crate::config::Config;
use crate::context::ReviewContext;
use crate::error::{Result, WardenError};
use crate::git::GitRunner;
use crate::git::branch::{
    current_branch, delete_branch, list_review_branches, merge_no_ff, parse_review_branch,
};
use crate::git::history::{
    CommitInfo, branch_trace_id, commits_since_trunk, files_changed_since_trunk,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

/// Review outcome for a changeset, derived from the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Approved,
    Rejected,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Approved => "approved",
            ChangesetStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One review branch described through history and the audit trail.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub branch: String,
    pub request_id: String,
    pub trace_prefix: String,
    /// Full trace id recovered from commit trailers, when present.
    pub trace_id: Option<String>,
    pub status: ChangesetStatus,
    pub files_changed: usize,
    /// Timestamp of the branch's earliest own commit.
    pub created_at: Option<DateTime<Utc>>,
    /// Author of the branch's earliest own commit.
    pub agent_id: Option<String>,
    /// The branch's own commits, oldest first.
    pub commits: Vec<CommitInfo>,
}

/// Changeset review operations over one workspace.
pub struct ChangesetReview<'a> {
    ctx: &'a ReviewContext,
    config: &'a Config,
    git: &'a GitRunner<'a>,
    audit: &'a dyn AuditSink,
}

impl<'a> ChangesetReview<'a> {
    pub fn new(
        ctx: &'a ReviewContext,
        config: &'a Config,
        git: &'a GitRunner<'a>,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            ctx,
            config,
            git,
            audit,
        }
    }

    /// Describe every review branch in the repository.
    pub fn list(&self) -> Result<Vec<Changeset>> {
        let events = read_events(&self.ctx.audit_file())?;
        let mut changesets = Vec::new();
        for branch in list_review_branches(self.git)? {
            changesets.push(self.describe(&branch, &events)?);
        }
        Ok(changesets)
    }

    /// Find one changeset by branch name, request id, or trace prefix.
    pub fn find(&self, reference: &str) -> Result<Changeset> {
        let branches = list_review_branches(self.git)?;

        let matches: Vec<&String> = branches
            .iter()
            .filter(|branch| {
                if branch.as_str() == reference {
                    return true;
                }
                match parse_review_branch(branch) {
                    Some(parsed) => {
                        parsed.request_id == reference || parsed.trace_prefix == reference
                    }
                    None => false,
                }
            })
            .collect();

        match matches.as_slice() {
            [] => Err(WardenError::UserError(format!(
                "Changeset '{}' not found.\n\n\
                 Use `warden changeset list` to see open changesets.",
                reference
            ))),
            [branch] => {
                let events = read_events(&self.ctx.audit_file())?;
                self.describe(branch, &events)
            }
            many => Err(WardenError::UserError(format!(
                "Changeset '{}' is ambiguous; it matches {} branches.\n\n\
                 Refer to it by full branch name instead.",
                reference,
                many.len()
            ))),
        }
    }

    /// Merge an approved changeset into trunk, returning the merge commit.
    ///
    /// The caller must already be on trunk; the merge is never retried,
    /// so a conflicted or partial merge surfaces exactly as git left it.
    pub fn approve(&self, reference: &str, reviewer: &str) -> Result<String> {
        let changeset = self.find(reference)?;
        self.require_pending(&changeset)?;

        let here = current_branch(self.git)?;
        if here != self.config.trunk_branch {
            return Err(WardenError::UserError(format!(
                "Changeset approval must be run from trunk ('{}'), but HEAD is on '{}'.\n\n\
                 Switch branches first: git checkout {}",
                self.config.trunk_branch, here, self.config.trunk_branch
            )));
        }

        let message = merge_message(&changeset);
        let merge_commit = merge_no_ff(
            self.git,
            &changeset.branch,
            &message,
            changeset.trace_id.as_deref(),
        )?;

        self.audit.record(
            &AuditEvent::new(AuditAction::ChangesetApproved)
                .with_target(&changeset.branch)
                .with_trace_opt(changeset.trace_id.as_deref())
                .with_details(json!({
                    "reviewer": reviewer,
                    "request_id": changeset.request_id,
                    "merge_commit": merge_commit,
                })),
        );

        Ok(merge_commit)
    }

    /// Force-delete a rejected changeset's branch. The code is gone after
    /// this; only the audit event and any merged history survive.
    pub fn reject(&self, reference: &str, reviewer: &str, reason: &str) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WardenError::UserError(
                "A non-empty reason is required to reject a changeset.".to_string(),
            ));
        }

        let changeset = self.find(reference)?;
        self.require_pending(&changeset)?;

        let here = current_branch(self.git)?;
        if here == changeset.branch {
            return Err(WardenError::UserError(format!(
                "Cannot reject '{}' while it is checked out.\n\n\
                 Switch branches first: git checkout {}",
                changeset.branch, self.config.trunk_branch
            )));
        }

        delete_branch(self.git, &changeset.branch, changeset.trace_id.as_deref())?;

        self.audit.record(
            &AuditEvent::new(AuditAction::ChangesetRejected)
                .with_target(&changeset.branch)
                .with_trace_opt(changeset.trace_id.as_deref())
                .with_details(json!({
                    "reviewer": reviewer,
                    "request_id": changeset.request_id,
                    "reason": reason,
                })),
        );

        Ok(())
    }

    fn describe(&self, branch: &str, events: &[AuditEvent]) -> Result<Changeset> {
        let parsed = parse_review_branch(branch);
        let (request_id, trace_prefix) = match parsed {
            Some(p) => (p.request_id, p.trace_prefix),
            None => (branch.to_string(), String::new()),
        };

        let trunk = &self.config.trunk_branch;
        let commits = commits_since_trunk(self.git, trunk, branch)?;
        let files_changed = files_changed_since_trunk(self.git, trunk, branch)?;
        let trace_id = branch_trace_id(self.git, trunk, branch)?;
        let status = derived_status(events, branch, trace_id.as_deref());

        Ok(Changeset {
            branch: branch.to_string(),
            request_id,
            trace_prefix,
            trace_id,
            status,
            files_changed,
            created_at: commits.first().map(|c| c.timestamp),
            agent_id: commits.first().map(|c| c.author.clone()),
            commits,
        })
    }

    fn require_pending(&self, changeset: &Changeset) -> Result<()> {
        if changeset.status != ChangesetStatus::Pending {
            return Err(WardenError::UserError(format!(
                "Changeset '{}' was already {}.",
                changeset.branch, changeset.status
            )));
        }
        Ok(())
    }
}

/// Merge commit message embedding the request id and trace id.
fn merge_message(changeset: &Changeset) -> String {
    match &changeset.trace_id {
        Some(trace) => format!(
            "Merge changeset {} ({})\n\n{}: {}",
            changeset.request_id,
            changeset.branch,
            crate::git::commit::TRACE_TRAILER,
            trace
        ),
        None => format!(
            "Merge changeset {} ({})",
            changeset.request_id, changeset.branch
        ),
    }
}

/// Latest terminal audit event for this changeset wins; no event means
/// the changeset is still pending.
fn derived_status(events: &[AuditEvent], branch: &str, trace_id: Option<&str>) -> ChangesetStatus {
    for event in events.iter().rev() {
        let status = match event.action {
            AuditAction::ChangesetApproved => ChangesetStatus::Approved,
            AuditAction::ChangesetRejected => ChangesetStatus::Rejected,
            _ => continue,
        };

        let trace_matches = trace_id.is_some() && event.trace.as_deref() == trace_id;
        let target_matches = event.target.as_deref() == Some(branch);
        if trace_matches || target_matches {
            return status;
        }
    }
    ChangesetStatus::Pending
}
