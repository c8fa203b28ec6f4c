//! Audit trail for review operations.
//!
//! Every state transition and every external command attempt is reported to
//! an [`AuditSink`]. The trail is the only place changeset review outcomes
//! live (branches carry code, the log carries workflow state), so events are
//! append-only and keyed by trace id.
//!
//! Recording is strictly best-effort: a sink failure is printed to stderr and
//! swallowed. The audit trail observes operations; it never vetoes them.
//!
//! # Event Format
//!
//! One JSON object per line (NDJSON) in `.warden/audit/audit.ndjson`:
//! - `ts`: RFC3339 timestamp
//! - `action`: the action performed (plan_approved, git_command, ...)
//! - `actor`: who performed it (`user@host`)
//! - `target`: optional item id, branch, or git subcommand
//! - `trace`: optional trace id correlating request, plan, and changeset
//! - `details`: freeform object with action-specific fields

use crate::error::{Result, WardenError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Review state scaffolded in a repository.
    WorkflowInit,
    /// Plan created in the pending-review area.
    PlanCreated,
    /// Plan approved (review -> approved).
    PlanApproved,
    /// Plan rejected (review -> rejected).
    PlanRejected,
    /// Plan sent back for revision (review -> needs_revision).
    PlanRevisionRequested,
    /// Review branch allocated and checked out.
    BranchCreated,
    /// Trace-tagged commit recorded.
    CommitRecorded,
    /// Changeset branch merged into trunk.
    ChangesetApproved,
    /// Changeset branch force-deleted.
    ChangesetRejected,
    /// One external git command attempt.
    GitCommand,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditAction::WorkflowInit => "workflow_init",
            AuditAction::PlanCreated => "plan_created",
            AuditAction::PlanApproved => "plan_approved",
            AuditAction::PlanRejected => "plan_rejected",
            AuditAction::PlanRevisionRequested => "plan_revision_requested",
            AuditAction::BranchCreated => "branch_created",
            AuditAction::CommitRecorded => "commit_recorded",
            AuditAction::ChangesetApproved => "changeset_approved",
            AuditAction::ChangesetRejected => "changeset_rejected",
            AuditAction::GitCommand => "git_command",
        };
        write!(f, "{}", name)
    }
}

/// One audit record, serialized as a single NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: AuditAction,

    /// Who performed the action (`user@host`).
    pub actor: String,

    /// Item id, branch name, or git subcommand the event is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Trace id correlating this event with its request, plan, and changeset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl AuditEvent {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: AuditAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            target: None,
            trace: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Set the trace id when one is known; leave the field out otherwise.
    pub fn with_trace_opt(mut self, trace: Option<&str>) -> Self {
        self.trace = trace.map(str::to_string);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            WardenError::UserError(format!("failed to serialize audit event to JSON: {}", e))
        })
    }
}

/// Destination for audit events.
///
/// The signature is infallible on purpose: implementations deal with their
/// own failures (log to stderr, drop the event) so the primary operation is
/// never blocked or failed by its audit trail.
pub trait AuditSink {
    fn record(&self, event: &AuditEvent);
}

/// Append-only NDJSON file sink, the sink the CLI wires up.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_append(&self, event: &AuditEvent) -> Result<()> {
        let line = event.to_ndjson_line()?;

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                WardenError::UserError(format!(
                    "failed to create audit directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                WardenError::UserError(format!(
                    "failed to open audit log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line).map_err(|e| {
            WardenError::UserError(format!(
                "failed to write audit log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        file.sync_all().map_err(|e| {
            WardenError::UserError(format!(
                "failed to sync audit log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.try_append(event) {
            eprintln!("Warning: failed to record audit event: {}", e);
        }
    }
}

/// Read all events from an audit log file.
///
/// A missing file reads as empty. Unparseable lines are skipped: the log is
/// best-effort on the write side, so the read side tolerates damage instead
/// of refusing to show the rest.
pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        WardenError::UserError(format!(
            "failed to read audit log '{}': {}",
            path.display(),
            e
        ))
    })?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<AuditEvent>(line).ok())
        .collect())
}

/// Actor string for audit metadata: `user@host`, with `unknown` fallbacks.
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
