//! Review documents: plans with a structured header and markdown body.

pub mod codec;
pub mod mutations;

use crate::error::{Result, WardenError};
use crate::fs::atomic_write_str;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Well-known header keys.
pub mod keys {
    pub const STATUS: &str = "status";
    pub const TITLE: &str = "title";
    pub const TRACE_ID: &str = "trace_id";
    pub const CREATED_AT: &str = "created_at";
    pub const APPROVED_BY: &str = "approved_by";
    pub const APPROVED_AT: &str = "approved_at";
    pub const REJECTED_BY: &str = "rejected_by";
    pub const REJECTED_AT: &str = "rejected_at";
    pub const REJECTION_REASON: &str = "rejection_reason";
    pub const REVIEWED_BY: &str = "reviewed_by";
    pub const REVIEWED_AT: &str = "reviewed_at";
}

/// Lifecycle state of a plan under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Review,
    NeedsRevision,
    Approved,
    Rejected,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Review => "review",
            PlanStatus::NeedsRevision => "needs_revision",
            PlanStatus::Approved => "approved",
            PlanStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "review" => Some(PlanStatus::Review),
            "needs_revision" => Some(PlanStatus::NeedsRevision),
            "approved" => Some(PlanStatus::Approved),
            "rejected" => Some(PlanStatus::Rejected),
            _ => None,
        }
    }

    /// States from which a reviewer decision is still expected.
    pub fn is_open(&self) -> bool {
        matches!(self, PlanStatus::Review | PlanStatus::NeedsRevision)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan document: header metadata plus markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub meta: BTreeMap<String, String>,
    pub body: String,
}

impl PlanDocument {
    /// Build a fresh plan in `review` state.
    pub fn new(title: &str, trace_id: &str, body: &str, now: DateTime<Utc>) -> Self {
        let mut meta = BTreeMap::new();
        meta.insert(keys::STATUS.to_string(), PlanStatus::Review.as_str().to_string());
        meta.insert(keys::TITLE.to_string(), title.to_string());
        meta.insert(keys::TRACE_ID.to_string(), trace_id.to_string());
        meta.insert(keys::CREATED_AT.to_string(), format_timestamp(now));
        PlanDocument {
            meta,
            body: body.to_string(),
        }
    }

    pub fn parse(content: &str) -> Self {
        let (meta, body) = codec::split_document(content);
        PlanDocument { meta, body }
    }

    pub fn render(&self) -> String {
        codec::render_document(&self.meta, &self.body)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::UserError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    /// Write atomically so a reader never observes a half-written plan.
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_str(path, &self.render())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.meta.insert(key.to_string(), value.into());
    }

    pub fn status(&self) -> Result<PlanStatus> {
        let raw = self.get(keys::STATUS).ok_or_else(|| {
            WardenError::UserError("Plan has no status field in its header".to_string())
        })?;
        PlanStatus::parse(raw).ok_or_else(|| {
            WardenError::UserError(format!(
                "Plan has invalid status '{}' (expected review, needs_revision, approved, or rejected)",
                raw
            ))
        })
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.get(keys::TRACE_ID)
    }

    pub fn title(&self) -> Option<&str> {
        self.get(keys::TITLE)
    }

    /// Check the header invariants that every stored plan must satisfy.
    pub fn validate(&self) -> Result<()> {
        self.status()?;
        if let Some(trace) = self.trace_id() {
            if !codec::is_uuid(trace) {
                return Err(WardenError::UserError(format!(
                    "Plan has malformed trace_id '{}' (expected a UUID)",
                    trace
                )));
            }
        }
        Ok(())
    }
}

/// Timestamps are stored as RFC 3339 in UTC with second precision.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
