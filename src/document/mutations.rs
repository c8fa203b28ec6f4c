//! Reviewer decisions applied to a plan's header and body.

use super::{PlanDocument, PlanStatus, format_timestamp, keys};
use chrono::{DateTime, Utc};

/// Heading under which reviewer feedback accumulates.
const REVIEW_COMMENTS_HEADING: &str = "## Review Comments";

impl PlanDocument {
    /// Record an approval decision.
    pub fn mark_approved(&mut self, reviewer: &str, now: DateTime<Utc>) {
        self.set(keys::STATUS, PlanStatus::Approved.as_str());
        self.set(keys::APPROVED_BY, reviewer);
        self.set(keys::APPROVED_AT, format_timestamp(now));
    }

    /// Record a rejection decision along with the reviewer's reason.
    pub fn mark_rejected(&mut self, reviewer: &str, reason: &str, now: DateTime<Utc>) {
        self.set(keys::STATUS, PlanStatus::Rejected.as_str());
        self.set(keys::REJECTED_BY, reviewer);
        self.set(keys::REJECTED_AT, format_timestamp(now));
        self.set(keys::REJECTION_REASON, reason);
    }

    /// Send the plan back to its author for another pass.
    pub fn mark_needs_revision(&mut self, reviewer: &str, now: DateTime<Utc>) {
        self.set(keys::STATUS, PlanStatus::NeedsRevision.as_str());
        self.set(keys::REVIEWED_BY, reviewer);
        self.set(keys::REVIEWED_AT, format_timestamp(now));
    }

    /// Append reviewer comments to the review comments section, creating
    /// the section at the end of the body if it does not exist yet.
    pub fn append_review_comments(&mut self, comments: &str, now: DateTime<Utc>) {
        if !self.body.ends_with('\n') && !self.body.is_empty() {
            self.body.push('\n');
        }

        if !self.body.contains(REVIEW_COMMENTS_HEADING) {
            if !self.body.is_empty() {
                self.body.push('\n');
            }
            self.body.push_str(REVIEW_COMMENTS_HEADING);
            self.body.push('\n');
        }

        self.body.push('\n');
        self.body
            .push_str(&format!("### Revision requested {}\n", format_timestamp(now)));
        self.body.push('\n');
        self.body.push_str(comments.trim_end());
        self.body.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 15).unwrap()
    }

    fn sample_plan() -> PlanDocument {
        PlanDocument::new(
            "Add caching",
            "550e8400-e29b-41d4-a716-446655440000",
            "# Plan\n\nSteps here.\n",
            fixed_now(),
        )
    }

    #[test]
    fn approval_sets_status_and_reviewer_fields() {
        let mut plan = sample_plan();
        plan.mark_approved("alice", fixed_now());

        assert_eq!(plan.status().unwrap(), PlanStatus::Approved);
        assert_eq!(plan.get(keys::APPROVED_BY), Some("alice"));
        assert_eq!(plan.get(keys::APPROVED_AT), Some("2026-02-14T09:30:15Z"));
    }

    #[test]
    fn rejection_records_the_reason() {
        let mut plan = sample_plan();
        plan.mark_rejected("alice", "Scope is too broad", fixed_now());

        assert_eq!(plan.status().unwrap(), PlanStatus::Rejected);
        assert_eq!(plan.get(keys::REJECTED_BY), Some("alice"));
        assert_eq!(plan.get(keys::REJECTION_REASON), Some("Scope is too broad"));
    }

    #[test]
    fn needs_revision_keeps_the_plan_open() {
        let mut plan = sample_plan();
        plan.mark_needs_revision("alice", fixed_now());

        assert_eq!(plan.status().unwrap(), PlanStatus::NeedsRevision);
        assert!(plan.status().unwrap().is_open());
        assert_eq!(plan.get(keys::REVIEWED_BY), Some("alice"));
    }

    #[test]
    fn first_comment_creates_the_section() {
        let mut plan = sample_plan();
        plan.append_review_comments("Please split step 3.", fixed_now());

        assert!(plan.body.contains("## Review Comments"));
        assert!(plan.body.contains("### Revision requested 2026-02-14T09:30:15Z"));
        assert!(plan.body.contains("Please split step 3."));
    }

    #[test]
    fn later_comments_reuse_the_section() {
        let mut plan = sample_plan();
        plan.append_review_comments("First pass.", fixed_now());
        plan.append_review_comments("Second pass.", fixed_now());

        assert_eq!(plan.body.matches("## Review Comments").count(), 1);
        assert!(plan.body.contains("First pass."));
        assert!(plan.body.contains("Second pass."));
    }

    #[test]
    fn comments_survive_a_render_round_trip() {
        let mut plan = sample_plan();
        plan.mark_needs_revision("alice", fixed_now());
        plan.append_review_comments("Tighten the rollout plan.", fixed_now());

        let reparsed = PlanDocument::parse(&plan.render());
        assert_eq!(reparsed.status().unwrap(), PlanStatus::NeedsRevision);
        assert!(reparsed.body.contains("Tighten the rollout plan."));
    }

    #[test]
    fn comment_on_empty_body_is_well_formed() {
        let mut plan = PlanDocument::parse("---\nstatus: review\n---\n");
        plan.append_review_comments("Needs a body.", fixed_now());

        assert!(plan.body.starts_with("## Review Comments"));
        assert!(plan.body.ends_with("Needs a body.\n"));
    }
}
