//! CLI argument parsing for warden.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};

/// Warden: human review gate for agent-generated plans and changesets.
///
/// Review state is expressed as files inside a Git repository:
/// - Plan documents move between status areas (.warden/review|approved|rejected)
/// - Code changes travel as feat/ branches that approval merges into trunk
/// - Every transition and git command lands in an append-only audit log
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for warden.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize warden in the current repository.
    ///
    /// Creates the repository if needed, the review state directories,
    /// the default configuration, and the audit log location.
    Init,

    /// Plan review commands.
    ///
    /// Create, inspect, and decide plans awaiting human review.
    Plan(PlanCommand),

    /// Changeset review commands.
    ///
    /// Inspect and decide branch-backed changesets: approve merges into
    /// trunk, reject deletes the branch.
    Changeset(ChangesetCommand),

    /// Record outstanding working-tree changes as a trace-tagged commit.
    ///
    /// Stages everything, appends the Trace-Id trailer, and prints the
    /// new commit id. Fails cleanly when there is nothing to commit.
    Commit(CommitArgs),

    /// Show recent audit events.
    ///
    /// Prints the tail of the append-only audit log.
    Log(LogArgs),
}

/// Plan subcommands.
#[derive(Parser, Debug)]
pub struct PlanCommand {
    #[command(subcommand)]
    pub action: PlanAction,
}

/// Available plan actions.
#[derive(Subcommand, Debug)]
pub enum PlanAction {
    /// Create a new plan in the review area.
    ///
    /// Assigns the next plan number and a fresh trace id.
    New(PlanNewArgs),

    /// List plans grouped by review area.
    List,

    /// Show a plan document and where it lives.
    Show(PlanShowArgs),

    /// Approve a plan in review.
    ///
    /// Stamps approved_by/approved_at and moves the document to the
    /// approved area.
    Approve(PlanApproveArgs),

    /// Reject a plan in review.
    ///
    /// Requires a reason; moves the document to the rejected area under
    /// a timestamped name.
    Reject(PlanRejectArgs),

    /// Send a plan back for revision.
    ///
    /// Sets status to needs_revision and appends reviewer comments to
    /// the document, leaving it in the review area.
    Revise(PlanReviseArgs),
}

/// Arguments for the `plan new` command.
#[derive(Parser, Debug)]
pub struct PlanNewArgs {
    /// Title for the new plan.
    pub title: String,

    /// Markdown body for the plan. Defaults to a skeleton section.
    #[arg(long)]
    pub body: Option<String>,

    /// Trace id to adopt instead of generating one (UUID).
    #[arg(long)]
    pub trace: Option<String>,
}

/// Arguments for the `plan show` command.
#[derive(Parser, Debug)]
pub struct PlanShowArgs {
    /// Plan id to show (e.g., plan-001).
    pub plan_id: String,
}

/// Arguments for the `plan approve` command.
#[derive(Parser, Debug)]
pub struct PlanApproveArgs {
    /// Plan id to approve.
    pub plan_id: String,
}

/// Arguments for the `plan reject` command.
#[derive(Parser, Debug)]
pub struct PlanRejectArgs {
    /// Plan id to reject.
    pub plan_id: String,

    /// Reason for rejection (required).
    #[arg(short, long)]
    pub reason: String,
}

/// Arguments for the `plan revise` command.
#[derive(Parser, Debug)]
pub struct PlanReviseArgs {
    /// Plan id to send back.
    pub plan_id: String,

    /// Reviewer comments to append to the plan (required).
    #[arg(short, long)]
    pub comments: String,
}

/// Changeset subcommands.
#[derive(Parser, Debug)]
pub struct ChangesetCommand {
    #[command(subcommand)]
    pub action: ChangesetAction,
}

/// Available changeset actions.
#[derive(Subcommand, Debug)]
pub enum ChangesetAction {
    /// Allocate and check out a review branch for a request.
    ///
    /// Without --trace, the request id must name an approved plan and
    /// the plan's trace id is used.
    Open(ChangesetOpenArgs),

    /// List review branches with their derived status.
    List,

    /// Show one changeset's commits and metadata.
    Show(ChangesetShowArgs),

    /// Merge a pending changeset into trunk.
    ///
    /// Must be run from trunk. Records the merge commit in the audit log.
    Approve(ChangesetApproveArgs),

    /// Reject a pending changeset.
    ///
    /// Requires a reason; force-deletes the branch. Only the audit event
    /// survives.
    Reject(ChangesetRejectArgs),
}

/// Arguments for the `changeset open` command.
#[derive(Parser, Debug)]
pub struct ChangesetOpenArgs {
    /// Request id the branch belongs to (usually a plan id).
    pub request_id: String,

    /// Trace id for the branch name (UUID). Defaults to the trace of the
    /// approved plan named by the request id.
    #[arg(long)]
    pub trace: Option<String>,
}

/// Arguments for the `changeset show` command.
#[derive(Parser, Debug)]
pub struct ChangesetShowArgs {
    /// Branch name, request id, or trace prefix.
    pub reference: String,
}

/// Arguments for the `changeset approve` command.
#[derive(Parser, Debug)]
pub struct ChangesetApproveArgs {
    /// Branch name, request id, or trace prefix.
    pub reference: String,
}

/// Arguments for the `changeset reject` command.
#[derive(Parser, Debug)]
pub struct ChangesetRejectArgs {
    /// Branch name, request id, or trace prefix.
    pub reference: String,

    /// Reason for rejection (required).
    #[arg(short, long)]
    pub reason: String,
}

/// Arguments for the `commit` command.
#[derive(Parser, Debug)]
pub struct CommitArgs {
    /// One-line summary for the commit.
    pub summary: String,

    /// Longer description appended after the summary.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Trace id for the trailer. Defaults to the trace resolved from the
    /// current branch's history or name.
    #[arg(long)]
    pub trace: Option<String>,
}

/// Arguments for the `log` command.
#[derive(Parser, Debug)]
pub struct LogArgs {
    /// Show the last N audit events.
    #[arg(long, default_value_t = 20)]
    pub tail: usize,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
