//! Command implementations for warden.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Command handlers resolve the review context, wire up
//! the audit sink and git runner, and delegate to the review and git
//! layers.

mod changeset;
mod commit;
mod init;
mod log;
mod plan;

use crate::cli::{ChangesetAction, ChangesetCommand, Command, PlanAction, PlanCommand};
use crate::context::ReviewContext;
use crate::error::{Result, WardenError};

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init => init::cmd_init(),
        Command::Plan(plan_cmd) => dispatch_plan(plan_cmd),
        Command::Changeset(changeset_cmd) => dispatch_changeset(changeset_cmd),
        Command::Commit(args) => commit::cmd_commit(args),
        Command::Log(args) => log::cmd_log(args),
    }
}

/// Dispatch plan subcommands.
fn dispatch_plan(plan_cmd: PlanCommand) -> Result<()> {
    match plan_cmd.action {
        PlanAction::New(args) => plan::cmd_new(args),
        PlanAction::List => plan::cmd_list(),
        PlanAction::Show(args) => plan::cmd_show(args),
        PlanAction::Approve(args) => plan::cmd_approve(args),
        PlanAction::Reject(args) => plan::cmd_reject(args),
        PlanAction::Revise(args) => plan::cmd_revise(args),
    }
}

/// Dispatch changeset subcommands.
fn dispatch_changeset(changeset_cmd: ChangesetCommand) -> Result<()> {
    match changeset_cmd.action {
        ChangesetAction::Open(args) => changeset::cmd_open(args),
        ChangesetAction::List => changeset::cmd_list(),
        ChangesetAction::Show(args) => changeset::cmd_show(args),
        ChangesetAction::Approve(args) => changeset::cmd_approve(args),
        ChangesetAction::Reject(args) => changeset::cmd_reject(args),
    }
}

/// Branch and commit commands need an actual repository, not just state.
fn require_repository(ctx: &ReviewContext) -> Result<()> {
    if !ctx.has_repository() {
        return Err(WardenError::UserError(format!(
            "No git repository found at {}.\n\n\
             Run `warden init` to create one.",
            ctx.repo_root.display()
        )));
    }
    Ok(())
}
