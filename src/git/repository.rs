//! Repository lifecycle: detect or create the repository, pin the trunk
//! branch, set a fallback bot identity, and seed an initial commit so
//! branch creation has something to point at.

use crate::config::Config;
use crate::context::ReviewContext;
use crate::error::{GitResult, Result, WardenError};
use crate::fs::atomic_write_str;
use crate::git::GitRunner;
use std::fs;

/// What `ensure_repository` had to do to make the repository usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositorySetup {
    pub repository_created: bool,
    pub initial_commit_created: bool,
}

/// Bring the repository to a reviewable state. Safe to run repeatedly.
pub fn ensure_repository(
    ctx: &ReviewContext,
    config: &Config,
    git: &GitRunner,
) -> Result<RepositorySetup> {
    let mut setup = RepositorySetup::default();

    if !ctx.has_repository() {
        git.run(&["init"])?;
        // Pin HEAD before the first commit so the trunk name matches the
        // configured one regardless of the git default.
        git.run(&[
            "symbolic-ref",
            "HEAD",
            &format!("refs/heads/{}", config.trunk_branch),
        ])?;
        setup.repository_created = true;
    }

    ensure_state_dir_ignored(ctx)?;
    ensure_identity(git, config)?;

    if !head_commit_exists(git) {
        initial_commit(git)?;
        setup.initial_commit_created = true;
    }

    Ok(setup)
}

/// Set repo-local user.name/user.email to the configured bot identity
/// when git resolves no identity at all.
pub fn ensure_identity(git: &GitRunner, config: &Config) -> GitResult<()> {
    ensure_config_value(git, "user.name", &config.bot_name)?;
    ensure_config_value(git, "user.email", &config.bot_email)?;
    Ok(())
}

fn ensure_config_value(git: &GitRunner, key: &str, fallback: &str) -> GitResult<()> {
    let configured = matches!(git.run(&["config", key]), Ok(out) if !out.stdout.is_empty());
    if !configured {
        git.run(&["config", key, fallback])?;
    }
    Ok(())
}

/// Whether HEAD points at a commit yet.
pub fn head_commit_exists(git: &GitRunner) -> bool {
    git.run(&["rev-parse", "--verify", "HEAD"]).is_ok()
}

fn initial_commit(git: &GitRunner) -> GitResult<()> {
    git.run(&["add", "-A"])?;
    git.run_with(
        &["commit", "--allow-empty", "-m", "Initialize repository"],
        &git.options().with_lock_retry(),
    )?;
    Ok(())
}

/// Make sure the review state directory never ends up in a commit.
fn ensure_state_dir_ignored(ctx: &ReviewContext) -> Result<()> {
    let entry = format!("{}/", crate::context::DEFAULT_STATE_DIR);
    let gitignore_path = ctx.repo_root.join(".gitignore");

    let existing = fs::read_to_string(&gitignore_path).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&entry);
    content.push('\n');

    atomic_write_str(&gitignore_path, &content).map_err(|e| {
        WardenError::UserError(format!(
            "Failed to update {}: {}",
            gitignore_path.display(),
            e
        ))
    })
}
