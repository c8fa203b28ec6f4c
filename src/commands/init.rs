//! Implementation of the `warden init` command.
//!
//! Bootstraps the review state in the current repository.
//!
//! # What `warden init` does
//!
//! 1. Creates the repository itself if none exists (with an initial commit)
//! 2. Ensures `.warden/` is listed in the repository `.gitignore`
//! 3. Ensures a committer identity is configured (bot fallback)
//! 4. Creates review state directories: review/, approved/, rejected/,
//!    archive/, audit/
//! 5. Creates `config.yaml` with defaults (if missing)
//! 6. Appends a workflow_init audit event

use crate::audit::{AuditAction, AuditEvent, AuditSink, FileAuditLog};
use crate::config::Config;
use crate::context::ReviewContext;
use crate::error::{Result, WardenError};
use crate::fs::atomic_write_str;
use crate::git::GitRunner;
use crate::git::repository::ensure_repository;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Execute the `warden init` command.
///
/// This command is **idempotent**: running it multiple times will not error
/// and will not cause destructive changes to existing review state.
pub fn cmd_init() -> Result<()> {
    let ctx = ReviewContext::resolve()?;

    // Scaffold state directories and default config before anything else,
    // so the audit sink has a place to write.
    create_state_structure(&ctx)?;

    let config = Config::load(&ctx.config_path())?;
    let audit = FileAuditLog::new(ctx.audit_file());
    let git = GitRunner::new(&ctx.repo_root, &config, &audit);

    let setup = ensure_repository(&ctx, &config, &git)?;

    audit.record(
        &AuditEvent::new(AuditAction::WorkflowInit).with_details(json!({
            "repository_created": setup.repository_created,
            "initial_commit_created": setup.initial_commit_created,
            "trunk_branch": config.trunk_branch,
            "state_dir": ctx.state_dir.display().to_string(),
        })),
    );

    // Print success message
    println!("Initialized warden review state.");
    println!();
    println!(
        "Repository:   {} ({})",
        ctx.repo_root.display(),
        if setup.repository_created {
            "created"
        } else {
            "existing"
        }
    );
    println!("Trunk branch: {}", config.trunk_branch);
    println!();
    println!("Created directories:");
    println!("  .warden/review/");
    println!("  .warden/approved/");
    println!("  .warden/rejected/");
    println!("  .warden/archive/");
    println!("  .warden/audit/");
    println!();
    println!("You can now create plans with `warden plan new \"plan title\"`.");

    Ok(())
}

/// Create the review state directory structure and default config.
fn create_state_structure(ctx: &ReviewContext) -> Result<()> {
    let dirs = [
        ctx.review_dir(),
        ctx.approved_dir(),
        ctx.rejected_dir(),
        ctx.archive_dir(),
        ctx.audit_dir(),
    ];
    for dir in &dirs {
        create_dir(dir)?;
    }

    let config_path = ctx.config_path();
    if !config_path.exists() {
        let yaml = Config::default().to_yaml()?;
        atomic_write_str(&config_path, &yaml)?;
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        WardenError::UserError(format!(
            "Failed to create state directory '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::read_events;
    use crate::test_support::{DirGuard, create_test_repo};
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn init_scaffolds_repository_and_state() {
        let temp = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp.path());

        cmd_init().unwrap();

        let ctx = ReviewContext::resolve_from(temp.path());
        assert!(ctx.repo_root.join(".git").is_dir());
        assert!(ctx.review_dir().is_dir());
        assert!(ctx.approved_dir().is_dir());
        assert!(ctx.rejected_dir().is_dir());
        assert!(ctx.archive_dir().is_dir());
        assert!(ctx.audit_dir().is_dir());
        assert!(ctx.config_path().is_file());

        let gitignore = fs::read_to_string(ctx.repo_root.join(".gitignore")).unwrap();
        assert!(gitignore.contains(".warden/"));

        let events = read_events(&ctx.audit_file()).unwrap();
        assert!(
            events
                .iter()
                .any(|e| e.action == AuditAction::WorkflowInit)
        );
    }

    #[test]
    #[serial]
    fn init_twice_preserves_existing_config() {
        let temp = TempDir::new().unwrap();
        let _guard = DirGuard::new(temp.path());

        cmd_init().unwrap();

        let ctx = ReviewContext::resolve_from(temp.path());
        let custom = "trunk_branch: release\n";
        fs::write(ctx.config_path(), custom).unwrap();

        cmd_init().unwrap();

        let kept = fs::read_to_string(ctx.config_path()).unwrap();
        assert_eq!(kept, custom);
    }

    #[test]
    #[serial]
    fn init_inside_an_existing_repository_keeps_history() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let _guard = DirGuard::new(temp.path());

        let head_before = crate::test_support::git_stdout(temp.path(), &["rev-parse", "HEAD"]);
        cmd_init().unwrap();

        assert_eq!(
            crate::test_support::git_stdout(temp.path(), &["rev-parse", "HEAD"]),
            head_before
        );
    }
}
