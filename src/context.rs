//! Review context resolution.
//!
//! Finds the repository root from any working directory and resolves the
//! canonical review state paths under it. All commands locate state through
//! this module so operations always target `{repo_root}/.warden/` no matter
//! where they are invoked from.
//!
//! Root discovery walks up looking for a `.git` marker instead of shelling
//! out, because `warden init` must be able to resolve a context in a
//! directory that is not a repository yet.

use crate::error::{Result, WardenError};
use std::env;
use std::path::{Path, PathBuf};

/// Review state directory name, relative to the repository root.
pub const DEFAULT_STATE_DIR: &str = ".warden";

/// Resolved paths for one warden invocation.
///
/// Constructed once per process and passed to every component that needs it.
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct ReviewContext {
    /// Repository root: the directory holding `.git`, or the invocation
    /// directory when no repository exists yet (pre-`init`).
    pub repo_root: PathBuf,

    /// Review state directory (`{repo_root}/.warden/`).
    pub state_dir: PathBuf,
}

impl ReviewContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            WardenError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Ok(Self::resolve_from(&cwd))
    }

    /// Resolve the context from a specific directory.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Self {
        let cwd = cwd.as_ref();
        let repo_root = find_repository_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
        let state_dir = repo_root.join(DEFAULT_STATE_DIR);
        Self {
            repo_root,
            state_dir,
        }
    }

    /// Whether a repository marker exists at the root.
    pub fn has_repository(&self) -> bool {
        self.repo_root.join(".git").exists()
    }

    /// Whether the review state directory has been scaffolded.
    pub fn state_exists(&self) -> bool {
        self.state_dir.exists()
    }

    /// Ensure the review workflow is initialized, erroring otherwise.
    ///
    /// Called by every command except `init` so users get pointed at the
    /// right fix instead of a missing-directory error.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.state_dir.exists() {
            return Err(WardenError::UserError(format!(
                "review workflow not initialized.\n\
                 Expected state directory at: {}\n\n\
                 Run `warden init` to initialize review state in this repository.",
                self.state_dir.display()
            )));
        }
        Ok(())
    }

    /// Pending-review plans (`review` and `needs_revision` live here).
    pub fn review_dir(&self) -> PathBuf {
        self.state_dir.join("review")
    }

    /// Approved plans.
    pub fn approved_dir(&self) -> PathBuf {
        self.state_dir.join("approved")
    }

    /// Rejected plans, stored under timestamped names.
    pub fn rejected_dir(&self) -> PathBuf {
        self.state_dir.join("rejected")
    }

    /// Displaced terminal copies land here rather than being overwritten.
    pub fn archive_dir(&self) -> PathBuf {
        self.state_dir.join("archive")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.state_dir.join("audit")
    }

    /// Append-only audit log.
    pub fn audit_file(&self) -> PathBuf {
        self.audit_dir().join("audit.ndjson")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }
}

/// Walk up from `start` until a directory containing `.git` is found.
fn find_repository_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Resolve context and require initialized review state.
///
/// Used by every command except `init`.
pub fn require_initialized() -> Result<ReviewContext> {
    let ctx = ReviewContext::resolve()?;
    ctx.ensure_initialized()?;
    Ok(ctx)
}
