//! Exit code constants for the warden CLI.
//!
//! One code per failure class so callers (agents, wrapper scripts) can
//! branch on the outcome without parsing stderr:
//! - 0: Success
//! - 1: User error (bad args, precondition violation)
//! - 2: Nothing to commit (recoverable, clean working tree)
//! - 3: Git operation failure
//! - 4: Repository lock held after retries
//! - 5: Git command timed out

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, unknown item, or a violated precondition.
pub const USER_ERROR: i32 = 1;

/// The working tree had no changes to record.
pub const NOTHING_TO_COMMIT: i32 = 2;

/// Git operation failure: repository state, corruption, or unclassified exit.
pub const GIT_FAILURE: i32 = 3;

/// A repository lock was still held after the retry window closed.
pub const LOCK_FAILURE: i32 = 4;

/// A git command exceeded its timeout and was killed.
pub const TIMEOUT_FAILURE: i32 = 5;
