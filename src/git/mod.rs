//! Git automation: command execution, branch allocation, commit recording,
//! repository lifecycle, and history inspection.

pub mod branch;
pub mod commit;
pub mod history;
pub mod repository;
pub mod runner;

pub use runner::{GitOutput, GitRunner, RunOptions};
