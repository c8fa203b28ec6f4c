//! Implementation of the `warden log` command.
//!
//! Prints the tail of the append-only audit log in a fixed-width layout,
//! one event per line.

use crate::audit::read_events;
use crate::cli::LogArgs;
use crate::context::require_initialized;
use crate::error::Result;

/// Execute the `warden log` command.
pub fn cmd_log(args: LogArgs) -> Result<()> {
    let ctx = require_initialized()?;
    let events = read_events(&ctx.audit_file())?;

    if events.is_empty() {
        println!("No audit events recorded yet.");
        return Ok(());
    }

    let shown = events.len().min(args.tail);
    let start = events.len() - shown;

    println!("Audit log (last {} of {} events)", shown, events.len());
    println!();
    for event in &events[start..] {
        let action = event.action.to_string();
        let target = event.target.as_deref().unwrap_or("-");
        let trace = event
            .trace
            .as_deref()
            .map(|t| t.get(..8).unwrap_or(t))
            .unwrap_or("-");
        println!(
            "  {}  {:23}  {:8}  {:28}  {}",
            event.ts.format("%Y-%m-%d %H:%M:%S UTC"),
            action,
            trace,
            target,
            event.actor
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PlanNewArgs;
    use crate::commands::init::cmd_init;
    use crate::commands::plan::cmd_new;
    use crate::test_support::{DirGuard, create_test_repo};
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn log_prints_recorded_events() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let _guard = DirGuard::new(temp.path());

        cmd_init().unwrap();
        cmd_new(PlanNewArgs {
            title: "Add caching".to_string(),
            body: None,
            trace: None,
        })
        .unwrap();

        assert!(cmd_log(LogArgs { tail: 20 }).is_ok());
        // A tail shorter than the log is a clamp, not an error.
        assert!(cmd_log(LogArgs { tail: 1 }).is_ok());
    }

    #[test]
    #[serial]
    fn log_requires_initialized_state() {
        let temp = TempDir::new().unwrap();
        create_test_repo(temp.path());
        let _guard = DirGuard::new(temp.path());

        let err = cmd_log(LogArgs { tail: 20 }).unwrap_err();
        assert!(err.to_string().contains("warden init"));
    }
}
