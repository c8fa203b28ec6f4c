//! History queries over review branches.
//!
//! A changeset is described entirely by repository history: its commits,
//! the files it touches relative to trunk, and the trace id recovered
//! from commit trailers.

use crate::error::GitResult;
use crate::git::GitRunner;
use crate::git::commit::trace_from_message;
use chrono::{DateTime, TimeZone, Utc};

/// One commit on a review branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub summary: String,
}

/// Record separator for multi-commit log parsing.
const RECORD_SEP: char = '\x1e';

/// Commits reachable from `branch` but not `trunk`, oldest first.
pub fn commits_since_trunk(
    git: &GitRunner,
    trunk: &str,
    branch: &str,
) -> GitResult<Vec<CommitInfo>> {
    let range = format!("{}..{}", trunk, branch);
    let out = git.run(&[
        "log",
        "--reverse",
        "--pretty=format:%H%x09%ct%x09%an%x09%s",
        &range,
    ])?;

    let mut commits = Vec::new();
    for line in out.lines() {
        let mut fields = line.splitn(4, '\t');
        let (Some(sha), Some(ct), Some(author), Some(summary)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            continue;
        };
        let Ok(seconds) = ct.parse::<i64>() else {
            continue;
        };
        let Some(timestamp) = Utc.timestamp_opt(seconds, 0).single() else {
            continue;
        };
        commits.push(CommitInfo {
            sha: sha.to_string(),
            timestamp,
            author: author.to_string(),
            summary: summary.to_string(),
        });
    }
    Ok(commits)
}

/// How many files differ between the trunk merge base and the branch tip.
pub fn files_changed_since_trunk(git: &GitRunner, trunk: &str, branch: &str) -> GitResult<usize> {
    let range = format!("{}...{}", trunk, branch);
    let out = git.run(&["diff", "--name-only", &range])?;
    Ok(out.lines().len())
}

/// The trace id carried by the branch's commits, if any. The most recent
/// commit with a trailer wins.
pub fn branch_trace_id(git: &GitRunner, trunk: &str, branch: &str) -> GitResult<Option<String>> {
    let range = format!("{}..{}", trunk, branch);
    let format = format!("--pretty=format:%B{}", RECORD_SEP);
    let out = git.run(&["log", &format, &range])?;

    for body in out.stdout.split(RECORD_SEP) {
        if let Some(trace) = trace_from_message(body) {
            return Ok(Some(trace.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::commit::{CommitRequest, record_commit};
    use crate::test_support::{RecordingAudit, create_test_repo, git};
    use tempfile::TempDir;

    const TRACE: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn repo_with_branch(temp: &TempDir) -> (Config, RecordingAudit) {
        create_test_repo(temp.path());
        git(temp.path(), &["checkout", "-b", "feat/req-001-550e8400"]);
        (Config::default(), RecordingAudit::default())
    }

    #[test]
    fn lists_branch_commits_oldest_first() {
        let temp = TempDir::new().unwrap();
        let (config, audit) = repo_with_branch(&temp);
        let runner = GitRunner::new(temp.path(), &config, &audit);

        std::fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        record_commit(
            &runner,
            &CommitRequest {
                summary: "First change",
                description: None,
                trace_id: Some(TRACE),
            },
        )
        .unwrap();
        std::fs::write(temp.path().join("b.txt"), "b\n").unwrap();
        record_commit(
            &runner,
            &CommitRequest {
                summary: "Second change",
                description: None,
                trace_id: Some(TRACE),
            },
        )
        .unwrap();

        let commits = commits_since_trunk(&runner, "main", "feat/req-001-550e8400").unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].summary, "First change");
        assert_eq!(commits[1].summary, "Second change");
        assert!(commits[0].timestamp <= commits[1].timestamp);
        assert_eq!(commits[0].author, "Test User");
    }

    #[test]
    fn branch_with_no_own_commits_is_empty() {
        let temp = TempDir::new().unwrap();
        let (config, audit) = repo_with_branch(&temp);
        let runner = GitRunner::new(temp.path(), &config, &audit);

        let commits = commits_since_trunk(&runner, "main", "feat/req-001-550e8400").unwrap();
        assert!(commits.is_empty());
        assert_eq!(
            files_changed_since_trunk(&runner, "main", "feat/req-001-550e8400").unwrap(),
            0
        );
    }

    #[test]
    fn counts_files_touched_on_the_branch() {
        let temp = TempDir::new().unwrap();
        let (config, audit) = repo_with_branch(&temp);
        let runner = GitRunner::new(temp.path(), &config, &audit);

        std::fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        std::fs::write(temp.path().join("b.txt"), "b\n").unwrap();
        record_commit(
            &runner,
            &CommitRequest {
                summary: "Two files",
                description: None,
                trace_id: Some(TRACE),
            },
        )
        .unwrap();

        assert_eq!(
            files_changed_since_trunk(&runner, "main", "feat/req-001-550e8400").unwrap(),
            2
        );
    }

    #[test]
    fn recovers_the_trace_id_from_trailers() {
        let temp = TempDir::new().unwrap();
        let (config, audit) = repo_with_branch(&temp);
        let runner = GitRunner::new(temp.path(), &config, &audit);

        std::fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        record_commit(
            &runner,
            &CommitRequest {
                summary: "Tagged change",
                description: None,
                trace_id: Some(TRACE),
            },
        )
        .unwrap();

        assert_eq!(
            branch_trace_id(&runner, "main", "feat/req-001-550e8400").unwrap(),
            Some(TRACE.to_string())
        );
    }

    #[test]
    fn branch_without_trailers_has_no_trace() {
        let temp = TempDir::new().unwrap();
        let (config, audit) = repo_with_branch(&temp);
        let runner = GitRunner::new(temp.path(), &config, &audit);

        std::fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        git(temp.path(), &["add", "-A"]);
        git(temp.path(), &["commit", "-m", "Untagged change"]);

        assert_eq!(
            branch_trace_id(&runner, "main", "feat/req-001-550e8400").unwrap(),
            None
        );
    }
}
