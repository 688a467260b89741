//! # Error Handling
//!
//! This module defines the error type shared by every repository mutation
//! in `git-provision`. It uses `thiserror` to build a single `Error` enum
//! whose variants mirror the ways a provisioning run can stop:
//!
//! - **Preconditions**: `git` is missing, or the target is not a work tree.
//! - **Refusals**: the repository is in a state where mutating it would not be
//!   safe or attributable (dirty tree, occupied destination, submodule already
//!   registered, detached `HEAD`).
//! - **Remote checks**: the submodule remote cannot be reached, or the
//!   requested branch does not exist there.
//! - **Subprocess failures**: `git` exited non-zero. The full argument vector
//!   and the verbatim stdout/stderr capture are kept so the operator sees
//!   git's own diagnosis.
//!
//! A "nothing to do" outcome is never an error; operations report it through
//! their success types (see [`crate::commit::CommitOutcome::NoOpSkipped`]).

use thiserror::Error;

/// Main error type for git-provision operations
#[derive(Error, Debug)]
pub enum Error {
    /// A precondition for running any operation was not met, e.g. the `git`
    /// executable could not be found.
    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    /// The path does not exist or git does not consider it part of a work tree.
    #[error("Not a git work tree: {path}")]
    NotARepository { path: String },

    /// The work tree has uncommitted tracked changes.
    #[error("Working tree at {path} has uncommitted changes ({} entries); commit or stash them, or pass --force", entries.len())]
    DirtyWorkingTree { path: String, entries: Vec<String> },

    /// The submodule destination already contains files.
    #[error("Destination is not empty: {path}")]
    DestinationNotEmpty { path: String },

    /// `git ls-remote` could not talk to the remote.
    #[error("Remote unreachable: {url}\n{stderr}")]
    RemoteUnreachable { url: String, stderr: String },

    /// The requested branch has no head on the remote.
    #[error("Branch '{branch}' not found on remote {url}")]
    BranchNotFound { url: String, branch: String },

    /// A submodule is already registered at the requested path.
    #[error("A submodule is already configured at '{path}' (name: {name}); pass --update to repoint it")]
    AlreadyConfigured { path: String, name: String },

    /// Nothing was staged and the caller did not allow a no-op.
    #[error("Nothing to commit")]
    NothingToCommit,

    /// A commit message is required unless amending.
    #[error("A commit message is required unless amending")]
    MessageRequired,

    /// `HEAD` does not point at a named branch, so there is nothing to push.
    #[error("HEAD is detached; specify a branch to push")]
    DetachedHead,

    /// A request argument was rejected before touching the repository.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// `git` exited with a non-zero status.
    ///
    /// The captured output is rendered verbatim.
    #[error("git {} failed with exit code {exit_code}{}{}", argv.join(" "), render_stream("stdout", stdout), render_stream("stderr", stderr))]
    SubprocessFailed {
        argv: Vec<String>,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// `git` did not finish within the configured timeout and was killed.
    #[error("git {} timed out after {seconds}s", argv.join(" "))]
    TimedOut { argv: Vec<String>, seconds: u64 },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is one of the precondition failures reported before
    /// any repository state is inspected.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::PreconditionFailed { .. } | Error::NotARepository { .. }
        )
    }
}

fn render_stream(label: &str, content: &str) -> String {
    if content.trim().is_empty() {
        String::new()
    } else {
        format!("\n--- {} ---\n{}", label, content.trim_end())
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_subprocess_failed_includes_output_verbatim() {
        let error = Error::SubprocessFailed {
            argv: vec!["commit".to_string(), "-m".to_string(), "init".to_string()],
            exit_code: 128,
            stdout: String::new(),
            stderr: "fatal: Unable to create '/repo/.git/index.lock': File exists.\n".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("git commit -m init failed with exit code 128"));
        assert!(display.contains("--- stderr ---"));
        assert!(display.contains("fatal: Unable to create '/repo/.git/index.lock': File exists."));
        assert!(!display.contains("--- stdout ---"));
    }

    #[test]
    fn test_error_display_branch_not_found() {
        let error = Error::BranchNotFound {
            url: "https://example.com/lib.git".to_string(),
            branch: "release".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("'release'"));
        assert!(display.contains("https://example.com/lib.git"));
    }

    #[test]
    fn test_error_display_dirty_tree_counts_entries() {
        let error = Error::DirtyWorkingTree {
            path: "/work/app".to_string(),
            entries: vec![" M src/main.c".to_string(), "M  README.md".to_string()],
        };
        let display = format!("{}", error);
        assert!(display.contains("/work/app"));
        assert!(display.contains("2 entries"));
        assert!(display.contains("--force"));
    }

    #[test]
    fn test_error_display_already_configured() {
        let error = Error::AlreadyConfigured {
            path: "external/blaze".to_string(),
            name: "blaze".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("external/blaze"));
        assert!(display.contains("--update"));
    }

    #[test]
    fn test_error_timed_out() {
        let error = Error::TimedOut {
            argv: vec!["fetch".to_string(), "origin".to_string()],
            seconds: 30,
        };
        assert_eq!(format!("{}", error), "git fetch origin timed out after 30s");
    }

    #[test]
    fn test_is_precondition() {
        assert!(Error::PreconditionFailed {
            message: "git not found".to_string()
        }
        .is_precondition());
        assert!(Error::NotARepository {
            path: "/tmp".to_string()
        }
        .is_precondition());
        assert!(!Error::NothingToCommit.is_precondition());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }
}
