//! # git-provision
//!
//! Safe, re-runnable mutations of a git work tree for build automation:
//! line-ending policy configuration, staged-change commits and submodule
//! provisioning. It is designed to be used by the `git-provision`
//! command-line tool but the operations are plain library functions.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use git_provision::commit::{commit, CommitSpec};
//! use git_provision::context::RepositoryContext;
//! use git_provision::exec::{Executor, ExecutorOptions};
//!
//! let exec = Executor::new(ExecutorOptions::default());
//! let ctx = RepositoryContext::resolve(&exec, Path::new("."))?;
//!
//! let spec = CommitSpec {
//!     paths: vec![".".to_string()],
//!     message: Some("Create project structure".to_string()),
//!     only_if_changes: true,
//!     ..CommitSpec::default()
//! };
//! let outcome = commit(&exec, &ctx, &spec)?;
//! println!("{}", outcome.status());
//! # Ok::<(), git_provision::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Executor (`exec`)**: the only place git is spawned. Captures stdout and
//!   stderr separately, classifies stderr lines and turns non-zero exits into
//!   [`error::Error::SubprocessFailed`]. Mutations go through
//!   [`exec::Executor::mutate`], which dry-run mode suppresses.
//! - **Repository Context (`context`)**: a validated work tree root passed to
//!   every executor call.
//! - **Operations (`eol`, `commit`, `submodule`)**: each one validates its
//!   preconditions, detects the current state, mutates only what differs and
//!   reports an outcome that separates "nothing to do" from real work.

pub mod commit;
pub mod context;
pub mod eol;
pub mod error;
pub mod exec;
pub mod output;
pub mod submodule;
