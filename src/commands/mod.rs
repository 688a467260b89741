//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `git-provision` command-line tool. Each subcommand is defined in its own
//! file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` plus the global
//!   options, resolves the repository, runs one library operation and prints
//!   its outcome.

pub mod commit;
pub mod completions;
pub mod eol;
pub mod submodule;

use anyhow::{Context, Result};
use serde::Serialize;

use git_provision::context::RepositoryContext;
use git_provision::exec::Executor;
use git_provision::output::{emoji, planned_lines, Report};

use crate::cli::GlobalArgs;

/// Build the executor and resolve the target work tree.
fn open(global: &GlobalArgs) -> Result<(Executor, RepositoryContext)> {
    let exec = global.executor();
    let ctx = RepositoryContext::resolve(&exec, &global.repo)?;
    Ok((exec, ctx))
}

/// Print the dry-run banner unless JSON output was requested.
fn announce(global: &GlobalArgs, title: &str) {
    if global.json {
        return;
    }
    let out = global.output();
    println!("{} {}", emoji(&out, "🔧", "[RUN]"), title);
    if global.dry_run {
        println!(
            "{} DRY RUN MODE - No changes will be made",
            emoji(&out, "🔎", "[DRY-RUN]")
        );
    }
}

/// Print an outcome, either as JSON or as the given report lines preceded
/// by any suppressed mutations.
fn report<T: Serialize>(
    global: &GlobalArgs,
    exec: &Executor,
    outcome: &T,
    lines: Vec<String>,
) -> Result<()> {
    let planned = exec.planned_actions();
    if global.json {
        let json = Report::new(outcome, exec.is_dry_run(), &planned)
            .to_json()
            .context("Failed to serialize outcome")?;
        println!("{}", json);
        return Ok(());
    }

    for line in planned_lines(&global.output(), &planned) {
        println!("{}", line);
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
