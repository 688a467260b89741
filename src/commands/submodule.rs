//! # Submodule Command Implementation
//!
//! Registers a submodule at a path and commits the registration. With
//! `--update`, an existing registration at the same path is repointed to the
//! given URL and branch instead of being refused.

use anyhow::Result;
use clap::Args;

use git_provision::output::submodule_lines;
use git_provision::submodule::{provision, SubmoduleOptions, SubmoduleRecord};

use crate::cli::GlobalArgs;

/// Add or repoint a submodule
#[derive(Args, Debug)]
pub struct SubmoduleArgs {
    /// Repository URL of the submodule
    #[arg(value_name = "URL")]
    pub url: String,

    /// Path of the submodule inside the repository
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Submodule name (defaults to the path)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Branch to track (defaults to the remote's default branch)
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Initialize nested submodules
    #[arg(short, long)]
    pub recursive: bool,

    /// Clone with --depth 1
    #[arg(long)]
    pub shallow: bool,

    /// Repoint the submodule if the path is already registered
    #[arg(short, long)]
    pub update: bool,

    /// Skip the clean working tree check
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the `submodule` command.
pub fn execute(args: SubmoduleArgs, global: &GlobalArgs) -> Result<()> {
    let record = SubmoduleRecord::new(args.url, &args.path, args.name, args.branch)?;
    let options = SubmoduleOptions {
        recursive: args.recursive,
        shallow: args.shallow,
        update: args.update,
        force: args.force,
    };

    let (exec, ctx) = super::open(global)?;
    let _guard = ctx.enter()?;

    super::announce(
        global,
        &format!("Provisioning submodule {} from {}", record.path, record.url),
    );
    let outcome = provision(&exec, &ctx, &record, options)?;

    super::report(global, &exec, &outcome, submodule_lines(&global.output(), &outcome))
}
