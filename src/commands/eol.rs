//! # Eol Command Implementation
//!
//! Applies the line-ending policy declared by the last wildcard rule in
//! `.gitattributes` (`core.eol`, `core.autocrlf`), makes sure
//! `core.safecrlf` is set, and renormalizes tracked files. Running it again
//! on unchanged content reports zero affected files.

use anyhow::Result;
use clap::Args;

use git_provision::eol;
use git_provision::output::eol_lines;

use crate::cli::GlobalArgs;

/// Apply the .gitattributes line-ending policy
#[derive(Args, Debug)]
pub struct EolArgs {}

/// Execute the `eol` command.
pub fn execute(_args: EolArgs, global: &GlobalArgs) -> Result<()> {
    let (exec, ctx) = super::open(global)?;
    let _guard = ctx.enter()?;

    super::announce(
        global,
        &format!("Configuring line endings in {}", ctx.root().display()),
    );
    let outcome = eol::configure(&exec, &ctx)?;

    super::report(global, &exec, &outcome, eol_lines(&global.output(), &outcome))
}
