//! # Commit Command Implementation
//!
//! Stages the requested paths and commits them. A run with nothing to commit
//! either fails (`NothingToCommit`) or, with `--only-if-changes`, succeeds as
//! a skipped no-op, so the command can be re-run safely in a pipeline.
//! `--push` pushes the new commit to `--remote` (default `origin`) and
//! `--branch` (default: the current branch).

use anyhow::Result;
use clap::Args;

use git_provision::commit::{commit, CommitSpec, PushTarget};
use git_provision::output::commit_lines;

use crate::cli::GlobalArgs;

/// Stage and commit changes
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Paths to stage with `git add -A`
    #[arg(short, long = "add", value_name = "PATH", num_args = 1.., default_value = ".")]
    pub add: Vec<String>,

    /// Commit message (required unless --amend)
    #[arg(short, long, value_name = "MSG")]
    pub message: Option<String>,

    /// Amend the previous commit
    #[arg(long)]
    pub amend: bool,

    /// Add a Signed-off-by trailer
    #[arg(short, long)]
    pub signoff: bool,

    /// Skip pre-commit and commit-msg hooks
    #[arg(long)]
    pub no_verify: bool,

    /// GPG-sign the commit
    #[arg(short = 'S', long)]
    pub gpg_sign: bool,

    /// Succeed without committing when there is nothing to commit
    #[arg(long)]
    pub only_if_changes: bool,

    /// Push after committing
    #[arg(long)]
    pub push: bool,

    /// Remote to push to (implies --push)
    #[arg(long, value_name = "REMOTE")]
    pub remote: Option<String>,

    /// Branch to push to (implies --push)
    #[arg(long, value_name = "BRANCH")]
    pub branch: Option<String>,
}

impl CommitArgs {
    fn spec(self) -> CommitSpec {
        let push = (self.push || self.remote.is_some() || self.branch.is_some()).then(|| {
            PushTarget {
                remote: self.remote,
                branch: self.branch,
            }
        });
        CommitSpec {
            paths: self.add,
            message: self.message,
            amend: self.amend,
            signoff: self.signoff,
            no_verify: self.no_verify,
            gpg_sign: self.gpg_sign,
            only_if_changes: self.only_if_changes,
            push,
        }
    }
}

/// Execute the `commit` command.
pub fn execute(args: CommitArgs, global: &GlobalArgs) -> Result<()> {
    let spec = args.spec();
    // Rejected before git is touched.
    spec.validate()?;

    let (exec, ctx) = super::open(global)?;
    let _guard = ctx.enter()?;

    super::announce(
        global,
        &format!("Committing {} in {}", spec.paths.join(" "), ctx.root().display()),
    );
    let outcome = commit(&exec, &ctx, &spec)?;

    super::report(global, &exec, &outcome, commit_lines(&global.output(), &outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CommitArgs,
    }

    fn parse(argv: &[&str]) -> CommitSpec {
        let mut full = vec!["commit"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args.spec()
    }

    #[test]
    fn test_defaults_to_whole_tree() {
        let spec = parse(&["-m", "init"]);
        assert_eq!(spec.paths, vec!["."]);
        assert_eq!(spec.message.as_deref(), Some("init"));
        assert_eq!(spec.push, None);
    }

    #[test]
    fn test_multiple_paths() {
        let spec = parse(&["--add", "src", "docs", "--add", "README.md", "-m", "x"]);
        assert_eq!(spec.paths, vec!["src", "docs", "README.md"]);
    }

    #[test]
    fn test_branch_implies_push() {
        let spec = parse(&["-m", "x", "--branch", "release"]);
        assert_eq!(
            spec.push,
            Some(PushTarget {
                remote: None,
                branch: Some("release".to_string()),
            })
        );
    }

    #[test]
    fn test_missing_message_fails_before_git() {
        let spec = parse(&[]);
        assert!(spec.validate().is_err());
        assert!(parse(&["--amend"]).validate().is_ok());
    }
}
