//! # Staging & Commit Orchestration
//!
//! Stages requested paths, decides whether a commit is warranted, commits,
//! and optionally pushes. The flow is a small state machine:
//!
//! ```text
//! Init -> Staged -> { Committed | NoOpSkipped } -> [Pushed]
//! ```
//!
//! Every terminal state is a success. "Nothing to commit" is only an error
//! when the caller did not opt into `only_if_changes`; git reporting nothing
//! to commit after staging (staged content identical to `HEAD`) is always a
//! no-op.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;

use crate::context::RepositoryContext;
use crate::error::{Error, Result};
use crate::exec::Executor;

/// Remote pushed to when none is given.
pub const DEFAULT_REMOTE: &str = "origin";

/// Where to push after committing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushTarget {
    /// Defaults to [`DEFAULT_REMOTE`].
    pub remote: Option<String>,
    /// Defaults to the current branch.
    pub branch: Option<String>,
}

/// Everything a commit run needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSpec {
    /// Paths staged with `git add -A` before committing.
    pub paths: Vec<String>,
    /// Required unless `amend` is set.
    pub message: Option<String>,
    pub amend: bool,
    pub signoff: bool,
    pub no_verify: bool,
    pub gpg_sign: bool,
    /// Treat an empty change set as success instead of an error.
    pub only_if_changes: bool,
    pub push: Option<PushTarget>,
}

impl CommitSpec {
    /// Checks that need no repository access.
    pub fn validate(&self) -> Result<()> {
        if !self.amend && self.message().is_none() {
            return Err(Error::MessageRequired);
        }
        Ok(())
    }

    fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }

    /// Arguments of the `git commit` invocation.
    pub fn commit_args(&self) -> Vec<String> {
        let mut args = vec!["commit".to_string()];
        if self.amend {
            args.push("--amend".to_string());
        }
        match self.message() {
            Some(message) => {
                args.push("-m".to_string());
                args.push(message.to_string());
            }
            None => args.push("--no-edit".to_string()),
        }
        if self.signoff {
            args.push("--signoff".to_string());
        }
        if self.no_verify {
            args.push("--no-verify".to_string());
        }
        if self.gpg_sign {
            args.push("-S".to_string());
        }
        args
    }
}

/// Staging state of the work tree. Always re-queried after a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub has_staged: bool,
    /// Tracked files with changes not yet staged.
    pub has_unstaged: bool,
    pub has_untracked: bool,
}

impl ChangeSet {
    /// Build from `git status --porcelain` (v1) lines.
    pub fn from_porcelain<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut changes = Self::default();
        for line in lines {
            let mut status = line.chars();
            let (Some(index), Some(worktree)) = (status.next(), status.next()) else {
                continue;
            };
            match (index, worktree) {
                ('?', '?') => changes.has_untracked = true,
                ('!', '!') => {}
                _ => {
                    changes.has_staged |= index != ' ';
                    changes.has_unstaged |= worktree != ' ';
                }
            }
        }
        changes
    }

    pub fn query(exec: &Executor, ctx: &RepositoryContext) -> Result<Self> {
        let lines = status_lines(exec, ctx, &[])?;
        let changes = Self::from_porcelain(lines.iter().map(String::as_str));
        debug!("change set: {:?}", changes);
        Ok(changes)
    }

    /// The change set a suppressed `git add -A -- <paths>` would have left:
    /// entries under `paths` count as staged, everything else is unchanged.
    fn projected_add(exec: &Executor, ctx: &RepositoryContext, paths: &[String]) -> Result<Self> {
        let picked: BTreeSet<String> = status_lines(exec, ctx, paths)?.into_iter().collect();
        let projected: Vec<String> = status_lines(exec, ctx, &[])?
            .into_iter()
            .map(|line| {
                if picked.contains(&line) {
                    format!("M  {}", line.get(3..).unwrap_or_default())
                } else {
                    line
                }
            })
            .collect();
        let changes = Self::from_porcelain(projected.iter().map(String::as_str));
        debug!("projected change set: {:?}", changes);
        Ok(changes)
    }

    pub fn is_clean(&self) -> bool {
        !self.has_staged && !self.has_unstaged && !self.has_untracked
    }

    /// What the change set would look like had a suppressed `git add -A`
    /// actually run.
    fn as_if_staged(self) -> Self {
        Self {
            has_staged: self.has_staged || self.has_unstaged || self.has_untracked,
            has_unstaged: false,
            has_untracked: false,
        }
    }
}

/// `git status --porcelain` lines, limited to `paths` when any are given.
fn status_lines(
    exec: &Executor,
    ctx: &RepositoryContext,
    paths: &[String],
) -> Result<Vec<String>> {
    let mut args = vec!["status", "--porcelain", "--untracked-files=all"];
    if !paths.is_empty() {
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
    }
    let status = exec.run(ctx, args.as_slice())?;
    Ok(status.lines().map(str::to_string).collect())
}

/// Terminal state of a commit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Nothing needed committing.
    NoOpSkipped { reason: String },
    /// A commit was created. `commit` is `None` in dry-run mode.
    Committed {
        commit: Option<String>,
        amended: bool,
    },
    Pushed {
        commit: Option<String>,
        amended: bool,
        remote: String,
        branch: String,
    },
}

impl CommitOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            CommitOutcome::NoOpSkipped { .. } => "no_op_skipped",
            CommitOutcome::Committed { .. } => "committed",
            CommitOutcome::Pushed { .. } => "pushed",
        }
    }

    fn skipped(reason: &str) -> Self {
        info!("skipping commit: {}", reason);
        CommitOutcome::NoOpSkipped {
            reason: reason.to_string(),
        }
    }
}

/// Stage, commit and optionally push according to `spec`.
pub fn commit(
    exec: &Executor,
    ctx: &RepositoryContext,
    spec: &CommitSpec,
) -> Result<CommitOutcome> {
    spec.validate()?;

    // Resolve the push target first so a detached HEAD is reported before
    // anything is staged or committed.
    let push = match &spec.push {
        Some(target) => Some(resolve_push_target(exec, ctx, target)?),
        None => None,
    };

    if !spec.paths.is_empty() {
        let mut add = vec!["add".to_string(), "-A".to_string(), "--".to_string()];
        add.extend(spec.paths.iter().cloned());
        exec.mutate(ctx, add.as_slice())?;
    }

    let mut changes = if exec.is_dry_run() && !spec.paths.is_empty() {
        ChangeSet::projected_add(exec, ctx, &spec.paths)?
    } else {
        ChangeSet::query(exec, ctx)?
    };

    if spec.only_if_changes && !changes.has_staged && !changes.has_untracked {
        return Ok(CommitOutcome::skipped("no staged or untracked changes"));
    }

    if !changes.has_staged && changes.has_untracked {
        info!("nothing staged but untracked files present; staging everything");
        exec.mutate(ctx, &["add", "-A"])?;
        changes = ChangeSet::query(exec, ctx)?;
        if exec.is_dry_run() {
            changes = changes.as_if_staged();
        }
    }

    if !changes.has_staged {
        if spec.only_if_changes {
            return Ok(CommitOutcome::skipped("nothing staged"));
        }
        if !spec.amend {
            return Err(Error::NothingToCommit);
        }
        debug!("amending without staged changes");
    }

    match exec.mutate(ctx, spec.commit_args().as_slice()) {
        Ok(_) => {}
        Err(Error::SubprocessFailed { stdout, stderr, .. })
            if reports_nothing_to_commit(&stdout) || reports_nothing_to_commit(&stderr) =>
        {
            return Ok(CommitOutcome::skipped("git reported nothing to commit"));
        }
        Err(e) => return Err(e),
    }

    let commit = if exec.is_dry_run() {
        None
    } else {
        let head = exec.run(ctx, &["rev-parse", "HEAD"])?;
        head.first_line().map(str::to_string)
    };
    info!(
        "committed {}",
        commit.as_deref().unwrap_or("(dry run)")
    );

    let Some((remote, branch)) = push else {
        return Ok(CommitOutcome::Committed {
            commit,
            amended: spec.amend,
        });
    };

    exec.mutate(ctx, &["push", remote.as_str(), branch.as_str()])?;
    info!("pushed {} to {}", branch, remote);
    Ok(CommitOutcome::Pushed {
        commit,
        amended: spec.amend,
        remote,
        branch,
    })
}

/// Commit exactly `paths` with `message`, leaving anything else staged
/// untouched. Returns `false` when git had nothing to commit.
pub(crate) fn commit_only(
    exec: &Executor,
    ctx: &RepositoryContext,
    message: &str,
    paths: &[&str],
) -> Result<bool> {
    let mut args = vec!["commit", "-m", message, "--"];
    args.extend_from_slice(paths);
    match exec.mutate(ctx, args.as_slice()) {
        Ok(_) => Ok(true),
        Err(Error::SubprocessFailed { stdout, stderr, .. })
            if reports_nothing_to_commit(&stdout) || reports_nothing_to_commit(&stderr) =>
        {
            info!("nothing to commit for {}", paths.join(", "));
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn reports_nothing_to_commit(output: &str) -> bool {
    let output = output.to_ascii_lowercase();
    output.contains("nothing to commit") || output.contains("no changes added to commit")
}

fn resolve_push_target(
    exec: &Executor,
    ctx: &RepositoryContext,
    target: &PushTarget,
) -> Result<(String, String)> {
    let remote = target
        .remote
        .clone()
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let branch = match &target.branch {
        Some(branch) => branch.clone(),
        None => current_branch(exec, ctx)?,
    };
    Ok((remote, branch))
}

/// The branch `HEAD` points at.
pub fn current_branch(exec: &Executor, ctx: &RepositoryContext) -> Result<String> {
    let result = exec.probe(ctx, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
    match result.exit_code {
        0 => result
            .first_line()
            .map(str::to_string)
            .ok_or(Error::DetachedHead),
        1 => Err(Error::DetachedHead),
        _ => Err(result.into_error()),
    }
}
