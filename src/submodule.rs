//! # Submodule Provisioning
//!
//! Registers a submodule at a path, or repoints an existing registration to a
//! new URL/branch, and commits the result.
//!
//! A submodule is identified by its **path**: `.gitmodules` may register one
//! submodule per path. The registry is read and written only through
//! `git config -f .gitmodules`.
//!
//! ## Preflight
//!
//! Nothing is mutated until all of these pass, in this order:
//!
//! 1. git is reachable and the target is a work tree (the caller's
//!    [`RepositoryContext`]).
//! 2. The tracked tree is clean, unless `force` or `update` is set.
//! 3. The path is not registered yet, unless `update` is set.
//! 4. For a new registration, the destination is absent or empty.
//! 5. The remote answers `git ls-remote`, and has the requested branch.
//!
//! ## Known limitation
//!
//! The mutating steps are not transactional. If a step after
//! `git submodule add` fails, the repository can be left with a registered
//! but uncommitted submodule; the error of the failing step is returned and
//! nothing is rolled back.

use std::fs;

use log::{debug, info, warn};
use serde::Serialize;

use crate::commit::commit_only;
use crate::context::RepositoryContext;
use crate::error::{Error, Result};
use crate::exec::Executor;

/// Name of the submodule registry at the work tree root.
pub const MODULES_FILE: &str = ".gitmodules";

/// A submodule registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmoduleRecord {
    pub name: String,
    pub url: String,
    /// Path relative to the work tree root, `/`-separated.
    pub path: String,
    /// Tracked branch; `None` tracks the remote's default branch.
    pub branch: Option<String>,
}

impl SubmoduleRecord {
    /// Build a record, normalizing `path` and defaulting `name` to it.
    pub fn new(
        url: impl Into<String>,
        path: &str,
        name: Option<String>,
        branch: Option<String>,
    ) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidArgument {
                message: "submodule URL must not be empty".to_string(),
            });
        }
        let path = normalize_path(path)?;
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| path.clone());
        let branch = branch
            .map(|branch| branch.trim().to_string())
            .filter(|branch| !branch.is_empty());
        Ok(Self {
            name,
            url,
            path,
            branch,
        })
    }

    fn key(&self, field: &str) -> String {
        format!("submodule.{}.{}", self.name, field)
    }

    fn branch_suffix(&self) -> String {
        self.branch
            .as_deref()
            .map(|branch| format!(" (branch {})", branch))
            .unwrap_or_default()
    }
}

/// Normalize a submodule path to the form `.gitmodules` records.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    let normalized = normalized.trim_end_matches('/').to_string();

    let invalid = |reason: &str| Error::InvalidArgument {
        message: format!("submodule path '{}' {}", path, reason),
    };
    if normalized.is_empty() || normalized == "." {
        return Err(invalid("is empty"));
    }
    if normalized.starts_with('/') || normalized.contains(':') {
        return Err(invalid("must be relative to the repository root"));
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(invalid("must stay inside the repository"));
    }
    Ok(normalized)
}

/// Flags for [`provision`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmoduleOptions {
    /// Initialize nested submodules too.
    pub recursive: bool,
    /// Clone and fetch with `--depth 1`.
    pub shallow: bool,
    /// Repoint an existing registration instead of refusing.
    pub update: bool,
    /// Skip the clean-tree check and pass `--force` to `git submodule add`.
    pub force: bool,
}

/// What [`provision`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmoduleAction {
    Registered,
    Repointed,
}

/// Result of a successful [`provision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmoduleOutcome {
    pub action: SubmoduleAction,
    pub record: SubmoduleRecord,
    /// `false` when the registry already matched and there was nothing to commit.
    pub committed: bool,
    /// New `HEAD`, when a commit was made outside dry-run mode.
    pub commit: Option<String>,
}

/// Register or repoint the submodule described by `record`.
pub fn provision(
    exec: &Executor,
    ctx: &RepositoryContext,
    record: &SubmoduleRecord,
    options: SubmoduleOptions,
) -> Result<SubmoduleOutcome> {
    if !options.force && !options.update {
        ensure_clean(exec, ctx)?;
    }

    let registered_name = registered_name_for(exec, ctx, &record.path)?;
    if let Some(name) = &registered_name {
        if !options.update {
            return Err(Error::AlreadyConfigured {
                path: record.path.clone(),
                name: name.clone(),
            });
        }
    } else {
        ensure_destination_empty(ctx, &record.path)?;
    }

    verify_remote(exec, ctx, &record.url, record.branch.as_deref())?;

    match registered_name {
        Some(name) => {
            if name != record.name {
                warn!(
                    "'{}' is registered as '{}'; keeping the registered name",
                    record.path, name
                );
            }
            let record = SubmoduleRecord {
                name,
                ..record.clone()
            };
            repoint(exec, ctx, record, options)
        }
        None => register(exec, ctx, record.clone(), options),
    }
}

fn register(
    exec: &Executor,
    ctx: &RepositoryContext,
    record: SubmoduleRecord,
    options: SubmoduleOptions,
) -> Result<SubmoduleOutcome> {
    info!("registering submodule '{}' at {}", record.name, record.path);

    let mut add = vec!["submodule", "add", "--name", record.name.as_str()];
    if let Some(branch) = &record.branch {
        add.extend(["-b", branch.as_str()]);
    }
    if options.shallow {
        add.extend(["--depth", "1"]);
    }
    if options.force {
        add.push("--force");
    }
    add.extend(["--", record.url.as_str(), record.path.as_str()]);
    exec.mutate(ctx, add.as_slice())?;

    // Some git versions do not record the branch; write all three entries.
    set_entry(exec, ctx, &record, "path", &record.path)?;
    set_entry(exec, ctx, &record, "url", &record.url)?;
    if let Some(branch) = &record.branch {
        set_entry(exec, ctx, &record, "branch", branch)?;
    }

    exec.mutate(ctx, update_args(&record, options, false).as_slice())?;

    if let Some(branch) = &record.branch {
        let mut fetch = vec!["-C", record.path.as_str(), "fetch", "origin", branch.as_str()];
        if options.shallow {
            fetch.extend(["--depth", "1"]);
        }
        exec.mutate(ctx, fetch.as_slice())?;
    }

    let message = format!(
        "Add submodule {} at {}{}",
        record.name,
        record.path,
        record.branch_suffix()
    );
    finish(exec, ctx, record, SubmoduleAction::Registered, &message)
}

fn repoint(
    exec: &Executor,
    ctx: &RepositoryContext,
    record: SubmoduleRecord,
    options: SubmoduleOptions,
) -> Result<SubmoduleOutcome> {
    info!(
        "repointing submodule '{}' at {} to {}{}",
        record.name,
        record.path,
        record.url,
        record.branch_suffix()
    );

    set_entry(exec, ctx, &record, "url", &record.url)?;
    match &record.branch {
        Some(branch) => set_entry(exec, ctx, &record, "branch", branch)?,
        None => {
            let key = record.key("branch");
            if read_entry(exec, ctx, &key)?.is_some() {
                exec.mutate(ctx, &["config", "-f", MODULES_FILE, "--unset", key.as_str()])?;
            }
        }
    }

    let mut sync = vec!["submodule", "sync"];
    if options.recursive {
        sync.push("--recursive");
    }
    sync.extend(["--", record.path.as_str()]);
    exec.mutate(ctx, sync.as_slice())?;

    exec.mutate(ctx, update_args(&record, options, true).as_slice())?;

    let message = match &record.branch {
        Some(branch) => format!(
            "Update submodule {} ({}, branch {})",
            record.name, record.url, branch
        ),
        None => format!("Update submodule {} ({})", record.name, record.url),
    };
    finish(exec, ctx, record, SubmoduleAction::Repointed, &message)
}

fn update_args(record: &SubmoduleRecord, options: SubmoduleOptions, remote: bool) -> Vec<&str> {
    let mut args = vec!["submodule", "update", "--init"];
    if remote {
        args.push("--remote");
    }
    if options.recursive {
        args.push("--recursive");
    }
    if options.shallow {
        args.extend(["--depth", "1"]);
    }
    args.extend(["--", record.path.as_str()]);
    args
}

fn finish(
    exec: &Executor,
    ctx: &RepositoryContext,
    record: SubmoduleRecord,
    action: SubmoduleAction,
    message: &str,
) -> Result<SubmoduleOutcome> {
    let paths = [MODULES_FILE, record.path.as_str()];
    exec.mutate(ctx, &["add", "--", MODULES_FILE, record.path.as_str()])?;
    let committed = commit_only(exec, ctx, message, &paths)?;

    let commit = if committed && !exec.is_dry_run() {
        let head = exec.run(ctx, &["rev-parse", "HEAD"])?;
        head.first_line().map(str::to_string)
    } else {
        None
    };

    Ok(SubmoduleOutcome {
        action,
        record,
        committed,
        commit,
    })
}

fn set_entry(
    exec: &Executor,
    ctx: &RepositoryContext,
    record: &SubmoduleRecord,
    field: &str,
    value: &str,
) -> Result<()> {
    let key = record.key(field);
    exec.mutate(ctx, &["config", "-f", MODULES_FILE, key.as_str(), value])?;
    Ok(())
}

fn read_entry(exec: &Executor, ctx: &RepositoryContext, key: &str) -> Result<Option<String>> {
    if !ctx.join(MODULES_FILE).is_file() {
        return Ok(None);
    }
    let result = exec.probe(ctx, &["config", "-f", MODULES_FILE, "--get", key])?;
    match result.exit_code {
        0 => Ok(result.first_line().map(str::to_string)),
        1 => Ok(None),
        _ => Err(result.into_error()),
    }
}

/// `(name, path)` of every submodule in `.gitmodules`.
pub fn registered(exec: &Executor, ctx: &RepositoryContext) -> Result<Vec<(String, String)>> {
    if !ctx.join(MODULES_FILE).is_file() {
        return Ok(Vec::new());
    }

    let result = exec.probe(
        ctx,
        &[
            "config",
            "-f",
            MODULES_FILE,
            "-z",
            "--get-regexp",
            r"^submodule\..*\.path$",
        ],
    )?;
    match result.exit_code {
        0 => Ok(parse_registry(&result.stdout.join("\n"))),
        // No matching keys.
        1 => Ok(Vec::new()),
        _ => Err(result.into_error()),
    }
}

/// Parse `git config -z --get-regexp` output, one `key\nvalue\0` record per
/// entry. Names and paths may contain spaces.
fn parse_registry(output: &str) -> Vec<(String, String)> {
    output
        .split('\0')
        .filter_map(|record| {
            let (key, path) = record.trim_start_matches('\n').split_once('\n')?;
            let name = key.strip_prefix("submodule.")?.strip_suffix(".path")?;
            Some((name.to_string(), path.to_string()))
        })
        .collect()
}

/// Name of the submodule registered at `path`, if any.
fn registered_name_for(
    exec: &Executor,
    ctx: &RepositoryContext,
    path: &str,
) -> Result<Option<String>> {
    let found = registered(exec, ctx)?.into_iter().find(|(_, registered)| {
        normalize_path(registered).is_ok_and(|registered| registered == path)
    });
    debug!("registration for {}: {:?}", path, found);
    Ok(found.map(|(name, _)| name))
}

fn ensure_clean(exec: &Executor, ctx: &RepositoryContext) -> Result<()> {
    let status = exec.run(ctx, &["status", "--porcelain", "--untracked-files=no"])?;
    let entries: Vec<String> = status.lines().map(str::to_string).collect();
    if entries.is_empty() {
        return Ok(());
    }
    Err(Error::DirtyWorkingTree {
        path: ctx.root().display().to_string(),
        entries,
    })
}

fn ensure_destination_empty(ctx: &RepositoryContext, path: &str) -> Result<()> {
    let destination = ctx.join(path);
    let occupied = if destination.is_dir() {
        fs::read_dir(&destination)?.next().is_some()
    } else {
        destination.exists()
    };
    if occupied {
        return Err(Error::DestinationNotEmpty {
            path: destination.display().to_string(),
        });
    }
    Ok(())
}

fn is_relative_url(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../")
}

fn verify_remote(
    exec: &Executor,
    ctx: &RepositoryContext,
    url: &str,
    branch: Option<&str>,
) -> Result<()> {
    if is_relative_url(url) {
        // Resolved by git against the superproject's remote; nothing to query.
        debug!("skipping remote check for relative url {}", url);
        return Ok(());
    }

    let head_ref = branch.map(|branch| format!("refs/heads/{}", branch));
    let mut args = vec!["ls-remote", "--heads"];
    if head_ref.is_some() {
        args.push("--exit-code");
    }
    args.push(url);
    if let Some(head_ref) = &head_ref {
        args.push(head_ref.as_str());
    }

    let result = exec.probe(ctx, args.as_slice())?;
    let stderr = || {
        result
            .stderr
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };

    match (result.exit_code, branch, &head_ref) {
        (0, Some(branch), Some(head_ref)) => {
            let found = result
                .lines()
                .any(|line| line.split('\t').nth(1) == Some(head_ref.as_str()));
            if found {
                Ok(())
            } else {
                Err(Error::BranchNotFound {
                    url: url.to_string(),
                    branch: branch.to_string(),
                })
            }
        }
        (0, _, _) => Ok(()),
        (2, Some(branch), _) => Err(Error::BranchNotFound {
            url: url.to_string(),
            branch: branch.to_string(),
        }),
        _ => Err(Error::RemoteUnreachable {
            url: url.to_string(),
            stderr: stderr(),
        }),
    }
}
