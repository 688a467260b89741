//! # Line-Ending Policy
//!
//! Derives the repository's end-of-line policy from `.gitattributes`, writes
//! it into the local git configuration, and renormalizes tracked content.
//!
//! ## Governing rule
//!
//! Only the wildcard rule (`* ...`) is consumed, and the *last* such rule in
//! the file governs, matching git's own "later lines override" semantics:
//!
//! ```text
//! * text=auto eol=lf
//! *.bat eol=crlf
//! * text=auto eol=crlf   <- governs: core.eol=crlf, core.autocrlf=true
//! ```
//!
//! | `eol=` | `core.eol` | `core.autocrlf` |
//! |--------|------------|-----------------|
//! | `lf`   | `lf`       | `input`         |
//! | `crlf` | `crlf`     | `true`          |
//!
//! Without a governing rule existing settings are left as they are.
//! `core.safecrlf=true` is written whenever `core.safecrlf` has no value.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use log::{debug, info};
use serde::Serialize;

use crate::context::RepositoryContext;
use crate::error::Result;
use crate::exec::Executor;

/// Name of the attributes file at the work tree root.
pub const ATTRIBUTES_FILE: &str = ".gitattributes";

/// Number of affected paths listed in a renormalization report.
pub const PREVIEW_LIMIT: usize = 50;

/// A line-ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Eol {
    Lf,
    Crlf,
}

impl Eol {
    pub fn as_str(self) -> &'static str {
        match self {
            Eol::Lf => "lf",
            Eol::Crlf => "crlf",
        }
    }

    /// The `core.autocrlf` value that pairs with this style.
    pub fn autocrlf(self) -> AutoCrlf {
        match self {
            Eol::Lf => AutoCrlf::Input,
            Eol::Crlf => AutoCrlf::True,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lf" => Some(Eol::Lf),
            "crlf" => Some(Eol::Crlf),
            _ => None,
        }
    }
}

impl fmt::Display for Eol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `core.autocrlf` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoCrlf {
    Input,
    True,
}

impl AutoCrlf {
    pub fn as_str(self) -> &'static str {
        match self {
            AutoCrlf::Input => "input",
            AutoCrlf::True => "true",
        }
    }
}

impl fmt::Display for AutoCrlf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired line-ending settings. Both fields unset means "leave as is".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EolPolicy {
    pub eol: Option<Eol>,
    pub autocrlf: Option<AutoCrlf>,
}

impl EolPolicy {
    /// Derive the policy from the contents of an attributes file.
    pub fn from_attributes(content: &str) -> Self {
        let Some(rule) = governing_rule(content) else {
            return Self::default();
        };

        let eol = rule
            .iter()
            .filter_map(|attr| {
                let (key, value) = attr.split_once('=')?;
                if key.eq_ignore_ascii_case("eol") {
                    Eol::parse(value)
                } else {
                    None
                }
            })
            .last();

        Self {
            eol,
            autocrlf: eol.map(Eol::autocrlf),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.eol.is_none() && self.autocrlf.is_none()
    }
}

/// Attribute tokens of the last wildcard rule that carries any attributes.
fn governing_rule(content: &str) -> Option<Vec<&str>> {
    content.lines().rev().find_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("*") {
            return None;
        }
        let attrs: Vec<&str> = tokens.collect();
        (!attrs.is_empty()).then_some(attrs)
    })
}

/// A configuration value written by the configurator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingChange {
    pub key: String,
    pub previous: Option<String>,
    pub value: String,
}

/// Result of applying the line-ending policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EolOutcome {
    pub policy: EolPolicy,
    pub attributes_found: bool,
    pub changed_settings: Vec<SettingChange>,
    /// Number of index entries whose content changed on renormalization.
    pub affected: usize,
    /// The first [`PREVIEW_LIMIT`] affected paths.
    pub preview: Vec<String>,
}

impl EolOutcome {
    /// Affected paths not included in the preview.
    pub fn remaining(&self) -> usize {
        self.affected.saturating_sub(self.preview.len())
    }
}

/// Apply the `.gitattributes` line-ending policy to the repository and
/// renormalize tracked files.
pub fn configure(exec: &Executor, ctx: &RepositoryContext) -> Result<EolOutcome> {
    let attributes_path = ctx.join(ATTRIBUTES_FILE);
    let attributes = if attributes_path.is_file() {
        Some(String::from_utf8_lossy(&fs::read(&attributes_path)?).into_owned())
    } else {
        None
    };

    let policy = attributes
        .as_deref()
        .map(EolPolicy::from_attributes)
        .unwrap_or_default();
    debug!("derived line-ending policy {:?}", policy);

    let mut changed_settings = Vec::new();
    if let Some(eol) = policy.eol {
        changed_settings.extend(ensure_setting(exec, ctx, "core.eol", eol.as_str())?);
    }
    if let Some(autocrlf) = policy.autocrlf {
        changed_settings.extend(ensure_setting(exec, ctx, "core.autocrlf", autocrlf.as_str())?);
    }
    if policy.is_unset() {
        info!("no wildcard eol rule found; keeping existing core.eol/core.autocrlf");
    }

    if read_setting(exec, ctx, "core.safecrlf")?.is_none() {
        exec.mutate(ctx, &["config", "core.safecrlf", "true"])?;
        changed_settings.push(SettingChange {
            key: "core.safecrlf".to_string(),
            previous: None,
            value: "true".to_string(),
        });
    }

    let mut affected_paths = Vec::new();
    if attributes.is_some() {
        let before = index_snapshot(exec, ctx)?;
        exec.mutate(ctx, &["add", "--renormalize", "."])?;
        let after = index_snapshot(exec, ctx)?;
        affected_paths = changed_entries(&before, &after);
    }

    let affected = affected_paths.len();
    affected_paths.truncate(PREVIEW_LIMIT);

    Ok(EolOutcome {
        policy,
        attributes_found: attributes.is_some(),
        changed_settings,
        affected,
        preview: affected_paths,
    })
}

/// Read a configuration value, `None` when unset.
pub(crate) fn read_setting(
    exec: &Executor,
    ctx: &RepositoryContext,
    key: &str,
) -> Result<Option<String>> {
    let result = exec.probe(ctx, &["config", "--get", key])?;
    // `git config --get` exits 1 for a missing key.
    if result.exit_code == 1 {
        return Ok(None);
    }
    if !result.success() {
        return Err(result.into_error());
    }
    Ok(result.first_line().map(str::to_string))
}

/// Write `key = value` unless it is already in effect.
fn ensure_setting(
    exec: &Executor,
    ctx: &RepositoryContext,
    key: &str,
    value: &str,
) -> Result<Option<SettingChange>> {
    let previous = read_setting(exec, ctx, key)?;
    if previous
        .as_deref()
        .is_some_and(|current| current.eq_ignore_ascii_case(value))
    {
        debug!("{} already {}", key, value);
        return Ok(None);
    }

    exec.mutate(ctx, &["config", key, value])?;
    Ok(Some(SettingChange {
        key: key.to_string(),
        previous,
        value: value.to_string(),
    }))
}

/// Map of index path to `mode object stage`.
fn index_snapshot(exec: &Executor, ctx: &RepositoryContext) -> Result<BTreeMap<String, String>> {
    let listing = exec.run(ctx, &["-c", "core.quotepath=off", "ls-files", "--stage"])?;
    Ok(listing
        .lines()
        .filter_map(|line| {
            let (entry, path) = line.split_once('\t')?;
            Some((path.to_string(), entry.to_string()))
        })
        .collect())
}

fn changed_entries(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut changed: Vec<String> = after
        .iter()
        .filter(|(path, entry)| before.get(*path) != Some(*entry))
        .map(|(path, _)| path.clone())
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .cloned(),
    );
    changed.sort();
    changed
}
