//! # Output Configuration
//!
//! This module controls how operation outcomes are presented: emoji or
//! plain-text markers depending on terminal capabilities, human-readable
//! report lines for each operation, and the JSON envelope used by `--json`.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use git_provision::output::{emoji, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Committing...", emoji(&config, "📝", "[COMMIT]"));
//! ```

use std::env;

use serde::Serialize;

use crate::commit::CommitOutcome;
use crate::eol::EolOutcome;
use crate::submodule::{SubmoduleAction, SubmoduleOutcome};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, otherwise the plain text
/// alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// The `--json` document: an operation outcome plus any mutations dry-run
/// mode suppressed.
#[derive(Debug, Serialize)]
pub struct Report<'a, T: Serialize> {
    pub dry_run: bool,
    /// Suppressed git invocations, each rendered as one command line.
    pub planned: Vec<String>,
    pub outcome: &'a T,
}

impl<'a, T: Serialize> Report<'a, T> {
    pub fn new(outcome: &'a T, dry_run: bool, planned: &[Vec<String>]) -> Self {
        Self {
            dry_run,
            planned: planned.iter().map(|argv| command_line(argv)).collect(),
            outcome,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn command_line(argv: &[String]) -> String {
    format!("git {}", argv.join(" "))
}

/// One line per mutation suppressed by dry-run mode.
pub fn planned_lines(config: &OutputConfig, planned: &[Vec<String>]) -> Vec<String> {
    planned
        .iter()
        .map(|argv| {
            format!(
                "{} Would run: {}",
                emoji(config, "🔎", "[DRY-RUN]"),
                command_line(argv)
            )
        })
        .collect()
}

/// Human-readable summary of a line-ending configuration run.
pub fn eol_lines(config: &OutputConfig, outcome: &EolOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    if !outcome.attributes_found {
        lines.push(format!(
            "{} No .gitattributes found; line-ending settings left as they are",
            emoji(config, "ℹ️", "[INFO]")
        ));
    } else if outcome.policy.is_unset() {
        lines.push(format!(
            "{} No wildcard eol rule in .gitattributes; core.eol and core.autocrlf left as they are",
            emoji(config, "ℹ️", "[INFO]")
        ));
    }

    for change in &outcome.changed_settings {
        let previous = change.previous.as_deref().unwrap_or("unset");
        lines.push(format!(
            "{} {} = {} (was {})",
            emoji(config, "🔧", "[SET]"),
            change.key,
            change.value,
            previous
        ));
    }

    if outcome.affected == 0 {
        lines.push(format!(
            "{} Line endings are consistent; no files renormalized",
            emoji(config, "✅", "[OK]")
        ));
    } else {
        lines.push(format!(
            "{} Renormalized {} file(s):",
            emoji(config, "✅", "[OK]"),
            outcome.affected
        ));
        lines.extend(outcome.preview.iter().map(|path| format!("   {}", path)));
        if outcome.remaining() > 0 {
            lines.push(format!("   +{} more", outcome.remaining()));
        }
    }

    lines
}

/// Human-readable summary of a commit run.
pub fn commit_lines(config: &OutputConfig, outcome: &CommitOutcome) -> Vec<String> {
    let commit = |sha: &Option<String>| {
        sha.as_deref()
            .map(|sha| format!(" {}", short_sha(sha)))
            .unwrap_or_default()
    };

    match outcome {
        CommitOutcome::NoOpSkipped { reason } => vec![format!(
            "{} Nothing to commit ({})",
            emoji(config, "⏭️", "[SKIP]"),
            reason
        )],
        CommitOutcome::Committed { commit: sha, amended } => vec![format!(
            "{} {}{}",
            emoji(config, "✅", "[OK]"),
            if *amended { "Amended commit" } else { "Committed" },
            commit(sha)
        )],
        CommitOutcome::Pushed {
            commit: sha,
            amended,
            remote,
            branch,
        } => vec![
            format!(
                "{} {}{}",
                emoji(config, "✅", "[OK]"),
                if *amended { "Amended commit" } else { "Committed" },
                commit(sha)
            ),
            format!(
                "{} Pushed to {}/{}",
                emoji(config, "🚀", "[PUSH]"),
                remote,
                branch
            ),
        ],
    }
}

/// Human-readable summary of a submodule run.
pub fn submodule_lines(config: &OutputConfig, outcome: &SubmoduleOutcome) -> Vec<String> {
    let record = &outcome.record;
    let verb = match outcome.action {
        SubmoduleAction::Registered => "Registered",
        SubmoduleAction::Repointed => "Repointed",
    };
    let mut lines = vec![format!(
        "{} {} submodule '{}' at {}",
        emoji(config, "📦", "[SUBMODULE]"),
        verb,
        record.name,
        record.path
    )];
    lines.push(format!("   url: {}", record.url));
    lines.push(format!(
        "   branch: {}",
        record.branch.as_deref().unwrap_or("(remote default)")
    ));

    if outcome.committed {
        let sha = outcome
            .commit
            .as_deref()
            .map(|sha| format!(" {}", short_sha(sha)))
            .unwrap_or_default();
        lines.push(format!("{} Committed{}", emoji(config, "✅", "[OK]"), sha));
    } else {
        lines.push(format!(
            "{} Registration already up to date; nothing committed",
            emoji(config, "⏭️", "[SKIP]")
        ));
    }

    lines
}

fn short_sha(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
