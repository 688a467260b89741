//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use git_provision::exec::{Executor, ExecutorOptions};
use git_provision::output::OutputConfig;

use crate::commands;

/// git-provision - Safe, re-runnable repository setup steps
#[derive(Parser, Debug)]
#[command(name = "git-provision")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Repository to operate on (any directory inside the work tree)
    #[arg(
        short = 'C',
        long,
        global = true,
        value_name = "PATH",
        default_value = ".",
        env = "GIT_PROVISION_REPO"
    )]
    pub repo: PathBuf,

    /// Show what would be done without making changes
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Kill any single git process that runs longer than this
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        env = "GIT_PROVISION_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// git executable to run
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "git",
        env = "GIT_PROVISION_GIT"
    )]
    pub git: PathBuf,
}

impl GlobalArgs {
    pub fn executor(&self) -> Executor {
        Executor::new(ExecutorOptions {
            program: self.git.clone().into_os_string(),
            timeout: self.timeout.map(Duration::from_secs),
            dry_run: self.dry_run,
        })
    }

    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.log_level.as_str());
        // A logger may already be installed when running under a test harness.
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_target(false)
            .try_init();
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the .gitattributes line-ending policy and renormalize tracked files
    Eol(commands::eol::EolArgs),

    /// Stage paths and commit them, treating "nothing to commit" as success
    Commit(commands::commit::CommitArgs),

    /// Add a submodule, or repoint an existing one with --update
    Submodule(commands::submodule::SubmoduleArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.global.init_logging();

        match self.command {
            Commands::Eol(args) => commands::eol::execute(args, &self.global),
            Commands::Commit(args) => commands::commit::execute(args, &self.global),
            Commands::Submodule(args) => commands::submodule::execute(args, &self.global),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_defaults() {
        let cli = Cli::try_parse_from(["git-provision", "eol"]).unwrap();
        assert_eq!(cli.global.repo, PathBuf::from("."));
        assert_eq!(cli.global.log_level, "warn");
        assert!(!cli.global.dry_run);
        assert!(!cli.global.json);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "git-provision",
            "commit",
            "-m",
            "init",
            "-C",
            "/tmp/repo",
            "--dry-run",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.global.repo, PathBuf::from("/tmp/repo"));
        assert!(cli.global.dry_run);
        assert_eq!(cli.global.timeout, Some(30));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Cli::try_parse_from(["git-provision", "--timeout", "0", "eol"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
