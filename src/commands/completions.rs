//! `git-provision completions <SHELL>`
//!
//! Prints a completion script covering the `eol`, `commit` and `submodule`
//! subcommands and the global options (`-C/--repo`, `--dry-run`, `--json`,
//! `--timeout`, `--git`). The script goes to stdout and nothing touches a
//! repository, so this command works outside a work tree.
//!
//! ```bash
//! git-provision completions bash > ~/.local/share/bash-completion/completions/git-provision
//! git-provision completions zsh > ~/.zfunc/_git-provision
//! git-provision completions fish > ~/.config/fish/completions/git-provision.fish
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

const BIN_NAME: &str = "git-provision";

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Print a shell completion script
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate the script for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

fn script(shell: CompletionShell, out: &mut dyn Write) {
    generate(Shell::from(shell), &mut Cli::command(), BIN_NAME, out);
}

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut stdout = io::stdout().lock();
    script(args.shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_for_every_shell() {
        for shell in CompletionShell::value_variants() {
            let mut buffer = Vec::new();
            script(*shell, &mut buffer);
            let text = String::from_utf8(buffer).unwrap();
            assert!(text.contains(BIN_NAME), "{shell:?}");
            assert!(text.contains("submodule"), "{shell:?}");
        }
    }

    #[test]
    fn test_bash_script_offers_global_options() {
        let mut buffer = Vec::new();
        script(CompletionShell::Bash, &mut buffer);
        let text = String::from_utf8(buffer).unwrap();
        for option in ["--repo", "--dry-run", "--json", "--timeout", "--update"] {
            assert!(text.contains(option), "{option}");
        }
    }
}
