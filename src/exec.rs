//! # Command Executor
//!
//! Every interaction with the repository goes through this module. It spawns
//! the system `git` command, captures stdout and stderr as separate streams,
//! and turns the result into a [`CommandResult`].
//!
//! Using the system binary means credential helpers, SSH keys and any
//! `~/.gitconfig` settings apply exactly as they would for a user at a shell.
//!
//! ## Layers
//!
//! - **`GitOperations`**: the raw "spawn and capture" seam. `SystemGit` is the
//!   real implementation; tests substitute a scripted one.
//! - **`Executor`**: classifies stderr, logs, turns non-zero exits into
//!   [`Error::SubprocessFailed`], and suppresses mutating calls in dry-run mode.
//!
//! ## Output classification
//!
//! git prints progress ("Cloning into 'x'...") on stderr, so stderr is not an
//! error channel. Each stderr line goes through [`classify_stderr_line`]:
//! `warning:` lines are warnings, `error:` lines are errors, and everything
//! else is informational. The text of git's output is not a structured
//! protocol, so this is a heuristic and lives in a single function.

use std::cell::RefCell;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::context::RepositoryContext;
use crate::error::{Error, Result};

/// How often a timed wait polls the child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Severity of a single stderr line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A stderr line with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StderrLine {
    pub severity: Severity,
    pub text: String,
}

/// Classify one line of git's stderr.
///
/// The test is a case-insensitive substring match; `warning:` is checked
/// before `error:`.
pub fn classify_stderr_line(line: &str) -> Severity {
    let lower = line.to_ascii_lowercase();
    if lower.contains("warning:") {
        Severity::Warning
    } else if lower.contains("error:") {
        Severity::Error
    } else {
        Severity::Info
    }
}

/// Classify a complete stderr capture, dropping blank lines.
pub fn classify_stderr(stderr: &str) -> Vec<StderrLine> {
    stderr
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| StderrLine {
            severity: classify_stderr_line(line),
            text: line.to_string(),
        })
        .collect()
}

/// The unclassified output of one git process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// The outcome of one git invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Arguments passed to git (without the program name).
    pub argv: Vec<String>,
    pub stdout: Vec<String>,
    pub stderr: Vec<StderrLine>,
    pub exit_code: i32,
}

impl CommandResult {
    fn from_raw(argv: Vec<String>, raw: &RawOutput) -> Self {
        Self {
            argv,
            stdout: raw
                .stdout
                .lines()
                .map(|line| line.trim_end_matches('\r').to_string())
                .collect(),
            stderr: classify_stderr(&raw.stderr),
            exit_code: raw.exit_code,
        }
    }

    /// An empty, successful result standing in for a suppressed mutation.
    fn suppressed(argv: Vec<String>) -> Self {
        Self {
            argv,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-empty stdout line, trimmed.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }

    /// Non-empty stdout lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .iter()
            .map(String::as_str)
            .filter(|line| !line.trim().is_empty())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.stderr_with(Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.stderr_with(Severity::Error)
    }

    fn stderr_with(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.stderr
            .iter()
            .filter(move |line| line.severity == severity)
            .map(|line| line.text.as_str())
    }

    /// The failure `Executor::run` would have produced for this result.
    pub fn into_error(self) -> Error {
        Error::SubprocessFailed {
            argv: self.argv,
            exit_code: self.exit_code,
            stdout: self.stdout.join("\n"),
            stderr: self
                .stderr
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Case-insensitive search across stdout and stderr.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.stdout
            .iter()
            .chain(self.stderr.iter().map(|line| &line.text))
            .any(|line| line.to_ascii_lowercase().contains(&needle))
    }
}

/// Trait for spawning git - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Run git with `args` in `root` and capture its output.
    ///
    /// Returns `Ok` for any exit code; only failing to run the process at all
    /// is an error.
    fn execute(&self, root: &Path, args: &[String]) -> Result<RawOutput>;
}

/// Options for constructing an [`Executor`] over the system git.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Program to run; resolved through `PATH` when not absolute.
    pub program: OsString,
    /// Upper bound on the wall-clock time of a single git process.
    pub timeout: Option<Duration>,
    /// Suppress every mutating call.
    pub dry_run: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
            timeout: None,
            dry_run: false,
        }
    }
}

/// The default implementation of `GitOperations`, which runs the system
/// `git` command.
pub struct SystemGit {
    program: OsString,
    timeout: Option<Duration>,
}

impl SystemGit {
    pub fn new(program: impl Into<OsString>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, root: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            // Keep messages in English so "nothing to commit" and the
            // warning/error prefixes can be recognized.
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn spawn_error(&self, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound {
            Error::PreconditionFailed {
                message: format!(
                    "'{}' was not found; install git or add it to PATH",
                    self.program.to_string_lossy()
                ),
            }
        } else {
            Error::Io(err)
        }
    }

    fn wait_with_timeout(
        &self,
        mut child: Child,
        timeout: Duration,
        args: &[String],
    ) -> Result<RawOutput> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // The child may have exited between the poll and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::TimedOut {
                    argv: args.to_vec(),
                    seconds: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(RawOutput {
            stdout: join_drain(stdout)?,
            stderr: join_drain(stderr)?,
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

type DrainHandle = Option<thread::JoinHandle<io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> DrainHandle {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: DrainHandle) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl GitOperations for SystemGit {
    fn execute(&self, root: &Path, args: &[String]) -> Result<RawOutput> {
        let mut cmd = self.command(root, args);

        let Some(timeout) = self.timeout else {
            let output = cmd.output().map_err(|e| self.spawn_error(e))?;
            return Ok(RawOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(-1),
            });
        };

        let child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        self.wait_with_timeout(child, timeout, args)
    }
}

/// Runs git on behalf of the provisioning operations.
///
/// Three entry points differ only in how they treat the exit code and
/// dry-run mode:
///
/// | method   | non-zero exit          | dry-run        |
/// |----------|------------------------|----------------|
/// | `probe`  | returned as data       | runs           |
/// | `run`    | `SubprocessFailed`     | runs           |
/// | `mutate` | `SubprocessFailed`     | suppressed     |
pub struct Executor {
    git: Box<dyn GitOperations>,
    dry_run: bool,
    planned: RefCell<Vec<Vec<String>>>,
}

impl Executor {
    /// Creates an executor over the system git.
    pub fn new(options: ExecutorOptions) -> Self {
        Self::with_operations(
            Box::new(SystemGit::new(options.program, options.timeout)),
            options.dry_run,
        )
    }

    /// Creates an executor over a custom `GitOperations` implementation.
    pub fn with_operations(git: Box<dyn GitOperations>, dry_run: bool) -> Self {
        Self {
            git,
            dry_run,
            planned: RefCell::new(Vec::new()),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Verify git can be spawned at all, returning its version line.
    pub fn check_tool(&self) -> Result<String> {
        let result = self.run_at(Path::new("."), &["--version"])?;
        Ok(result.first_line().unwrap_or_default().to_string())
    }

    /// Run a query whose exit code is meaningful to the caller.
    pub fn probe<S: AsRef<str>>(
        &self,
        ctx: &RepositoryContext,
        args: &[S],
    ) -> Result<CommandResult> {
        self.probe_at(ctx.root(), args)
    }

    /// Run a query; non-zero exit is a failure.
    pub fn run<S: AsRef<str>>(
        &self,
        ctx: &RepositoryContext,
        args: &[S],
    ) -> Result<CommandResult> {
        self.run_at(ctx.root(), args)
    }

    /// Run a command that changes the repository. Suppressed in dry-run mode.
    pub fn mutate<S: AsRef<str>>(
        &self,
        ctx: &RepositoryContext,
        args: &[S],
    ) -> Result<CommandResult> {
        let argv = to_argv(args);
        if self.dry_run {
            info!("dry run: would run: git {}", argv.join(" "));
            self.planned.borrow_mut().push(argv.clone());
            return Ok(CommandResult::suppressed(argv));
        }
        self.run_at(ctx.root(), argv.as_slice())
    }

    /// Mutations suppressed so far by dry-run mode, in order.
    pub fn planned_actions(&self) -> Vec<Vec<String>> {
        self.planned.borrow().clone()
    }

    pub(crate) fn probe_at<S: AsRef<str>>(&self, root: &Path, args: &[S]) -> Result<CommandResult> {
        let argv = to_argv(args);
        debug!("git {} (in {})", argv.join(" "), root.display());

        let raw = self.git.execute(root, &argv)?;
        let result = CommandResult::from_raw(argv, &raw);
        forward_stderr(&result);
        Ok(result)
    }

    pub(crate) fn run_at<S: AsRef<str>>(&self, root: &Path, args: &[S]) -> Result<CommandResult> {
        let argv = to_argv(args);
        debug!("git {} (in {})", argv.join(" "), root.display());

        let raw = self.git.execute(root, &argv)?;
        if raw.exit_code != 0 {
            return Err(Error::SubprocessFailed {
                argv,
                exit_code: raw.exit_code,
                stdout: raw.stdout,
                stderr: raw.stderr,
            });
        }

        let result = CommandResult::from_raw(argv, &raw);
        forward_stderr(&result);
        Ok(result)
    }
}

fn to_argv<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter().map(|arg| arg.as_ref().to_string()).collect()
}

fn forward_stderr(result: &CommandResult) {
    for line in &result.stderr {
        match line.severity {
            Severity::Info => info!("git: {}", line.text),
            Severity::Warning => warn!("git: {}", line.text),
            Severity::Error => error!("git: {}", line.text),
        }
    }
}

/// A scripted `GitOperations` for subprocess-free tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Rule {
        prefix: Vec<String>,
        output: RawOutput,
        once: bool,
    }

    impl Rule {
        fn matches(&self, args: &[String]) -> bool {
            self.prefix.len() <= args.len() && self.prefix.iter().zip(args).all(|(a, b)| a == b)
        }
    }

    /// Answers each call from scripted rules and records every call.
    ///
    /// One-shot rules are consumed in the order they were added and take
    /// precedence; otherwise the longest matching argv prefix answers. A call
    /// nothing matches gets an empty success.
    #[derive(Clone, Default)]
    pub struct ScriptedGit {
        rules: Arc<Mutex<Vec<Rule>>>,
        calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedGit {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(&self, prefix: &[&str], stdout: &str, stderr: &str, exit_code: i32) -> &Self {
            self.push(prefix, stdout, stderr, exit_code, false)
        }

        pub fn once(&self, prefix: &[&str], stdout: &str, stderr: &str, exit_code: i32) -> &Self {
            self.push(prefix, stdout, stderr, exit_code, true)
        }

        fn push(
            &self,
            prefix: &[&str],
            stdout: &str,
            stderr: &str,
            exit_code: i32,
            once: bool,
        ) -> &Self {
            self.rules.lock().unwrap().push(Rule {
                prefix: prefix.iter().map(|s| s.to_string()).collect(),
                output: RawOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code,
                },
                once,
            });
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        pub fn called(&self, prefix: &[&str]) -> bool {
            self.calls().iter().any(|call| {
                call.len() >= prefix.len() && call.iter().zip(prefix).all(|(a, b)| a == b)
            })
        }
    }

    impl GitOperations for ScriptedGit {
        fn execute(&self, _root: &Path, args: &[String]) -> Result<RawOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            let mut rules = self.rules.lock().unwrap();

            if let Some(index) = rules.iter().position(|rule| rule.once && rule.matches(args)) {
                return Ok(rules.remove(index).output);
            }

            let best = rules
                .iter()
                .filter(|rule| !rule.once && rule.matches(args))
                .max_by_key(|rule| rule.prefix.len());
            Ok(best.map(|rule| rule.output.clone()).unwrap_or_default())
        }
    }
}
