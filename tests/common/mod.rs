//! Shared test utilities for integration and E2E tests.
//!
//! Every fixture drives the real `git` binary. [`isolate_git`] pins the
//! environment so user or system configuration cannot leak into a test, and
//! allows local-path submodule clones.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let repo = TestRepo::new().with_file("a.txt", "hello").with_commit("init");
//!     repo.command().args(["eol"]).assert().success();
//! }
//! ```

use std::path::Path;
use std::process::Command;
use std::sync::Once;

use assert_fs::prelude::*;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::{isolate_git, TestRepo, GIT_ENV};
}

/// Environment applied to every git process spawned by the tests.
pub const GIT_ENV: &[(&str, &str)] = &[
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_CONFIG_NOSYSTEM", "1"),
    ("GIT_CONFIG_COUNT", "1"),
    ("GIT_CONFIG_KEY_0", "protocol.file.allow"),
    ("GIT_CONFIG_VALUE_0", "always"),
    ("GIT_AUTHOR_NAME", "Test User"),
    ("GIT_AUTHOR_EMAIL", "test@example.com"),
    ("GIT_COMMITTER_NAME", "Test User"),
    ("GIT_COMMITTER_EMAIL", "test@example.com"),
];

static ISOLATE: Once = Once::new();

/// Apply [`GIT_ENV`] to this test process so git spawned by the library
/// sees the same configuration as the fixtures.
pub fn isolate_git() {
    ISOLATE.call_once(|| {
        for (key, value) in GIT_ENV {
            std::env::set_var(key, value);
        }
    });
}

/// Run git in `dir`, panicking with its output on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .envs(GIT_ENV.iter().copied())
        .env("LC_ALL", "C")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed in {}:\n{}{}",
        args.join(" "),
        dir.display(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A temporary git repository on branch `main`.
pub struct TestRepo {
    temp_dir: assert_fs::TempDir,
}

impl TestRepo {
    /// Create an empty repository with no commits.
    pub fn new() -> Self {
        isolate_git();
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        git(temp_dir.path(), &["init", "-q"]);
        git(temp_dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self { temp_dir }
    }

    /// A bare repository, for use as a push target.
    #[allow(dead_code)]
    pub fn bare() -> Self {
        isolate_git();
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        git(temp_dir.path(), &["init", "-q", "--bare"]);
        git(temp_dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self { temp_dir }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Stage everything and commit it.
    pub fn with_commit(self, message: &str) -> Self {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
        self
    }

    /// Run git in this repository.
    pub fn git(&self, args: &[&str]) -> String {
        git(self.path(), args)
    }

    /// Value of a repository-local configuration key.
    #[allow(dead_code)]
    pub fn config(&self, key: &str) -> Option<String> {
        let output = Command::new("git")
            .args(["config", "--local", "--get", key])
            .current_dir(self.path())
            .envs(GIT_ENV.iter().copied())
            .output()
            .expect("Failed to run git");
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    #[allow(dead_code)]
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    #[allow(dead_code)]
    pub fn commit_count(&self) -> usize {
        self.git(&["rev-list", "--count", "HEAD"])
            .parse()
            .expect("rev-list printed a number")
    }

    /// Get the path to the repository.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the repository.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command for the binary targeting this repository.
    #[allow(dead_code)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("git-provision");
        cmd.current_dir(self.path())
            .envs(GIT_ENV.iter().copied())
            .env_remove("GIT_PROVISION_REPO")
            .env_remove("GIT_PROVISION_GIT")
            .env_remove("GIT_PROVISION_TIMEOUT")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_starts_on_main() {
        let repo = TestRepo::new();
        assert_eq!(repo.git(&["symbolic-ref", "--short", "HEAD"]), "main");
    }

    #[test]
    fn test_repo_with_commit() {
        let repo = TestRepo::new().with_file("a.txt", "a\n").with_commit("init");
        assert_eq!(repo.commit_count(), 1);
    }
}
