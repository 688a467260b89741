//! # Repository Context
//!
//! A [`RepositoryContext`] is the validated work tree an operation targets.
//! It is resolved once at the start of an operation and passed explicitly to
//! every [`Executor`] call, which roots the git process at
//! [`RepositoryContext::root`].
//!
//! For code that also resolves relative paths through the process working
//! directory, [`RepositoryContext::enter`] returns a [`ScopeGuard`] that
//! switches into the work tree and switches back exactly once when dropped,
//! whether the operation returns normally, propagates an error with `?`, or
//! unwinds.

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::exec::Executor;

/// A validated git work tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    root: PathBuf,
}

impl RepositoryContext {
    /// Resolve `path` to the top level of the work tree containing it.
    ///
    /// Checks, in order: that git can be spawned, that `path` is an existing
    /// directory, and that git reports it as inside a work tree.
    pub fn resolve(exec: &Executor, path: &Path) -> Result<Self> {
        let version = exec.check_tool()?;
        debug!("using {}", version);

        let not_a_repo = || Error::NotARepository {
            path: path.display().to_string(),
        };

        if !path.is_dir() {
            return Err(not_a_repo());
        }
        let absolute = path.canonicalize()?;

        let inside = exec.probe_at(&absolute, &["rev-parse", "--is-inside-work-tree"])?;
        if !inside.success() || inside.first_line() != Some("true") {
            return Err(not_a_repo());
        }

        let toplevel = exec.run_at(&absolute, &["rev-parse", "--show-toplevel"])?;
        let root = match toplevel.first_line() {
            Some(top) => PathBuf::from(top).canonicalize()?,
            None => absolute,
        };

        debug!("resolved work tree {}", root.display());
        Ok(Self { root })
    }

    /// Absolute path of the work tree's top level.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `relative` joined onto the work tree root.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Make the work tree the process working directory until the returned
    /// guard is dropped.
    pub fn enter(&self) -> Result<ScopeGuard> {
        let previous = env::current_dir()?;
        env::set_current_dir(&self.root)?;
        debug!("entered {}", self.root.display());
        Ok(ScopeGuard {
            previous: Some(previous),
        })
    }
}

/// Restores the caller's working directory on drop.
#[must_use = "the previous working directory is restored when the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    previous: Option<PathBuf>,
}

impl ScopeGuard {
    /// The directory that will be restored.
    pub fn previous(&self) -> Option<&Path> {
        self.previous.as_deref()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = env::set_current_dir(&previous) {
                warn!(
                    "failed to restore working directory {}: {}",
                    previous.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
impl RepositoryContext {
    pub(crate) fn for_tests(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}
