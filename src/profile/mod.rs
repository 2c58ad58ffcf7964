//! The capability contract every installable program implements.
//!
//! The orchestrator drives a [`Program`] through a fixed sequence of steps and never
//! looks at how a step is carried out. Profiles receive a [`Job`] describing the
//! transition in progress and a [`Toolbox`] with the shared collaborators; they never
//! see the ledger.

mod artifact;
mod toolbox;

pub use artifact::Artifact;
pub use toolbox::Toolbox;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle action requested for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Install,
    Update,
    Remove,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Install => "install",
            Mode::Update => "update",
            Mode::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// State of an install or update handed to each profile step.
#[derive(Debug, Clone)]
pub struct Job {
    pub mode: Mode,
    pub name: String,
    /// Directory the program lives in; created by the orchestrator before any download.
    pub install_dir: PathBuf,
    /// Version currently recorded in the ledger, `None` on first install.
    pub current_version: Option<String>,
    /// Version being installed, as reported by [`Program::latest_version`].
    pub version: String,
    /// Scratch directory removed when the transition ends.
    pub staging_dir: PathBuf,
    /// Artifacts that were actually fetched. Tolerant artifacts that failed are absent.
    pub fetched: Vec<Artifact>,
}

impl Job {
    /// Fetched artifact whose destination file name is `file_name`.
    pub fn fetched_file(&self, file_name: &str) -> Option<&Artifact> {
        self.fetched
            .iter()
            .find(|a| a.destination.file_name().is_some_and(|n| n == file_name))
    }
}

/// Ledger view of an installed program, handed to [`Program::uninstall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub name: String,
    pub install_dir: PathBuf,
    pub version: String,
}

/// Per-program behaviour.
///
/// Steps run in this order for an install: `latest_version`, `artifacts`, (fetch),
/// `unpack`, `install`, `executable_dirs`. An update runs the same steps with `update`
/// in place of `install` and without `executable_dirs`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Program: Send + Sync {
    /// Newest version published upstream.
    async fn latest_version(&self, tools: &Toolbox) -> Result<String>;

    /// Files to fetch before unpacking. Destinations must be absolute.
    async fn artifacts(&self, job: &Job, tools: &Toolbox) -> Result<Vec<Artifact>>;

    /// Turn fetched artifacts into files under `job.install_dir`.
    async fn unpack(&self, job: &Job, tools: &Toolbox) -> Result<()>;

    /// Extra work after the first unpack.
    async fn install(&self, _job: &Job, _tools: &Toolbox) -> Result<()> {
        Ok(())
    }

    /// Extra work after unpacking a newer version over an existing install.
    async fn update(&self, _job: &Job, _tools: &Toolbox) -> Result<()> {
        Ok(())
    }

    /// Directories to put on the PATH. Must be absolute directories.
    fn executable_dirs(&self, job: &Job) -> Result<Vec<PathBuf>> {
        Ok(vec![job.install_dir.clone()])
    }

    /// Program-specific teardown, run before a portable install directory is deleted.
    async fn uninstall(&self, _installed: &Installation, _tools: &Toolbox) -> Result<()> {
        Ok(())
    }
}
