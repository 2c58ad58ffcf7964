//! PATH registration.
//!
//! Executable directories are kept in a small environment script under the install
//! root that users source from their shell profile. Each registered directory is one
//! line; the script is rewritten atomically on every change.

use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg_attr(test, mockall::automock)]
pub trait SystemPath: Send + Sync {
    /// Register `dir`. Returns false when it was already registered.
    fn add(&self, dir: &Path) -> Result<bool>;

    /// Unregister `dir`. Returns false when it was not registered.
    fn remove(&self, dir: &Path) -> Result<bool>;
}

/// Shell dialect of the environment script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStyle {
    /// POSIX shell: `export PATH="dir:$PATH"`
    Posix,
    /// cmd.exe: `set "PATH=dir;%PATH%"`
    Cmd,
}

impl ScriptStyle {
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptStyle::Cmd
        } else {
            ScriptStyle::Posix
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ScriptStyle::Posix => "env.sh",
            ScriptStyle::Cmd => "env.cmd",
        }
    }

    fn header(self) -> &'static str {
        match self {
            ScriptStyle::Posix => "# Generated by appman. Source this file to use installed programs.",
            ScriptStyle::Cmd => "@REM Generated by appman. Call this file to use installed programs.",
        }
    }

    fn line(self, dir: &str) -> String {
        match self {
            ScriptStyle::Posix => format!("export PATH=\"{}:$PATH\"", dir),
            ScriptStyle::Cmd => format!("set \"PATH={};%PATH%\"", dir),
        }
    }

    fn parse(self, line: &str) -> Option<String> {
        let (prefix, suffix) = match self {
            ScriptStyle::Posix => ("export PATH=\"", ":$PATH\""),
            ScriptStyle::Cmd => ("set \"PATH=", ";%PATH%\""),
        };
        line.trim()
            .strip_prefix(prefix)?
            .strip_suffix(suffix)
            .map(str::to_string)
    }
}

/// [`SystemPath`] backed by an environment script.
pub struct EnvScript {
    runtime: Arc<dyn Runtime>,
    path: PathBuf,
    style: ScriptStyle,
}

impl EnvScript {
    pub fn new(runtime: Arc<dyn Runtime>, path: PathBuf, style: ScriptStyle) -> Self {
        Self {
            runtime,
            path,
            style,
        }
    }

    /// Native script inside `root`.
    pub fn in_root(runtime: Arc<dyn Runtime>, root: &Path) -> Self {
        let style = ScriptStyle::native();
        Self::new(runtime, root.join(style.file_name()), style)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directories currently registered, in file order.
    pub fn entries(&self) -> Result<Vec<String>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Vec::new());
        }
        let content = self
            .runtime
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        Ok(content
            .lines()
            .filter_map(|line| self.style.parse(line))
            .collect())
    }

    fn store(&self, entries: &[String]) -> Result<()> {
        let mut content = String::from(self.style.header());
        content.push('\n');
        for entry in entries {
            content.push_str(&self.style.line(entry));
            content.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let tmp = tmp_path(&self.path);
        self.runtime
            .write(&tmp, content.as_bytes())
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        self.runtime
            .rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

impl SystemPath for EnvScript {
    #[tracing::instrument(skip(self))]
    fn add(&self, dir: &Path) -> Result<bool> {
        let dir = dir.to_string_lossy().into_owned();
        let mut entries = self.entries()?;
        if entries.contains(&dir) {
            debug!("{} is already on the PATH", dir);
            return Ok(false);
        }
        entries.push(dir.clone());
        self.store(&entries)?;
        info!("Added {} to PATH in {:?}", dir, self.path);
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    fn remove(&self, dir: &Path) -> Result<bool> {
        let dir = dir.to_string_lossy().into_owned();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| e != &dir);
        if entries.len() == before {
            debug!("{} is not on the PATH", dir);
            return Ok(false);
        }
        self.store(&entries)?;
        info!("Removed {} from PATH in {:?}", dir, self.path);
        Ok(true)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
