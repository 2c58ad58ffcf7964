use anyhow::Result;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

use super::paths::default_install_root;
use crate::{
    archive::ArchiveExtractorImpl,
    http::{DEFAULT_TIMEOUT, HttpClient},
    ledger::Ledger,
    orchestrator::Orchestrator,
    platform::Platform,
    profile::Toolbox,
    profiles,
    registry::Registry,
    runtime::Runtime,
    syspath::EnvScript,
};

/// Everything a command needs to locate and build its collaborators.
pub struct Config {
    pub runtime: Arc<dyn Runtime>,
    pub root: PathBuf,
}

impl Config {
    pub fn new(runtime: Arc<dyn Runtime>, install_root: Option<PathBuf>) -> Result<Self> {
        let root = match install_root {
            Some(path) => path,
            None => default_install_root(runtime.as_ref())?,
        };
        info!("Using install root: {}", root.display());
        Ok(Self { runtime, root })
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger.json")
    }

    pub fn programs_dir(&self) -> PathBuf {
        self.root.join("programs")
    }

    pub fn user_agent() -> String {
        format!("appman/{}", env!("APPMAN_VERSION"))
    }

    pub fn toolbox(&self) -> Result<Toolbox> {
        let http = HttpClient::with_defaults(&Self::user_agent(), DEFAULT_TIMEOUT)?;
        let platform = Platform::detect();
        debug!("Detected platform: {} {}", platform.os, platform.arch);
        Ok(Toolbox::new(
            self.runtime.clone(),
            http,
            Arc::new(ArchiveExtractorImpl::new()),
            platform,
        ))
    }

    /// Load the ledger and check it against the catalogue.
    pub fn load(&self) -> Result<(Registry, Ledger)> {
        let (programs, metas) = profiles::catalogue();
        let registry = Registry::new(programs, metas)?;
        let ledger = Ledger::load(self.runtime.clone(), &self.ledger_path())?;
        registry.check_ledger(ledger.installed_names())?;
        Ok((registry, ledger))
    }

    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let (registry, ledger) = self.load()?;
        let path = EnvScript::in_root(self.runtime.clone(), &self.root);
        Ok(Orchestrator::new(
            registry,
            ledger,
            self.toolbox()?,
            Box::new(path),
            self.programs_dir(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{self, Error};
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;

    #[test]
    fn test_layout_under_root() {
        let config = Config::new(Arc::new(MockRuntime::new()), Some(PathBuf::from("/srv/appman")))
            .unwrap();

        assert_eq!(config.ledger_path(), PathBuf::from("/srv/appman/ledger.json"));
        assert_eq!(config.programs_dir(), PathBuf::from("/srv/appman/programs"));
    }

    #[test]
    fn test_user_agent() {
        assert!(Config::user_agent().starts_with("appman/"));
    }

    #[test]
    fn test_load_creates_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(Arc::new(RealRuntime), Some(dir.path().to_path_buf())).unwrap();

        let (registry, ledger) = config.load().unwrap();

        assert!(registry.lookup_program("webdriver-firefox").is_some());
        assert_eq!(ledger.installed_names().count(), 0);
        assert!(dir.path().join("ledger.json").exists());
    }

    #[test]
    fn test_orphaned_ledger_entry_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ledger.json"),
            r#"{"installed":{"notepad":{"executables":[],"path":"/p","version":"1"}}}"#,
        )
        .unwrap();
        let config = Config::new(Arc::new(RealRuntime), Some(dir.path().to_path_buf())).unwrap();

        let err = config.load().err().unwrap();

        assert!(error::is_fatal(&err));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Configuration(msg)) if msg.contains("notepad")
        ));
    }
}
