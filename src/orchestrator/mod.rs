//! Per-program install, update and remove state machine.
//!
//! A program is either not installed or installed at one version. Every action that
//! changes that state ends with exactly one ledger save; actions that change nothing
//! return a [`Transition`] with a [`SkipReason`] and touch neither the network nor the
//! filesystem.

mod transition;

pub use transition::{SkipReason, Transition};

use crate::cleanup::CleanupGuard;
use crate::download::{self, Fetched};
use crate::error::{self, DependencyError, Error};
use crate::ledger::{InstalledRecord, Ledger};
use crate::profile::{Installation, Job, Mode, Program, Toolbox};
use crate::registry::{ProgramDescriptor, Registry};
use crate::resolver;
use crate::syspath::SystemPath;
use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

pub struct Orchestrator {
    registry: Registry,
    ledger: Ledger,
    tools: Toolbox,
    path: Box<dyn SystemPath>,
    programs_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        registry: Registry,
        ledger: Ledger,
        tools: Toolbox,
        path: Box<dyn SystemPath>,
        programs_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            ledger,
            tools,
            path,
            programs_dir,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn descriptor(&self, name: &str) -> Result<ProgramDescriptor> {
        self.registry
            .lookup_program(name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown program: {}", name))
    }

    /// Install `name` after every missing dependency.
    ///
    /// Dependencies installed before a failure stay installed.
    #[tracing::instrument(skip(self))]
    pub async fn install(&mut self, name: &str) -> Result<Transition> {
        let start = Instant::now();
        let name = name.to_lowercase();
        if let Some(record) = self.ledger.get(&name) {
            return Ok(Transition::skipped(
                SkipReason::AlreadyInstalled,
                Some(record.version.clone()),
                start.elapsed(),
            ));
        }

        let plan = resolver::install_plan(&self.registry, &self.ledger, &name)
            .map_err(Error::from)?;
        let (target, dependencies) = plan
            .split_last()
            .ok_or_else(|| anyhow!("Empty install plan for {}", name))?;

        let mut installed = Vec::new();
        for dependency in dependencies {
            info!("Installing {} (required by {})", dependency, name);
            match self.install_one(dependency).await {
                Ok(t) if t.changed => installed.push(dependency.clone()),
                Ok(t) => {
                    let reason = t
                        .skipped
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "not installed".to_string());
                    return Err(Error::from(DependencyError::Unsatisfied {
                        program: name.clone(),
                        dependency: dependency.clone(),
                        reason,
                    })
                    .into());
                }
                Err(e) if error::is_fatal(&e) => return Err(e),
                Err(e) => {
                    return Err(e.context(Error::from(DependencyError::Failed {
                        program: name.clone(),
                        dependency: dependency.clone(),
                    })));
                }
            }
        }

        let mut transition = self.install_one(target).await?;
        transition.dependencies = installed;
        transition.elapsed = start.elapsed();
        Ok(transition)
    }

    /// Install a single program whose dependencies are already present.
    async fn install_one(&mut self, name: &str) -> Result<Transition> {
        let start = Instant::now();
        let descriptor = self.descriptor(name)?;
        if descriptor.x64_only && !self.tools.platform.is_x64() {
            return Ok(Transition::skipped(
                SkipReason::ArchitectureMismatch,
                None,
                start.elapsed(),
            ));
        }

        let program = descriptor.instantiate();
        let version = program.latest_version(&self.tools).await?;
        info!("Installing {} {}", name, version);

        let install_dir = self.programs_dir.join(name);
        let runtime = self.tools.runtime.clone();
        let mut guard = CleanupGuard::new(runtime.clone());
        if !runtime.exists(&install_dir) {
            runtime
                .create_dir_all(&install_dir)
                .with_context(|| format!("Failed to create {:?}", install_dir))?;
            guard.add(install_dir.clone());
        }

        let staging = self.staging_dir(name)?;
        let mut job = Job {
            mode: Mode::Install,
            name: name.to_string(),
            install_dir: install_dir.clone(),
            current_version: None,
            version: version.clone(),
            staging_dir: staging.path().to_path_buf(),
            fetched: Vec::new(),
        };

        self.acquire(program.as_ref(), &mut job).await?;
        program.install(&job, &self.tools).await?;

        let dirs = program.executable_dirs(&job)?;
        self.check_executable_dirs(name, &dirs)?;
        self.register_path(&dirs)?;

        self.ledger.insert(
            name,
            InstalledRecord {
                executables: dirs,
                path: install_dir,
                version: version.clone(),
            },
        );
        for dependency in &descriptor.dependencies {
            self.ledger.add_edge(dependency, name);
        }
        self.ledger.save()?;
        guard.success();

        Ok(Transition::changed(Some(version), start.elapsed()))
    }

    /// Bring an installed program to the latest version.
    #[tracing::instrument(skip(self))]
    pub async fn update(&mut self, name: &str) -> Result<Transition> {
        let start = Instant::now();
        let name = name.to_lowercase();
        let Some(record) = self.ledger.get(&name).cloned() else {
            return Ok(Transition::skipped(
                SkipReason::NotInstalled,
                None,
                start.elapsed(),
            ));
        };
        let current = Some(record.version.clone());

        let descriptor = self.descriptor(&name)?;
        if !descriptor.can_update {
            return Ok(Transition::skipped(
                SkipReason::UpdateDisabled,
                current,
                start.elapsed(),
            ));
        }
        if descriptor.x64_only && !self.tools.platform.is_x64() {
            return Ok(Transition::skipped(
                SkipReason::ArchitectureMismatch,
                current,
                start.elapsed(),
            ));
        }

        let program = descriptor.instantiate();
        let version = program.latest_version(&self.tools).await?;
        if version == record.version {
            return Ok(Transition::skipped(
                SkipReason::UpToDate,
                current,
                start.elapsed(),
            ));
        }
        info!("Updating {} {} -> {}", name, record.version, version);

        let runtime = &self.tools.runtime;
        if !runtime.exists(&record.path) {
            warn!("Install directory {:?} is missing, recreating it", record.path);
            runtime
                .create_dir_all(&record.path)
                .with_context(|| format!("Failed to create {:?}", record.path))?;
        }

        let staging = self.staging_dir(&name)?;
        let mut job = Job {
            mode: Mode::Update,
            name: name.clone(),
            install_dir: record.path.clone(),
            current_version: current,
            version: version.clone(),
            staging_dir: staging.path().to_path_buf(),
            fetched: Vec::new(),
        };

        self.acquire(program.as_ref(), &mut job).await?;
        program.update(&job, &self.tools).await?;

        self.ledger.set_version(&name, &version);
        self.ledger.save()?;

        Ok(Transition::changed(Some(version), start.elapsed()))
    }

    /// Uninstall a program nothing else depends on.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&mut self, name: &str) -> Result<Transition> {
        let start = Instant::now();
        let name = name.to_lowercase();
        let Some(record) = self.ledger.get(&name).cloned() else {
            return Ok(Transition::skipped(
                SkipReason::NotInstalled,
                None,
                start.elapsed(),
            ));
        };

        let dependents = self.ledger.dependents(&name);
        if !dependents.is_empty() {
            warn!("Cannot remove {}: required by {}", name, dependents.join(", "));
            return Ok(Transition::skipped(
                SkipReason::RequiredBy(dependents),
                Some(record.version),
                start.elapsed(),
            ));
        }

        let descriptor = self.descriptor(&name)?;
        let removed = self.unregister_path(&record.executables)?;

        let program = descriptor.instantiate();
        let installation = Installation {
            name: name.clone(),
            install_dir: record.path.clone(),
            version: record.version.clone(),
        };
        if let Err(e) = program.uninstall(&installation, &self.tools).await {
            self.restore_path(&removed);
            return Err(e);
        }

        let runtime = &self.tools.runtime;
        if descriptor.portable && runtime.exists(&record.path) {
            debug!("Deleting {:?}", record.path);
            runtime
                .remove_dir_all(&record.path)
                .with_context(|| format!("Failed to delete {:?}", record.path))?;
        }

        self.ledger.forget(&name);
        self.ledger.save()?;

        Ok(Transition::changed(None, start.elapsed()))
    }

    /// Fetch the program's artifacts into place and unpack them.
    async fn acquire(&self, program: &dyn Program, job: &mut Job) -> Result<()> {
        let artifacts = program.artifacts(job, &self.tools).await?;
        for artifact in &artifacts {
            artifact.validate(&job.name)?;
        }

        for artifact in artifacts {
            match download::fetch_artifact(self.tools.runtime.as_ref(), &self.tools.http, &artifact)
                .await?
            {
                Fetched::Complete(bytes) => {
                    debug!("Fetched {} bytes to {:?}", bytes, artifact.destination);
                    job.fetched.push(artifact);
                }
                Fetched::Skipped => {}
            }
        }

        program
            .unpack(job, &self.tools)
            .await
            .map_err(|e| typed_or(e, || Error::Extraction(format!("cannot unpack {}", job.name))))
    }

    fn staging_dir(&self, name: &str) -> Result<TempDir> {
        tempfile::Builder::new()
            .prefix(&format!("appman-{}-", name))
            .tempdir_in(self.tools.runtime.temp_dir())
            .context("Failed to create staging directory")
    }

    fn check_executable_dirs(&self, name: &str, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            if !dir.is_absolute() {
                return Err(Error::contract(
                    name,
                    format!("executable dir {} is not absolute", dir.display()),
                )
                .into());
            }
            if self.tools.runtime.exists(dir) && !self.tools.runtime.is_dir(dir) {
                return Err(Error::contract(
                    name,
                    format!("executable dir {} is a file", dir.display()),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Add every dir to the PATH, undoing the additions if one fails.
    fn register_path(&self, dirs: &[PathBuf]) -> Result<()> {
        let mut added: Vec<&Path> = Vec::new();
        for dir in dirs {
            match self.path.add(dir) {
                Ok(true) => added.push(dir),
                Ok(false) => {}
                Err(e) => {
                    for done in added {
                        let _ = self.path.remove(done);
                    }
                    return Err(e.context(format!("Failed to add {:?} to PATH", dir)));
                }
            }
        }
        Ok(())
    }

    /// Remove every dir from the PATH, putting them back if one fails.
    fn unregister_path<'a>(&self, dirs: &'a [PathBuf]) -> Result<Vec<&'a Path>> {
        let mut removed: Vec<&Path> = Vec::new();
        for dir in dirs {
            match self.path.remove(dir) {
                Ok(true) => removed.push(dir),
                Ok(false) => {}
                Err(e) => {
                    self.restore_path(&removed);
                    return Err(e.context(format!("Failed to remove {:?} from PATH", dir)));
                }
            }
        }
        Ok(removed)
    }

    fn restore_path(&self, dirs: &[&Path]) {
        for dir in dirs {
            if let Err(e) = self.path.add(dir) {
                warn!("Cannot restore {:?} on PATH: {:#}", dir, e);
            }
        }
    }
}

/// Keep typed errors as they are; give untyped ones the category of the failing step.
fn typed_or(err: anyhow::Error, category: impl FnOnce() -> Error) -> anyhow::Error {
    if err.downcast_ref::<Error>().is_some() {
        err
    } else {
        err.context(category())
    }
}
