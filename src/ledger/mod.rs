//! Durable record of installed programs and the dependency edges between them.
//!
//! The whole document is rewritten on every save: it goes to `<ledger>.tmp` first,
//! is synced, and then renamed over the primary file, so a reader only ever sees the
//! old or the new document.

use crate::error::Error;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    /// Directories registered on the PATH for this program.
    #[serde(default)]
    pub executables: Vec<PathBuf>,
    /// Install directory.
    pub path: PathBuf,
    pub version: String,
}

/// Persisted form of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    /// dependency name -> programs that rely on it
    #[serde(default, alias = "dependences")]
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub installed: BTreeMap<String, InstalledRecord>,
}

pub struct Ledger {
    runtime: Arc<dyn Runtime>,
    path: PathBuf,
    doc: LedgerDocument,
}

impl Ledger {
    /// Read the ledger at `path`, creating an empty one when none exists yet.
    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: Arc<dyn Runtime>, path: &Path) -> Result<Self> {
        let tmp = tmp_path(path);
        if runtime.exists(&tmp) {
            warn!("Removing unfinished ledger write {:?}", tmp);
            runtime
                .remove_file(&tmp)
                .with_context(|| ledger_error(format!("cannot remove {}", tmp.display())))?;
        }

        if !runtime.exists(path) {
            debug!("No ledger at {:?}, creating an empty one", path);
            let ledger = Self {
                runtime,
                path: path.to_path_buf(),
                doc: LedgerDocument::default(),
            };
            ledger.save()?;
            return Ok(ledger);
        }

        let content = runtime
            .read_to_string(path)
            .with_context(|| ledger_error(format!("cannot read {}", path.display())))?;
        let doc: LedgerDocument = serde_json::from_str(&content)
            .with_context(|| ledger_error(format!("{} is corrupt", path.display())))?;
        debug!("Loaded ledger with {} installed programs", doc.installed.len());

        Ok(Self {
            runtime,
            path: path.to_path_buf(),
            doc: normalize(doc),
        })
    }

    /// Atomically replace the on-disk document with the in-memory one.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<()> {
        let mut json = serde_json::to_string_pretty(&self.doc)
            .with_context(|| ledger_error("cannot serialize"))?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            self.runtime
                .create_dir_all(parent)
                .with_context(|| ledger_error(format!("cannot create {}", parent.display())))?;
        }
        let tmp = tmp_path(&self.path);
        self.runtime
            .write(&tmp, json.as_bytes())
            .with_context(|| ledger_error(format!("cannot write {}", tmp.display())))?;
        self.runtime
            .rename(&tmp, &self.path)
            .with_context(|| ledger_error(format!("cannot replace {}", self.path.display())))?;
        debug!("Ledger saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &LedgerDocument {
        &self.doc
    }

    pub fn get(&self, name: &str) -> Option<&InstalledRecord> {
        self.doc.installed.get(name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.doc.installed.contains_key(name)
    }

    /// Installed program names, sorted.
    pub fn installed_names(&self) -> impl Iterator<Item = &String> {
        self.doc.installed.keys()
    }

    /// Installed programs that depend on `name`.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.doc
            .dependencies
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn insert(&mut self, name: &str, record: InstalledRecord) {
        self.doc.installed.insert(name.to_string(), record);
    }

    pub fn set_version(&mut self, name: &str, version: &str) {
        if let Some(record) = self.doc.installed.get_mut(name) {
            record.version = version.to_string();
        }
    }

    /// Record that `dependent` relies on `dependency`.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) {
        self.doc
            .dependencies
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Drop the record of `name`, its own edge entry and its membership in other entries.
    pub fn forget(&mut self, name: &str) -> Option<InstalledRecord> {
        let record = self.doc.installed.remove(name);
        self.doc.dependencies.remove(name);
        self.doc.dependencies.retain(|_, dependents| {
            dependents.remove(name);
            !dependents.is_empty()
        });
        record
    }
}

/// Lowercase every key so lookups match the registry.
fn normalize(doc: LedgerDocument) -> LedgerDocument {
    LedgerDocument {
        dependencies: doc
            .dependencies
            .into_iter()
            .map(|(k, v)| {
                let dependents: BTreeSet<String> = v.iter().map(|d| d.to_lowercase()).collect();
                (k.to_lowercase(), dependents)
            })
            .filter(|(_, v)| !v.is_empty())
            .collect(),
        installed: doc
            .installed
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect(),
    }
}

fn ledger_error(message: impl Into<String>) -> Error {
    Error::Ledger(message.into())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
