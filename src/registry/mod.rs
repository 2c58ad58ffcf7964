//! Capability registry.
//!
//! Indexes the compiled-in program and meta descriptors by name and checks every
//! catalogue invariant once at startup, so the rest of the crate can assume them.

mod descriptor;

pub use descriptor::{MetaDescriptor, ProgramDescriptor};

use crate::error::{DependencyError, Error};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
pub struct Registry {
    programs: BTreeMap<String, ProgramDescriptor>,
    metas: BTreeMap<String, MetaDescriptor>,
}

impl Registry {
    /// Index and validate a catalogue. Any violation is fatal for the run.
    #[tracing::instrument(skip_all)]
    pub fn new(programs: Vec<ProgramDescriptor>, metas: Vec<MetaDescriptor>) -> Result<Self> {
        let registry = Self::index(programs, metas)?;
        registry.validate()?;
        registry.check_cycles()?;
        log::debug!(
            "Registry ready: {} programs, {} metas",
            registry.programs.len(),
            registry.metas.len()
        );
        Ok(registry)
    }

    /// Index without the dependency cycle check.
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        programs: Vec<ProgramDescriptor>,
        metas: Vec<MetaDescriptor>,
    ) -> Result<Self> {
        let registry = Self::index(programs, metas)?;
        registry.validate()?;
        Ok(registry)
    }

    fn index(programs: Vec<ProgramDescriptor>, metas: Vec<MetaDescriptor>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for program in programs {
            if program.name.is_empty() {
                return Err(config_error("program with an empty name"));
            }
            if by_name.contains_key(&program.name) {
                return Err(config_error(format!("duplicate program `{}`", program.name)));
            }
            by_name.insert(program.name.clone(), program);
        }

        let mut metas_by_name = BTreeMap::new();
        for meta in metas {
            if meta.name.is_empty() {
                return Err(config_error("meta with an empty name"));
            }
            if metas_by_name.contains_key(&meta.name) {
                return Err(config_error(format!("duplicate meta `{}`", meta.name)));
            }
            metas_by_name.insert(meta.name.clone(), meta);
        }

        Ok(Self {
            programs: by_name,
            metas: metas_by_name,
        })
    }

    fn validate(&self) -> Result<()> {
        for meta in self.metas.values() {
            if self.programs.contains_key(&meta.name) {
                return Err(config_error(format!(
                    "`{}` is both a program and a meta",
                    meta.name
                )));
            }
            if meta.members.is_empty() {
                return Err(config_error(format!("meta `{}` has no members", meta.name)));
            }
            if meta.members.contains(&meta.name) {
                return Err(config_error(format!("meta `{}` contains itself", meta.name)));
            }
            if let Some(unknown) = meta.members.iter().find(|m| !self.programs.contains_key(*m)) {
                return Err(config_error(format!(
                    "meta `{}` lists unknown program `{}`",
                    meta.name, unknown
                )));
            }
        }

        for program in self.programs.values() {
            if program.dependencies.contains(&program.name) {
                return Err(config_error(format!(
                    "program `{}` depends on itself",
                    program.name
                )));
            }
            if let Some(unknown) = program
                .dependencies
                .iter()
                .find(|d| !self.programs.contains_key(*d))
            {
                return Err(config_error(format!(
                    "program `{}` depends on unknown program `{}`",
                    program.name, unknown
                )));
            }
        }
        Ok(())
    }

    /// Depth-first search over the dependency graph, in name order.
    fn check_cycles(&self) -> Result<()> {
        let mut done = BTreeSet::new();
        for name in self.programs.keys() {
            let mut stack = Vec::new();
            self.visit(name, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|n| *n == name) {
            let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            path.push(name.to_string());
            return Err(Error::from(DependencyError::Cycle(path)).into());
        }

        stack.push(name);
        if let Some(program) = self.programs.get(name) {
            for dep in &program.dependencies {
                self.visit(dep, stack, done)?;
            }
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    pub fn lookup_program(&self, name: &str) -> Option<&ProgramDescriptor> {
        self.programs.get(&name.to_lowercase())
    }

    pub fn lookup_meta(&self, name: &str) -> Option<&MetaDescriptor> {
        self.metas.get(&name.to_lowercase())
    }

    /// Program names, sorted.
    pub fn list_programs(&self) -> Vec<&str> {
        self.programs.keys().map(String::as_str).collect()
    }

    /// Meta names, sorted.
    pub fn list_metas(&self) -> Vec<&str> {
        self.metas.keys().map(String::as_str).collect()
    }

    /// Sorted, deduplicated members of a meta. `None` for unknown names.
    pub fn expand_meta(&self, name: &str) -> Option<Vec<String>> {
        self.lookup_meta(name)
            .map(|meta| meta.members.iter().cloned().collect())
    }

    /// Every name recorded as installed must still have a descriptor.
    pub fn check_ledger<'a, I>(&self, installed: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let orphans: Vec<&str> = installed
            .into_iter()
            .filter(|name| !self.programs.contains_key(*name))
            .map(String::as_str)
            .collect();
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(config_error(format!(
                "ledger records unknown programs: {}",
                orphans.join(", ")
            )))
        }
    }
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    Error::Configuration(message.into()).into()
}
