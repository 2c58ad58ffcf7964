//! Dependency resolution for installs.
//!
//! Produces the order in which programs must be installed so that every dependency is
//! present before the program that needs it. Dependencies already in the ledger are not
//! revisited.

use crate::error::DependencyError;
use crate::ledger::Ledger;
use crate::registry::Registry;
use std::collections::BTreeSet;

/// Install order ending with `target`: missing dependencies first, depth-first.
///
/// Returns [`DependencyError::Cycle`] with the offending path when a dependency leads
/// back to a program that is still being resolved.
#[tracing::instrument(skip(registry, ledger))]
pub fn install_plan(
    registry: &Registry,
    ledger: &Ledger,
    target: &str,
) -> Result<Vec<String>, DependencyError> {
    let mut plan = Vec::new();
    let mut visiting = Vec::new();
    let mut planned = BTreeSet::new();
    visit(registry, ledger, target, &mut visiting, &mut planned, &mut plan)?;
    log::debug!("Install plan for {}: {:?}", target, plan);
    Ok(plan)
}

fn visit(
    registry: &Registry,
    ledger: &Ledger,
    name: &str,
    visiting: &mut Vec<String>,
    planned: &mut BTreeSet<String>,
    plan: &mut Vec<String>,
) -> Result<(), DependencyError> {
    if planned.contains(name) {
        return Ok(());
    }
    if let Some(start) = visiting.iter().position(|n| n == name) {
        let mut path = visiting[start..].to_vec();
        path.push(name.to_string());
        return Err(DependencyError::Cycle(path));
    }

    visiting.push(name.to_string());
    if let Some(descriptor) = registry.lookup_program(name) {
        for dep in &descriptor.dependencies {
            if ledger.is_installed(dep) {
                continue;
            }
            visit(registry, ledger, dep, visiting, planned, plan)?;
        }
    }
    visiting.pop();

    planned.insert(name.to_string());
    plan.push(name.to_string());
    Ok(())
}
