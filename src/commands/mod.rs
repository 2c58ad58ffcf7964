use anyhow::{Result, anyhow, bail};
use log::{debug, error};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    error::{self, Error},
    ledger::Ledger,
    orchestrator::{Orchestrator, SkipReason, Transition},
    profile::Mode,
    registry::Registry,
    runtime::Runtime,
};

pub mod config;
mod paths;

use config::Config;

/// Run `mode` on every requested program, one after the other.
///
/// A program that fails is reported and skipped. Fatal errors and Ctrl-C stop the
/// batch. The elapsed time is printed on every exit path.
#[tracing::instrument(skip(runtime, install_root))]
pub async fn run(
    runtime: Arc<dyn Runtime>,
    mode: Mode,
    names: &[String],
    install_root: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let outcome = tokio::select! {
        result = execute(runtime, mode, names, install_root) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted.into()),
    };
    println!("{}", summary(&outcome, start.elapsed()));
    outcome
}

async fn execute(
    runtime: Arc<dyn Runtime>,
    mode: Mode,
    names: &[String],
    install_root: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(runtime, install_root)?;
    let mut orchestrator = config.orchestrator()?;
    let targets = resolve_targets(orchestrator.registry(), orchestrator.ledger(), mode, names)?;
    debug!("Targets: {:?}", targets);
    run_batch(&mut orchestrator, mode, &targets).await
}

fn summary(outcome: &Result<()>, elapsed: Duration) -> String {
    let elapsed = format_elapsed(elapsed);
    match outcome {
        Ok(()) => format!("All operations done - Time elapsed: {}", elapsed),
        Err(e) if is_interrupt(e) => {
            format!("\nInterrupt received -> Exit (Time elapsed: {})", elapsed)
        }
        Err(_) => format!("\nCritical error raised -> Exit (Time elapsed: {})", elapsed),
    }
}

/// Print every program in the catalogue and every meta with its members.
pub fn available(runtime: Arc<dyn Runtime>, install_root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(runtime, install_root)?;
    let (registry, ledger) = config.load()?;
    println!("{}", available_report(&registry, &ledger));
    Ok(())
}

/// Print installed programs with their versions.
pub fn installed(runtime: Arc<dyn Runtime>, install_root: Option<PathBuf>) -> Result<()> {
    let config = Config::new(runtime, install_root)?;
    let (_, ledger) = config.load()?;
    println!("{}", installed_report(&ledger));
    Ok(())
}

pub fn is_interrupt(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Interrupted))
}

async fn run_batch(orchestrator: &mut Orchestrator, mode: Mode, targets: &[String]) -> Result<()> {
    for name in targets {
        let result = match mode {
            Mode::Install => orchestrator.install(name).await,
            Mode::Update => orchestrator.update(name).await,
            Mode::Remove => orchestrator.remove(name).await,
        };
        match result {
            Ok(transition) => println!("{}", describe(name, mode, &transition)),
            Err(e) if error::is_fatal(&e) => return Err(e),
            Err(e) => {
                error!("{:#}", e);
                println!("{} {} skipped", name, mode);
            }
        }
        println!();
    }
    Ok(())
}

/// Expand metas and `all` into the concrete program names to act on.
pub fn resolve_targets(
    registry: &Registry,
    ledger: &Ledger,
    mode: Mode,
    names: &[String],
) -> Result<Vec<String>> {
    let names: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();

    if mode == Mode::Update && ledger.installed_names().next().is_none() {
        bail!("No programs installed, so there is nothing to update");
    }

    if names.iter().any(|n| n == "all") {
        if mode != Mode::Update {
            bail!("\"all\" can be used only in update mode");
        }
        if names.len() > 1 {
            bail!("\"all\" must be the only program given");
        }
        return Ok(ledger.installed_names().cloned().collect());
    }

    let mut targets: Vec<String> = Vec::new();
    for name in &names {
        let expanded = if registry.lookup_program(name).is_some() {
            vec![name.clone()]
        } else if let Some(members) = registry.expand_meta(name) {
            debug!("Expand {} meta-program -> {:?}", name, members);
            members
        } else {
            return Err(anyhow!("Cannot find \"{}\" profile", name));
        };
        for program in expanded {
            if !targets.contains(&program) {
                targets.push(program);
            }
        }
    }
    Ok(targets)
}

fn describe(name: &str, mode: Mode, transition: &Transition) -> String {
    let version = transition
        .version
        .as_deref()
        .map(|v| format!(" v{}", v))
        .unwrap_or_default();
    let took = format_elapsed(transition.elapsed);

    match (&transition.skipped, mode) {
        (None, Mode::Install) => {
            let mut line = String::new();
            for dependency in &transition.dependencies {
                line.push_str(&format!("\"{}\" installed as a dependency\n", dependency));
            }
            line.push_str(&format!("\"{}\"{} installed ({})", name, version, took));
            line
        }
        (None, Mode::Update) => format!("\"{}\" updated to{} ({})", name, version, took),
        (None, Mode::Remove) => format!("\"{}\" removed ({})", name, took),
        (Some(SkipReason::RequiredBy(dependents)), _) => format!(
            "Cannot remove \"{}\", because it is necessary for: {}",
            name,
            dependents.join(", ")
        ),
        (Some(reason), _) => format!("\"{}\"{}: {}, nothing to {}", name, version, reason, mode),
    }
}

pub fn available_report(registry: &Registry, ledger: &Ledger) -> String {
    let programs = registry.list_programs();
    if programs.is_empty() {
        return "No programs available".to_string();
    }

    let mut report = String::from("Programs available:");
    for name in programs {
        match ledger.get(name) {
            Some(record) => report.push_str(&format!("\n- {} (installed v{})", name, record.version)),
            None => report.push_str(&format!("\n- {}", name)),
        }
    }

    let metas = registry.list_metas();
    if metas.is_empty() {
        report.push_str("\n\nNo meta-programs available");
    } else {
        report.push_str("\n\nMeta-programs available:");
        for meta in metas {
            let members = registry.expand_meta(meta).unwrap_or_default();
            report.push_str(&format!("\n- {} -> {}", meta, members.join(", ")));
        }
    }
    report
}

pub fn installed_report(ledger: &Ledger) -> String {
    let installed = &ledger.document().installed;
    if installed.is_empty() {
        return "No programs installed".to_string();
    }
    let mut report = String::from("Installed programs:");
    for (name, record) in installed {
        report.push_str(&format!("\n- {} v{}", name, record.version));
    }
    report
}

/// `HH:MM:SS`, hours are not wrapped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
