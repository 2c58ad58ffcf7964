//! Error taxonomy.
//!
//! Application code propagates `anyhow::Error` the same way the rest of the crate does.
//! The typed errors below are attached either as the root error or as context, so the
//! batch driver can tell a per-program failure from one that must stop the whole run
//! with [`is_fatal`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The compiled-in catalogue violates a registry invariant.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The persisted ledger cannot be read, parsed or written.
    #[error("ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Transport, status or timeout failure while talking to a remote server.
    #[error("network error: {0}")]
    Network(String),

    /// An archive or installer could not be unpacked.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A program profile returned something outside its contract.
    #[error("profile `{program}` broke its contract: {message}")]
    ProfileContract { program: String, message: String },

    /// The user pressed Ctrl-C.
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    pub fn contract(program: &str, message: impl Into<String>) -> Self {
        Self::ProfileContract {
            program: program.to_string(),
            message: message.into(),
        }
    }

    /// Fatal errors terminate the run instead of skipping one program.
    ///
    /// A dependency cycle found while resolving only skips the affected program; the
    /// same cycle found while building the registry aborts startup before any action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Ledger(_))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DependencyError {
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("cannot install {program}: dependency {dependency} failed")]
    Failed { program: String, dependency: String },

    #[error("cannot install {program}: dependency {dependency} is still missing ({reason})")]
    Unsatisfied {
        program: String,
        dependency: String,
        reason: String,
    },
}

/// Returns true when `err` (or any context layered on top of it) carries a fatal [`Error`].
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>().is_some_and(Error::is_fatal)
}
