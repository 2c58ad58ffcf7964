use std::fmt;
use std::time::Duration;

/// Why a requested action left the program as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyInstalled,
    NotInstalled,
    ArchitectureMismatch,
    UpdateDisabled,
    UpToDate,
    /// Installed programs that still depend on the one being removed.
    RequiredBy(Vec<String>),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyInstalled => f.write_str("already installed"),
            SkipReason::NotInstalled => f.write_str("not installed"),
            SkipReason::ArchitectureMismatch => f.write_str("architecture mismatch, x64 only"),
            SkipReason::UpdateDisabled => f.write_str("update disabled"),
            SkipReason::UpToDate => f.write_str("already up to date"),
            SkipReason::RequiredBy(names) => write!(f, "required by {}", names.join(", ")),
        }
    }
}

/// Result of one lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    /// Version after the action, when the program is installed.
    pub version: Option<String>,
    pub elapsed: Duration,
    pub skipped: Option<SkipReason>,
    /// Dependencies installed on the way, in install order.
    pub dependencies: Vec<String>,
}

impl Transition {
    pub fn changed(version: Option<String>, elapsed: Duration) -> Self {
        Self {
            changed: true,
            version,
            elapsed,
            skipped: None,
            dependencies: Vec::new(),
        }
    }

    pub fn skipped(reason: SkipReason, version: Option<String>, elapsed: Duration) -> Self {
        Self {
            changed: false,
            version,
            elapsed,
            skipped: Some(reason),
            dependencies: Vec::new(),
        }
    }
}
