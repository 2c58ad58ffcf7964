//! Host directories and privilege.

use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    pub(crate) fn temp_dir_impl(&self) -> PathBuf {
        std::env::temp_dir()
    }

    /// Root on unix, an elevated token on windows.
    #[tracing::instrument(skip(self))]
    pub(crate) fn is_privileged_impl(&self) -> bool {
        #[cfg(unix)]
        return nix::unistd::geteuid().is_root();

        #[cfg(windows)]
        return is_elevated::is_elevated();
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_temp_dir_is_usable_for_staging() {
        let runtime = RealRuntime;

        let temp = runtime.temp_dir();
        let staging = tempfile::tempdir_in(&temp).unwrap();

        assert!(staging.path().starts_with(&temp));
    }

    #[cfg(unix)]
    #[test]
    fn test_privilege_matches_effective_uid() {
        let runtime = RealRuntime;
        assert_eq!(
            runtime.is_privileged(),
            nix::unistd::geteuid().as_raw() == 0
        );
    }
}
