use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Get the default installation root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root(runtime: &dyn Runtime) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".appman"))
    }
}

#[cfg(target_os = "macos")]
fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/appman")
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\appman")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/appman")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;

    #[test]
    fn test_default_install_root_in_home() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_privileged().returning(|| false);
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));

        let root = default_install_root(&runtime).unwrap();

        assert_eq!(root, PathBuf::from("/home/user").join(".appman"));
    }

    #[test]
    fn test_default_install_root_no_home() {
        // Home directory is required for a non-privileged user
        let mut runtime = MockRuntime::new();
        runtime.expect_is_privileged().returning(|| false);
        runtime.expect_home_dir().returning(|| None);

        let result = default_install_root(&runtime);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_install_root_privileged() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_privileged().returning(|| true);

        let root = default_install_root(&runtime).unwrap();

        #[cfg(target_os = "macos")]
        assert_eq!(root, PathBuf::from("/opt/appman"));
        #[cfg(all(unix, not(target_os = "macos")))]
        assert_eq!(root, PathBuf::from("/usr/local/appman"));
        #[cfg(target_os = "windows")]
        assert_eq!(root, PathBuf::from("C:\\ProgramData\\appman"));
    }
}
