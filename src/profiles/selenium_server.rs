use crate::profile::{Artifact, Job, Program, Toolbox};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Selenium Grid server jar plus a launcher script on the PATH.
pub struct SeleniumServer {
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

impl Default for SeleniumServer {
    fn default() -> Self {
        Self::new(
            "https://api.github.com/repos/SeleniumHQ/selenium/releases/latest",
            "https://github.com/SeleniumHQ/selenium/releases/download",
        )
    }
}

impl SeleniumServer {
    pub fn new(api_url: &str, download_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            download_url: download_url.trim_end_matches('/').to_string(),
        }
    }

    fn jar_name(version: &str) -> String {
        format!("selenium-server-{}.jar", version)
    }

    /// Write the launcher for the jar of `job.version`, replacing any previous one.
    fn write_launcher(job: &Job, tools: &Toolbox) -> Result<()> {
        let jar = Self::jar_name(&job.version);
        let (file_name, content) = if tools.platform.is_windows() {
            (
                "selenium-server.cmd",
                format!("@echo off\r\njava -jar \"%~dp0{}\" %*\r\n", jar),
            )
        } else {
            (
                "selenium-server",
                format!(
                    "#!/bin/sh\nexec java -jar \"$(dirname \"$0\")/{}\" \"$@\"\n",
                    jar
                ),
            )
        };

        let launcher = job.install_dir.join(file_name);
        tools
            .runtime
            .write(&launcher, content.as_bytes())
            .with_context(|| format!("Failed to write launcher {:?}", launcher))?;
        tools.runtime.set_permissions(&launcher, 0o755)?;
        Ok(())
    }

    /// Remove jars of versions other than `keep`.
    fn prune_jars(install_dir: &Path, keep: &str, tools: &Toolbox) -> Result<()> {
        for jar in tools.glob(&install_dir.join("selenium-server-*.jar"))? {
            if jar.file_name().is_some_and(|n| n != keep) {
                debug!("Removing old jar {:?}", jar);
                tools.runtime.remove_file(&jar)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Program for SeleniumServer {
    async fn latest_version(&self, tools: &Toolbox) -> Result<String> {
        let release: Release = tools.http.get_json(&self.api_url).await?;
        Ok(release
            .tag_name
            .trim_start_matches("selenium-")
            .to_string())
    }

    async fn artifacts(&self, job: &Job, _tools: &Toolbox) -> Result<Vec<Artifact>> {
        let jar = Self::jar_name(&job.version);
        let url = format!("{}/selenium-{}/{}", self.download_url, job.version, jar);
        Ok(vec![Artifact::get(job.staging_dir.join(&jar), url)])
    }

    async fn unpack(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        let jar = Self::jar_name(&job.version);
        let fetched = job
            .fetched_file(&jar)
            .with_context(|| format!("{} was not downloaded", jar))?;
        tools.copy_into(&fetched.destination, &job.install_dir.join(&jar))?;
        Self::prune_jars(&job.install_dir, &jar, tools)
    }

    async fn install(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        Self::write_launcher(job, tools)
    }

    async fn update(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        Self::write_launcher(job, tools)
    }

    fn executable_dirs(&self, job: &Job) -> Result<Vec<PathBuf>> {
        Ok(vec![job.install_dir.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::test_support::{job, toolbox};
    use std::fs;

    #[tokio::test]
    async fn test_latest_version_strips_tag_prefix() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/releases/latest")
            .with_body(r#"{"tag_name":"selenium-4.25.0","name":"Selenium 4.25"}"#)
            .create_async()
            .await;

        let profile =
            SeleniumServer::new(&format!("{}/releases/latest", server.url()), "https://dl");
        let version = profile
            .latest_version(&toolbox("linux", "x86_64"))
            .await
            .unwrap();

        assert_eq!(version, "4.25.0");
    }

    #[tokio::test]
    async fn test_artifact_url() {
        let job = job(Path::new("/tmp/appman-test"), "selenium-server", "4.25.0");
        let files = SeleniumServer::default()
            .artifacts(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap();

        assert_eq!(
            files[0].url,
            "https://github.com/SeleniumHQ/selenium/releases/download/selenium-4.25.0/selenium-server-4.25.0.jar"
        );
    }

    #[tokio::test]
    async fn test_update_replaces_jar_and_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let tools = toolbox("linux", "x86_64");
        let profile = SeleniumServer::default();

        let mut job = job(dir.path(), "selenium-server", "4.25.0");
        fs::create_dir_all(&job.install_dir).unwrap();
        fs::write(job.install_dir.join("selenium-server-4.24.0.jar"), "old").unwrap();
        fs::create_dir_all(&job.staging_dir).unwrap();
        let jar = job.staging_dir.join("selenium-server-4.25.0.jar");
        fs::write(&jar, "new").unwrap();
        job.fetched = vec![Artifact::get(&jar, "https://example.com/s.jar")];

        profile.unpack(&job, &tools).await.unwrap();
        profile.update(&job, &tools).await.unwrap();

        assert!(!job.install_dir.join("selenium-server-4.24.0.jar").exists());
        assert_eq!(
            fs::read_to_string(job.install_dir.join("selenium-server-4.25.0.jar")).unwrap(),
            "new"
        );
        let launcher = fs::read_to_string(job.install_dir.join("selenium-server")).unwrap();
        assert!(launcher.contains("selenium-server-4.25.0.jar"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(job.install_dir.join("selenium-server"))
                .unwrap()
                .permissions()
                .mode();
            assert!(mode & 0o111 != 0);
        }
    }

    #[tokio::test]
    async fn test_unpack_without_jar_fails() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "selenium-server", "4.25.0");

        let err = SeleniumServer::default()
            .unpack(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("was not downloaded"));
    }
}
