use crate::profile::{Artifact, Job, Program, Toolbox};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const VERSIONS_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions.json";
const DOWNLOAD_URL: &str = "https://storage.googleapis.com/chrome-for-testing-public";

/// chromedriver from the Chrome for Testing stable channel.
pub struct WebdriverChrome {
    versions_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct KnownGoodVersions {
    channels: HashMap<String, Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    version: String,
}

impl Default for WebdriverChrome {
    fn default() -> Self {
        Self::new(VERSIONS_URL, DOWNLOAD_URL)
    }
}

impl WebdriverChrome {
    pub fn new(versions_url: &str, download_url: &str) -> Self {
        Self {
            versions_url: versions_url.to_string(),
            download_url: download_url.trim_end_matches('/').to_string(),
        }
    }

    fn platform_tag(tools: &Toolbox) -> Result<&'static str> {
        let platform = &tools.platform;
        match (platform.os.as_str(), platform.arch.as_str()) {
            ("linux", "x86_64") => Ok("linux64"),
            ("macos", "x86_64") => Ok("mac-x64"),
            ("macos", "aarch64") => Ok("mac-arm64"),
            ("windows", "x86_64") => Ok("win64"),
            (os, arch) => Err(anyhow!("chromedriver is not built for {} {}", os, arch)),
        }
    }
}

#[async_trait]
impl Program for WebdriverChrome {
    async fn latest_version(&self, tools: &Toolbox) -> Result<String> {
        let versions: KnownGoodVersions = tools.http.get_json(&self.versions_url).await?;
        versions
            .channels
            .get("Stable")
            .map(|c| c.version.clone())
            .context("No Stable channel in Chrome for Testing versions")
    }

    async fn artifacts(&self, job: &Job, tools: &Toolbox) -> Result<Vec<Artifact>> {
        let tag = Self::platform_tag(tools)?;
        let file_name = format!("chromedriver-{}.zip", tag);
        let url = format!("{}/{}/{}/{}", self.download_url, job.version, tag, file_name);
        Ok(vec![Artifact::get(job.staging_dir.join(file_name), url)])
    }

    async fn unpack(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        for artifact in &job.fetched {
            tools.extract(&artifact.destination, &job.install_dir)?;
        }
        Ok(())
    }
}
