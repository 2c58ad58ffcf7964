use super::version_from_url;
use crate::error::Error;
use crate::profile::{Artifact, Job, Program, Toolbox};
use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// geckodriver, the WebDriver for Firefox.
pub struct WebdriverFirefox {
    base_url: String,
}

impl Default for WebdriverFirefox {
    fn default() -> Self {
        Self::new("https://github.com")
    }
}

impl WebdriverFirefox {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn asset_name(version: &str, tools: &Toolbox) -> Result<String> {
        let platform = &tools.platform;
        let suffix = match (platform.os.as_str(), platform.arch.as_str()) {
            ("linux", "x86_64") => "linux64.tar.gz",
            ("linux", "aarch64") => "linux-aarch64.tar.gz",
            ("linux", "x86") => "linux32.tar.gz",
            ("macos", "aarch64") => "macos-aarch64.tar.gz",
            ("macos", _) => "macos.tar.gz",
            ("windows", "x86_64") => "win64.zip",
            ("windows", "aarch64") => "win-aarch64.zip",
            ("windows", "x86") => "win32.zip",
            (os, arch) => return Err(anyhow!("geckodriver is not built for {} {}", os, arch)),
        };
        Ok(format!("geckodriver-v{}-{}", version, suffix))
    }
}

#[async_trait]
impl Program for WebdriverFirefox {
    async fn latest_version(&self, tools: &Toolbox) -> Result<String> {
        let url = format!("{}/mozilla/geckodriver/releases/latest", self.base_url);
        let location = tools.http.redirect_location(&url).await?;
        version_from_url(&location, "v").ok_or_else(|| {
            Error::Network(format!("{}: no version in redirect to {}", url, location)).into()
        })
    }

    async fn artifacts(&self, job: &Job, tools: &Toolbox) -> Result<Vec<Artifact>> {
        let asset = Self::asset_name(&job.version, tools)?;
        let url = format!(
            "{}/mozilla/geckodriver/releases/download/v{}/{}",
            self.base_url, job.version, asset
        );
        Ok(vec![Artifact::get(job.staging_dir.join(asset), url)])
    }

    async fn unpack(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        for artifact in &job.fetched {
            tools.extract(&artifact.destination, &job.install_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::test_support::{job, toolbox};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::path::Path;

    #[tokio::test]
    async fn test_latest_version_from_redirect() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/mozilla/geckodriver/releases/latest")
            .with_status(302)
            .with_header(
                "location",
                "https://github.com/mozilla/geckodriver/releases/tag/v0.35.0",
            )
            .create_async()
            .await;

        let version = WebdriverFirefox::new(&server.url())
            .latest_version(&toolbox("linux", "x86_64"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(version, "0.35.0");
    }

    #[tokio::test]
    async fn test_artifacts_per_platform() {
        let root = Path::new("/tmp/appman-test");
        let job = job(root, "webdriver-firefox", "0.35.0");
        let profile = WebdriverFirefox::default();

        let linux = profile
            .artifacts(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap();
        assert_eq!(
            linux[0].url,
            "https://github.com/mozilla/geckodriver/releases/download/v0.35.0/geckodriver-v0.35.0-linux64.tar.gz"
        );
        assert_eq!(
            linux[0].destination,
            root.join("staging/geckodriver-v0.35.0-linux64.tar.gz")
        );

        let windows = profile
            .artifacts(&job, &toolbox("windows", "x86_64"))
            .await
            .unwrap();
        assert!(windows[0].url.ends_with("geckodriver-v0.35.0-win64.zip"));

        let mac = profile
            .artifacts(&job, &toolbox("macos", "aarch64"))
            .await
            .unwrap();
        assert!(mac[0].url.ends_with("geckodriver-v0.35.0-macos-aarch64.tar.gz"));

        assert!(
            profile
                .artifacts(&job, &toolbox("freebsd", "x86_64"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unpack_extracts_into_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), "webdriver-firefox", "0.35.0");
        fs::create_dir_all(&job.staging_dir).unwrap();
        let archive = job.staging_dir.join("geckodriver-v0.35.0-linux64.tar.gz");
        {
            let file = fs::File::create(&archive).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let mut header = tar::Header::new_gnu();
            header.set_size(3);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "geckodriver", &b"elf"[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        job.fetched = vec![Artifact::get(&archive, "https://example.com/g.tar.gz")];

        WebdriverFirefox::default()
            .unpack(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(job.install_dir.join("geckodriver")).unwrap(),
            "elf"
        );
        assert_eq!(
            WebdriverFirefox::default().executable_dirs(&job).unwrap(),
            vec![job.install_dir.clone()]
        );
    }
}
