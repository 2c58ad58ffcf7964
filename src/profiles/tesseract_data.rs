use super::version_from_url;
use crate::error::Error;
use crate::profile::{Artifact, Job, Program, Toolbox};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Languages installed by default.
const LANGS: [&str; 2] = ["eng", "ita"];

/// Legacy per-language model files. Newer tessdata releases dropped them.
const CUBE_SUFFIXES: [&str; 8] = [
    "cube.bigrams",
    "cube.fold",
    "cube.lm",
    "cube.nn",
    "cube.params",
    "cube.size",
    "cube.word-freq",
    "tesseract_cube.nn",
];

/// Trained language data for Tesseract OCR, stored under `<install_dir>/tessdata`.
pub struct TesseractData {
    release_url: String,
    raw_url: String,
    langs: Vec<String>,
}

impl Default for TesseractData {
    fn default() -> Self {
        Self::new(
            "https://github.com/tesseract-ocr/tessdata/releases/latest",
            "https://raw.githubusercontent.com/tesseract-ocr/tessdata",
            &LANGS,
        )
    }
}

impl TesseractData {
    pub fn new(release_url: &str, raw_url: &str, langs: &[&str]) -> Self {
        Self {
            release_url: release_url.to_string(),
            raw_url: raw_url.trim_end_matches('/').to_string(),
            langs: langs.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn file(&self, job: &Job, name: &str) -> Artifact {
        Artifact::get(
            job.staging_dir.join(name),
            format!("{}/{}/{}", self.raw_url, job.version, name),
        )
    }

    fn tessdata_dir(job: &Job) -> PathBuf {
        job.install_dir.join("tessdata")
    }
}

#[async_trait]
impl Program for TesseractData {
    async fn latest_version(&self, tools: &Toolbox) -> Result<String> {
        let location = tools.http.redirect_location(&self.release_url).await?;
        version_from_url(&location, "").ok_or_else(|| {
            Error::Network(format!("{}: no version in {}", self.release_url, location)).into()
        })
    }

    async fn artifacts(&self, job: &Job, _tools: &Toolbox) -> Result<Vec<Artifact>> {
        let mut files = vec![
            self.file(job, "osd.traineddata"),
            self.file(job, "equ.traineddata").tolerant(),
        ];
        for lang in &self.langs {
            files.push(self.file(job, &format!("{}.traineddata", lang)));
            for suffix in CUBE_SUFFIXES {
                files.push(self.file(job, &format!("{}.{}", lang, suffix)).tolerant());
            }
        }
        Ok(files)
    }

    async fn unpack(&self, job: &Job, tools: &Toolbox) -> Result<()> {
        let tessdata = Self::tessdata_dir(job);
        for artifact in &job.fetched {
            if let Some(name) = artifact.destination.file_name() {
                tools.copy_into(&artifact.destination, &tessdata.join(name))?;
            }
        }
        Ok(())
    }

    fn executable_dirs(&self, _job: &Job) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::test_support::{job, toolbox};
    use std::fs;

    #[tokio::test]
    async fn test_latest_version() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("HEAD", "/releases/latest")
            .with_status(302)
            .with_header(
                "location",
                "https://github.com/tesseract-ocr/tessdata/releases/tag/4.1.0",
            )
            .create_async()
            .await;

        let profile =
            TesseractData::new(&format!("{}/releases/latest", server.url()), "https://raw", &["eng"]);
        let version = profile
            .latest_version(&toolbox("linux", "x86_64"))
            .await
            .unwrap();

        assert_eq!(version, "4.1.0");
    }

    #[tokio::test]
    async fn test_only_core_files_are_required() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "tesseract-data", "4.1.0");
        let profile = TesseractData::new("https://unused", "https://raw.example.com/tessdata", &["eng"]);

        let files = profile
            .artifacts(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap();

        let required: Vec<&str> = files
            .iter()
            .filter(|a| !a.tolerant)
            .map(|a| a.url.as_str())
            .collect();
        assert_eq!(
            required,
            vec![
                "https://raw.example.com/tessdata/4.1.0/osd.traineddata",
                "https://raw.example.com/tessdata/4.1.0/eng.traineddata",
            ]
        );
        assert_eq!(files.len(), 2 + 1 + CUBE_SUFFIXES.len());
        assert!(files.iter().all(|a| a.destination.starts_with(&job.staging_dir)));
    }

    #[tokio::test]
    async fn test_unpack_copies_fetched_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), "tesseract-data", "4.1.0");
        fs::create_dir_all(&job.staging_dir).unwrap();
        let eng = job.staging_dir.join("eng.traineddata");
        fs::write(&eng, "eng").unwrap();
        job.fetched = vec![Artifact::get(&eng, "https://example.com/eng.traineddata")];

        let profile = TesseractData::default();
        profile
            .unpack(&job, &toolbox("linux", "x86_64"))
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(job.install_dir.join("tessdata/eng.traineddata")).unwrap(),
            "eng"
        );
        assert!(profile.executable_dirs(&job).unwrap().is_empty());
    }
}
