use crate::http::HttpClient;
use crate::profile::Artifact;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{info, warn};

/// Outcome of fetching one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Complete(u64),
    /// A tolerant artifact failed and was skipped.
    Skipped,
}

/// Downloads one artifact to its destination.
///
/// On failure any partial file is removed. A tolerant artifact's failure is reported as
/// [`Fetched::Skipped`]; any other failure is returned.
#[tracing::instrument(skip(runtime, http, artifact), fields(url = %artifact.url))]
pub async fn fetch_artifact(
    runtime: &dyn Runtime,
    http: &HttpClient,
    artifact: &Artifact,
) -> Result<Fetched> {
    info!("Downloading {}...", artifact.url);

    match download_to(runtime, http, artifact).await {
        Ok(bytes) => {
            info!("Download complete.");
            Ok(Fetched::Complete(bytes))
        }
        Err(e) => {
            if runtime.exists(&artifact.destination) {
                let _ = runtime.remove_file(&artifact.destination);
            }
            if artifact.tolerant {
                warn!("Skipping optional file {}: {:#}", artifact.url, e);
                Ok(Fetched::Skipped)
            } else {
                Err(e)
            }
        }
    }
}

async fn download_to(runtime: &dyn Runtime, http: &HttpClient, artifact: &Artifact) -> Result<u64> {
    if let Some(parent) = artifact.destination.parent() {
        runtime.create_dir_all(parent)?;
    }
    let destination = &artifact.destination;
    http.download(
        artifact.method.clone(),
        &artifact.url,
        &artifact.query,
        &artifact.form,
        || {
            runtime
                .create_file(destination)
                .with_context(|| format!("Failed to create file at {:?}", destination))
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn http() -> HttpClient {
        HttpClient::with_defaults("appman-test", Duration::from_secs(5)).unwrap()
    }

    fn stage_file() -> PathBuf {
        PathBuf::from("/stage/test.file")
    }

    #[tokio::test]
    async fn test_fetch_artifact() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/test.file")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_dir_all()
            .with(eq(Path::new("/stage").to_path_buf()))
            .returning(|_| Ok(()));
        runtime
            .expect_create_file()
            .with(eq(stage_file()))
            .returning(|_| Ok(Box::new(std::io::sink())));

        let artifact = Artifact::get(stage_file(), format!("{}/test.file", server.url()));
        let result = fetch_artifact(&runtime, &http(), &artifact).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result, Fetched::Complete(12));
    }

    #[tokio::test]
    async fn test_fetch_artifact_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/test.file")
            .with_status(404)
            .create_async()
            .await;

        let mut runtime = MockRuntime::new();
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime.expect_exists().returning(|_| false);

        let artifact = Artifact::get(stage_file(), format!("{}/test.file", server.url()));
        let err = fetch_artifact(&runtime, &http(), &artifact)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_tolerant_failure_is_skipped_and_partial_removed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/eng.cube.lm")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("eng.cube.lm");
        std::fs::write(&dest, "partial").unwrap();

        let artifact =
            Artifact::get(&dest, format!("{}/eng.cube.lm", server.url())).tolerant();
        let result = fetch_artifact(&RealRuntime, &http(), &artifact).await.unwrap();

        assert_eq!(result, Fetched::Skipped);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_post_with_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/download")
            .match_body(mockito::Matcher::UrlEncoded("accept".into(), "1".into()))
            .with_body("payload")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sub/out.bin");
        let artifact = Artifact::post(&dest, format!("{}/download", server.url())).form("accept", "1");

        fetch_artifact(&RealRuntime, &http(), &artifact).await.unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "payload");
    }
}
