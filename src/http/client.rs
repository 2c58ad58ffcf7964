//! HTTP client shared by every program action.

use anyhow::{Context, Result};
use log::debug;
use reqwest::header::{HeaderMap, LAST_MODIFIED, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response, redirect::Policy};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::time::Duration;

use crate::error::Error;

/// Per-request timeout applied to every client built by [`HttpClient::with_defaults`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// HTTP client with text/JSON/raw helpers and streaming downloads.
///
/// Two reqwest clients are kept: one follows redirects (downloads, API calls) and
/// one does not (reading the `Location` of "latest release" style redirects).
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest clients.
    pub fn new(client: Client, no_redirect: Client) -> Self {
        Self {
            client,
            no_redirect,
        }
    }

    /// Builds both clients with the given user agent and timeout.
    pub fn with_defaults(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let no_redirect = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client, no_redirect))
    }

    /// Returns a reference to the underlying redirect-following reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs a GET request and returns the response body as text.
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET text from {}...", url);
        let response = send(url, self.client.get(url)).await?;
        response
            .text()
            .await
            .map_err(|e| network_error(url, e))
    }

    /// Performs a GET request and returns the raw response body.
    #[tracing::instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET raw from {}...", url);
        let response = send(url, self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(|e| network_error(url, e))?;
        Ok(bytes.to_vec())
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);
        let response = send(url, self.client.get(url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| network_error(url, e))
            .context("Failed to parse JSON response")
    }

    /// Performs a form-encoded POST request and deserializes the JSON response.
    #[tracing::instrument(skip(self, form))]
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        debug!("POST JSON to {}...", url);
        let response = send(url, self.client.post(url).form(form)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| network_error(url, e))
            .context("Failed to parse JSON response")
    }

    /// Performs a HEAD request without following redirects and returns the headers.
    #[tracing::instrument(skip(self))]
    pub async fn head(&self, url: &str) -> Result<HeaderMap> {
        debug!("HEAD {}...", url);
        let response = self
            .no_redirect
            .head(url)
            .send()
            .await
            .map_err(|e| network_error(url, e))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(network_error(url, format!("HTTP status {}", status)));
        }
        Ok(response.headers().clone())
    }

    /// Returns the target of a redirect served at `url`.
    pub async fn redirect_location(&self, url: &str) -> Result<String> {
        let headers = self.head(url).await?;
        headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .ok_or_else(|| network_error(url, "response has no Location header"))
    }

    /// Returns the `Last-Modified` header of `url`, if the server sends one.
    pub async fn last_modified(&self, url: &str) -> Result<Option<String>> {
        let headers = self.head(url).await?;
        Ok(headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string()))
    }

    /// Streams the body of a GET/POST request into the writer produced by `create_writer`.
    ///
    /// The writer is only created once the server answered with a success status, so a
    /// failed request never leaves an empty file behind.
    #[tracing::instrument(skip(self, query, form, create_writer))]
    pub async fn download<W, F>(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        form: &[(String, String)],
        create_writer: F,
    ) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading {} {}...", method, url);

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if !form.is_empty() {
            request = request.form(form);
        }
        let mut response = send(url, request).await?;

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| network_error(url, e))?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}

async fn send(url: &str, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(|e| network_error(url, e))?;
    response
        .error_for_status()
        .map_err(|e| network_error(url, e))
}

fn network_error(url: &str, err: impl std::fmt::Display) -> anyhow::Error {
    Error::Network(format!("{}: {}", url, err)).into()
}
