use crate::error::Error;
use anyhow::Result;
use reqwest::Method;
use std::path::PathBuf;

/// A single file a program needs fetched before it can be unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub destination: PathBuf,
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    /// A failed fetch of a tolerant artifact is skipped instead of failing the program.
    pub tolerant: bool,
}

impl Artifact {
    pub fn get(destination: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            tolerant: false,
        }
    }

    pub fn post(destination: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(destination, url)
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn form(mut self, key: &str, value: &str) -> Self {
        self.form.push((key.to_string(), value.to_string()));
        self
    }

    pub fn tolerant(mut self) -> Self {
        self.tolerant = true;
        self
    }

    /// Reject descriptors the fetch step cannot act on.
    pub fn validate(&self, program: &str) -> Result<()> {
        if !self.destination.is_absolute() {
            return Err(Error::contract(
                program,
                format!(
                    "artifact destination {} is not absolute",
                    self.destination.display()
                ),
            )
            .into());
        }
        if self.method != Method::GET && self.method != Method::POST {
            return Err(Error::contract(
                program,
                format!("unsupported method {} for {}", self.method, self.url),
            )
            .into());
        }
        if let Err(e) = reqwest::Url::parse(&self.url) {
            return Err(
                Error::contract(program, format!("invalid url {:?}: {}", self.url, e)).into(),
            );
        }
        Ok(())
    }
}
