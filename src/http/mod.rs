//! HTTP client module used by program profiles and the artifact downloader.

mod client;

pub use client::{DEFAULT_TIMEOUT, HttpClient};
