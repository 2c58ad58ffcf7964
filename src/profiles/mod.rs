//! Catalogue of installable programs.
//!
//! Every program appman knows about is listed here. The list is validated by
//! [`crate::registry::Registry::new`] at startup.

mod selenium_server;
mod tesseract_data;
mod webdriver_chrome;
mod webdriver_firefox;

pub use selenium_server::SeleniumServer;
pub use tesseract_data::TesseractData;
pub use webdriver_chrome::WebdriverChrome;
pub use webdriver_firefox::WebdriverFirefox;

use crate::registry::{MetaDescriptor, ProgramDescriptor};

/// All program and meta descriptors compiled into appman.
pub fn catalogue() -> (Vec<ProgramDescriptor>, Vec<MetaDescriptor>) {
    let programs = vec![
        ProgramDescriptor::new("webdriver-firefox", || Box::new(WebdriverFirefox::default()))
            .portable()
            .updatable(),
        ProgramDescriptor::new("webdriver-chrome", || Box::new(WebdriverChrome::default()))
            .portable()
            .updatable()
            .x64_only(),
        ProgramDescriptor::new("tesseract-data", || Box::new(TesseractData::default()))
            .portable()
            .updatable(),
        ProgramDescriptor::new("selenium-server", || Box::new(SeleniumServer::default()))
            .depends_on("webdriver-firefox")
            .portable()
            .updatable(),
    ];
    let metas = vec![MetaDescriptor::new(
        "webdrivers",
        &["webdriver-chrome", "webdriver-firefox"],
    )];
    (programs, metas)
}

/// Last path segment of a URL, after stripping `prefix` from it.
fn version_from_url(url: &str, prefix: &str) -> Option<String> {
    let tail = url.trim_end_matches('/').rsplit('/').next()?;
    let version = tail.strip_prefix(prefix).unwrap_or(tail).trim();
    (!version.is_empty()).then(|| version.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_catalogue_is_valid() {
        let (programs, metas) = catalogue();
        let registry = Registry::new(programs, metas).unwrap();

        assert_eq!(
            registry.list_programs(),
            vec![
                "selenium-server",
                "tesseract-data",
                "webdriver-chrome",
                "webdriver-firefox"
            ]
        );
        assert_eq!(
            registry.expand_meta("webdrivers"),
            Some(vec![
                "webdriver-chrome".to_string(),
                "webdriver-firefox".to_string()
            ])
        );
        assert!(
            registry
                .lookup_program("selenium-server")
                .unwrap()
                .dependencies
                .contains("webdriver-firefox")
        );
    }

    #[test]
    fn test_version_from_url() {
        assert_eq!(
            version_from_url(
                "https://github.com/mozilla/geckodriver/releases/tag/v0.35.0",
                "v"
            ),
            Some("0.35.0".to_string())
        );
        assert_eq!(
            version_from_url("https://github.com/x/y/releases/tag/4.1.0/", ""),
            Some("4.1.0".to_string())
        );
        assert_eq!(version_from_url("https://github.com/x/y/releases/tag/v", "v"), None);
    }
}
