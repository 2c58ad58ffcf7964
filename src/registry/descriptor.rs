use crate::profile::Program;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> Box<dyn Program> + Send + Sync>;

/// Static description of an installable program.
#[derive(Clone)]
pub struct ProgramDescriptor {
    pub name: String,
    pub dependencies: BTreeSet<String>,
    /// The whole program lives in its install directory, which remove deletes.
    pub portable: bool,
    pub can_update: bool,
    pub x64_only: bool,
    factory: Factory,
}

impl ProgramDescriptor {
    pub fn new<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Program> + Send + Sync + 'static,
    {
        Self {
            name: name.to_lowercase(),
            dependencies: BTreeSet::new(),
            portable: false,
            can_update: false,
            x64_only: false,
            factory: Arc::new(factory),
        }
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.dependencies.insert(name.to_lowercase());
        self
    }

    pub fn portable(mut self) -> Self {
        self.portable = true;
        self
    }

    pub fn updatable(mut self) -> Self {
        self.can_update = true;
        self
    }

    pub fn x64_only(mut self) -> Self {
        self.x64_only = true;
        self
    }

    /// Build a fresh capability implementation for one action.
    pub fn instantiate(&self) -> Box<dyn Program> {
        (self.factory)()
    }
}

impl fmt::Debug for ProgramDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("portable", &self.portable)
            .field("can_update", &self.can_update)
            .field("x64_only", &self.x64_only)
            .finish_non_exhaustive()
    }
}

/// An alias that expands to a group of programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDescriptor {
    pub name: String,
    pub members: BTreeSet<String>,
}

impl MetaDescriptor {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_lowercase(),
            members: members.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MockProgram;

    #[test]
    fn test_builder_normalizes_names() {
        let d = ProgramDescriptor::new("Selenium-Server", || Box::new(MockProgram::new()))
            .depends_on("WebDriver-Firefox")
            .portable()
            .updatable();

        assert_eq!(d.name, "selenium-server");
        assert!(d.dependencies.contains("webdriver-firefox"));
        assert!(d.portable);
        assert!(d.can_update);
        assert!(!d.x64_only);
    }

    #[test]
    fn test_debug_omits_factory() {
        let d = ProgramDescriptor::new("a", || Box::new(MockProgram::new())).x64_only();
        let s = format!("{:?}", d);
        assert!(s.contains("x64_only: true"));
        assert!(s.ends_with(".. }"));
    }

    #[test]
    fn test_meta_members_deduplicated() {
        let m = MetaDescriptor::new("WebDrivers", &["b", "A", "a"]);
        assert_eq!(m.name, "webdrivers");
        assert_eq!(m.members.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
