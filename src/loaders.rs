//! Resource loading utilities
//!
//! This module fetches schema documents for the document resolver. Besides
//! the file system, a loader can serve documents registered in memory under
//! a system identifier, which is how embedders hand over schema sets that
//! do not live on disk.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::collections::HashMap;
use std::fs;

/// Resource loader for schema documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
    /// Whether to allow remote resources
    allow_remote: bool,
    /// Documents served from memory, keyed by system id
    documents: HashMap<String, String>,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            allow_remote: false,
            documents: HashMap::new(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set whether to allow remote resources
    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    /// Register an in-memory document under `system_id`
    pub fn with_document(mut self, system_id: impl Into<String>, content: impl Into<String>) -> Self {
        self.register(system_id, content);
        self
    }

    /// Register an in-memory document under `system_id`
    pub fn register(&mut self, system_id: impl Into<String>, content: impl Into<String>) {
        self.documents.insert(system_id.into(), content.into());
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        if let Some(content) = self.documents.get(&location.system_id()) {
            self.limits.check_xml_size(content.len())?;
            return Ok(content.clone());
        }

        match location {
            Location::Path(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                self.limits.check_xml_size(content.len())?;

                Ok(content)
            }
            Location::Url(url) => {
                if location.is_remote() && !self.allow_remote {
                    return Err(Error::AccessDenied(format!(
                        "remote resource '{}' is not allowed",
                        url
                    )));
                }
                Err(Error::Resource(format!("no document registered for '{}'", url)))
            }
            Location::String(s) => Err(Error::Resource(format!(
                "no document registered for '{}'",
                s
            ))),
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<root>test</root>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new();
        let content = loader.load(&location).unwrap();

        assert!(content.contains("<root>test</root>"));
    }

    #[test]
    fn test_load_registered_document() {
        let loader = Loader::new().with_document("memory:/a.xsd", "<schema/>");
        let location: Location = "memory:/a.xsd".parse().unwrap();
        assert_eq!(loader.load(&location).unwrap(), "<schema/>");

        let missing: Location = "memory:/b.xsd".parse().unwrap();
        assert!(matches!(loader.load(&missing), Err(Error::Resource(_))));
    }

    #[test]
    fn test_remote_denied() {
        let loader = Loader::new();
        let location: Location = "http://example.com/a.xsd".parse().unwrap();
        assert!(matches!(loader.load(&location), Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new().with_limits(Limits::strict());
        let result = loader.load(&location);

        // Strict limits (10 MB max) should reject 11MB file
        assert!(result.is_err());
    }
}
