//! Resource location resolution
//!
//! This module resolves `schemaLocation` hints against the location of the
//! referencing document and produces the expanded system identifiers used
//! to recognise a document that was already loaded.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, file, or any registered in-memory scheme)
    Url(Url),
    /// Opaque identifier that cannot serve as a base for relative hints
    String(String),
}

impl FromStr for Location {
    type Err = Error;

    /// Create a location from a string (auto-detect type)
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(s) {
            // A single-letter scheme is a Windows drive, not a URL
            if url.scheme().len() > 1 {
                if url.scheme() == "file" {
                    if let Ok(path) = url.to_file_path() {
                        return Ok(Location::Path(path));
                    }
                }
                return Ok(Location::Url(url));
            }
        }

        let path = PathBuf::from(s);
        if path.exists() || s.starts_with('/') || s.starts_with('.') || s.contains(&['/', '\\'][..]) {
            return Ok(Location::Path(normalize_path(&path)));
        }

        Ok(Location::String(s.to_string()))
    }
}

impl Location {
    /// Resolve `hint` relative to `base`
    ///
    /// Absolute hints ignore the base. A relative hint with no usable base
    /// resolves against the current directory.
    pub fn resolve(base: Option<&Location>, hint: &str) -> Result<Location> {
        if let Ok(url) = Url::parse(hint) {
            if url.scheme().len() > 1 {
                return Location::from_str(hint);
            }
        }

        match base {
            Some(Location::Url(base_url)) => {
                let joined = base_url.join(hint)?;
                Ok(Location::Url(joined))
            }
            Some(Location::Path(base_path)) => {
                let hint_path = Path::new(hint);
                if hint_path.is_absolute() {
                    return Ok(Location::Path(normalize_path(hint_path)));
                }
                let dir = base_path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(normalize_path(&dir.join(hint_path))))
            }
            Some(Location::String(_)) | None => Location::from_str(hint),
        }
    }

    /// The expanded system identifier for this location
    pub fn system_id(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (network URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(u) if matches!(u.scheme(), "http" | "https" | "ftp"))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.system_id())
    }
}

/// Remove `.` and resolvable `..` components without touching the file system
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match normalized.components().next_back() {
                    Some(Component::Normal(_)) => normalized.pop(),
                    _ => false,
                };
                if !popped {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc: Location = "http://example.com/schema.xsd".parse().unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
    }

    #[test]
    fn test_location_from_path() {
        let loc: Location = "/tmp/schema.xsd".parse().unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(!loc.is_remote());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = Location::Path(PathBuf::from("/schemas/main/root.xsd"));
        let loc = Location::resolve(Some(&base), "../common/./types.xsd").unwrap();
        assert_eq!(loc, Location::Path(PathBuf::from("/schemas/common/types.xsd")));
    }

    #[test]
    fn test_resolve_relative_url() {
        let base: Location = "memory:/set/main.xsd".parse().unwrap();
        let loc = Location::resolve(Some(&base), "types.xsd").unwrap();
        assert_eq!(loc.system_id(), "memory:/set/types.xsd");
        assert!(!loc.is_remote());
    }

    #[test]
    fn test_resolve_absolute_hint_ignores_base() {
        let base = Location::Path(PathBuf::from("/schemas/root.xsd"));
        let loc = Location::resolve(Some(&base), "http://example.com/x.xsd").unwrap();
        assert_eq!(loc.system_id(), "http://example.com/x.xsd");
    }
}
