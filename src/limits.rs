//! Limits and constraints for schema assembly
//!
//! This module defines the resource ceilings applied while loading and
//! compiling schema documents, including the secure-processing ceiling on
//! `maxOccurs`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum schema document size in bytes
    pub max_xml_size: usize,

    /// Ceiling on `maxOccurs` values (`None` disables the check)
    pub max_occurs: Option<u32>,

    /// Maximum number of attributes per schema element
    pub max_attributes: usize,

    /// Maximum number of schema documents in one session
    pub max_documents: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_occurs: None,
            max_attributes: 1000,
            max_documents: 10000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (secure processing)
    pub fn strict() -> Self {
        Self {
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_occurs: Some(5000),
            max_attributes: 100,
            max_documents: 1000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_occurs: None,
            max_attributes: 10000,
            max_documents: 100000,
        }
    }

    /// Set the `maxOccurs` ceiling
    pub fn with_max_occurs(mut self, limit: Option<u32>) -> Self {
        self.max_occurs = limit;
        self
    }

    /// Check if a document size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of attributes is within limits
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        if count > self.max_attributes {
            Err(Error::LimitExceeded(format!(
                "Attribute count {} exceeds maximum {}",
                count, self.max_attributes
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of loaded documents is within limits
    pub fn check_documents(&self, count: usize) -> Result<()> {
        if count > self.max_documents {
            Err(Error::LimitExceeded(format!(
                "Schema document count {} exceeds maximum {}",
                count, self.max_documents
            )))
        } else {
            Ok(())
        }
    }

    /// The `maxOccurs` ceiling that applies to `value`, if `value` exceeds it
    pub fn max_occurs_exceeded(&self, value: u32) -> Option<u32> {
        match self.max_occurs {
            Some(limit) if value > limit => Some(limit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_occurs, None);
        assert!(limits.check_xml_size(1024).is_ok());
        assert!(limits.check_xml_size(200 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert_eq!(limits.max_occurs, Some(5000));
        assert!(limits.check_attributes(150).is_err());
        assert_eq!(limits.max_occurs_exceeded(5001), Some(5000));
        assert_eq!(limits.max_occurs_exceeded(5000), None);
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_xml_size > Limits::default().max_xml_size);
        assert_eq!(limits.max_occurs_exceeded(u32::MAX), None);
    }

    #[test]
    fn test_limits_from_json() {
        let limits: Limits = serde_json::from_str(r#"{"max_occurs": 10}"#).unwrap();
        assert_eq!(limits.max_occurs, Some(10));
        assert_eq!(limits.max_attributes, Limits::default().max_attributes);
    }
}
