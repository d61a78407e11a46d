//! Error types for xmlschema-assembly
//!
//! These errors describe infrastructure failures (reading a resource,
//! parsing XML, resolving a URL). Schema constraint violations are not
//! errors in this sense: they are reported as [`Diagnostic`]s and the
//! assembly continues.
//!
//! [`Diagnostic`]: crate::diagnostics::Diagnostic

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for infrastructure operations
#[derive(Error, Debug)]
pub enum Error {
    /// A schema document could not be turned into a schema tree
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Access to a resource was refused by configuration
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration could not be read
    #[error("config error: {0}")]
    Config(String),
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        let pos = err.pos();
        Error::Parse(ParseError::new(err.to_string()).with_location(format!("{}:{}", pos.row, pos.col)))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Schema document parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file
    pub location: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Qualify the location with the document it was found in
    pub fn in_document(mut self, system_id: &str) -> Self {
        self.location = Some(match self.location.take() {
            Some(pos) => format!("{system_id}:{pos}"),
            None => system_id.to_string(),
        });
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("root element is not <schema>")
            .with_location("1:1")
            .in_document("schema.xsd");

        let msg = format!("{}", err);
        assert!(msg.contains("root element is not <schema>"));
        assert!(msg.contains("Location: schema.xsd:1:1"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ParseError::new("test").into();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_xml_error_conversion() {
        let xml_err = roxmltree::Document::parse("<a>").unwrap_err();
        let err: Error = xml_err.into();
        match err {
            Error::Parse(parse) => assert!(parse.location.is_some()),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
