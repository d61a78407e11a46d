//! Schema diagnostics
//!
//! Constraint violations found while assembling a schema set never abort the
//! session. They are reported to a [`DiagnosticSink`] as a code plus
//! arguments; turning them into messages is left to the consumer.

use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-conformant but tolerable
    Warning,
    /// A named schema constraint is violated; processing recovers
    Error,
    /// The current construct cannot be completed
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// Where a diagnostic was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// System id of the schema document, if known
    pub system_id: Option<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.system_id.as_deref().unwrap_or("<unknown>"),
            self.line,
            self.column
        )
    }
}

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Constraint or message code (e.g. `src-resolve`)
    pub code: String,
    /// Message arguments
    pub args: Vec<String>,
    /// Offending element, if any
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Create a diagnostic without a location
    pub fn new(severity: Severity, code: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            args,
            location: None,
        }
    }

    /// Attach a location
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Whether this is an error or fatal error
    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args.join(", "))?;
        }
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink {
    /// Accept one diagnostic
    fn report(&mut self, diagnostic: Diagnostic);
}

/// In-memory diagnostic collector
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics in report order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Errors and fatal errors
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    /// Warnings
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Whether any error or fatal error was reported
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Codes in report order
    pub fn codes(&self) -> Vec<&str> {
        self.items.iter().map(|d| d.code.as_str()).collect()
    }

    /// Number of diagnostics carrying `code`
    pub fn count(&self, code: &str) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Forget everything reported so far
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!(code = %diagnostic.code, "{}", diagnostic),
            Severity::Error | Severity::Fatal => error!(code = %diagnostic.code, "{}", diagnostic),
        }
        self.items.push(diagnostic);
    }
}
