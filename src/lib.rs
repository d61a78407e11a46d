//! # xmlschema-assembly
//!
//! The assembly and symbol-resolution front end of an XML Schema (XSD 1.0)
//! compiler.
//!
//! Given a root schema document, the crate loads every document reachable
//! through `<include>`, `<import>` and `<redefine>`, checks the attributes of
//! every schema element, records all global declarations per symbol space,
//! applies redefinitions, and resolves cross-references (including forward
//! and circular ones) into one [`Grammar`] per target namespace.
//!
//! ## Features
//!
//! - Table-driven attribute checking with defaults and occurrence clamping
//! - Document deduplication, chameleon includes, namespace checks per context
//! - Duplicate detection and `<redefine>` renaming
//! - On-demand resolution with circularity diagnostics
//! - Deferred local elements and keyrefs
//! - Diagnostics instead of early aborts
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_assembly::{SchemaHandler, SymbolSpace};
//!
//! let mut handler = SchemaHandler::new();
//! handler.loader_mut().register(
//!     "memory:/po.xsd",
//!     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!          <xs:element name="order" type="Order"/>
//!          <xs:complexType name="Order">
//!            <xs:sequence><xs:element name="item" maxOccurs="unbounded"/></xs:sequence>
//!          </xs:complexType>
//!        </xs:schema>"#,
//! );
//!
//! handler.parse_schema("memory:/po.xsd");
//! let grammar = handler.grammar(None).unwrap();
//! assert_eq!(grammar.len(SymbolSpace::Type), 1);
//! assert!(handler.diagnostics().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod diagnostics;
pub mod ids;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;
pub mod documents;

// Assembly passes
pub mod assembly;

// Re-exports for convenience
pub use assembly::{
    ComponentTraverser, ContextKind, Grammar, GrammarBucket, ParsedSchema, SchemaHandler, SchemaOptions,
    StructuralTraverser, SymbolSpace,
};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, Severity, SourceLocation};
pub use error::{Error, Result};
pub use limits::Limits;
pub use namespaces::{QName, XSD_NAMESPACE};

/// Version of the xmlschema-assembly library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML namespace
pub const XML_NAMESPACE: &str = namespaces::XML_NAMESPACE;

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(XSD_NAMESPACE, "http://www.w3.org/2001/XMLSchema");
        assert_eq!(XML_NAMESPACE, "http://www.w3.org/XML/1998/namespace");
    }
}
