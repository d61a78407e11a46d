//! XML namespace handling
//!
//! This module provides qualified names (which double as declaration keys),
//! immutable namespace-binding snapshots and the per-document binding stack.

use crate::error::{Error, Result};
use crate::names::split_qname;
use std::fmt;
use std::sync::Arc;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// The namespace bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The XML Schema (XSD 1.0) namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Qualified name (QName) - combination of namespace and local name
///
/// A QName is also the key of a declaration: `(namespace | absent, localName)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for the absent namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

/// Key of a global declaration within one symbol space
pub type DeclarationKey = QName;

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Same namespace, different local name
    pub fn with_local_name(&self, local_name: impl Into<String>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// A QName value as written in a document, with the prefix it was written with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedQName {
    /// Prefix used in the lexical form (None when unprefixed)
    pub prefix: Option<Prefix>,
    /// Expanded name
    pub qname: QName,
}

impl ResolvedQName {
    /// Lexical form with a different local name and the same prefix
    pub fn relabel(&self, local_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, local_name),
            None => local_name.to_string(),
        }
    }

    /// Lexical form (`prefix:local` or `local`)
    pub fn raw_name(&self) -> String {
        self.relabel(&self.qname.local_name)
    }
}

/// Immutable snapshot of the namespace bindings in scope at one element
///
/// Snapshots are cheap to clone; declaring a prefix produces a new snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceContext {
    /// Bindings in declaration order; later entries shadow earlier ones.
    /// An empty prefix is the default namespace; `None` undeclares it.
    bindings: Arc<Vec<(Prefix, Option<NamespaceUri>)>>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a context extended with `declarations`
    pub fn extend<I>(&self, declarations: I) -> Self
    where
        I: IntoIterator<Item = (Prefix, Option<NamespaceUri>)>,
    {
        let mut declarations = declarations.into_iter().peekable();
        if declarations.peek().is_none() {
            return self.clone();
        }
        let mut bindings = (*self.bindings).clone();
        bindings.extend(declarations);
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// Return a context with one more binding
    pub fn declare(&self, prefix: impl Into<String>, namespace: Option<impl Into<String>>) -> Self {
        self.extend(std::iter::once((prefix.into(), namespace.map(|n| n.into()))))
    }

    /// Get the namespace for a prefix (empty prefix = default namespace)
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .and_then(|(_, ns)| ns.as_deref())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.get_namespace("")
    }

    /// Number of bindings recorded (including shadowed ones)
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no binding has been declared
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve a lexical QName to an expanded name
    ///
    /// An unprefixed name takes the default namespace, if one is bound.
    pub fn resolve(&self, prefixed_name: &str) -> Result<ResolvedQName> {
        match split_qname(prefixed_name) {
            (Some(prefix), local) => {
                let namespace = self
                    .get_namespace(prefix)
                    .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
                Ok(ResolvedQName {
                    prefix: Some(prefix.to_string()),
                    qname: QName::namespaced(namespace, local),
                })
            }
            (None, local) => Ok(ResolvedQName {
                prefix: None,
                qname: QName::new(self.get_default_namespace(), local),
            }),
        }
    }
}

/// Stack of namespace contexts active while walking one schema document
#[derive(Debug, Clone, Default)]
pub struct NamespaceSupport {
    stack: Vec<NamespaceContext>,
}

impl NamespaceSupport {
    /// Create a stack whose base context is `root`
    pub fn new(root: NamespaceContext) -> Self {
        Self { stack: vec![root] }
    }

    /// Make `context` the active one
    pub fn push_context(&mut self, context: NamespaceContext) {
        self.stack.push(context);
    }

    /// Drop the active context; the base context is never popped
    pub fn pop_context(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// The active context
    pub fn current(&self) -> NamespaceContext {
        self.stack.last().cloned().unwrap_or_default()
    }

    /// Current nesting depth (1 = base context only)
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resolve a lexical QName in the active context
    pub fn resolve(&self, prefixed_name: &str) -> Result<ResolvedQName> {
        match self.stack.last() {
            Some(ctx) => ctx.resolve(prefixed_name),
            None => NamespaceContext::new().resolve(prefixed_name),
        }
    }
}
