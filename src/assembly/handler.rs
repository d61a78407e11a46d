//! The schema assembly session
//!
//! [`SchemaHandler`] owns everything one assembly session touches: loaded
//! documents, the dependency graph, the unparsed registries, the deferred
//! queue, the grammars and the component arena. Its passes are spread over
//! the sibling modules:
//!
//! - [`resolver`](super::resolver): loading documents and building the
//!   dependency graph
//! - [`registry`](super::registry): global registries, duplicate detection,
//!   redefinition renaming and on-demand resolution
//! - [`deferred`](super::deferred): traversal of global declarations and the
//!   deferred local element and keyref queues
//!
//! # Example
//!
//! ```
//! use xmlschema_assembly::{SchemaHandler, SymbolSpace};
//!
//! let mut handler = SchemaHandler::new();
//! handler.loader_mut().register(
//!     "memory:/a.xsd",
//!     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
//!                   targetNamespace="urn:a">
//!          <xs:element name="root" type="xs:string"/>
//!        </xs:schema>"#,
//! );
//!
//! let parsed = handler.parse_schema("memory:/a.xsd").unwrap();
//! assert_eq!(parsed.target_namespace.as_deref(), Some("urn:a"));
//!
//! let grammar = handler.grammars().get(Some("urn:a")).unwrap();
//! assert!(grammar.get(SymbolSpace::Element, "root").is_some());
//! assert!(!handler.diagnostics().has_errors());
//! ```

use super::attribute_checker::AttributeChecker;
use super::attribute_table::AttributeTable;
use super::builtins::Builtins;
use super::components::{ComponentArena, SymbolSpace};
use super::deferred::DeferredQueue;
use super::grammar::{Grammar, GrammarBucket};
use super::record_pool::PooledRecord;
use super::registry::Registries;
use super::resolver::{expand_location, DependencyGraph, DocumentKey, DocumentRequest, Opened};
use super::traversers::{ComponentTraverser, StructuralTraverser};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, Severity, SourceLocation};
use crate::documents::{ElementRef, SchemaDocument};
use crate::error::{Error, Result};
use crate::ids::{ComponentId, DocumentId};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::namespaces::NamespaceUri;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

/// Session policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Load the location of every `<import>`, even for a namespace that is
    /// already known
    pub honour_all_schema_locations: bool,
    /// Allow a namespace that already has a grammar to be extended
    pub namespace_growth: bool,
    /// Accept duplicate global declarations from different documents
    pub tolerate_duplicates: bool,
    /// Allow remote schema locations
    pub allow_remote: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            honour_all_schema_locations: false,
            namespace_growth: false,
            tolerate_duplicates: false,
            allow_remote: false,
            limits: Limits::default(),
        }
    }
}

impl SchemaOptions {
    /// Read options from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Why a schema document is being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// `<include>`
    Include,
    /// `<redefine>`
    Redefine,
    /// `<import>`
    Import,
    /// Top-level schema handed to [`SchemaHandler::parse_schema`]
    Preparse,
    /// Schema located through an instance document hint
    Instance,
}

impl ContextKind {
    /// Code reported when the loaded document's target namespace does not
    /// match the expected one
    ///
    /// `expected_present` tells whether the reference expected a namespace.
    pub fn namespace_mismatch_code(self, expected_present: bool) -> &'static str {
        match (self, expected_present) {
            (ContextKind::Include, _) => "src-include.2.1",
            (ContextKind::Redefine, _) => "src-redefine.3.1",
            (ContextKind::Import, true) => "src-import.3.1",
            (ContextKind::Import, false) => "src-import.3.2",
            (ContextKind::Preparse | ContextKind::Instance, true) => "TargetNamespace.1",
            (ContextKind::Preparse | ContextKind::Instance, false) => "TargetNamespace.2",
        }
    }

    /// Code reported when the loaded document is not rooted at `<schema>`
    pub fn root_error_code(self) -> &'static str {
        match self {
            ContextKind::Include => "src-include.1",
            ContextKind::Redefine => "src-redefine.2",
            ContextKind::Import => "src-import.2",
            ContextKind::Preparse | ContextKind::Instance => "schema_reference.4",
        }
    }

    /// Whether the document joins the caller's grammar
    pub fn is_inclusion(self) -> bool {
        matches!(self, ContextKind::Include | ContextKind::Redefine)
    }
}

/// Result of a top-level parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSchema {
    /// Target namespace of the grammar the schema went into
    pub target_namespace: Option<NamespaceUri>,
    /// Root document, or `None` when an existing grammar was reused as is
    #[serde(skip)]
    pub root: Option<DocumentId>,
}

/// One schema assembly session
///
/// A handler is single-threaded. Between independent parses it resets its
/// per-session state itself; grammars and components persist until
/// [`SchemaHandler::clear_grammars`].
pub struct SchemaHandler {
    pub(crate) options: SchemaOptions,
    pub(crate) loader: Loader,
    pub(crate) checker: AttributeChecker,
    pub(crate) documents: Vec<SchemaDocument>,
    pub(crate) document_cache: HashMap<DocumentKey, Option<DocumentId>>,
    pub(crate) dependencies: DependencyGraph,
    pub(crate) redefined_documents: HashMap<ElementRef, DocumentId>,
    pub(crate) registries: Registries,
    pub(crate) deferred: DeferredQueue,
    pub(crate) defer_local_elements: bool,
    pub(crate) grammars: GrammarBucket,
    pub(crate) components: ComponentArena,
    pub(crate) builtins: Builtins,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) import_map: IndexMap<Option<NamespaceUri>, Vec<Option<NamespaceUri>>>,
    pub(crate) missing_grammars: Vec<Option<NamespaceUri>>,
    pub(crate) traverser: Rc<dyn ComponentTraverser>,
}

impl std::fmt::Debug for SchemaHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaHandler")
            .field("options", &self.options)
            .field("documents", &self.documents.len())
            .field("grammars", &self.grammars.len())
            .field("components", &self.components.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl Default for SchemaHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaHandler {
    /// Handler with default options
    pub fn new() -> Self {
        Self::with_options(SchemaOptions::default())
    }

    /// Handler with the given options and a fresh descriptor table
    pub fn with_options(options: SchemaOptions) -> Self {
        Self::with_table(options, Arc::new(AttributeTable::new()))
    }

    /// Handler sharing an existing descriptor table
    pub fn with_table(options: SchemaOptions, table: Arc<AttributeTable>) -> Self {
        let loader = Loader::new()
            .with_limits(options.limits.clone())
            .with_allow_remote(options.allow_remote);
        let checker = AttributeChecker::new(table, &options.limits);
        let mut components = ComponentArena::new();
        let builtins = Builtins::install(&mut components);
        Self {
            options,
            loader,
            checker,
            documents: Vec::new(),
            document_cache: HashMap::new(),
            dependencies: DependencyGraph::new(),
            redefined_documents: HashMap::new(),
            registries: Registries::default(),
            deferred: DeferredQueue::new(),
            defer_local_elements: true,
            grammars: GrammarBucket::new(),
            components,
            builtins,
            diagnostics: Diagnostics::new(),
            import_map: IndexMap::new(),
            missing_grammars: Vec::new(),
            traverser: Rc::new(StructuralTraverser),
        }
    }

    /// Replace the construct traverser
    pub fn with_traverser(mut self, traverser: impl ComponentTraverser + 'static) -> Self {
        self.traverser = Rc::new(traverser);
        self
    }

    /// Session options
    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// The document loader, e.g. to register in-memory documents
    pub fn loader_mut(&mut self) -> &mut Loader {
        &mut self.loader
    }

    /// The attribute checker
    pub fn checker(&self) -> &AttributeChecker {
        &self.checker
    }

    /// Assemble the schema at `location` and everything it references
    ///
    /// The root's target namespace is taken from the document. Returns
    /// `None` when the root document could not be used; the reason is in
    /// [`SchemaHandler::diagnostics`].
    pub fn parse_schema(&mut self, location: &str) -> Option<ParsedSchema> {
        self.parse_schema_in_context(location, None, ContextKind::Preparse)
    }

    /// Assemble a schema expected to have `expected_namespace`
    pub fn parse_schema_in_context(
        &mut self,
        location: &str,
        expected_namespace: Option<&str>,
        context: ContextKind,
    ) -> Option<ParsedSchema> {
        if context != ContextKind::Preparse {
            if let Some(grammar) = self.grammars.get(expected_namespace) {
                let known = expand_location(None, location)
                    .is_some_and(|system_id| grammar.has_document_location(&system_id));
                if !self.options.namespace_growth || known {
                    debug!(location, namespace = ?expected_namespace, "grammar reused");
                    return Some(ParsedSchema {
                        target_namespace: expected_namespace.map(str::to_string),
                        root: None,
                    });
                }
            }
        }

        self.prepare_for_parse();

        let request = DocumentRequest {
            hint: location,
            base: None,
            expected_namespace,
            context,
            must_resolve: true,
            referrer: None,
        };
        let root = match self.open_document(request) {
            Opened::New(root) => root,
            Opened::Reused(target_namespace) => {
                debug!(location, namespace = ?target_namespace, "grammar reused");
                return Some(ParsedSchema {
                    target_namespace,
                    root: None,
                });
            }
            Opened::Cached(_) | Opened::Failed => return None,
        };

        self.construct_trees(root);
        self.build_registries(root);
        self.traverse_schemas(root);
        self.traverse_local_elements();
        self.resolve_keyrefs();
        self.wire_imports();

        let target_namespace = self.document(root).and_then(|d| d.target_namespace()).map(str::to_string);
        info!(
            location,
            documents = self.documents.len(),
            grammars = self.grammars.len(),
            errors = self.diagnostics.errors().count(),
            "schema assembled"
        );
        Some(ParsedSchema {
            target_namespace,
            root: Some(root),
        })
    }

    fn prepare_for_parse(&mut self) {
        self.documents.clear();
        self.document_cache.clear();
        self.dependencies.clear();
        self.redefined_documents.clear();
        self.registries.clear();
        self.deferred.clear();
        self.defer_local_elements = true;
        self.import_map.clear();
        self.missing_grammars.clear();
    }

    /// Forget per-session state and diagnostics; grammars are kept
    pub fn reset(&mut self) {
        self.prepare_for_parse();
        self.diagnostics.clear();
    }

    /// Drop every grammar and component
    pub fn clear_grammars(&mut self) {
        self.grammars.clear();
        self.components.clear();
        self.builtins = Builtins::install(&mut self.components);
    }

    /// Mark every grammar immutable and return shared handles to them
    pub fn publish(&mut self) -> Vec<Arc<Grammar>> {
        self.grammars.publish()
    }

    /// Grammars built so far
    pub fn grammars(&self) -> &GrammarBucket {
        &self.grammars
    }

    /// Grammar of one namespace
    pub fn grammar(&self, namespace: Option<&str>) -> Option<&Grammar> {
        self.grammars.get(namespace).map(|g| g.as_ref())
    }

    /// Components built so far
    pub fn components(&self) -> &ComponentArena {
        &self.components
    }

    /// Mutable component arena, for traversers
    pub fn components_mut(&mut self) -> &mut ComponentArena {
        &mut self.components
    }

    /// Built-in type definitions
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Diagnostics reported so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Documents loaded in the current session
    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    /// A loaded document
    pub fn document(&self, id: DocumentId) -> Option<&SchemaDocument> {
        self.documents.get(id.to_index())
    }

    pub(crate) fn document_mut(&mut self, id: DocumentId) -> Option<&mut SchemaDocument> {
        self.documents.get_mut(id.to_index())
    }

    /// Effective target namespace of a loaded document
    pub fn target_namespace(&self, id: DocumentId) -> Option<NamespaceUri> {
        self.document(id)
            .and_then(|d| d.target_namespace())
            .map(str::to_string)
    }

    /// Local name of an element
    pub fn local_name(&self, element: ElementRef) -> &str {
        self.document(element.document)
            .map(|d| d.tree.local_name(element.node))
            .unwrap_or("")
    }

    /// Child elements of an element
    pub fn children(&self, element: ElementRef) -> Vec<ElementRef> {
        self.document(element.document)
            .map(|d| d.tree.children(element.node).map(|c| d.element(c)).collect())
            .unwrap_or_default()
    }

    /// Child elements of an element other than `<annotation>`
    pub fn content_children(&self, element: ElementRef) -> Vec<ElementRef> {
        self.children(element)
            .into_iter()
            .filter(|c| self.local_name(*c) != "annotation")
            .collect()
    }

    /// Parent element
    pub fn parent(&self, element: ElementRef) -> Option<ElementRef> {
        let doc = self.document(element.document)?;
        doc.tree.parent(element.node).map(|p| doc.element(p))
    }

    /// Raw value of an unqualified attribute
    pub fn attribute(&self, element: ElementRef, local_name: &str) -> Option<&str> {
        self.document(element.document)?
            .tree
            .attribute(element.node, local_name)
    }

    /// Rewrite an unqualified attribute in place
    pub(crate) fn set_attribute(&mut self, element: ElementRef, local_name: &str, value: impl Into<String>) {
        if let Some(doc) = self.document_mut(element.document) {
            doc.tree.set_attribute(element.node, local_name, value);
        }
    }

    /// Diagnostic location of an element
    pub fn source_location(&self, element: ElementRef) -> Option<SourceLocation> {
        self.document(element.document)
            .map(|d| d.source_location(element.node))
    }

    /// Check the attributes of a schema element
    ///
    /// `is_global` is true for children of `<schema>` and `<redefine>`.
    /// Returns `None` for elements that are not schema constructs.
    pub fn check_attributes(&mut self, element: ElementRef, is_global: bool) -> Option<PooledRecord> {
        let doc = self.documents.get_mut(element.document.to_index())?;
        self.checker
            .check(doc, element.node, is_global, &mut self.diagnostics)
    }

    /// Report a constraint violation at `element`
    pub fn report_error(&mut self, code: &str, args: &[&str], element: Option<ElementRef>) {
        self.report(Severity::Error, code, args, element);
    }

    /// Report a tolerable problem at `element`
    pub fn report_warning(&mut self, code: &str, args: &[&str], element: Option<ElementRef>) {
        self.report(Severity::Warning, code, args, element);
    }

    /// Report a problem that stops construction of `element`
    pub fn report_fatal(&mut self, code: &str, args: &[&str], element: Option<ElementRef>) {
        self.report(Severity::Fatal, code, args, element);
    }

    fn report(&mut self, severity: Severity, code: &str, args: &[&str], element: Option<ElementRef>) {
        let mut diagnostic = Diagnostic::new(severity, code, args.iter().map(|a| a.to_string()).collect());
        if let Some(location) = element.and_then(|e| self.source_location(e)) {
            diagnostic = diagnostic.at(location);
        }
        self.diagnostics.report(diagnostic);
    }

    /// Add a traversed global component to the grammar of `document`
    ///
    /// Returns false when the name is already taken in that grammar.
    pub fn add_global(&mut self, space: SymbolSpace, document: DocumentId, id: ComponentId) -> bool {
        let Some(name) = self
            .components
            .get(id)
            .and_then(|c| c.name())
            .map(|n| n.local_name.clone())
        else {
            return false;
        };
        let namespace = self.target_namespace(document);
        self.grammars
            .get_or_create(namespace.as_deref())
            .add(space, name, id)
    }
}
