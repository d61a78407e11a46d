//! Document resolution and the dependency graph
//!
//! Starting from the root document, every `<include>`, `<redefine>` and
//! `<import>` is followed with an explicit worklist, so deep or cyclic
//! reference chains never grow the call stack. Each document is loaded at
//! most once per (system id, expected namespace, redefine context); a
//! repeated request returns the cached document and only adds an edge to
//! the dependency graph.

use super::attribute_table::{Attr, Form};
use super::grammar::Annotation;
use super::handler::{ContextKind, SchemaHandler};
use crate::documents::{ElementRef, SchemaDocument, SchemaTree};
use crate::error::{Error, Result};
use crate::ids::{DocumentId, NodeId};
use crate::locations::Location;
use crate::namespaces::{NamespaceUri, XSD_NAMESPACE};
use std::collections::HashMap;
use tracing::{debug, info};

/// Identity of a loaded document for de-duplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    /// Expanded system id
    pub system_id: String,
    /// Namespace the referencing construct expected
    pub referer_namespace: Option<NamespaceUri>,
    /// Whether the document was reached through `<redefine>`
    pub redefine: bool,
}

/// Edges from each document to the documents it includes, redefines or
/// imports, in reference order
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<DocumentId, Vec<DocumentId>>,
}

impl DependencyGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `document` has an entry
    pub fn add_document(&mut self, document: DocumentId) {
        self.edges.entry(document).or_default();
    }

    /// Record that `from` depends on `to`; repeated edges are ignored
    pub fn add_edge(&mut self, from: DocumentId, to: DocumentId) {
        let targets = self.edges.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    /// Direct dependencies of a document
    pub fn dependencies(&self, document: DocumentId) -> &[DocumentId] {
        self.edges.get(&document).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of documents in the graph
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drop every document and edge
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

/// A request to load one schema document
#[derive(Debug, Clone)]
pub(crate) struct DocumentRequest<'a> {
    pub hint: &'a str,
    pub base: Option<Location>,
    pub expected_namespace: Option<&'a str>,
    pub context: ContextKind,
    pub must_resolve: bool,
    pub referrer: Option<ElementRef>,
}

/// Outcome of a load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Opened {
    /// Loaded for the first time
    New(DocumentId),
    /// Loaded earlier in this session
    Cached(DocumentId),
    /// A top-level document whose namespace already has a usable grammar
    Reused(Option<NamespaceUri>),
    /// Not usable; the reason was reported
    Failed,
}

/// Expanded system id of `hint` resolved against `base`
pub(crate) fn expand_location(base: Option<&Location>, hint: &str) -> Option<String> {
    Location::resolve(base, hint).ok().map(|l| l.system_id())
}

impl SchemaHandler {
    /// Load and validate one schema document
    pub(crate) fn open_document(&mut self, request: DocumentRequest<'_>) -> Opened {
        let DocumentRequest {
            hint,
            base,
            expected_namespace,
            context,
            must_resolve,
            referrer,
        } = request;

        let location = match Location::resolve(base.as_ref(), hint) {
            Ok(location) => location,
            Err(e) => {
                debug!(hint, error = %e, "schema location not resolvable");
                self.report_unloadable(hint, must_resolve, referrer);
                return Opened::Failed;
            }
        };
        let system_id = location.system_id();

        let key = (context != ContextKind::Preparse).then(|| DocumentKey {
            system_id: system_id.clone(),
            referer_namespace: expected_namespace.map(str::to_string),
            redefine: context == ContextKind::Redefine,
        });
        if let Some(cached) = key.as_ref().and_then(|k| self.document_cache.get(k)) {
            debug!(system_id = %system_id, ?context, "document already loaded");
            return match cached {
                Some(id) => Opened::Cached(*id),
                None => Opened::Failed,
            };
        }

        let tree = match self.load_tree(&location) {
            Ok(tree) => tree,
            Err(e) => {
                debug!(system_id = %system_id, error = %e, "schema document not loaded");
                self.report_unloadable(&system_id, must_resolve, referrer);
                return Opened::Failed;
            }
        };
        if let Some(key) = &key {
            self.document_cache.insert(key.clone(), None);
        }

        if !tree.is(tree.root(), XSD_NAMESPACE, "schema") {
            self.report_error(context.root_error_code(), &[hint], referrer);
            return Opened::Failed;
        }

        let Some(id) = DocumentId::from_index(self.documents.len()) else {
            self.report_unloadable(&system_id, must_resolve, referrer);
            return Opened::Failed;
        };

        let mut candidate = SchemaDocument::new(id, tree, Some(location), None, false);
        let root = candidate.root();
        let Some(record) = self
            .checker
            .check(&mut candidate, root, true, &mut self.diagnostics)
            .map(|r| r.into_values())
        else {
            return Opened::Failed;
        };

        let mut declared = record.str(Attr::TargetNamespace).map(str::to_string);
        if declared.as_deref() == Some("") {
            self.report_warning("EmptyTargetNamespace", &[hint], referrer);
            declared = None;
        }

        let mut chameleon = false;
        let target_namespace = match (expected_namespace, declared) {
            (Some(expected), None) if context.is_inclusion() => {
                debug!(system_id = %system_id, namespace = expected, "chameleon document");
                chameleon = true;
                Some(expected.to_string())
            }
            (Some(expected), declared) if context != ContextKind::Preparse => {
                if declared.as_deref() != Some(expected) {
                    let code = context.namespace_mismatch_code(true);
                    let found = declared.unwrap_or_default();
                    self.report_error(code, &[expected, &found], referrer);
                    return Opened::Failed;
                }
                declared
            }
            (None, Some(declared)) if context != ContextKind::Preparse => {
                let code = context.namespace_mismatch_code(false);
                self.report_error(code, &["", &declared], referrer);
                return Opened::Failed;
            }
            (_, declared) => declared,
        };

        if context == ContextKind::Preparse {
            if let Some(grammar) = self.grammars.get(target_namespace.as_deref()) {
                if !self.options.namespace_growth || grammar.has_document_location(&system_id) {
                    return Opened::Reused(target_namespace);
                }
            }
        }

        let SchemaDocument { tree, location, .. } = candidate;
        let mut document = SchemaDocument::new(id, tree, location, target_namespace.clone(), chameleon);
        document.element_form_qualified = record.form(Attr::ElementFormDefault) == Some(Form::Qualified);
        document.attribute_form_qualified = record.form(Attr::AttributeFormDefault) == Some(Form::Qualified);
        document.block_default = record.derivation_set(Attr::BlockDefault).unwrap_or(0);
        document.final_default = record.derivation_set(Attr::FinalDefault).unwrap_or(0);
        self.documents.push(document);

        self.document_cache.insert(
            key.unwrap_or(DocumentKey {
                system_id: system_id.clone(),
                referer_namespace: target_namespace.clone(),
                redefine: false,
            }),
            Some(id),
        );
        self.dependencies.add_document(id);
        self.grammars
            .get_or_create(target_namespace.as_deref())
            .add_document_location(system_id.clone());

        debug!(
            document = %id,
            system_id = %system_id,
            namespace = ?target_namespace,
            ?context,
            "schema document loaded"
        );
        Opened::New(id)
    }

    fn load_tree(&self, location: &Location) -> Result<SchemaTree> {
        self.options.limits.check_documents(self.documents.len() + 1)?;
        let text = self.loader.load(location)?;
        SchemaTree::parse_with_limits(&text, &self.options.limits).map_err(|err| match err {
            Error::Parse(parse) => Error::Parse(parse.in_document(&location.system_id())),
            other => other,
        })
    }

    fn report_unloadable(&mut self, system_id: &str, must_resolve: bool, referrer: Option<ElementRef>) {
        if must_resolve {
            self.report_fatal("schema_reference.4", &[system_id], referrer);
        } else {
            self.report_warning("schema_reference.4", &[system_id], referrer);
        }
    }

    /// Follow every reference reachable from `root`
    pub(crate) fn construct_trees(&mut self, root: DocumentId) {
        let mut pending = vec![root];
        while let Some(document) = pending.pop() {
            let opened = self.process_references(document);
            pending.extend(opened.into_iter().rev());
        }
        info!(
            documents = self.documents.len(),
            grammars = self.grammars.len(),
            "schema documents resolved"
        );
    }

    /// Handle the leading include/import/redefine children of one document
    ///
    /// Returns the documents loaded for the first time.
    fn process_references(&mut self, document: DocumentId) -> Vec<DocumentId> {
        let Some(root) = self.document(document).map(|d| d.element(d.root())) else {
            return Vec::new();
        };
        let mut opened = Vec::new();
        for child in self.children(root) {
            match self.local_name(child) {
                "annotation" => continue,
                "import" => self.process_import(child, &mut opened),
                "include" | "redefine" => self.process_inclusion(child, &mut opened),
                _ => break,
            }
        }
        opened
    }

    fn process_import(&mut self, element: ElementRef, opened: &mut Vec<DocumentId>) {
        let document = element.document;
        let Some(record) = self.check_attributes(element, true) else {
            return;
        };
        let namespace = record
            .str(Attr::Namespace)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        let hint = record.str(Attr::SchemaLocation).map(str::to_string);
        drop(record);

        self.capture_sole_annotation(element, "import");

        let tns = self.target_namespace(document);
        if namespace == tns {
            match &namespace {
                Some(ns) => self.report_error("src-import.1.1", &[ns], Some(element)),
                None => self.report_error("src-import.1.2", &[], Some(element)),
            }
            return;
        }

        let honour_all = self.options.honour_all_schema_locations;
        let growth = self.options.namespace_growth;
        let Some(doc) = self.document_mut(document) else {
            return;
        };
        if doc.is_allowed_namespace(namespace.as_deref()) {
            if !honour_all && !growth {
                return;
            }
        } else {
            doc.add_allowed_namespace(namespace.as_deref());
        }
        let base = doc.location.clone();

        let imports = self.import_map.entry(tns).or_default();
        if !imports.contains(&namespace) {
            imports.push(namespace.clone());
        }

        if let Some(grammar) = self.grammars.get(namespace.as_deref()) {
            let known = hint
                .as_deref()
                .and_then(|h| expand_location(base.as_ref(), h))
                .is_some_and(|system_id| grammar.has_document_location(&system_id));
            if known || !(growth || honour_all) {
                return;
            }
        }

        let Some(hint) = hint else {
            return;
        };
        let request = DocumentRequest {
            hint: &hint,
            base,
            expected_namespace: namespace.as_deref(),
            context: ContextKind::Import,
            must_resolve: false,
            referrer: Some(element),
        };
        let outcome = self.open_document(request);
        self.record_dependency(document, outcome, opened);
    }

    fn process_inclusion(&mut self, element: ElementRef, opened: &mut Vec<DocumentId>) {
        let document = element.document;
        let redefine = self.local_name(element) == "redefine";
        let Some(record) = self.check_attributes(element, true) else {
            return;
        };
        let hint = record.str(Attr::SchemaLocation).map(str::to_string);
        drop(record);

        if redefine {
            for child in self.children(element) {
                if self.local_name(child) == "annotation" {
                    self.capture_annotation(child, Some(element));
                }
            }
        } else {
            self.capture_sole_annotation(element, "include");
        }

        let Some(hint) = hint else {
            self.report_error(
                "s4s-att-must-appear",
                &["<include> or <redefine>", "schemaLocation"],
                Some(element),
            );
            return;
        };

        let must_resolve = redefine && !self.content_children(element).is_empty();
        let tns = self.target_namespace(document);
        let base = self.document(document).and_then(|d| d.location.clone());

        if self.options.namespace_growth && !redefine {
            let known = expand_location(base.as_ref(), &hint).is_some_and(|system_id| {
                self.grammars
                    .get(tns.as_deref())
                    .is_some_and(|g| g.has_document_location(&system_id))
            });
            if known {
                return;
            }
        }

        let request = DocumentRequest {
            hint: &hint,
            base,
            expected_namespace: tns.as_deref(),
            context: if redefine {
                ContextKind::Redefine
            } else {
                ContextKind::Include
            },
            must_resolve,
            referrer: Some(element),
        };
        let outcome = self.open_document(request);
        if redefine {
            if let Opened::New(id) | Opened::Cached(id) = outcome {
                self.redefined_documents.insert(element, id);
            }
        }
        self.record_dependency(document, outcome, opened);
    }

    fn record_dependency(&mut self, from: DocumentId, outcome: Opened, opened: &mut Vec<DocumentId>) {
        match outcome {
            Opened::New(id) => {
                self.dependencies.add_edge(from, id);
                opened.push(id);
            }
            Opened::Cached(id) => self.dependencies.add_edge(from, id),
            Opened::Reused(_) | Opened::Failed => {}
        }
    }

    /// Include/import content: at most one `<annotation>`
    fn capture_sole_annotation(&mut self, element: ElementRef, construct: &str) {
        let children = self.children(element);
        let mut iter = children.into_iter();
        if let Some(first) = iter.next() {
            if self.local_name(first) == "annotation" {
                self.capture_annotation(first, Some(element));
            } else {
                let name = self.local_name(first).to_string();
                self.report_error("s4s-elt-must-match.1", &[construct, "annotation?", &name], Some(first));
            }
        }
        if let Some(extra) = iter.next() {
            let name = self.local_name(extra).to_string();
            self.report_error("s4s-elt-must-match.1", &[construct, "annotation?", &name], Some(extra));
        }
    }

    /// Keep an `<annotation>` in the grammar of its document
    ///
    /// The foreign attributes of `parent` travel with the annotation.
    pub(crate) fn capture_annotation(&mut self, annotation: ElementRef, parent: Option<ElementRef>) {
        let is_global = parent.is_some_and(|p| {
            matches!(self.local_name(p), "schema" | "redefine" | "include" | "import")
        });
        if self.check_attributes(annotation, is_global).is_none() {
            return;
        }
        let Some(doc) = self.document(annotation.document) else {
            return;
        };
        let tree = &doc.tree;

        let mut captured = Annotation {
            appinfo: Vec::new(),
            documentation: Vec::new(),
            attributes: Vec::new(),
            source: Some(doc.source_location(annotation.node)),
        };
        let mut nodes: Vec<NodeId> = parent.map(|p| p.node).into_iter().collect();
        nodes.push(annotation.node);
        for node in nodes {
            for attr in tree.attributes(node) {
                if let Some(ns) = attr.namespace.as_deref().filter(|ns| *ns != XSD_NAMESPACE) {
                    captured
                        .attributes
                        .push((format!("{{{}}}{}", ns, attr.local_name), attr.value.clone()));
                }
            }
        }

        let children: Vec<NodeId> = tree.children(annotation.node).collect();
        let namespace = doc.target_namespace().map(str::to_string);
        for child in children.iter().copied() {
            let text = tree.text_content(child);
            match tree.local_name(child) {
                "appinfo" => captured.appinfo.push(text),
                "documentation" => captured.documentation.push(text),
                _ => {}
            }
        }
        for child in children {
            self.check_attributes(ElementRef::new(annotation.document, child), false);
        }

        self.grammars
            .get_or_create(namespace.as_deref())
            .add_annotation(captured);
    }

    /// Populate every grammar's import list from the namespace import map
    pub(crate) fn wire_imports(&mut self) {
        let entries: Vec<_> = self
            .import_map
            .iter()
            .rev()
            .map(|(tns, imports)| (tns.clone(), imports.clone()))
            .collect();
        for (tns, imports) in entries {
            if !self.grammars.contains(tns.as_deref()) {
                continue;
            }
            let wired: Vec<_> = imports
                .into_iter()
                .filter(|ns| self.grammars.contains(ns.as_deref()))
                .collect();
            if let Some(grammar) = self.grammars.get_mut(tns.as_deref()) {
                grammar.set_imports(wired);
            }
        }
        info!(grammars = self.grammars.len(), "grammar imports wired");
    }
}
