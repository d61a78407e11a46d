//! Traversal of global declarations and the deferred queues
//!
//! Global declarations of every document are traversed first, in
//! dependency order. Local element declarations met while building content
//! models are only given a placeholder particle and queued; `<keyref>`s are
//! always queued. Once every global exists the local elements are drained in
//! the order they were met, and the keyrefs last.

use super::components::{SymbolSpace, Term};
use super::handler::SchemaHandler;
use crate::documents::ElementRef;
use crate::ids::{ComponentId, DocumentId, ParticleId};
use crate::namespaces::{NamespaceContext, QName};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// Where a local element sits relative to `<all>` groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllContext {
    /// Directly inside an `<all>`
    pub inside_all_group: bool,
    /// Inside a group reference whose definition is an `<all>`
    pub group_ref_contained_all: bool,
    /// Inside the model group of a `<group>` definition
    pub is_group_definition_child: bool,
    /// Inside an `<all>` of a `<group>` definition
    pub inside_all_group_definition: bool,
}

/// A local element declaration waiting for its particle to be filled in
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredLocalElement {
    /// Placeholder particle already linked into the parent's content model
    pub particle: ParticleId,
    /// The `<element>`
    pub element: ElementRef,
    /// `<all>` context flags
    pub context: AllContext,
    /// Complex type or group definition owning the content model
    pub parent: ComponentId,
    /// Namespace bindings in scope at the element
    pub namespaces: NamespaceContext,
}

/// A `<keyref>` waiting for its referenced key
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredKeyRef {
    /// The `<keyref>`
    pub element: ElementRef,
    /// Element declaration the keyref belongs to
    pub owner: ComponentId,
    /// Namespace bindings in scope at the keyref
    pub namespaces: NamespaceContext,
}

/// A queued piece of work
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredItem {
    /// Local element declaration
    LocalElement(DeferredLocalElement),
    /// Key reference
    KeyRef(DeferredKeyRef),
}

/// FIFO of deferred work
///
/// Local elements and keyrefs are kept apart so each kind leaves in the
/// order it was queued; local elements are always taken before any keyref.
#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    local_elements: VecDeque<DeferredLocalElement>,
    keyrefs: VecDeque<DeferredKeyRef>,
}

impl DeferredQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an item
    pub fn push(&mut self, item: DeferredItem) {
        match item {
            DeferredItem::LocalElement(local) => self.local_elements.push_back(local),
            DeferredItem::KeyRef(keyref) => self.keyrefs.push_back(keyref),
        }
    }

    /// Oldest queued local element
    pub fn pop_local_element(&mut self) -> Option<DeferredLocalElement> {
        self.local_elements.pop_front()
    }

    /// Oldest queued keyref
    pub fn pop_keyref(&mut self) -> Option<DeferredKeyRef> {
        self.keyrefs.pop_front()
    }

    /// Elements of the queued items in the order they will be taken
    pub fn elements(&self) -> impl Iterator<Item = ElementRef> + '_ {
        self.local_elements
            .iter()
            .map(|local| local.element)
            .chain(self.keyrefs.iter().map(|keyref| keyref.element))
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.local_elements.len() + self.keyrefs.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.local_elements.is_empty() && self.keyrefs.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.local_elements.clear();
        self.keyrefs.clear();
    }
}

impl SchemaHandler {
    /// Work still queued
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Whether local elements are currently queued instead of traversed
    pub fn defers_local_elements(&self) -> bool {
        self.defer_local_elements
    }

    /// Queue a local element declaration
    pub fn defer_local_element(&mut self, particle: ParticleId, element: ElementRef, context: AllContext, parent: ComponentId) {
        let namespaces = self.namespace_snapshot(element);
        debug!(?element, "local element deferred");
        self.deferred.push(DeferredItem::LocalElement(DeferredLocalElement {
            particle,
            element,
            context,
            parent,
            namespaces,
        }));
    }

    /// Register and queue a `<keyref>` of element declaration `owner`
    pub fn store_keyref(&mut self, element: ElementRef, owner: ComponentId) {
        if let Some(name) = self.attribute(element, "name").filter(|n| !n.is_empty()) {
            let key = QName::new(self.target_namespace(element.document), name);
            self.check_for_duplicate_names(SymbolSpace::IdentityConstraint, key, element);
        }
        let namespaces = self.namespace_snapshot(element);
        debug!(?element, "keyref deferred");
        self.deferred.push(DeferredItem::KeyRef(DeferredKeyRef {
            element,
            owner,
            namespaces,
        }));
    }

    fn namespace_snapshot(&self, element: ElementRef) -> NamespaceContext {
        self.document(element.document)
            .map(|d| d.tree.namespaces(element.node).clone())
            .unwrap_or_default()
    }

    /// Traverse the global declarations of every document reachable from `root`
    pub(crate) fn traverse_schemas(&mut self, root: DocumentId) {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut traversed = 0usize;

        while let Some(document) = stack.pop() {
            if !visited.insert(document) {
                continue;
            }
            let Some(schema) = self.document(document).map(|d| d.element(d.root())) else {
                continue;
            };

            for child in self.children(schema) {
                let construct = self.local_name(child).to_string();
                match construct.as_str() {
                    "include" | "import" => {}
                    "redefine" => {
                        for redefined in self.children(child) {
                            let kind = self.local_name(redefined).to_string();
                            match kind.as_str() {
                                "annotation" => {}
                                "simpleType" | "complexType" | "group" | "attributeGroup" => {
                                    if let Some(space) = SymbolSpace::of_construct(&kind) {
                                        traversed += self.traverse_declaration(space, redefined);
                                    }
                                }
                                _ => self.report_error(
                                    "s4s-elt-must-match.1",
                                    &[
                                        "redefine",
                                        "(annotation | (simpleType | complexType | group | attributeGroup))*",
                                        &kind,
                                    ],
                                    Some(redefined),
                                ),
                            }
                        }
                    }
                    "annotation" => self.capture_annotation(child, Some(schema)),
                    "attribute" | "attributeGroup" | "complexType" | "element" | "group" | "notation"
                    | "simpleType" => {
                        if let Some(space) = SymbolSpace::of_construct(&construct) {
                            traversed += self.traverse_declaration(space, child);
                        }
                    }
                    _ => self.report_error("s4s-elt-invalid-content.1", &["schema", &construct], Some(child)),
                }
            }

            stack.extend(self.dependencies.dependencies(document).iter().copied());
        }

        info!(documents = visited.len(), declarations = traversed, "global declarations traversed");
    }

    /// Traverse one top-level declaration unless it already was
    ///
    /// Returns 1 when a traversal happened. A declaration that lost a
    /// duplicate-name collision is skipped.
    fn traverse_declaration(&mut self, space: SymbolSpace, element: ElementRef) -> usize {
        let name = self
            .attribute(element, "name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let Some(name) = name else {
            // nameless; the checker reports the missing name
            let traverser = self.traverser.clone();
            traverser.traverse_global(self, space, element);
            return 1;
        };

        let key = QName::new(self.target_namespace(element.document), name);
        match self.registries.space(space).get(&key) {
            Some(entry) if entry.element == element && entry.state == super::registry::EntryState::Unvisited => {
                self.traverse_registered(space, &key);
                1
            }
            _ => 0,
        }
    }

    /// Fill in every deferred local element, in the order they were met
    pub(crate) fn traverse_local_elements(&mut self) {
        self.defer_local_elements = false;
        let mut resolved = 0usize;
        let mut excised = 0usize;

        while let Some(local) = self.deferred.pop_local_element() {
            self.push_namespaces(local.element.document, &local.namespaces);
            let traverser = self.traverser.clone();
            traverser.traverse_local_element(self, &local);
            self.pop_namespaces(local.element.document);
            resolved += 1;

            let empty = self
                .components
                .particle(local.particle)
                .map_or(false, |p| p.is_empty());
            if empty {
                if let Some(group) = self.components.content_model(local.parent) {
                    if self.components.remove_particle(group, local.particle) {
                        debug!(element = ?local.element, "empty particle removed");
                        excised += 1;
                    }
                }
                if let Some(particle) = self.components.particle_mut(local.particle) {
                    particle.term = Term::Empty;
                }
            }
        }

        info!(resolved, excised, "local elements traversed");
    }

    /// Traverse every queued keyref
    pub(crate) fn resolve_keyrefs(&mut self) {
        let mut resolved = 0usize;
        while let Some(keyref) = self.deferred.pop_keyref() {
            self.push_namespaces(keyref.element.document, &keyref.namespaces);
            let traverser = self.traverser.clone();
            traverser.traverse_keyref(self, &keyref);
            self.pop_namespaces(keyref.element.document);
            resolved += 1;
        }
        info!(resolved, "keyrefs traversed");
    }

    fn push_namespaces(&mut self, document: DocumentId, namespaces: &NamespaceContext) {
        if let Some(doc) = self.document_mut(document) {
            doc.namespaces.push_context(namespaces.clone());
        }
    }

    fn pop_namespaces(&mut self, document: DocumentId) {
        if let Some(doc) = self.document_mut(document) {
            doc.namespaces.pop_context();
        }
    }
}
