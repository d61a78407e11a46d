//! Global name registries and redefinition
//!
//! Before any declaration is traversed, every top-level declaration of
//! every document is recorded under its `(namespace, local name)` key in the
//! registry of its symbol space. Duplicates are detected here, and the
//! components overridden by a `<redefine>` are renamed so that both the old
//! and the new definition stay addressable.
//!
//! Traversal later goes through [`SchemaHandler::resolve_global`], which
//! traverses a registered declaration the first time it is asked for and
//! reports a circular reference if it is asked for while still in progress.

use super::attribute_table::Attr;
use super::components::SymbolSpace;
use super::handler::SchemaHandler;
use crate::documents::ElementRef;
use crate::ids::{ComponentId, DocumentId};
use crate::namespaces::{DeclarationKey, QName, ResolvedQName, XSD_NAMESPACE};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

/// Suffix given to a component overridden by `<redefine>`
pub const REDEFINE_SUFFIX: &str = "_fn3dktizrknc9pi";

/// Traversal state of a registered declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not traversed yet
    Unvisited,
    /// Being traversed; a lookup now is a circular reference
    InProgress,
    /// Traversed, with the component it produced
    Done(Option<ComponentId>),
}

/// A top-level declaration waiting to be traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// The declaring element
    pub element: ElementRef,
    /// Traversal state
    pub state: EntryState,
}

impl RegistryEntry {
    /// Document holding the declaration
    pub fn document(&self) -> DocumentId {
        self.element.document
    }
}

/// Registry of one symbol space
#[derive(Debug, Clone, Default)]
pub struct UnparsedRegistry {
    entries: HashMap<DeclarationKey, RegistryEntry>,
    latest: HashMap<DeclarationKey, DocumentId>,
}

impl UnparsedRegistry {
    /// Entry under `key`
    pub fn get(&self, key: &DeclarationKey) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &DeclarationKey) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(key)
    }

    /// Register `element` under `key`, replacing any previous entry
    pub fn insert(&mut self, key: DeclarationKey, element: ElementRef) {
        self.entries.insert(
            key,
            RegistryEntry {
                element,
                state: EntryState::Unvisited,
            },
        );
    }

    /// Whether `key` is registered
    pub fn contains(&self, key: &DeclarationKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys and entries
    pub fn iter(&self) -> impl Iterator<Item = (&DeclarationKey, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Number of registered declarations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.latest.clear();
    }
}

/// The seven registries plus the implicit-restriction links of redefined
/// groups and attribute groups
#[derive(Debug, Clone, Default)]
pub struct Registries {
    spaces: [UnparsedRegistry; 7],
    redefine_links: HashMap<(SymbolSpace, DeclarationKey), DeclarationKey>,
}

impl Registries {
    /// Registry of one symbol space
    pub fn space(&self, space: SymbolSpace) -> &UnparsedRegistry {
        &self.spaces[space.index()]
    }

    pub(crate) fn space_mut(&mut self, space: SymbolSpace) -> &mut UnparsedRegistry {
        &mut self.spaces[space.index()]
    }

    /// Record that the redefinition of `original` restricts `renamed`
    pub fn add_redefine_link(&mut self, space: SymbolSpace, original: DeclarationKey, renamed: DeclarationKey) {
        self.redefine_links.insert((space, original), renamed);
    }

    /// Renamed original of a group or attribute group redefined by restriction
    pub fn redefine_link(&self, space: SymbolSpace, original: &DeclarationKey) -> Option<&DeclarationKey> {
        self.redefine_links.get(&(space, original.clone()))
    }

    /// Number of declarations across all symbol spaces
    pub fn len(&self) -> usize {
        self.spaces.iter().map(UnparsedRegistry::len).sum()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.spaces.iter().all(UnparsedRegistry::is_empty)
    }

    pub(crate) fn clear(&mut self) {
        self.spaces.iter_mut().for_each(UnparsedRegistry::clear);
        self.redefine_links.clear();
    }
}

/// `namespace,local` as used in diagnostics
fn key_label(key: &DeclarationKey) -> String {
    format!("{},{}", key.namespace().unwrap_or(""), key.local_name)
}

impl SchemaHandler {
    /// The registries of the current session
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Record every top-level declaration reachable from `root`
    pub(crate) fn build_registries(&mut self, root: DocumentId) {
        let mut stack = vec![root];
        while let Some(document) = stack.pop() {
            let Some(doc) = self.document(document) else {
                continue;
            };
            if doc.visited {
                continue;
            }
            let schema = doc.element(doc.root());
            let tns = doc.target_namespace().map(str::to_string);

            let mut dependencies_can_occur = true;
            for child in self.children(schema) {
                let local_name = self.local_name(child).to_string();
                match local_name.as_str() {
                    "annotation" => {}
                    "include" | "import" => {
                        if !dependencies_can_occur {
                            self.report_error("s4s-elt-invalid-content.3", &[&local_name], Some(child));
                        }
                    }
                    "redefine" => {
                        if !dependencies_can_occur {
                            self.report_error("s4s-elt-invalid-content.3", &[&local_name], Some(child));
                        }
                        self.register_redefinitions(child, tns.as_deref());
                    }
                    _ => {
                        dependencies_can_occur = false;
                        let Some(space) = top_level_space(&local_name) else {
                            continue;
                        };
                        let Some(name) = self.declared_name(child) else {
                            continue;
                        };
                        self.check_for_duplicate_names(space, QName::new(tns.as_deref(), name), child);
                    }
                }
            }

            if let Some(doc) = self.document_mut(document) {
                doc.visited = true;
            }
            stack.extend(self.dependencies.dependencies(document).iter().copied());
        }

        info!(declarations = self.registries.len(), "global registries built");
    }

    fn register_redefinitions(&mut self, redefine: ElementRef, tns: Option<&str>) {
        for child in self.children(redefine) {
            let Some(name) = self.declared_name(child) else {
                continue;
            };
            let construct = self.local_name(child).to_string();
            let space = match construct.as_str() {
                "attributeGroup" => SymbolSpace::AttributeGroup,
                "complexType" | "simpleType" => SymbolSpace::Type,
                "group" => SymbolSpace::Group,
                _ => continue,
            };
            self.check_for_duplicate_names(space, QName::new(tns, name.clone()), child);

            // the duplicate check may have renamed the element itself
            let current = self.declared_name(child).unwrap_or_else(|| name.clone());
            let new_name = format!("{}{}", current, REDEFINE_SUFFIX);
            self.rename_redefining_components(child, &construct, &name, &new_name);
        }
    }

    /// Trimmed value of a non-empty `name` attribute
    fn declared_name(&self, element: ElementRef) -> Option<String> {
        self.attribute(element, "name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    /// Register `element` under `key`, resolving collisions
    ///
    /// Two declarations under one key are an error unless one of them
    /// belongs to a `<redefine>` of the other's document, in which case the
    /// overridden one is renamed with [`REDEFINE_SUFFIX`].
    pub(crate) fn check_for_duplicate_names(&mut self, space: SymbolSpace, key: DeclarationKey, element: ElementRef) {
        let tolerate = self.options.tolerate_duplicates;
        let document = element.document;

        match self.registries.space(space).get(&key).copied() {
            None => {
                if self.options.namespace_growth && !tolerate {
                    let built = self
                        .grammars
                        .get(key.namespace())
                        .is_some_and(|g| g.contains(space, &key.local_name));
                    if built {
                        self.report_error("sch-props-correct.2", &[&key_label(&key)], Some(element));
                    }
                }
                trace!(%key, %space, "declaration registered");
                self.registries.space_mut(space).insert(key.clone(), element);
            }
            Some(entry) if entry.element == element => return,
            Some(entry) => {
                let colliding = entry.element;
                let mut redefined_schema = None;
                let mut collided_with_redefine = false;

                if let Some(parent) = self.parent(colliding).filter(|p| self.local_name(*p) == "redefine") {
                    redefined_schema = self.redefined_documents.get(&parent).copied();
                    collided_with_redefine = true;
                } else if self.parent(element).is_some_and(|p| self.local_name(p) == "redefine") {
                    redefined_schema = Some(colliding.document);
                }

                match redefined_schema {
                    Some(redefined) => {
                        if colliding.document == document {
                            self.report_error("sch-props-correct.2", &[&key_label(&key)], Some(element));
                            return;
                        }
                        let new_key = key.with_local_name(format!("{}{}", key.local_name, REDEFINE_SUFFIX));
                        if redefined == document {
                            debug!(%key, renamed = %new_key, "redefined component renamed");
                            self.set_attribute(element, "name", new_key.local_name.clone());
                            self.registries.space_mut(space).insert(new_key, element);
                        } else if collided_with_redefine {
                            self.check_for_duplicate_names(space, new_key, element);
                        } else {
                            self.report_error("src-redefine.1", &[&key_label(&key)], Some(element));
                        }
                    }
                    None if !tolerate => {
                        self.report_error("sch-props-correct.2", &[&key_label(&key)], Some(element));
                    }
                    None => {
                        let same_document = self.registries.space(space).latest.get(&key) == Some(&document);
                        if same_document {
                            self.report_error("sch-props-correct.2", &[&key_label(&key)], Some(element));
                        }
                    }
                }
            }
        }

        if tolerate {
            self.registries.space_mut(space).latest.insert(key, document);
        }
    }

    /// Point the self-reference inside a redefining component at the
    /// renamed original
    fn rename_redefining_components(&mut self, child: ElementRef, construct: &str, old_name: &str, new_name: &str) {
        let tns = self.target_namespace(child.document);
        let original = QName::new(tns.as_deref(), old_name);

        match construct {
            "simpleType" => {
                let Some(derivation) = self.content_children(child).first().copied() else {
                    self.report_error("src-redefine.5.a.a", &[], Some(child));
                    return;
                };
                let derivation_name = self.local_name(derivation).to_string();
                if derivation_name != "restriction" {
                    self.report_error("src-redefine.5.a.b", &[&derivation_name], Some(child));
                    return;
                }
                if !self.rename_base(derivation, &original, new_name) {
                    let label = key_label(&original);
                    self.report_error("src-redefine.5.a.c", &[&derivation_name, &label], Some(child));
                }
            }
            "complexType" => {
                let Some(content) = self.content_children(child).first().copied() else {
                    self.report_error("src-redefine.5.b.a", &[], Some(child));
                    return;
                };
                let Some(derivation) = self.content_children(content).first().copied() else {
                    self.report_error("src-redefine.5.b.b", &[], Some(content));
                    return;
                };
                let derivation_name = self.local_name(derivation).to_string();
                if derivation_name != "restriction" && derivation_name != "extension" {
                    self.report_error("src-redefine.5.b.c", &[&derivation_name], Some(derivation));
                    return;
                }
                if !self.rename_base(derivation, &original, new_name) {
                    let label = key_label(&original);
                    self.report_error("src-redefine.5.b.d", &[&derivation_name, &label], Some(derivation));
                }
            }
            "attributeGroup" | "group" => {
                let count = self.change_redefine_group(&original, construct, new_name, child);
                let (space, too_many) = if construct == "group" {
                    (SymbolSpace::Group, "src-redefine.6.1.1")
                } else {
                    (SymbolSpace::AttributeGroup, "src-redefine.7.1")
                };
                match count {
                    0 => {
                        let renamed = original.with_local_name(new_name);
                        debug!(original = %original, renamed = %renamed, "implicit restriction by redefinition");
                        self.registries.add_redefine_link(space, original, renamed);
                    }
                    1 => {}
                    n => self.report_error(too_many, &[&n.to_string()], Some(child)),
                }
            }
            _ => {}
        }
    }

    /// Rewrite the `base` of `derivation` if it names `original`
    fn rename_base(&mut self, derivation: ElementRef, original: &QName, new_name: &str) -> bool {
        let base = self
            .check_attributes(derivation, false)
            .and_then(|record| record.qname(Attr::Base).cloned());
        match base {
            Some(base) if &base.qname == original => {
                self.set_attribute(derivation, "base", base.relabel(new_name));
                debug!(base = %original, renamed = new_name, "redefinition base renamed");
                true
            }
            _ => false,
        }
    }

    /// Rewrite `ref`s to `original` among the descendants of `current`
    /// that are `sought` elements; returns how many were rewritten
    fn change_redefine_group(&mut self, original: &QName, sought: &str, new_name: &str, current: ElementRef) -> usize {
        let mut count = 0;
        for child in self.children(current) {
            if self.local_name(child) != sought {
                count += self.change_redefine_group(original, sought, new_name, child);
                continue;
            }
            let Some(reference) = self.resolve_ref(child) else {
                continue;
            };
            if &reference.qname != original {
                continue;
            }
            let raw = reference.raw_name();
            self.set_attribute(child, "ref", reference.relabel(new_name));
            count += 1;

            if sought == "group" {
                let is_one = |value: Option<&str>| value.map_or(true, |v| v == "1");
                if !is_one(self.attribute(child, "minOccurs")) || !is_one(self.attribute(child, "maxOccurs")) {
                    self.report_error("src-redefine.6.1.2", &[&raw], Some(child));
                }
            }
        }
        count
    }

    /// The `ref` of an element as an expanded name
    ///
    /// An unprefixed name with no default namespace in a chameleon document
    /// takes the document's target namespace.
    fn resolve_ref(&self, element: ElementRef) -> Option<ResolvedQName> {
        let raw = self.attribute(element, "ref").filter(|r| !r.is_empty())?;
        let doc = self.document(element.document)?;
        let mut resolved = doc.tree.namespaces(element.node).resolve(raw.trim()).ok()?;
        if resolved.prefix.is_none() && resolved.qname.namespace.is_none() && doc.chameleon {
            resolved.qname.namespace = doc.target_namespace().map(str::to_string);
        }
        Some(resolved)
    }

    /// The original a redefined group or attribute group restricts
    ///
    /// `name` is the redefining component's name. Returns `None` when the
    /// redefinition is not an implicit restriction; reports when the
    /// renamed original cannot be found.
    pub fn redefined_by_restriction(
        &mut self,
        space: SymbolSpace,
        name: &QName,
        referencing: ElementRef,
    ) -> Option<ComponentId> {
        let renamed = self.registries.redefine_link(space, name)?.clone();
        let reference = ResolvedQName {
            prefix: None,
            qname: renamed.clone(),
        };
        let found = self.resolve_global(referencing, space, &reference);
        if found.is_none() {
            let code = match space {
                SymbolSpace::AttributeGroup => "src-redefine.7.2.1",
                _ => "src-redefine.6.2.1",
            };
            self.report_error(code, &[&name.local_name], Some(referencing));
        }
        found
    }

    /// Find (and traverse on first use) the global component `name`
    ///
    /// Built-in types are found without a lookup. A declaration registered
    /// but not yet traversed is traversed now; one that is still being
    /// traversed is a circular reference.
    pub fn resolve_global(
        &mut self,
        referencing: ElementRef,
        space: SymbolSpace,
        name: &ResolvedQName,
    ) -> Option<ComponentId> {
        let qname = &name.qname;
        let namespace = qname.namespace();
        trace!(name = %qname, %space, "resolving global");

        if space == SymbolSpace::Type && namespace == Some(XSD_NAMESPACE) {
            if let Some(builtin) = self.builtins.get(&qname.local_name) {
                return Some(builtin);
            }
        }

        let raw = name.raw_name();
        let document = referencing.document;
        if let Some(doc) = self.document_mut(document) {
            if !doc.is_allowed_namespace(namespace) && doc.need_report_namespace_error(namespace) {
                let system_id = doc.system_id.clone().unwrap_or_default();
                let code = if namespace.is_none() { "src-resolve.4.1" } else { "src-resolve.4.2" };
                self.report_error(code, &[&system_id, namespace.unwrap_or(""), &raw], Some(referencing));
            }
        }

        let Some(grammar) = self.grammars.get(namespace) else {
            let owned = namespace.map(str::to_string);
            if !self.missing_grammars.contains(&owned) {
                self.missing_grammars.push(owned);
                self.report_error("src-resolve", &[&raw, space.label()], Some(referencing));
            }
            return None;
        };
        let found = grammar.get(space, &qname.local_name);

        let entry = self.registries.space(space).get(qname).copied();
        if !self.options.tolerate_duplicates {
            if found.is_some() {
                return found;
            }
        } else if let Some(RegistryEntry {
            state: EntryState::Done(Some(id)),
            ..
        }) = entry
        {
            return Some(id);
        }

        let Some(entry) = entry else {
            if found.is_none() {
                self.report_error("src-resolve", &[&raw, space.label()], Some(referencing));
            }
            return found;
        };

        match entry.state {
            EntryState::InProgress => {
                if found.is_none() {
                    let code = circularity_code(space, self.local_name(entry.element));
                    self.report_error(code, &[&raw], Some(referencing));
                }
                found
            }
            EntryState::Done(done) => found.or(done),
            EntryState::Unvisited if space == SymbolSpace::IdentityConstraint => found,
            EntryState::Unvisited => self.traverse_registered(space, qname),
        }
    }

    /// Traverse the declaration registered under `key`
    pub(crate) fn traverse_registered(&mut self, space: SymbolSpace, key: &DeclarationKey) -> Option<ComponentId> {
        let entry = self.registries.space_mut(space).get_mut(key)?;
        entry.state = EntryState::InProgress;
        let element = entry.element;

        let traverser = self.traverser.clone();
        let result = traverser.traverse_global(self, space, element);

        if let Some(entry) = self.registries.space_mut(space).get_mut(key) {
            entry.state = EntryState::Done(result);
        }
        if let Some(id) = result {
            self.add_global(space, element.document, id);
        }
        result
    }

    /// Documents already indexed by the registry pass
    pub fn visited_documents(&self) -> HashSet<DocumentId> {
        self.documents.iter().filter(|d| d.visited).map(|d| d.id).collect()
    }
}

fn top_level_space(local_name: &str) -> Option<SymbolSpace> {
    match local_name {
        "attribute" | "attributeGroup" | "complexType" | "simpleType" | "element" | "group" | "notation" => {
            SymbolSpace::of_construct(local_name)
        }
        _ => None,
    }
}

/// Diagnostic code for a declaration that refers to itself while being traversed
fn circularity_code(space: SymbolSpace, construct: &str) -> &'static str {
    match space {
        SymbolSpace::AttributeGroup => "src-attribute_group.3",
        SymbolSpace::Element => "e-props-correct.6",
        SymbolSpace::Group => "mg-props-correct.2",
        SymbolSpace::Type if construct == "complexType" => "ct-props-correct.3",
        SymbolSpace::Type => "st-props-correct.2",
        SymbolSpace::Attribute | SymbolSpace::IdentityConstraint | SymbolSpace::Notation => "src-resolve",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::components::Component;
    use crate::assembly::handler::SchemaOptions;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const HEAD: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn handler_with(options: SchemaOptions, docs: &[(&str, String)]) -> SchemaHandler {
        let mut handler = SchemaHandler::with_options(options);
        for (id, text) in docs {
            handler.loader_mut().register(*id, text.clone());
        }
        handler
    }

    fn handler(docs: &[(&str, String)]) -> SchemaHandler {
        handler_with(SchemaOptions::default(), docs)
    }

    #[test]
    fn test_circularity_codes() {
        assert_eq!(circularity_code(SymbolSpace::Type, "complexType"), "ct-props-correct.3");
        assert_eq!(circularity_code(SymbolSpace::Type, "simpleType"), "st-props-correct.2");
        assert_eq!(circularity_code(SymbolSpace::Group, "group"), "mg-props-correct.2");
        assert_eq!(key_label(&QName::local("a")), ",a");
    }

    #[test]
    fn test_duplicate_across_documents_first_wins() {
        let root = format!(
            r#"<xs:schema {HEAD} targetNamespace="urn:a">
                 <xs:include schemaLocation="b.xsd"/>
                 <xs:element name="e" type="xs:string"/>
               </xs:schema>"#
        );
        let b = format!(r#"<xs:schema {HEAD} targetNamespace="urn:a"><xs:element name="e" type="xs:int"/></xs:schema>"#);
        let mut handler = handler(&[("memory:/root.xsd", root), ("memory:/b.xsd", b)]);
        let parsed = handler.parse_schema("memory:/root.xsd").unwrap();

        assert_eq!(handler.diagnostics().codes(), vec!["sch-props-correct.2"]);
        let key = QName::namespaced("urn:a", "e");
        let entry = handler.registries().space(SymbolSpace::Element).get(&key).unwrap();
        assert_eq!(entry.document(), parsed.root.unwrap());

        let id = handler.grammar(Some("urn:a")).unwrap().get(SymbolSpace::Element, "e").unwrap();
        let decl = handler.components().element(id).unwrap();
        assert_eq!(decl.type_definition, handler.builtins().get("string"));
    }

    #[test]
    fn test_tolerated_duplicates_only_report_within_a_document() {
        let root = format!(
            r#"<xs:schema {HEAD}>
                 <xs:include schemaLocation="b.xsd"/>
                 <xs:element name="e"/>
               </xs:schema>"#
        );
        let b = format!(r#"<xs:schema {HEAD}><xs:element name="e"/><xs:element name="e"/></xs:schema>"#);
        let options = SchemaOptions {
            tolerate_duplicates: true,
            ..SchemaOptions::default()
        };
        let mut handler = handler_with(options, &[("memory:/root.xsd", root), ("memory:/b.xsd", b)]);
        handler.parse_schema("memory:/root.xsd").unwrap();
        assert_eq!(handler.diagnostics().codes(), vec!["sch-props-correct.2"]);
    }

    #[test]
    fn test_content_after_declarations() {
        let root = format!(
            r#"<xs:schema {HEAD}>
                 <xs:element name="e"/>
                 <xs:include schemaLocation="b.xsd"/>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/root.xsd", root)]);
        handler.parse_schema("memory:/root.xsd").unwrap();
        assert_eq!(handler.diagnostics().codes(), vec!["s4s-elt-invalid-content.3"]);
    }

    #[test]
    fn test_redefined_type_is_renamed() {
        let base = format!(
            r#"<xs:schema {HEAD} xmlns:n="urn:n" targetNamespace="urn:n">
                 <xs:complexType name="T"><xs:sequence><xs:element name="a"/></xs:sequence></xs:complexType>
               </xs:schema>"#
        );
        let redefining = format!(
            r#"<xs:schema {HEAD} xmlns:n="urn:n" targetNamespace="urn:n">
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:complexType name="T">
                     <xs:complexContent>
                       <xs:extension base="n:T"><xs:sequence><xs:element name="b"/></xs:sequence></xs:extension>
                     </xs:complexContent>
                   </xs:complexType>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        let parsed = handler.parse_schema("memory:/b.xsd").unwrap();
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let renamed = format!("T{}", REDEFINE_SUFFIX);
        let types = handler.registries().space(SymbolSpace::Type);
        let new = types.get(&QName::namespaced("urn:n", "T")).unwrap();
        let old = types.get(&QName::namespaced("urn:n", renamed.as_str())).unwrap();
        assert_eq!(new.document(), parsed.root.unwrap());
        assert_ne!(old.document(), new.document());

        let extension = handler
            .documents()
            .iter()
            .find(|d| d.id == new.document())
            .map(|d| {
                let tree = &d.tree;
                let mut node = new.element.node;
                while let Some(child) = tree.first_child(node) {
                    node = child;
                    if tree.local_name(node) == "extension" {
                        break;
                    }
                }
                tree.attribute(node, "base").map(str::to_string)
            })
            .unwrap();
        assert_eq!(extension, Some(format!("n:{}", renamed)));

        let grammar = handler.grammar(Some("urn:n")).unwrap();
        let new_id = grammar.get(SymbolSpace::Type, "T").unwrap();
        let old_id = grammar.get(SymbolSpace::Type, &renamed).unwrap();
        assert_matches!(handler.components().get(new_id), Some(Component::Type(t)) if t.base == Some(old_id));
    }

    #[test]
    fn test_redefined_group_without_self_reference_links_original() {
        let base = format!(
            r#"<xs:schema {HEAD}>
                 <xs:group name="g"><xs:sequence><xs:element name="a"/><xs:element name="b" minOccurs="0"/></xs:sequence></xs:group>
               </xs:schema>"#
        );
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:group name="g"><xs:sequence><xs:element name="a"/></xs:sequence></xs:group>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let renamed = QName::local(format!("g{}", REDEFINE_SUFFIX));
        assert_eq!(
            handler.registries().redefine_link(SymbolSpace::Group, &QName::local("g")),
            Some(&renamed)
        );

        let grammar = handler.grammar(None).unwrap();
        let new = handler.components().group(grammar.get(SymbolSpace::Group, "g").unwrap()).unwrap();
        assert_eq!(new.redefines, grammar.get(SymbolSpace::Group, &renamed.local_name));
    }

    #[test]
    fn test_redefined_group_with_two_self_references() {
        let base = format!(r#"<xs:schema {HEAD}><xs:group name="g"><xs:sequence/></xs:group></xs:schema>"#);
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:group name="g"><xs:sequence><xs:group ref="g"/><xs:group ref="g" maxOccurs="2"/></xs:sequence></xs:group>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();
        assert_eq!(
            handler.diagnostics().codes(),
            vec!["src-redefine.6.1.2", "src-redefine.6.1.1"]
        );
    }

    #[test]
    fn test_redefined_attribute_group_without_self_reference_links_original() {
        let base = format!(
            r#"<xs:schema {HEAD}>
                 <xs:attributeGroup name="ag"><xs:attribute name="a"/><xs:attribute name="b"/></xs:attributeGroup>
               </xs:schema>"#
        );
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:attributeGroup name="ag"><xs:attribute name="a"/></xs:attributeGroup>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let renamed = QName::local(format!("ag{}", REDEFINE_SUFFIX));
        assert_eq!(
            handler.registries().redefine_link(SymbolSpace::AttributeGroup, &QName::local("ag")),
            Some(&renamed)
        );
        assert_eq!(handler.registries().redefine_link(SymbolSpace::Group, &QName::local("ag")), None);

        let grammar = handler.grammar(None).unwrap();
        let original = grammar.get(SymbolSpace::AttributeGroup, &renamed.local_name);
        assert!(original.is_some());
        assert_matches!(
            handler.components().get(grammar.get(SymbolSpace::AttributeGroup, "ag").unwrap()),
            Some(Component::AttributeGroup(g)) if g.redefines == original && g.attribute_uses.len() == 1
        );
    }

    #[test]
    fn test_redefined_attribute_group_with_two_self_references() {
        let base = format!(r#"<xs:schema {HEAD}><xs:attributeGroup name="ag"/></xs:schema>"#);
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:attributeGroup name="ag">
                     <xs:attributeGroup ref="ag"/>
                     <xs:attributeGroup ref="ag"/>
                   </xs:attributeGroup>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();
        assert_eq!(handler.diagnostics().codes(), vec!["src-redefine.7.1"]);
        assert_eq!(handler.diagnostics().iter().next().unwrap().args, vec!["2"]);
        assert_eq!(
            handler.registries().redefine_link(SymbolSpace::AttributeGroup, &QName::local("ag")),
            None
        );
    }

    #[test]
    fn test_redefined_attribute_group_missing_from_redefined_schema() {
        let base = format!(r#"<xs:schema {HEAD}><xs:attributeGroup name="other"/></xs:schema>"#);
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:attributeGroup name="ag"><xs:attribute name="a"/></xs:attributeGroup>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();

        let codes = handler.diagnostics().codes();
        assert_eq!(codes.last(), Some(&"src-redefine.7.2.1"), "{:?}", codes);
        let restriction = handler
            .diagnostics()
            .iter()
            .find(|d| d.code == "src-redefine.7.2.1")
            .unwrap();
        assert_eq!(restriction.args, vec!["ag"]);

        let grammar = handler.grammar(None).unwrap();
        assert_matches!(
            handler.components().get(grammar.get(SymbolSpace::AttributeGroup, "ag").unwrap()),
            Some(Component::AttributeGroup(g)) if g.redefines.is_none()
        );
    }

    #[test]
    fn test_redefinition_colliding_with_another_schema() {
        let root = format!(
            r#"<xs:schema {HEAD}>
                 <xs:include schemaLocation="b.xsd"/>
                 <xs:include schemaLocation="c.xsd"/>
               </xs:schema>"#
        );
        let base = format!(r#"<xs:schema {HEAD}><xs:element name="other"/></xs:schema>"#);
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:simpleType name="s"><xs:restriction base="s"/></xs:simpleType>
                 </xs:redefine>
               </xs:schema>"#
        );
        let other = format!(r#"<xs:schema {HEAD}><xs:simpleType name="s"><xs:restriction base="xs:token"/></xs:simpleType></xs:schema>"#);
        let mut handler = handler(&[
            ("memory:/root.xsd", root),
            ("memory:/a.xsd", base),
            ("memory:/b.xsd", redefining),
            ("memory:/c.xsd", other),
        ]);
        handler.parse_schema("memory:/root.xsd").unwrap();

        let codes = handler.diagnostics().codes();
        assert!(codes.contains(&"src-redefine.1"), "{:?}", codes);
        assert!(!codes.contains(&"sch-props-correct.2"), "{:?}", codes);
        let collision = handler.diagnostics().iter().find(|d| d.code == "src-redefine.1").unwrap();
        assert_eq!(collision.args, vec![",s"]);
    }

    #[test]
    fn test_redefined_simple_type_errors() {
        let base = format!(r#"<xs:schema {HEAD}><xs:simpleType name="s"><xs:restriction base="xs:string"/></xs:simpleType></xs:schema>"#);
        let redefining = format!(
            r#"<xs:schema {HEAD}>
                 <xs:redefine schemaLocation="a.xsd">
                   <xs:simpleType name="s"><xs:restriction base="xs:token"/></xs:simpleType>
                 </xs:redefine>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/a.xsd", base), ("memory:/b.xsd", redefining)]);
        handler.parse_schema("memory:/b.xsd").unwrap();
        assert_eq!(handler.diagnostics().codes(), vec!["src-redefine.5.a.c"]);
        assert_eq!(handler.diagnostics().iter().next().unwrap().args, vec!["restriction", ",s"]);
    }

    #[test]
    fn test_unresolved_references() {
        let root = format!(
            r#"<xs:schema {HEAD} xmlns:o="urn:other">
                 <xs:element name="a" type="Missing"/>
                 <xs:element name="b" type="o:T"/>
                 <xs:element name="c" type="o:U"/>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/root.xsd", root)]);
        handler.parse_schema("memory:/root.xsd").unwrap();
        assert_eq!(
            handler.diagnostics().codes(),
            vec!["src-resolve", "src-resolve.4.2", "src-resolve"]
        );
    }

    #[test]
    fn test_circular_attribute_groups() {
        let root = format!(
            r#"<xs:schema {HEAD}>
                 <xs:attributeGroup name="a"><xs:attributeGroup ref="b"/></xs:attributeGroup>
                 <xs:attributeGroup name="b"><xs:attributeGroup ref="a"/></xs:attributeGroup>
               </xs:schema>"#
        );
        let mut handler = handler(&[("memory:/root.xsd", root)]);
        handler.parse_schema("memory:/root.xsd").unwrap();
        assert_eq!(handler.diagnostics().codes(), vec!["src-attribute_group.3"]);

        let key = QName::local("a");
        assert_matches!(
            handler.registries().space(SymbolSpace::AttributeGroup).get(&key).map(|e| e.state),
            Some(EntryState::Done(Some(_)))
        );
    }
}
