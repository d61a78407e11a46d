//! Per-namespace grammars
//!
//! A [`Grammar`] is the output of assembly for one target namespace: the
//! seven symbol-space maps, the namespaces it imports and the documents
//! folded into it. Grammars are shared as `Arc<Grammar>`; mutating a shared
//! one goes through [`GrammarBucket::get_mut`], which copies it first.

use super::components::SymbolSpace;
use crate::diagnostics::SourceLocation;
use crate::ids::ComponentId;
use crate::namespaces::{NamespaceUri, QName};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Captured `<annotation>` content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Text of each `<appinfo>` child
    pub appinfo: Vec<String>,
    /// Text of each `<documentation>` child
    pub documentation: Vec<String>,
    /// Foreign attributes of the annotated element
    pub attributes: Vec<(String, String)>,
    /// Where the annotation appeared
    pub source: Option<SourceLocation>,
}

/// Resolved declarations of one target namespace
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    target_namespace: Option<NamespaceUri>,
    immutable: bool,
    spaces: [IndexMap<String, ComponentId>; 7],
    imports: Vec<Option<NamespaceUri>>,
    document_locations: Vec<String>,
    annotations: Vec<Annotation>,
}

impl Grammar {
    /// Empty grammar for `target_namespace`
    pub fn new(target_namespace: Option<NamespaceUri>) -> Self {
        Self {
            target_namespace,
            ..Self::default()
        }
    }

    /// Target namespace
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Whether the grammar was published
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Global component by local name
    pub fn get(&self, space: SymbolSpace, local_name: &str) -> Option<ComponentId> {
        self.spaces[space.index()].get(local_name).copied()
    }

    /// Whether a name is taken in `space`
    pub fn contains(&self, space: SymbolSpace, local_name: &str) -> bool {
        self.spaces[space.index()].contains_key(local_name)
    }

    /// Add a global component; the first one under a name wins
    ///
    /// Returns false when the name was already taken.
    pub fn add(&mut self, space: SymbolSpace, local_name: impl Into<String>, id: ComponentId) -> bool {
        let local_name = local_name.into();
        let map = &mut self.spaces[space.index()];
        if map.contains_key(&local_name) {
            return false;
        }
        map.insert(local_name, id);
        true
    }

    /// Components of one symbol space in insertion order
    pub fn components(&self, space: SymbolSpace) -> impl Iterator<Item = (QName, ComponentId)> + '_ {
        self.spaces[space.index()].iter().map(move |(name, id)| {
            (
                QName {
                    namespace: self.target_namespace.clone(),
                    local_name: name.clone(),
                },
                *id,
            )
        })
    }

    /// Number of components in one symbol space
    pub fn len(&self, space: SymbolSpace) -> usize {
        self.spaces[space.index()].len()
    }

    /// Whether no component was added to any symbol space
    pub fn is_empty(&self) -> bool {
        self.spaces.iter().all(IndexMap::is_empty)
    }

    /// Imported namespaces that have a grammar
    pub fn imports(&self) -> &[Option<NamespaceUri>] {
        &self.imports
    }

    /// Replace the import list
    pub fn set_imports(&mut self, imports: Vec<Option<NamespaceUri>>) {
        self.imports = imports;
    }

    /// System ids of the documents folded into this grammar
    pub fn document_locations(&self) -> &[String] {
        &self.document_locations
    }

    /// Whether a document was already folded in
    pub fn has_document_location(&self, system_id: &str) -> bool {
        self.document_locations.iter().any(|l| l == system_id)
    }

    /// Record a folded-in document
    pub fn add_document_location(&mut self, system_id: impl Into<String>) {
        let system_id = system_id.into();
        if !self.has_document_location(&system_id) {
            self.document_locations.push(system_id);
        }
    }

    /// Captured annotations
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Keep an annotation
    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }
}

/// The grammars of a handler, keyed by target namespace
#[derive(Debug, Clone, Default)]
pub struct GrammarBucket {
    grammars: IndexMap<Option<NamespaceUri>, Arc<Grammar>>,
}

impl GrammarBucket {
    /// Empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Grammar of a namespace
    pub fn get(&self, namespace: Option<&str>) -> Option<&Arc<Grammar>> {
        self.grammars.get(&namespace.map(str::to_string))
    }

    /// Whether a grammar exists for a namespace
    pub fn contains(&self, namespace: Option<&str>) -> bool {
        self.get(namespace).is_some()
    }

    /// Mutable grammar of a namespace
    ///
    /// A published grammar is replaced by a private copy first, so holders
    /// of the published `Arc` keep seeing the old content.
    pub fn get_mut(&mut self, namespace: Option<&str>) -> Option<&mut Grammar> {
        let grammar = self.grammars.get_mut(&namespace.map(str::to_string))?;
        Some(writable(grammar))
    }

    /// Grammar of a namespace, created when missing
    pub fn get_or_create(&mut self, namespace: Option<&str>) -> &mut Grammar {
        let key = namespace.map(str::to_string);
        let grammar = self
            .grammars
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Grammar::new(key)));
        writable(grammar)
    }

    /// Grammars in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Grammar>> {
        self.grammars.values()
    }

    /// Namespaces with a grammar, in creation order
    pub fn namespaces(&self) -> impl Iterator<Item = Option<&str>> {
        self.grammars.keys().map(|k| k.as_deref())
    }

    /// Number of grammars
    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    /// Whether the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    /// Mark every grammar immutable and hand out shared references
    pub fn publish(&mut self) -> Vec<Arc<Grammar>> {
        for grammar in self.grammars.values_mut() {
            if !grammar.immutable {
                Arc::make_mut(grammar).immutable = true;
            }
        }
        self.grammars.values().cloned().collect()
    }

    /// Drop every grammar
    pub fn clear(&mut self) {
        self.grammars.clear();
    }
}

fn writable(grammar: &mut Arc<Grammar>) -> &mut Grammar {
    if grammar.immutable {
        debug!(namespace = ?grammar.target_namespace, "copying published grammar");
        let mut copy = Grammar::clone(grammar);
        copy.immutable = false;
        *grammar = Arc::new(copy);
    }
    Arc::make_mut(grammar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(n: u32) -> ComponentId {
        ComponentId::from_raw(n).unwrap()
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut grammar = Grammar::new(Some("urn:a".into()));
        assert!(grammar.add(SymbolSpace::Type, "T", id(1)));
        assert!(!grammar.add(SymbolSpace::Type, "T", id(2)));
        assert!(grammar.add(SymbolSpace::Element, "T", id(3)));

        assert_eq!(grammar.get(SymbolSpace::Type, "T"), Some(id(1)));
        assert_eq!(grammar.len(SymbolSpace::Type), 1);
        assert_eq!(
            grammar.components(SymbolSpace::Element).collect::<Vec<_>>(),
            vec![(QName::namespaced("urn:a", "T"), id(3))]
        );
    }

    #[test]
    fn test_published_grammar_is_copied_on_write() {
        let mut bucket = GrammarBucket::new();
        bucket.get_or_create(Some("urn:a")).add(SymbolSpace::Element, "e", id(1));
        let published = bucket.publish();
        assert!(published[0].is_immutable());

        bucket
            .get_mut(Some("urn:a"))
            .unwrap()
            .add(SymbolSpace::Element, "f", id(2));

        assert_eq!(published[0].len(SymbolSpace::Element), 1);
        let current = bucket.get(Some("urn:a")).unwrap();
        assert!(!current.is_immutable());
        assert_eq!(current.len(SymbolSpace::Element), 2);
    }

    #[test]
    fn test_document_locations_are_unique() {
        let mut grammar = Grammar::new(None);
        grammar.add_document_location("a.xsd");
        grammar.add_document_location("a.xsd");
        assert_eq!(grammar.document_locations(), &["a.xsd".to_string()]);
        assert!(grammar.is_empty());
    }
}
