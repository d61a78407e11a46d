//! Schema document trees
//!
//! This module turns schema document text into a navigable arena of element
//! nodes ([`SchemaTree`]) and wraps each loaded tree with the per-document
//! state the assembly passes need ([`SchemaDocument`]): effective target
//! namespace, chameleon flag, active namespace bindings, and the set of
//! namespaces the document may reference.

use crate::diagnostics::SourceLocation;
use crate::error::{Error, ParseError, Result};
use crate::ids::{DocumentId, NodeId};
use crate::limits::Limits;
use crate::locations::Location;
use crate::namespaces::{NamespaceContext, NamespaceSupport, NamespaceUri, Prefix, QName};

/// Attribute of a schema element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAttribute {
    /// Namespace URI (None for unqualified attributes)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
    /// Attribute value as written
    pub value: String,
}

impl SchemaAttribute {
    /// Expanded name of the attribute
    pub fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), &self.local_name)
    }
}

/// One element node of a schema tree
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Local name
    pub local_name: String,
    /// Namespace URI
    pub namespace: Option<NamespaceUri>,
    /// Attributes in document order (namespace declarations excluded)
    pub attributes: Vec<SchemaAttribute>,
    /// Parent element
    pub parent: Option<NodeId>,
    /// First child element
    pub first_child: Option<NodeId>,
    /// Next sibling element
    pub next_sibling: Option<NodeId>,
    /// Previous sibling element
    pub previous_sibling: Option<NodeId>,
    /// Namespace bindings in scope at this element
    pub namespaces: NamespaceContext,
    /// Bindings declared on this element itself
    pub declarations: Vec<(Prefix, Option<NamespaceUri>)>,
    /// Character data directly inside this element
    pub text: Option<String>,
    /// 1-based line of the start tag
    pub line: u32,
    /// 1-based column of the start tag
    pub column: u32,
}

/// Arena of element nodes for one schema document
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    root: NodeId,
}

impl SchemaTree {
    /// Parse schema document text into a tree
    pub fn parse(xml: &str) -> Result<Self> {
        Self::parse_with_limits(xml, &Limits::default())
    }

    /// Parse schema document text, refusing elements with more than
    /// `limits.max_attributes` attributes
    pub fn parse_with_limits(xml: &str, limits: &Limits) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(xml, options)?;

        let mut tree = SchemaTree {
            nodes: Vec::new(),
            root: NodeId::from_raw(1).ok_or_else(|| ParseError::new("empty node arena"))?,
        };
        let root = tree.build(&doc, doc.root_element(), None, &NamespaceContext::new(), limits)?;
        tree.root = root;
        Ok(tree)
    }

    fn build(
        &mut self,
        doc: &roxmltree::Document<'_>,
        node: roxmltree::Node<'_, '_>,
        parent: Option<NodeId>,
        parent_scope: &NamespaceContext,
        limits: &Limits,
    ) -> Result<NodeId> {
        let declarations = declared_bindings(node, parent_scope);
        let scope = parent_scope.extend(declarations.iter().cloned());

        let text: String = node
            .children()
            .filter(|c| c.is_text())
            .filter_map(|c| c.text())
            .collect();
        let pos = doc.text_pos_at(node.range().start);
        limits.check_attributes(node.attributes().len())?;

        let id = NodeId::from_index(self.nodes.len())
            .ok_or_else(|| Error::LimitExceeded("too many elements in schema document".into()))?;
        self.nodes.push(SchemaNode {
            local_name: node.tag_name().name().to_string(),
            namespace: node.tag_name().namespace().map(str::to_string),
            attributes: node
                .attributes()
                .map(|a| SchemaAttribute {
                    namespace: a.namespace().map(str::to_string),
                    local_name: a.name().to_string(),
                    value: a.value().to_string(),
                })
                .collect(),
            parent,
            first_child: None,
            next_sibling: None,
            previous_sibling: None,
            namespaces: scope.clone(),
            declarations,
            text: if text.trim().is_empty() { None } else { Some(text) },
            line: pos.row,
            column: pos.col,
        });

        let mut previous: Option<NodeId> = None;
        for child in node.children().filter(|c| c.is_element()) {
            let child_id = self.build(doc, child, Some(id), &scope, limits)?;
            match previous {
                Some(prev) => {
                    self.nodes[prev.to_index()].next_sibling = Some(child_id);
                    self.nodes[child_id.to_index()].previous_sibling = Some(prev);
                }
                None => self.nodes[id.to_index()].first_child = Some(child_id),
            }
            previous = Some(child_id);
        }

        Ok(id)
    }

    /// Root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of element nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.to_index()]
    }

    /// Local name of an element
    pub fn local_name(&self, id: NodeId) -> &str {
        &self.node(id).local_name
    }

    /// Namespace URI of an element
    pub fn namespace(&self, id: NodeId) -> Option<&str> {
        self.node(id).namespace.as_deref()
    }

    /// Whether an element has the given namespace and local name
    pub fn is(&self, id: NodeId, namespace: &str, local_name: &str) -> bool {
        let node = self.node(id);
        node.local_name == local_name && node.namespace.as_deref() == Some(namespace)
    }

    /// Attributes of an element
    pub fn attributes(&self, id: NodeId) -> &[SchemaAttribute] {
        &self.node(id).attributes
    }

    /// Value of an unqualified attribute
    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.node(id)
            .attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Replace (or add) the value of an unqualified attribute
    pub fn set_attribute(&mut self, id: NodeId, local_name: &str, value: impl Into<String>) {
        let value = value.into();
        let node = &mut self.nodes[id.to_index()];
        match node
            .attributes
            .iter()
            .position(|a| a.namespace.is_none() && a.local_name == local_name)
        {
            Some(i) => node.attributes[i].value = value,
            None => node.attributes.push(SchemaAttribute {
                namespace: None,
                local_name: local_name.to_string(),
                value,
            }),
        }
    }

    /// Parent element
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// First child element
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Next sibling element
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Previous sibling element
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).previous_sibling
    }

    /// Iterate over child elements
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// First child element skipping annotations
    pub fn first_child_skip_annotation(&self, id: NodeId, xsd: &str) -> Option<NodeId> {
        self.children(id).find(|&c| !self.is(c, xsd, "annotation"))
    }

    /// Namespace bindings in scope at an element
    pub fn namespaces(&self, id: NodeId) -> &NamespaceContext {
        &self.node(id).namespaces
    }

    /// Character data of an element and all its descendants, in document order
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(text) = &self.node(id).text {
            out.push_str(text);
        }
        for child in self.children(id) {
            self.collect_text(child, out);
        }
    }

    /// 1-based (line, column) of an element's start tag
    pub fn position(&self, id: NodeId) -> (u32, u32) {
        let node = self.node(id);
        (node.line, node.column)
    }
}

/// Iterator over the child elements of a node
pub struct Children<'a> {
    tree: &'a SchemaTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

/// Bindings that `node` adds on top of `parent_scope`
fn declared_bindings(
    node: roxmltree::Node<'_, '_>,
    parent_scope: &NamespaceContext,
) -> Vec<(Prefix, Option<NamespaceUri>)> {
    let mut declarations = Vec::new();
    let mut has_default = false;
    for ns in node.namespaces() {
        let prefix = ns.name().unwrap_or("");
        if prefix.is_empty() {
            has_default = true;
        }
        if prefix == "xml" {
            continue;
        }
        // xmlns="" undeclares the default namespace
        let uri = Some(ns.uri()).filter(|uri| !uri.is_empty());
        if parent_scope.get_namespace(prefix) != uri {
            declarations.push((prefix.to_string(), uri.map(str::to_string)));
        }
    }
    if !has_default && parent_scope.get_default_namespace().is_some() {
        declarations.push((String::new(), None));
    }
    declarations
}

/// Handle to an element in a specific schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    /// Owning document
    pub document: DocumentId,
    /// Element node within that document's tree
    pub node: NodeId,
}

impl ElementRef {
    /// Create a new element handle
    pub fn new(document: DocumentId, node: NodeId) -> Self {
        Self { document, node }
    }
}

/// One loaded schema document with its assembly state
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// Handle of this document
    pub id: DocumentId,
    /// Parsed element tree
    pub tree: SchemaTree,
    /// Where the document was loaded from
    pub location: Option<Location>,
    /// Expanded system identifier
    pub system_id: Option<String>,
    /// Whether the target namespace was adopted from an including document
    pub chameleon: bool,
    /// Namespace bindings active while the document is being walked
    pub namespaces: NamespaceSupport,
    /// Set once the registry pass has indexed the document
    pub visited: bool,
    /// `elementFormDefault="qualified"`
    pub element_form_qualified: bool,
    /// `attributeFormDefault="qualified"`
    pub attribute_form_qualified: bool,
    /// `blockDefault` as a derivation bit set
    pub block_default: u8,
    /// `finalDefault` as a derivation bit set
    pub final_default: u8,
    target_namespace: Option<NamespaceUri>,
    allowed_namespaces: Vec<Option<NamespaceUri>>,
    reported_namespaces: Vec<Option<NamespaceUri>>,
}

impl SchemaDocument {
    /// Wrap a tree whose effective target namespace has been decided
    pub fn new(
        id: DocumentId,
        tree: SchemaTree,
        location: Option<Location>,
        target_namespace: Option<NamespaceUri>,
        chameleon: bool,
    ) -> Self {
        let root_scope = tree.namespaces(tree.root()).clone();
        Self {
            id,
            system_id: location.as_ref().map(Location::system_id),
            location,
            tree,
            chameleon,
            namespaces: NamespaceSupport::new(root_scope),
            visited: false,
            element_form_qualified: false,
            attribute_form_qualified: false,
            block_default: 0,
            final_default: 0,
            allowed_namespaces: vec![target_namespace.clone()],
            target_namespace,
            reported_namespaces: Vec::new(),
        }
    }

    /// Effective target namespace
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Root `<schema>` element
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Handle to an element of this document
    pub fn element(&self, node: NodeId) -> ElementRef {
        ElementRef::new(self.id, node)
    }

    /// Diagnostic location of an element of this document
    pub fn source_location(&self, node: NodeId) -> SourceLocation {
        let (line, column) = self.tree.position(node);
        SourceLocation {
            system_id: self.system_id.clone(),
            line,
            column,
        }
    }

    /// Whether declarations in `namespace` may be referenced from this document
    pub fn is_allowed_namespace(&self, namespace: Option<&str>) -> bool {
        self.allowed_namespaces
            .iter()
            .any(|ns| ns.as_deref() == namespace)
    }

    /// Record a namespace this document may reference
    pub fn add_allowed_namespace(&mut self, namespace: Option<&str>) {
        if !self.is_allowed_namespace(namespace) {
            self.allowed_namespaces.push(namespace.map(str::to_string));
        }
    }

    /// Namespaces this document may reference
    pub fn allowed_namespaces(&self) -> &[Option<NamespaceUri>] {
        &self.allowed_namespaces
    }

    /// True the first time an unreachable `namespace` is reported for this document
    pub fn need_report_namespace_error(&mut self, namespace: Option<&str>) -> bool {
        if self
            .reported_namespaces
            .iter()
            .any(|ns| ns.as_deref() == namespace)
        {
            return false;
        }
        self.reported_namespaces.push(namespace.map(str::to_string));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const XSD: &str = "http://www.w3.org/2001/XMLSchema";

    #[test]
    fn test_parse_structure() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:annotation/>
  <xs:element name="a"/>
  <xs:element name="b"/>
</xs:schema>"#;
        let tree = SchemaTree::parse(xml).unwrap();
        let root = tree.root();
        assert!(tree.is(root, XSD, "schema"));

        let children: Vec<_> = tree.children(root).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.local_name(children[0]), "annotation");
        assert_eq!(tree.attribute(children[1], "name"), Some("a"));
        assert_eq!(tree.previous_sibling(children[2]), Some(children[1]));
        assert_eq!(tree.next_sibling(children[2]), None);
        assert_eq!(tree.parent(children[1]), Some(root));
        assert_eq!(tree.first_child_skip_annotation(root, XSD), Some(children[1]));
        assert_eq!(tree.position(children[1]), (3, 3));
    }

    #[test]
    fn test_scoped_namespaces() {
        let xml = r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" xmlns:a="urn:a">
  <element name="x" xmlns:a="urn:b"/>
  <element name="y" xmlns=""/>
</schema>"#;
        let tree = SchemaTree::parse(xml).unwrap();
        let mut children = tree.children(tree.root());
        let x = children.next().unwrap();
        let y = children.next().unwrap();

        assert_eq!(tree.namespaces(tree.root()).get_namespace("a"), Some("urn:a"));
        assert_eq!(tree.namespaces(x).get_namespace("a"), Some("urn:b"));
        assert_eq!(tree.namespaces(x).get_default_namespace(), Some(XSD));
        assert_eq!(tree.namespaces(y).get_default_namespace(), None);
        assert_eq!(tree.node(y).declarations, vec![(String::new(), None)]);
    }

    #[test]
    fn test_set_attribute_and_text() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:f="urn:f">
  <xs:annotation><xs:documentation>hello <b>bold</b></xs:documentation></xs:annotation>
  <xs:simpleType name="t" f:note="n"/>
</xs:schema>"#;
        let mut tree = SchemaTree::parse(xml).unwrap();
        let mut children = tree.children(tree.root());
        let annotation = children.next().unwrap();
        let simple = children.next().unwrap();

        assert_eq!(tree.text_content(annotation), "hello bold");
        assert_eq!(tree.attributes(simple)[1].qname(), QName::namespaced("urn:f", "note"));

        tree.set_attribute(simple, "name", "t_renamed");
        assert_eq!(tree.attribute(simple, "name"), Some("t_renamed"));
        tree.set_attribute(simple, "final", "list");
        assert_eq!(tree.attribute(simple, "final"), Some("list"));
    }

    #[test]
    fn test_malformed_input() {
        assert_matches!(SchemaTree::parse("<schema>"), Err(Error::Parse(err)) if err.location.is_some());
    }

    #[test]
    fn test_attribute_limit() {
        let xml = r#"<schema xmlns="http://www.w3.org/2001/XMLSchema"><element name="e" type="T" id="x"/></schema>"#;
        let limits = Limits { max_attributes: 2, ..Limits::default() };
        assert_matches!(SchemaTree::parse_with_limits(xml, &limits), Err(Error::LimitExceeded(_)));
        assert!(SchemaTree::parse(xml).is_ok());
    }

    #[test]
    fn test_document_namespaces() {
        let tree = SchemaTree::parse(r#"<schema xmlns="http://www.w3.org/2001/XMLSchema"/>"#).unwrap();
        let id = DocumentId::from_raw(1).unwrap();
        let mut doc = SchemaDocument::new(id, tree, None, Some("urn:t".into()), false);

        assert!(doc.is_allowed_namespace(Some("urn:t")));
        assert!(!doc.is_allowed_namespace(None));
        doc.add_allowed_namespace(None);
        doc.add_allowed_namespace(None);
        assert_eq!(doc.allowed_namespaces().len(), 2);

        assert!(doc.need_report_namespace_error(Some("urn:z")));
        assert!(!doc.need_report_namespace_error(Some("urn:z")));
    }
}
