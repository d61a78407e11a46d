//! Table-driven attribute checking
//!
//! [`AttributeChecker::check`] decodes the attributes of one schema element
//! against its construct's descriptor container, reports violations, fills
//! defaults and applies the occurrence cross-checks. Every traverser goes
//! through it before looking at an element.

use super::attribute_table::{
    Attr, AttrValue, AttributeTable, AttributeUse, Datatype, Form, NamespaceConstraint,
    ProcessContents, WhiteSpace, DERIVATION_EXTENSION, DERIVATION_LIST, DERIVATION_RESTRICTION,
    DERIVATION_SUBSTITUTION, DERIVATION_UNION,
};
use super::record_pool::{PooledRecord, RecordPool};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::documents::SchemaDocument;
use crate::ids::NodeId;
use crate::limits::Limits;
use crate::names::{
    is_valid_any_uri, is_valid_language, is_valid_ncname, is_valid_qname, trim_xml, xml_tokens,
};
use crate::namespaces::{NamespaceUri, QName, ResolvedQName, XML_NAMESPACE, XSD_NAMESPACE};
use std::sync::Arc;
use tracing::trace;

const ALL_DERIVATIONS: u8 = DERIVATION_SUBSTITUTION
    | DERIVATION_EXTENSION
    | DERIVATION_RESTRICTION
    | DERIVATION_LIST
    | DERIVATION_UNION;

/// Checks schema element attributes against the descriptor table
#[derive(Debug, Clone)]
pub struct AttributeChecker {
    table: Arc<AttributeTable>,
    pool: RecordPool,
    limits: Limits,
}

impl AttributeChecker {
    /// Create a checker sharing `table`
    pub fn new(table: Arc<AttributeTable>, limits: &Limits) -> Self {
        Self {
            table,
            pool: RecordPool::new(),
            limits: limits.clone(),
        }
    }

    /// The descriptor table
    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// The record pool backing checked records
    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }

    /// Check the attributes of `node`
    ///
    /// `is_global` is true for children of `<schema>` and `<redefine>`.
    /// Returns `None` when the element is not a known construct.
    pub fn check(
        &self,
        doc: &mut SchemaDocument,
        node: NodeId,
        is_global: bool,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<PooledRecord> {
        let scope = doc.tree.namespaces(node).clone();
        doc.namespaces.push_context(scope);
        let record = self.check_element(doc, node, is_global, sink);
        doc.namespaces.pop_context();
        record
    }

    fn check_element(
        &self,
        doc: &SchemaDocument,
        node: NodeId,
        is_global: bool,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<PooledRecord> {
        let tree = &doc.tree;
        let element_name = tree.local_name(node);
        let report = |sink: &mut dyn DiagnosticSink, severity, code: &str, args: Vec<String>| {
            sink.report(Diagnostic::new(severity, code, args).at(doc.source_location(node)));
        };

        if tree.namespace(node) != Some(XSD_NAMESPACE) {
            report(
                sink,
                Severity::Error,
                "s4s-elt-schema-ns",
                vec![element_name.to_string()],
            );
        }

        let has_ref = !is_global && tree.attribute(node, "ref").is_some();
        let Some(container) = self.table.lookup(element_name, is_global, has_ref) else {
            report(
                sink,
                Severity::Error,
                "s4s-elt-invalid",
                vec![element_name.to_string()],
            );
            return None;
        };

        let mut record = self.pool.checkout();
        let mut seen: u64 = 0;

        for attr in tree.attributes(node) {
            let mut name = attr.local_name.as_str();
            let mut namespace = attr.namespace.as_deref();

            // xml:lang on <schema> and <documentation> is a schema attribute
            if namespace == Some(XML_NAMESPACE)
                && name == "lang"
                && matches!(element_name, "schema" | "documentation")
            {
                name = "xml:lang";
                namespace = None;
            }

            if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
                if ns == XSD_NAMESPACE {
                    report(
                        sink,
                        Severity::Error,
                        "s4s-att-not-allowed",
                        vec![element_name.to_string(), name.to_string()],
                    );
                } else {
                    record.push_non_schema(QName::namespaced(ns, name), attr.value.clone());
                }
                continue;
            }

            let Some(descriptor) = container.get(name) else {
                report(
                    sink,
                    Severity::Error,
                    "s4s-att-not-allowed",
                    vec![element_name.to_string(), name.to_string()],
                );
                continue;
            };

            seen |= descriptor.slot.bit();
            match self.decode(doc, descriptor.datatype, &attr.value) {
                Ok(value) => record.set(descriptor.slot, value),
                Err(reason) => {
                    report(
                        sink,
                        Severity::Error,
                        "s4s-att-invalid-value",
                        vec![element_name.to_string(), name.to_string(), reason],
                    );
                    if let Some(default) = &descriptor.default {
                        record.set(descriptor.slot, default.clone());
                    }
                }
            }
        }

        for descriptor in container.descriptors() {
            if let Some(default) = &descriptor.default {
                if seen & descriptor.slot.bit() == 0 {
                    record.set(descriptor.slot, default.clone());
                    record.mark_default(descriptor.slot);
                }
            }
        }

        if let Some(Some(mut max)) = record.max_occurs() {
            if let Some(limit) = self.limits.max_occurs_exceeded(max) {
                // A lone element or wildcard in a sequence is validated in
                // constant space, so the ceiling does not apply to it.
                let constant_space = matches!(element_name, "element" | "any")
                    && tree.next_sibling(node).is_none()
                    && tree.previous_sibling(node).is_none()
                    && tree
                        .parent(node)
                        .map_or(false, |p| tree.local_name(p) == "sequence");
                if !constant_space {
                    report(
                        sink,
                        Severity::Fatal,
                        "MaxOccurLimit",
                        vec![limit.to_string()],
                    );
                    record.set(Attr::MaxOccurs, AttrValue::Integer(limit));
                    max = limit;
                }
            }

            let min = record.min_occurs().unwrap_or(1);
            if min > max {
                report(
                    sink,
                    Severity::Error,
                    "p-props-correct.2.1",
                    vec![element_name.to_string(), min.to_string(), max.to_string()],
                );
                record.set(Attr::MinOccurs, AttrValue::Integer(max));
            }
        }

        trace!(element = element_name, slot = record.slot(), "attributes checked");
        Some(record)
    }

    fn decode(&self, doc: &SchemaDocument, datatype: Datatype, raw: &str) -> Result<AttrValue, String> {
        let value = trim_xml(raw);
        match datatype {
            Datatype::String | Datatype::XPath | Datatype::XPath1 => {
                Ok(AttrValue::String(raw.to_string()))
            }
            Datatype::AnyUri => {
                if is_valid_any_uri(value) {
                    Ok(AttrValue::String(value.to_string()))
                } else {
                    Err(invalid(value, "anyURI"))
                }
            }
            Datatype::Id | Datatype::NcName => {
                if is_valid_ncname(value) {
                    Ok(AttrValue::String(value.to_string()))
                } else {
                    let name = if datatype == Datatype::Id { "ID" } else { "NCName" };
                    Err(invalid(value, name))
                }
            }
            Datatype::Token => Ok(AttrValue::String(
                xml_tokens(value).collect::<Vec<_>>().join(" "),
            )),
            Datatype::Language => {
                if is_valid_language(value) {
                    Ok(AttrValue::String(value.to_string()))
                } else {
                    Err(invalid(value, "language"))
                }
            }
            Datatype::QName => resolve_qname(doc, value)
                .map(AttrValue::QName)
                .ok_or_else(|| invalid(value, "QName")),
            Datatype::MemberTypes => xml_tokens(value)
                .map(|token| resolve_qname(doc, token))
                .collect::<Option<Vec<_>>>()
                .map(AttrValue::QNames)
                .ok_or_else(|| {
                    format!("cvc-datatype-valid.1.2.2: '{}' is not a valid value for 'List of QName'", value)
                }),
            Datatype::Namespace => {
                decode_namespace_constraint(value, doc.target_namespace())
                    .map(AttrValue::NamespaceConstraint)
            }
            other => decode_value(other, value),
        }
    }
}

fn invalid(value: &str, datatype: &str) -> String {
    format!(
        "cvc-datatype-valid.1.2.1: '{}' is not a valid value for '{}'",
        value, datatype
    )
}

fn not_in_enumeration(value: &str, enumeration: &str) -> String {
    format!(
        "cvc-enumeration-valid: value '{}' is not facet-valid with respect to enumeration '{}'",
        value, enumeration
    )
}

/// Resolve a QName value in the document's active namespace context
///
/// An unprefixed name with no default namespace in a chameleon document
/// takes the document's (adopted) target namespace.
fn resolve_qname(doc: &SchemaDocument, value: &str) -> Option<ResolvedQName> {
    if !is_valid_qname(value) {
        return None;
    }
    let mut resolved = doc.namespaces.resolve(value).ok()?;
    if resolved.prefix.is_none() && resolved.qname.namespace.is_none() && doc.chameleon {
        resolved.qname.namespace = doc.target_namespace().map(str::to_string);
    }
    Some(resolved)
}

/// Decode a value of one of the context-free micro-grammars
///
/// `value` is expected to be trimmed already.
pub fn decode_value(datatype: Datatype, value: &str) -> Result<AttrValue, String> {
    match datatype {
        Datatype::Boolean => match value {
            "true" | "1" => Ok(AttrValue::Boolean(true)),
            "false" | "0" => Ok(AttrValue::Boolean(false)),
            _ => Err(invalid(value, "boolean")),
        },
        Datatype::NonNegativeInteger => decode_integer(value)
            .map(AttrValue::Integer)
            .ok_or_else(|| invalid(value, "nonNegativeInteger")),
        Datatype::PositiveInteger => decode_integer(value)
            .filter(|&n| n > 0)
            .map(AttrValue::Integer)
            .ok_or_else(|| invalid(value, "positiveInteger")),
        Datatype::MaxOccurs => decode_max_occurs(value),
        Datatype::MaxOccurs1 => match value {
            "1" => Ok(AttrValue::Integer(1)),
            _ => Err(not_in_enumeration(value, "(1)")),
        },
        Datatype::MinOccurs1 => match value {
            "0" => Ok(AttrValue::Integer(0)),
            "1" => Ok(AttrValue::Integer(1)),
            _ => Err(not_in_enumeration(value, "(0 | 1)")),
        },
        Datatype::Block
        | Datatype::Block1
        | Datatype::Final
        | Datatype::Final1
        | Datatype::Final2 => decode_derivation_set(datatype, value).map(AttrValue::DerivationSet),
        Datatype::Form => Form::from_str(value)
            .map(AttrValue::Form)
            .ok_or_else(|| not_in_enumeration(value, "(qualified | unqualified)")),
        Datatype::ProcessContents => ProcessContents::from_str(value)
            .map(AttrValue::ProcessContents)
            .ok_or_else(|| not_in_enumeration(value, "(lax | skip | strict)")),
        Datatype::Use => AttributeUse::from_str(value)
            .map(AttrValue::Use)
            .ok_or_else(|| not_in_enumeration(value, "(optional | prohibited | required)")),
        Datatype::WhiteSpace => WhiteSpace::from_str(value)
            .map(AttrValue::WhiteSpace)
            .ok_or_else(|| not_in_enumeration(value, "(preserve | replace | collapse)")),
        other => Err(format!("{:?} values depend on the document context", other)),
    }
}

/// Parse a non-negative integer, accepting a leading `+`
fn decode_integer(value: &str) -> Option<u32> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let n: i32 = digits.parse().ok()?;
    u32::try_from(n).ok()
}

/// Decode `maxOccurs`: `unbounded` or a non-negative integer
pub fn decode_max_occurs(value: &str) -> Result<AttrValue, String> {
    if value == "unbounded" {
        return Ok(AttrValue::Unbounded);
    }
    decode_integer(value)
        .map(AttrValue::Integer)
        .ok_or_else(|| invalid(value, "(nonNegativeInteger | unbounded)"))
}

/// Decode a `block`/`final` style derivation set into its bit mask
pub fn decode_derivation_set(datatype: Datatype, value: &str) -> Result<u8, String> {
    const BLOCK: &[(&str, u8)] = &[
        ("extension", DERIVATION_EXTENSION),
        ("restriction", DERIVATION_RESTRICTION),
        ("substitution", DERIVATION_SUBSTITUTION),
    ];
    const BLOCK1: &[(&str, u8)] = &[
        ("extension", DERIVATION_EXTENSION),
        ("restriction", DERIVATION_RESTRICTION),
    ];
    const FINAL1: &[(&str, u8)] = &[
        ("list", DERIVATION_LIST),
        ("union", DERIVATION_UNION),
        ("restriction", DERIVATION_RESTRICTION),
    ];
    const FINAL2: &[(&str, u8)] = &[
        ("extension", DERIVATION_EXTENSION),
        ("restriction", DERIVATION_RESTRICTION),
        ("list", DERIVATION_LIST),
        ("union", DERIVATION_UNION),
    ];

    let (vocabulary, expected) = match datatype {
        Datatype::Block => (
            BLOCK,
            "(#all | List of (extension | restriction | substitution))",
        ),
        Datatype::Block1 | Datatype::Final => {
            (BLOCK1, "(#all | List of (extension | restriction))")
        }
        Datatype::Final1 => (FINAL1, "(#all | List of (list | union | restriction))"),
        Datatype::Final2 => (
            FINAL2,
            "(#all | List of (extension | restriction | list | union))",
        ),
        other => return Err(format!("{:?} is not a derivation set", other)),
    };

    if value == "#all" {
        // `block` on elements only ranges over the element derivations;
        // every other #all covers all five.
        return Ok(if datatype == Datatype::Block {
            DERIVATION_SUBSTITUTION | DERIVATION_EXTENSION | DERIVATION_RESTRICTION
        } else {
            ALL_DERIVATIONS
        });
    }

    let mut bits = 0;
    for token in xml_tokens(value) {
        match vocabulary.iter().find(|(word, _)| *word == token) {
            Some((_, bit)) => bits |= bit,
            None => {
                return Err(format!(
                    "cvc-datatype-valid.1.2.3: '{}' is not a valid value for '{}'",
                    value, expected
                ))
            }
        }
    }
    Ok(bits)
}

/// Decode a wildcard `namespace` attribute against `target_namespace`
pub fn decode_namespace_constraint(
    value: &str,
    target_namespace: Option<&str>,
) -> Result<NamespaceConstraint, String> {
    match value {
        "##any" => Ok(NamespaceConstraint::Any),
        "##other" => Ok(NamespaceConstraint::Not(vec![
            target_namespace.map(str::to_string),
            None,
        ])),
        _ => {
            let mut list: Vec<Option<NamespaceUri>> = Vec::new();
            for token in xml_tokens(value) {
                let namespace = match token {
                    "##local" => None,
                    "##targetNamespace" => target_namespace.map(str::to_string),
                    uri if is_valid_any_uri(uri) => Some(uri.to_string()),
                    _ => {
                        return Err(format!(
                            "cvc-datatype-valid.1.2.3: '{}' is not a valid value for \
                             '((##any | ##other) | List of (anyURI | (##targetNamespace | ##local)) )'",
                            value
                        ))
                    }
                };
                if !list.contains(&namespace) {
                    list.push(namespace);
                }
            }
            Ok(NamespaceConstraint::List(list))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::documents::SchemaTree;
    use crate::ids::DocumentId;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn document(xml: &str, tns: Option<&str>, chameleon: bool) -> SchemaDocument {
        let tree = SchemaTree::parse(xml).unwrap();
        SchemaDocument::new(
            DocumentId::from_raw(1).unwrap(),
            tree,
            None,
            tns.map(str::to_string),
            chameleon,
        )
    }

    fn checker(limits: &Limits) -> AttributeChecker {
        AttributeChecker::new(Arc::new(AttributeTable::new()), limits)
    }

    /// Path of element children from the root
    fn node_at(doc: &SchemaDocument, path: &[usize]) -> NodeId {
        path.iter().fold(doc.root(), |node, &i| {
            doc.tree.children(node).nth(i).unwrap()
        })
    }

    #[test]
    fn test_occurrence_defaults() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:group name="g"><xs:sequence><xs:element name="e"/></xs:sequence></xs:group>
               </xs:schema>"#,
            None,
            false,
        );
        let node = node_at(&doc, &[0, 0, 0]);
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, node, false, &mut sink)
            .unwrap();

        assert_eq!(record.min_occurs(), Some(1));
        assert_eq!(record.max_occurs(), Some(Some(1)));
        assert!(record.is_default(Attr::MinOccurs));
        assert!(record.is_default(Attr::MaxOccurs));
        assert!(record.is_default(Attr::Nillable));
        assert!(!record.is_default(Attr::Name));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_min_greater_than_max_is_clamped() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:group name="g"><xs:choice><xs:element name="e" minOccurs="5" maxOccurs="2"/></xs:choice></xs:group>
               </xs:schema>"#,
            None,
            false,
        );
        let node = node_at(&doc, &[0, 0, 0]);
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, node, false, &mut sink)
            .unwrap();

        assert_eq!(sink.codes(), vec!["p-props-correct.2.1"]);
        assert_eq!(record.min_occurs(), Some(2));
        assert_eq!(record.max_occurs(), Some(Some(2)));
        assert!(!record.is_default(Attr::MinOccurs));
    }

    #[test]
    fn test_max_occurs_ceiling() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:group name="g">
                   <xs:sequence>
                     <xs:element name="a" maxOccurs="100"/>
                     <xs:element name="b" minOccurs="50" maxOccurs="200"/>
                   </xs:sequence>
                 </xs:group>
                 <xs:group name="h"><xs:sequence><xs:element name="c" maxOccurs="100"/></xs:sequence></xs:group>
               </xs:schema>"#;
        let mut doc = document(xml, None, false);
        let checker = checker(&Limits::default().with_max_occurs(Some(10)));

        let mut sink = Diagnostics::new();
        let b = node_at(&doc, &[0, 0, 1]);
        let record = checker.check(&mut doc, b, false, &mut sink).unwrap();
        assert_eq!(sink.codes(), vec!["MaxOccurLimit", "p-props-correct.2.1"]);
        assert_eq!(sink.iter().next().unwrap().severity, Severity::Fatal);
        assert_eq!(record.max_occurs(), Some(Some(10)));
        assert_eq!(record.min_occurs(), Some(10));
        drop(record);

        // sole particle of a sequence is exempt
        let mut sink = Diagnostics::new();
        let c = node_at(&doc, &[1, 0, 0]);
        let record = checker.check(&mut doc, c, false, &mut sink).unwrap();
        assert!(sink.is_empty());
        assert_eq!(record.max_occurs(), Some(Some(100)));
    }

    #[test]
    fn test_unknown_and_foreign_attributes() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:f="urn:f">
                 <xs:simpleType name="t" f:note="kept" bogus="1" xs:final="list"/>
               </xs:schema>"#,
            None,
            false,
        );
        let node = node_at(&doc, &[0]);
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, node, true, &mut sink)
            .unwrap();

        assert_eq!(sink.codes(), vec!["s4s-att-not-allowed", "s4s-att-not-allowed"]);
        assert_eq!(
            record.non_schema(),
            &[(QName::namespaced("urn:f", "note"), "kept".to_string())]
        );
        assert_eq!(record.str(Attr::Name), Some("t"));
    }

    #[test]
    fn test_invalid_value_falls_back_to_default() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:complexType name="t" mixed="maybe" block="substitution"/>
               </xs:schema>"#,
            None,
            false,
        );
        let node = node_at(&doc, &[0]);
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, node, true, &mut sink)
            .unwrap();

        assert_eq!(sink.codes(), vec!["s4s-att-invalid-value", "s4s-att-invalid-value"]);
        assert_eq!(record.bool(Attr::Mixed), Some(false));
        assert!(!record.is_default(Attr::Mixed));
        assert_eq!(record.derivation_set(Attr::Block), None);
    }

    #[test]
    fn test_unknown_construct_and_foreign_element() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:f="urn:f">
                 <xs:bogus/>
                 <f:element name="x"/>
               </xs:schema>"#,
            None,
            false,
        );
        let checker = checker(&Limits::default());
        let mut sink = Diagnostics::new();
        let bogus = node_at(&doc, &[0]);
        assert!(checker.check(&mut doc, bogus, true, &mut sink).is_none());
        assert_eq!(sink.codes(), vec!["s4s-elt-invalid"]);
        assert_eq!(checker.pool().capacity(), 0);

        let mut sink = Diagnostics::new();
        let foreign = node_at(&doc, &[1]);
        assert!(checker.check(&mut doc, foreign, true, &mut sink).is_some());
        assert_eq!(sink.codes(), vec!["s4s-elt-schema-ns"]);
    }

    #[test]
    fn test_qname_resolution_and_chameleon() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="a" type="T"/>
                 <xs:element name="b" type="xs:string"/>
                 <xs:element name="c" type="zz:T"/>
               </xs:schema>"#;
        let checker = checker(&Limits::default());

        let mut chameleon = document(xml, Some("urn:host"), true);
        let mut sink = Diagnostics::new();
        let a = node_at(&chameleon, &[0]);
        let record = checker.check(&mut chameleon, a, true, &mut sink).unwrap();
        assert_eq!(
            record.qname(Attr::Type).unwrap().qname,
            QName::namespaced("urn:host", "T")
        );
        drop(record);

        let b = node_at(&chameleon, &[1]);
        let record = checker.check(&mut chameleon, b, true, &mut sink).unwrap();
        let resolved = record.qname(Attr::Type).unwrap();
        assert_eq!(resolved.qname, QName::namespaced(XSD_NAMESPACE, "string"));
        assert_eq!(resolved.prefix.as_deref(), Some("xs"));
        drop(record);

        let c = node_at(&chameleon, &[2]);
        let record = checker.check(&mut chameleon, c, true, &mut sink).unwrap();
        assert!(record.qname(Attr::Type).is_none());
        assert_eq!(sink.codes(), vec!["s4s-att-invalid-value"]);
        assert_eq!(chameleon.namespaces.depth(), 1);
    }

    #[test]
    fn test_wildcard_namespace() {
        let xml = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:complexType name="t">
                   <xs:anyAttribute namespace="##other" processContents="lax"/>
                 </xs:complexType>
               </xs:schema>"###;
        let mut doc = document(xml, Some("urn:x"), false);
        let node = node_at(&doc, &[0, 0]);
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, node, false, &mut sink)
            .unwrap();
        assert_eq!(
            record.namespace_constraint(),
            Some(&NamespaceConstraint::Not(vec![Some("urn:x".into()), None]))
        );
        assert_eq!(record.process_contents(), Some(ProcessContents::Lax));
    }

    #[test]
    fn test_xml_lang_on_schema() {
        let mut doc = document(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xml:lang="en" version=" 1.0  beta "/>"#,
            None,
            false,
        );
        let root = doc.root();
        let mut sink = Diagnostics::new();
        let record = checker(&Limits::default())
            .check(&mut doc, root, true, &mut sink)
            .unwrap();
        assert!(sink.is_empty());
        assert_eq!(record.str(Attr::XmlLang), Some("en"));
        assert_eq!(record.str(Attr::Version), Some("1.0 beta"));
        assert_eq!(record.form(Attr::ElementFormDefault), Some(Form::Unqualified));
        assert_eq!(record.derivation_set(Attr::FinalDefault), Some(0));
    }

    #[test]
    fn test_namespace_list_decoding() {
        assert_eq!(
            decode_namespace_constraint("##other", Some("urn:x")).unwrap(),
            NamespaceConstraint::Not(vec![Some("urn:x".into()), None])
        );
        assert_eq!(
            decode_namespace_constraint("##local urn:a urn:a", Some("urn:x")).unwrap(),
            NamespaceConstraint::List(vec![None, Some("urn:a".into())])
        );
        assert_eq!(
            decode_namespace_constraint("##targetNamespace ##local", None).unwrap(),
            NamespaceConstraint::List(vec![None])
        );
        assert!(decode_namespace_constraint("a#b#c", None).is_err());
    }

    #[test]
    fn test_derivation_sets() {
        assert_eq!(decode_derivation_set(Datatype::Block, "#all").unwrap(), 7);
        assert_eq!(decode_derivation_set(Datatype::Final, "#all").unwrap(), ALL_DERIVATIONS);
        assert_eq!(
            decode_derivation_set(Datatype::Final1, "list  union").unwrap(),
            DERIVATION_LIST | DERIVATION_UNION
        );
        assert_eq!(decode_derivation_set(Datatype::Final2, "").unwrap(), 0);
        assert!(decode_derivation_set(Datatype::Block1, "substitution").is_err());
    }

    #[test]
    fn test_scalar_decoders() {
        assert_matches!(decode_value(Datatype::Boolean, "1"), Ok(AttrValue::Boolean(true)));
        assert_matches!(decode_value(Datatype::NonNegativeInteger, "+5"), Ok(AttrValue::Integer(5)));
        assert!(decode_value(Datatype::NonNegativeInteger, "-1").is_err());
        assert!(decode_value(Datatype::PositiveInteger, "0").is_err());
        assert_matches!(decode_value(Datatype::MinOccurs1, "0"), Ok(AttrValue::Integer(0)));
        assert!(decode_value(Datatype::MaxOccurs1, "2").is_err());
        assert_matches!(decode_max_occurs("unbounded"), Ok(AttrValue::Unbounded));
        assert_matches!(
            decode_value(Datatype::Use, "prohibited"),
            Ok(AttrValue::Use(AttributeUse::Prohibited))
        );
        assert_matches!(
            decode_value(Datatype::WhiteSpace, "collapse"),
            Ok(AttrValue::WhiteSpace(WhiteSpace::Collapse))
        );
    }

    proptest! {
        #[test]
        fn prop_max_occurs_accepts_every_u31(n in 0u32..=i32::MAX as u32) {
            prop_assert_eq!(decode_max_occurs(&n.to_string()), Ok(AttrValue::Integer(n)));
        }

        #[test]
        fn prop_namespace_list_is_deduplicated(
            tokens in proptest::collection::vec(
                prop_oneof![
                    Just("##local".to_string()),
                    Just("##targetNamespace".to_string()),
                    "urn:[a-c]",
                ],
                1..8,
            )
        ) {
            let value = tokens.join(" ");
            let decoded = decode_namespace_constraint(&value, Some("urn:t")).unwrap();
            let NamespaceConstraint::List(list) = decoded else {
                panic!("expected a list");
            };
            for (i, ns) in list.iter().enumerate() {
                prop_assert!(!list[i + 1..].contains(ns));
            }
            let first = match tokens[0].as_str() {
                "##local" => None,
                "##targetNamespace" => Some("urn:t".to_string()),
                uri => Some(uri.to_string()),
            };
            prop_assert_eq!(list[0].clone(), first);
        }
    }
}
