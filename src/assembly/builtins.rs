//! Built-in XSD type definitions
//!
//! `anyType`, `anySimpleType` and the 44 built-in datatypes are present in
//! every schema. They are materialized once per component arena and looked
//! up by local name without going through the registries.

use super::components::{Component, ComponentArena, Derivation, TypeDef, TypeKind};
use crate::ids::ComponentId;
use crate::namespaces::{QName, XSD_NAMESPACE};
use std::collections::HashMap;

/// Built-in datatypes with their base type and derivation
const DATATYPES: &[(&str, &str, Derivation)] = &[
    ("string", "anySimpleType", Derivation::Restriction),
    ("boolean", "anySimpleType", Derivation::Restriction),
    ("float", "anySimpleType", Derivation::Restriction),
    ("double", "anySimpleType", Derivation::Restriction),
    ("decimal", "anySimpleType", Derivation::Restriction),
    ("duration", "anySimpleType", Derivation::Restriction),
    ("dateTime", "anySimpleType", Derivation::Restriction),
    ("time", "anySimpleType", Derivation::Restriction),
    ("date", "anySimpleType", Derivation::Restriction),
    ("gYearMonth", "anySimpleType", Derivation::Restriction),
    ("gYear", "anySimpleType", Derivation::Restriction),
    ("gMonthDay", "anySimpleType", Derivation::Restriction),
    ("gDay", "anySimpleType", Derivation::Restriction),
    ("gMonth", "anySimpleType", Derivation::Restriction),
    ("hexBinary", "anySimpleType", Derivation::Restriction),
    ("base64Binary", "anySimpleType", Derivation::Restriction),
    ("anyURI", "anySimpleType", Derivation::Restriction),
    ("QName", "anySimpleType", Derivation::Restriction),
    ("NOTATION", "anySimpleType", Derivation::Restriction),
    ("normalizedString", "string", Derivation::Restriction),
    ("token", "normalizedString", Derivation::Restriction),
    ("language", "token", Derivation::Restriction),
    ("NMTOKEN", "token", Derivation::Restriction),
    ("NMTOKENS", "NMTOKEN", Derivation::List),
    ("Name", "token", Derivation::Restriction),
    ("NCName", "Name", Derivation::Restriction),
    ("ID", "NCName", Derivation::Restriction),
    ("IDREF", "NCName", Derivation::Restriction),
    ("IDREFS", "IDREF", Derivation::List),
    ("ENTITY", "NCName", Derivation::Restriction),
    ("ENTITIES", "ENTITY", Derivation::List),
    ("integer", "decimal", Derivation::Restriction),
    ("nonPositiveInteger", "integer", Derivation::Restriction),
    ("negativeInteger", "nonPositiveInteger", Derivation::Restriction),
    ("long", "integer", Derivation::Restriction),
    ("int", "long", Derivation::Restriction),
    ("short", "int", Derivation::Restriction),
    ("byte", "short", Derivation::Restriction),
    ("nonNegativeInteger", "integer", Derivation::Restriction),
    ("unsignedLong", "nonNegativeInteger", Derivation::Restriction),
    ("unsignedInt", "unsignedLong", Derivation::Restriction),
    ("unsignedShort", "unsignedInt", Derivation::Restriction),
    ("unsignedByte", "unsignedShort", Derivation::Restriction),
    ("positiveInteger", "nonNegativeInteger", Derivation::Restriction),
];

/// Index of the built-in types stored in a component arena
#[derive(Debug, Clone, Default)]
pub struct Builtins {
    types: HashMap<&'static str, ComponentId>,
}

impl Builtins {
    /// Add every built-in type to `arena`
    pub fn install(arena: &mut ComponentArena) -> Self {
        let mut types = HashMap::new();

        let mut any_type = TypeDef::new(Some(QName::namespaced(XSD_NAMESPACE, "anyType")), TypeKind::Complex);
        any_type.builtin = true;
        any_type.mixed = true;
        if let Some(id) = arena.add(Component::Type(any_type)) {
            types.insert("anyType", id);
        }

        let mut any_simple =
            TypeDef::new(Some(QName::namespaced(XSD_NAMESPACE, "anySimpleType")), TypeKind::Simple);
        any_simple.builtin = true;
        any_simple.base = types.get("anyType").copied();
        any_simple.derivation = Some(Derivation::Restriction);
        if let Some(id) = arena.add(Component::Type(any_simple)) {
            types.insert("anySimpleType", id);
        }

        // bases always precede their derived types in the table
        for &(name, base, derivation) in DATATYPES {
            let mut def = TypeDef::new(Some(QName::namespaced(XSD_NAMESPACE, name)), TypeKind::Simple);
            def.builtin = true;
            let base_id = types.get(base).copied();
            match derivation {
                Derivation::List => {
                    def.base = types.get("anySimpleType").copied();
                    def.item_type = base_id;
                }
                _ => def.base = base_id,
            }
            def.derivation = Some(derivation);
            if let Some(id) = arena.add(Component::Type(def)) {
                types.insert(name, id);
            }
        }

        Self { types }
    }

    /// Built-in type by local name
    pub fn get(&self, local_name: &str) -> Option<ComponentId> {
        self.types.get(local_name).copied()
    }

    /// `xs:anyType`
    pub fn any_type(&self) -> Option<ComponentId> {
        self.get("anyType")
    }

    /// `xs:anySimpleType`
    pub fn any_simple_type(&self) -> Option<ComponentId> {
        self.get("anySimpleType")
    }

    /// Number of built-in types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing was installed
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
