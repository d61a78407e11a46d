//! Schema components produced by traversal
//!
//! Components, particles and model groups live in separate arenas owned by
//! [`ComponentArena`] and refer to each other by ID, so mutually recursive
//! declarations need no shared ownership.

use super::attribute_table::{NamespaceConstraint, ProcessContents};
use crate::diagnostics::SourceLocation;
use crate::ids::{ComponentId, ModelGroupId, ParticleId};
use crate::namespaces::QName;
use serde::Serialize;
use std::fmt;

/// The seven independent symbol spaces of a grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolSpace {
    /// Global attribute declarations
    Attribute,
    /// Attribute group definitions
    AttributeGroup,
    /// Global element declarations
    Element,
    /// Model group definitions
    Group,
    /// Identity constraints (key, unique, keyref)
    IdentityConstraint,
    /// Notation declarations
    Notation,
    /// Simple and complex type definitions
    Type,
}

impl SymbolSpace {
    /// Every symbol space, in table order
    pub const ALL: [SymbolSpace; 7] = [
        SymbolSpace::Attribute,
        SymbolSpace::AttributeGroup,
        SymbolSpace::Element,
        SymbolSpace::Group,
        SymbolSpace::IdentityConstraint,
        SymbolSpace::Notation,
        SymbolSpace::Type,
    ];

    /// Position in [`SymbolSpace::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Symbol space of a top-level schema construct
    pub fn of_construct(local_name: &str) -> Option<Self> {
        match local_name {
            "attribute" => Some(Self::Attribute),
            "attributeGroup" => Some(Self::AttributeGroup),
            "element" => Some(Self::Element),
            "group" => Some(Self::Group),
            "key" | "keyref" | "unique" => Some(Self::IdentityConstraint),
            "notation" => Some(Self::Notation),
            "complexType" | "simpleType" => Some(Self::Type),
            _ => None,
        }
    }

    /// Component kind used in resolution diagnostics
    pub fn label(self) -> &'static str {
        match self {
            Self::Attribute => "attribute declaration",
            Self::AttributeGroup => "attribute group",
            Self::Element => "element declaration",
            Self::Group => "group",
            Self::IdentityConstraint => "identity constraint",
            Self::Notation => "notation",
            Self::Type => "type definition",
        }
    }
}

impl fmt::Display for SymbolSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Element declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    /// Expanded name
    pub name: QName,
    /// Declared at the top level of a schema
    pub global: bool,
    /// Type definition, once resolved
    pub type_definition: Option<ComponentId>,
    /// Substitution group head
    pub substitution_group: Option<ComponentId>,
    /// `nillable`
    pub nillable: bool,
    /// `abstract`
    pub is_abstract: bool,
    /// `block` derivation set
    pub block: u8,
    /// `final` derivation set
    pub final_set: u8,
    /// `default` value constraint
    pub default: Option<String>,
    /// `fixed` value constraint
    pub fixed: Option<String>,
    /// Identity constraints scoped to this element
    pub identity_constraints: Vec<ComponentId>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// Attribute declaration
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    /// Expanded name
    pub name: QName,
    /// Declared at the top level of a schema
    pub global: bool,
    /// Simple type definition, once resolved
    pub type_definition: Option<ComponentId>,
    /// `default` value constraint
    pub default: Option<String>,
    /// `fixed` value constraint
    pub fixed: Option<String>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// A use of an attribute declaration inside a type or attribute group
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUse {
    /// The attribute declaration
    pub declaration: ComponentId,
    /// `use="required"`
    pub required: bool,
    /// `use="prohibited"`
    pub prohibited: bool,
}

/// Attribute or element wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Allowed namespaces
    pub namespace: NamespaceConstraint,
    /// Validation strictness
    pub process_contents: ProcessContents,
}

/// How a type was derived from its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Derivation {
    /// Derivation by extension
    Extension,
    /// Derivation by restriction
    Restriction,
    /// List type
    List,
    /// Union type
    Union,
}

/// Simple or complex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Simple type definition
    Simple,
    /// Complex type definition
    Complex,
}

/// Simple or complex type definition
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Expanded name; `None` for anonymous types
    pub name: Option<QName>,
    /// Simple or complex
    pub kind: TypeKind,
    /// One of the built-in XSD types
    pub builtin: bool,
    /// Base type definition
    pub base: Option<ComponentId>,
    /// Derivation method from `base`
    pub derivation: Option<Derivation>,
    /// Item type of a list
    pub item_type: Option<ComponentId>,
    /// Member types of a union
    pub member_types: Vec<ComponentId>,
    /// `mixed` content
    pub mixed: bool,
    /// Content model particle
    pub content: Option<ParticleId>,
    /// Attribute uses
    pub attribute_uses: Vec<AttributeUse>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<ComponentId>,
    /// Attribute wildcard
    pub attribute_wildcard: Option<Wildcard>,
    /// `block` derivation set
    pub block: u8,
    /// `final` derivation set
    pub final_set: u8,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

impl TypeDef {
    /// Empty definition of the given kind
    pub fn new(name: Option<QName>, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            builtin: false,
            base: None,
            derivation: None,
            item_type: None,
            member_types: Vec::new(),
            mixed: false,
            content: None,
            attribute_uses: Vec::new(),
            attribute_groups: Vec::new(),
            attribute_wildcard: None,
            block: 0,
            final_set: 0,
            source: None,
        }
    }
}

/// Named model group definition
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
    /// Expanded name
    pub name: QName,
    /// The group's compositor
    pub model_group: Option<ModelGroupId>,
    /// Original group this one restricts by redefinition
    pub redefines: Option<ComponentId>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// Attribute group definition
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroupDef {
    /// Expanded name
    pub name: QName,
    /// Attribute uses
    pub attribute_uses: Vec<AttributeUse>,
    /// Referenced attribute groups
    pub attribute_groups: Vec<ComponentId>,
    /// Attribute wildcard
    pub attribute_wildcard: Option<Wildcard>,
    /// Original group this one restricts by redefinition
    pub redefines: Option<ComponentId>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// Identity constraint category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityCategory {
    /// `<key>`
    Key,
    /// `<unique>`
    Unique,
    /// `<keyref>`
    KeyRef,
}

/// Key, unique or keyref
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConstraint {
    /// Expanded name
    pub name: QName,
    /// Category
    pub category: IdentityCategory,
    /// Selector XPath
    pub selector: Option<String>,
    /// Field XPaths
    pub fields: Vec<String>,
    /// Referenced key of a keyref
    pub refer: Option<ComponentId>,
    /// Element declaration the constraint belongs to
    pub element: Option<ComponentId>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// Notation declaration
#[derive(Debug, Clone, PartialEq)]
pub struct NotationDecl {
    /// Expanded name
    pub name: QName,
    /// Public identifier
    pub public: Option<String>,
    /// System identifier
    pub system: Option<String>,
    /// Declaring element
    pub source: Option<SourceLocation>,
}

/// A schema component
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// Element declaration
    Element(ElementDecl),
    /// Attribute declaration
    Attribute(AttributeDecl),
    /// Type definition
    Type(TypeDef),
    /// Model group definition
    Group(GroupDef),
    /// Attribute group definition
    AttributeGroup(AttributeGroupDef),
    /// Identity constraint
    IdentityConstraint(IdentityConstraint),
    /// Notation
    Notation(NotationDecl),
}

impl Component {
    /// Expanded name, if the component is named
    pub fn name(&self) -> Option<&QName> {
        match self {
            Component::Element(e) => Some(&e.name),
            Component::Attribute(a) => Some(&a.name),
            Component::Type(t) => t.name.as_ref(),
            Component::Group(g) => Some(&g.name),
            Component::AttributeGroup(g) => Some(&g.name),
            Component::IdentityConstraint(c) => Some(&c.name),
            Component::Notation(n) => Some(&n.name),
        }
    }

    /// Symbol space a global component of this kind is registered in
    pub fn symbol_space(&self) -> SymbolSpace {
        match self {
            Component::Element(_) => SymbolSpace::Element,
            Component::Attribute(_) => SymbolSpace::Attribute,
            Component::Type(_) => SymbolSpace::Type,
            Component::Group(_) => SymbolSpace::Group,
            Component::AttributeGroup(_) => SymbolSpace::AttributeGroup,
            Component::IdentityConstraint(_) => SymbolSpace::IdentityConstraint,
            Component::Notation(_) => SymbolSpace::Notation,
        }
    }

    /// Where the component was declared
    pub fn source(&self) -> Option<&SourceLocation> {
        match self {
            Component::Element(e) => e.source.as_ref(),
            Component::Attribute(a) => a.source.as_ref(),
            Component::Type(t) => t.source.as_ref(),
            Component::Group(g) => g.source.as_ref(),
            Component::AttributeGroup(g) => g.source.as_ref(),
            Component::IdentityConstraint(c) => c.source.as_ref(),
            Component::Notation(n) => n.source.as_ref(),
        }
    }
}

/// Compositor of a model group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compositor {
    /// `<all>`
    All,
    /// `<choice>`
    Choice,
    /// `<sequence>`
    Sequence,
}

impl Compositor {
    /// Compositor named by a schema element
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Self::All),
            "choice" => Some(Self::Choice),
            "sequence" => Some(Self::Sequence),
            _ => None,
        }
    }
}

/// Model group: a compositor over particles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    /// Compositor
    pub compositor: Compositor,
    /// Member particles in order
    pub particles: Vec<ParticleId>,
}

/// What a particle ranges over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Nothing; the particle matches no content
    Empty,
    /// Element declaration
    Element(ComponentId),
    /// Element wildcard
    Wildcard(Wildcard),
    /// Nested model group
    ModelGroup(ModelGroupId),
}

/// Occurrence-constrained term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    /// `minOccurs`
    pub min_occurs: u32,
    /// `maxOccurs`; `None` is unbounded
    pub max_occurs: Option<u32>,
    /// The term
    pub term: Term,
}

impl Particle {
    /// A particle with no term yet
    pub fn placeholder(min_occurs: u32) -> Self {
        Self {
            min_occurs,
            max_occurs: Some(1),
            term: Term::Empty,
        }
    }

    /// Whether the particle can only match nothing
    pub fn is_empty(&self) -> bool {
        matches!(self.term, Term::Empty) || self.max_occurs == Some(0)
    }
}

/// Arenas holding every component built in a handler
#[derive(Debug, Clone, Default)]
pub struct ComponentArena {
    components: Vec<Component>,
    particles: Vec<Particle>,
    model_groups: Vec<ModelGroup>,
}

impl ComponentArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a component
    pub fn add(&mut self, component: Component) -> Option<ComponentId> {
        let id = ComponentId::from_index(self.components.len())?;
        self.components.push(component);
        Some(id)
    }

    /// Component by ID
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.to_index())
    }

    /// Mutable component by ID
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(id.to_index())
    }

    /// Element declaration by ID
    pub fn element(&self, id: ComponentId) -> Option<&ElementDecl> {
        match self.get(id) {
            Some(Component::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Type definition by ID
    pub fn type_definition(&self, id: ComponentId) -> Option<&TypeDef> {
        match self.get(id) {
            Some(Component::Type(t)) => Some(t),
            _ => None,
        }
    }

    /// Model group definition by ID
    pub fn group(&self, id: ComponentId) -> Option<&GroupDef> {
        match self.get(id) {
            Some(Component::Group(g)) => Some(g),
            _ => None,
        }
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component was stored
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All components with their IDs
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(i, c)| ComponentId::from_index(i).map(|id| (id, c)))
    }

    /// Store a particle
    pub fn add_particle(&mut self, particle: Particle) -> Option<ParticleId> {
        let id = ParticleId::from_index(self.particles.len())?;
        self.particles.push(particle);
        Some(id)
    }

    /// Particle by ID
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.to_index())
    }

    /// Mutable particle by ID
    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id.to_index())
    }

    /// Store a model group
    pub fn add_model_group(&mut self, group: ModelGroup) -> Option<ModelGroupId> {
        let id = ModelGroupId::from_index(self.model_groups.len())?;
        self.model_groups.push(group);
        Some(id)
    }

    /// Model group by ID
    pub fn model_group(&self, id: ModelGroupId) -> Option<&ModelGroup> {
        self.model_groups.get(id.to_index())
    }

    /// Mutable model group by ID
    pub fn model_group_mut(&mut self, id: ModelGroupId) -> Option<&mut ModelGroup> {
        self.model_groups.get_mut(id.to_index())
    }

    /// Top-level model group of a complex type or group definition
    pub fn content_model(&self, owner: ComponentId) -> Option<ModelGroupId> {
        match self.get(owner)? {
            Component::Type(t) => match self.particle(t.content?)?.term {
                Term::ModelGroup(group) => Some(group),
                _ => None,
            },
            Component::Group(g) => g.model_group,
            _ => None,
        }
    }

    /// Remove `particle` from `group` or any model group nested in it
    ///
    /// Returns whether the particle was found.
    pub fn remove_particle(&mut self, group: ModelGroupId, particle: ParticleId) -> bool {
        let Some(members) = self.model_group(group).map(|g| g.particles.clone()) else {
            return false;
        };
        for (i, member) in members.iter().enumerate() {
            if *member == particle {
                if let Some(g) = self.model_group_mut(group) {
                    g.particles.remove(i);
                }
                return true;
            }
            let nested = match self.particle(*member).map(|p| &p.term) {
                Some(Term::ModelGroup(nested)) => *nested,
                _ => continue,
            };
            if self.remove_particle(nested, particle) {
                return true;
            }
        }
        false
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.components.clear();
        self.particles.clear();
        self.model_groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(arena: &mut ComponentArena, name: &str) -> ComponentId {
        arena
            .add(Component::Element(ElementDecl {
                name: QName::local(name),
                global: false,
                type_definition: None,
                substitution_group: None,
                nillable: false,
                is_abstract: false,
                block: 0,
                final_set: 0,
                default: None,
                fixed: None,
                identity_constraints: Vec::new(),
                source: None,
            }))
            .unwrap()
    }

    #[test]
    fn test_symbol_space_of_construct() {
        assert_eq!(SymbolSpace::of_construct("simpleType"), Some(SymbolSpace::Type));
        assert_eq!(SymbolSpace::of_construct("complexType"), Some(SymbolSpace::Type));
        assert_eq!(SymbolSpace::of_construct("keyref"), Some(SymbolSpace::IdentityConstraint));
        assert_eq!(SymbolSpace::of_construct("import"), None);
        for (i, space) in SymbolSpace::ALL.iter().enumerate() {
            assert_eq!(space.index(), i);
        }
    }

    #[test]
    fn test_remove_nested_particle() {
        let mut arena = ComponentArena::new();
        let a = element(&mut arena, "a");
        let pa = arena
            .add_particle(Particle {
                min_occurs: 1,
                max_occurs: Some(1),
                term: Term::Element(a),
            })
            .unwrap();
        let empty = arena.add_particle(Particle::placeholder(0)).unwrap();
        let inner = arena
            .add_model_group(ModelGroup {
                compositor: Compositor::Choice,
                particles: vec![empty],
            })
            .unwrap();
        let pinner = arena
            .add_particle(Particle {
                min_occurs: 1,
                max_occurs: Some(1),
                term: Term::ModelGroup(inner),
            })
            .unwrap();
        let outer = arena
            .add_model_group(ModelGroup {
                compositor: Compositor::Sequence,
                particles: vec![pa, pinner],
            })
            .unwrap();

        assert!(arena.remove_particle(outer, empty));
        assert!(arena.model_group(inner).unwrap().particles.is_empty());
        assert_eq!(arena.model_group(outer).unwrap().particles, vec![pa, pinner]);
        assert!(!arena.remove_particle(outer, empty));
    }

    #[test]
    fn test_content_model_of_group() {
        let mut arena = ComponentArena::new();
        let mg = arena
            .add_model_group(ModelGroup {
                compositor: Compositor::All,
                particles: vec![],
            })
            .unwrap();
        let g = arena
            .add(Component::Group(GroupDef {
                name: QName::local("g"),
                model_group: Some(mg),
                redefines: None,
                source: None,
            }))
            .unwrap();
        assert_eq!(arena.content_model(g), Some(mg));
        assert_eq!(arena.get(g).unwrap().symbol_space(), SymbolSpace::Group);
        assert_eq!(arena.iter().count(), 1);
    }
}
