//! Attribute descriptor tables
//!
//! For every schema construct (and, for local `element` and `attribute`,
//! for the `ref`/`name` variants) the table names the attributes the
//! construct may carry, how each value is decoded, which output slot it
//! lands in, and the value used when it is absent.
//!
//! The table is built once with [`AttributeTable::new`] and shared
//! read-only, usually behind an `Arc`.

use crate::namespaces::{NamespaceUri, ResolvedQName};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// `extension` bit of a derivation set
pub const DERIVATION_EXTENSION: u8 = 1;
/// `restriction` bit of a derivation set
pub const DERIVATION_RESTRICTION: u8 = 2;
/// `substitution` bit of a derivation set
pub const DERIVATION_SUBSTITUTION: u8 = 4;
/// `union` bit of a derivation set
pub const DERIVATION_UNION: u8 = 8;
/// `list` bit of a derivation set
pub const DERIVATION_LIST: u8 = 16;

/// Containers at or below this size are scanned linearly
const INDEX_THRESHOLD: usize = 5;

/// Output slot of a decoded attribute
///
/// One slot per attribute kind across the whole schema language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attr {
    /// `abstract`
    Abstract,
    /// `attributeFormDefault`
    AttributeFormDefault,
    /// `base`
    Base,
    /// `block`
    Block,
    /// `blockDefault`
    BlockDefault,
    /// `default`
    Default,
    /// `elementFormDefault`
    ElementFormDefault,
    /// `final`
    Final,
    /// `finalDefault`
    FinalDefault,
    /// `fixed`
    Fixed,
    /// `form`
    Form,
    /// `id`
    Id,
    /// `itemType`
    ItemType,
    /// `maxOccurs`
    MaxOccurs,
    /// `memberTypes`
    MemberTypes,
    /// `minOccurs`
    MinOccurs,
    /// `mixed`
    Mixed,
    /// `name`
    Name,
    /// `namespace`
    Namespace,
    /// `nillable`
    Nillable,
    /// `processContents`
    ProcessContents,
    /// `public`
    Public,
    /// `ref`
    Ref,
    /// `refer`
    Refer,
    /// `schemaLocation`
    SchemaLocation,
    /// `source`
    Source,
    /// `substitutionGroup`
    SubstitutionGroup,
    /// `system`
    System,
    /// `targetNamespace`
    TargetNamespace,
    /// `type`
    Type,
    /// `use`
    Use,
    /// `value`
    Value,
    /// `version`
    Version,
    /// `xml:lang`
    XmlLang,
    /// `xpath`
    XPath,
}

impl Attr {
    /// Number of slots in a value record
    pub const COUNT: usize = 35;

    /// Slot index
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this slot in a from-default mask
    pub const fn bit(self) -> u64 {
        1 << (self as u32)
    }
}

/// How an attribute value is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// `xs:anyURI`
    AnyUri,
    /// `xs:ID`
    Id,
    /// `xs:QName`
    QName,
    /// `xs:string`, kept verbatim
    String,
    /// `xs:token`
    Token,
    /// `xs:NCName`
    NcName,
    /// Selector XPath, kept verbatim
    XPath,
    /// Field XPath, kept verbatim
    XPath1,
    /// `xs:language`
    Language,
    /// `true | false | 1 | 0`
    Boolean,
    /// `xs:nonNegativeInteger`
    NonNegativeInteger,
    /// `xs:positiveInteger`
    PositiveInteger,
    /// `#all | List of (extension | restriction | substitution)`
    Block,
    /// `#all | List of (extension | restriction)` on complexType
    Block1,
    /// `#all | List of (extension | restriction)`
    Final,
    /// `#all | List of (list | union | restriction)`
    Final1,
    /// `#all | List of (extension | restriction | list | union)`
    Final2,
    /// `qualified | unqualified`
    Form,
    /// `nonNegativeInteger | unbounded`
    MaxOccurs,
    /// `1`
    MaxOccurs1,
    /// List of QName
    MemberTypes,
    /// `0 | 1`
    MinOccurs1,
    /// `##any | ##other | List of (anyURI | ##targetNamespace | ##local)`
    Namespace,
    /// `lax | skip | strict`
    ProcessContents,
    /// `optional | prohibited | required`
    Use,
    /// `preserve | replace | collapse`
    WhiteSpace,
}

/// Element and attribute `form`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Form {
    /// Local names are in the target namespace
    Qualified,
    /// Local names are in no namespace
    #[default]
    Unqualified,
}

impl Form {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }
}

/// Wildcard `processContents`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// Validate strictly
    #[default]
    Strict,
    /// Validate if a declaration is found
    Lax,
    /// Skip validation
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Attribute `use`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    /// May appear
    #[default]
    Optional,
    /// Must appear
    Required,
    /// Must not appear
    Prohibited,
}

impl AttributeUse {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }
}

/// Facet `whiteSpace` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    /// Keep as is
    Preserve,
    /// Replace tab/newline/CR with space
    Replace,
    /// Replace, then collapse runs and trim
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(Self::Preserve),
            "replace" => Some(Self::Replace),
            "collapse" => Some(Self::Collapse),
            _ => None,
        }
    }
}

/// Decoded wildcard `namespace` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `##any`
    Any,
    /// `##other`: excluded namespaces (target namespace and absent)
    Not(Vec<Option<NamespaceUri>>),
    /// Explicit list, de-duplicated in first-seen order (`None` is `##local`)
    List(Vec<Option<NamespaceUri>>),
}

impl NamespaceConstraint {
    /// Whether `namespace` is allowed
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Not(excluded) => !excluded.iter().any(|ns| ns.as_deref() == namespace),
            Self::List(allowed) => allowed.iter().any(|ns| ns.as_deref() == namespace),
        }
    }
}

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// String-like value (string, ID, token, NCName, anyURI, language, XPath)
    String(String),
    /// Boolean
    Boolean(bool),
    /// Non-negative integer (occurrence counts, facet values)
    Integer(u32),
    /// `maxOccurs="unbounded"`
    Unbounded,
    /// Derivation bit set
    DerivationSet(u8),
    /// `form` value
    Form(Form),
    /// Resolved QName
    QName(ResolvedQName),
    /// List of resolved QNames
    QNames(Vec<ResolvedQName>),
    /// Wildcard namespace constraint
    NamespaceConstraint(NamespaceConstraint),
    /// Wildcard processContents
    ProcessContents(ProcessContents),
    /// Attribute use
    Use(AttributeUse),
    /// whiteSpace facet value
    WhiteSpace(WhiteSpace),
}

/// One legal attribute of a construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Attribute name as written (`xml:lang` for the xml-namespace attribute)
    pub name: &'static str,
    /// Decoder
    pub datatype: Datatype,
    /// Output slot
    pub slot: Attr,
    /// Value applied when absent
    pub default: Option<AttrValue>,
}

fn desc(name: &'static str, datatype: Datatype, slot: Attr) -> AttributeDescriptor {
    AttributeDescriptor {
        name,
        datatype,
        slot,
        default: None,
    }
}

fn desc_default(
    name: &'static str,
    datatype: Datatype,
    slot: Attr,
    default: AttrValue,
) -> AttributeDescriptor {
    AttributeDescriptor {
        name,
        datatype,
        slot,
        default: Some(default),
    }
}

/// The legal attributes of one construct
///
/// Small containers are searched linearly; larger ones keep a hash index.
#[derive(Debug, Clone)]
pub struct AttributeContainer {
    descriptors: Vec<AttributeDescriptor>,
    index: Option<HashMap<&'static str, usize>>,
}

impl AttributeContainer {
    /// Build a container, choosing the lookup strategy from its size
    pub fn new(descriptors: Vec<AttributeDescriptor>) -> Self {
        let index = (descriptors.len() > INDEX_THRESHOLD).then(|| {
            descriptors
                .iter()
                .enumerate()
                .map(|(i, d)| (d.name, i))
                .collect()
        });
        Self { descriptors, index }
    }

    /// Find the descriptor for `name`
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        match &self.index {
            Some(index) => index.get(name).map(|&i| &self.descriptors[i]),
            None => self.descriptors.iter().find(|d| d.name == name),
        }
    }

    /// All descriptors in declaration order
    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    /// Whether lookups go through the hash index
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Number of legal attributes
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the construct takes no attributes
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Descriptor tables for every construct of the schema language
#[derive(Debug, Clone)]
pub struct AttributeTable {
    global: HashMap<&'static str, Arc<AttributeContainer>>,
    local: HashMap<&'static str, Arc<AttributeContainer>>,
}

impl AttributeTable {
    /// Build the tables
    pub fn new() -> Self {
        use Attr as A;
        use Datatype as D;

        let bool_false = || AttrValue::Boolean(false);
        let one = || AttrValue::Integer(1);
        let id = || desc("id", D::Id, A::Id);
        let name = || desc("name", D::NcName, A::Name);
        let container = |d: Vec<AttributeDescriptor>| Arc::new(AttributeContainer::new(d));

        let mut global = HashMap::new();
        let mut local = HashMap::new();

        global.insert(
            "attribute",
            container(vec![
                desc("default", D::String, A::Default),
                desc("fixed", D::String, A::Fixed),
                id(),
                name(),
                desc("type", D::QName, A::Type),
            ]),
        );
        local.insert(
            "attribute_n",
            container(vec![
                desc("default", D::String, A::Default),
                desc("fixed", D::String, A::Fixed),
                desc("form", D::Form, A::Form),
                id(),
                name(),
                desc("type", D::QName, A::Type),
                desc_default("use", D::Use, A::Use, AttrValue::Use(AttributeUse::Optional)),
            ]),
        );
        local.insert(
            "attribute_r",
            container(vec![
                desc("default", D::String, A::Default),
                desc("fixed", D::String, A::Fixed),
                id(),
                desc("ref", D::QName, A::Ref),
                desc_default("use", D::Use, A::Use, AttrValue::Use(AttributeUse::Optional)),
            ]),
        );

        global.insert(
            "element",
            container(vec![
                desc_default("abstract", D::Boolean, A::Abstract, bool_false()),
                desc("block", D::Block, A::Block),
                desc("default", D::String, A::Default),
                desc("final", D::Final, A::Final),
                desc("fixed", D::String, A::Fixed),
                id(),
                name(),
                desc_default("nillable", D::Boolean, A::Nillable, bool_false()),
                desc("substitutionGroup", D::QName, A::SubstitutionGroup),
                desc("type", D::QName, A::Type),
            ]),
        );
        local.insert(
            "element_n",
            container(vec![
                desc("block", D::Block, A::Block),
                desc("default", D::String, A::Default),
                desc("fixed", D::String, A::Fixed),
                desc("form", D::Form, A::Form),
                id(),
                desc_default("maxOccurs", D::MaxOccurs, A::MaxOccurs, one()),
                desc_default("minOccurs", D::NonNegativeInteger, A::MinOccurs, one()),
                name(),
                desc_default("nillable", D::Boolean, A::Nillable, bool_false()),
                desc("type", D::QName, A::Type),
            ]),
        );
        local.insert(
            "element_r",
            container(vec![
                id(),
                desc_default("maxOccurs", D::MaxOccurs, A::MaxOccurs, one()),
                desc_default("minOccurs", D::NonNegativeInteger, A::MinOccurs, one()),
                desc("ref", D::QName, A::Ref),
            ]),
        );

        global.insert(
            "complexType",
            container(vec![
                desc_default("abstract", D::Boolean, A::Abstract, bool_false()),
                desc("block", D::Block1, A::Block),
                desc("final", D::Final, A::Final),
                id(),
                desc_default("mixed", D::Boolean, A::Mixed, bool_false()),
                name(),
            ]),
        );
        global.insert(
            "notation",
            container(vec![
                id(),
                name(),
                desc("public", D::Token, A::Public),
                desc("system", D::AnyUri, A::System),
            ]),
        );
        local.insert(
            "complexType",
            container(vec![
                id(),
                desc_default("mixed", D::Boolean, A::Mixed, bool_false()),
            ]),
        );
        local.insert("simpleContent", container(vec![id()]));
        local.insert(
            "restriction",
            container(vec![desc("base", D::QName, A::Base), id()]),
        );
        local.insert(
            "extension",
            container(vec![desc("base", D::QName, A::Base), id()]),
        );
        local.insert(
            "attributeGroup",
            container(vec![id(), desc("ref", D::QName, A::Ref)]),
        );
        local.insert(
            "anyAttribute",
            container(vec![
                id(),
                desc_default(
                    "namespace",
                    D::Namespace,
                    A::Namespace,
                    AttrValue::NamespaceConstraint(NamespaceConstraint::Any),
                ),
                desc_default(
                    "processContents",
                    D::ProcessContents,
                    A::ProcessContents,
                    AttrValue::ProcessContents(ProcessContents::Strict),
                ),
            ]),
        );
        local.insert(
            "complexContent",
            container(vec![id(), desc("mixed", D::Boolean, A::Mixed)]),
        );

        global.insert("attributeGroup", container(vec![id(), name()]));
        global.insert("group", container(vec![id(), name()]));
        local.insert(
            "group",
            container(vec![
                id(),
                desc_default("maxOccurs", D::MaxOccurs, A::MaxOccurs, one()),
                desc_default("minOccurs", D::NonNegativeInteger, A::MinOccurs, one()),
                desc("ref", D::QName, A::Ref),
            ]),
        );
        local.insert(
            "all",
            container(vec![
                id(),
                desc_default("maxOccurs", D::MaxOccurs1, A::MaxOccurs, one()),
                desc_default("minOccurs", D::MinOccurs1, A::MinOccurs, one()),
            ]),
        );
        let compositor = container(vec![
            id(),
            desc_default("maxOccurs", D::MaxOccurs, A::MaxOccurs, one()),
            desc_default("minOccurs", D::NonNegativeInteger, A::MinOccurs, one()),
        ]);
        local.insert("choice", Arc::clone(&compositor));
        local.insert("sequence", compositor);
        local.insert(
            "any",
            container(vec![
                id(),
                desc_default("maxOccurs", D::MaxOccurs, A::MaxOccurs, one()),
                desc_default("minOccurs", D::NonNegativeInteger, A::MinOccurs, one()),
                desc_default(
                    "namespace",
                    D::Namespace,
                    A::Namespace,
                    AttrValue::NamespaceConstraint(NamespaceConstraint::Any),
                ),
                desc_default(
                    "processContents",
                    D::ProcessContents,
                    A::ProcessContents,
                    AttrValue::ProcessContents(ProcessContents::Strict),
                ),
            ]),
        );

        let unique = container(vec![id(), name()]);
        local.insert("unique", Arc::clone(&unique));
        local.insert("key", unique);
        local.insert(
            "keyref",
            container(vec![id(), name(), desc("refer", D::QName, A::Refer)]),
        );
        local.insert(
            "selector",
            container(vec![id(), desc("xpath", D::XPath, A::XPath)]),
        );
        local.insert(
            "field",
            container(vec![id(), desc("xpath", D::XPath1, A::XPath)]),
        );

        let annotation = container(vec![id()]);
        global.insert("annotation", Arc::clone(&annotation));
        local.insert("annotation", annotation);
        let appinfo = container(vec![desc("source", D::AnyUri, A::Source)]);
        global.insert("appinfo", Arc::clone(&appinfo));
        local.insert("appinfo", appinfo);
        let documentation = container(vec![
            desc("source", D::AnyUri, A::Source),
            desc("xml:lang", D::Language, A::XmlLang),
        ]);
        global.insert("documentation", Arc::clone(&documentation));
        local.insert("documentation", documentation);

        global.insert(
            "simpleType",
            container(vec![desc("final", D::Final1, A::Final), id(), name()]),
        );
        local.insert(
            "simpleType",
            container(vec![desc("final", D::Final1, A::Final), id()]),
        );
        local.insert(
            "list",
            container(vec![id(), desc("itemType", D::QName, A::ItemType)]),
        );
        local.insert(
            "union",
            container(vec![id(), desc("memberTypes", D::MemberTypes, A::MemberTypes)]),
        );

        global.insert(
            "schema",
            container(vec![
                desc_default(
                    "attributeFormDefault",
                    D::Form,
                    A::AttributeFormDefault,
                    AttrValue::Form(Form::Unqualified),
                ),
                desc_default(
                    "blockDefault",
                    D::Block,
                    A::BlockDefault,
                    AttrValue::DerivationSet(0),
                ),
                desc_default(
                    "elementFormDefault",
                    D::Form,
                    A::ElementFormDefault,
                    AttrValue::Form(Form::Unqualified),
                ),
                desc_default(
                    "finalDefault",
                    D::Final2,
                    A::FinalDefault,
                    AttrValue::DerivationSet(0),
                ),
                id(),
                desc("targetNamespace", D::AnyUri, A::TargetNamespace),
                desc("version", D::Token, A::Version),
                desc("xml:lang", D::Language, A::XmlLang),
            ]),
        );
        let include = container(vec![id(), desc("schemaLocation", D::AnyUri, A::SchemaLocation)]);
        global.insert("include", Arc::clone(&include));
        global.insert("redefine", include);
        global.insert(
            "import",
            container(vec![
                id(),
                desc("namespace", D::AnyUri, A::Namespace),
                desc("schemaLocation", D::AnyUri, A::SchemaLocation),
            ]),
        );

        let fixed = || desc_default("fixed", D::Boolean, A::Fixed, bool_false());
        let length = container(vec![
            id(),
            desc("value", D::NonNegativeInteger, A::Value),
            fixed(),
        ]);
        for facet in ["length", "minLength", "maxLength", "fractionDigits"] {
            local.insert(facet, Arc::clone(&length));
        }
        local.insert(
            "totalDigits",
            container(vec![id(), desc("value", D::PositiveInteger, A::Value), fixed()]),
        );
        let pattern = container(vec![id(), desc("value", D::String, A::Value)]);
        local.insert("pattern", Arc::clone(&pattern));
        local.insert("enumeration", pattern);
        local.insert(
            "whiteSpace",
            container(vec![id(), desc("value", D::WhiteSpace, A::Value), fixed()]),
        );
        let bound = container(vec![id(), desc("value", D::String, A::Value), fixed()]);
        for facet in ["maxInclusive", "maxExclusive", "minInclusive", "minExclusive"] {
            local.insert(facet, Arc::clone(&bound));
        }

        Self { global, local }
    }

    /// Descriptor container for a construct
    ///
    /// `is_global` selects the table for children of `<schema>`/`<redefine>`.
    /// Local `element` and `attribute` pick their variant by whether a `ref`
    /// attribute is present.
    pub fn lookup(
        &self,
        construct: &str,
        is_global: bool,
        has_ref: bool,
    ) -> Option<&AttributeContainer> {
        if is_global {
            return self.global.get(construct).map(|c| c.as_ref());
        }
        let key = match (construct, has_ref) {
            ("element", true) => "element_r",
            ("element", false) => "element_n",
            ("attribute", true) => "attribute_r",
            ("attribute", false) => "attribute_n",
            (other, _) => other,
        };
        self.local.get(key).map(|c| c.as_ref())
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}
