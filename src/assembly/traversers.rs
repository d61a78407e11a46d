//! Construct traversers
//!
//! [`ComponentTraverser`] is the seam between the assembly passes and the
//! per-construct traversal that turns schema elements into components. The
//! passes only decide *when* something is traversed; a traverser decides
//! what it becomes, calling back into [`SchemaHandler::resolve_global`] for
//! references and into the deferred queue for local elements and keyrefs.
//!
//! [`StructuralTraverser`] builds the component graph (declarations, type
//! hierarchy, content-model particles, attribute uses, identity constraints)
//! without any derivation or content-model validity checking.

use super::attribute_table::{Attr, AttributeUse as UseKind, Form, NamespaceConstraint, ProcessContents};
use super::components::{
    AttributeDecl, AttributeGroupDef, AttributeUse, Component, Compositor, Derivation, ElementDecl, GroupDef,
    IdentityCategory, IdentityConstraint, ModelGroup, NotationDecl, Particle, SymbolSpace, Term, TypeDef, TypeKind,
    Wildcard,
};
use super::deferred::{AllContext, DeferredKeyRef, DeferredLocalElement};
use super::handler::SchemaHandler;
use crate::documents::ElementRef;
use crate::ids::{ComponentId, ModelGroupId, ParticleId};
use crate::namespaces::{QName, ResolvedQName};
use std::fmt;
use tracing::trace;

/// Turns schema elements into components
pub trait ComponentTraverser: fmt::Debug {
    /// Build the component for a top-level declaration
    ///
    /// The handler adds the returned component to the grammar.
    fn traverse_global(&self, handler: &mut SchemaHandler, space: SymbolSpace, element: ElementRef)
        -> Option<ComponentId>;

    /// Fill in the placeholder particle of a deferred local element
    fn traverse_local_element(&self, handler: &mut SchemaHandler, local: &DeferredLocalElement);

    /// Build a deferred `<keyref>`
    fn traverse_keyref(&self, handler: &mut SchemaHandler, keyref: &DeferredKeyRef);
}

/// Builds components without validity checks
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralTraverser;

impl ComponentTraverser for StructuralTraverser {
    fn traverse_global(
        &self,
        handler: &mut SchemaHandler,
        space: SymbolSpace,
        element: ElementRef,
    ) -> Option<ComponentId> {
        let construct = handler.local_name(element).to_string();
        trace!(%space, construct = construct.as_str(), "traversing global");
        match construct.as_str() {
            "element" => global_element(handler, element),
            "attribute" => global_attribute(handler, element),
            "complexType" => complex_type(handler, element, true),
            "simpleType" => simple_type(handler, element, true),
            "group" => group_definition(handler, element),
            "attributeGroup" => attribute_group_definition(handler, element),
            "notation" => notation(handler, element),
            _ => None,
        }
    }

    fn traverse_local_element(&self, handler: &mut SchemaHandler, local: &DeferredLocalElement) {
        fill_local_element(handler, local.particle, local.element, local.context);
    }

    fn traverse_keyref(&self, handler: &mut SchemaHandler, keyref: &DeferredKeyRef) {
        let Some(id) = identity_constraint(handler, keyref.element, keyref.owner, IdentityCategory::KeyRef) else {
            return;
        };
        handler.add_global(SymbolSpace::IdentityConstraint, keyref.element.document, id);
    }
}

fn type_mut(handler: &mut SchemaHandler, id: ComponentId) -> Option<&mut TypeDef> {
    match handler.components_mut().get_mut(id) {
        Some(Component::Type(t)) => Some(t),
        _ => None,
    }
}

fn element_mut(handler: &mut SchemaHandler, id: ComponentId) -> Option<&mut ElementDecl> {
    match handler.components_mut().get_mut(id) {
        Some(Component::Element(e)) => Some(e),
        _ => None,
    }
}

/// Name in the document's target namespace
fn global_name(handler: &SchemaHandler, element: ElementRef, local_name: &str) -> QName {
    QName::new(handler.target_namespace(element.document), local_name)
}

/// Name of a local declaration, qualified per `form` or the document default
fn local_name_with_form(handler: &SchemaHandler, element: ElementRef, local_name: &str, form: Option<Form>, attribute: bool) -> QName {
    let qualified = match form {
        Some(form) => form == Form::Qualified,
        None => handler.document(element.document).map_or(false, |d| {
            if attribute {
                d.attribute_form_qualified
            } else {
                d.element_form_qualified
            }
        }),
    };
    if qualified {
        global_name(handler, element, local_name)
    } else {
        QName::local(local_name)
    }
}

fn resolve(handler: &mut SchemaHandler, element: ElementRef, space: SymbolSpace, name: Option<ResolvedQName>) -> Option<ComponentId> {
    name.and_then(|name| handler.resolve_global(element, space, &name))
}

fn first_child_named(handler: &SchemaHandler, element: ElementRef, names: &[&str]) -> Option<ElementRef> {
    handler
        .content_children(element)
        .into_iter()
        .find(|c| names.contains(&handler.local_name(*c)))
}

/// `minOccurs` as written, for a placeholder particle
fn raw_min_occurs(handler: &SchemaHandler, element: ElementRef) -> u32 {
    handler
        .attribute(element, "minOccurs")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

fn global_element(handler: &mut SchemaHandler, element: ElementRef) -> Option<ComponentId> {
    let record = handler.check_attributes(element, true)?;
    let name = global_name(handler, element, record.str(Attr::Name)?);
    let (block_default, final_default) = handler
        .document(element.document)
        .map_or((0, 0), |d| (d.block_default, d.final_default));

    let declaration = ElementDecl {
        name,
        global: true,
        type_definition: None,
        substitution_group: None,
        nillable: record.bool(Attr::Nillable).unwrap_or(false),
        is_abstract: record.bool(Attr::Abstract).unwrap_or(false),
        block: record.derivation_set(Attr::Block).unwrap_or(block_default),
        final_set: record.derivation_set(Attr::Final).unwrap_or(final_default),
        default: record.str(Attr::Default).map(str::to_string),
        fixed: record.str(Attr::Fixed).map(str::to_string),
        identity_constraints: Vec::new(),
        source: handler.source_location(element),
    };
    let type_name = record.qname(Attr::Type).cloned();
    let head_name = record.qname(Attr::SubstitutionGroup).cloned();
    record.release();

    let id = handler.components_mut().add(Component::Element(declaration))?;
    let head = resolve(handler, element, SymbolSpace::Element, head_name);
    let mut type_definition = element_type(handler, element, type_name);
    if type_definition.is_none() {
        type_definition = head
            .and_then(|h| handler.components().element(h))
            .and_then(|h| h.type_definition)
            .or_else(|| handler.builtins().any_type());
    }
    if let Some(decl) = element_mut(handler, id) {
        decl.substitution_group = head;
        decl.type_definition = type_definition;
    }

    element_identity_constraints(handler, element, id);
    Some(id)
}

/// Declared or anonymous type of an `<element>`, `None` when it has neither
fn element_type(handler: &mut SchemaHandler, element: ElementRef, type_name: Option<ResolvedQName>) -> Option<ComponentId> {
    if type_name.is_some() {
        return resolve(handler, element, SymbolSpace::Type, type_name);
    }
    let anonymous = first_child_named(handler, element, &["complexType", "simpleType"])?;
    match handler.local_name(anonymous) {
        "complexType" => complex_type(handler, anonymous, false),
        _ => simple_type(handler, anonymous, false),
    }
}

fn element_identity_constraints(handler: &mut SchemaHandler, element: ElementRef, owner: ComponentId) {
    for child in handler.content_children(element) {
        let category = match handler.local_name(child) {
            "key" => IdentityCategory::Key,
            "unique" => IdentityCategory::Unique,
            "keyref" => {
                handler.store_keyref(child, owner);
                continue;
            }
            _ => continue,
        };
        if let Some(id) = identity_constraint(handler, child, owner, category) {
            register_identity_constraint(handler, child, id);
        }
    }
}

fn register_identity_constraint(handler: &mut SchemaHandler, element: ElementRef, id: ComponentId) {
    let Some(name) = handler.components().get(id).and_then(|c| c.name()).cloned() else {
        return;
    };
    handler.check_for_duplicate_names(SymbolSpace::IdentityConstraint, name, element);
    handler.add_global(SymbolSpace::IdentityConstraint, element.document, id);
}

fn identity_constraint(
    handler: &mut SchemaHandler,
    element: ElementRef,
    owner: ComponentId,
    category: IdentityCategory,
) -> Option<ComponentId> {
    let record = handler.check_attributes(element, false)?;
    let name = global_name(handler, element, record.str(Attr::Name)?);
    let refer_name = record.qname(Attr::Refer).cloned();
    record.release();

    let mut selector = None;
    let mut fields = Vec::new();
    for child in handler.content_children(element) {
        let kind = handler.local_name(child).to_string();
        let xpath = handler
            .check_attributes(child, false)
            .and_then(|r| r.str(Attr::XPath).map(str::to_string));
        match kind.as_str() {
            "selector" => selector = xpath,
            "field" => fields.extend(xpath),
            _ => {}
        }
    }

    let refer = match category {
        IdentityCategory::KeyRef => resolve(handler, element, SymbolSpace::IdentityConstraint, refer_name),
        _ => None,
    };
    let constraint = IdentityConstraint {
        name,
        category,
        selector,
        fields,
        refer,
        element: Some(owner),
        source: handler.source_location(element),
    };
    let id = handler.components_mut().add(Component::IdentityConstraint(constraint))?;
    if let Some(decl) = element_mut(handler, owner) {
        decl.identity_constraints.push(id);
    }
    Some(id)
}

/// Particle for an `<element>` inside a model group
///
/// While local elements are deferred this is a placeholder carrying only
/// `minOccurs`. Otherwise the element is traversed now and an empty
/// particle is dropped.
fn element_particle(handler: &mut SchemaHandler, element: ElementRef, context: AllContext, parent: ComponentId) -> Option<ParticleId> {
    let placeholder = Particle::placeholder(raw_min_occurs(handler, element));
    let particle = handler.components_mut().add_particle(placeholder)?;
    if handler.defers_local_elements() {
        handler.defer_local_element(particle, element, context, parent);
        return Some(particle);
    }
    fill_local_element(handler, particle, element, context);
    let empty = handler.components().particle(particle).map_or(true, Particle::is_empty);
    (!empty).then_some(particle)
}

fn fill_local_element(handler: &mut SchemaHandler, particle: ParticleId, element: ElementRef, context: AllContext) {
    let Some(record) = handler.check_attributes(element, false) else {
        return;
    };
    let mut min_occurs = record.min_occurs().unwrap_or(1);
    let mut max_occurs = record.max_occurs().unwrap_or(Some(1));
    trace!(?element, ?context, min_occurs, "filling local element");
    if context.inside_all_group && max_occurs != Some(1) && max_occurs != Some(0) {
        let label = occurs_label(max_occurs);
        let name = record.str(Attr::Name).or_else(|| handler.attribute(element, "ref")).unwrap_or_default().to_string();
        handler.report_error("cos-all-limited.2", &[&label, &name], Some(element));
        (min_occurs, max_occurs) = (min_occurs.min(1), Some(1));
    }

    let term = if let Some(reference) = record.qname(Attr::Ref).cloned() {
        record.release();
        handler
            .resolve_global(element, SymbolSpace::Element, &reference)
            .map_or(Term::Empty, Term::Element)
    } else {
        let Some(local_name) = record.str(Attr::Name).map(str::to_string) else {
            return;
        };
        let declaration = ElementDecl {
            name: local_name_with_form(handler, element, &local_name, record.form(Attr::Form), false),
            global: false,
            type_definition: None,
            substitution_group: None,
            nillable: record.bool(Attr::Nillable).unwrap_or(false),
            is_abstract: false,
            block: record.derivation_set(Attr::Block).unwrap_or_else(|| {
                handler.document(element.document).map_or(0, |d| d.block_default)
            }),
            final_set: 0,
            default: record.str(Attr::Default).map(str::to_string),
            fixed: record.str(Attr::Fixed).map(str::to_string),
            identity_constraints: Vec::new(),
            source: handler.source_location(element),
        };
        let type_name = record.qname(Attr::Type).cloned();
        record.release();

        match handler.components_mut().add(Component::Element(declaration)) {
            Some(id) => {
                let type_definition = element_type(handler, element, type_name).or_else(|| handler.builtins().any_type());
                if let Some(decl) = element_mut(handler, id) {
                    decl.type_definition = type_definition;
                }
                element_identity_constraints(handler, element, id);
                Term::Element(id)
            }
            None => Term::Empty,
        }
    };

    if let Some(p) = handler.components_mut().particle_mut(particle) {
        p.min_occurs = min_occurs;
        p.max_occurs = max_occurs;
        p.term = if max_occurs == Some(0) { Term::Empty } else { term };
    }
}

/// Particle for a nested `<all>`, `<choice>` or `<sequence>`
fn model_group_particle(handler: &mut SchemaHandler, element: ElementRef, context: AllContext, parent: ComponentId) -> Option<ParticleId> {
    let record = handler.check_attributes(element, false)?;
    let min_occurs = record.min_occurs().unwrap_or(1);
    let max_occurs = record.max_occurs().unwrap_or(Some(1));
    record.release();

    let group = model_group(handler, element, context, parent)?;
    handler.components_mut().add_particle(Particle {
        min_occurs,
        max_occurs,
        term: Term::ModelGroup(group),
    })
}

fn model_group(handler: &mut SchemaHandler, element: ElementRef, context: AllContext, parent: ComponentId) -> Option<ModelGroupId> {
    let compositor = Compositor::from_local_name(handler.local_name(element))?;
    let group = handler.components_mut().add_model_group(ModelGroup {
        compositor,
        particles: Vec::new(),
    })?;

    let inside_all = compositor == Compositor::All;
    let nested = AllContext {
        inside_all_group: inside_all,
        inside_all_group_definition: inside_all && context.is_group_definition_child,
        ..context
    };

    for child in handler.content_children(element) {
        let kind = handler.local_name(child).to_string();
        let particle = match kind.as_str() {
            "element" => element_particle(handler, child, nested, parent),
            "group" => group_reference(handler, child, nested),
            "all" | "choice" | "sequence" => model_group_particle(handler, child, nested, parent),
            "any" => wildcard_particle(handler, child),
            _ => None,
        };
        if let Some(particle) = particle {
            if let Some(g) = handler.components_mut().model_group_mut(group) {
                g.particles.push(particle);
            }
        }
    }
    Some(group)
}

/// Particle for `<group ref>`; its term is the referenced definition's model group
fn group_reference(handler: &mut SchemaHandler, element: ElementRef, context: AllContext) -> Option<ParticleId> {
    let record = handler.check_attributes(element, false)?;
    let mut min_occurs = record.min_occurs().unwrap_or(1);
    let mut max_occurs = record.max_occurs().unwrap_or(Some(1));
    let reference = record.qname(Attr::Ref).cloned();
    record.release();

    let term = resolve(handler, element, SymbolSpace::Group, reference)
        .and_then(|id| handler.components().group(id))
        .and_then(|g| g.model_group)
        .map_or(Term::Empty, Term::ModelGroup);
    let context = AllContext {
        group_ref_contained_all: match term {
            Term::ModelGroup(group) => handler
                .components()
                .model_group(group)
                .is_some_and(|g| g.compositor == Compositor::All),
            _ => false,
        },
        ..context
    };
    trace!(?context, "group reference");
    if context.group_ref_contained_all {
        (min_occurs, max_occurs) = limit_all_group(handler, element, min_occurs, max_occurs);
    }
    handler.components_mut().add_particle(Particle {
        min_occurs,
        max_occurs,
        term,
    })
}

/// A reference to an `<all>` group occurs at most once
fn limit_all_group(handler: &mut SchemaHandler, element: ElementRef, min_occurs: u32, max_occurs: Option<u32>) -> (u32, Option<u32>) {
    if max_occurs == Some(1) || max_occurs == Some(0) {
        return (min_occurs, max_occurs);
    }
    handler.report_error("cos-all-limited.1.2", &[], Some(element));
    (min_occurs.min(1), Some(1))
}

fn occurs_label(max_occurs: Option<u32>) -> String {
    max_occurs.map_or_else(|| "unbounded".to_string(), |max| max.to_string())
}

fn wildcard(handler: &mut SchemaHandler, element: ElementRef) -> Option<(Wildcard, Option<u32>, Option<u32>)> {
    let record = handler.check_attributes(element, false)?;
    let wildcard = Wildcard {
        namespace: record.namespace_constraint().cloned().unwrap_or(NamespaceConstraint::Any),
        process_contents: record.process_contents().unwrap_or(ProcessContents::Strict),
    };
    Some((wildcard, record.min_occurs(), record.max_occurs().unwrap_or(Some(1))))
}

fn wildcard_particle(handler: &mut SchemaHandler, element: ElementRef) -> Option<ParticleId> {
    let (wildcard, min_occurs, max_occurs) = wildcard(handler, element)?;
    handler.components_mut().add_particle(Particle {
        min_occurs: min_occurs.unwrap_or(1),
        max_occurs,
        term: Term::Wildcard(wildcard),
    })
}

/// Attribute uses, attribute group references and wildcard among `children`
#[derive(Debug, Default)]
struct AttributeContent {
    uses: Vec<AttributeUse>,
    groups: Vec<ComponentId>,
    wildcard: Option<Wildcard>,
}

fn attribute_content(handler: &mut SchemaHandler, children: Vec<ElementRef>) -> AttributeContent {
    let mut content = AttributeContent::default();
    for child in children {
        let kind = handler.local_name(child).to_string();
        match kind.as_str() {
            "attribute" => content.uses.extend(attribute_use(handler, child)),
            "attributeGroup" => {
                let reference = handler
                    .check_attributes(child, false)
                    .and_then(|r| r.qname(Attr::Ref).cloned());
                content
                    .groups
                    .extend(resolve(handler, child, SymbolSpace::AttributeGroup, reference));
            }
            "anyAttribute" => content.wildcard = wildcard(handler, child).map(|(w, _, _)| w),
            _ => {}
        }
    }
    content
}

fn attribute_use(handler: &mut SchemaHandler, element: ElementRef) -> Option<AttributeUse> {
    let record = handler.check_attributes(element, false)?;
    let kind = record.attribute_use().unwrap_or(UseKind::Optional);

    let declaration = if let Some(reference) = record.qname(Attr::Ref).cloned() {
        record.release();
        handler.resolve_global(element, SymbolSpace::Attribute, &reference)?
    } else {
        let local_name = record.str(Attr::Name)?.to_string();
        let declaration = AttributeDecl {
            name: local_name_with_form(handler, element, &local_name, record.form(Attr::Form), true),
            global: false,
            type_definition: None,
            default: record.str(Attr::Default).map(str::to_string),
            fixed: record.str(Attr::Fixed).map(str::to_string),
            source: handler.source_location(element),
        };
        let type_name = record.qname(Attr::Type).cloned();
        record.release();
        add_attribute(handler, element, declaration, type_name)?
    };

    Some(AttributeUse {
        declaration,
        required: kind == UseKind::Required,
        prohibited: kind == UseKind::Prohibited,
    })
}

fn global_attribute(handler: &mut SchemaHandler, element: ElementRef) -> Option<ComponentId> {
    let record = handler.check_attributes(element, true)?;
    let declaration = AttributeDecl {
        name: global_name(handler, element, record.str(Attr::Name)?),
        global: true,
        type_definition: None,
        default: record.str(Attr::Default).map(str::to_string),
        fixed: record.str(Attr::Fixed).map(str::to_string),
        source: handler.source_location(element),
    };
    let type_name = record.qname(Attr::Type).cloned();
    record.release();
    add_attribute(handler, element, declaration, type_name)
}

fn add_attribute(
    handler: &mut SchemaHandler,
    element: ElementRef,
    mut declaration: AttributeDecl,
    type_name: Option<ResolvedQName>,
) -> Option<ComponentId> {
    declaration.type_definition = match type_name {
        Some(_) => resolve(handler, element, SymbolSpace::Type, type_name),
        None => match first_child_named(handler, element, &["simpleType"]) {
            Some(anonymous) => simple_type(handler, anonymous, false),
            None => handler.builtins().any_simple_type(),
        },
    };
    handler.components_mut().add(Component::Attribute(declaration))
}

fn complex_type(handler: &mut SchemaHandler, element: ElementRef, is_global: bool) -> Option<ComponentId> {
    let record = handler.check_attributes(element, is_global)?;
    let name = match is_global {
        true => Some(global_name(handler, element, record.str(Attr::Name)?)),
        false => None,
    };
    let (block_default, final_default) = handler
        .document(element.document)
        .map_or((0, 0), |d| (d.block_default, d.final_default));

    let mut definition = TypeDef::new(name, TypeKind::Complex);
    definition.mixed = record.bool(Attr::Mixed).unwrap_or(false);
    definition.block = record.derivation_set(Attr::Block).unwrap_or(block_default);
    definition.final_set = record.derivation_set(Attr::Final).unwrap_or(final_default);
    definition.source = handler.source_location(element);
    record.release();

    // registered before its content so local elements can name it as parent
    let id = handler.components_mut().add(Component::Type(definition))?;

    let children = handler.content_children(element);
    let mut base = handler.builtins().any_type();
    let mut derivation = Derivation::Restriction;
    let mut mixed = None;
    let mut content_children = children.clone();

    if let Some(&content) = children
        .first()
        .filter(|c| matches!(handler.local_name(**c), "simpleContent" | "complexContent"))
    {
        mixed = handler.check_attributes(content, false).and_then(|r| r.bool(Attr::Mixed));
        content_children = Vec::new();
        if let Some(&derived) = handler.content_children(content).first() {
            let kind = handler.local_name(derived).to_string();
            let base_name = handler
                .check_attributes(derived, false)
                .and_then(|r| r.qname(Attr::Base).cloned());
            if let Some(resolved) = resolve(handler, derived, SymbolSpace::Type, base_name) {
                base = Some(resolved);
            }
            derivation = if kind == "extension" { Derivation::Extension } else { Derivation::Restriction };
            content_children = handler.content_children(derived);
        }
    }

    let context = AllContext::default();
    let content = match content_children
        .iter()
        .copied()
        .find(|c| matches!(handler.local_name(*c), "all" | "choice" | "sequence" | "group"))
    {
        Some(particle) if handler.local_name(particle) == "group" => group_reference(handler, particle, context),
        Some(particle) => model_group_particle(handler, particle, context, id),
        None => None,
    };
    let attributes = attribute_content(handler, content_children);

    if let Some(t) = type_mut(handler, id) {
        t.base = base;
        t.derivation = Some(derivation);
        if let Some(mixed) = mixed {
            t.mixed = mixed;
        }
        t.content = content;
        t.attribute_uses = attributes.uses;
        t.attribute_groups = attributes.groups;
        t.attribute_wildcard = attributes.wildcard;
    }
    Some(id)
}

fn simple_type(handler: &mut SchemaHandler, element: ElementRef, is_global: bool) -> Option<ComponentId> {
    let record = handler.check_attributes(element, is_global)?;
    let name = match is_global {
        true => Some(global_name(handler, element, record.str(Attr::Name)?)),
        false => None,
    };
    let final_default = handler.document(element.document).map_or(0, |d| d.final_default);
    let mut definition = TypeDef::new(name, TypeKind::Simple);
    definition.final_set = record.derivation_set(Attr::Final).unwrap_or(final_default);
    definition.source = handler.source_location(element);
    definition.base = handler.builtins().any_simple_type();
    record.release();

    let id = handler.components_mut().add(Component::Type(definition))?;

    let Some(variety) = handler.content_children(element).first().copied() else {
        return Some(id);
    };
    let kind = handler.local_name(variety).to_string();
    let Some(record) = handler.check_attributes(variety, false) else {
        return Some(id);
    };
    let anonymous: Vec<ElementRef> = handler
        .content_children(variety)
        .into_iter()
        .filter(|c| handler.local_name(*c) == "simpleType")
        .collect();

    match kind.as_str() {
        "restriction" => {
            let base_name = record.qname(Attr::Base).cloned();
            record.release();
            let base = match base_name {
                Some(_) => resolve(handler, variety, SymbolSpace::Type, base_name),
                None => anonymous.first().and_then(|a| simple_type(handler, *a, false)),
            };
            if let Some(t) = type_mut(handler, id) {
                t.derivation = Some(Derivation::Restriction);
                t.base = base.or(t.base);
            }
        }
        "list" => {
            let item_name = record.qname(Attr::ItemType).cloned();
            record.release();
            let item_type = match item_name {
                Some(_) => resolve(handler, variety, SymbolSpace::Type, item_name),
                None => anonymous.first().and_then(|a| simple_type(handler, *a, false)),
            };
            if let Some(t) = type_mut(handler, id) {
                t.derivation = Some(Derivation::List);
                t.item_type = item_type;
            }
        }
        "union" => {
            let member_names = record.qnames(Attr::MemberTypes).to_vec();
            record.release();
            let mut members = Vec::new();
            for member in member_names {
                members.extend(handler.resolve_global(variety, SymbolSpace::Type, &member));
            }
            for member in anonymous {
                members.extend(simple_type(handler, member, false));
            }
            if let Some(t) = type_mut(handler, id) {
                t.derivation = Some(Derivation::Union);
                t.member_types = members;
            }
        }
        _ => {}
    }
    Some(id)
}

fn group_definition(handler: &mut SchemaHandler, element: ElementRef) -> Option<ComponentId> {
    let record = handler.check_attributes(element, true)?;
    let name = global_name(handler, element, record.str(Attr::Name)?);
    record.release();

    let source = handler.source_location(element);
    let id = handler.components_mut().add(Component::Group(GroupDef {
        name: name.clone(),
        model_group: None,
        redefines: None,
        source,
    }))?;

    let context = AllContext {
        is_group_definition_child: true,
        ..AllContext::default()
    };
    let model = match first_child_named(handler, element, &["all", "choice", "sequence"]) {
        Some(compositor) => {
            handler.check_attributes(compositor, false);
            model_group(handler, compositor, context, id)
        }
        None => None,
    };
    let redefines = match in_redefine(handler, element) {
        true => handler.redefined_by_restriction(SymbolSpace::Group, &name, element),
        false => None,
    };

    if let Some(Component::Group(g)) = handler.components_mut().get_mut(id) {
        g.model_group = model;
        g.redefines = redefines;
    }
    Some(id)
}

fn attribute_group_definition(handler: &mut SchemaHandler, element: ElementRef) -> Option<ComponentId> {
    let record = handler.check_attributes(element, true)?;
    let name = global_name(handler, element, record.str(Attr::Name)?);
    record.release();

    let source = handler.source_location(element);
    let id = handler.components_mut().add(Component::AttributeGroup(AttributeGroupDef {
        name: name.clone(),
        attribute_uses: Vec::new(),
        attribute_groups: Vec::new(),
        attribute_wildcard: None,
        redefines: None,
        source,
    }))?;

    let children = handler.content_children(element);
    let content = attribute_content(handler, children);
    let redefines = match in_redefine(handler, element) {
        true => handler.redefined_by_restriction(SymbolSpace::AttributeGroup, &name, element),
        false => None,
    };

    if let Some(Component::AttributeGroup(g)) = handler.components_mut().get_mut(id) {
        g.attribute_uses = content.uses;
        g.attribute_groups = content.groups;
        g.attribute_wildcard = content.wildcard;
        g.redefines = redefines;
    }
    Some(id)
}

fn in_redefine(handler: &SchemaHandler, element: ElementRef) -> bool {
    handler
        .parent(element)
        .is_some_and(|p| handler.local_name(p) == "redefine")
}

fn notation(handler: &mut SchemaHandler, element: ElementRef) -> Option<ComponentId> {
    let record = handler.check_attributes(element, true)?;
    let declaration = NotationDecl {
        name: global_name(handler, element, record.str(Attr::Name)?),
        public: record.str(Attr::Public).map(str::to_string),
        system: record.str(Attr::System).map(str::to_string),
        source: handler.source_location(element),
    };
    record.release();
    handler.components_mut().add(Component::Notation(declaration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const HEAD: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn parsed(text: String) -> SchemaHandler {
        let mut handler = SchemaHandler::new();
        handler.loader_mut().register("memory:/root.xsd", text);
        handler.parse_schema("memory:/root.xsd").unwrap();
        handler
    }

    #[test]
    fn test_forward_type_reference() {
        let handler = parsed(format!(
            r#"<xs:schema {HEAD} xmlns:t="urn:t" targetNamespace="urn:t" elementFormDefault="qualified">
                 <xs:element name="root" type="t:R"/>
                 <xs:complexType name="R">
                   <xs:sequence><xs:element name="inner" type="xs:int"/></xs:sequence>
                   <xs:attribute name="id" type="xs:ID" use="required"/>
                 </xs:complexType>
               </xs:schema>"#
        ));
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let grammar = handler.grammar(Some("urn:t")).unwrap();
        let components = handler.components();
        let root = components.element(grammar.get(SymbolSpace::Element, "root").unwrap()).unwrap();
        let ty = grammar.get(SymbolSpace::Type, "R").unwrap();
        assert_eq!(root.type_definition, Some(ty));

        let definition = components.type_definition(ty).unwrap();
        assert_eq!(definition.base, handler.builtins().any_type());
        assert_eq!(definition.attribute_uses.len(), 1);
        assert!(definition.attribute_uses[0].required);

        let group = components.content_model(ty).unwrap();
        let particle = components.particle(components.model_group(group).unwrap().particles[0]).unwrap();
        assert_matches!(particle.term, Term::Element(inner) => {
            let inner = components.element(inner).unwrap();
            assert_eq!(inner.name, QName::namespaced("urn:t", "inner"));
            assert_eq!(inner.type_definition, handler.builtins().get("int"));
        });
    }

    #[test]
    fn test_circular_types() {
        let handler = parsed(format!(
            r#"<xs:schema {HEAD}>
                 <xs:simpleType name="a"><xs:restriction base="b"/></xs:simpleType>
                 <xs:simpleType name="b"><xs:restriction base="a"/></xs:simpleType>
                 <xs:complexType name="c"><xs:complexContent><xs:extension base="c"/></xs:complexContent></xs:complexType>
               </xs:schema>"#
        ));
        assert_eq!(
            handler.diagnostics().codes(),
            vec!["st-props-correct.2", "ct-props-correct.3"]
        );
    }

    #[test]
    fn test_group_reference_and_wildcards() {
        let handler = parsed(format!(
            r###"<xs:schema {HEAD}>
                 <xs:group name="g"><xs:choice><xs:any namespace="##other" processContents="lax"/></xs:choice></xs:group>
                 <xs:attributeGroup name="ag"><xs:anyAttribute/></xs:attributeGroup>
                 <xs:complexType name="T">
                   <xs:group ref="g" maxOccurs="unbounded"/>
                   <xs:attributeGroup ref="ag"/>
                 </xs:complexType>
               </xs:schema>"###
        ));
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let grammar = handler.grammar(None).unwrap();
        let components = handler.components();
        let ty = components.type_definition(grammar.get(SymbolSpace::Type, "T").unwrap()).unwrap();
        assert_eq!(ty.attribute_groups, vec![grammar.get(SymbolSpace::AttributeGroup, "ag").unwrap()]);

        let content = components.particle(ty.content.unwrap()).unwrap();
        assert_eq!(content.max_occurs, None);
        let group = components.group(grammar.get(SymbolSpace::Group, "g").unwrap()).unwrap();
        assert_eq!(content.term, Term::ModelGroup(group.model_group.unwrap()));

        let choice = components.model_group(group.model_group.unwrap()).unwrap();
        assert_eq!(choice.compositor, Compositor::Choice);
        assert_matches!(
            &components.particle(choice.particles[0]).unwrap().term,
            Term::Wildcard(w) if w.process_contents == ProcessContents::Lax
        );
    }

    #[test]
    fn test_simple_type_varieties() {
        let handler = parsed(format!(
            r#"<xs:schema {HEAD}>
                 <xs:simpleType name="list"><xs:list itemType="xs:int"/></xs:simpleType>
                 <xs:simpleType name="union">
                   <xs:union memberTypes="xs:int list"><xs:simpleType><xs:restriction base="xs:string"/></xs:simpleType></xs:union>
                 </xs:simpleType>
                 <xs:notation name="gif" public="image/gif"/>
               </xs:schema>"#
        ));
        assert!(handler.diagnostics().is_empty(), "{:?}", handler.diagnostics());

        let grammar = handler.grammar(None).unwrap();
        let components = handler.components();
        let list = grammar.get(SymbolSpace::Type, "list").unwrap();
        assert_eq!(components.type_definition(list).unwrap().item_type, handler.builtins().get("int"));

        let union = components.type_definition(grammar.get(SymbolSpace::Type, "union").unwrap()).unwrap();
        assert_eq!(union.derivation, Some(Derivation::Union));
        assert_eq!(union.member_types.len(), 3);
        assert_eq!(union.member_types[1], list);

        assert_matches!(
            components.get(grammar.get(SymbolSpace::Notation, "gif").unwrap()),
            Some(Component::Notation(n)) if n.public.as_deref() == Some("image/gif")
        );
    }

    #[test]
    fn test_all_group_occurrence_limits() {
        let handler = parsed(format!(
            r#"<xs:schema {HEAD}>
                 <xs:group name="g">
                   <xs:all><xs:element name="a"/><xs:element name="b" maxOccurs="2"/></xs:all>
                 </xs:group>
                 <xs:group name="s">
                   <xs:sequence><xs:element name="c" maxOccurs="2"/></xs:sequence>
                 </xs:group>
                 <xs:complexType name="T"><xs:group ref="g" maxOccurs="3"/></xs:complexType>
                 <xs:complexType name="U"><xs:group ref="s" maxOccurs="3"/></xs:complexType>
               </xs:schema>"#
        ));
        assert_eq!(handler.diagnostics().codes(), vec!["cos-all-limited.1.2", "cos-all-limited.2"]);
        let local = handler.diagnostics().iter().nth(1).unwrap();
        assert_eq!(local.args, vec!["2".to_string(), "b".to_string()]);

        let grammar = handler.grammar(None).unwrap();
        let components = handler.components();
        let t = components.type_definition(grammar.get(SymbolSpace::Type, "T").unwrap()).unwrap();
        assert_eq!(components.particle(t.content.unwrap()).unwrap().max_occurs, Some(1));
        let u = components.type_definition(grammar.get(SymbolSpace::Type, "U").unwrap()).unwrap();
        assert_eq!(components.particle(u.content.unwrap()).unwrap().max_occurs, Some(3));

        let g = components.group(grammar.get(SymbolSpace::Group, "g").unwrap()).unwrap();
        let all = components.model_group(g.model_group.unwrap()).unwrap();
        let b = components.particle(all.particles[1]).unwrap();
        assert_eq!(b.max_occurs, Some(1));
    }

    #[test]
    fn test_substitution_group_head_type() {
        let handler = parsed(format!(
            r#"<xs:schema {HEAD}>
                 <xs:element name="member" substitutionGroup="head"/>
                 <xs:element name="head" type="xs:date"/>
               </xs:schema>"#
        ));
        let grammar = handler.grammar(None).unwrap();
        let member = handler.components().element(grammar.get(SymbolSpace::Element, "member").unwrap()).unwrap();
        assert_eq!(member.substitution_group, grammar.get(SymbolSpace::Element, "head"));
        assert_eq!(member.type_definition, handler.builtins().get("date"));
    }
}
