//! Schema assembly
//!
//! This module contains the passes that turn a set of schema documents into
//! per-namespace grammars: attribute checking, document resolution, global
//! registries with redefinition handling, and deferred resolution.

// Attribute validation
pub mod attribute_table;
pub mod attribute_checker;
pub mod record_pool;

// Component model
pub mod components;
pub mod builtins;
pub mod grammar;

// Passes
pub mod handler;
pub mod resolver;
pub mod registry;
pub mod deferred;
pub mod traversers;

// Re-exports
pub use attribute_checker::AttributeChecker;
pub use attribute_table::{Attr, AttrValue, AttributeTable, Form, NamespaceConstraint, ProcessContents};
pub use components::{Component, ComponentArena, SymbolSpace, Term};
pub use deferred::{AllContext, DeferredItem, DeferredQueue};
pub use grammar::{Annotation, Grammar, GrammarBucket};
pub use handler::{ContextKind, ParsedSchema, SchemaHandler, SchemaOptions};
pub use record_pool::{AttributeValues, PooledRecord, RecordPool};
pub use registry::{EntryState, Registries, REDEFINE_SUFFIX};
pub use resolver::DependencyGraph;
pub use traversers::{ComponentTraverser, StructuralTraverser};
