//! Attribute value records and their reuse pool
//!
//! A checked attribute set is returned as an [`AttributeValues`] record
//! held by a [`PooledRecord`] guard. Dropping the guard hands the backing
//! storage back to its slot; a slot is never handed out while checked out.

use super::attribute_table::{
    Attr, AttrValue, AttributeUse, Form, NamespaceConstraint, ProcessContents,
};
use crate::namespaces::{QName, ResolvedQName};
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::trace;

/// Decoded attributes of one schema element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValues {
    slots: Vec<Option<AttrValue>>,
    from_default: u64,
    non_schema: Vec<(QName, String)>,
}

impl AttributeValues {
    /// Empty record
    pub fn new() -> Self {
        Self {
            slots: vec![None; Attr::COUNT],
            from_default: 0,
            non_schema: Vec::new(),
        }
    }

    /// Reset every slot
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.from_default = 0;
        self.non_schema.clear();
    }

    /// Value in a slot
    pub fn get(&self, attr: Attr) -> Option<&AttrValue> {
        self.slots[attr.index()].as_ref()
    }

    /// Store a value
    pub fn set(&mut self, attr: Attr, value: AttrValue) {
        self.slots[attr.index()] = Some(value);
    }

    /// Whether a slot holds a value
    pub fn contains(&self, attr: Attr) -> bool {
        self.slots[attr.index()].is_some()
    }

    /// Record that a slot was filled from its default
    pub fn mark_default(&mut self, attr: Attr) {
        self.from_default |= attr.bit();
    }

    /// Whether a slot was filled from its default
    pub fn is_default(&self, attr: Attr) -> bool {
        self.from_default & attr.bit() != 0
    }

    /// Bitmask of defaulted slots
    pub fn from_default(&self) -> u64 {
        self.from_default
    }

    /// Attributes from foreign namespaces, in document order
    pub fn non_schema(&self) -> &[(QName, String)] {
        &self.non_schema
    }

    /// Keep a foreign attribute
    pub fn push_non_schema(&mut self, name: QName, value: String) {
        self.non_schema.push((name, value));
    }

    /// String-like value
    pub fn str(&self, attr: Attr) -> Option<&str> {
        match self.get(attr) {
            Some(AttrValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Boolean value
    pub fn bool(&self, attr: Attr) -> Option<bool> {
        match self.get(attr) {
            Some(AttrValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Integer value
    pub fn int(&self, attr: Attr) -> Option<u32> {
        match self.get(attr) {
            Some(AttrValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Resolved QName value
    pub fn qname(&self, attr: Attr) -> Option<&ResolvedQName> {
        match self.get(attr) {
            Some(AttrValue::QName(q)) => Some(q),
            _ => None,
        }
    }

    /// Resolved QName list value
    pub fn qnames(&self, attr: Attr) -> &[ResolvedQName] {
        match self.get(attr) {
            Some(AttrValue::QNames(q)) => q,
            _ => &[],
        }
    }

    /// Derivation bit set
    pub fn derivation_set(&self, attr: Attr) -> Option<u8> {
        match self.get(attr) {
            Some(AttrValue::DerivationSet(bits)) => Some(*bits),
            _ => None,
        }
    }

    /// `form`-typed value
    pub fn form(&self, attr: Attr) -> Option<Form> {
        match self.get(attr) {
            Some(AttrValue::Form(form)) => Some(*form),
            _ => None,
        }
    }

    /// `minOccurs`
    pub fn min_occurs(&self) -> Option<u32> {
        self.int(Attr::MinOccurs)
    }

    /// `maxOccurs`: `Some(None)` when unbounded
    pub fn max_occurs(&self) -> Option<Option<u32>> {
        match self.get(Attr::MaxOccurs) {
            Some(AttrValue::Integer(n)) => Some(Some(*n)),
            Some(AttrValue::Unbounded) => Some(None),
            _ => None,
        }
    }

    /// Wildcard namespace constraint
    pub fn namespace_constraint(&self) -> Option<&NamespaceConstraint> {
        match self.get(Attr::Namespace) {
            Some(AttrValue::NamespaceConstraint(c)) => Some(c),
            _ => None,
        }
    }

    /// Wildcard processContents
    pub fn process_contents(&self) -> Option<ProcessContents> {
        match self.get(Attr::ProcessContents) {
            Some(AttrValue::ProcessContents(p)) => Some(*p),
            _ => None,
        }
    }

    /// Attribute use
    pub fn attribute_use(&self) -> Option<AttributeUse> {
        match self.get(Attr::Use) {
            Some(AttrValue::Use(u)) => Some(*u),
            _ => None,
        }
    }
}

impl Default for AttributeValues {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Slot {
    storage: Option<AttributeValues>,
    checked_out: bool,
}

#[derive(Debug, Default)]
struct PoolInner {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

/// Arena of reusable attribute value records
///
/// Cloning the pool yields another handle to the same arena.
#[derive(Debug, Clone, Default)]
pub struct RecordPool {
    inner: Rc<RefCell<PoolInner>>,
}

impl RecordPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a cleared record
    pub fn checkout(&self) -> PooledRecord {
        let mut inner = self.inner.borrow_mut();
        let slot = match inner.free.pop() {
            Some(slot) => slot,
            None => {
                inner.slots.push(Slot::default());
                inner.slots.len() - 1
            }
        };
        let entry = &mut inner.slots[slot];
        entry.checked_out = true;
        let mut values = entry.storage.take().unwrap_or_default();
        values.clear();
        trace!(slot, "record checked out");
        PooledRecord {
            pool: self.clone(),
            slot,
            values,
        }
    }

    /// Return a slot to the free list; only a [`PooledRecord`] does this.
    ///
    /// Returning a slot that is not checked out does nothing.
    fn checkin(&self, slot: usize, values: Option<AttributeValues>) {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.slots.get_mut(slot) else {
            return;
        };
        if values.is_some() {
            entry.storage = values;
        }
        if !entry.checked_out {
            return;
        }
        entry.checked_out = false;
        inner.free.push(slot);
        trace!(slot, "record released");
    }

    /// Whether a slot is currently checked out
    pub fn is_checked_out(&self, slot: usize) -> bool {
        self.inner
            .borrow()
            .slots
            .get(slot)
            .map_or(false, |s| s.checked_out)
    }

    /// Number of slots ever allocated
    pub fn capacity(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Number of slots ready for checkout
    pub fn available(&self) -> usize {
        self.inner.borrow().free.len()
    }
}

/// A checked-out attribute record; dropping it returns the record
#[derive(Debug)]
pub struct PooledRecord {
    pool: RecordPool,
    slot: usize,
    values: AttributeValues,
}

impl PooledRecord {
    /// Slot this record occupies
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Return the record now
    pub fn release(self) {}

    /// Copy the values out, releasing the record
    pub fn into_values(mut self) -> AttributeValues {
        std::mem::take(&mut self.values)
    }
}

impl Deref for PooledRecord {
    type Target = AttributeValues;

    fn deref(&self) -> &AttributeValues {
        &self.values
    }
}

impl DerefMut for PooledRecord {
    fn deref_mut(&mut self) -> &mut AttributeValues {
        &mut self.values
    }
}

impl Drop for PooledRecord {
    fn drop(&mut self) {
        let values = std::mem::take(&mut self.values);
        self.pool.checkin(self.slot, Some(values));
    }
}
