//! Indirect object registry
//!
//! Single owner of every indirect object in a document. Each identity has at
//! most one slot. A slot starts out pending when the identity is first
//! referenced, and is replaced in place by the parsed value once it is
//! resolved. Values never hold each other directly: they store an [`ObjectId`]
//! and go back through the registry.

use super::objects::{ObjectId, PdfObject};
use std::collections::{BTreeSet, HashMap};

/// A resolved object stamped with the identity it was loaded under
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub id: ObjectId,
    pub object: PdfObject,
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Pending,
    Loading,
    Resolved(IndirectObject),
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: HashMap<ObjectId, Slot>,
    deferred: BTreeSet<ObjectId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference to `id`, creating a pending slot the first time it is seen
    pub fn get_or_create(&mut self, id: ObjectId) -> PdfObject {
        if !self.slots.contains_key(&id) {
            self.slots.insert(id, Slot::Pending);
            self.deferred.insert(id);
        }
        PdfObject::Reference(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&IndirectObject> {
        match self.slots.get(&id) {
            Some(Slot::Resolved(object)) => Some(object),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut IndirectObject> {
        match self.slots.get_mut(&id) {
            Some(Slot::Resolved(object)) => Some(object),
            _ => None,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn is_resolved(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Resolved(_)))
    }

    pub fn is_loading(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Loading))
    }

    pub fn is_deferred(&self, id: ObjectId) -> bool {
        self.deferred.contains(&id)
    }

    /// Mark `id` as being loaded. Returns false if it is already loading or resolved.
    pub fn begin(&mut self, id: ObjectId) -> bool {
        match self.slots.get(&id) {
            Some(Slot::Loading) | Some(Slot::Resolved(_)) => false,
            _ => {
                self.slots.insert(id, Slot::Loading);
                true
            }
        }
    }

    /// Put a loading slot back to pending after a failed load
    pub fn release(&mut self, id: ObjectId) {
        if self.is_loading(id) {
            self.slots.insert(id, Slot::Pending);
        }
    }

    /// Store the resolved value for `id`, replacing whatever slot was there
    pub fn store(&mut self, id: ObjectId, object: PdfObject) {
        self.slots
            .insert(id, Slot::Resolved(IndirectObject { id, object }));
        self.deferred.remove(&id);
    }

    /// Identities referenced but not yet resolved, in ascending order
    pub fn deferred(&self) -> Vec<ObjectId> {
        self.deferred.iter().copied().collect()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Number of identities with a slot, resolved or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Resolved(_)))
            .count()
    }

    pub fn resolved(&self) -> impl Iterator<Item = &IndirectObject> {
        self.slots.values().filter_map(|slot| match slot {
            Slot::Resolved(object) => Some(object),
            _ => None,
        })
    }

    pub fn resolved_mut(&mut self) -> impl Iterator<Item = &mut IndirectObject> {
        self.slots.values_mut().filter_map(|slot| match slot {
            Slot::Resolved(object) => Some(object),
            _ => None,
        })
    }
}
