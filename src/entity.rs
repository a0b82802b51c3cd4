//! An entity is a single object that owns components.
//!
//! Entities are plain copyable handles.
//! A handle stays valid until the entity is destroyed;
//! the generation protects against a recycled index being mistaken for the old entity.

use std::fmt;

/// A handle to an entity in an [`EntityManager`](crate::storage::EntityManager).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    /// Index of the entity slot in the store.
    pub index:      u32,
    /// Generation of the slot when this handle was created.
    pub generation: u32,
}

impl Entity {
    /// A handle that never refers to a live entity.
    pub const NULL: Entity = Entity { index: u32::MAX, generation: 0 };

    pub(crate) fn usize(self) -> usize { self.index.try_into().expect("usize >= u32") }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Debug::fmt(self, f) }
}
