//! Component groups are resolved queries over the entity store.
//!
//! A group matches every entity that has all positive requirements
//! and none of the subtractive requirements.
//! Positive requirements are ordered by type ID;
//! the position of a type in this order is its *index in group*,
//! which is what [`ChunkIterator`] uses to address arrays.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::comp::{AccessMode, ComponentKind, ComponentType};
use crate::storage::Store;
use crate::util::DbgTypeId;

mod array;
pub use array::{BufferArray, ComponentArray, EntityArray, SharedComponentArray};

mod iter;
pub use iter::ChunkIterator;

mod lookup;
pub use lookup::{BufferLookup, ComponentLookup};


/// The identity of a resolved group, shared by all handles to it.
pub(crate) struct GroupDesc {
    pub(crate) id:           usize,
    /// Normalized requirements, sorted by type ID.
    pub(crate) requirements: Vec<ComponentType>,
    /// The positive requirements in group order.
    pub(crate) required:     Vec<ComponentType>,
}

impl GroupDesc {
    pub(crate) fn new(id: usize, requirements: Vec<ComponentType>) -> Self {
        let required = requirements.iter().filter(|req| !req.is_subtractive()).copied().collect();
        Self { id, requirements, required }
    }

    /// Sorts and deduplicates a requirement list.
    ///
    /// If a type is required both read-only and read-write, the read-write requirement is kept.
    pub(crate) fn normalize(requirements: &[ComponentType]) -> Vec<ComponentType> {
        let mut by_type: BTreeMap<(DbgTypeId, bool), ComponentType> = BTreeMap::new();
        for &req in requirements {
            by_type
                .entry((req.ty, req.is_subtractive()))
                .and_modify(|existing| {
                    if req.access == AccessMode::ReadWrite {
                        existing.access = AccessMode::ReadWrite;
                    }
                })
                .or_insert(req);
        }
        by_type.into_values().collect()
    }
}

/// A handle to a resolved group.
///
/// Handles are cheap to clone.
/// Two handles are equal iff they were resolved from equivalent requirement lists
/// in the same entity store.
#[derive(Clone)]
pub struct ComponentGroup {
    store: Arc<RwLock<Store>>,
    desc:  Arc<GroupDesc>,
}

static_assertions::assert_impl_all!(ComponentGroup: Send, Sync);

impl ComponentGroup {
    pub(crate) fn new(store: Arc<RwLock<Store>>, desc: Arc<GroupDesc>) -> Self {
        Self { store, desc }
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        let store = self.store.read();
        store.check_alive();
        store
    }

    /// A number identifying this group within its entity store.
    pub fn id(&self) -> usize { self.desc.id }

    /// All requirements of this group, including subtractive ones.
    pub fn requirements(&self) -> &[ComponentType] { &self.desc.requirements }

    /// The positive requirements in group order.
    pub fn types(&self) -> &[ComponentType] { &self.desc.required }

    /// Returns the index in group of a required type.
    pub fn index_in_group(&self, ty: DbgTypeId) -> Option<usize> {
        self.desc.required.iter().position(|req| req.ty == ty)
    }

    /// Counts the entities currently matching this group.
    pub fn calculate_length(&self) -> usize {
        let store = self.read();
        store.groups[self.desc.id]
            .matching
            .iter()
            .flat_map(|&archetype| &store.archetypes[archetype].chunks)
            .map(|chunk| chunk.len)
            .sum()
    }

    /// Takes a snapshot of the chunks currently matching this group.
    ///
    /// Arrays created from the iterator address entities in chunk order
    /// and stay valid until the next structural change.
    pub fn iterator(&self) -> ChunkIterator {
        let store = self.read();
        let matching = &store.groups[self.desc.id].matching;

        let mut chunks = Vec::new();
        for &archetype_index in matching {
            let archetype = &store.archetypes[archetype_index];
            for chunk in archetype.chunks.iter().filter(|chunk| chunk.len > 0) {
                let slots = self
                    .desc
                    .required
                    .iter()
                    .map(|req| match req.kind {
                        ComponentKind::Shared => {
                            let index = archetype
                                .shared_index(req.ty)
                                .expect("matching archetype has the type");
                            iter::ChunkSlot::Shared(Arc::clone(
                                store.shared_values[&req.ty].get(chunk.shared[index]),
                            ))
                        }
                        ComponentKind::Data | ComponentKind::Buffer => {
                            let index = archetype
                                .column_index(req.ty)
                                .expect("matching archetype has the type");
                            iter::ChunkSlot::Column(Arc::clone(&chunk.columns[index]))
                        }
                    })
                    .collect();
                chunks.push(iter::ChunkSnapshot {
                    len: chunk.len,
                    entities: Arc::clone(&chunk.entities),
                    slots,
                });
            }
        }

        ChunkIterator::new(Arc::clone(&self.desc), chunks)
    }
}

impl PartialEq for ComponentGroup {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.desc, &other.desc) }
}

impl Eq for ComponentGroup {}

impl fmt::Debug for ComponentGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ComponentGroup")
            .field("id", &self.desc.id)
            .field("requirements", &self.desc.requirements)
            .finish()
    }
}
