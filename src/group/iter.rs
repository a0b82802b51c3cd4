use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use super::array::{BufferArray, ComponentArray, EntityArray, SharedComponentArray};
use super::GroupDesc;
use crate::comp::{self, ComponentKind, ComponentType};
use crate::storage::column::{self, AnyColumn};
use crate::util::DbgTypeId;
use crate::Entity;

pub(super) enum ChunkSlot {
    Column(Arc<dyn AnyColumn>),
    Shared(Arc<dyn Any + Send + Sync>),
}

pub(super) struct ChunkSnapshot {
    pub(super) len:      usize,
    pub(super) entities: Arc<RwLock<Vec<Entity>>>,
    /// Aligned with the positive requirements of the group.
    pub(super) slots:    Vec<ChunkSlot>,
}

/// A snapshot of the non-empty chunks matching a [`ComponentGroup`](super::ComponentGroup).
pub struct ChunkIterator {
    desc:   Arc<GroupDesc>,
    chunks: Vec<ChunkSnapshot>,
    length: usize,
}

impl ChunkIterator {
    pub(super) fn new(desc: Arc<GroupDesc>, chunks: Vec<ChunkSnapshot>) -> Self {
        let length = chunks.iter().map(|chunk| chunk.len).sum();
        Self { desc, chunks, length }
    }

    /// The number of entities in the snapshot.
    pub fn length(&self) -> usize { self.length }

    /// The number of non-empty chunks in the snapshot.
    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    fn requirement(
        &self,
        index_in_group: usize,
        ty: DbgTypeId,
        kind: ComponentKind,
    ) -> ComponentType {
        let req = match self.desc.required.get(index_in_group) {
            Some(&req) => req,
            None => panic!(
                "Index {index_in_group} is out of bounds for a group with {} types",
                self.desc.required.len()
            ),
        };
        assert!(
            req.ty == ty && req.kind == kind,
            "Index {index_in_group} refers to {req} in the group, not {kind} {ty}"
        );
        req
    }

    fn columns<V: Send + Sync + 'static>(
        &self,
        index_in_group: usize,
    ) -> Vec<(Arc<RwLock<Vec<V>>>, usize)> {
        self.chunks
            .iter()
            .map(|chunk| match &chunk.slots[index_in_group] {
                ChunkSlot::Column(column) => (Arc::clone(column::typed::<V>(&**column)), chunk.len),
                ChunkSlot::Shared(_) => unreachable!("requirement kind is checked"),
            })
            .collect()
    }

    /// Creates a view of a data component across all chunks.
    ///
    /// # Panics
    /// Panics if the group has a different type at `index_in_group`,
    /// or if write access is requested for a read-only requirement.
    pub fn component_array<T: comp::Component>(
        &self,
        index_in_group: usize,
        read_only: bool,
    ) -> ComponentArray<T> {
        let req = self.requirement(index_in_group, DbgTypeId::of::<T>(), ComponentKind::Data);
        assert!(read_only || !req.is_read_only(), "Cannot write to {req}");
        ComponentArray::new(self.columns::<T>(index_in_group), read_only)
    }

    /// Creates a view of a buffer type across all chunks.
    ///
    /// # Panics
    /// Panics under the same conditions as [`component_array`](Self::component_array).
    pub fn buffer_array<T: comp::BufferElement>(
        &self,
        index_in_group: usize,
        read_only: bool,
    ) -> BufferArray<T> {
        let req = self.requirement(index_in_group, DbgTypeId::of::<T>(), ComponentKind::Buffer);
        assert!(read_only || !req.is_read_only(), "Cannot write to {req}");
        BufferArray::new(self.columns::<Vec<T>>(index_in_group), read_only)
    }

    /// Creates a read-only view of a shared component, one value per chunk.
    pub fn shared_component_array<T: comp::SharedComponent>(
        &self,
        index_in_group: usize,
    ) -> SharedComponentArray<T> {
        self.requirement(index_in_group, DbgTypeId::of::<T>(), ComponentKind::Shared);
        let values = self
            .chunks
            .iter()
            .map(|chunk| match &chunk.slots[index_in_group] {
                ChunkSlot::Shared(value) => {
                    let value = Arc::clone(value)
                        .downcast::<T>()
                        .unwrap_or_else(|_| panic!("TypeId mismatch"));
                    (value, chunk.len)
                }
                ChunkSlot::Column(_) => unreachable!("requirement kind is checked"),
            })
            .collect();
        SharedComponentArray::new(values)
    }

    /// Creates a view of the entity handles in the snapshot.
    pub fn entity_array(&self) -> EntityArray {
        EntityArray::new(
            self.chunks.iter().map(|chunk| (Arc::clone(&chunk.entities), chunk.len)).collect(),
        )
    }
}
