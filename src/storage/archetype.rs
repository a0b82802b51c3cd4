use std::sync::Arc;

use parking_lot::RwLock;

use super::column::AnyColumn;
use super::comp_set::TypeInfo;
use crate::comp::{AccessMode, ComponentKind, ComponentType};
use crate::util::DbgTypeId;
use crate::Entity;

/// All entities with exactly the same set of component types.
pub(crate) struct Archetype {
    /// All component types, sorted by type ID.
    pub(crate) types:        Vec<TypeInfo>,
    /// Data and buffer types with a column in each chunk, sorted by type ID.
    pub(crate) column_types: Vec<DbgTypeId>,
    /// Shared component types, sorted by type ID.
    pub(crate) shared_types: Vec<DbgTypeId>,
    pub(crate) chunks:       Vec<Chunk>,
}

/// A fixed-capacity block of entities in an archetype
/// that agree on the values of all shared components.
pub(crate) struct Chunk {
    /// Interned value index of each shared component, aligned with `Archetype::shared_types`.
    pub(crate) shared:   Vec<usize>,
    pub(crate) entities: Arc<RwLock<Vec<Entity>>>,
    /// Aligned with `Archetype::column_types`.
    pub(crate) columns:  Vec<Arc<dyn AnyColumn>>,
    /// The number of entities in the chunk.
    pub(crate) len:      usize,
}

impl Archetype {
    /// Creates an empty archetype. `types` must be sorted and deduplicated.
    pub(crate) fn new(types: Vec<TypeInfo>) -> Self {
        let (shared, columns): (Vec<&TypeInfo>, Vec<&TypeInfo>) =
            types.iter().partition(|info| info.kind == ComponentKind::Shared);
        let column_types = columns.into_iter().map(|info| info.ty).collect();
        let shared_types = shared.into_iter().map(|info| info.ty).collect();
        Self { types, column_types, shared_types, chunks: Vec::new() }
    }

    pub(crate) fn signature(&self) -> Vec<DbgTypeId> {
        self.types.iter().map(|info| info.ty).collect()
    }

    pub(crate) fn has(&self, ty: DbgTypeId) -> bool {
        self.types.binary_search_by_key(&ty, |info| info.ty).is_ok()
    }

    pub(crate) fn column_index(&self, ty: DbgTypeId) -> Option<usize> {
        self.column_types.binary_search(&ty).ok()
    }

    pub(crate) fn shared_index(&self, ty: DbgTypeId) -> Option<usize> {
        self.shared_types.binary_search(&ty).ok()
    }

    /// Whether entities of this archetype satisfy all requirements.
    pub(crate) fn matches(&self, requirements: &[ComponentType]) -> bool {
        requirements.iter().all(|req| match req.access {
            AccessMode::Subtractive => !self.has(req.ty),
            AccessMode::ReadOnly | AccessMode::ReadWrite => self.has(req.ty),
        })
    }

    /// Returns the index of a chunk with the given shared values that has room for another entity,
    /// creating a new chunk if necessary.
    pub(crate) fn chunk_with_room(&mut self, shared: &[usize], capacity: usize) -> usize {
        if let Some(index) =
            self.chunks.iter().position(|chunk| chunk.shared == shared && chunk.len < capacity)
        {
            return index;
        }

        let columns = self
            .types
            .iter()
            .filter(|info| info.kind != ComponentKind::Shared)
            .map(|info| (info.new_column)())
            .collect();
        self.chunks.push(Chunk {
            shared: shared.to_vec(),
            entities: Arc::new(RwLock::new(Vec::with_capacity(capacity))),
            columns,
            len: 0,
        });
        self.chunks.len() - 1
    }
}
