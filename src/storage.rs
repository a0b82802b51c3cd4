//! The entity store keeps components in chunks grouped by archetype.
//!
//! An archetype is the exact set of component types an entity has.
//! Each archetype splits its entities into chunks of at most [`Config::chunk_capacity`] entities;
//! entities in the same chunk also agree on the values of all their shared components.
//! Each data component and buffer type is stored as one column per chunk,
//! which is what [`ComponentArray`](crate::group::ComponentArray) views expose.
//!
//! Structural changes (creating or destroying entities,
//! adding or removing component types, changing a shared component value)
//! move entities between chunks.
//! Arrays injected before a structural change are stale until the next refresh.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::comp::{self, ComponentKind, ComponentType};
use crate::group::{BufferLookup, ComponentGroup, ComponentLookup, GroupDesc};
use crate::util::DbgTypeId;
use crate::world::{Manager, World};
use crate::Entity;

mod archetype;
pub(crate) use archetype::Archetype;

pub(crate) mod column;

mod comp_set;
pub use comp_set::ComponentSet;
pub(crate) use comp_set::{TypeInfo, Value};

mod shared;
use shared::{SharedValue, SharedValues};

#[cfg(test)]
mod tests;

/// The default maximum number of entities in a chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 128;

/// Configures an [`EntityManager`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The maximum number of entities stored in one chunk.
    pub chunk_capacity: usize,
}

impl Default for Config {
    fn default() -> Self { Self { chunk_capacity: DEFAULT_CHUNK_CAPACITY } }
}

/// The manager that stores all entities of a world.
///
/// The entity store is destroyed after all other managers when its world is disposed,
/// so other managers can still access entities during their own teardown.
pub struct EntityManager {
    store: Arc<RwLock<Store>>,
}

static_assertions::assert_impl_all!(EntityManager: Send, Sync);

impl Default for EntityManager {
    fn default() -> Self { Self::with_config(Config::default()) }
}

impl EntityManager {
    /// Creates an empty entity store with the given configuration.
    ///
    /// # Panics
    /// Panics if `config.chunk_capacity` is zero.
    pub fn with_config(config: Config) -> Self {
        assert!(config.chunk_capacity > 0, "Chunk capacity must be positive");
        Self { store: Arc::new(RwLock::new(Store::new(config))) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        let store = self.store.read();
        store.check_alive();
        store
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        let store = self.store.write();
        store.check_alive();
        store
    }

    /// Creates an entity with the components in `components`.
    ///
    /// # Panics
    /// Panics if a type in `components` was previously used as another kind of component.
    pub fn create_entity(&self, components: ComponentSet) -> Entity {
        let mut store = self.write();
        for (info, _) in components.entries.values() {
            store.register(info);
        }
        let entity = store.allocate();

        let mut types = Vec::with_capacity(components.len());
        let mut values = BTreeMap::new();
        let mut shared = HashMap::new();
        for (ty, (info, value)) in components.entries {
            types.push(info);
            match value {
                Value::Column(value) => {
                    values.insert(ty, value);
                }
                Value::Shared(value) => {
                    shared.insert(ty, store.intern(&info, value));
                }
            }
        }

        let archetype = store.archetype_for(types);
        let shared = store.archetypes[archetype].shared_types.iter().map(|ty| shared[ty]).collect();
        store.insert_row(entity, archetype, shared, values);
        entity
    }

    /// Destroys an entity. Returns `false` if the entity does not exist.
    pub fn destroy_entity(&self, entity: Entity) -> bool {
        let mut store = self.write();
        let location = match store.location(entity) {
            Some(location) => location,
            None => return false,
        };
        store.remove_row(location);
        store.reclaim_if_empty(location.archetype, location.chunk);

        let slot = &mut store.slots[entity.usize()];
        slot.location = None;
        slot.generation = slot.generation.wrapping_add(1);
        store.free.push(entity.index);
        store.live -= 1;
        true
    }

    /// Whether the entity exists.
    pub fn exists(&self, entity: Entity) -> bool { self.read().location(entity).is_some() }

    /// The number of live entities.
    pub fn entity_count(&self) -> usize { self.read().live }

    /// The number of distinct archetypes ever created.
    pub fn archetype_count(&self) -> usize { self.read().archetypes.len() }

    /// The number of distinct component groups resolved so far.
    pub fn group_count(&self) -> usize { self.read().groups.len() }

    /// Adds a data component to an entity, replacing the value if the entity already has it.
    ///
    /// Returns `false` if the entity does not exist.
    pub fn add_component<T: comp::Component>(&self, entity: Entity, value: T) -> bool {
        if self.set_component(entity, value) {
            return true;
        }
        self.write().restructure(
            entity,
            vec![(TypeInfo::data::<T>(), Value::Column(Box::new(value)))],
            &[],
        )
    }

    /// Removes a component, buffer or shared component of type `T` from an entity.
    ///
    /// Returns `false` if the entity does not exist or does not have the component.
    pub fn remove_component<T: 'static>(&self, entity: Entity) -> bool {
        let ty = DbgTypeId::of::<T>();
        let mut store = self.write();
        if !store.has(entity, ty) {
            return false;
        }
        store.restructure(entity, Vec::new(), &[ty])
    }

    /// Whether the entity has a component, buffer or shared component of type `T`.
    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        self.read().has(entity, DbgTypeId::of::<T>())
    }

    /// Returns a copy of a data component.
    pub fn get_component<T: comp::Component>(&self, entity: Entity) -> Option<T> {
        let store = self.read();
        let (column, row) = store.column_of::<T>(entity, DbgTypeId::of::<T>())?;
        let value = column::read_lock(column)[row];
        Some(value)
    }

    /// Overwrites a data component the entity already has.
    ///
    /// Returns `false` if the entity does not exist or does not have the component.
    pub fn set_component<T: comp::Component>(&self, entity: Entity, value: T) -> bool {
        let store = self.read();
        match store.column_of::<T>(entity, DbgTypeId::of::<T>()) {
            Some((column, row)) => {
                column::write_lock(column)[row] = value;
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the buffer of an entity.
    pub fn get_buffer<T: comp::BufferElement>(&self, entity: Entity) -> Option<Vec<T>> {
        let store = self.read();
        let (column, row) = store.column_of::<Vec<T>>(entity, DbgTypeId::of::<T>())?;
        let buffer = column::read_lock(column)[row].clone();
        Some(buffer)
    }

    /// Replaces the buffer of an entity, adding the buffer type if the entity does not have it.
    ///
    /// Returns `false` if the entity does not exist.
    pub fn set_buffer<T: comp::BufferElement>(&self, entity: Entity, values: Vec<T>) -> bool {
        {
            let store = self.read();
            if let Some((column, row)) = store.column_of::<Vec<T>>(entity, DbgTypeId::of::<T>()) {
                column::write_lock(column)[row] = values;
                return true;
            }
        }
        self.write().restructure(
            entity,
            vec![(TypeInfo::buffer::<T>(), Value::Column(Box::new(values)))],
            &[],
        )
    }

    /// Returns the shared component value of the chunk the entity is in.
    pub fn get_shared_component<T: comp::SharedComponent>(&self, entity: Entity) -> Option<Arc<T>> {
        let store = self.read();
        let value = store.shared_of(entity, DbgTypeId::of::<T>())?;
        Some(Arc::clone(value).downcast::<T>().unwrap_or_else(|_| panic!("TypeId mismatch")))
    }

    /// Sets the shared component value of an entity, moving it to a chunk with the new value.
    ///
    /// Returns `false` if the entity does not exist.
    pub fn set_shared_component<T: comp::SharedComponent>(&self, entity: Entity, value: T) -> bool {
        self.write().restructure(
            entity,
            vec![(TypeInfo::shared::<T>(), Value::Shared(Arc::new(value)))],
            &[],
        )
    }

    /// Returns the group of entities matching all `requirements`.
    ///
    /// Requirement lists describing the same set (ignoring order and repetition)
    /// resolve to the same group.
    pub fn resolve_group(&self, requirements: &[ComponentType]) -> ComponentGroup {
        let desc = self.write().resolve_group(requirements);
        ComponentGroup::new(Arc::clone(&self.store), desc)
    }

    /// Returns a random-access view of a data component by entity.
    pub fn component_lookup<T: comp::Component>(&self, read_only: bool) -> ComponentLookup<T> {
        self.store.read().check_alive();
        ComponentLookup::new(Arc::clone(&self.store), read_only)
    }

    /// Returns a random-access view of a buffer by entity.
    pub fn buffer_lookup<T: comp::BufferElement>(&self, read_only: bool) -> BufferLookup<T> {
        self.store.read().check_alive();
        BufferLookup::new(Arc::clone(&self.store), read_only)
    }
}

impl Manager for EntityManager {
    fn on_create(&self, world: &World, capacity: usize) -> anyhow::Result<()> {
        log::debug!("Entity store attached to world `{}` with capacity {capacity}", world.name());
        self.write().slots.reserve(capacity);
        Ok(())
    }

    fn on_destroy(&self) -> anyhow::Result<()> {
        let mut store = self.store.write();
        log::debug!(
            "Destroying entity store with {} entities in {} chunks of {} archetypes ({} shared)",
            store.live,
            store.chunk_count(),
            store.archetypes.len(),
            store.shared_value_count(),
        );
        store.destroy();
        Ok(())
    }

    fn destroy_last(&self) -> bool { true }
}

/// The shared state behind an [`EntityManager`] and the views it creates.
pub(crate) struct Store {
    config:                   Config,
    /// The kind each component type was first used as.
    kinds:                    HashMap<DbgTypeId, ComponentKind>,
    pub(crate) archetypes:    Vec<Archetype>,
    archetype_index:          HashMap<Vec<DbgTypeId>, usize>,
    slots:                    Vec<Slot>,
    free:                     Vec<u32>,
    live:                     usize,
    /// Interned shared component values per type.
    pub(crate) shared_values: HashMap<DbgTypeId, SharedValues>,
    pub(crate) groups:        Vec<GroupState>,
    group_index:              HashMap<Vec<ComponentType>, usize>,
    destroyed:                bool,
}

struct Slot {
    generation: u32,
    location:   Option<Location>,
}

#[derive(Debug, Clone, Copy)]
struct Location {
    archetype: usize,
    chunk:     usize,
    row:       usize,
}

/// A resolved group and the archetypes it currently matches.
pub(crate) struct GroupState {
    pub(crate) desc:     Arc<GroupDesc>,
    /// Indices into `Store::archetypes`, in archetype creation order.
    pub(crate) matching: Vec<usize>,
}

impl Store {
    fn new(config: Config) -> Self {
        Self {
            config,
            kinds: HashMap::new(),
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            shared_values: HashMap::new(),
            groups: Vec::new(),
            group_index: HashMap::new(),
            destroyed: false,
        }
    }

    pub(crate) fn check_alive(&self) {
        assert!(!self.destroyed, "The entity store has already been destroyed with its world");
    }

    fn destroy(&mut self) {
        self.archetypes.clear();
        self.archetype_index.clear();
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        self.shared_values.clear();
        self.groups.clear();
        self.group_index.clear();
        self.destroyed = true;
    }

    fn register(&mut self, info: &TypeInfo) {
        let kind = *self.kinds.entry(info.ty).or_insert(info.kind);
        assert_eq!(
            kind, info.kind,
            "{} is used both as a {kind} and as a {}",
            info.ty, info.kind
        );
    }

    fn allocate(&mut self) -> Entity {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let generation = self.slots[index as usize].generation;
                Entity { index, generation }
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("too many entities");
                self.slots.push(Slot { generation: 0, location: None });
                Entity { index, generation: 0 }
            }
        }
    }

    fn location(&self, entity: Entity) -> Option<Location> {
        let slot = self.slots.get(entity.usize())?;
        if slot.generation != entity.generation {
            return None;
        }
        slot.location
    }

    fn has(&self, entity: Entity, ty: DbgTypeId) -> bool {
        match self.location(entity) {
            Some(location) => self.archetypes[location.archetype].has(ty),
            None => false,
        }
    }

    pub(crate) fn column_of<V: 'static>(
        &self,
        entity: Entity,
        ty: DbgTypeId,
    ) -> Option<(&Arc<RwLock<Vec<V>>>, usize)> {
        let location = self.location(entity)?;
        let archetype = &self.archetypes[location.archetype];
        let index = archetype.column_index(ty)?;
        let column = &archetype.chunks[location.chunk].columns[index];
        Some((column::typed::<V>(&**column), location.row))
    }

    fn shared_of(&self, entity: Entity, ty: DbgTypeId) -> Option<&SharedValue> {
        let location = self.location(entity)?;
        let archetype = &self.archetypes[location.archetype];
        let index = archetype.shared_index(ty)?;
        let value = archetype.chunks[location.chunk].shared[index];
        Some(self.shared_values[&ty].get(value))
    }

    fn intern(&mut self, info: &TypeInfo, value: SharedValue) -> usize {
        self.shared_values.entry(info.ty).or_default().intern(info, value)
    }

    /// The number of shared component values stored by live chunks.
    pub(crate) fn shared_value_count(&self) -> usize {
        self.shared_values.values().map(SharedValues::len).sum()
    }

    /// The number of live chunks across all archetypes.
    pub(crate) fn chunk_count(&self) -> usize {
        self.archetypes.iter().map(|archetype| archetype.chunks.len()).sum()
    }

    /// Returns the archetype with exactly `types`, creating it if it does not exist.
    fn archetype_for(&mut self, mut types: Vec<TypeInfo>) -> usize {
        types.sort_by_key(|info| info.ty);
        let signature: Vec<DbgTypeId> = types.iter().map(|info| info.ty).collect();
        if let Some(&index) = self.archetype_index.get(&signature) {
            return index;
        }

        let archetype = Archetype::new(types);
        let index = self.archetypes.len();
        for group in &mut self.groups {
            if archetype.matches(&group.desc.requirements) {
                group.matching.push(index);
            }
        }
        log::trace!("Created archetype ({})", archetype.signature().iter().join(", "));
        self.archetypes.push(archetype);
        self.archetype_index.insert(signature, index);
        index
    }

    fn insert_row(
        &mut self,
        entity: Entity,
        archetype_index: usize,
        shared: Vec<usize>,
        mut values: BTreeMap<DbgTypeId, Box<dyn Any + Send>>,
    ) {
        let archetype = &mut self.archetypes[archetype_index];
        let chunk_count = archetype.chunks.len();
        let chunk_index = archetype.chunk_with_room(&shared, self.config.chunk_capacity);
        if chunk_index == chunk_count {
            for (ty, &value) in archetype.shared_types.iter().zip(&shared) {
                self.shared_values.get_mut(ty).expect("shared values are interned").acquire(value);
            }
        }
        let chunk = &mut archetype.chunks[chunk_index];

        for (ty, column) in archetype.column_types.iter().zip(&chunk.columns) {
            let value = values.remove(ty).unwrap_or_else(|| panic!("Missing value for {ty}"));
            column.push_boxed(value);
        }
        column::write_lock(&chunk.entities).push(entity);
        let row = chunk.len;
        chunk.len += 1;

        self.slots[entity.usize()].location =
            Some(Location { archetype: archetype_index, chunk: chunk_index, row });
    }

    /// Removes the row of an entity and returns its column values.
    ///
    /// The last entity of the chunk takes over the vacated row.
    fn remove_row(&mut self, location: Location) -> BTreeMap<DbgTypeId, Box<dyn Any + Send>> {
        let archetype = &mut self.archetypes[location.archetype];
        let chunk = &mut archetype.chunks[location.chunk];

        let values = archetype
            .column_types
            .iter()
            .zip(&chunk.columns)
            .map(|(&ty, column)| (ty, column.swap_remove_boxed(location.row)))
            .collect();

        let moved = {
            let mut entities = column::write_lock(&chunk.entities);
            entities.swap_remove(location.row);
            entities.get(location.row).copied()
        };
        chunk.len -= 1;

        if let Some(moved) = moved {
            let slot = &mut self.slots[moved.usize()];
            slot.location = Some(Location { row: location.row, ..location });
        }
        values
    }

    /// Drops a chunk left empty by [`remove_row`](Self::remove_row),
    /// releasing its shared values.
    ///
    /// The last chunk of the archetype takes over the vacated chunk index.
    fn reclaim_if_empty(&mut self, archetype_index: usize, chunk_index: usize) {
        let archetype = &mut self.archetypes[archetype_index];
        if archetype.chunks[chunk_index].len > 0 {
            return;
        }

        let chunk = archetype.chunks.swap_remove(chunk_index);
        if let Some(moved) = archetype.chunks.get(chunk_index) {
            for &entity in column::read_lock(&moved.entities).iter() {
                if let Some(location) = &mut self.slots[entity.usize()].location {
                    location.chunk = chunk_index;
                }
            }
        }
        for (ty, &value) in archetype.shared_types.iter().zip(&chunk.shared) {
            self.shared_values.get_mut(ty).expect("shared values are interned").release(value);
        }
    }

    /// Moves an entity to the archetype with `add` added and `remove` removed.
    ///
    /// Types in `add` that the entity already has are replaced.
    /// Returns `false` if the entity does not exist.
    fn restructure(
        &mut self,
        entity: Entity,
        add: Vec<(TypeInfo, Value)>,
        remove: &[DbgTypeId],
    ) -> bool {
        let location = match self.location(entity) {
            Some(location) => location,
            None => return false,
        };
        for (info, _) in &add {
            self.register(info);
        }

        let old = &self.archetypes[location.archetype];
        let mut shared: HashMap<DbgTypeId, usize> = old
            .shared_types
            .iter()
            .copied()
            .zip(old.chunks[location.chunk].shared.iter().copied())
            .filter(|(ty, _)| !remove.contains(ty))
            .collect();
        let mut types: Vec<TypeInfo> = old
            .types
            .iter()
            .filter(|info| !remove.contains(&info.ty))
            .filter(|info| add.iter().all(|(added, _)| added.ty != info.ty))
            .copied()
            .collect();

        let mut values = self.remove_row(location);
        values.retain(|ty, _| !remove.contains(ty));

        for (info, value) in add {
            types.push(info);
            match value {
                Value::Column(value) => {
                    values.insert(info.ty, value);
                }
                Value::Shared(value) => {
                    let index = self.intern(&info, value);
                    shared.insert(info.ty, index);
                }
            }
        }

        let archetype = self.archetype_for(types);
        let shared = self.archetypes[archetype].shared_types.iter().map(|ty| shared[ty]).collect();
        self.insert_row(entity, archetype, shared, values);
        self.reclaim_if_empty(location.archetype, location.chunk);
        true
    }

    /// Returns the group for a requirement list, creating it on first use.
    fn resolve_group(&mut self, requirements: &[ComponentType]) -> Arc<GroupDesc> {
        let requirements = GroupDesc::normalize(requirements);
        if let Some(&id) = self.group_index.get(&requirements) {
            return Arc::clone(&self.groups[id].desc);
        }

        let id = self.groups.len();
        let desc = Arc::new(GroupDesc::new(id, requirements.clone()));
        let matching = self
            .archetypes
            .iter()
            .enumerate()
            .filter(|(_, archetype)| archetype.matches(&desc.requirements))
            .map(|(index, _)| index)
            .collect();
        log::debug!("Created component group {id} for ({})", desc.requirements.iter().join(", "));

        self.groups.push(GroupState { desc: Arc::clone(&desc), matching });
        self.group_index.insert(requirements, id);
        desc
    }
}
