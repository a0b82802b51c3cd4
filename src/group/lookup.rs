use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::comp;
use crate::storage::column::{read_lock, write_lock};
use crate::storage::Store;
use crate::util::DbgTypeId;
use crate::Entity;

fn read_store(store: &Option<Arc<RwLock<Store>>>) -> RwLockReadGuard<'_, Store> {
    let store = match store {
        Some(store) => store.read(),
        None => panic!("The lookup has not been injected yet"),
    };
    store.check_alive();
    store
}

/// Random access to a data component by entity.
///
/// The closures passed to lookup methods must not create, destroy or restructure entities.
pub struct ComponentLookup<T> {
    store:     Option<Arc<RwLock<Store>>>,
    read_only: bool,
    _ph:       PhantomData<fn() -> T>,
}

impl<T> Default for ComponentLookup<T> {
    fn default() -> Self { Self { store: None, read_only: true, _ph: PhantomData } }
}

impl<T: comp::Component> ComponentLookup<T> {
    pub(crate) fn new(store: Arc<RwLock<Store>>, read_only: bool) -> Self {
        Self { store: Some(store), read_only, _ph: PhantomData }
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool { self.read_only }

    /// Whether `entity` exists and has the component.
    pub fn exists(&self, entity: Entity) -> bool {
        read_store(&self.store).column_of::<T>(entity, DbgTypeId::of::<T>()).is_some()
    }

    /// Returns a copy of the component of `entity`.
    pub fn get(&self, entity: Entity) -> Option<T> {
        let store = read_store(&self.store);
        let (column, row) = store.column_of::<T>(entity, DbgTypeId::of::<T>())?;
        let value = read_lock(column)[row];
        Some(value)
    }

    /// Overwrites the component of `entity`.
    ///
    /// Returns `false` if the entity does not have the component.
    ///
    /// # Panics
    /// Panics if the lookup is read-only.
    pub fn set(&self, entity: Entity, value: T) -> bool {
        self.update(entity, |slot| *slot = value).is_some()
    }

    /// Updates the component of `entity` in place.
    pub fn update<R>(&self, entity: Entity, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        assert!(
            !self.read_only,
            "Cannot write through a read-only lookup of {}",
            DbgTypeId::of::<T>()
        );
        let store = read_store(&self.store);
        let (column, row) = store.column_of::<T>(entity, DbgTypeId::of::<T>())?;
        let mut guard = write_lock(column);
        Some(f(&mut guard[row]))
    }
}

/// Random access to a buffer by entity.
///
/// The closures passed to lookup methods must not create, destroy or restructure entities.
pub struct BufferLookup<T> {
    store:     Option<Arc<RwLock<Store>>>,
    read_only: bool,
    _ph:       PhantomData<fn() -> T>,
}

impl<T> Default for BufferLookup<T> {
    fn default() -> Self { Self { store: None, read_only: true, _ph: PhantomData } }
}

impl<T: comp::BufferElement> BufferLookup<T> {
    pub(crate) fn new(store: Arc<RwLock<Store>>, read_only: bool) -> Self {
        Self { store: Some(store), read_only, _ph: PhantomData }
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool { self.read_only }

    /// Whether `entity` exists and has the buffer.
    pub fn exists(&self, entity: Entity) -> bool {
        read_store(&self.store).column_of::<Vec<T>>(entity, DbgTypeId::of::<T>()).is_some()
    }

    /// Returns a copy of the buffer of `entity`.
    pub fn get(&self, entity: Entity) -> Option<Vec<T>> { self.with(entity, <[T]>::to_vec) }

    /// Reads the buffer of `entity`.
    pub fn with<R>(&self, entity: Entity, f: impl FnOnce(&[T]) -> R) -> Option<R> {
        let store = read_store(&self.store);
        let (column, row) = store.column_of::<Vec<T>>(entity, DbgTypeId::of::<T>())?;
        let guard = read_lock(column);
        Some(f(&guard[row]))
    }

    /// Modifies the buffer of `entity`.
    ///
    /// # Panics
    /// Panics if the lookup is read-only.
    pub fn with_mut<R>(&self, entity: Entity, f: impl FnOnce(&mut Vec<T>) -> R) -> Option<R> {
        assert!(
            !self.read_only,
            "Cannot write through a read-only lookup of {}",
            DbgTypeId::of::<T>()
        );
        let store = read_store(&self.store);
        let (column, row) = store.column_of::<Vec<T>>(entity, DbgTypeId::of::<T>())?;
        let mut guard = write_lock(column);
        Some(f(&mut guard[row]))
    }
}
