//! Views over the chunks of a [`ChunkIterator`](super::ChunkIterator) snapshot.
//!
//! Arrays address entities by their position in the snapshot,
//! which concatenates chunks in iteration order.
//! They hold shared references to chunk columns
//! and lock a column only for the duration of each access.

use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::comp;
use crate::storage::column::{read_lock, write_lock};
use crate::Entity;

/// Maps snapshot positions to chunk-local rows.
struct Chunked<V> {
    chunks: Vec<(Arc<RwLock<Vec<V>>>, usize)>,
    /// The snapshot position of the first row of each chunk.
    starts: Vec<usize>,
    len:    usize,
}

impl<V> Default for Chunked<V> {
    fn default() -> Self { Self { chunks: Vec::new(), starts: Vec::new(), len: 0 } }
}

fn stale() -> ! {
    panic!("The array is stale because entities were moved after it was created; refresh it first")
}

impl<V> Chunked<V> {
    fn new(chunks: Vec<(Arc<RwLock<Vec<V>>>, usize)>) -> Self {
        let (starts, len) = layout(chunks.iter().map(|&(_, len)| len));
        Self { chunks, starts, len }
    }

    fn locate(&self, index: usize) -> (&RwLock<Vec<V>>, usize) {
        let (chunk, row) = locate(&self.starts, self.len, index);
        (&self.chunks[chunk].0, row)
    }

    fn with<R>(&self, index: usize, f: impl FnOnce(&V) -> R) -> R {
        let (data, row) = self.locate(index);
        let guard = read_lock(data);
        f(guard.get(row).unwrap_or_else(|| stale()))
    }

    fn with_mut<R>(&self, index: usize, f: impl FnOnce(&mut V) -> R) -> R {
        let (data, row) = self.locate(index);
        let mut guard = write_lock(data);
        f(guard.get_mut(row).unwrap_or_else(|| stale()))
    }

    fn for_each_chunk(&self, mut f: impl FnMut(&[V])) {
        for (data, len) in &self.chunks {
            let guard = read_lock(data);
            f(guard.get(..*len).unwrap_or_else(|| stale()));
        }
    }

    fn for_each_chunk_mut(&self, mut f: impl FnMut(&mut [V])) {
        for (data, len) in &self.chunks {
            let mut guard = write_lock(data);
            f(guard.get_mut(..*len).unwrap_or_else(|| stale()));
        }
    }
}

fn layout(lens: impl Iterator<Item = usize>) -> (Vec<usize>, usize) {
    let mut starts = Vec::new();
    let mut total = 0;
    for len in lens {
        starts.push(total);
        total += len;
    }
    (starts, total)
}

/// Returns the chunk and row of a snapshot position.
fn locate(starts: &[usize], len: usize, index: usize) -> (usize, usize) {
    assert!(index < len, "Index {index} is out of bounds for an array of length {len}");
    let chunk = starts.partition_point(|&start| start <= index) - 1;
    (chunk, index - starts[chunk])
}

/// A view of one data component type for every entity in a group.
pub struct ComponentArray<T> {
    inner:     Chunked<T>,
    read_only: bool,
}

impl<T> Default for ComponentArray<T> {
    fn default() -> Self { Self { inner: Chunked::default(), read_only: true } }
}

impl<T: comp::Component> ComponentArray<T> {
    pub(super) fn new(chunks: Vec<(Arc<RwLock<Vec<T>>>, usize)>, read_only: bool) -> Self {
        Self { inner: Chunked::new(chunks), read_only }
    }

    /// The number of entities in the array.
    pub fn len(&self) -> usize { self.inner.len }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool { self.inner.len == 0 }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool { self.read_only }

    fn assert_writable(&self) {
        assert!(
            !self.read_only,
            "Cannot write to a read-only array of {}",
            std::any::type_name::<T>()
        );
    }

    /// Returns a copy of the component at `index`.
    pub fn get(&self, index: usize) -> T { self.inner.with(index, |value| *value) }

    /// Overwrites the component at `index`.
    ///
    /// # Panics
    /// Panics if the array is read-only.
    pub fn set(&self, index: usize, value: T) {
        self.assert_writable();
        self.inner.with_mut(index, |slot| *slot = value);
    }

    /// Updates the component at `index` in place.
    pub fn update<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> R {
        self.assert_writable();
        self.inner.with_mut(index, f)
    }

    /// Copies all components into a vector in array order.
    pub fn to_vec(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.inner.len);
        self.inner.for_each_chunk(|chunk| values.extend_from_slice(chunk));
        values
    }

    /// Calls `f` on the components of each chunk in array order.
    pub fn for_each_chunk(&self, f: impl FnMut(&[T])) { self.inner.for_each_chunk(f) }

    /// Calls `f` on the mutable components of each chunk in array order.
    pub fn for_each_chunk_mut(&self, f: impl FnMut(&mut [T])) {
        self.assert_writable();
        self.inner.for_each_chunk_mut(f)
    }

    /// Calls `f` on the mutable components of each chunk in parallel.
    ///
    /// # Panics
    /// Panics if another array holds a lock on one of the chunks.
    pub fn par_for_each_chunk_mut(&self, f: impl Fn(&mut [T]) + Send + Sync) {
        self.assert_writable();
        self.inner.chunks.par_iter().for_each(|(data, len)| {
            let mut guard = write_lock(data);
            f(guard.get_mut(..*len).unwrap_or_else(|| stale()));
        });
    }
}

/// A view of one buffer type for every entity in a group.
pub struct BufferArray<T> {
    inner:     Chunked<Vec<T>>,
    read_only: bool,
}

impl<T> Default for BufferArray<T> {
    fn default() -> Self { Self { inner: Chunked::default(), read_only: true } }
}

impl<T: comp::BufferElement> BufferArray<T> {
    pub(super) fn new(chunks: Vec<(Arc<RwLock<Vec<Vec<T>>>>, usize)>, read_only: bool) -> Self {
        Self { inner: Chunked::new(chunks), read_only }
    }

    /// The number of entities in the array.
    pub fn len(&self) -> usize { self.inner.len }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool { self.inner.len == 0 }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool { self.read_only }

    /// Returns a copy of the buffer at `index`.
    pub fn get(&self, index: usize) -> Vec<T> { self.inner.with(index, Vec::clone) }

    /// The number of elements in the buffer at `index`.
    pub fn len_of(&self, index: usize) -> usize { self.inner.with(index, Vec::len) }

    /// Reads the buffer at `index`.
    pub fn with<R>(&self, index: usize, f: impl FnOnce(&[T]) -> R) -> R {
        self.inner.with(index, |buffer| f(buffer))
    }

    /// Modifies the buffer at `index`.
    ///
    /// # Panics
    /// Panics if the array is read-only.
    pub fn with_mut<R>(&self, index: usize, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        assert!(
            !self.read_only,
            "Cannot write to a read-only buffer array of {}",
            std::any::type_name::<T>()
        );
        self.inner.with_mut(index, f)
    }
}

/// A read-only view of a shared component for every entity in a group.
///
/// All entities of a chunk share one value.
pub struct SharedComponentArray<T> {
    values: Vec<(Arc<T>, usize)>,
    starts: Vec<usize>,
    len:    usize,
}

impl<T> Default for SharedComponentArray<T> {
    fn default() -> Self { Self { values: Vec::new(), starts: Vec::new(), len: 0 } }
}

impl<T: comp::SharedComponent> SharedComponentArray<T> {
    pub(super) fn new(values: Vec<(Arc<T>, usize)>) -> Self {
        let (starts, len) = layout(values.iter().map(|&(_, len)| len));
        Self { values, starts, len }
    }

    /// The number of entities in the array.
    pub fn len(&self) -> usize { self.len }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the shared value of the entity at `index`.
    pub fn get(&self, index: usize) -> &T {
        let (chunk, _) = locate(&self.starts, self.len, index);
        &self.values[chunk].0
    }

    /// Iterates over the value of each chunk together with the number of entities in it.
    pub fn chunk_values(&self) -> impl Iterator<Item = (&T, usize)> + '_ {
        self.values.iter().map(|(value, len)| (&**value, *len))
    }
}

/// The entity handles of every entity in a group.
#[derive(Default)]
pub struct EntityArray {
    inner: Chunked<Entity>,
}

impl EntityArray {
    pub(super) fn new(chunks: Vec<(Arc<RwLock<Vec<Entity>>>, usize)>) -> Self {
        Self { inner: Chunked::new(chunks) }
    }

    /// The number of entities in the array.
    pub fn len(&self) -> usize { self.inner.len }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool { self.inner.len == 0 }

    /// Returns the entity at `index`.
    pub fn get(&self, index: usize) -> Entity { self.inner.with(index, |&entity| entity) }

    /// Copies all entity handles into a vector in array order.
    pub fn to_vec(&self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(self.inner.len);
        self.inner.for_each_chunk(|chunk| entities.extend_from_slice(chunk));
        entities
    }
}
