use std::any::Any;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A type-erased column of per-entity values in a chunk.
pub(crate) trait AnyColumn: Send + Sync {
    fn len(&self) -> usize;

    /// Appends a value, which must be a `Box<V>` for a `Column<V>`.
    fn push_boxed(&self, value: Box<dyn Any + Send>);

    /// Removes the value at `row` and moves the last value into its place.
    fn swap_remove_boxed(&self, row: usize) -> Box<dyn Any + Send>;

    fn as_any(&self) -> &dyn Any;
}

/// A column storing values of type `V`.
///
/// The data is shared with array views created by chunk iterators,
/// so that views stay usable after the store lock is released.
pub(crate) struct Column<V> {
    pub(crate) data: Arc<RwLock<Vec<V>>>,
}

pub(crate) fn new_column<V: Send + Sync + 'static>() -> Arc<dyn AnyColumn> {
    Arc::new(Column::<V> { data: Arc::new(RwLock::new(Vec::new())) })
}

impl<V: Send + Sync + 'static> AnyColumn for Column<V> {
    fn len(&self) -> usize { read_lock(&self.data).len() }

    fn push_boxed(&self, value: Box<dyn Any + Send>) {
        let value = match value.downcast::<V>() {
            Ok(value) => *value,
            Err(_) => panic!("Expected a value of type {}", std::any::type_name::<V>()),
        };
        write_lock(&self.data).push(value);
    }

    fn swap_remove_boxed(&self, row: usize) -> Box<dyn Any + Send> {
        Box::new(write_lock(&self.data).swap_remove(row))
    }

    fn as_any(&self) -> &dyn Any { self }
}

/// Downcasts a type-erased column to its typed data.
pub(crate) fn typed<V: 'static>(column: &dyn AnyColumn) -> &Arc<RwLock<Vec<V>>> {
    match column.as_any().downcast_ref::<Column<V>>() {
        Some(column) => &column.data,
        None => panic!("Column does not store values of type {}", std::any::type_name::<V>()),
    }
}

/// Acquires shared access to column data.
///
/// # Panics
/// Panics if the column is exclusively locked, which happens when a system holds
/// a mutable view on the same chunk from another thread or from an enclosing closure.
pub(crate) fn read_lock<V>(data: &RwLock<Vec<V>>) -> RwLockReadGuard<'_, Vec<V>> {
    match data.try_read() {
        Some(guard) => guard,
        None => panic!(
            "A column of {} is currently exclusively locked. Maybe scheduler bug?",
            std::any::type_name::<V>()
        ),
    }
}

/// Acquires exclusive access to column data.
///
/// # Panics
/// Panics if the column is locked by anyone else.
pub(crate) fn write_lock<V>(data: &RwLock<Vec<V>>) -> RwLockWriteGuard<'_, Vec<V>> {
    match data.try_write() {
        Some(guard) => guard,
        None => panic!(
            "A column of {} is currently locked by another accessor. Maybe scheduler bug?",
            std::any::type_name::<V>()
        ),
    }
}
