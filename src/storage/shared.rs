use std::any::Any;
use std::sync::Arc;

use super::comp_set::TypeInfo;

pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

struct Interned {
    value:  SharedValue,
    /// The number of chunks storing this value.
    chunks: usize,
}

/// The distinct values of one shared component type, addressed by stable indices.
///
/// A value is released when the last chunk storing it is reclaimed,
/// and its index is reused for the next new value.
#[derive(Default)]
pub(crate) struct SharedValues {
    slots: Vec<Option<Interned>>,
    free:  Vec<usize>,
}

impl SharedValues {
    /// Returns the index of an equal live value, interning `value` if it is new.
    ///
    /// A new value is not retained until a chunk [acquires](Self::acquire) it.
    pub(crate) fn intern(&mut self, info: &TypeInfo, value: SharedValue) -> usize {
        let existing = self.slots.iter().position(|slot| match slot {
            Some(interned) => (info.shared_eq)(&*interned.value, &*value),
            None => false,
        });
        if let Some(index) = existing {
            return index;
        }

        let interned = Some(Interned { value, chunks: 0 });
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = interned;
                index
            }
            None => {
                self.slots.push(interned);
                self.slots.len() - 1
            }
        }
    }

    pub(crate) fn get(&self, index: usize) -> &SharedValue { &self.live(index).value }

    /// Records that a new chunk stores the value at `index`.
    pub(crate) fn acquire(&mut self, index: usize) {
        self.slots[index].as_mut().expect("chunks only refer to live values").chunks += 1;
    }

    /// Records that a chunk storing the value at `index` was reclaimed.
    pub(crate) fn release(&mut self, index: usize) {
        let interned = self.slots[index].as_mut().expect("chunks only refer to live values");
        interned.chunks -= 1;
        if interned.chunks == 0 {
            self.slots[index] = None;
            self.free.push(index);
        }
    }

    /// The number of live values.
    pub(crate) fn len(&self) -> usize { self.slots.len() - self.free.len() }

    fn live(&self, index: usize) -> &Interned {
        self.slots[index].as_ref().expect("chunks only refer to live values")
    }
}
