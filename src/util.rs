//! Miscellaneous helpers shared across modules.

use std::any::{self, TypeId};
use std::{cmp, fmt, hash};

/// A [`TypeId`] that also remembers the name of the type for diagnostics.
///
/// Equality, ordering and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct DbgTypeId {
    /// The underlying type ID.
    pub id:   TypeId,
    /// The name of the type as returned by [`any::type_name`].
    pub name: &'static str,
}

impl DbgTypeId {
    /// Creates a new [`DbgTypeId`] for the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: any::type_name::<T>() }
    }

    /// The type name without its module path, used in short messages.
    pub fn short_name(&self) -> &'static str {
        let generic_start = match self.name.find('<') {
            Some(0) | None => self.name.len(),
            Some(index) => index,
        };
        match self.name[..generic_start].rfind("::") {
            Some(index) => &self.name[index + 2..generic_start],
            None => &self.name[..generic_start],
        }
    }
}

impl fmt::Debug for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.name) }
}

impl fmt::Display for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.name) }
}

impl PartialEq for DbgTypeId {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for DbgTypeId {}

impl PartialOrd for DbgTypeId {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for DbgTypeId {
    fn cmp(&self, other: &Self) -> cmp::Ordering { self.id.cmp(&other.id) }
}

impl hash::Hash for DbgTypeId {
    fn hash<H: hash::Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

impl PartialEq<TypeId> for DbgTypeId {
    fn eq(&self, other: &TypeId) -> bool { self.id == *other }
}
