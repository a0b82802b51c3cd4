use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::column::{new_column, AnyColumn};
use crate::comp::{self, ComponentKind};
use crate::util::DbgTypeId;

/// Runtime information about a component type, captured from its static type.
#[derive(Clone, Copy)]
pub(crate) struct TypeInfo {
    pub(crate) ty:         DbgTypeId,
    pub(crate) kind:       ComponentKind,
    pub(crate) new_column: fn() -> Arc<dyn AnyColumn>,
    pub(crate) shared_eq:  fn(&dyn Any, &dyn Any) -> bool,
}

fn never_eq(_: &dyn Any, _: &dyn Any) -> bool { false }

fn shared_eq<T: comp::SharedComponent>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn no_column() -> Arc<dyn AnyColumn> {
    panic!("Shared components are stored per chunk and have no column")
}

impl TypeInfo {
    pub(crate) fn data<T: comp::Component>() -> Self {
        Self {
            ty:         DbgTypeId::of::<T>(),
            kind:       ComponentKind::Data,
            new_column: new_column::<T>,
            shared_eq:  never_eq,
        }
    }

    pub(crate) fn buffer<T: comp::BufferElement>() -> Self {
        Self {
            ty:         DbgTypeId::of::<T>(),
            kind:       ComponentKind::Buffer,
            new_column: new_column::<Vec<T>>,
            shared_eq:  never_eq,
        }
    }

    pub(crate) fn shared<T: comp::SharedComponent>() -> Self {
        Self {
            ty:         DbgTypeId::of::<T>(),
            kind:       ComponentKind::Shared,
            new_column: no_column,
            shared_eq:  shared_eq::<T>,
        }
    }
}

/// A component value before it is inserted into a chunk.
pub(crate) enum Value {
    /// A `Box<T>` for data components or a `Box<Vec<T>>` for buffers.
    Column(Box<dyn Any + Send>),
    /// A shared component value, interned by the store.
    Shared(Arc<dyn Any + Send + Sync>),
}

/// The initial components of an entity.
///
/// ```
/// # use injecs::comp::{BufferElement, Component, SharedComponent};
/// # use injecs::storage::{ComponentSet, EntityManager};
/// #[derive(Clone, Copy)]
/// struct Position(f32);
/// impl Component for Position {}
///
/// #[derive(Clone)]
/// struct Waypoint(f32);
/// impl BufferElement for Waypoint {}
///
/// #[derive(PartialEq)]
/// struct Team(u8);
/// impl SharedComponent for Team {}
///
/// let store = EntityManager::default();
/// let entity = store.create_entity(
///     ComponentSet::new()
///         .with(Position(1.0))
///         .with_buffer(vec![Waypoint(2.0)])
///         .with_shared(Team(3)),
/// );
/// assert!(store.has_component::<Position>(entity));
/// ```
#[derive(Default)]
pub struct ComponentSet {
    pub(crate) entries: BTreeMap<DbgTypeId, (TypeInfo, Value)>,
}

impl ComponentSet {
    /// Creates an empty set.
    pub fn new() -> Self { Self::default() }

    /// Adds a data component, replacing any previous value of the same type.
    pub fn with<T: comp::Component>(mut self, value: T) -> Self {
        self.insert(TypeInfo::data::<T>(), Value::Column(Box::new(value)));
        self
    }

    /// Adds a dynamic buffer.
    pub fn with_buffer<T: comp::BufferElement>(mut self, values: Vec<T>) -> Self {
        self.insert(TypeInfo::buffer::<T>(), Value::Column(Box::new(values)));
        self
    }

    /// Adds a shared component.
    pub fn with_shared<T: comp::SharedComponent>(mut self, value: T) -> Self {
        self.insert(TypeInfo::shared::<T>(), Value::Shared(Arc::new(value)));
        self
    }

    /// The number of component types in the set.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the set has no components.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub(crate) fn insert(&mut self, info: TypeInfo, value: Value) {
        self.entries.insert(info.ty, (info, value));
    }
}
