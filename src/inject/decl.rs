use std::any::Any;

use crate::comp::{self, AccessMode, ComponentType};
use crate::group::{BufferArray, ChunkIterator, ComponentArray, EntityArray, SharedComponentArray};
use crate::util::DbgTypeId;

/// The name of a `usize` field receiving the number of entities in the group on every refresh.
pub const LENGTH_FIELD: &str = "length";

/// The name of a `usize` field receiving the position of the group
/// among the groups of its system, written once at setup.
pub const GROUP_INDEX_FIELD: &str = "group_index";

/// An aggregate of arrays over the entities matching one query.
pub trait GroupData: Send + 'static {
    /// Declares the injected fields of the aggregate.
    fn declare(decl: &mut AggregateDecl<Self>)
    where
        Self: Sized;
}

pub(crate) type ArrayWriter<G> = Box<dyn Fn(&mut G, &ChunkIterator, usize, bool) + Send + Sync>;
pub(crate) type EntityWriter<G> = Box<dyn Fn(&mut G, &ChunkIterator) + Send + Sync>;
pub(crate) type CounterWriter<G> = Box<dyn Fn(&mut G, usize) + Send + Sync>;

/// Projects a field whose type is only known to the hook handling it.
pub(crate) trait CustomSlot<G>: Send + Sync {
    fn get<'t>(&self, target: &'t mut G) -> &'t mut dyn Any;
}

struct FieldSlot<G, F> {
    accessor: fn(&mut G) -> &mut F,
}

impl<G: 'static, F: Any> CustomSlot<G> for FieldSlot<G, F> {
    fn get<'t>(&self, target: &'t mut G) -> &'t mut dyn Any { (self.accessor)(target) }
}

struct Nested<S, G> {
    outer: fn(&mut S) -> &mut G,
    inner: Box<dyn CustomSlot<G>>,
}

impl<S: 'static, G: 'static> CustomSlot<S> for Nested<S, G> {
    fn get<'t>(&self, target: &'t mut S) -> &'t mut dyn Any { self.inner.get((self.outer)(target)) }
}

pub(crate) enum FieldShape<G> {
    ComponentArray { ty: ComponentType, write: ArrayWriter<G> },
    BufferArray { ty: ComponentType, write: ArrayWriter<G> },
    SharedComponentArray { ty: ComponentType, write: ArrayWriter<G> },
    Subtractive { ty: ComponentType },
    EntityArray { write: EntityWriter<G> },
    Int { write: CounterWriter<G> },
    Custom { field_type: DbgTypeId, slot: Box<dyn CustomSlot<G>> },
}

/// The shapes an aggregate field can take without a hook.
pub(crate) const SUPPORTED_SHAPES: &str = "ComponentArray<T>, BufferArray<T>, read-only \
                                           SharedComponentArray<T>, Subtractive<T>, EntityArray, \
                                           read-only usize named `length` or `group_index`, and \
                                           types claimed by a registered injection hook";

pub(crate) struct DeclaredField<G> {
    pub(crate) name:      &'static str,
    pub(crate) read_only: bool,
    pub(crate) shape:     FieldShape<G>,
}

impl<G: 'static> DeclaredField<G> {
    /// Rebases the field onto a type containing the aggregate.
    pub(crate) fn nest<S: 'static>(self, outer: fn(&mut S) -> &mut G) -> DeclaredField<S> {
        let shape = match self.shape {
            FieldShape::ComponentArray { ty, write } => {
                FieldShape::ComponentArray { ty, write: nest_array(outer, write) }
            }
            FieldShape::BufferArray { ty, write } => {
                FieldShape::BufferArray { ty, write: nest_array(outer, write) }
            }
            FieldShape::SharedComponentArray { ty, write } => {
                FieldShape::SharedComponentArray { ty, write: nest_array(outer, write) }
            }
            FieldShape::Subtractive { ty } => FieldShape::Subtractive { ty },
            FieldShape::EntityArray { write } => FieldShape::EntityArray {
                write: Box::new(move |target: &mut S, iter: &ChunkIterator| {
                    write(outer(target), iter)
                }),
            },
            FieldShape::Int { write } => FieldShape::Int {
                write: Box::new(move |target: &mut S, value: usize| write(outer(target), value)),
            },
            FieldShape::Custom { field_type, slot } => {
                FieldShape::Custom { field_type, slot: Box::new(Nested { outer, inner: slot }) }
            }
        };
        DeclaredField { name: self.name, read_only: self.read_only, shape }
    }
}

fn nest_array<S: 'static, G: 'static>(
    outer: fn(&mut S) -> &mut G,
    write: ArrayWriter<G>,
) -> ArrayWriter<S> {
    Box::new(move |target: &mut S, iter: &ChunkIterator, index: usize, read_only: bool| {
        write(outer(target), iter, index, read_only)
    })
}

/// Describes an injected field to injection hooks.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// The type name of the system declaring the field.
    pub system:     &'static str,
    /// The path of the field in the system, e.g. `movers.position`.
    pub path:       String,
    /// The declared type of the field.
    pub field_type: DbgTypeId,
    /// Whether the field was declared read-only.
    pub read_only:  bool,
}

/// Collects the field declarations of an aggregate of type `G`.
///
/// Fields are declared with a name used in diagnostics
/// and an accessor projecting the aggregate to the field.
pub struct AggregateDecl<G> {
    pub(crate) fields: Vec<DeclaredField<G>>,
}

impl<G: 'static> AggregateDecl<G> {
    pub(crate) fn new() -> Self { Self { fields: Vec::new() } }

    fn push(&mut self, name: &'static str, read_only: bool, shape: FieldShape<G>) -> &mut Self {
        self.fields.push(DeclaredField { name, read_only, shape });
        self
    }

    /// Declares an array of a data component.
    pub fn component_array<T: comp::Component>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut G) -> &mut ComponentArray<T>,
    ) -> &mut Self {
        let ty = ComponentType::component::<T>(access_mode(read_only));
        let write: ArrayWriter<G> =
            Box::new(move |target: &mut G, iter: &ChunkIterator, index: usize, read_only: bool| {
                *accessor(target) = iter.component_array::<T>(index, read_only);
            });
        self.push(name, read_only, FieldShape::ComponentArray { ty, write })
    }

    /// Declares an array of buffers.
    pub fn buffer_array<T: comp::BufferElement>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut G) -> &mut BufferArray<T>,
    ) -> &mut Self {
        let ty = ComponentType::buffer::<T>(access_mode(read_only));
        let write: ArrayWriter<G> =
            Box::new(move |target: &mut G, iter: &ChunkIterator, index: usize, read_only: bool| {
                *accessor(target) = iter.buffer_array::<T>(index, read_only);
            });
        self.push(name, read_only, FieldShape::BufferArray { ty, write })
    }

    /// Declares an array of a shared component.
    ///
    /// Shared components can only be injected read-only;
    /// declaring a writable one fails the setup.
    pub fn shared_component_array<T: comp::SharedComponent>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut G) -> &mut SharedComponentArray<T>,
    ) -> &mut Self {
        let ty = ComponentType::shared::<T>(AccessMode::ReadOnly);
        let write: ArrayWriter<G> =
            Box::new(move |target: &mut G, iter: &ChunkIterator, index: usize, _: bool| {
                *accessor(target) = iter.shared_component_array::<T>(index);
            });
        self.push(name, read_only, FieldShape::SharedComponentArray { ty, write })
    }

    /// Excludes entities having the component `T`.
    pub fn subtractive<T: comp::Component>(&mut self, name: &'static str) -> &mut Self {
        let ty = ComponentType::subtractive::<T>();
        self.push(name, true, FieldShape::Subtractive { ty })
    }

    /// Excludes entities having the shared component `T`.
    pub fn subtractive_shared<T: comp::SharedComponent>(
        &mut self,
        name: &'static str,
    ) -> &mut Self {
        let ty = ComponentType::shared::<T>(AccessMode::Subtractive);
        self.push(name, true, FieldShape::Subtractive { ty })
    }

    /// Declares the array of entity handles. An aggregate can have at most one.
    pub fn entity_array(
        &mut self,
        name: &'static str,
        accessor: fn(&mut G) -> &mut EntityArray,
    ) -> &mut Self {
        let write: EntityWriter<G> = Box::new(move |target: &mut G, iter: &ChunkIterator| {
            *accessor(target) = iter.entity_array();
        });
        self.push(name, true, FieldShape::EntityArray { write })
    }

    /// Declares a counter field.
    ///
    /// Only read-only fields named [`LENGTH_FIELD`] or [`GROUP_INDEX_FIELD`] are supported.
    pub fn int(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut G) -> &mut usize,
    ) -> &mut Self {
        let write: CounterWriter<G> =
            Box::new(move |target: &mut G, value: usize| *accessor(target) = value);
        self.push(name, read_only, FieldShape::Int { write })
    }

    /// Declares a field of a type handled by an [`InjectionHook`](super::InjectionHook).
    pub fn custom<F: Any + Send>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut G) -> &mut F,
    ) -> &mut Self {
        let field_type = DbgTypeId::of::<F>();
        self.push(name, read_only, FieldShape::Custom {
            field_type,
            slot: Box::new(FieldSlot { accessor }),
        })
    }
}

pub(crate) fn access_mode(read_only: bool) -> AccessMode {
    match read_only {
        true => AccessMode::ReadOnly,
        false => AccessMode::ReadWrite,
    }
}
