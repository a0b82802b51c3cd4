//! A component is a small data structure that can be attached to an entity.
//!
//! Three kinds of components are supported:
//!
//! - [`Component`]s store one plain value per entity.
//!   Zero-sized components act as tags that only affect the structural signature.
//! - [`BufferElement`]s store a variable-length list of values per entity.
//! - [`SharedComponent`]s store one value per *chunk*.
//!   Entities with different shared values are never placed in the same chunk.
//!
//! A type should implement only one of these traits.
//! The entity store panics if the same type is used with two different kinds.
//!
//! # Requirements
//! Systems describe the components they need through [`ComponentType`],
//! which pairs a component type with an [`AccessMode`].
//! Two requirements are the same iff they have the same type and the same access mode.

use std::fmt;

use crate::util::DbgTypeId;

/// A component with one value per entity.
pub trait Component: Copy + Send + Sync + 'static {}

/// An element of a per-entity dynamic buffer.
pub trait BufferElement: Clone + Send + Sync + 'static {}

/// A component with one value per chunk.
///
/// Values are compared with [`PartialEq`] to decide which chunk an entity belongs to.
pub trait SharedComponent: PartialEq + Send + Sync + 'static {}

/// Describes how a component type is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    /// Stored by [`Component`] columns.
    Data,
    /// Stored by [`BufferElement`] list columns.
    Buffer,
    /// Stored once per chunk as a [`SharedComponent`].
    Shared,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Data => write!(f, "component"),
            Self::Buffer => write!(f, "buffer"),
            Self::Shared => write!(f, "shared component"),
        }
    }
}

/// The way a system accesses a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessMode {
    /// The component must be present and is only read.
    ReadOnly,
    /// The component must be present and may be written.
    ReadWrite,
    /// The component must be absent.
    Subtractive,
}

/// A structural requirement on a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentType {
    /// The component type.
    pub ty:     DbgTypeId,
    /// How the component type is stored.
    pub kind:   ComponentKind,
    /// How the component is accessed.
    pub access: AccessMode,
}

impl ComponentType {
    /// Creates a requirement from its parts.
    pub fn new(ty: DbgTypeId, kind: ComponentKind, access: AccessMode) -> Self {
        Self { ty, kind, access }
    }

    /// Requires read-only access to a [`Component`].
    pub fn read_only<T: Component>() -> Self { Self::component::<T>(AccessMode::ReadOnly) }

    /// Requires read-write access to a [`Component`].
    pub fn read_write<T: Component>() -> Self { Self::component::<T>(AccessMode::ReadWrite) }

    /// Requires a [`Component`] to be absent.
    pub fn subtractive<T: Component>() -> Self { Self::component::<T>(AccessMode::Subtractive) }

    /// Requires a [`Component`] with the given access mode.
    pub fn component<T: Component>(access: AccessMode) -> Self {
        Self::new(DbgTypeId::of::<T>(), ComponentKind::Data, access)
    }

    /// Requires a buffer of [`BufferElement`]s with the given access mode.
    pub fn buffer<T: BufferElement>(access: AccessMode) -> Self {
        Self::new(DbgTypeId::of::<T>(), ComponentKind::Buffer, access)
    }

    /// Requires a [`SharedComponent`] with the given access mode.
    pub fn shared<T: SharedComponent>(access: AccessMode) -> Self {
        Self::new(DbgTypeId::of::<T>(), ComponentKind::Shared, access)
    }

    /// Returns the same requirement with another access mode.
    pub fn with_access(self, access: AccessMode) -> Self { Self { access, ..self } }

    /// Whether the requirement only allows reading.
    pub fn is_read_only(&self) -> bool { self.access == AccessMode::ReadOnly }

    /// Whether the requirement excludes the component instead of requiring it.
    pub fn is_subtractive(&self) -> bool { self.access == AccessMode::Subtractive }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let access = match self.access {
            AccessMode::ReadOnly => "read-only",
            AccessMode::ReadWrite => "read-write",
            AccessMode::Subtractive => "subtractive",
        };
        write!(f, "{access} {} {}", self.kind, self.ty.short_name())
    }
}
