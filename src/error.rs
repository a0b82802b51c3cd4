//! Error types for system setup and world lifecycle misuse.
//!
//! Setup errors are detected once, when a system is injected,
//! and always carry the system type name and the offending field path.
//! Per-tick refresh has no recoverable failure path;
//! contract violations there are programming errors and panic instead.

use thiserror::Error;

/// An error in the declaration of a system's injected fields.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Injection targets must belong to the system instance.
    #[error("{system}::{field}: static fields cannot be injected")]
    StaticField {
        /// The system type name.
        system: &'static str,
        /// The field path.
        field:  String,
    },

    /// The field shape is not handled by any built-in case or registered hook.
    #[error("{system}::{field}: unsupported field shape {shape}; supported shapes are {supported}")]
    UnsupportedField {
        /// The system type name.
        system:    &'static str,
        /// The field path.
        field:     String,
        /// Describes the declared shape.
        shape:     String,
        /// Lists the supported shapes.
        supported: String,
    },

    /// An aggregate declared more than one entity array.
    #[error(
        "{system}::{field}: an aggregate can only declare one entity array, `{first}` is already \
         declared"
    )]
    DuplicateEntityArray {
        /// The system type name.
        system: &'static str,
        /// The path of the second entity array.
        field:  String,
        /// The name of the first entity array.
        first:  &'static str,
    },

    /// Shared components can only be read.
    #[error("{system}::{field}: shared component arrays must be read-only")]
    WritableSharedComponent {
        /// The system type name.
        system: &'static str,
        /// The field path.
        field:  String,
    },

    /// `length` and `group_index` counters are written by the injector only.
    #[error("{system}::{field}: `length` and `group_index` counters must be declared read-only")]
    MutableCounter {
        /// The system type name.
        system: &'static str,
        /// The field path.
        field:  String,
    },

    /// A `length` or `group_index` counter was declared twice in one aggregate.
    #[error("{system}::{field}: the counter is already declared in this aggregate")]
    DuplicateCounter {
        /// The system type name.
        system: &'static str,
        /// The path of the second declaration.
        field:  String,
    },

    /// The same component type was declared twice in one aggregate.
    #[error("{system}::{field}: component {component} is already required by another field")]
    DuplicateComponent {
        /// The system type name.
        system:    &'static str,
        /// The field path of the second declaration.
        field:     String,
        /// The duplicated component.
        component: String,
    },

    /// A component type is both required and excluded.
    #[error("{system}::{field}: component {component} is both required and excluded")]
    ConflictingRequirement {
        /// The system type name.
        system:    &'static str,
        /// The field path.
        field:     String,
        /// The conflicting component.
        component: String,
    },

    /// More than one registered hook claims the same field.
    #[error("{system}::{field}: both hook `{first}` and hook `{second}` claim this field")]
    AmbiguousHook {
        /// The system type name.
        system: &'static str,
        /// The field path.
        field:  String,
        /// The name of the first interested hook.
        first:  String,
        /// The name of the second interested hook.
        second: String,
    },

    /// A hook rejected the field during validation.
    #[error("{system}::{field}: rejected by hook `{hook}`: {message}")]
    HookRejected {
        /// The system type name.
        system:  &'static str,
        /// The field path.
        field:   String,
        /// The name of the rejecting hook.
        hook:    String,
        /// The message returned by the hook.
        message: String,
    },

    /// A manager field could not be resolved from the world.
    #[error("{system}::{field}: cannot resolve manager")]
    Manager {
        /// The system type name.
        system: &'static str,
        /// The field path.
        field:  String,
        /// The world error.
        #[source]
        source: WorldError,
    },
}

/// An error from misusing the lifecycle of a [`World`](crate::World).
#[derive(Debug, Error)]
pub enum WorldError {
    /// The world has already been disposed.
    #[error("world `{world}` has already been disposed")]
    Disposed {
        /// The world name.
        world: String,
    },

    /// [`World::dispose`](crate::World::dispose) was called twice.
    #[error("world `{world}` is disposed twice")]
    AlreadyDisposed {
        /// The world name.
        world: String,
    },

    /// A manager was requested while another manager is being torn down.
    #[error("cannot create manager {manager} in world `{world}` during manager teardown")]
    CreateDuringTeardown {
        /// The world name.
        world:   String,
        /// The requested manager type.
        manager: &'static str,
    },

    /// The manager is not owned by this world.
    #[error("manager {manager} is not registered in world `{world}`")]
    UnknownManager {
        /// The world name.
        world:   String,
        /// The manager type.
        manager: &'static str,
    },

    /// [`Manager::on_create`](crate::world::Manager::on_create) failed.
    #[error("manager {manager} failed to initialize in world `{world}`")]
    ManagerInit {
        /// The world name.
        world:   String,
        /// The manager type.
        manager: &'static str,
        /// The error returned by the manager.
        #[source]
        source:  anyhow::Error,
    },

    /// [`Manager::on_destroy`](crate::world::Manager::on_destroy) failed or panicked.
    #[error("manager {manager} failed to tear down in world `{world}`")]
    ManagerTeardown {
        /// The world name.
        world:   String,
        /// The manager type.
        manager: &'static str,
        /// The error returned by the manager.
        #[source]
        source:  anyhow::Error,
    },
}
