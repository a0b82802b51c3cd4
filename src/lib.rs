//! Declarative component queries and manager lifecycle for chunked entity stores.
//!
//! # Entities are grouped by their structure
//! Every entity in an [`EntityManager`] has a set of components.
//! Entities with the same set of component types (the *structural signature*)
//! are stored together in an archetype,
//! which is split into fixed-capacity chunks of parallel columns.
//! Adding or removing a component moves the entity to another archetype.
//!
//! Three kinds of components are supported:
//! - Data components ([`comp::Component`]) are plain values, one per entity.
//! - Buffers ([`comp::BufferElement`]) are variable-length lists, one per entity.
//! - Shared components ([`comp::SharedComponent`]) are stored once per chunk;
//!   entities with different shared values never share a chunk.
//!
//! # Systems declare what they need
//! A system does not query the store directly.
//! Instead, it declares *aggregates* of arrays,
//! each describing a query through the element types of its arrays
//! (plus subtractive requirements that exclude entities).
//! [`inject::ComponentSystemInjection`] resolves each aggregate to a [`ComponentGroup`] once,
//! deduplicating equal queries,
//! and refreshes the arrays from a fresh chunk snapshot before each run of the system.
//! Field types the built-in shapes do not cover can be bound by [`inject::InjectionHook`]s.
//!
//! Declaration mistakes, such as writable shared components or two entity arrays
//! in one aggregate, are reported as [`SetupError`]s when the system is injected,
//! so a system that injects successfully never fails to refresh.
//!
//! # Managers live in a world
//! A [`World`] owns long-lived singleton [managers](world::Manager),
//! reachable by their own type and the capabilities they declare.
//! Managers are torn down in reverse creation order,
//! except that the entity store is always destroyed last
//! so that other managers can still access entities during their teardown.

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod comp;

pub mod entity;
pub use entity::Entity;

pub mod error;
pub use error::{SetupError, WorldError};

pub mod group;
pub use group::ComponentGroup;

pub mod inject;

pub mod storage;
pub use storage::EntityManager;

#[cfg(test)]
mod test_util;

pub mod util;

pub mod world;
pub use world::World;
