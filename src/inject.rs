//! Injection binds the data dependencies a system declares to the entity store.
//!
//! A system implements [`InjectSystem`] to declare its injected fields:
//! manager references, per-entity lookups,
//! and *aggregates* implementing [`GroupData`] that request component arrays
//! for all entities matching a structural query.
//!
//! [`ComponentSystemInjection::inject`] classifies the declared fields once
//! and returns an [`Injection`],
//! whose [`update_injection`](Injection::update_injection) refreshes the fields
//! before the system runs on each tick.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//!
//! use injecs::comp::Component;
//! use injecs::group::ComponentArray;
//! use injecs::inject::{
//!     AggregateDecl, ComponentSystemInjection, GroupData, HookRegistry, InjectSystem, SystemDecl,
//! };
//! use injecs::storage::{ComponentSet, EntityManager};
//! use injecs::World;
//!
//! #[derive(Clone, Copy)]
//! struct Position(f32);
//! impl Component for Position {}
//!
//! #[derive(Clone, Copy)]
//! struct Velocity(f32);
//! impl Component for Velocity {}
//!
//! #[derive(Default)]
//! struct Movers {
//!     position: ComponentArray<Position>,
//!     velocity: ComponentArray<Velocity>,
//!     length:   usize,
//! }
//!
//! impl GroupData for Movers {
//!     fn declare(decl: &mut AggregateDecl<Self>) {
//!         decl.component_array("position", false, |g| &mut g.position)
//!             .component_array("velocity", true, |g| &mut g.velocity)
//!             .int("length", true, |g| &mut g.length);
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Movement {
//!     movers: Movers,
//! }
//!
//! impl InjectSystem for Movement {
//!     fn declare(decl: &mut SystemDecl<Self>) { decl.group("movers", |s| &mut s.movers); }
//! }
//!
//! let world = World::new("example");
//! let store = world.get_or_create_manager::<EntityManager>().unwrap();
//! store.create_entity(ComponentSet::new().with(Position(0.0)).with(Velocity(2.0)));
//!
//! let hooks = HookRegistry::default();
//! let mut system = Movement::default();
//! let injection =
//!     ComponentSystemInjection::new(&world, &store, &hooks).inject(&mut system).unwrap();
//!
//! injection.update_injection(&mut system);
//! for i in 0..system.movers.length {
//!     let velocity = system.movers.velocity.get(i);
//!     system.movers.position.update(i, |position| position.0 += velocity.0);
//! }
//! ```

mod data;
pub use data::InjectionData;

mod decl;
pub use decl::{AggregateDecl, FieldInfo, GroupData, GROUP_INDEX_FIELD, LENGTH_FIELD};

mod deps;
pub use deps::ComponentDependencies;

mod from_entity;
pub use from_entity::InjectFromEntityData;

mod group_data;
pub use group_data::{InjectComponentGroupData, SystemGroups};

mod hook;
pub use hook::{HookEntry, HookId, HookRegistry, InjectionContext, InjectionHook};

mod system;
pub use system::{ComponentSystemInjection, InjectSystem, Injection, SystemDecl};
