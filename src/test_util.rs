#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;
use parking_lot::{Mutex, Once};

use crate::comp::{BufferElement, Component, SharedComponent};
use crate::storage::{ComponentSet, EntityManager};
use crate::Entity;

/// Records event and ensures that they are in the correct order.
pub struct EventTracer<T: fmt::Debug + Eq + Hash> {
    dependencies: HashMap<T, Vec<T>>,
    seen:         Mutex<IndexSet<T>>,
}

impl<T: fmt::Debug + Eq + Hash> EventTracer<T> {
    /// Creates a new event tracer that ensures `a` executes after `b` for each `(b, a)` input.
    pub fn new(orders: impl IntoIterator<Item = (T, T)>) -> Self {
        let mut dependencies: HashMap<T, Vec<T>> = HashMap::new();
        for (before, after) in orders {
            dependencies.entry(after).or_default().push(before);
        }
        let seen = Mutex::new(IndexSet::new());

        Self { dependencies, seen }
    }

    /// Records that `event` has happened.
    ///
    /// # Panics
    /// Panics if the same `event` was sent twice or a dependency is not satisfied.
    pub fn trace(&self, event: T) {
        let mut seen = self.seen.lock();

        if let Some(deps) = self.dependencies.get(&event) {
            for dep in deps {
                assert!(seen.contains(dep), "{:?} should happen after {:?}", event, dep);
            }
        }

        let (index, new) = seen.insert_full(event);
        assert!(
            new,
            "{:?} is inserted twice",
            seen.get_index(index).expect("insert_full should return valid index")
        );
    }

    /// Returns the events observed in this tracer.
    pub fn get_events(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.seen.lock().iter().cloned().collect()
    }
}

pub(crate) fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Health(pub i32);
impl Component for Health {}

/// A tag component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frozen;
impl Component for Frozen {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint(pub i32);
impl BufferElement for Waypoint {}

#[derive(Debug, PartialEq)]
pub struct Team(pub u8);
impl SharedComponent for Team {}

/// Creates an entity with `Position` and `Velocity`, adding `Frozen` if `frozen` is true.
pub fn spawn_mover(store: &EntityManager, seed: i32, frozen: bool) -> Entity {
    let mut set = ComponentSet::new()
        .with(Position { x: seed as f32, y: 0.0 })
        .with(Velocity { x: 1.0, y: seed as f32 });
    if frozen {
        set = set.with(Frozen);
    }
    store.create_entity(set)
}
