use std::panic::{self, AssertUnwindSafe};

use super::{ComponentSet, Config, EntityManager};
use crate::comp::ComponentType;
use crate::test_util::{self, spawn_mover, Frozen, Health, Position, Team, Velocity, Waypoint};
use crate::World;

#[test]
fn test_create_and_read_components() {
    test_util::init();
    let store = EntityManager::default();
    let entity = spawn_mover(&store, 3, false);

    assert!(store.exists(entity));
    assert_eq!(store.entity_count(), 1);
    assert_eq!(store.get_component::<Position>(entity), Some(Position { x: 3.0, y: 0.0 }));
    assert_eq!(store.get_component::<Velocity>(entity), Some(Velocity { x: 1.0, y: 3.0 }));
    assert_eq!(store.get_component::<Health>(entity), None);
    assert!(store.has_component::<Velocity>(entity));
    assert!(!store.has_component::<Frozen>(entity));
}

#[test]
fn test_same_signature_shares_archetype() {
    let store = EntityManager::default();
    spawn_mover(&store, 1, false);
    spawn_mover(&store, 2, false);
    assert_eq!(store.archetype_count(), 1);

    spawn_mover(&store, 3, true);
    assert_eq!(store.archetype_count(), 2);
}

#[test]
fn test_destroyed_handle_is_stale() {
    let store = EntityManager::default();
    let first = spawn_mover(&store, 1, false);
    assert!(store.destroy_entity(first));
    assert!(!store.destroy_entity(first));
    assert!(!store.exists(first));

    let second = spawn_mover(&store, 2, false);
    assert_eq!(second.index, first.index, "slots are recycled");
    assert_ne!(second.generation, first.generation);
    assert_eq!(store.get_component::<Position>(first), None);
    assert!(!store.set_component(first, Position::default()));
    assert_eq!(store.get_component::<Position>(second), Some(Position { x: 2.0, y: 0.0 }));
}

#[test]
fn test_destroy_keeps_other_rows_intact() {
    let store = EntityManager::default();
    let entities: Vec<_> = (0..5).map(|i| spawn_mover(&store, i, false)).collect();
    assert!(store.destroy_entity(entities[1]));

    for (i, &entity) in entities.iter().enumerate() {
        if i == 1 {
            continue;
        }
        let position = store.get_component::<Position>(entity).expect("entity is alive");
        assert_eq!(position.x, i as f32);
    }
    assert_eq!(store.entity_count(), 4);
}

#[test]
fn test_add_and_remove_component() {
    let store = EntityManager::default();
    let entity = spawn_mover(&store, 7, false);

    assert!(store.add_component(entity, Health(10)));
    assert_eq!(store.get_component::<Health>(entity), Some(Health(10)));
    assert_eq!(store.get_component::<Position>(entity), Some(Position { x: 7.0, y: 0.0 }));

    assert!(store.add_component(entity, Health(20)), "adding an existing component overwrites");
    assert_eq!(store.get_component::<Health>(entity), Some(Health(20)));
    assert_eq!(store.archetype_count(), 2);

    assert!(store.remove_component::<Velocity>(entity));
    assert!(!store.remove_component::<Velocity>(entity));
    assert!(!store.has_component::<Velocity>(entity));
    assert_eq!(store.get_component::<Health>(entity), Some(Health(20)));
}

#[test]
fn test_buffers() {
    let store = EntityManager::default();
    let entity =
        store.create_entity(ComponentSet::new().with_buffer(vec![Waypoint(1), Waypoint(2)]));
    assert_eq!(store.get_buffer::<Waypoint>(entity), Some(vec![Waypoint(1), Waypoint(2)]));

    let other = spawn_mover(&store, 0, false);
    assert_eq!(store.get_buffer::<Waypoint>(other), None);
    assert!(store.set_buffer(other, vec![Waypoint(5)]));
    assert_eq!(store.get_buffer::<Waypoint>(other), Some(vec![Waypoint(5)]));
    assert!(store.has_component::<Position>(other));
}

#[test]
fn test_shared_values_split_chunks() {
    let store = EntityManager::default();
    let red = store.create_entity(ComponentSet::new().with(Health(1)).with_shared(Team(0)));
    let blue = store.create_entity(ComponentSet::new().with(Health(2)).with_shared(Team(1)));
    let red2 = store.create_entity(ComponentSet::new().with(Health(3)).with_shared(Team(0)));
    assert_eq!(store.archetype_count(), 1);

    let group = store.resolve_group(&[ComponentType::read_only::<Health>()]);
    assert_eq!(group.iterator().chunk_count(), 2);

    assert_eq!(store.get_shared_component::<Team>(red).as_deref(), Some(&Team(0)));
    assert_eq!(store.get_shared_component::<Team>(blue).as_deref(), Some(&Team(1)));

    assert!(store.set_shared_component(red2, Team(1)));
    assert_eq!(store.get_shared_component::<Team>(red2).as_deref(), Some(&Team(1)));
    assert_eq!(store.get_component::<Health>(red2), Some(Health(3)));
    assert_eq!(group.iterator().chunk_count(), 2);
}

#[test]
fn test_chunk_capacity() {
    let store = EntityManager::with_config(Config { chunk_capacity: 4 });
    for i in 0..10 {
        spawn_mover(&store, i, false);
    }
    let group = store.resolve_group(&[ComponentType::read_only::<Position>()]);
    let iter = group.iterator();
    assert_eq!(iter.chunk_count(), 3);
    assert_eq!(iter.length(), 10);
}

#[test]
#[should_panic = "Chunk capacity must be positive"]
fn test_zero_chunk_capacity() { EntityManager::with_config(Config { chunk_capacity: 0 }); }

#[test]
#[should_panic = "is used both as a"]
fn test_kind_conflict_panics() {
    #[derive(Debug, Clone, Copy)]
    struct Dual;
    impl crate::comp::Component for Dual {}
    impl crate::comp::BufferElement for Dual {}

    let store = EntityManager::default();
    store.create_entity(ComponentSet::new().with(Dual));
    store.create_entity(ComponentSet::new().with_buffer(vec![Dual]));
}

#[test]
fn test_kind_conflict_leaves_no_entity() {
    #[derive(Debug, Clone, Copy)]
    struct Dual;
    impl crate::comp::Component for Dual {}
    impl crate::comp::BufferElement for Dual {}

    let store = EntityManager::default();
    store.create_entity(ComponentSet::new().with(Dual));
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        store.create_entity(ComponentSet::new().with(Health(1)).with_buffer(vec![Dual]))
    }));
    assert!(result.is_err());
    assert_eq!(store.entity_count(), 1);

    let entity = spawn_mover(&store, 0, false);
    assert_eq!(entity.index, 1, "no slot is allocated for the rejected entity");
}

#[test]
fn test_shared_values_released_with_chunks() {
    #[derive(Debug, PartialEq)]
    struct Lod(u32);
    impl crate::comp::SharedComponent for Lod {}

    let store = EntityManager::default();
    let entity = store.create_entity(ComponentSet::new().with(Health(1)).with_shared(Lod(0)));
    for i in 1..1000 {
        assert!(store.set_shared_component(entity, Lod(i)));
    }
    assert_eq!(store.get_shared_component::<Lod>(entity).as_deref(), Some(&Lod(999)));
    assert_eq!(store.store.read().chunk_count(), 1);
    assert_eq!(store.store.read().shared_value_count(), 1);

    let other = store.create_entity(ComponentSet::new().with(Health(2)).with_shared(Lod(999)));
    assert_eq!(store.store.read().chunk_count(), 1);
    assert!(store.remove_component::<Lod>(entity));
    assert_eq!(store.store.read().shared_value_count(), 1);

    store.destroy_entity(other);
    store.destroy_entity(entity);
    assert_eq!(store.store.read().chunk_count(), 0);
    assert_eq!(store.store.read().shared_value_count(), 0);
}

#[test]
fn test_reclaimed_chunk_keeps_locations() {
    let store = EntityManager::with_config(Config { chunk_capacity: 2 });
    let entities: Vec<_> = (0..6).map(|i| spawn_mover(&store, i, false)).collect();
    assert_eq!(store.store.read().chunk_count(), 3);

    // empties the first chunk, which is taken over by the last one
    store.destroy_entity(entities[0]);
    store.destroy_entity(entities[1]);
    assert_eq!(store.store.read().chunk_count(), 2);

    for (i, &entity) in entities.iter().enumerate().skip(2) {
        let expected = Position { x: i as f32, y: 0.0 };
        assert_eq!(store.get_component::<Position>(entity), Some(expected));
    }
    assert!(store.destroy_entity(entities[5]));
    assert!(store.add_component(entities[4], Health(4)));
    assert_eq!(store.get_component::<Velocity>(entities[4]), Some(Velocity { x: 1.0, y: 4.0 }));
    assert_eq!(store.get_component::<Position>(entities[2]), Some(Position { x: 2.0, y: 0.0 }));

    let group = store.resolve_group(&[ComponentType::read_only::<Position>()]);
    assert_eq!(group.iterator().length(), 3);
}

#[test]
fn test_groups_are_deduplicated() {
    let store = EntityManager::default();
    let a = store.resolve_group(&[
        ComponentType::read_write::<Position>(),
        ComponentType::read_only::<Velocity>(),
    ]);
    let b = store.resolve_group(&[
        ComponentType::read_only::<Velocity>(),
        ComponentType::read_write::<Position>(),
        ComponentType::read_only::<Velocity>(),
    ]);
    let c = store.resolve_group(&[ComponentType::read_only::<Position>()]);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(store.group_count(), 2);
}

#[test]
#[should_panic = "The entity store has already been destroyed"]
fn test_destroyed_store_panics() {
    let world = World::new("storage");
    let store = world.get_or_create_manager::<EntityManager>().expect("world is alive");
    spawn_mover(&store, 0, false);
    world.dispose().expect("dispose succeeds");

    spawn_mover(&store, 1, false);
}
