use pulse_ecs::prelude::*;

#[derive(Clone, Copy, PartialEq, Debug)]
struct Health(pub i32);

#[derive(Clone, Copy)]
struct Marker(pub u8);

#[test]
fn create_set_get_dispose() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();

    world.set(entity, 42i32).unwrap();
    assert_eq!(*world.get::<i32>(entity).unwrap(), 42);
    assert!(world.has::<i32>(entity));
    assert!(world.is_alive(entity));

    world.dispose_entity(entity);
    assert!(!world.is_alive(entity));
    assert!(!world.has::<i32>(entity));
    assert!(world.get::<i32>(entity).is_none());
}

#[test]
fn disposed_slot_is_reused_with_bumped_version() {
    let mut world = World::new(10);
    let first = world.create_entity().unwrap();
    world.dispose_entity(first);

    let second = world.create_entity().unwrap();
    assert_eq!(second.entity_id(), first.entity_id());
    assert_eq!(second.version(), first.version() + 1);
    assert_ne!(first, second);
    assert!(!world.is_alive(first));
    assert!(world.is_alive(second));
}

#[test]
fn stale_handle_operations_fail_or_noop() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(3)).unwrap();
    world.dispose_entity(entity);

    assert!(matches!(world.set(entity, Health(4)), Err(EcsError::InvalidHandle(_))));
    assert!(matches!(world.enable(entity), Err(EcsError::InvalidHandle(_))));
    assert!(matches!(world.disable(entity), Err(EcsError::InvalidHandle(_))));

    // Disposing again is a silent no-op, as is disposing the default handle.
    world.dispose_entity(entity);
    world.dispose_entity(Entity::default());
}

#[test]
fn entity_limit_is_enforced() {
    let mut world = World::new(2);
    world.create_entity().unwrap();
    world.create_entity().unwrap();
    assert!(matches!(world.create_entity(), Err(EcsError::MaxEntities(_))));

    // Disposal frees room again.
    let entities = world.entities();
    world.dispose_entity(entities[0]);
    assert!(world.create_entity().is_ok());
}

#[test]
fn overwrite_keeps_single_entry() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    world.set(entity, Health(2)).unwrap();
    assert_eq!(*world.get::<Health>(entity).unwrap(), Health(2));
    assert_eq!(world.get_all::<Health>().unwrap().len(), 1);
}

#[test]
fn remove_is_noop_without_component() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();
    world.remove::<Health>(entity).unwrap();
    world.set(entity, Health(1)).unwrap();
    world.remove::<Health>(entity).unwrap();
    assert!(!world.has::<Health>(entity));
    world.remove::<Health>(entity).unwrap();
}

#[test]
fn get_mut_mutates_in_place() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    world.get_mut::<Health>(entity).unwrap().0 = 9;
    assert_eq!(*world.get::<Health>(entity).unwrap(), Health(9));
}

#[test]
fn world_entity_carries_shared_state() {
    let mut world = World::new(4);
    world.set_world(7i64).unwrap();
    assert!(world.has_world::<i64>());
    assert_eq!(*world.get_world::<i64>().unwrap(), 7);

    // The world entity is not part of world enumeration.
    assert!(world.entities().is_empty());

    world.remove_world::<i64>().unwrap();
    assert!(!world.has_world::<i64>());
}

#[test]
fn enable_disable_roundtrip() {
    let mut world = World::new(4);
    let entity = world.create_entity().unwrap();
    assert!(world.is_enabled(entity));

    world.disable(entity).unwrap();
    assert!(!world.is_enabled(entity));
    assert!(world.is_alive(entity));

    world.enable(entity).unwrap();
    assert!(world.is_enabled(entity));
}

#[test]
fn component_disable_keeps_value() {
    let mut world = World::new(4);
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(5)).unwrap();

    world.disable_component::<Health>(entity).unwrap();
    assert!(world.has::<Health>(entity));
    assert!(!world.is_component_enabled::<Health>(entity));
    assert_eq!(*world.get::<Health>(entity).unwrap(), Health(5));

    world.enable_component::<Health>(entity).unwrap();
    assert!(world.is_component_enabled::<Health>(entity));

    assert!(matches!(
        world.disable_component::<Marker>(entity),
        Err(EcsError::MissingComponent(_))
    ));
}

#[test]
fn notify_changed_requires_component() {
    let mut world = World::new(4);
    let entity = world.create_entity().unwrap();
    assert!(matches!(
        world.notify_changed::<Health>(entity),
        Err(EcsError::MissingComponent(_))
    ));
    world.set(entity, Health(1)).unwrap();
    world.notify_changed::<Health>(entity).unwrap();
}

#[test]
fn disposing_parent_disposes_dependents() {
    let mut world = World::new(10);
    let parent = world.create_entity().unwrap();
    let child = world.create_entity().unwrap();
    let grandchild = world.create_entity().unwrap();
    world.set_as_parent_of(parent, child).unwrap();
    world.set_as_parent_of(child, grandchild).unwrap();

    world.dispose_entity(parent);
    assert!(!world.is_alive(parent));
    assert!(!world.is_alive(child));
    assert!(!world.is_alive(grandchild));
}

#[test]
fn removed_parent_link_stops_cascade() {
    let mut world = World::new(10);
    let parent = world.create_entity().unwrap();
    let child = world.create_entity().unwrap();
    world.set_as_parent_of(parent, child).unwrap();
    world.remove_as_parent_of(parent, child).unwrap();

    world.dispose_entity(parent);
    assert!(world.is_alive(child));
}

#[test]
fn exhausted_slot_is_retired() {
    let mut world = World::new(1);
    let first = world.create_entity().unwrap();
    let slot = first.entity_id();
    assert_eq!(first.version(), 0);
    world.dispose_entity(first);

    // Burn through the remaining generations of the slot; the version
    // counter visits every value except the retirement sentinel.
    for _ in 0..65_534 {
        let entity = world.create_entity().unwrap();
        assert_eq!(entity.entity_id(), slot);
        world.dispose_entity(entity);
    }

    let fresh = world.create_entity().unwrap();
    assert_ne!(fresh.entity_id(), slot);
    assert_eq!(fresh.version(), 0);
}

#[test]
fn entity_count_tracks_lifecycle() {
    let mut world = World::new(8);
    assert_eq!(world.entity_count(), 0);
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    assert_eq!(world.entity_count(), 2);
    world.dispose_entity(a);
    assert_eq!(world.entity_count(), 1);
    world.dispose_entity(b);
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn trim_excess_preserves_contents() {
    let mut world = World::new(64);
    let keep = world.create_entity().unwrap();
    world.set(keep, Health(1)).unwrap();
    for _ in 0..32 {
        let entity = world.create_entity().unwrap();
        world.set(entity, Health(0)).unwrap();
        world.dispose_entity(entity);
    }
    world.trim_excess();
    assert!(world.is_alive(keep));
    assert_eq!(*world.get::<Health>(keep).unwrap(), Health(1));
}
