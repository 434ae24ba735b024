use pulse_ecs::prelude::*;

#[derive(Clone, PartialEq, Debug)]
struct Label(pub String);

#[derive(Clone, Copy)]
struct Tag;

fn label(text: &str) -> Label {
    Label(text.to_string())
}

#[test]
fn same_as_shares_one_slot() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();

    world.set(e1, label("x")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    world.set_same_as::<Label>(e3, e1).unwrap();

    assert_eq!(world.get_all::<Label>().unwrap().len(), 1);
    assert_eq!(*world.get::<Label>(e2).unwrap(), label("x"));
    assert_eq!(*world.get::<Label>(e3).unwrap(), label("x"));
}

#[test]
fn removing_the_author_promotes_another_holder() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();

    world.set(e1, label("x")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    world.set_same_as::<Label>(e3, e1).unwrap();

    world.remove::<Label>(e1).unwrap();
    assert!(!world.has::<Label>(e1));
    assert_eq!(*world.get::<Label>(e2).unwrap(), label("x"));
    assert_eq!(*world.get::<Label>(e3).unwrap(), label("x"));
    assert_eq!(world.get_all::<Label>().unwrap().len(), 1);

    world.remove::<Label>(e3).unwrap();
    world.remove::<Label>(e2).unwrap();
    assert_eq!(world.get_all::<Label>().unwrap().len(), 0);
}

#[test]
fn writing_through_a_shared_slot_is_visible_to_all_holders() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();

    world.set(e1, label("before")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    world.get_mut::<Label>(e2).unwrap().0 = "after".to_string();
    assert_eq!(*world.get::<Label>(e1).unwrap(), label("after"));
}

#[test]
fn same_as_on_the_same_slot_is_a_noop() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    world.set(e1, label("x")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    world.remove::<Label>(e2).unwrap();
    assert!(world.has::<Label>(e1));
    assert!(!world.has::<Label>(e2));
}

#[test]
fn same_as_moves_between_slots() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();

    world.set(e1, label("a")).unwrap();
    world.set(e2, label("b")).unwrap();
    world.set(e3, label("c")).unwrap();
    assert_eq!(world.get_all::<Label>().unwrap().len(), 3);

    // Re-aliasing away from an owned slot drops that slot.
    world.set_same_as::<Label>(e3, e1).unwrap();
    assert_eq!(world.get_all::<Label>().unwrap().len(), 2);
    assert_eq!(*world.get::<Label>(e3).unwrap(), label("a"));
    assert_eq!(*world.get::<Label>(e2).unwrap(), label("b"));
}

#[test]
fn same_as_requires_the_reference_component() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    assert!(matches!(
        world.set_same_as::<Label>(e2, e1),
        Err(EcsError::MissingComponent(_))
    ));
}

#[test]
fn same_as_rejects_foreign_entities() {
    let mut world_a = World::new(10);
    let mut world_b = World::new(10);
    let e1 = world_a.create_entity().unwrap();
    world_a.set(e1, label("x")).unwrap();
    let e2 = world_b.create_entity().unwrap();
    assert!(matches!(
        world_b.set_same_as::<Label>(e2, e1),
        Err(EcsError::ForeignEntity(_))
    ));
}

#[test]
fn disposal_releases_shared_references() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    world.set(e1, label("x")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();

    world.dispose_entity(e1);
    assert_eq!(*world.get::<Label>(e2).unwrap(), label("x"));
    world.dispose_entity(e2);
    assert_eq!(world.get_all::<Label>().unwrap().len(), 0);
}

#[test]
fn flag_components_share_a_single_slot() {
    let mut world = World::new(1000);
    let mut entities = Vec::new();
    for _ in 0..1000 {
        let entity = world.create_entity().unwrap();
        world.set(entity, Tag).unwrap();
        entities.push(entity);
    }

    assert_eq!(world.get_all::<Tag>().unwrap().len(), 1);
    for entity in &entities {
        assert!(world.has::<Tag>(*entity));
    }

    for entity in &entities {
        world.remove::<Tag>(*entity).unwrap();
    }
    assert_eq!(world.get_all::<Tag>().unwrap().len(), 0);
}

#[test]
fn component_cap_limits_distinct_values() {
    let mut world = World::new(10);
    world.set_max_component_count::<Label>(1).unwrap();
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();

    world.set(e1, label("only")).unwrap();
    assert!(matches!(
        world.set(e2, label("more")),
        Err(EcsError::MaxComponents(_))
    ));

    // Aliasing still works at the cap, and overwriting does not allocate.
    world.set(e1, label("changed")).unwrap();
    world.set_same_as::<Label>(e2, e1).unwrap();
    assert_eq!(*world.get::<Label>(e2).unwrap(), label("changed"));
}

#[test]
fn component_cap_rejects_zero() {
    let mut world = World::new(10);
    assert!(matches!(
        world.set_max_component_count::<Label>(0),
        Err(EcsError::InvalidComponentCap { .. })
    ));
}

#[test]
fn component_cap_is_ignored_once_the_pool_exists() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    world.set(e1, label("a")).unwrap();
    world.set_max_component_count::<Label>(1).unwrap();
    world.set(e2, label("b")).unwrap();
    assert_eq!(world.get_all::<Label>().unwrap().len(), 2);
}
