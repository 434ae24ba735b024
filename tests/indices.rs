use pulse_ecs::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct Rank(pub i32);

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct Name(pub String);

#[derive(Clone, Copy)]
struct Cat;

#[derive(Clone, Copy)]
struct Dog;

fn name(text: &str) -> Name {
    Name(text.to_string())
}

#[test]
fn set_tracks_membership_incrementally() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().as_set();

    let entity = world.create_entity().unwrap();
    assert!(!set.contains(entity));

    world.set(entity, true).unwrap();
    assert!(set.contains(entity));
    assert_eq!(set.len(), 1);

    world.remove::<bool>(entity).unwrap();
    assert!(!set.contains(entity));
    assert!(set.is_empty());
}

#[test]
fn set_sees_entities_created_before_it() {
    let mut world = World::new(10);
    let entity = world.create_entity().unwrap();
    world.set(entity, true).unwrap();

    let set = world.query().with::<bool>().as_set();
    assert!(set.contains(entity));
}

#[test]
fn disable_removes_from_sets() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().as_set();
    let entity = world.create_entity().unwrap();
    world.set(entity, true).unwrap();
    assert!(set.contains(entity));

    world.disable(entity).unwrap();
    assert!(!set.contains(entity));

    world.enable(entity).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn component_disable_removes_from_sets() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().as_set();
    let entity = world.create_entity().unwrap();
    world.set(entity, true).unwrap();
    assert!(set.contains(entity));

    world.disable_component::<bool>(entity).unwrap();
    assert!(!set.contains(entity));

    world.enable_component::<bool>(entity).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn without_excludes_carriers() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().without::<Rank>().as_set();
    let plain = world.create_entity().unwrap();
    let ranked = world.create_entity().unwrap();
    world.set(plain, true).unwrap();
    world.set(ranked, true).unwrap();
    world.set(ranked, Rank(1)).unwrap();

    assert!(set.contains(plain));
    assert!(!set.contains(ranked));

    world.remove::<Rank>(ranked).unwrap();
    assert!(set.contains(ranked));
}

#[test]
fn with_either_accepts_any_group_member() {
    let mut world = World::new(10);
    let set = world
        .query()
        .with_either(|group| {
            group.or::<Cat>().or::<Dog>();
        })
        .as_set();

    let cat = world.create_entity().unwrap();
    let dog = world.create_entity().unwrap();
    let neither = world.create_entity().unwrap();
    world.set(cat, Cat).unwrap();
    world.set(dog, Dog).unwrap();

    assert!(set.contains(cat));
    assert!(set.contains(dog));
    assert!(!set.contains(neither));
}

#[test]
fn without_either_rejects_full_groups_only() {
    let mut world = World::new(10);
    let set = world
        .query()
        .without_either(|group| {
            group.or::<Cat>().or::<Dog>();
        })
        .as_set();

    let both = world.create_entity().unwrap();
    let one = world.create_entity().unwrap();
    world.set(both, Cat).unwrap();
    world.set(both, Dog).unwrap();
    world.set(one, Cat).unwrap();

    assert!(!set.contains(both));
    assert!(set.contains(one));
}

#[test]
fn disposal_evicts_members() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().as_set();
    let entity = world.create_entity().unwrap();
    world.set(entity, true).unwrap();
    assert_eq!(set.len(), 1);

    world.dispose_entity(entity);
    assert!(set.is_empty());
}

#[test]
fn reactive_set_tracks_additions_per_frame() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().when_added::<bool>().as_set();
    let entity = world.create_entity().unwrap();

    world.set(entity, true).unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.contains(entity));

    set.complete();
    assert!(set.is_empty());

    // A quiet frame stays empty.
    set.complete();
    assert!(set.is_empty());

    // Re-setting the live component re-admits the entity exactly once.
    world.set(entity, true).unwrap();
    assert_eq!(set.len(), 1);
}

#[test]
fn reactive_set_respects_the_static_filter() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().when_added::<bool>().as_set();
    let entity = world.create_entity().unwrap();
    world.disable(entity).unwrap();

    world.set(entity, true).unwrap();
    assert!(set.is_empty());
}

#[test]
fn when_changed_tracks_explicit_notifications() {
    let mut world = World::new(10);
    let set = world.query().with::<Rank>().when_changed::<Rank>().as_set();
    let entity = world.create_entity().unwrap();

    world.set(entity, Rank(1)).unwrap();
    assert!(set.is_empty());

    world.get_mut::<Rank>(entity).unwrap().0 = 2;
    world.notify_changed::<Rank>(entity).unwrap();
    assert!(set.contains(entity));

    set.complete();
    assert!(set.is_empty());
}

#[test]
fn when_removed_tracks_removals() {
    let mut world = World::new(10);
    let set = world.query().when_removed::<Rank>().as_set();
    let entity = world.create_entity().unwrap();
    world.set(entity, Rank(1)).unwrap();
    assert!(set.is_empty());

    world.remove::<Rank>(entity).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn sorted_set_orders_by_component() {
    let mut world = World::new(10);
    let sorted = world.query().as_sorted_set::<Rank>();

    let c = world.create_entity().unwrap();
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(c, Rank(3)).unwrap();
    world.set(a, Rank(1)).unwrap();
    world.set(b, Rank(2)).unwrap();

    let order: Vec<Entity> = sorted.entities().to_vec();
    assert_eq!(order, vec![a, b, c]);
}

#[test]
fn sorted_set_replaces_on_change() {
    let mut world = World::new(10);
    let sorted = world.query().as_sorted_set::<Rank>();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, Rank(1)).unwrap();
    world.set(b, Rank(2)).unwrap();

    world.set(a, Rank(5)).unwrap();
    let order: Vec<Entity> = sorted.entities().to_vec();
    assert_eq!(order, vec![b, a]);

    // Deferred ordering is also resolved by optimize.
    world.get_mut::<Rank>(b).unwrap().0 = 9;
    world.notify_changed::<Rank>(b).unwrap();
    world.optimize();
    let order: Vec<Entity> = sorted.entities().to_vec();
    assert_eq!(order, vec![a, b]);
}

#[test]
fn sorted_set_supports_custom_comparators() {
    let mut world = World::new(10);
    let sorted = world.query().as_sorted_set_by(|a: &Rank, b: &Rank| b.cmp(a));

    let low = world.create_entity().unwrap();
    let high = world.create_entity().unwrap();
    world.set(low, Rank(1)).unwrap();
    world.set(high, Rank(10)).unwrap();

    let order: Vec<Entity> = sorted.entities().to_vec();
    assert_eq!(order, vec![high, low]);
}

#[test]
fn sorted_set_evicts_on_removal() {
    let mut world = World::new(10);
    let sorted = world.query().as_sorted_set::<Rank>();
    let entity = world.create_entity().unwrap();
    world.set(entity, Rank(1)).unwrap();
    assert_eq!(sorted.len(), 1);

    world.remove::<Rank>(entity).unwrap();
    assert!(sorted.is_empty());
}

#[test]
fn map_binds_keys_to_entities() {
    let mut world = World::new(10);
    let map = world.query().as_map::<Name>();

    let entity = world.create_entity().unwrap();
    world.set(entity, name("alpha")).unwrap();
    assert_eq!(map.get(&name("alpha")), Some(entity));
    assert!(map.contains_key(&name("alpha")));
    assert!(map.contains(entity));
    assert_eq!(map.len(), 1);
}

#[test]
fn map_rebinds_on_key_change() {
    let mut world = World::new(10);
    let map = world.query().as_map::<Name>();

    let entity = world.create_entity().unwrap();
    world.set(entity, name("old")).unwrap();
    world.set(entity, name("new")).unwrap();

    assert_eq!(map.get(&name("new")), Some(entity));
    assert!(!map.contains_key(&name("old")));
    assert_eq!(map.len(), 1);
}

#[test]
fn map_collisions_resolve_last_writer_wins() {
    let mut world = World::new(10);
    let map = world.query().as_map::<Name>();

    let first = world.create_entity().unwrap();
    let second = world.create_entity().unwrap();
    world.set(first, name("shared")).unwrap();
    world.set(second, name("shared")).unwrap();

    assert_eq!(map.get(&name("shared")), Some(second));
    assert!(!map.contains(first));
    assert_eq!(map.len(), 1);
}

#[test]
fn map_unbinds_on_removal_and_disposal() {
    let mut world = World::new(10);
    let map = world.query().as_map::<Name>();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, name("a")).unwrap();
    world.set(b, name("b")).unwrap();

    world.remove::<Name>(a).unwrap();
    assert!(!map.contains_key(&name("a")));

    world.dispose_entity(b);
    assert!(!map.contains_key(&name("b")));
    assert!(map.is_empty());
}

#[test]
fn multi_map_buckets_preserve_insertion_order() {
    let mut world = World::new(10);
    let map = world.query().as_multi_map::<Name>();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    let c = world.create_entity().unwrap();
    world.set(a, name("pack")).unwrap();
    world.set(b, name("pack")).unwrap();
    world.set(c, name("solo")).unwrap();

    assert_eq!(map.get(&name("pack")).unwrap().to_vec(), vec![a, b]);
    assert_eq!(map.get(&name("solo")).unwrap().to_vec(), vec![c]);
    assert_eq!(map.key_count(), 2);
    assert_eq!(map.len(), 3);
}

#[test]
fn multi_map_rebinds_and_unbinds() {
    let mut world = World::new(10);
    let map = world.query().as_multi_map::<Name>();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, name("pack")).unwrap();
    world.set(b, name("pack")).unwrap();

    world.set(a, name("other")).unwrap();
    assert_eq!(map.get(&name("pack")).unwrap().to_vec(), vec![b]);
    assert_eq!(map.get(&name("other")).unwrap().to_vec(), vec![a]);

    world.remove::<Name>(b).unwrap();
    assert!(!map.contains_key(&name("pack")));
    assert!(map.contains(a));
}

#[test]
fn dropped_sets_stop_observing() {
    let mut world = World::new(10);
    let set = world.query().with::<bool>().as_set();
    let entity = world.create_entity().unwrap();
    world.set(entity, true).unwrap();
    assert_eq!(set.len(), 1);
    drop(set);

    // No panic and no stale observers; a fresh set rebuilds from live state.
    world.set(entity, false).unwrap();
    let set = world.query().with::<bool>().as_set();
    assert!(set.contains(entity));
}
