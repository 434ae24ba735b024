//! Builder-style construction of live query indices.
//!
//! This module provides the filter DSL that turns component requirements
//! into an incrementally maintained index. A builder collects:
//!
//! * which components must be present (`with`) or absent (`without`),
//! * alternative groups (`with_either` / `without_either`),
//! * change-tracking rules (`when_added` / `when_changed` / `when_removed`),
//!
//! and terminates into one of the four index shapes: [`EntitySet`],
//! [`EntitySortedSet`], [`EntityMap`], or [`EntityMultiMap`].
//!
//! ## Matching model
//! An entity matches when it is enabled, carries every `with` flag, carries
//! no `without` flag, shares at least one flag with every `with_either`
//! group, and misses at least one flag of every `without_either` group.
//!
//! ## Reactive rules
//! A builder with at least one `when_*` rule produces a *reactive* index: it
//! starts empty, admits an entity only when a tracked message arrives while
//! the filter matches, and is emptied by `complete()`. Structural messages
//! never admit into a reactive index; they only evict entities that stop
//! matching.

use std::cmp::Ordering;
use std::hash::Hash;
use std::rc::Rc;

use crate::engine::bitset::FlagSet;
use crate::engine::messages::{
    ComponentAdded, ComponentChanged, ComponentDisabled, ComponentEnabled, ComponentRemoved,
    EntityCreated, EntityDisabled, EntityDisposed, EntityEnabled, WorldOptimized,
};
use crate::engine::publisher::{Publisher, Subscription};
use crate::engine::sets::{EntityMap, EntityMultiMap, EntitySet, EntitySortedSet};
use crate::engine::types::{EntityId, ENABLED_FLAG};
use crate::engine::world::World;

/// Resolved form of a filter: bit masks over the membership vector.
pub(crate) struct Filter {
    pub(crate) with: FlagSet,
    pub(crate) without: FlagSet,
    pub(crate) with_either: Vec<FlagSet>,
    pub(crate) without_either: Vec<FlagSet>,
}

impl Filter {
    pub(crate) fn matches(&self, components: &FlagSet) -> bool {
        components.contains_all(&self.with)
            && components.is_disjoint(&self.without)
            && self.with_either.iter().all(|group| components.intersects(group))
            && self.without_either.iter().all(|group| !components.contains_all(group))
    }
}

/// Membership callbacks an index exposes to its bus handlers.
///
/// The builder wires every subscription to one of these entry points; the
/// concrete index decides what admission, eviction, or re-keying means.
pub(crate) trait IndexDriver {
    /// A structural message touched the entity; admit or evict per filter.
    fn recheck(&self, id: EntityId);

    /// A tracked change-class message touched the entity; admit if the
    /// filter matches.
    fn touch(&self, id: EntityId);

    /// The entity was disposed; evict unconditionally.
    fn remove_entity(&self, id: EntityId);

    /// The keying or ordering component of the entity changed.
    fn component_changed(&self, _id: EntityId) {}

    /// The world asked deferred work to be resolved.
    fn optimized(&self) {}
}

type DeferredSubscription =
    Box<dyn FnOnce(&Publisher, &Rc<dyn IndexDriver>) -> Subscription>;

/// Builder for live query indices.
///
/// Obtained from [`World::query`]; consumed by one of the `as_*` terminals.
/// Component flags referenced by the filter are allocated on first use, so a
/// filter may name types no entity carries yet.
pub struct QueryBuilder<'w> {
    world: &'w mut World,
    with: FlagSet,
    without: FlagSet,
    with_either: Vec<FlagSet>,
    without_either: Vec<FlagSet>,
    reactive: bool,
    deferred: Vec<DeferredSubscription>,
}

fn structural<M: 'static>(extract: fn(&M) -> EntityId) -> DeferredSubscription {
    Box::new(move |publisher, driver| {
        let driver = Rc::clone(driver);
        publisher.subscribe::<M, _>(move |message| driver.recheck(extract(message)))
    })
}

fn tracked<M: 'static>(extract: fn(&M) -> EntityId) -> DeferredSubscription {
    Box::new(move |publisher, driver| {
        let driver = Rc::clone(driver);
        publisher.subscribe::<M, _>(move |message| driver.touch(extract(message)))
    })
}

impl<'w> QueryBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        let mut with = FlagSet::new();
        with.set(ENABLED_FLAG);
        Self {
            world,
            with,
            without: FlagSet::new(),
            with_either: Vec::new(),
            without_either: Vec::new(),
            reactive: false,
            deferred: Vec::new(),
        }
    }

    fn track_structural<T: 'static>(&mut self) {
        self.deferred.push(structural::<ComponentAdded<T>>(|m| m.entity_id));
        self.deferred.push(structural::<ComponentRemoved<T>>(|m| m.entity_id));
        self.deferred.push(structural::<ComponentEnabled<T>>(|m| m.entity_id));
        self.deferred.push(structural::<ComponentDisabled<T>>(|m| m.entity_id));
    }

    /// Requires entities to carry an enabled component of type `T`.
    pub fn with<T: 'static>(mut self) -> Self {
        let flag = self.world.flag_of::<T>();
        self.with.set(flag);
        self.track_structural::<T>();
        self
    }

    /// Excludes entities carrying an enabled component of type `T`.
    pub fn without<T: 'static>(mut self) -> Self {
        let flag = self.world.flag_of::<T>();
        self.without.set(flag);
        self.track_structural::<T>();
        self
    }

    /// Requires at least one type of the group to be present.
    ///
    /// ```ignore
    /// world.query().with_either(|g| { g.or::<Cat>().or::<Dog>(); }).as_set();
    /// ```
    pub fn with_either(mut self, build: impl FnOnce(&mut EitherGroup<'_, 'w>)) -> Self {
        let flags = {
            let mut group = EitherGroup { builder: &mut self, flags: FlagSet::new() };
            build(&mut group);
            group.flags
        };
        if !flags.is_empty() {
            self.with_either.push(flags);
        }
        self
    }

    /// Requires at least one type of the group to be absent.
    pub fn without_either(mut self, build: impl FnOnce(&mut EitherGroup<'_, 'w>)) -> Self {
        let flags = {
            let mut group = EitherGroup { builder: &mut self, flags: FlagSet::new() };
            build(&mut group);
            group.flags
        };
        if !flags.is_empty() {
            self.without_either.push(flags);
        }
        self
    }

    /// Tracks entities whose `T` component was set since the last
    /// `complete()`, making the index reactive.
    ///
    /// Both fresh additions and overwrites of a live component re-admit the
    /// entity.
    pub fn when_added<T: 'static>(mut self) -> Self {
        self.reactive = true;
        self.deferred.push(tracked::<ComponentAdded<T>>(|m| m.entity_id));
        self.deferred.push(tracked::<ComponentChanged<T>>(|m| m.entity_id));
        self
    }

    /// Tracks entities whose `T` component changed since the last
    /// `complete()`, making the index reactive.
    pub fn when_changed<T: 'static>(mut self) -> Self {
        self.reactive = true;
        self.deferred.push(tracked::<ComponentChanged<T>>(|m| m.entity_id));
        self
    }

    /// Tracks entities whose `T` component was removed since the last
    /// `complete()`, making the index reactive.
    pub fn when_removed<T: 'static>(mut self) -> Self {
        self.reactive = true;
        self.deferred.push(tracked::<ComponentRemoved<T>>(|m| m.entity_id));
        self
    }

    fn into_filter(self) -> (&'w mut World, Filter, bool, Vec<DeferredSubscription>) {
        let Self { world, with, without, with_either, without_either, reactive, deferred } = self;
        (world, Filter { with, without, with_either, without_either }, reactive, deferred)
    }

    fn wire(
        publisher: &Publisher,
        driver: &Rc<dyn IndexDriver>,
        deferred: Vec<DeferredSubscription>,
    ) -> Vec<Subscription> {
        let mut subscriptions = Vec::with_capacity(deferred.len() + 4);
        subscriptions.push({
            let driver = Rc::clone(driver);
            publisher.subscribe::<EntityCreated, _>(move |m| driver.recheck(m.entity_id))
        });
        subscriptions.push({
            let driver = Rc::clone(driver);
            publisher.subscribe::<EntityEnabled, _>(move |m| driver.recheck(m.entity_id))
        });
        subscriptions.push({
            let driver = Rc::clone(driver);
            publisher.subscribe::<EntityDisabled, _>(move |m| driver.recheck(m.entity_id))
        });
        subscriptions.push({
            let driver = Rc::clone(driver);
            publisher.subscribe::<EntityDisposed, _>(move |m| driver.remove_entity(m.entity_id))
        });
        for register in deferred {
            subscriptions.push(register(publisher, driver));
        }
        subscriptions
    }

    fn populate(world: &World, driver: &Rc<dyn IndexDriver>) {
        let ids: Vec<EntityId> = world.store_handle().borrow().live_ids().collect();
        for id in ids {
            driver.recheck(id);
        }
    }

    /// Builds an [`EntitySet`]: a dense, unordered index of matching
    /// entities.
    pub fn as_set(self) -> EntitySet {
        let (world, filter, reactive, deferred) = self.into_filter();
        let state = crate::engine::sets::new_set_state(world, filter, reactive);
        let driver: Rc<dyn IndexDriver> = state.clone();
        let publisher = world.publisher();
        let subscriptions = Self::wire(&publisher, &driver, deferred);
        if !reactive {
            Self::populate(world, &driver);
        }
        EntitySet::new(state, subscriptions)
    }

    /// Builds an [`EntitySortedSet`] ordered by the natural order of the
    /// required component `C`.
    pub fn as_sorted_set<C: Ord + Clone + 'static>(self) -> EntitySortedSet<C> {
        self.as_sorted_set_by(|a: &C, b: &C| a.cmp(b))
    }

    /// Builds an [`EntitySortedSet`] ordered by `compare` over the required
    /// component `C`.
    ///
    /// `C` is added to the `with` requirements; changes to it defer a
    /// re-sort that is resolved on access, `complete()`, or
    /// [`World::optimize`].
    pub fn as_sorted_set_by<C, F>(self, compare: F) -> EntitySortedSet<C>
    where
        C: Clone + 'static,
        F: Fn(&C, &C) -> Ordering + 'static,
    {
        let builder = self.with::<C>();
        let (world, filter, reactive, deferred) = builder.into_filter();
        let pool = world.get_or_create_pool::<C>();
        let state = crate::engine::sets::new_sorted_state(world, filter, reactive, pool, compare);
        let driver: Rc<dyn IndexDriver> = state.clone();
        let publisher = world.publisher();
        let mut subscriptions = Self::wire(&publisher, &driver, deferred);
        subscriptions.push({
            let driver = Rc::clone(&driver);
            publisher.subscribe::<ComponentChanged<C>, _>(move |m| driver.component_changed(m.entity_id))
        });
        subscriptions.push({
            let driver = Rc::clone(&driver);
            publisher.subscribe::<WorldOptimized, _>(move |_| driver.optimized())
        });
        if !reactive {
            Self::populate(world, &driver);
        }
        EntitySortedSet::new(state, subscriptions)
    }

    /// Builds an [`EntityMap`]: a unique mapping from the required key
    /// component `K` to the entity carrying it. Key collisions resolve
    /// last-writer-wins.
    pub fn as_map<K: Clone + Eq + Hash + 'static>(self) -> EntityMap<K> {
        let builder = self.with::<K>();
        let (world, filter, reactive, deferred) = builder.into_filter();
        let pool = world.get_or_create_pool::<K>();
        let state = crate::engine::sets::new_map_state(world, filter, reactive, pool);
        let driver: Rc<dyn IndexDriver> = state.clone();
        let publisher = world.publisher();
        let mut subscriptions = Self::wire(&publisher, &driver, deferred);
        subscriptions.push({
            let driver = Rc::clone(&driver);
            publisher.subscribe::<ComponentChanged<K>, _>(move |m| driver.component_changed(m.entity_id))
        });
        if !reactive {
            Self::populate(world, &driver);
        }
        EntityMap::new(state, subscriptions)
    }

    /// Builds an [`EntityMultiMap`]: a mapping from the required key
    /// component `K` to the ordered bucket of entities carrying that key.
    pub fn as_multi_map<K: Clone + Eq + Hash + 'static>(self) -> EntityMultiMap<K> {
        let builder = self.with::<K>();
        let (world, filter, reactive, deferred) = builder.into_filter();
        let pool = world.get_or_create_pool::<K>();
        let state = crate::engine::sets::new_multi_map_state(world, filter, reactive, pool);
        let driver: Rc<dyn IndexDriver> = state.clone();
        let publisher = world.publisher();
        let mut subscriptions = Self::wire(&publisher, &driver, deferred);
        subscriptions.push({
            let driver = Rc::clone(&driver);
            publisher.subscribe::<ComponentChanged<K>, _>(move |m| driver.component_changed(m.entity_id))
        });
        if !reactive {
            Self::populate(world, &driver);
        }
        EntityMultiMap::new(state, subscriptions)
    }
}

/// Accumulates one `either` group of a query filter.
pub struct EitherGroup<'a, 'w> {
    builder: &'a mut QueryBuilder<'w>,
    flags: FlagSet,
}

impl<'a, 'w> EitherGroup<'a, 'w> {
    /// Adds component type `T` to the group.
    pub fn or<T: 'static>(&mut self) -> &mut Self {
        let flag = self.builder.world.flag_of::<T>();
        self.flags.set(flag);
        self.builder.track_structural::<T>();
        self
    }
}
