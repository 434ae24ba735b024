//! # Query Sets
//!
//! Incrementally maintained indices over a world: the dense [`EntitySet`],
//! the comparator-ordered [`EntitySortedSet`], and the key-driven
//! [`EntityMap`] / [`EntityMultiMap`].
//!
//! Each index owns a shared state cell plus the bus subscriptions that feed
//! it; membership updates arrive through driver entry points wired by the
//! query builder. Dropping an index releases its subscriptions, after which
//! the world no longer pays for it.
//!
//! Between two mutating world calls an index is stable: `entities()` views
//! are snapshots the caller may iterate freely.

use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::engine::entity::{Entity, EntityStore, WORLD_ENTITY_ID};
use crate::engine::pool::PoolCell;
use crate::engine::publisher::Subscription;
use crate::engine::query::{Filter, IndexDriver};
use crate::engine::types::EntityId;
use crate::engine::world::World;

const NO_POSITION: i32 = -1;

/// Dense array plus sparse position index, the common membership shape.
#[derive(Default)]
struct Membership {
    dense: Vec<Entity>,
    sparse: Vec<i32>,
}

impl Membership {
    fn position(&self, id: EntityId) -> Option<usize> {
        match self.sparse.get(id as usize) {
            Some(&position) if position >= 0 => Some(position as usize),
            _ => None,
        }
    }

    fn insert(&mut self, id: EntityId, entity: Entity) -> bool {
        if self.position(id).is_some() {
            return false;
        }
        let index = id as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, NO_POSITION);
        }
        self.sparse[index] = self.dense.len() as i32;
        self.dense.push(entity);
        true
    }

    /// Swap-pop removal; the order of `dense` is not stable.
    fn remove(&mut self, id: EntityId) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        self.dense.swap_remove(position);
        if let Some(moved) = self.dense.get(position) {
            self.sparse[moved.entity_id() as usize] = position as i32;
        }
        self.sparse[id as usize] = NO_POSITION;
        true
    }

    fn clear(&mut self) {
        self.dense.clear();
        for position in &mut self.sparse {
            *position = NO_POSITION;
        }
    }
}

fn matches(filter: &Filter, store: &Rc<RefCell<EntityStore>>, id: EntityId) -> bool {
    if id == WORLD_ENTITY_ID {
        return false;
    }
    let store = store.borrow();
    filter.matches(&store.info(id).components)
}

// ── EntitySet ────────────────────────────────────────────────────────────

pub(crate) struct SetState {
    store: Rc<RefCell<EntityStore>>,
    filter: Filter,
    reactive: bool,
    membership: RefCell<Membership>,
}

impl SetState {
    fn add(&self, id: EntityId) {
        let entity = self.store.borrow().entity(id);
        self.membership.borrow_mut().insert(id, entity);
    }
}

impl IndexDriver for SetState {
    fn recheck(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.add(id);
            }
        } else {
            self.membership.borrow_mut().remove(id);
        }
    }

    fn touch(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            self.add(id);
        }
    }

    fn remove_entity(&self, id: EntityId) {
        self.membership.borrow_mut().remove(id);
    }
}

pub(crate) fn new_set_state(world: &World, filter: Filter, reactive: bool) -> Rc<SetState> {
    Rc::new(SetState {
        store: world.store_handle(),
        filter,
        reactive,
        membership: RefCell::new(Membership::default()),
    })
}

/// Dense, unordered index of the entities matching a filter.
///
/// Obtained from [`QueryBuilder::as_set`](crate::engine::query::QueryBuilder::as_set).
/// Membership is maintained by the world's bus; dropping the set
/// unsubscribes it.
pub struct EntitySet {
    state: Rc<SetState>,
    _subscriptions: Vec<Subscription>,
}

impl EntitySet {
    pub(crate) fn new(state: Rc<SetState>, subscriptions: Vec<Subscription>) -> Self {
        Self { state, _subscriptions: subscriptions }
    }

    /// Returns a snapshot view of the member handles.
    ///
    /// The view is stable until the next mutating world call; the order is
    /// not significant.
    pub fn entities(&self) -> Ref<'_, [Entity]> {
        Ref::map(self.state.membership.borrow(), |m| m.dense.as_slice())
    }

    /// Returns `true` if `entity` is currently a member.
    pub fn contains(&self, entity: Entity) -> bool {
        let membership = self.state.membership.borrow();
        membership
            .position(entity.entity_id())
            .map(|position| membership.dense[position] == entity)
            .unwrap_or(false)
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.state.membership.borrow().dense.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends the current frame. A reactive set is emptied; a plain set is
    /// unaffected.
    pub fn complete(&self) {
        if self.state.reactive {
            self.state.membership.borrow_mut().clear();
        }
    }
}

// ── EntitySortedSet ──────────────────────────────────────────────────────

struct SortedMembership {
    dense: Vec<Entity>,
    sparse: Vec<i32>,
    dirty: bool,
}

pub(crate) struct SortedState<C> {
    store: Rc<RefCell<EntityStore>>,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<C>>,
    compare: Box<dyn Fn(&C, &C) -> Ordering>,
    membership: RefCell<SortedMembership>,
}

impl<C: 'static> SortedState<C> {
    fn compare_ids(&self, a: EntityId, b: EntityId) -> Ordering {
        let pool = self.pool.inner.borrow();
        match (pool.get(a), pool.get(b)) {
            (Some(a), Some(b)) => (self.compare)(a, b),
            _ => Ordering::Equal,
        }
    }

    fn reindex_from(membership: &mut SortedMembership, from: usize) {
        for position in from..membership.dense.len() {
            let id = membership.dense[position].entity_id() as usize;
            membership.sparse[id] = position as i32;
        }
    }

    fn add(&self, id: EntityId) {
        let entity = self.store.borrow().entity(id);
        let mut membership = self.membership.borrow_mut();
        let index = id as usize;
        if index >= membership.sparse.len() {
            membership.sparse.resize(index + 1, NO_POSITION);
        }
        if membership.sparse[index] >= 0 {
            return;
        }

        if membership.dirty {
            membership.sparse[index] = membership.dense.len() as i32;
            membership.dense.push(entity);
            return;
        }

        let position = membership
            .dense
            .partition_point(|probe| self.compare_ids(probe.entity_id(), id) != Ordering::Greater);
        membership.dense.insert(position, entity);
        Self::reindex_from(&mut membership, position);
    }

    fn remove(&self, id: EntityId) {
        let mut membership = self.membership.borrow_mut();
        let index = id as usize;
        let Some(&position) = membership.sparse.get(index) else {
            return;
        };
        if position < 0 {
            return;
        }
        membership.dense.remove(position as usize);
        membership.sparse[index] = NO_POSITION;
        Self::reindex_from(&mut membership, position as usize);
    }

    fn ensure_sorted(&self) {
        let mut membership = self.membership.borrow_mut();
        if !membership.dirty {
            return;
        }
        {
            let pool = self.pool.inner.borrow();
            let compare = &self.compare;
            membership.dense.sort_by(|a, b| {
                match (pool.get(a.entity_id()), pool.get(b.entity_id())) {
                    (Some(a), Some(b)) => compare(a, b),
                    _ => Ordering::Equal,
                }
            });
        }
        Self::reindex_from(&mut membership, 0);
        membership.dirty = false;
    }
}

impl<C: 'static> IndexDriver for SortedState<C> {
    fn recheck(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.add(id);
            }
        } else {
            self.remove(id);
        }
    }

    fn touch(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            self.add(id);
        }
    }

    fn remove_entity(&self, id: EntityId) {
        self.remove(id);
    }

    fn component_changed(&self, _id: EntityId) {
        self.membership.borrow_mut().dirty = true;
    }

    fn optimized(&self) {
        self.ensure_sorted();
    }
}

pub(crate) fn new_sorted_state<C: Clone + 'static>(
    world: &World,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<C>>,
    compare: impl Fn(&C, &C) -> Ordering + 'static,
) -> Rc<SortedState<C>> {
    Rc::new(SortedState {
        store: world.store_handle(),
        filter,
        reactive,
        pool,
        compare: Box::new(compare),
        membership: RefCell::new(SortedMembership {
            dense: Vec::new(),
            sparse: Vec::new(),
            dirty: false,
        }),
    })
}

/// Index of matching entities kept ordered by a comparator over one
/// component type.
///
/// Insertions place entities by binary search; changes to the ordering
/// component defer a re-sort that is resolved lazily on access, on
/// [`complete`](Self::complete), or by
/// [`World::optimize`](crate::engine::world::World::optimize).
pub struct EntitySortedSet<C> {
    state: Rc<SortedState<C>>,
    _subscriptions: Vec<Subscription>,
}

impl<C: 'static> EntitySortedSet<C> {
    pub(crate) fn new(state: Rc<SortedState<C>>, subscriptions: Vec<Subscription>) -> Self {
        Self { state, _subscriptions: subscriptions }
    }

    /// Returns a snapshot view of the member handles in comparator order.
    pub fn entities(&self) -> Ref<'_, [Entity]> {
        self.state.ensure_sorted();
        Ref::map(self.state.membership.borrow(), |m| m.dense.as_slice())
    }

    /// Returns `true` if `entity` is currently a member.
    pub fn contains(&self, entity: Entity) -> bool {
        let membership = self.state.membership.borrow();
        match membership.sparse.get(entity.entity_id() as usize) {
            Some(&position) if position >= 0 => membership.dense[position as usize] == entity,
            _ => false,
        }
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.state.membership.borrow().dense.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends the current frame. A reactive set is emptied; otherwise any
    /// deferred re-sort is resolved.
    pub fn complete(&self) {
        if self.state.reactive {
            let mut membership = self.state.membership.borrow_mut();
            membership.dense.clear();
            for position in &mut membership.sparse {
                *position = NO_POSITION;
            }
            membership.dirty = false;
        } else {
            self.state.ensure_sorted();
        }
    }
}

// ── EntityMap ────────────────────────────────────────────────────────────

struct MapInner<K> {
    map: HashMap<K, Entity>,
    keys: Vec<Option<K>>,
}

pub(crate) struct MapState<K> {
    store: Rc<RefCell<EntityStore>>,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<K>>,
    inner: RefCell<MapInner<K>>,
}

impl<K: Clone + Eq + Hash + 'static> MapState<K> {
    fn rekey(&self, id: EntityId) {
        let Some(key) = self.pool.inner.borrow().get(id).cloned() else {
            self.unbind(id);
            return;
        };
        let entity = self.store.borrow().entity(id);
        let mut inner = self.inner.borrow_mut();

        let index = id as usize;
        if index >= inner.keys.len() {
            inner.keys.resize(index + 1, None);
        }

        if let Some(old_key) = inner.keys[index].clone() {
            if old_key != key && inner.map.get(&old_key).map(|e| e.entity_id()) == Some(id) {
                inner.map.remove(&old_key);
            }
        }

        // Last writer wins: a displaced entity loses its binding entirely.
        if let Some(displaced) = inner.map.insert(key.clone(), entity) {
            if displaced.entity_id() != id {
                inner.keys[displaced.entity_id() as usize] = None;
            }
        }
        inner.keys[index] = Some(key);
    }

    fn unbind(&self, id: EntityId) {
        let mut inner = self.inner.borrow_mut();
        let index = id as usize;
        let Some(slot) = inner.keys.get_mut(index) else {
            return;
        };
        if let Some(key) = slot.take() {
            if inner.map.get(&key).map(|e| e.entity_id()) == Some(id) {
                inner.map.remove(&key);
            }
        }
    }
}

impl<K: Clone + Eq + Hash + 'static> IndexDriver for MapState<K> {
    fn recheck(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.rekey(id);
            }
        } else {
            self.unbind(id);
        }
    }

    fn touch(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            self.rekey(id);
        }
    }

    fn remove_entity(&self, id: EntityId) {
        self.unbind(id);
    }

    fn component_changed(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.rekey(id);
            }
        }
    }
}

pub(crate) fn new_map_state<K: Clone + Eq + Hash + 'static>(
    world: &World,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<K>>,
) -> Rc<MapState<K>> {
    Rc::new(MapState {
        store: world.store_handle(),
        filter,
        reactive,
        pool,
        inner: RefCell::new(MapInner { map: HashMap::new(), keys: Vec::new() }),
    })
}

/// Unique mapping from a key component to the matching entity carrying it.
///
/// Key collisions resolve last-writer-wins: setting a key already bound to
/// another entity drops the previous binding.
pub struct EntityMap<K> {
    state: Rc<MapState<K>>,
    _subscriptions: Vec<Subscription>,
}

impl<K: Clone + Eq + Hash + 'static> EntityMap<K> {
    pub(crate) fn new(state: Rc<MapState<K>>, subscriptions: Vec<Subscription>) -> Self {
        Self { state, _subscriptions: subscriptions }
    }

    /// Returns the entity bound to `key`.
    pub fn get(&self, key: &K) -> Option<Entity> {
        self.state.inner.borrow().map.get(key).copied()
    }

    /// Returns `true` if some entity is bound to `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.inner.borrow().map.contains_key(key)
    }

    /// Returns `true` if `entity` is currently bound to its key.
    pub fn contains(&self, entity: Entity) -> bool {
        let inner = self.state.inner.borrow();
        inner
            .keys
            .get(entity.entity_id() as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|key| inner.map.get(key))
            .map(|bound| *bound == entity)
            .unwrap_or(false)
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.state.inner.borrow().map.len()
    }

    /// Returns `true` if the map has no bindings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects the currently bound keys.
    pub fn keys(&self) -> Vec<K> {
        self.state.inner.borrow().map.keys().cloned().collect()
    }

    /// Collects the currently bound entities.
    pub fn entities(&self) -> Vec<Entity> {
        self.state.inner.borrow().map.values().copied().collect()
    }

    /// Ends the current frame. A reactive map is emptied.
    pub fn complete(&self) {
        if self.state.reactive {
            let mut inner = self.state.inner.borrow_mut();
            inner.map.clear();
            for slot in &mut inner.keys {
                *slot = None;
            }
        }
    }
}

// ── EntityMultiMap ───────────────────────────────────────────────────────

struct MultiMapInner<K> {
    map: HashMap<K, Vec<Entity>>,
    keys: Vec<Option<K>>,
}

pub(crate) struct MultiMapState<K> {
    store: Rc<RefCell<EntityStore>>,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<K>>,
    inner: RefCell<MultiMapInner<K>>,
}

impl<K: Clone + Eq + Hash + 'static> MultiMapState<K> {
    fn rekey(&self, id: EntityId) {
        let Some(key) = self.pool.inner.borrow().get(id).cloned() else {
            self.unbind(id);
            return;
        };
        let entity = self.store.borrow().entity(id);
        let mut inner = self.inner.borrow_mut();

        let index = id as usize;
        if index >= inner.keys.len() {
            inner.keys.resize(index + 1, None);
        }

        if let Some(old_key) = inner.keys[index].clone() {
            if old_key == key {
                return;
            }
            Self::drop_from_bucket(&mut inner.map, &old_key, id);
        }

        inner.map.entry(key.clone()).or_default().push(entity);
        inner.keys[index] = Some(key);
    }

    fn unbind(&self, id: EntityId) {
        let mut inner = self.inner.borrow_mut();
        let index = id as usize;
        let Some(slot) = inner.keys.get_mut(index) else {
            return;
        };
        if let Some(key) = slot.take() {
            Self::drop_from_bucket(&mut inner.map, &key, id);
        }
    }

    fn drop_from_bucket(map: &mut HashMap<K, Vec<Entity>>, key: &K, id: EntityId) {
        if let Some(bucket) = map.get_mut(key) {
            bucket.retain(|member| member.entity_id() != id);
            if bucket.is_empty() {
                map.remove(key);
            }
        }
    }
}

impl<K: Clone + Eq + Hash + 'static> IndexDriver for MultiMapState<K> {
    fn recheck(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.rekey(id);
            }
        } else {
            self.unbind(id);
        }
    }

    fn touch(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            self.rekey(id);
        }
    }

    fn remove_entity(&self, id: EntityId) {
        self.unbind(id);
    }

    fn component_changed(&self, id: EntityId) {
        if matches(&self.filter, &self.store, id) {
            if !self.reactive {
                self.rekey(id);
            }
        }
    }
}

pub(crate) fn new_multi_map_state<K: Clone + Eq + Hash + 'static>(
    world: &World,
    filter: Filter,
    reactive: bool,
    pool: Rc<PoolCell<K>>,
) -> Rc<MultiMapState<K>> {
    Rc::new(MultiMapState {
        store: world.store_handle(),
        filter,
        reactive,
        pool,
        inner: RefCell::new(MultiMapInner { map: HashMap::new(), keys: Vec::new() }),
    })
}

/// Mapping from a key component to the ordered bucket of matching entities
/// carrying it.
///
/// Buckets keep insertion order; removal from a bucket is linear in the
/// bucket length.
pub struct EntityMultiMap<K> {
    state: Rc<MultiMapState<K>>,
    _subscriptions: Vec<Subscription>,
}

impl<K: Clone + Eq + Hash + 'static> EntityMultiMap<K> {
    pub(crate) fn new(state: Rc<MultiMapState<K>>, subscriptions: Vec<Subscription>) -> Self {
        Self { state, _subscriptions: subscriptions }
    }

    /// Returns a snapshot view of the bucket bound to `key`.
    pub fn get(&self, key: &K) -> Option<Ref<'_, [Entity]>> {
        Ref::filter_map(self.state.inner.borrow(), |inner| {
            inner.map.get(key).map(Vec::as_slice)
        })
        .ok()
    }

    /// Returns `true` if at least one entity is bound to `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.inner.borrow().map.contains_key(key)
    }

    /// Returns `true` if `entity` is currently bound to its key.
    pub fn contains(&self, entity: Entity) -> bool {
        let inner = self.state.inner.borrow();
        inner
            .keys
            .get(entity.entity_id() as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|key| inner.map.get(key))
            .map(|bucket| bucket.contains(&entity))
            .unwrap_or(false)
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.state.inner.borrow().map.len()
    }

    /// Returns the total number of bound entities.
    pub fn len(&self) -> usize {
        self.state.inner.borrow().map.values().map(Vec::len).sum()
    }

    /// Returns `true` if the map has no bindings.
    pub fn is_empty(&self) -> bool {
        self.state.inner.borrow().map.is_empty()
    }

    /// Collects the currently bound keys.
    pub fn keys(&self) -> Vec<K> {
        self.state.inner.borrow().map.keys().cloned().collect()
    }

    /// Ends the current frame. A reactive map is emptied.
    pub fn complete(&self) {
        if self.state.reactive {
            let mut inner = self.state.inner.borrow_mut();
            inner.map.clear();
            for slot in &mut inner.keys {
                *slot = None;
            }
        }
    }
}
