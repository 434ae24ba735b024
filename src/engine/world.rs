//! # World
//!
//! The central container: owns the entity slot storage, the component pools,
//! the flag registry, and the message bus of one world.
//!
//! ## Purpose
//! A `World` is responsible for:
//!
//! - Allocating and recycling entity slots
//! - Routing component reads and writes to per-type pools
//! - Keeping every entity's membership vector consistent with its pools
//! - Announcing every mutation on the typed bus so derived indices stay
//!   consistent
//!
//! ## Registries
//! Component flags and pools are world-owned registries keyed by `TypeId`;
//! the only process-global state is the world-id allocator, because entity
//! handles embed a process-unique world identifier.
//!
//! ## The world entity
//! Slot 0 is reserved at construction as the *world entity*: a shared
//! singleton carrier for world-level components. It is never disposed, does
//! not count against the entity limit, and is skipped by query indices and
//! world enumeration.
//!
//! ## Concurrency
//! A world is single-threaded by design. Mutating operations and bus
//! dispatch run on the caller's thread; handlers observe a strictly
//! serialized event stream.

use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Mutex, OnceLock};

use crate::engine::cloner::ComponentCloner;
use crate::engine::entity::{Entity, EntityStore, WORLD_ENTITY_ID};
use crate::engine::error::{
    EcsError, EcsResult, ForeignEntityError, InvalidHandleError, MissingComponentError,
};
use crate::engine::messages::{
    ComponentAdded, ComponentChanged, ComponentDisabled, ComponentEnabled, ComponentRemoved,
    EntityCreated, EntityDisabled, EntityDisposed, EntityDisposing, EntityEnabled, TrimExcess,
    WorldOptimized,
};
use crate::engine::pool::{ErasedPool, PoolCell};
use crate::engine::publisher::{Publisher, Subscription};
use crate::engine::query::QueryBuilder;
use crate::engine::reader::{ComponentReader, ComponentTypeReader};
use crate::engine::types::{EntityId, Flag, WorldId, ENABLED_FLAG, FIRST_COMPONENT_FLAG};

/// Process-wide allocator of world identifiers.
///
/// ## Invariants
/// - Identifier 0 is never handed out; it marks unbound handles.
/// - A released identifier becomes available again.
struct WorldIdAllocator {
    used: Vec<bool>,
}

static WORLD_IDS: OnceLock<Mutex<WorldIdAllocator>> = OnceLock::new();

fn world_ids() -> &'static Mutex<WorldIdAllocator> {
    WORLD_IDS.get_or_init(|| Mutex::new(WorldIdAllocator { used: vec![true] }))
}

fn allocate_world_id() -> Option<WorldId> {
    let mut ids = world_ids().lock().unwrap_or_else(|e| e.into_inner());
    for id in 1..=WorldId::MAX as usize {
        if id >= ids.used.len() {
            ids.used.push(true);
            return Some(id as WorldId);
        }
        if !ids.used[id] {
            ids.used[id] = true;
            return Some(id as WorldId);
        }
    }
    None
}

fn release_world_id(id: WorldId) {
    let mut ids = world_ids().lock().unwrap_or_else(|e| e.into_inner());
    let index = id as usize;
    if index < ids.used.len() {
        ids.used[index] = false;
    }
}

struct PoolEntry {
    flag: Flag,
    erased: Rc<dyn ErasedPool>,
    any: Rc<dyn Any>,
}

/// A self-contained entity-component container.
///
/// See the [module documentation](self) for the ownership model. All
/// mutating operations publish the corresponding lifecycle message before
/// returning, so subscribed indices are already consistent when the call
/// completes.
pub struct World {
    id: WorldId,
    store: Rc<RefCell<EntityStore>>,
    publisher: Rc<Publisher>,
    pools: Vec<PoolEntry>,
    pools_by_type: HashMap<TypeId, usize>,
    flags: HashMap<TypeId, Flag>,
    next_flag: Flag,
    pending_caps: HashMap<TypeId, u32>,
    pool_subscriptions: Vec<Subscription>,
}

impl World {
    /// Creates a world accepting up to `max_entities` live entities.
    ///
    /// ## Panics
    /// Panics when the process-wide world-id space (65,535 concurrent
    /// worlds) is exhausted.
    pub fn new(max_entities: u32) -> Self {
        let id = allocate_world_id().expect("process-wide world id space exhausted");
        log::trace!("world {} created (max_entities {})", id, max_entities);
        Self {
            id,
            store: Rc::new(RefCell::new(EntityStore::new(id, max_entities))),
            publisher: Rc::new(Publisher::new()),
            pools: Vec::new(),
            pools_by_type: HashMap::new(),
            flags: HashMap::new(),
            next_flag: FIRST_COMPONENT_FLAG,
            pending_caps: HashMap::new(),
            pool_subscriptions: Vec::new(),
        }
    }

    /// Returns this world's identifier.
    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Returns the configured maximum number of live entities.
    pub fn max_entities(&self) -> u32 {
        self.store.borrow().max_entities()
    }

    /// Returns the number of live entities, excluding the world entity.
    pub fn entity_count(&self) -> u32 {
        self.store.borrow().alive_count()
    }

    /// Returns the handle of the world entity (slot 0).
    pub fn world_entity(&self) -> Entity {
        self.store.borrow().entity(WORLD_ENTITY_ID)
    }

    // ── entity lifecycle ─────────────────────────────────────────────────

    /// Allocates a new enabled entity and publishes [`EntityCreated`].
    ///
    /// ## Errors
    /// Fails with [`EcsError::MaxEntities`] once the live count reaches the
    /// configured maximum.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        let id = self.store.borrow_mut().allocate()?;
        let entity = self.store.borrow().entity(id);
        self.publisher.publish(&EntityCreated { entity_id: id });
        Ok(entity)
    }

    /// Disposes an entity: publishes [`EntityDisposing`] then
    /// [`EntityDisposed`], recycles the slot, and disposes every live entity
    /// whose parent mask names the slot.
    ///
    /// Disposing a dead, stale, unbound, or foreign handle is a silent
    /// no-op, as is disposing the world entity.
    pub fn dispose_entity(&mut self, entity: Entity) {
        if !self.is_alive(entity) || entity.entity_id() == WORLD_ENTITY_ID {
            return;
        }
        let id = entity.entity_id();
        self.publisher.publish(&EntityDisposing { entity_id: id });
        self.publisher.publish(&EntityDisposed { entity_id: id });

        let dependents = {
            let mut store = self.store.borrow_mut();
            store.recycle(id);
            store.dependents_of(id)
        };
        for dependent in dependents {
            let handle = {
                let store = self.store.borrow();
                if store.is_slot_live(dependent) { Some(store.entity(dependent)) } else { None }
            };
            if let Some(handle) = handle {
                self.dispose_entity(handle);
            }
        }
    }

    /// Returns `true` if `entity` names a live slot of this world.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.borrow().is_alive(entity)
    }

    fn ensure_alive(&self, entity: Entity) -> EcsResult<()> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(InvalidHandleError { entity }.into())
        }
    }

    // ── enable state ─────────────────────────────────────────────────────

    /// Returns `true` if the entity is enabled.
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .store
                .borrow()
                .info(entity.entity_id())
                .components
                .get(ENABLED_FLAG)
    }

    /// Enables a disabled entity and publishes [`EntityEnabled`].
    ///
    /// ## Errors
    /// Always validity-checked: a dead or foreign handle fails with
    /// [`EcsError::InvalidHandle`].
    pub fn enable(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        let id = entity.entity_id();
        let flipped = {
            let mut store = self.store.borrow_mut();
            let components = &mut store.info_mut(id).components;
            if components.get(ENABLED_FLAG) {
                false
            } else {
                components.set(ENABLED_FLAG);
                true
            }
        };
        if flipped {
            self.publisher.publish(&EntityEnabled { entity_id: id });
        }
        Ok(())
    }

    /// Disables an enabled entity and publishes [`EntityDisabled`].
    ///
    /// A disabled entity keeps its components but leaves every query index.
    ///
    /// ## Errors
    /// Always validity-checked: a dead or foreign handle fails with
    /// [`EcsError::InvalidHandle`].
    pub fn disable(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        let id = entity.entity_id();
        let flipped = {
            let mut store = self.store.borrow_mut();
            let components = &mut store.info_mut(id).components;
            if components.get(ENABLED_FLAG) {
                components.clear(ENABLED_FLAG);
                true
            } else {
                false
            }
        };
        if flipped {
            self.publisher.publish(&EntityDisabled { entity_id: id });
        }
        Ok(())
    }

    // ── components ───────────────────────────────────────────────────────

    /// Stores `value` as the `T` component of `entity`.
    ///
    /// Publishes [`ComponentAdded`] when the entity did not previously carry
    /// `T`; otherwise overwrites in place and publishes
    /// [`ComponentChanged`], followed by [`ComponentEnabled`] when the
    /// component had been disabled.
    ///
    /// ## Errors
    /// - [`EcsError::InvalidHandle`] on a dead or foreign handle.
    /// - [`EcsError::MaxComponents`] when the pool is full and `T` is not a
    ///   flag type.
    pub fn set<T: Clone + 'static>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        let id = entity.entity_id();
        let pool = self.get_or_create_pool::<T>();
        let added = pool.inner.borrow_mut().set(id, value)?;
        self.publish_component_write::<T>(id, added);
        Ok(())
    }

    /// Aliases the `T` component of `entity` onto the slot already held by
    /// `reference`, sharing one value through a reference count.
    ///
    /// ## Errors
    /// - [`EcsError::ForeignEntity`] when `reference` belongs to another
    ///   world.
    /// - [`EcsError::MissingComponent`] when `reference` does not carry `T`.
    /// - [`EcsError::InvalidHandle`] on dead handles.
    pub fn set_same_as<T: Clone + 'static>(
        &mut self,
        entity: Entity,
        reference: Entity,
    ) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        if reference.world_id() != self.id {
            return Err(ForeignEntityError { expected: self.id, actual: reference.world_id() }.into());
        }
        self.ensure_alive(reference)?;

        let pool = self
            .pool_rc::<T>()
            .ok_or(MissingComponentError { type_name: type_name::<T>() })?;
        let added = pool
            .inner
            .borrow_mut()
            .set_same_as(entity.entity_id(), reference.entity_id())?;
        self.publish_component_write::<T>(entity.entity_id(), added);
        Ok(())
    }

    fn publish_component_write<T: 'static>(&mut self, id: EntityId, added: bool) {
        let flag = self.flag_of::<T>();
        if added {
            self.store.borrow_mut().info_mut(id).components.set(flag);
            self.publisher.publish(&ComponentAdded::<T>::new(id));
        } else {
            self.publisher.publish(&ComponentChanged::<T>::new(id));
            let needs_enable = !self.store.borrow().info(id).components.get(flag);
            if needs_enable {
                self.store.borrow_mut().info_mut(id).components.set(flag);
                self.publisher.publish(&ComponentEnabled::<T>::new(id));
            }
        }
    }

    /// Removes the `T` component of `entity`, publishing
    /// [`ComponentRemoved`] if the entity carried one. Removing an absent
    /// component is a no-op.
    ///
    /// ## Errors
    /// [`EcsError::InvalidHandle`] on a dead or foreign handle.
    pub fn remove<T: 'static>(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        let id = entity.entity_id();
        let Some(pool) = self.pool_rc::<T>() else {
            return Ok(());
        };
        if pool.inner.borrow_mut().remove(id) {
            let flag = self.flag_of::<T>();
            self.store.borrow_mut().info_mut(id).components.clear(flag);
            self.publisher.publish(&ComponentRemoved::<T>::new(id));
        }
        Ok(())
    }

    /// Returns `true` if `entity` carries a `T` component.
    ///
    /// The value of a component disabled through
    /// [`disable_component`](Self::disable_component) still counts as
    /// carried.
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .pool_ref::<T>()
                .map(|pool| pool.inner.borrow().has(entity.entity_id()))
                .unwrap_or(false)
    }

    /// Returns a shared borrow of the `T` component of `entity`.
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<Ref<'_, T>> {
        if !self.is_alive(entity) {
            return None;
        }
        let pool = self.pool_ref::<T>()?;
        Ref::filter_map(pool.inner.borrow(), |p| p.get(entity.entity_id())).ok()
    }

    /// Returns a mutable borrow of the `T` component of `entity`.
    ///
    /// Mutating through the borrow publishes nothing; call
    /// [`notify_changed`](Self::notify_changed) to announce the mutation to
    /// change-tracking indices.
    pub fn get_mut<T: 'static>(&self, entity: Entity) -> Option<RefMut<'_, T>> {
        if !self.is_alive(entity) {
            return None;
        }
        let pool = self.pool_ref::<T>()?;
        RefMut::filter_map(pool.inner.borrow_mut(), |p| p.get_mut(entity.entity_id())).ok()
    }

    /// Returns a contiguous view over every stored `T` value.
    ///
    /// Aliased holders share one element; the view length is the number of
    /// distinct values, not the number of holders.
    pub fn get_all<T: 'static>(&self) -> Option<Ref<'_, [T]>> {
        let pool = self.pool_ref::<T>()?;
        Some(Ref::map(pool.inner.borrow(), |p| p.get_all()))
    }

    /// Publishes [`ComponentChanged`] for a mutation done through
    /// [`get_mut`](Self::get_mut).
    ///
    /// ## Errors
    /// - [`EcsError::InvalidHandle`] on a dead or foreign handle.
    /// - [`EcsError::MissingComponent`] when the entity lacks `T`.
    pub fn notify_changed<T: 'static>(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        if !self.has::<T>(entity) {
            return Err(MissingComponentError { type_name: type_name::<T>() }.into());
        }
        self.publisher.publish(&ComponentChanged::<T>::new(entity.entity_id()));
        Ok(())
    }

    /// Re-enables a disabled `T` component and publishes
    /// [`ComponentEnabled`].
    ///
    /// ## Errors
    /// - [`EcsError::InvalidHandle`] on a dead or foreign handle.
    /// - [`EcsError::MissingComponent`] when the entity lacks `T`.
    pub fn enable_component<T: 'static>(&mut self, entity: Entity) -> EcsResult<()> {
        self.component_flag_flip::<T>(entity, true)
    }

    /// Disables the `T` component of `entity` while keeping its value, and
    /// publishes [`ComponentDisabled`]. The entity leaves every index whose
    /// filter requires `T`.
    ///
    /// ## Errors
    /// - [`EcsError::InvalidHandle`] on a dead or foreign handle.
    /// - [`EcsError::MissingComponent`] when the entity lacks `T`.
    pub fn disable_component<T: 'static>(&mut self, entity: Entity) -> EcsResult<()> {
        self.component_flag_flip::<T>(entity, false)
    }

    fn component_flag_flip<T: 'static>(&mut self, entity: Entity, enable: bool) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        if !self.has::<T>(entity) {
            return Err(MissingComponentError { type_name: type_name::<T>() }.into());
        }
        let id = entity.entity_id();
        let flag = self.flag_of::<T>();
        let flipped = {
            let mut store = self.store.borrow_mut();
            let components = &mut store.info_mut(id).components;
            if components.get(flag) == enable {
                false
            } else {
                if enable { components.set(flag) } else { components.clear(flag) }
                true
            }
        };
        if flipped {
            if enable {
                self.publisher.publish(&ComponentEnabled::<T>::new(id));
            } else {
                self.publisher.publish(&ComponentDisabled::<T>::new(id));
            }
        }
        Ok(())
    }

    /// Returns `true` if `entity` carries a `T` component that is not
    /// disabled.
    pub fn is_component_enabled<T: 'static>(&self, entity: Entity) -> bool {
        if !self.has::<T>(entity) {
            return false;
        }
        match self.flag_lookup::<T>() {
            Some(flag) => self.store.borrow().info(entity.entity_id()).components.get(flag),
            None => false,
        }
    }

    /// Caps the number of distinct `T` values the pool will accept.
    ///
    /// Recorded only while the pool does not exist yet; once a pool has been
    /// created the call has no effect. The cap is clamped to the world's
    /// entity limit, and flag types always resolve to a single shared slot.
    ///
    /// ## Errors
    /// [`EcsError::InvalidComponentCap`] when `count` is zero.
    pub fn set_max_component_count<T: 'static>(&mut self, count: u32) -> EcsResult<()> {
        if count == 0 {
            return Err(EcsError::InvalidComponentCap { type_name: type_name::<T>() });
        }
        let type_id = TypeId::of::<T>();
        if !self.pools_by_type.contains_key(&type_id) {
            self.pending_caps.insert(type_id, count);
        }
        Ok(())
    }

    // ── parent links ─────────────────────────────────────────────────────

    /// Marks `child` as dependent on `parent`: disposing the parent disposes
    /// the child.
    ///
    /// ## Errors
    /// [`EcsError::InvalidHandle`] when either handle is dead or foreign.
    pub fn set_as_parent_of(&mut self, parent: Entity, child: Entity) -> EcsResult<()> {
        self.ensure_alive(parent)?;
        self.ensure_alive(child)?;
        self.store
            .borrow_mut()
            .info_mut(child.entity_id())
            .parents
            .set(parent.entity_id() as Flag);
        Ok(())
    }

    /// Removes a dependency installed by
    /// [`set_as_parent_of`](Self::set_as_parent_of).
    ///
    /// ## Errors
    /// [`EcsError::InvalidHandle`] when either handle is dead or foreign.
    pub fn remove_as_parent_of(&mut self, parent: Entity, child: Entity) -> EcsResult<()> {
        self.ensure_alive(parent)?;
        self.ensure_alive(child)?;
        self.store
            .borrow_mut()
            .info_mut(child.entity_id())
            .parents
            .clear(parent.entity_id() as Flag);
        Ok(())
    }

    // ── world-entity convenience ─────────────────────────────────────────

    /// Stores `value` as a world-level component on the world entity.
    pub fn set_world<T: Clone + 'static>(&mut self, value: T) -> EcsResult<()> {
        let world_entity = self.world_entity();
        self.set(world_entity, value)
    }

    /// Returns a shared borrow of the world-level `T` component.
    pub fn get_world<T: 'static>(&self) -> Option<Ref<'_, T>> {
        self.get(self.world_entity())
    }

    /// Returns `true` if the world entity carries a `T` component.
    pub fn has_world<T: 'static>(&self) -> bool {
        self.has::<T>(self.world_entity())
    }

    /// Removes the world-level `T` component.
    pub fn remove_world<T: 'static>(&mut self) -> EcsResult<()> {
        let world_entity = self.world_entity();
        self.remove::<T>(world_entity)
    }

    // ── enumeration and maintenance ──────────────────────────────────────

    /// Collects the live entity handles in slot order, excluding the world
    /// entity.
    pub fn entities(&self) -> Vec<Entity> {
        let store = self.store.borrow();
        store.live_ids().map(|id| store.entity(id)).collect()
    }

    /// Visits every component pool once.
    pub fn read_all_component_types(&self, reader: &mut dyn ComponentTypeReader) {
        for entry in &self.pools {
            entry.erased.read_type(reader);
        }
    }

    /// Visits every component the entity carries, passing the canonical
    /// owner of each shared slot.
    ///
    /// ## Errors
    /// [`EcsError::InvalidHandle`] on a dead or foreign handle.
    pub fn read_components(&self, entity: Entity, reader: &mut dyn ComponentReader) -> EcsResult<()> {
        self.ensure_alive(entity)?;
        let id = entity.entity_id();
        for entry in &self.pools {
            if let Some(owner_id) = entry.erased.owner_of(id) {
                let owner = self.store.borrow().entity(owner_id);
                entry.erased.read_component(id, owner, reader);
            }
        }
        Ok(())
    }

    /// Clones `source` into `destination_world`, offering every component to
    /// `cloner` first. Entity-level and per-component disabled state is
    /// carried over.
    ///
    /// ## Failure
    /// On any error the destination entity is disposed before the error
    /// propagates, so a failed copy leaves no partial entity behind.
    pub fn copy_entity_to(
        &self,
        source: Entity,
        destination_world: &mut World,
        cloner: &mut dyn ComponentCloner,
    ) -> EcsResult<Entity> {
        self.ensure_alive(source)?;
        let destination = destination_world.create_entity()?;
        let result = self.copy_components(source, destination_world, destination, cloner);
        if let Err(error) = result {
            destination_world.dispose_entity(destination);
            return Err(error);
        }
        Ok(destination)
    }

    fn copy_components(
        &self,
        source: Entity,
        destination_world: &mut World,
        destination: Entity,
        cloner: &mut dyn ComponentCloner,
    ) -> EcsResult<()> {
        let id = source.entity_id();
        for entry in &self.pools {
            if entry.erased.has(id) {
                let enabled = self.store.borrow().info(id).components.get(entry.flag);
                entry.erased.copy_into(id, enabled, destination_world, destination, cloner)?;
            }
        }
        if !self.is_enabled(source) {
            destination_world.disable(destination)?;
        }
        Ok(())
    }

    /// Resolves ordering deferred by sorted indices.
    pub fn optimize(&mut self) {
        self.publisher.publish(&WorldOptimized);
    }

    /// Releases spare capacity held by pools, indices, and the slot store.
    pub fn trim_excess(&mut self) {
        self.publisher.publish(&TrimExcess);
        self.store.borrow_mut().trim();
    }

    // ── bus access ───────────────────────────────────────────────────────

    /// Registers `handler` for message type `M` on this world's bus.
    pub fn subscribe<M: 'static, F: FnMut(&M) + 'static>(&self, handler: F) -> Subscription {
        self.publisher.subscribe(handler)
    }

    /// Publishes `message` to every subscribed handler, in registration
    /// order, on the calling thread.
    pub fn publish<M: 'static>(&self, message: &M) {
        self.publisher.publish(message);
    }

    /// Returns a shareable handle to this world's bus.
    ///
    /// Handlers that need to publish or subscribe re-entrantly capture a
    /// clone of this handle; the single-thread contract still applies.
    pub fn publisher(&self) -> Rc<Publisher> {
        Rc::clone(&self.publisher)
    }

    /// Starts building a query index over this world.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    // ── internals shared with the query builder ──────────────────────────

    pub(crate) fn store_handle(&self) -> Rc<RefCell<EntityStore>> {
        Rc::clone(&self.store)
    }

    /// Returns the flag of `T`, allocating the next monotonic index on first
    /// use.
    pub(crate) fn flag_of<T: 'static>(&mut self) -> Flag {
        let next = &mut self.next_flag;
        *self.flags.entry(TypeId::of::<T>()).or_insert_with(|| {
            let flag = *next;
            *next += 1;
            flag
        })
    }

    fn flag_lookup<T: 'static>(&self) -> Option<Flag> {
        self.flags.get(&TypeId::of::<T>()).copied()
    }

    fn pool_ref<T: 'static>(&self) -> Option<&PoolCell<T>> {
        let index = *self.pools_by_type.get(&TypeId::of::<T>())?;
        (*self.pools[index].any).downcast_ref::<PoolCell<T>>()
    }

    fn pool_rc<T: 'static>(&self) -> Option<Rc<PoolCell<T>>> {
        let index = *self.pools_by_type.get(&TypeId::of::<T>())?;
        Rc::clone(&self.pools[index].any).downcast::<PoolCell<T>>().ok()
    }

    pub(crate) fn get_or_create_pool<T: Clone + 'static>(&mut self) -> Rc<PoolCell<T>> {
        if let Some(pool) = self.pool_rc::<T>() {
            return pool;
        }

        let type_id = TypeId::of::<T>();
        let capacity = self
            .pending_caps
            .remove(&type_id)
            .unwrap_or(self.max_entities())
            .min(self.max_entities());
        let pool = Rc::new(PoolCell::<T>::new(capacity));
        let flag = self.flag_of::<T>();

        // Pools maintain themselves through the bus, registered before any
        // query index can subscribe for the same messages.
        let on_disposed = {
            let pool = Rc::clone(&pool);
            self.publisher.subscribe::<EntityDisposed, _>(move |message| {
                pool.inner.borrow_mut().remove(message.entity_id);
            })
        };
        let on_trim = {
            let pool = Rc::clone(&pool);
            self.publisher.subscribe::<TrimExcess, _>(move |_| {
                pool.inner.borrow_mut().trim();
            })
        };
        self.pool_subscriptions.push(on_disposed);
        self.pool_subscriptions.push(on_trim);

        self.pools_by_type.insert(type_id, self.pools.len());
        self.pools.push(PoolEntry {
            flag,
            erased: Rc::clone(&pool) as Rc<dyn ErasedPool>,
            any: Rc::clone(&pool) as Rc<dyn Any>,
        });
        pool
    }
}

impl Drop for World {
    fn drop(&mut self) {
        release_world_id(self.id);
        log::trace!("world {} dropped", self.id);
    }
}
