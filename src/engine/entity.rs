//! # Entity Handles and Slot Storage
//!
//! This module defines the entity identity, lifecycle metadata, and slot
//! storage used by the container.
//!
//! ## Purpose
//! Entities are lightweight, opaque handles that reference slots inside a
//! world. This module is responsible for:
//!
//! - Generating stable entity handles
//! - Tracking entity liveness via versioning
//! - Recording per-slot metadata (membership vector, parent mask)
//! - Recycling slots through a free list
//!
//! ## Entity Model
//! An `Entity` is a compact, versioned handle composed of:
//!
//! - A **world ID**, identifying which world owns the entity
//! - An **index**, identifying the slot within the world
//! - A **version**, used to detect stale or recycled handles
//!
//! This layout allows fast validation and prevents use-after-free bugs when
//! entities are disposed and their slots reused.
//!
//! ## Invariants
//! - An entity handle is alive if and only if its world matches, its slot is
//!   marked live, and its version matches the version stored in the slot.
//! - Disposing an entity invalidates every previously issued handle to it.
//! - A slot whose version increment would produce the retirement sentinel is
//!   never returned to the free list.
//!
//! ## Concurrency
//! Slot storage is **not thread-safe**; the owning world serializes all
//! access on a single thread.

use crate::engine::bitset::FlagSet;
use crate::engine::error::MaxEntitiesError;
use crate::engine::types::{
    EntityBits, EntityId, Flag, Version, WorldId, INDEX_BITS, INDEX_MASK, RETIRED_VERSION,
    UNBOUND_WORLD, VERSION_BITS, VERSION_MASK, ENABLED_FLAG,
};

/// Slot index reserved in every world for the world entity.
pub const WORLD_ENTITY_ID: EntityId = 0;

/// Opaque, versioned handle for an entity.
///
/// ## Representation
/// Internally, an `Entity` packs three values into a single integer:
///
/// - **World ID**, identifying the owning world
/// - **Version**, incremented on disposal to invalidate stale handles
/// - **Index**, the slot within the world
///
/// ## Invariants
/// - Two handles with the same `(world, index)` but different versions are
///   distinct.
/// - The default handle is *unbound* (world field zero) and is rejected by
///   every operation.
///
/// ## Notes
/// `Entity` values are cheap to copy, compare, and hash.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Entity(pub(crate) EntityBits);

#[inline]
const fn make_bits(world: WorldId, id: EntityId, version: Version) -> EntityBits {
    ((world as EntityBits) << (VERSION_BITS + INDEX_BITS))
        | (((version as u16) as EntityBits) << INDEX_BITS)
        | ((id as u32) as EntityBits)
}

impl Entity {
    /// Builds a handle from its parts.
    #[inline]
    pub(crate) const fn new(world: WorldId, id: EntityId, version: Version) -> Self {
        Entity(make_bits(world, id, version))
    }

    /// Returns the identifier of the world that issued this handle.
    #[inline]
    pub fn world_id(self) -> WorldId {
        (self.0 >> (VERSION_BITS + INDEX_BITS)) as WorldId
    }

    /// Returns the slot index encoded in this handle.
    #[inline]
    pub fn entity_id(self) -> EntityId {
        (self.0 & INDEX_MASK) as u32 as EntityId
    }

    /// Returns the version encoded in this handle.
    #[inline]
    pub fn version(self) -> Version {
        ((self.0 >> INDEX_BITS) & VERSION_MASK) as u16 as Version
    }

    /// Returns `true` if this handle names a world at all.
    ///
    /// An unbound handle (the default value) is rejected by every container
    /// operation; disposal of one is a silent no-op.
    #[inline]
    pub fn is_bound(self) -> bool {
        self.world_id() != UNBOUND_WORLD
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("world", &self.world_id())
            .field("id", &self.entity_id())
            .field("version", &self.version())
            .finish()
    }
}

/// Per-slot metadata of one entity.
///
/// ## Fields
/// - `version`: generation counter matched against handles.
/// - `parents`: mask of entity slots this entity depends on; disposing a
///   parent disposes the dependents.
/// - `components`: membership vector of component flags plus the enabled
///   flag.
#[derive(Clone, Default)]
pub(crate) struct EntityInfo {
    pub(crate) version: Version,
    pub(crate) parents: FlagSet,
    pub(crate) components: FlagSet,
}

/// Slot storage of one world.
///
/// ## Design
/// - Slots are allocated from a free list of indices.
/// - Versions are incremented on disposal to invalidate stale handles.
/// - Slot 0 is reserved at construction for the world entity and never
///   recycled.
///
/// ## Invariants
/// - `infos.len() == live.len()`.
/// - Free indices always refer to dead slots.
/// - `alive` counts live slots excluding the world entity.
pub(crate) struct EntityStore {
    world_id: WorldId,
    max_entities: u32,
    infos: Vec<EntityInfo>,
    live: Vec<bool>,
    free: Vec<EntityId>,
    alive: u32,
}

impl EntityStore {
    /// Creates slot storage with the world entity occupying slot 0.
    pub(crate) fn new(world_id: WorldId, max_entities: u32) -> Self {
        let mut world_info = EntityInfo::default();
        world_info.components.set(ENABLED_FLAG);
        Self {
            world_id,
            max_entities,
            infos: vec![world_info],
            live: vec![true],
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Returns the configured maximum number of live entities.
    #[inline]
    pub(crate) fn max_entities(&self) -> u32 {
        self.max_entities
    }

    /// Returns the number of live entities, excluding the world entity.
    #[inline]
    pub(crate) fn alive_count(&self) -> u32 {
        self.alive
    }

    /// Allocates a slot, reusing a free one when available.
    ///
    /// ## Behavior
    /// - Reuses a free slot with its stored version, or extends storage with
    ///   version 0.
    /// - Marks the slot live and enabled.
    ///
    /// ## Errors
    /// Returns [`MaxEntitiesError`] when the live count has reached the
    /// configured maximum.
    pub(crate) fn allocate(&mut self) -> Result<EntityId, MaxEntitiesError> {
        if self.alive >= self.max_entities {
            return Err(MaxEntitiesError { capacity: self.max_entities });
        }

        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.infos.len() as EntityId;
                self.infos.push(EntityInfo::default());
                self.live.push(false);
                id
            }
        };

        let index = id as usize;
        self.live[index] = true;
        self.infos[index].components.set(ENABLED_FLAG);
        self.alive += 1;
        Ok(id)
    }

    /// Returns `true` if the handle names a live slot of this store.
    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        if entity.world_id() != self.world_id {
            return false;
        }
        let id = entity.entity_id();
        if id < 0 {
            return false;
        }
        let index = id as usize;
        index < self.infos.len()
            && self.live[index]
            && self.infos[index].version == entity.version()
    }

    /// Returns `true` if the slot itself is live.
    #[inline]
    pub(crate) fn is_slot_live(&self, id: EntityId) -> bool {
        let index = id as usize;
        id >= 0 && index < self.live.len() && self.live[index]
    }

    /// Builds the current handle for a live slot.
    #[inline]
    pub(crate) fn entity(&self, id: EntityId) -> Entity {
        Entity::new(self.world_id, id, self.infos[id as usize].version)
    }

    /// Returns the metadata of a slot.
    #[inline]
    pub(crate) fn info(&self, id: EntityId) -> &EntityInfo {
        &self.infos[id as usize]
    }

    /// Returns the metadata of a slot, mutably.
    #[inline]
    pub(crate) fn info_mut(&mut self, id: EntityId) -> &mut EntityInfo {
        &mut self.infos[id as usize]
    }

    /// Kills a slot: clears its metadata, bumps its version, and recycles it.
    ///
    /// ## Behavior
    /// The version increment wrap-skips the retirement sentinel: a slot whose
    /// next version would be the sentinel has exhausted its generations and
    /// is dropped from circulation instead of rejoining the free list.
    pub(crate) fn recycle(&mut self, id: EntityId) {
        let index = id as usize;
        let info = &mut self.infos[index];
        info.components.clear_all();
        info.parents.clear_all();

        let next = info.version.wrapping_add(1);
        info.version = next;
        self.live[index] = false;
        self.alive -= 1;
        if next != RETIRED_VERSION {
            self.free.push(id);
        } else {
            log::trace!("entity slot {} of world {} retired", id, self.world_id);
        }
    }

    /// Collects the live slots whose parent mask names `id`.
    pub(crate) fn dependents_of(&self, id: EntityId) -> Vec<EntityId> {
        let flag = id as Flag;
        self.infos
            .iter()
            .enumerate()
            .filter(|(index, info)| self.live[*index] && info.parents.get(flag))
            .map(|(index, _)| index as EntityId)
            .collect()
    }

    /// Iterates over live user slots in slot order, skipping the world
    /// entity.
    pub(crate) fn live_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, live)| **live)
            .map(|(index, _)| index as EntityId)
    }

    /// Releases spare free-list capacity.
    pub(crate) fn trim(&mut self) {
        self.free.shrink_to_fit();
        self.infos.shrink_to_fit();
        self.live.shrink_to_fit();
    }
}
