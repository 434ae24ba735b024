//! # Component Pools
//!
//! Dense, reference-counted storage of one component type for one world.
//!
//! ## Layout
//! A pool keeps three parallel structures:
//!
//! - `mapping`: sparse entity-slot to dense-slot map (`-1` when absent),
//! - `components`: dense value array,
//! - `links`: per dense slot, the canonical owner entity and the number of
//!   entities aliased onto the slot.
//!
//! ## Invariants
//! - For every entity `e` with `mapping[e] == s >= 0`, `links[s].ref_count`
//!   counts exactly the distinct entities mapped to `s`, and
//!   `links[s].owner` is one of them.
//! - `components.len() == links.len() == last_slot + 1`; slots above
//!   `last_slot` do not exist.
//! - Removing the final reference to a slot swap-pops the last live slot
//!   into the vacated position and decrements `last_slot`.
//! - For flag types (zero-sized components) `last_slot` never exceeds 0;
//!   every holder aliases slot 0 through the reference count.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;

use crate::engine::cloner::{CloneOutcome, ComponentCloner};
use crate::engine::entity::Entity;
use crate::engine::error::{EcsResult, MaxComponentsError, MissingComponentError};
use crate::engine::reader::{ComponentReader, ComponentTypeInfo, ComponentTypeReader};
use crate::engine::types::EntityId;
use crate::engine::world::World;

const NO_SLOT: i32 = -1;

/// Dense-slot bookkeeping: canonical owner plus alias count.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Link {
    pub(crate) owner: EntityId,
    pub(crate) ref_count: u16,
}

pub(crate) struct ComponentPool<T> {
    mapping: Vec<i32>,
    components: Vec<T>,
    links: Vec<Link>,
    last_slot: i32,
    max_components: u32,
    is_flag: bool,
}

impl<T: 'static> ComponentPool<T> {
    /// Creates an empty pool.
    ///
    /// Zero-sized component types are detected here and forced to a single
    /// shared slot regardless of the requested capacity.
    pub(crate) fn new(max_components: u32) -> Self {
        let is_flag = std::mem::size_of::<T>() == 0;
        Self {
            mapping: Vec::new(),
            components: Vec::new(),
            links: Vec::new(),
            last_slot: NO_SLOT,
            max_components: if is_flag { 1 } else { max_components },
            is_flag,
        }
    }

    #[inline]
    pub(crate) fn max_components(&self) -> u32 {
        self.max_components
    }

    #[inline]
    fn slot_of(&self, entity: EntityId) -> Option<usize> {
        if entity < 0 {
            return None;
        }
        match self.mapping.get(entity as usize) {
            Some(&slot) if slot >= 0 => Some(slot as usize),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn has(&self, entity: EntityId) -> bool {
        self.slot_of(entity).is_some()
    }

    #[inline]
    fn ensure_mapping(&mut self, entity: EntityId) {
        let index = entity as usize;
        if index >= self.mapping.len() {
            self.mapping.resize(index + 1, NO_SLOT);
        }
    }

    /// Stores `value` for `entity`.
    ///
    /// Returns `true` when the entity did not previously carry the
    /// component. Overwrites happen in place and return `false`.
    pub(crate) fn set(&mut self, entity: EntityId, value: T) -> Result<bool, MaxComponentsError> {
        self.ensure_mapping(entity);
        let index = entity as usize;

        let slot = self.mapping[index];
        if slot >= 0 {
            self.components[slot as usize] = value;
            return Ok(false);
        }

        if self.last_slot + 1 >= self.max_components as i32 {
            if self.is_flag && self.last_slot >= 0 {
                // Every holder of a flag type shares the canonical slot.
                let slot = self.last_slot as usize;
                debug_assert!(self.links[slot].ref_count < u16::MAX);
                self.links[slot].ref_count += 1;
                self.mapping[index] = self.last_slot;
                return Ok(true);
            }
            if !self.is_flag {
                return Err(MaxComponentsError {
                    type_name: type_name::<T>(),
                    capacity: self.max_components,
                });
            }
        }

        self.last_slot += 1;
        self.mapping[index] = self.last_slot;
        self.components.push(value);
        self.links.push(Link { owner: entity, ref_count: 1 });
        Ok(true)
    }

    /// Aliases `entity` onto the slot already held by `reference`.
    ///
    /// Returns `true` when the entity did not previously carry the
    /// component. Re-aliasing onto the same slot is a no-op returning
    /// `false`; aliasing away from a different slot releases the old
    /// reference first.
    pub(crate) fn set_same_as(
        &mut self,
        entity: EntityId,
        reference: EntityId,
    ) -> Result<bool, MissingComponentError> {
        let Some(reference_slot) = self.slot_of(reference) else {
            return Err(MissingComponentError { type_name: type_name::<T>() });
        };

        self.ensure_mapping(entity);
        let index = entity as usize;
        let current = self.mapping[index];
        if current == reference_slot as i32 {
            return Ok(false);
        }

        let had_component = current >= 0;
        if had_component {
            self.unlink(entity);
        }

        // The unlink may have swap-popped the reference's slot; re-read it.
        let slot = self.mapping[reference as usize] as usize;
        debug_assert!(self.links[slot].ref_count < u16::MAX);
        self.links[slot].ref_count += 1;
        self.mapping[index] = slot as i32;
        Ok(!had_component)
    }

    /// Removes the component of `entity`, if any.
    pub(crate) fn remove(&mut self, entity: EntityId) -> bool {
        if !self.has(entity) {
            return false;
        }
        self.unlink(entity);
        true
    }

    fn unlink(&mut self, entity: EntityId) {
        let index = entity as usize;
        let slot = self.mapping[index];
        debug_assert!(slot >= 0);
        let slot = slot as usize;
        self.mapping[index] = NO_SLOT;

        self.links[slot].ref_count -= 1;
        if self.links[slot].ref_count > 0 {
            if self.links[slot].owner == entity {
                // The canonical author left; promote another holder.
                let successor = self
                    .mapping
                    .iter()
                    .position(|&s| s == slot as i32)
                    .expect("aliased slot with a positive ref count has no holder");
                self.links[slot].owner = successor as EntityId;
            }
            return;
        }

        let last = self.last_slot as usize;
        self.components.swap_remove(slot);
        self.links.swap_remove(slot);
        if slot != last {
            // The previous last slot now lives at `slot`; repoint its
            // holders.
            let moved = self.links[slot];
            if moved.ref_count == 1 {
                self.mapping[moved.owner as usize] = slot as i32;
            } else {
                for mapped in self.mapping.iter_mut() {
                    if *mapped == last as i32 {
                        *mapped = slot as i32;
                    }
                }
            }
        }
        self.last_slot -= 1;
    }

    #[inline]
    pub(crate) fn get(&self, entity: EntityId) -> Option<&T> {
        self.slot_of(entity).map(|slot| &self.components[slot])
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slot_of(entity).map(move |slot| &mut self.components[slot])
    }

    /// Contiguous view over the live slots.
    #[inline]
    pub(crate) fn get_all(&self) -> &[T] {
        &self.components
    }

    pub(crate) fn owner_of(&self, entity: EntityId) -> Option<EntityId> {
        self.slot_of(entity).map(|slot| self.links[slot].owner)
    }

    pub(crate) fn trim(&mut self) {
        self.mapping.shrink_to_fit();
        self.components.shrink_to_fit();
        self.links.shrink_to_fit();
    }
}

/// Shared cell around a pool, handed to bus handlers and query indices.
pub(crate) struct PoolCell<T> {
    pub(crate) inner: RefCell<ComponentPool<T>>,
}

impl<T: 'static> PoolCell<T> {
    pub(crate) fn new(max_components: u32) -> Self {
        Self { inner: RefCell::new(ComponentPool::new(max_components)) }
    }
}

/// Type-erased pool facade used for world enumeration and entity copies.
pub(crate) trait ErasedPool {
    fn type_info(&self) -> ComponentTypeInfo;
    fn has(&self, entity: EntityId) -> bool;
    fn owner_of(&self, entity: EntityId) -> Option<EntityId>;
    fn read_component(&self, entity: EntityId, owner: Entity, reader: &mut dyn ComponentReader);
    fn read_type(&self, reader: &mut dyn ComponentTypeReader);
    fn copy_into(
        &self,
        entity: EntityId,
        enabled: bool,
        destination_world: &mut World,
        destination: Entity,
        cloner: &mut dyn ComponentCloner,
    ) -> EcsResult<()>;
}

impl<T: Clone + 'static> ErasedPool for PoolCell<T> {
    fn type_info(&self) -> ComponentTypeInfo {
        ComponentTypeInfo {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            max_components: self.inner.borrow().max_components(),
        }
    }

    fn has(&self, entity: EntityId) -> bool {
        self.inner.borrow().has(entity)
    }

    fn owner_of(&self, entity: EntityId) -> Option<EntityId> {
        self.inner.borrow().owner_of(entity)
    }

    fn read_component(&self, entity: EntityId, owner: Entity, reader: &mut dyn ComponentReader) {
        let pool = self.inner.borrow();
        if let Some(component) = pool.get(entity) {
            reader.on_read(component as &dyn Any, owner);
        }
    }

    fn read_type(&self, reader: &mut dyn ComponentTypeReader) {
        reader.on_type(&self.type_info());
    }

    fn copy_into(
        &self,
        entity: EntityId,
        enabled: bool,
        destination_world: &mut World,
        destination: Entity,
        cloner: &mut dyn ComponentCloner,
    ) -> EcsResult<()> {
        let outcome = {
            let pool = self.inner.borrow();
            let Some(component) = pool.get(entity) else {
                return Ok(());
            };
            cloner.clone_component(
                TypeId::of::<T>(),
                type_name::<T>(),
                component as &dyn Any,
                destination_world,
                destination,
            )?
        };

        match outcome {
            CloneOutcome::Skip => return Ok(()),
            CloneOutcome::Handled => {}
            CloneOutcome::Default => {
                let value = {
                    let pool = self.inner.borrow();
                    match pool.get(entity) {
                        Some(component) => component.clone(),
                        None => return Ok(()),
                    }
                };
                destination_world.set(destination, value)?;
            }
        }

        if !enabled && destination_world.has::<T>(destination) {
            destination_world.disable_component::<T>(destination)?;
        }
        Ok(())
    }
}
