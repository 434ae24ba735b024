//! Visitor interfaces for enumerating a world's contents.
//!
//! Serializers and diagnostic tools consume a world through these two
//! callbacks rather than through pool internals: one visit per registered
//! pool ([`ComponentTypeReader`]) and one visit per component an entity
//! carries ([`ComponentReader`]). Values are passed as `&dyn Any`; clients
//! recover the concrete type by `TypeId` lookup.

use std::any::{Any, TypeId};

use crate::engine::entity::Entity;

/// Description of one component pool.
#[derive(Clone, Copy, Debug)]
pub struct ComponentTypeInfo {
    /// Runtime type of the pooled component.
    pub type_id: TypeId,

    /// Rust type name of the pooled component.
    pub type_name: &'static str,

    /// Maximum number of distinct values the pool accepts.
    pub max_components: u32,
}

/// Receives one call per component of an entity.
pub trait ComponentReader {
    /// Visits one component value.
    ///
    /// `owner` is the canonical author of the underlying storage slot; for
    /// aliased components it may differ from the entity being read.
    fn on_read(&mut self, component: &dyn Any, owner: Entity);
}

/// Receives one call per component pool of a world.
pub trait ComponentTypeReader {
    /// Visits one pool description.
    fn on_type(&mut self, info: &ComponentTypeInfo);
}
