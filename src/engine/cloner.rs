//! Per-type hooks for copying entities between worlds.
//!
//! `World::copy_entity_to` walks the source entity's components and offers
//! each one to a [`ComponentCloner`] before falling back to the pool's
//! default behavior (clone the value into the destination). Implementations
//! override the outcome per type; [`DefaultCloner`] defers everything.

use std::any::{Any, TypeId};

use crate::engine::entity::Entity;
use crate::engine::error::EcsResult;
use crate::engine::world::World;

/// Decision returned by [`ComponentCloner::clone_component`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloneOutcome {
    /// The cloner wrote the destination component itself.
    Handled,

    /// Fall back to the default: clone the source value into the
    /// destination.
    Default,

    /// Leave this component out of the destination entity.
    Skip,
}

/// Per-type override hook for entity copies.
///
/// ## Failure
/// Returning an error aborts the copy; the destination entity is disposed
/// before the error propagates.
pub trait ComponentCloner {
    /// Offers one source component to the cloner.
    ///
    /// `source` is the live component value; implementations that answer
    /// [`CloneOutcome::Handled`] are expected to have set a component on
    /// `destination` inside `destination_world` themselves.
    fn clone_component(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
        source: &dyn Any,
        destination_world: &mut World,
        destination: Entity,
    ) -> EcsResult<CloneOutcome>;
}

/// Cloner that defers every type to the default copy behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCloner;

impl ComponentCloner for DefaultCloner {
    fn clone_component(
        &mut self,
        _type_id: TypeId,
        _type_name: &'static str,
        _source: &dyn Any,
        _destination_world: &mut World,
        _destination: Entity,
    ) -> EcsResult<CloneOutcome> {
        Ok(CloneOutcome::Default)
    }
}
