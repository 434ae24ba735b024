//! # pulse-ecs
//!
//! Message-driven entity-component container for data-oriented state.
//!
//! ## Design Goals
//! - Dense, reference-counted component storage with same-as aliasing
//! - Incrementally maintained query indices driven by a typed bus
//! - Versioned entity handles with safe slot recycling
//! - Text and binary serialization of whole worlds
//!
//! A [`World`] owns entity slots, per-type component pools, and a
//! synchronous [`Publisher`]; every mutation announces itself on the bus,
//! which is what keeps [`EntitySet`] and the other indices consistent
//! without scans.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core container types

pub use engine::world::World;

pub use engine::entity::Entity;

pub use engine::bitset::FlagSet;

pub use engine::publisher::{Publisher, Subscription};

pub use engine::messages::{
    ComponentAdded,
    ComponentChanged,
    ComponentDisabled,
    ComponentEnabled,
    ComponentRemoved,
    EntityCreated,
    EntityDisabled,
    EntityDisposed,
    EntityDisposing,
    EntityEnabled,
    TrimExcess,
    WorldOptimized,
};

pub use engine::query::{EitherGroup, QueryBuilder};

pub use engine::sets::{EntityMap, EntityMultiMap, EntitySet, EntitySortedSet};

pub use engine::cloner::{CloneOutcome, ComponentCloner, DefaultCloner};

pub use engine::reader::{ComponentReader, ComponentTypeInfo, ComponentTypeReader};

pub use engine::serial::{FieldValue, SerializableComponent, Serializer};

pub use engine::text_serializer::TextSerializer;
pub use engine::binary_serializer::BinarySerializer;

pub use engine::error::{
    EcsError,
    EcsResult,
    ForeignEntityError,
    InvalidHandleError,
    MaxComponentsError,
    MaxEntitiesError,
    MissingComponentError,
    SerializationError,
};

pub use engine::types::{EntityId, Flag, Version, WorldId};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used container types.
///
/// Import with:
/// ```rust
/// use pulse_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BinarySerializer,
        CloneOutcome,
        ComponentCloner,
        DefaultCloner,
        EcsError,
        EcsResult,
        Entity,
        EntityMap,
        EntityMultiMap,
        EntitySet,
        EntitySortedSet,
        FieldValue,
        QueryBuilder,
        SerializableComponent,
        SerializationError,
        Serializer,
        TextSerializer,
        World,
    };
}
