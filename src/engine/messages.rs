//! Lifecycle messages published by a world.
//!
//! Every mutating world operation announces itself on the world's
//! [`Publisher`](crate::engine::publisher::Publisher) with one of these
//! types. Messages carry the entity slot index; subscribers that need the
//! full handle or the membership vector read them from the world state they
//! captured at subscription time.

use std::marker::PhantomData;

use crate::engine::types::EntityId;

/// Published right after an entity is created.
#[derive(Clone, Copy, Debug)]
pub struct EntityCreated {
    /// Slot of the created entity.
    pub entity_id: EntityId,
}

/// Published when disposal of an entity begins.
///
/// Query sets still contain the entity while this message is dispatched.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisposing {
    /// Slot of the entity being disposed.
    pub entity_id: EntityId,
}

/// Published when disposal of an entity completes.
///
/// Pools drop their entries during dispatch of this message; once it
/// returns, no component of the entity remains.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisposed {
    /// Slot of the disposed entity.
    pub entity_id: EntityId,
}

/// Published when a disabled entity becomes enabled.
#[derive(Clone, Copy, Debug)]
pub struct EntityEnabled {
    /// Slot of the enabled entity.
    pub entity_id: EntityId,
}

/// Published when an enabled entity becomes disabled.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisabled {
    /// Slot of the disabled entity.
    pub entity_id: EntityId,
}

/// Published when an entity receives a component of type `T` it did not
/// previously carry.
pub struct ComponentAdded<T> {
    /// Slot of the entity that gained the component.
    pub entity_id: EntityId,
    marker: PhantomData<fn(T)>,
}

/// Published when an existing component of type `T` is overwritten, or when
/// a change is announced explicitly.
pub struct ComponentChanged<T> {
    /// Slot of the entity whose component changed.
    pub entity_id: EntityId,
    marker: PhantomData<fn(T)>,
}

/// Published when an entity loses its component of type `T`.
pub struct ComponentRemoved<T> {
    /// Slot of the entity that lost the component.
    pub entity_id: EntityId,
    marker: PhantomData<fn(T)>,
}

/// Published when a disabled component of type `T` becomes enabled again.
pub struct ComponentEnabled<T> {
    /// Slot of the entity whose component was enabled.
    pub entity_id: EntityId,
    marker: PhantomData<fn(T)>,
}

/// Published when a component of type `T` is disabled while keeping its
/// value.
pub struct ComponentDisabled<T> {
    /// Slot of the entity whose component was disabled.
    pub entity_id: EntityId,
    marker: PhantomData<fn(T)>,
}

macro_rules! component_message {
    ($name:ident) => {
        impl<T> $name<T> {
            pub(crate) fn new(entity_id: EntityId) -> Self {
                Self { entity_id, marker: PhantomData }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self::new(self.entity_id)
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("entity_id", &self.entity_id)
                    .finish()
            }
        }
    };
}

component_message!(ComponentAdded);
component_message!(ComponentChanged);
component_message!(ComponentRemoved);
component_message!(ComponentEnabled);
component_message!(ComponentDisabled);

/// Published by `World::trim_excess`; pools and indices release spare
/// capacity when they receive it.
#[derive(Clone, Copy, Debug)]
pub struct TrimExcess;

/// Published by `World::optimize`; sorted indices resolve deferred ordering
/// when they receive it.
#[derive(Clone, Copy, Debug)]
pub struct WorldOptimized;
