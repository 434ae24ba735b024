//! Error types for the entity-component container.
//!
//! This module declares focused, composable error types used across the
//! container and its serializers. Each error carries enough context to make
//! failures actionable while remaining small and cheap to pass around or
//! convert into the aggregate [`EcsError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (stale
//!   handles, cross-world references, pool exhaustion).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into aggregates.
//! * **Actionability:** Structured fields (offending handle, type name,
//!   capacity) make logs useful without reproducing the issue.
//!
//! ## Typical flow
//! Low-level pool and store operations return small, dedicated error types.
//! Higher-level world operations use `?` to bubble failures into
//! [`EcsError`], which callers can match on for control flow.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;
use std::io;

use crate::engine::entity::Entity;
use crate::engine::types::WorldId;

/// Convenience alias for results produced by container operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Returned when an operation receives a handle that does not name a live
/// entity.
///
/// This covers unbound handles (world field zero), handles from another
/// world, and stale handles whose version no longer matches the slot.
///
/// ### Example
/// ```ignore
/// if !world.is_alive(entity) {
///     return Err(InvalidHandleError { entity }.into());
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidHandleError {
    /// The offending handle.
    pub entity: Entity,
}

impl fmt::Display for InvalidHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stale, unbound, or foreign entity handle: {:?}", self.entity)
    }
}

impl std::error::Error for InvalidHandleError {}

/// Returned when an aliasing operation references an entity from a different
/// world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignEntityError {
    /// World the operation ran against.
    pub expected: WorldId,

    /// World the reference handle belongs to.
    pub actual: WorldId,
}

impl fmt::Display for ForeignEntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entity belongs to world {} but the operation targets world {}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for ForeignEntityError {}

/// Returned when an operation requires a component the entity does not carry.
///
/// Raised by `set_same_as` when the reference entity lacks the component, by
/// `notify_changed` and the per-component enable toggles when the target
/// entity lacks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingComponentError {
    /// Rust type name of the missing component.
    pub type_name: &'static str,
}

impl fmt::Display for MissingComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity does not carry component {}", self.type_name)
    }
}

impl std::error::Error for MissingComponentError {}

/// Returned when a component pool cannot accept another distinct value.
///
/// Only non-flag component types can exhaust their pool; flag types share a
/// single slot regardless of holder count.
///
/// ### Fields
/// * `type_name`: Component type whose pool is full.
/// * `capacity`: The configured maximum number of distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxComponentsError {
    /// Component type whose pool is full.
    pub type_name: &'static str,

    /// Configured maximum number of distinct values.
    pub capacity: u32,
}

impl fmt::Display for MaxComponentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "component pool for {} is full (capacity {})",
            self.type_name, self.capacity
        )
    }
}

impl std::error::Error for MaxComponentsError {}

/// Returned when the world cannot allocate another entity slot.
///
/// ### Fields
/// * `capacity`: The maximum live entity count of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxEntitiesError {
    /// Configured maximum live entity count.
    pub capacity: u32,
}

impl fmt::Display for MaxEntitiesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity limit reached (capacity {})", self.capacity)
    }
}

impl std::error::Error for MaxEntitiesError {}

/// Aggregate error for container operations.
///
/// Wraps the focused failure modes so callers can write `?` against a single
/// expressive type. `From<T>` conversions are provided for every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A handle was stale, unbound, or named another world.
    InvalidHandle(InvalidHandleError),

    /// An aliasing operation crossed world boundaries.
    ForeignEntity(ForeignEntityError),

    /// A required component was absent.
    MissingComponent(MissingComponentError),

    /// A component pool was full.
    MaxComponents(MaxComponentsError),

    /// The world was full.
    MaxEntities(MaxEntitiesError),

    /// A component capacity of zero was requested.
    InvalidComponentCap {
        /// Component type the capacity was requested for.
        type_name: &'static str,
    },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::InvalidHandle(e) => write!(f, "{e}"),
            EcsError::ForeignEntity(e) => write!(f, "{e}"),
            EcsError::MissingComponent(e) => write!(f, "{e}"),
            EcsError::MaxComponents(e) => write!(f, "{e}"),
            EcsError::MaxEntities(e) => write!(f, "{e}"),
            EcsError::InvalidComponentCap { type_name } => {
                write!(f, "maximum component count for {} must be at least 1", type_name)
            }
        }
    }
}

impl std::error::Error for EcsError {}

impl From<InvalidHandleError> for EcsError {
    fn from(e: InvalidHandleError) -> Self { EcsError::InvalidHandle(e) }
}
impl From<ForeignEntityError> for EcsError {
    fn from(e: ForeignEntityError) -> Self { EcsError::ForeignEntity(e) }
}
impl From<MissingComponentError> for EcsError {
    fn from(e: MissingComponentError) -> Self { EcsError::MissingComponent(e) }
}
impl From<MaxComponentsError> for EcsError {
    fn from(e: MaxComponentsError) -> Self { EcsError::MaxComponents(e) }
}
impl From<MaxEntitiesError> for EcsError {
    fn from(e: MaxEntitiesError) -> Self { EcsError::MaxEntities(e) }
}

/// Errors produced while reading or writing a serialized world.
///
/// ## Context
/// Raised by the text and binary serializers. Line numbers are 1-based and
/// refer to the text form; binary failures report byte-level causes through
/// [`SerializationError::Io`] and [`SerializationError::UnexpectedEnd`].
#[derive(Debug)]
pub enum SerializationError {
    /// A `ComponentType` line named a type that was never registered.
    UnknownType {
        /// The fully qualified type token from the stream.
        type_name: String,
    },

    /// A component line used a short name no `ComponentType` line declared.
    UnknownShortName {
        /// The short name token.
        short_name: String,
        /// Line the token appeared on.
        line: usize,
    },

    /// A value could not be parsed for its declared component type.
    MalformedValue {
        /// Line the value started on, when known.
        line: usize,
        /// What the parser expected.
        expected: &'static str,
    },

    /// A component record appeared before any `Entity` line.
    ComponentBeforeEntity {
        /// Line the record appeared on.
        line: usize,
    },

    /// A `ComponentSameAs` record referenced an entity not yet defined.
    UnknownEntity {
        /// The referenced entity number.
        entity: u32,
        /// Line the reference appeared on.
        line: usize,
    },

    /// The stream ended inside a record.
    UnexpectedEnd,

    /// A container operation failed while rebuilding the world.
    World(EcsError),

    /// The underlying stream failed.
    Io(io::Error),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::UnknownType { type_name } => {
                write!(f, "unregistered component type: {}", type_name)
            }
            SerializationError::UnknownShortName { short_name, line } => {
                write!(f, "undeclared component short name {} on line {}", short_name, line)
            }
            SerializationError::MalformedValue { line, expected } => {
                write!(f, "malformed value on line {}: expected {}", line, expected)
            }
            SerializationError::ComponentBeforeEntity { line } => {
                write!(f, "component record on line {} precedes any Entity line", line)
            }
            SerializationError::UnknownEntity { entity, line } => {
                write!(f, "line {} references undefined entity {}", line, entity)
            }
            SerializationError::UnexpectedEnd => f.write_str("stream ended inside a record"),
            SerializationError::World(e) => write!(f, "failed to rebuild world: {e}"),
            SerializationError::Io(e) => write!(f, "stream failure: {e}"),
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::World(e) => Some(e),
            SerializationError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EcsError> for SerializationError {
    fn from(e: EcsError) -> Self { SerializationError::World(e) }
}

impl From<io::Error> for SerializationError {
    fn from(e: io::Error) -> Self { SerializationError::Io(e) }
}
