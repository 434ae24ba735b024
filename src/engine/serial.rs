//! # Serialization Core
//!
//! The pieces shared by the text and binary serializers: the [`FieldValue`]
//! tree, the [`SerializableComponent`] trait that replaces reflection-based
//! field enumeration, the per-type registry both serializers consult, and
//! the world-snapshot walk that discovers shared component slots.
//!
//! ## Model
//! A component value serializes to a [`FieldValue`]: either a scalar token
//! or an object of named fields, nested arbitrarily. Components opt in by
//! implementing [`SerializableComponent`]; the serializers depend only on
//! that interface plus `Clone`, never on type layout.
//!
//! ## Sharing
//! Aliased components survive round-trips structurally: during the snapshot
//! walk the first holder of a storage slot records the value, and every
//! later holder records a same-as reference to it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io;

use crate::engine::entity::Entity;
use crate::engine::error::{EcsResult, SerializationError};
use crate::engine::reader::{ComponentReader, ComponentTypeInfo, ComponentTypeReader};
use crate::engine::types::EntityId;
use crate::engine::world::World;

/// Fallback entity limit for streams that carry no explicit count.
pub(crate) const DEFAULT_MAX_ENTITY_COUNT: u32 = i32::MAX as u32;

/// Serialized form of one component value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// A single token, e.g. a number or a quoted string.
    Scalar(String),

    /// Named fields in declaration order; values may nest.
    Object(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Returns the scalar token, if this value is one.
    pub fn scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(token) => Some(token),
            FieldValue::Object(_) => None,
        }
    }

    /// Returns the named field of an object value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Object(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            FieldValue::Scalar(_) => None,
        }
    }

    /// Reads and converts the named field of an object value.
    ///
    /// ## Errors
    /// Fails when the field is absent or its value does not convert.
    pub fn expect_field<T: SerializableComponent>(
        &self,
        name: &str,
    ) -> Result<T, SerializationError> {
        match self.field(name) {
            Some(value) => T::from_value(value),
            None => Err(SerializationError::MalformedValue { line: 0, expected: "named field" }),
        }
    }
}

/// Conversion between a component and its [`FieldValue`] form.
///
/// Implementations enumerate their fields by name; the engine never inspects
/// type layout. Provided for the integer, float, `bool`, `char`, `String`,
/// and `()` primitives.
pub trait SerializableComponent: Sized {
    /// Converts the component into its serialized form.
    fn to_value(&self) -> FieldValue;

    /// Rebuilds a component from its serialized form.
    fn from_value(value: &FieldValue) -> Result<Self, SerializationError>;
}

macro_rules! scalar_component {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl SerializableComponent for $ty {
                fn to_value(&self) -> FieldValue {
                    FieldValue::Scalar(self.to_string())
                }

                fn from_value(value: &FieldValue) -> Result<Self, SerializationError> {
                    value
                        .scalar()
                        .and_then(|token| token.trim().parse().ok())
                        .ok_or(SerializationError::MalformedValue { line: 0, expected: $expected })
                }
            }
        )*
    };
}

scalar_component! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64",
    f32 => "f32", f64 => "f64",
    bool => "bool", char => "char",
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

fn unescape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl SerializableComponent for String {
    fn to_value(&self) -> FieldValue {
        FieldValue::Scalar(format!("\"{}\"", escape(self)))
    }

    fn from_value(value: &FieldValue) -> Result<Self, SerializationError> {
        let token = value
            .scalar()
            .ok_or(SerializationError::MalformedValue { line: 0, expected: "string" })?;
        let trimmed = token.trim();
        let inner = trimmed
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(trimmed);
        Ok(unescape(inner))
    }
}

impl SerializableComponent for () {
    fn to_value(&self) -> FieldValue {
        FieldValue::Object(Vec::new())
    }

    fn from_value(_value: &FieldValue) -> Result<Self, SerializationError> {
        Ok(())
    }
}

/// Streaming interface shared by the text and binary serializers.
pub trait Serializer {
    /// Writes the world to `writer`.
    ///
    /// ## Errors
    /// Fails when a pool's component type was not registered or when the
    /// underlying stream fails.
    fn serialize(&self, world: &World, writer: &mut dyn io::Write) -> Result<(), SerializationError>;

    /// Rebuilds a world from `reader`.
    ///
    /// Entity slots are renumbered; component membership and same-as
    /// sharing structure are preserved.
    fn deserialize(&self, reader: &mut dyn io::Read) -> Result<World, SerializationError>;
}

// ── type registry ────────────────────────────────────────────────────────

pub(crate) struct TypeRow {
    pub(crate) type_name: &'static str,
    pub(crate) set_max: fn(&mut World, u32) -> EcsResult<()>,
    pub(crate) apply_value: fn(&mut World, Entity, &FieldValue) -> Result<(), SerializationError>,
    pub(crate) apply_same_as: fn(&mut World, Entity, Entity) -> EcsResult<()>,
    pub(crate) value_of: fn(&dyn Any) -> Option<FieldValue>,
}

fn set_max_fn<T: 'static>(world: &mut World, count: u32) -> EcsResult<()> {
    world.set_max_component_count::<T>(count)
}

fn apply_value_fn<T: SerializableComponent + Clone + 'static>(
    world: &mut World,
    entity: Entity,
    value: &FieldValue,
) -> Result<(), SerializationError> {
    let component = T::from_value(value)?;
    world.set(entity, component)?;
    Ok(())
}

fn apply_same_as_fn<T: SerializableComponent + Clone + 'static>(
    world: &mut World,
    entity: Entity,
    reference: Entity,
) -> EcsResult<()> {
    world.set_same_as::<T>(entity, reference)
}

fn value_of_fn<T: SerializableComponent + Clone + 'static>(
    component: &dyn Any,
) -> Option<FieldValue> {
    component.downcast_ref::<T>().map(T::to_value)
}

/// Registered component types a serializer understands, keyed both by
/// runtime type and by fully qualified name.
pub(crate) struct ComponentTypeRegistry {
    rows: Vec<TypeRow>,
    by_type: HashMap<TypeId, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl ComponentTypeRegistry {
    pub(crate) fn new() -> Self {
        Self { rows: Vec::new(), by_type: HashMap::new(), by_name: HashMap::new() }
    }

    pub(crate) fn register<T: SerializableComponent + Clone + 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return;
        }
        let index = self.rows.len();
        let type_name = std::any::type_name::<T>();
        self.rows.push(TypeRow {
            type_name,
            set_max: set_max_fn::<T>,
            apply_value: apply_value_fn::<T>,
            apply_same_as: apply_same_as_fn::<T>,
            value_of: value_of_fn::<T>,
        });
        self.by_type.insert(type_id, index);
        self.by_name.insert(type_name, index);
    }

    pub(crate) fn row(&self, index: usize) -> &TypeRow {
        &self.rows[index]
    }

    pub(crate) fn index_of_type(&self, type_id: TypeId) -> Option<usize> {
        self.by_type.get(&type_id).copied()
    }

    pub(crate) fn index_of_name(&self, type_name: &str) -> Option<usize> {
        self.by_name.get(type_name).copied()
    }
}

// ── world snapshot ───────────────────────────────────────────────────────

/// One component type appearing in a snapshot.
pub(crate) struct SnapshotType {
    pub(crate) row: usize,
    pub(crate) max_components: Option<u32>,
}

/// One component record of one entity.
pub(crate) enum ComponentRecord {
    /// First holder of a storage slot; carries the value.
    Value {
        type_index: usize,
        value: FieldValue,
    },

    /// Later holder of a shared slot; references the first holder's serial
    /// number.
    SameAs {
        type_index: usize,
        entity: u32,
    },
}

/// Flattened world contents in the order both serializers emit them.
///
/// Entity serial numbers are 1-based positions in `entities`.
pub(crate) struct WorldSnapshot {
    pub(crate) max_entity_count: u32,
    pub(crate) types: Vec<SnapshotType>,
    pub(crate) entities: Vec<Vec<ComponentRecord>>,
}

struct PoolSurvey {
    infos: Vec<ComponentTypeInfo>,
}

impl ComponentTypeReader for PoolSurvey {
    fn on_type(&mut self, info: &ComponentTypeInfo) {
        self.infos.push(*info);
    }
}

struct RecordReader<'a> {
    registry: &'a ComponentTypeRegistry,
    caps: &'a HashMap<TypeId, u32>,
    default_cap: u32,
    types: &'a mut Vec<SnapshotType>,
    type_index_of_row: &'a mut HashMap<usize, usize>,
    shared: &'a mut HashMap<(usize, EntityId), u32>,
    records: Vec<ComponentRecord>,
    serial: u32,
}

impl ComponentReader for RecordReader<'_> {
    fn on_read(&mut self, component: &dyn Any, owner: Entity) {
        // Every pool type was checked against the registry up front.
        let Some(row) = self.registry.index_of_type(component.type_id()) else {
            return;
        };
        let type_index = match self.type_index_of_row.get(&row) {
            Some(&index) => index,
            None => {
                let index = self.types.len();
                let cap = self.caps.get(&component.type_id()).copied();
                let max_components = cap.filter(|&cap| cap != self.default_cap);
                self.types.push(SnapshotType { row, max_components });
                self.type_index_of_row.insert(row, index);
                index
            }
        };

        match self.shared.get(&(row, owner.entity_id())) {
            Some(&first_serial) => {
                self.records.push(ComponentRecord::SameAs { type_index, entity: first_serial });
            }
            None => {
                self.shared.insert((row, owner.entity_id()), self.serial);
                if let Some(value) = (self.registry.row(row).value_of)(component) {
                    self.records.push(ComponentRecord::Value { type_index, value });
                }
            }
        }
    }
}

/// Walks a world into the flat form both serializers emit.
pub(crate) fn snapshot_world(
    world: &World,
    registry: &ComponentTypeRegistry,
) -> Result<WorldSnapshot, SerializationError> {
    let mut survey = PoolSurvey { infos: Vec::new() };
    world.read_all_component_types(&mut survey);

    let mut caps = HashMap::new();
    for info in &survey.infos {
        if registry.index_of_type(info.type_id).is_none() {
            return Err(SerializationError::UnknownType { type_name: info.type_name.to_string() });
        }
        caps.insert(info.type_id, info.max_components);
    }

    let mut types = Vec::new();
    let mut type_index_of_row = HashMap::new();
    let mut shared = HashMap::new();
    let mut entities = Vec::new();

    for (position, entity) in world.entities().into_iter().enumerate() {
        let mut reader = RecordReader {
            registry,
            caps: &caps,
            default_cap: world.max_entities(),
            types: &mut types,
            type_index_of_row: &mut type_index_of_row,
            shared: &mut shared,
            records: Vec::new(),
            serial: position as u32 + 1,
        };
        world.read_components(entity, &mut reader)?;
        entities.push(reader.records);
    }

    Ok(WorldSnapshot { max_entity_count: world.max_entities(), types, entities })
}
