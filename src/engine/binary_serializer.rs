//! # Binary Serializer
//!
//! Length-prefixed, little-endian mirror of the text format: same logical
//! schema (entity limit, component types with optional caps, per-entity
//! value and same-as records), round-trip equivalent to the text form.
//!
//! ## Layout
//! ```text
//! u32  max_entity_count
//! u16  type_count
//!      per type: u16 name_len, name bytes, u8 has_cap, u32 cap
//! u32  entity_count
//!      per entity: u16 record_count
//!          per record: u8 kind (0 value, 1 same-as), u16 type_index,
//!                      then a value tree or a u32 entity serial
//! ```
//! Value trees are tagged: `0` scalar (u32 length + UTF-8 bytes), `1`
//! object (u16 field count, each field a u16-length name plus a nested
//! tree). Entity serial numbers are implicit: the n-th entity block is
//! serial n, 1-based.

use std::io::{self, Read, Write};

use crate::engine::entity::Entity;
use crate::engine::error::SerializationError;
use crate::engine::serial::{
    snapshot_world, ComponentRecord, ComponentTypeRegistry, FieldValue, SerializableComponent,
    Serializer,
};
use crate::engine::world::World;

const RECORD_VALUE: u8 = 0;
const RECORD_SAME_AS: u8 = 1;
const VALUE_SCALAR: u8 = 0;
const VALUE_OBJECT: u8 = 1;

/// Serializer producing the length-prefixed binary format.
///
/// Shares its registration model with the text serializer: component types
/// are declared with [`with_component`](Self::with_component) and matched by
/// fully qualified name on read.
pub struct BinarySerializer {
    registry: ComponentTypeRegistry,
}

impl Default for BinarySerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl BinarySerializer {
    /// Creates a serializer with no registered component types.
    pub fn new() -> Self {
        Self { registry: ComponentTypeRegistry::new() }
    }

    /// Registers component type `T` for reading and writing.
    pub fn with_component<T: SerializableComponent + Clone + 'static>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Serializes `world` into a byte vector.
    pub fn serialize_to_vec(&self, world: &World) -> Result<Vec<u8>, SerializationError> {
        let mut buffer = Vec::new();
        self.serialize(world, &mut buffer)?;
        Ok(buffer)
    }

    /// Rebuilds a world from its binary form.
    pub fn deserialize_from_slice(&self, mut input: &[u8]) -> Result<World, SerializationError> {
        self.deserialize(&mut input)
    }
}

fn write_u8(out: &mut dyn Write, value: u8) -> io::Result<()> {
    out.write_all(&[value])
}

fn write_u16(out: &mut dyn Write, value: u16) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn write_u32(out: &mut dyn Write, value: u32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn write_short_str(out: &mut dyn Write, text: &str) -> io::Result<()> {
    write_u16(out, text.len() as u16)?;
    out.write_all(text.as_bytes())
}

fn write_value(out: &mut dyn Write, value: &FieldValue) -> io::Result<()> {
    match value {
        FieldValue::Scalar(token) => {
            write_u8(out, VALUE_SCALAR)?;
            write_u32(out, token.len() as u32)?;
            out.write_all(token.as_bytes())
        }
        FieldValue::Object(fields) => {
            write_u8(out, VALUE_OBJECT)?;
            write_u16(out, fields.len() as u16)?;
            for (name, value) in fields {
                write_short_str(out, name)?;
                write_value(out, value)?;
            }
            Ok(())
        }
    }
}

struct ByteReader<'a> {
    input: &'a mut dyn Read,
}

impl ByteReader<'_> {
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<(), SerializationError> {
        self.input.read_exact(buffer).map_err(|error| {
            if error.kind() == io::ErrorKind::UnexpectedEof {
                SerializationError::UnexpectedEnd
            } else {
                SerializationError::Io(error)
            }
        })
    }

    fn read_u8(&mut self) -> Result<u8, SerializationError> {
        let mut buffer = [0u8; 1];
        self.read_exact(&mut buffer)?;
        Ok(buffer[0])
    }

    fn read_u16(&mut self) -> Result<u16, SerializationError> {
        let mut buffer = [0u8; 2];
        self.read_exact(&mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn read_u32(&mut self) -> Result<u32, SerializationError> {
        let mut buffer = [0u8; 4];
        self.read_exact(&mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    fn read_string(&mut self, length: usize) -> Result<String, SerializationError> {
        let mut buffer = vec![0u8; length];
        self.read_exact(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|_| SerializationError::MalformedValue { line: 0, expected: "utf-8" })
    }

    fn read_value(&mut self) -> Result<FieldValue, SerializationError> {
        match self.read_u8()? {
            VALUE_SCALAR => {
                let length = self.read_u32()? as usize;
                Ok(FieldValue::Scalar(self.read_string(length)?))
            }
            VALUE_OBJECT => {
                let count = self.read_u16()? as usize;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name_length = self.read_u16()? as usize;
                    let name = self.read_string(name_length)?;
                    let value = self.read_value()?;
                    fields.push((name, value));
                }
                Ok(FieldValue::Object(fields))
            }
            _ => Err(SerializationError::MalformedValue { line: 0, expected: "value tag" }),
        }
    }
}

impl Serializer for BinarySerializer {
    fn serialize(&self, world: &World, writer: &mut dyn Write) -> Result<(), SerializationError> {
        let snapshot = snapshot_world(world, &self.registry)?;

        write_u32(writer, snapshot.max_entity_count)?;
        write_u16(writer, snapshot.types.len() as u16)?;
        for snapshot_type in &snapshot.types {
            let row = self.registry.row(snapshot_type.row);
            write_short_str(writer, row.type_name)?;
            match snapshot_type.max_components {
                Some(cap) => {
                    write_u8(writer, 1)?;
                    write_u32(writer, cap)?;
                }
                None => {
                    write_u8(writer, 0)?;
                    write_u32(writer, 0)?;
                }
            }
        }

        write_u32(writer, snapshot.entities.len() as u32)?;
        for records in &snapshot.entities {
            write_u16(writer, records.len() as u16)?;
            for record in records {
                match record {
                    ComponentRecord::Value { type_index, value } => {
                        write_u8(writer, RECORD_VALUE)?;
                        write_u16(writer, *type_index as u16)?;
                        write_value(writer, value)?;
                    }
                    ComponentRecord::SameAs { type_index, entity } => {
                        write_u8(writer, RECORD_SAME_AS)?;
                        write_u16(writer, *type_index as u16)?;
                        write_u32(writer, *entity)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<World, SerializationError> {
        let mut bytes = ByteReader { input: reader };

        let max_entity_count = bytes.read_u32()?;
        let mut world = World::new(max_entity_count);

        let type_count = bytes.read_u16()? as usize;
        let mut rows = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let name_length = bytes.read_u16()? as usize;
            let type_name = bytes.read_string(name_length)?;
            let row = self
                .registry
                .index_of_name(&type_name)
                .ok_or(SerializationError::UnknownType { type_name })?;
            let has_cap = bytes.read_u8()? != 0;
            let cap = bytes.read_u32()?;
            if has_cap {
                (self.registry.row(row).set_max)(&mut world, cap)?;
            }
            rows.push(row);
        }

        let entity_count = bytes.read_u32()? as usize;
        let mut entities: Vec<Entity> = Vec::with_capacity(entity_count);
        for _ in 0..entity_count {
            entities.push(world.create_entity()?);
        }

        let resolve = |type_index: usize| -> Result<usize, SerializationError> {
            rows.get(type_index)
                .copied()
                .ok_or(SerializationError::MalformedValue { line: 0, expected: "type index" })
        };

        for entity_index in 0..entity_count {
            let entity = entities[entity_index];
            let record_count = bytes.read_u16()? as usize;
            for _ in 0..record_count {
                match bytes.read_u8()? {
                    RECORD_VALUE => {
                        let row = resolve(bytes.read_u16()? as usize)?;
                        let value = bytes.read_value()?;
                        (self.registry.row(row).apply_value)(&mut world, entity, &value)?;
                    }
                    RECORD_SAME_AS => {
                        let row = resolve(bytes.read_u16()? as usize)?;
                        let serial = bytes.read_u32()? as usize;
                        let reference = serial
                            .checked_sub(1)
                            .and_then(|index| entities.get(index))
                            .copied()
                            .ok_or(SerializationError::UnknownEntity {
                                entity: serial as u32,
                                line: 0,
                            })?;
                        (self.registry.row(row).apply_same_as)(&mut world, entity, reference)?;
                    }
                    _ => {
                        return Err(SerializationError::MalformedValue {
                            line: 0,
                            expected: "record kind",
                        })
                    }
                }
            }
        }

        Ok(world)
    }
}
