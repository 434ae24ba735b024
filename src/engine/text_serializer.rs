//! # Text Serializer
//!
//! Line-oriented, human-editable world serialization.
//!
//! ## Format
//! ```text
//! MaxEntityCount 42
//! ComponentType C0 my_game::Position
//! MaxComponentCount C0 5
//!
//! Entity 1
//! Component C0 {
//! 	x 7
//! 	y 8
//! }
//! Component C1 "hello"
//!
//! Entity 2
//! ComponentSameAs C1 1
//! ```
//!
//! Short names (`C0`, `C1`, ...) are generated on write and bound by the
//! `ComponentType` lines on read. Compound values are `{ ... }` blocks of
//! `field value` lines, one per line, nesting allowed. Blank lines are
//! ignored; lines starting with an unknown token are skipped. A component
//! record before any `Entity` line is an error.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};

use crate::engine::entity::Entity;
use crate::engine::error::SerializationError;
use crate::engine::serial::{
    snapshot_world, ComponentRecord, ComponentTypeRegistry, FieldValue, SerializableComponent,
    Serializer, DEFAULT_MAX_ENTITY_COUNT,
};
use crate::engine::world::World;

/// Serializer producing the line-oriented text format.
///
/// Component types are declared up front with
/// [`with_component`](Self::with_component); serializing a world whose
/// pools contain an undeclared type fails with
/// [`SerializationError::UnknownType`].
pub struct TextSerializer {
    registry: ComponentTypeRegistry,
}

impl Default for TextSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSerializer {
    /// Creates a serializer with no registered component types.
    pub fn new() -> Self {
        Self { registry: ComponentTypeRegistry::new() }
    }

    /// Registers component type `T` for reading and writing.
    pub fn with_component<T: SerializableComponent + Clone + 'static>(mut self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Serializes `world` into a string.
    pub fn serialize_to_string(&self, world: &World) -> Result<String, SerializationError> {
        let mut buffer = Vec::new();
        self.serialize(world, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|_| SerializationError::MalformedValue { line: 0, expected: "utf-8" })
    }

    /// Rebuilds a world from its text form.
    pub fn deserialize_from_str(&self, input: &str) -> Result<World, SerializationError> {
        self.deserialize(&mut input.as_bytes())
    }
}

fn write_value(out: &mut dyn Write, value: &FieldValue, indent: usize) -> io::Result<()> {
    match value {
        FieldValue::Scalar(token) => write!(out, "{token}"),
        FieldValue::Object(fields) if fields.is_empty() => write!(out, "{{}}"),
        FieldValue::Object(fields) => {
            writeln!(out, "{{")?;
            for (name, value) in fields {
                write!(out, "{}{} ", "\t".repeat(indent + 1), name)?;
                write_value(out, value, indent + 1)?;
                writeln!(out)?;
            }
            write!(out, "{}}}", "\t".repeat(indent))
        }
    }
}

impl Serializer for TextSerializer {
    fn serialize(&self, world: &World, writer: &mut dyn Write) -> Result<(), SerializationError> {
        let snapshot = snapshot_world(world, &self.registry)?;

        writeln!(writer, "MaxEntityCount {}", snapshot.max_entity_count)?;
        for (index, snapshot_type) in snapshot.types.iter().enumerate() {
            let row = self.registry.row(snapshot_type.row);
            writeln!(writer, "ComponentType C{} {}", index, row.type_name)?;
            if let Some(max) = snapshot_type.max_components {
                writeln!(writer, "MaxComponentCount C{} {}", index, max)?;
            }
        }

        for (position, records) in snapshot.entities.iter().enumerate() {
            writeln!(writer)?;
            writeln!(writer, "Entity {}", position + 1)?;
            for record in records {
                match record {
                    ComponentRecord::Value { type_index, value } => {
                        write!(writer, "Component C{} ", type_index)?;
                        write_value(writer, value, 0)?;
                        writeln!(writer)?;
                    }
                    ComponentRecord::SameAs { type_index, entity } => {
                        writeln!(writer, "ComponentSameAs C{} {}", type_index, entity)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<World, SerializationError> {
        let mut lines = Vec::new();
        for line in BufReader::new(reader).lines() {
            lines.push(line?);
        }
        Parser::new(&self.registry, lines).run()
    }
}

struct Parser<'a> {
    registry: &'a ComponentTypeRegistry,
    lines: Vec<String>,
    cursor: usize,
    max_entity_count: Option<u32>,
    pending_caps: Vec<(usize, u32)>,
    short_to_row: HashMap<String, usize>,
    world: Option<World>,
    entities: HashMap<u32, Entity>,
    current: Option<Entity>,
}

impl<'a> Parser<'a> {
    fn new(registry: &'a ComponentTypeRegistry, lines: Vec<String>) -> Self {
        Self {
            registry,
            lines,
            cursor: 0,
            max_entity_count: None,
            pending_caps: Vec::new(),
            short_to_row: HashMap::new(),
            world: None,
            entities: HashMap::new(),
            current: None,
        }
    }

    fn line_number(&self) -> usize {
        self.cursor
    }

    fn world_mut(&mut self) -> Result<&mut World, SerializationError> {
        if self.world.is_none() {
            let mut world =
                World::new(self.max_entity_count.unwrap_or(DEFAULT_MAX_ENTITY_COUNT));
            for (row, count) in self.pending_caps.drain(..) {
                (self.registry.row(row).set_max)(&mut world, count)?;
            }
            self.world = Some(world);
        }
        Ok(self.world.as_mut().expect("world initialized above"))
    }

    fn resolve_short(&self, short: &str, line: usize) -> Result<usize, SerializationError> {
        self.short_to_row
            .get(short)
            .copied()
            .ok_or_else(|| SerializationError::UnknownShortName { short_name: short.to_string(), line })
    }

    fn parse_number<T: std::str::FromStr>(
        token: &str,
        line: usize,
        expected: &'static str,
    ) -> Result<T, SerializationError> {
        token
            .trim()
            .parse()
            .map_err(|_| SerializationError::MalformedValue { line, expected })
    }

    /// Reads the `{ ... }` block whose opening brace was just consumed.
    fn parse_object(&mut self) -> Result<FieldValue, SerializationError> {
        let mut fields = Vec::new();
        loop {
            let Some(raw) = self.lines.get(self.cursor).cloned() else {
                return Err(SerializationError::UnexpectedEnd);
            };
            self.cursor += 1;
            let line = self.cursor;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "}" {
                return Ok(FieldValue::Object(fields));
            }

            let (name, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((name, rest)) => (name, rest.trim()),
                None => {
                    return Err(SerializationError::MalformedValue { line, expected: "field value" })
                }
            };
            let value = self.parse_value(rest, line)?;
            fields.push((name.to_string(), value));
        }
    }

    fn parse_value(&mut self, rest: &str, line: usize) -> Result<FieldValue, SerializationError> {
        match rest {
            "" => Err(SerializationError::MalformedValue { line, expected: "value" }),
            "{}" => Ok(FieldValue::Object(Vec::new())),
            "{" => self.parse_object(),
            scalar => Ok(FieldValue::Scalar(scalar.to_string())),
        }
    }

    fn run(mut self) -> Result<World, SerializationError> {
        while self.cursor < self.lines.len() {
            let raw = self.lines[self.cursor].clone();
            self.cursor += 1;
            let line = self.line_number();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let (token, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((token, rest)) => (token, rest.trim()),
                None => (trimmed, ""),
            };

            match token {
                "MaxEntityCount" => {
                    let count: u32 = Self::parse_number(rest, line, "entity count")?;
                    if self.world.is_some() {
                        log::debug!("line {}: MaxEntityCount after first entity ignored", line);
                    } else {
                        self.max_entity_count = Some(count);
                    }
                }
                "ComponentType" => {
                    let (short, type_name) = rest
                        .split_once(char::is_whitespace)
                        .map(|(short, name)| (short, name.trim()))
                        .ok_or(SerializationError::MalformedValue { line, expected: "short and type name" })?;
                    let row = self
                        .registry
                        .index_of_name(type_name)
                        .ok_or_else(|| SerializationError::UnknownType { type_name: type_name.to_string() })?;
                    self.short_to_row.insert(short.to_string(), row);
                }
                "MaxComponentCount" => {
                    let (short, count) = rest
                        .split_once(char::is_whitespace)
                        .ok_or(SerializationError::MalformedValue { line, expected: "short and count" })?;
                    let row = self.resolve_short(short, line)?;
                    let count: u32 = Self::parse_number(count, line, "component count")?;
                    match self.world.as_mut() {
                        Some(world) => (self.registry.row(row).set_max)(world, count)?,
                        None => self.pending_caps.push((row, count)),
                    }
                }
                "Entity" => {
                    let serial: u32 = Self::parse_number(rest, line, "entity number")?;
                    let entity = self.world_mut()?.create_entity()?;
                    self.entities.insert(serial, entity);
                    self.current = Some(entity);
                }
                "Component" => {
                    let entity = self
                        .current
                        .ok_or(SerializationError::ComponentBeforeEntity { line })?;
                    let (short, rest) = match rest.split_once(char::is_whitespace) {
                        Some((short, rest)) => (short, rest.trim()),
                        None => (rest, ""),
                    };
                    let row = self.resolve_short(short, line)?;
                    let value = self.parse_value(rest, line)?;
                    let apply_value = self.registry.row(row).apply_value;
                    let world = self.world_mut()?;
                    apply_value(world, entity, &value).map_err(
                        |error| match error {
                            SerializationError::MalformedValue { line: 0, expected } => {
                                SerializationError::MalformedValue { line, expected }
                            }
                            other => other,
                        },
                    )?;
                }
                "ComponentSameAs" => {
                    let entity = self
                        .current
                        .ok_or(SerializationError::ComponentBeforeEntity { line })?;
                    let (short, target) = rest
                        .split_once(char::is_whitespace)
                        .ok_or(SerializationError::MalformedValue { line, expected: "short and entity number" })?;
                    let row = self.resolve_short(short, line)?;
                    let serial: u32 = Self::parse_number(target, line, "entity number")?;
                    let reference = *self
                        .entities
                        .get(&serial)
                        .ok_or(SerializationError::UnknownEntity { entity: serial, line })?;
                    let apply_same_as = self.registry.row(row).apply_same_as;
                    let world = self.world_mut()?;
                    apply_same_as(world, entity, reference)?;
                }
                unknown => {
                    log::debug!("line {}: unknown token {:?} skipped", line, unknown);
                }
            }
        }

        // A stream with no entity lines still yields an empty world.
        self.world_mut()?;
        Ok(self.world.take().expect("world initialized above"))
    }
}
