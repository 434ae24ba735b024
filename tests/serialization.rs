use pulse_ecs::prelude::*;

#[derive(Clone, Copy, PartialEq, Debug)]
struct Point {
    x: i32,
    y: i32,
}

impl SerializableComponent for Point {
    fn to_value(&self) -> FieldValue {
        FieldValue::Object(vec![
            ("x".to_string(), self.x.to_value()),
            ("y".to_string(), self.y.to_value()),
        ])
    }

    fn from_value(value: &FieldValue) -> Result<Self, SerializationError> {
        Ok(Self { x: value.expect_field("x")?, y: value.expect_field("y")? })
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct Tag;

impl SerializableComponent for Tag {
    fn to_value(&self) -> FieldValue {
        FieldValue::Object(Vec::new())
    }

    fn from_value(_value: &FieldValue) -> Result<Self, SerializationError> {
        Ok(Tag)
    }
}

fn text_serializer() -> TextSerializer {
    TextSerializer::new()
        .with_component::<i32>()
        .with_component::<String>()
        .with_component::<Point>()
        .with_component::<Tag>()
}

fn binary_serializer() -> BinarySerializer {
    BinarySerializer::new()
        .with_component::<i32>()
        .with_component::<String>()
        .with_component::<Point>()
        .with_component::<Tag>()
}

fn sample_world() -> World {
    let mut world = World::new(16);
    let e1 = world.create_entity().unwrap();
    world.set(e1, 7i32).unwrap();
    world.set(e1, "hi".to_string()).unwrap();
    let e2 = world.create_entity().unwrap();
    world.set_same_as::<String>(e2, e1).unwrap();
    world
}

fn assert_sample_roundtrip(restored: &World) {
    let entities = restored.entities();
    assert_eq!(entities.len(), 2);
    let (e1, e2) = (entities[0], entities[1]);

    assert_eq!(*restored.get::<i32>(e1).unwrap(), 7);
    assert_eq!(*restored.get::<String>(e1).unwrap(), "hi");
    assert_eq!(*restored.get::<String>(e2).unwrap(), "hi");
    assert!(!restored.has::<i32>(e2));

    // The same-as structure survived: one shared slot, two holders.
    assert_eq!(restored.get_all::<String>().unwrap().len(), 1);
}

#[test]
fn text_roundtrip_preserves_values_and_sharing() {
    let world = sample_world();
    let serializer = text_serializer();
    let text = serializer.serialize_to_string(&world).unwrap();
    let restored = serializer.deserialize_from_str(&text).unwrap();
    assert_eq!(restored.max_entities(), 16);
    assert_sample_roundtrip(&restored);
}

#[test]
fn binary_roundtrip_preserves_values_and_sharing() {
    let world = sample_world();
    let serializer = binary_serializer();
    let bytes = serializer.serialize_to_vec(&world).unwrap();
    let restored = serializer.deserialize_from_slice(&bytes).unwrap();
    assert_eq!(restored.max_entities(), 16);
    assert_sample_roundtrip(&restored);
}

#[test]
fn compound_and_flag_components_roundtrip() {
    let mut world = World::new(8);
    let entity = world.create_entity().unwrap();
    world.set(entity, Point { x: -3, y: 9 }).unwrap();
    world.set(entity, Tag).unwrap();

    let serializer = text_serializer();
    let text = serializer.serialize_to_string(&world).unwrap();
    let restored = serializer.deserialize_from_str(&text).unwrap();

    let entities = restored.entities();
    assert_eq!(entities.len(), 1);
    assert_eq!(*restored.get::<Point>(entities[0]).unwrap(), Point { x: -3, y: 9 });
    assert!(restored.has::<Tag>(entities[0]));
}

#[test]
fn strings_with_spaces_and_escapes_roundtrip() {
    let mut world = World::new(8);
    let entity = world.create_entity().unwrap();
    world
        .set(entity, "hello world\twith\nnoise \\and \"quotes\"".to_string())
        .unwrap();

    let serializer = text_serializer();
    let text = serializer.serialize_to_string(&world).unwrap();
    let restored = serializer.deserialize_from_str(&text).unwrap();
    let entities = restored.entities();
    assert_eq!(
        *restored.get::<String>(entities[0]).unwrap(),
        "hello world\twith\nnoise \\and \"quotes\""
    );
}

#[test]
fn component_caps_roundtrip() {
    let mut world = World::new(32);
    world.set_max_component_count::<i32>(4).unwrap();
    let entity = world.create_entity().unwrap();
    world.set(entity, 1i32).unwrap();

    let serializer = text_serializer();
    let text = serializer.serialize_to_string(&world).unwrap();
    assert!(text.contains("MaxComponentCount"));

    let mut restored = serializer.deserialize_from_str(&text).unwrap();
    for _ in 0..3 {
        let extra = restored.create_entity().unwrap();
        restored.set(extra, 1i32).unwrap();
    }
    let overflow = restored.create_entity().unwrap();
    assert!(matches!(
        restored.set(overflow, 1i32),
        Err(EcsError::MaxComponents(_))
    ));
}

#[test]
fn unregistered_pool_types_fail_serialization() {
    let mut world = World::new(8);
    let entity = world.create_entity().unwrap();
    world.set(entity, 1.5f64).unwrap();

    let serializer = text_serializer();
    assert!(matches!(
        serializer.serialize_to_string(&world),
        Err(SerializationError::UnknownType { .. })
    ));
}

#[test]
fn component_before_entity_is_an_error() {
    let input = "MaxEntityCount 4\nComponentType C0 i32\nComponent C0 5\n";
    let serializer = text_serializer();
    assert!(matches!(
        serializer.deserialize_from_str(input),
        Err(SerializationError::ComponentBeforeEntity { .. })
    ));
}

#[test]
fn unknown_type_names_are_rejected() {
    let input = "ComponentType C0 not::a::Type\n";
    let serializer = text_serializer();
    assert!(matches!(
        serializer.deserialize_from_str(input),
        Err(SerializationError::UnknownType { .. })
    ));
}

#[test]
fn undeclared_short_names_are_rejected() {
    let input = "Entity 1\nComponent C9 5\n";
    let serializer = text_serializer();
    assert!(matches!(
        serializer.deserialize_from_str(input),
        Err(SerializationError::UnknownShortName { .. })
    ));
}

#[test]
fn same_as_must_reference_an_earlier_entity() {
    let input = "ComponentType C0 alloc::string::String\nEntity 1\nComponentSameAs C0 7\n";
    let serializer = text_serializer();
    assert!(matches!(
        serializer.deserialize_from_str(input),
        Err(SerializationError::UnknownEntity { entity: 7, .. })
    ));
}

#[test]
fn malformed_numbers_are_reported_with_their_line() {
    let input = "MaxEntityCount four\n";
    let serializer = text_serializer();
    assert!(matches!(
        serializer.deserialize_from_str(input),
        Err(SerializationError::MalformedValue { line: 1, .. })
    ));
}

#[test]
fn unknown_tokens_and_blank_lines_are_ignored() {
    let input = "\nNote this line is commentary\nMaxEntityCount 4\n\nEntity 1\n";
    let serializer = text_serializer();
    let restored = serializer.deserialize_from_str(input).unwrap();
    assert_eq!(restored.max_entities(), 4);
    assert_eq!(restored.entities().len(), 1);
}

#[test]
fn empty_stream_yields_an_empty_world() {
    let serializer = text_serializer();
    let restored = serializer.deserialize_from_str("").unwrap();
    assert!(restored.entities().is_empty());
}
