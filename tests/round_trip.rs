use std::collections::{BTreeMap, BTreeSet, HashMap};

use vom::{Decoder, Encoder, Kind, Type, Value, Vdl, VdlType, Version};

#[derive(Debug, Clone, PartialEq, Vdl)]
#[vdl(name = "roundtrip.Point")]
struct Point {
    x: i64,
    y: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Vdl)]
#[vdl(name = "roundtrip.Color")]
enum Color {
    Red,
    Green,
    #[vdl(name = "Blue")]
    Azure,
}

#[derive(Debug, Clone, PartialEq, Vdl)]
#[vdl(name = "roundtrip.Shape")]
enum Shape {
    Circle(f64),
    Label(String),
    Dot(Point),
}

#[derive(Debug, Clone, PartialEq, Vdl)]
#[vdl(name = "roundtrip.Everything")]
struct Everything {
    flag: bool,
    small: u8,
    count: u32,
    delta: i16,
    ratio: f32,
    name: String,
    data: Vec<u8>,
    tags: BTreeSet<String>,
    scores: BTreeMap<String, i64>,
    grid: [u16; 3],
    color: Color,
    shape: Shape,
    next: Option<Point>,
    anything: Value,
    kind: Type,
    #[vdl(skip)]
    scratch: Vec<String>,
}

fn everything() -> Everything {
    Everything {
        flag: true,
        small: 200,
        count: 70_000,
        delta: -3,
        ratio: 0.5,
        name: "everything".to_string(),
        data: vec![0, 1, 0xff],
        tags: ["a", "b"].iter().map(|s| s.to_string()).collect(),
        scores: [("x".to_string(), -1), ("y".to_string(), 1 << 40)].into_iter().collect(),
        grid: [1, 2, 3],
        color: Color::Azure,
        shape: Shape::Dot(Point { x: 4, y: "four".to_string() }),
        next: Some(Point { x: 5, y: String::new() }),
        anything: Value::string("inside an any"),
        kind: Type::list_of(Type::STRING).unwrap(),
        scratch: Vec::new(),
    }
}

fn round_trip<T: VdlType + PartialEq + std::fmt::Debug>(v: &T) {
    for version in [Version::V80, Version::V81] {
        let bytes = vom::encode_with_version(v, version).unwrap();
        assert_eq!(bytes[0], version.byte());
        let got: T = vom::decode(bytes.as_slice()).unwrap();
        assert_eq!(&got, v, "{version:?}");
    }
}

#[test]
fn test_scalars() {
    round_trip(&true);
    round_trip(&7u8);
    round_trip(&u16::MAX);
    round_trip(&u32::MAX);
    round_trip(&u64::MAX);
    round_trip(&i16::MIN);
    round_trip(&i32::MIN);
    round_trip(&i64::MIN);
    round_trip(&1.5f32);
    round_trip(&-0.25f64);
    round_trip(&"héllo".to_string());
    round_trip(&String::new());
}

#[test]
fn test_composites() {
    round_trip(&vec![1i64, -2, 3]);
    round_trip(&Vec::<String>::new());
    round_trip(&vec![9u8; 300]);
    round_trip(&[true, false]);
    round_trip(&HashMap::from([(1u32, "one".to_string()), (2, "two".to_string())]));
    round_trip(&BTreeSet::from([3i32, 1, 2]));
    round_trip(&vec![vec!["nested".to_string()], Vec::new()]);
}

#[test]
fn test_derived_types() {
    round_trip(&Point { x: -7, y: "p".to_string() });
    round_trip(&Color::Red);
    round_trip(&Color::Azure);
    round_trip(&Shape::Circle(2.5));
    round_trip(&Shape::Label(String::new()));
    round_trip(&Some(Point { x: 1, y: "o".to_string() }));
    round_trip(&None::<Point>);
    round_trip(&everything());
}

#[test]
fn test_derived_type_description() {
    let t = Everything::vdl_type().unwrap();
    assert_eq!(t.kind(), Kind::Struct);
    assert_eq!(t.name(), "roundtrip.Everything");
    // The skipped field is not part of the type.
    assert_eq!(t.num_fields(), 15);
    assert_eq!(t.field_index("scratch"), None);

    let color = Color::vdl_type().unwrap();
    assert_eq!(color.labels(), ["Red", "Green", "Blue"]);
    let shape = Shape::vdl_type().unwrap();
    assert_eq!(shape.kind(), Kind::Union);
    assert_eq!(shape.field(2).map(|f| f.ty), Some(Point::vdl_type().unwrap()));
}

#[test]
fn test_skipped_field_uses_default() {
    let mut v = everything();
    v.scratch = vec!["not sent".to_string()];
    let bytes = vom::encode(&v).unwrap();
    let got: Everything = vom::decode(bytes.as_slice()).unwrap();
    assert!(got.scratch.is_empty());
    assert_eq!(got.name, v.name);
}

#[test]
fn test_generic_values() {
    let list = Type::list_of(Type::ANY).unwrap();
    let values = [
        Value::complex128(1.0, -2.0),
        Value::type_object(Type::map_of(Type::STRING, Type::BOOL).unwrap()),
        Value::bytes(vec![1, 2, 3]),
        Value::list(list, vec![Value::int64(1), Value::nil_any(), Value::string("x")]).unwrap(),
        Value::zero(Everything::vdl_type().unwrap()),
        everything().to_value().unwrap(),
    ];
    for version in [Version::V80, Version::V81] {
        let mut enc = Encoder::with_version(Vec::new(), version);
        for v in &values {
            enc.encode_value(v).unwrap();
        }
        let bytes = enc.into_inner();
        let mut dec = Decoder::new(bytes.as_slice());
        for v in &values {
            assert_eq!(&dec.decode_value().unwrap(), v, "{version:?}");
        }
        assert!(dec.decode_value().unwrap_err().is_eof());
    }
}

#[test]
fn test_recursive_type_through_optional() {
    let mut b = vom::TypeBuilder::new();
    let node = b.struct_type();
    b.set_name(node, "roundtrip.Node");
    let next = b.optional_type();
    b.assign_elem(next, node);
    b.append_field(node, "Val", Type::INT64);
    b.append_field(node, "Next", next);
    b.build().unwrap();
    let node = b.built(node).unwrap();
    let next = b.built(next).unwrap();

    let tail = Value::struct_of(node, vec![Value::int64(2), Value::optional(next, None).unwrap()]).unwrap();
    let head = Value::struct_of(node, vec![Value::int64(1), Value::optional(next, Some(tail)).unwrap()]).unwrap();

    let mut enc = Encoder::new(Vec::new());
    enc.encode_value(&head).unwrap();
    let bytes = enc.into_inner();
    let got = Decoder::new(bytes.as_slice()).decode_value().unwrap();
    assert_eq!(got.ty(), node);
    assert_eq!(got, head);
}

#[test]
fn test_decode_converts_between_compatible_types() {
    let bytes = vom::encode(&vec![1u8, 2, 3]).unwrap();
    let got: Vec<u32> = vom::decode(bytes.as_slice()).unwrap();
    assert_eq!(got, [1, 2, 3]);

    let bytes = vom::encode(&"Green".to_string()).unwrap();
    assert_eq!(vom::decode::<Color>(bytes.as_slice()).unwrap(), Color::Green);

    let bytes = vom::encode(&-5i64).unwrap();
    assert_eq!(vom::decode::<f64>(bytes.as_slice()).unwrap(), -5.0);
    assert!(vom::decode::<u16>(bytes.as_slice()).is_err());
}
