use std::io;

use vom::{Config, Decoder, Error, TypeDecoder, TypeId, Value, WireList, WireType, WIRE_CTRL_END};

fn decode(bytes: &[u8]) -> vom::Result<Value> {
    Decoder::new(bytes).decode_value()
}

#[test]
fn test_truncated_varint() {
    // int64 whose two-byte body is cut short.
    let err = decode(&[0x81, 0x12, 0xfe, 0x01]).unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn test_truncated_message() {
    let bytes = vom::encode(&vec!["abc".to_string()]).unwrap();
    for n in 2..bytes.len() {
        let err = decode(&bytes[..n]).unwrap_err();
        assert!(!err.is_eof(), "prefix of {n} bytes decoded as a clean end");
    }
}

#[test]
fn test_unknown_type() {
    assert!(matches!(decode(&[0x81, 0x54, 1, WIRE_CTRL_END]), Err(Error::UnknownType(TypeId(42)))));
}

#[test]
fn test_reserved_ids() {
    assert!(matches!(decode(&[0x81, 0x3c]), Err(Error::MalformedType { id: TypeId(30), .. })));
    let types = TypeDecoder::new();
    let wire = WireType::List(WireList { name: String::new(), elem: vom::INT64_ID });
    assert!(matches!(types.add_wire_type(TypeId(30), wire.clone()), Err(Error::MalformedType { .. })));
    assert!(matches!(types.add_wire_type(vom::STRING_ID, wire), Err(Error::MalformedType { .. })));
}

#[test]
fn test_duplicate_type_definition() {
    let wire = WireType::List(WireList { name: String::new(), elem: vom::INT64_ID }).encode().unwrap();
    let mut bytes = vec![0x81];
    for _ in 0..2 {
        bytes.push(0x51);
        bytes.push(wire.len() as u8);
        bytes.extend_from_slice(&wire);
    }
    assert!(matches!(decode(&bytes), Err(Error::MalformedType { id: TypeId(41), .. })));
}

#[test]
fn test_enum_index_out_of_range() {
    let wire = WireType::Enum(vom::WireEnum { name: "malformed.E".to_string(), labels: vec!["A".to_string()] })
        .encode()
        .unwrap();
    let mut bytes = vec![0x81, 0x51, wire.len() as u8];
    bytes.extend_from_slice(&wire);
    bytes.extend_from_slice(&[0x52, 5]);
    assert!(matches!(decode(&bytes), Err(Error::IndexOutOfRange { index: 5, len: 1, .. })));
}

#[test]
fn test_invalid_type_description() {
    // A list whose elem is itself, with no named type on the cycle.
    let wire = WireType::List(WireList { name: String::new(), elem: TypeId(41) }).encode().unwrap();
    let mut bytes = vec![0x81, 0x51, wire.len() as u8];
    bytes.extend_from_slice(&wire);
    bytes.extend_from_slice(&[0x52, 0]);
    assert!(matches!(decode(&bytes), Err(Error::MalformedType { id: TypeId(41), .. })));
}

#[test]
fn test_garbage_type_payload() {
    let bytes = [0x81, 0x51, 3, 0x7f, 0x00, 0x00];
    assert!(matches!(decode(&bytes), Err(Error::MalformedType { .. })));
}

#[test]
fn test_length_limit() {
    let bytes = vom::encode(&vec![7u32; 64]).unwrap();
    let mut dec = Decoder::with_config(bytes.as_slice(), Config::default().with_max_message_len(16));
    assert!(matches!(dec.decode_value(), Err(Error::MessageTooLong { max: 16, .. })));
    let mut dec = Decoder::with_config(bytes.as_slice(), Config::default().with_max_message_len(1024));
    assert_eq!(dec.decode_value().unwrap().len(), 64);
}

fn uint_bytes(n: u64) -> Vec<u8> {
    if n < 0x80 {
        return vec![n as u8];
    }
    let be = n.to_be_bytes();
    let zeros = be.iter().take_while(|b| **b == 0).count();
    let mut out = vec![!((be.len() - zeros) as u8 - 1)];
    out.extend_from_slice(&be[zeros..]);
    out
}

/// A stream of `type malformed.T []malformed.T` and one value of it nested
/// `depth` lists deep.
fn nested_lists(depth: usize) -> Vec<u8> {
    let wire = WireType::List(WireList { name: "malformed.T".to_string(), elem: TypeId(41) }).encode().unwrap();
    let mut bytes = vec![0x81, 0x51, wire.len() as u8];
    bytes.extend_from_slice(&wire);
    bytes.push(0x52);
    bytes.extend_from_slice(&uint_bytes(depth as u64));
    bytes.extend(std::iter::repeat_n(1u8, depth - 1));
    bytes.push(0);
    bytes
}

#[test]
fn test_nesting_depth_limit() {
    let deep = nested_lists(1_000_000);
    assert!(matches!(decode(&deep), Err(Error::TooDeep(_))));
    assert!(matches!(Decoder::new(deep.as_slice()).decode_raw(), Err(Error::TooDeep(_))));

    let shallow = nested_lists(10);
    let mut dec = Decoder::with_config(shallow.as_slice(), Config::default().with_max_depth(9));
    assert!(matches!(dec.decode_value(), Err(Error::TooDeep(9))));
    let mut dec = Decoder::with_config(shallow.as_slice(), Config::default().with_max_depth(10));
    let mut v = dec.decode_value().unwrap();
    let mut levels = 1;
    while let Some(inner) = v.elems().and_then(|e| e.first()).cloned() {
        v = inner;
        levels += 1;
    }
    assert_eq!(levels, 10);
}

#[test]
fn test_version_mismatch_on_shared_types() {
    let types = std::sync::Arc::new(TypeDecoder::for_stream());
    let type_stream = [0x80u8];
    types.read_types(&type_stream[..]).unwrap();
    let mut dec = Decoder::with_type_decoder(&[0x81, 0x12, 2][..], types);
    assert!(matches!(dec.decode_value(), Err(Error::VersionMismatch { .. })));
}

#[test]
fn test_version_mismatch_found_once_type_stream_declares() {
    let types = std::sync::Arc::new(TypeDecoder::for_stream());
    // int64(1), then a []int64 of type 41 from the type stream.
    let values = [0x80, 0x12, 2, 0x52, 2, 1, 2];
    let mut dec = Decoder::with_type_decoder(&values[..], types.clone());
    assert_eq!(dec.decode_value().unwrap(), Value::int64(1));

    let wire = WireType::List(WireList { name: String::new(), elem: vom::INT64_ID }).encode().unwrap();
    let mut type_stream = vec![0x81, 0x51, wire.len() as u8];
    type_stream.extend_from_slice(&wire);
    types.read_types(type_stream.as_slice()).unwrap();
    assert!(matches!(
        dec.decode_value(),
        Err(Error::VersionMismatch { got: vom::Version::V80, want: vom::Version::V81 })
    ));
}
