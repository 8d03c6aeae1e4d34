use vom::{Decoder, Encoder, Type, Value, Vdl, Version};

#[derive(Debug, PartialEq, Vdl)]
#[vdl(name = "P")]
struct P {
    #[vdl(name = "X")]
    x: i64,
    #[vdl(name = "Y")]
    y: String,
}

fn encode_value(v: &Value, version: Version) -> String {
    let mut enc = Encoder::with_version(Vec::new(), version);
    enc.encode_value(v).unwrap();
    hex::encode(enc.into_inner())
}

fn check(v: &Value, version: Version, want: &str) {
    let want = want.replace(' ', "");
    assert_eq!(encode_value(v, version), want, "{v}");
    let bytes = hex::decode(&want).unwrap();
    let got = Decoder::new(bytes.as_slice()).decode_value().unwrap();
    assert_eq!(&got, v);
}

#[test]
fn test_scalars() {
    check(&Value::bool(true), Version::V81, "81 02 01");
    check(&Value::uint64(256), Version::V81, "81 0c fe0100");
    check(&Value::int64(-129), Version::V81, "81 12 fe0101");
    check(&Value::float64(2.0), Version::V81, "81 16 40");
    check(&Value::string("hi"), Version::V80, "80 06 02 6869");
    check(&Value::bytes(vec![1, 2, 3]), Version::V81, "81 4e 03 010203");
}

#[test]
fn test_struct_with_type_message() {
    // -41, 19 bytes of StructT{Name: "P", Fields: [{X, int64}, {Y, string}]},
    // then +41, 6 bytes of {X: 1, Y: "a"}.
    let stream = "51 13 06 000150 0102 000158 0109 e1 000159 0103 e1 e1 52 06 0002 010161 e1";
    let v = P { x: 1, y: "a".to_string() };
    for (version, prefix) in [(Version::V81, "81"), (Version::V80, "80")] {
        let bytes = vom::encode_with_version(&v, version).unwrap();
        assert_eq!(hex::encode(&bytes), format!("{prefix}{}", stream.replace(' ', "")));
        assert_eq!(vom::decode::<P>(bytes.as_slice()).unwrap(), v);
    }
}

#[test]
fn test_zero_fields_are_omitted() {
    let bytes = vom::encode(&P { x: 0, y: String::new() }).unwrap();
    assert_eq!(hex::encode(&bytes[bytes.len() - 3..]), "5201e1");
}

#[test]
fn test_any_refs_by_version() {
    let list = Type::list_of(Type::ANY).unwrap();
    let v = Value::list(list, vec![Value::int64(1)]).unwrap();
    // V81 lists int64 in the message header and refers to it by index.
    check(&v, Version::V81, "81 51 04 03010fe1 52 01 09 03 010002");
    // V80 names the type id inline.
    check(&v, Version::V80, "80 51 04 03010fe1 52 03 010902");
}

#[test]
fn test_encoding_is_deterministic() {
    let m = Type::map_of(Type::STRING, Type::UINT32).unwrap();
    let entries = ["z", "a", "m"].map(|k| (Value::string(k), Value::uint32(k.len() as u32)));
    let a = encode_value(&Value::map(m, entries.clone()).unwrap(), Version::V81);
    let b = encode_value(&Value::map(m, entries.into_iter().rev()).unwrap(), Version::V81);
    assert_eq!(a, b);

    // The length prefix covers exactly the payload.
    let bytes = hex::decode(&a).unwrap();
    let value_at = bytes.iter().rposition(|b| *b == 0x52).unwrap();
    assert_eq!(bytes[value_at + 1] as usize, bytes.len() - value_at - 2);
}
