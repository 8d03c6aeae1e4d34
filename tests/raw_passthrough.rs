use vom::{Decoder, Encoder, RawValue, Type, Value, Vdl, VdlType, Version};

#[derive(Debug, Clone, PartialEq, Vdl)]
#[vdl(name = "raw.Envelope")]
struct Envelope {
    topic: String,
    payload: RawValue,
}

fn sample() -> Value {
    let inner = Type::struct_of("raw.Inner", &[("Id", Type::UINT64), ("Note", Type::ANY)]).unwrap();
    let list = Type::list_of(Type::ANY).unwrap();
    let v = Value::struct_from(inner, &[("Id", Value::uint64(77)), ("Note", Value::any(Value::string("n")))]).unwrap();
    Value::list(list, vec![v, Value::type_object(Type::BOOL), Value::int16(-1)]).unwrap()
}

#[test]
fn test_reencode_on_another_stream() {
    let v = sample();
    for from in [Version::V80, Version::V81] {
        for to in [Version::V80, Version::V81] {
            let mut enc = Encoder::with_version(Vec::new(), from);
            enc.encode_value(&v).unwrap();
            let bytes = enc.into_inner();
            let raw = Decoder::new(bytes.as_slice()).decode_raw().unwrap();
            assert_eq!(raw.to_value().unwrap(), v);

            // Warm the second stream up with unrelated types so ids differ.
            let mut out = Encoder::with_version(Vec::new(), to);
            out.encode_value(&Value::zero(Type::struct_of("raw.Other", &[("A", Type::INT64)]).unwrap())).unwrap();
            out.encode_raw(&raw).unwrap();
            let bytes = out.into_inner();

            let mut dec = Decoder::new(bytes.as_slice());
            dec.ignore().unwrap();
            assert_eq!(dec.decode_value().unwrap(), v, "{from:?} -> {to:?}");
        }
    }
}

#[test]
fn test_raw_field_round_trip() {
    for version in [Version::V80, Version::V81] {
        let payload = RawValue::from_value(&sample()).unwrap();
        let env = Envelope { topic: "t".to_string(), payload };
        let bytes = vom::encode_with_version(&env, version).unwrap();
        let got: Envelope = vom::decode(bytes.as_slice()).unwrap();
        assert_eq!(got.topic, "t");
        assert_eq!(got.payload.ty(), sample().ty());
        assert_eq!(got.payload.version(), version);
        assert_eq!(got.payload.to_value().unwrap(), sample());
    }
}

#[test]
fn test_raw_field_keeps_sent_bytes() {
    let point = Type::struct_of("raw.Point", &[("X", Type::INT64), ("Y", Type::INT64)]).unwrap();
    // {topic: "t", payload: any(raw.Point{X: 0, Y: 3})}, with the zero X sent
    // explicitly, which no encoder would do.
    let inner = [0x00, 0x00, 0x01, 0x06, 0xe1];
    let mut data = vec![0x00, 0x01, b't', 0x01, 0x00];
    data.extend_from_slice(&inner);
    data.push(0xe1);
    let sent = RawValue::new(Envelope::vdl_type().unwrap(), vec![point], data.clone(), Version::V81);
    let mut enc = Encoder::new(Vec::new());
    enc.encode_raw(&sent).unwrap();
    let bytes = enc.into_inner();
    assert!(bytes.ends_with(&data));

    let got: Envelope = vom::decode(bytes.as_slice()).unwrap();
    assert_eq!(got.payload.ty(), point);
    assert_eq!(got.payload.ref_types(), &[point]);
    assert_eq!(got.payload.data(), &inner);
    let want = Value::struct_from(point, &[("Y", Value::int64(3))]).unwrap();
    assert_eq!(got.payload.to_value().unwrap(), want);
    // Decoding to a generic value reads the same bytes.
    let got: Value = vom::decode(bytes.as_slice()).unwrap();
    assert_eq!(got.field_by_name("payload"), Some(&Value::any(want)));
}

#[test]
fn test_raw_decodes_to_native() {
    let bytes = vom::encode(&vec![1i64, 2, 3]).unwrap();
    let raw = Decoder::new(bytes.as_slice()).decode_raw().unwrap();
    assert_eq!(raw.decode::<Vec<u8>>().unwrap(), [1, 2, 3]);
    assert!(raw.decode::<String>().is_err());
}

#[test]
fn test_nil_any_raw() {
    let raw = RawValue::from_value(&Value::nil_any()).unwrap();
    assert!(raw.is_nil_any());
    let mut enc = Encoder::new(Vec::new());
    enc.encode_raw(&raw).unwrap();
    let bytes = enc.into_inner();
    assert!(Decoder::new(bytes.as_slice()).decode_value().unwrap().is_nil());
}
