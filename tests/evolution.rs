use vom::{Decoder, Encoder, Type, Value, Vdl, VdlType};

mod v1 {
    use vom::Vdl;

    #[derive(Debug, Clone, PartialEq, Vdl)]
    #[vdl(name = "evolution.Record")]
    pub struct Record {
        #[vdl(name = "X")]
        pub x: i64,
        #[vdl(name = "Y")]
        pub y: String,
    }
}

mod v2 {
    use vom::Vdl;

    #[derive(Debug, Clone, PartialEq, Vdl)]
    #[vdl(name = "evolution.Record")]
    pub struct Record {
        #[vdl(name = "X")]
        pub x: i32,
        #[vdl(name = "Z")]
        pub z: bool,
    }
}

#[derive(Debug, PartialEq, Vdl)]
#[vdl(name = "evolution.Status")]
enum Status {
    Active,
    Retired,
}

#[test]
fn test_dropped_field_is_skipped() {
    let mut enc = Encoder::new(Vec::new());
    enc.encode(&v1::Record { x: 3, y: "gone".to_string() }).unwrap();
    enc.encode(&v1::Record { x: -4, y: String::new() }).unwrap();
    let bytes = enc.into_inner();

    let mut dec = Decoder::new(bytes.as_slice());
    assert_eq!(dec.decode::<v2::Record>().unwrap(), v2::Record { x: 3, z: false });
    assert_eq!(dec.decode::<v2::Record>().unwrap(), v2::Record { x: -4, z: false });
    assert!(dec.decode::<v2::Record>().unwrap_err().is_eof());
}

#[test]
fn test_added_field_is_zero() {
    let bytes = vom::encode(&v2::Record { x: 8, z: true }).unwrap();
    let got: v1::Record = vom::decode(bytes.as_slice()).unwrap();
    assert_eq!(got, v1::Record { x: 8, y: String::new() });
}

#[test]
fn test_out_of_range_field_fails() {
    let bytes = vom::encode(&v1::Record { x: i64::MAX, y: String::new() }).unwrap();
    assert!(vom::decode::<v2::Record>(bytes.as_slice()).is_err());
}

#[test]
fn test_generic_struct_into_narrower_struct() {
    let wide = Type::struct_of("evolution.Wide", &[("X", Type::INT64), ("Y", Type::STRING)]).unwrap();
    let narrow = Type::struct_of("evolution.Wide", &[("X", Type::INT64)]).unwrap();
    let v = Value::struct_from(wide, &[("X", Value::int64(1)), ("Y", Value::string("y"))]).unwrap();

    let mut enc = Encoder::new(Vec::new());
    enc.encode_value(&v).unwrap();
    enc.encode_value(&Value::string("after")).unwrap();
    let bytes = enc.into_inner();

    let mut dec = Decoder::new(bytes.as_slice());
    let got = dec.decode_value_as(narrow).unwrap();
    assert_eq!(got, Value::struct_of(narrow, vec![Value::int64(1)]).unwrap());
    assert_eq!(dec.decode::<String>().unwrap(), "after");
    assert!(dec.decode_value().unwrap_err().is_eof());
}

#[test]
fn test_enum_by_label() {
    let renamed = Type::enum_of("evolution.Status", &["Pending", "Retired", "Active"]).unwrap();
    let mut enc = Encoder::new(Vec::new());
    enc.encode_value(&Value::enum_label(renamed, "Retired").unwrap()).unwrap();
    enc.encode_value(&Value::enum_label(renamed, "Pending").unwrap()).unwrap();
    let bytes = enc.into_inner();

    let mut dec = Decoder::new(bytes.as_slice());
    assert_eq!(dec.decode::<Status>().unwrap(), Status::Retired);
    assert!(dec.decode::<Status>().is_err());
}

#[test]
fn test_any_holds_any_shape() {
    let record = VdlType::to_value(&v1::Record { x: 1, y: "a".to_string() }).unwrap();
    let bytes = vom::encode(&record).unwrap();
    let got: Value = vom::decode(bytes.as_slice()).unwrap();
    assert_eq!(got.ty(), record.ty());
    assert_eq!(got.field_by_name("Y"), Some(&Value::string("a")));
}
