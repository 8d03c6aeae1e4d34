use crate::config::Version;
use crate::decode::WireReader;
use crate::native::VdlType;
use crate::object::WIRE_CTRL_NIL;
use crate::reader::{TypeLookup, ValueReader};
use crate::target::ValueTarget;
use crate::value::{Rep, Value};
use crate::vtype::Type;
use crate::writer::{RefList, TypeRefs, ValueWriter};
use crate::{Error, Result};

/// Rewrites the payload of a value of type `ty`, resolving its type
/// references with `from` and writing them again through `to`.
pub(crate) fn transcode(
    ty: Type,
    data: &[u8],
    from: &dyn TypeLookup,
    to: &mut dyn TypeRefs,
    max_depth: usize,
) -> Result<Vec<u8>> {
    let mut r = WireReader::new(data);
    let mut w = ValueWriter::new(ty, to);
    ValueReader::new(&mut r, from).with_max_depth(max_depth).decode_value(ty, &mut w)?;
    if !r.at_eof()? {
        return Err(Error::LeftoverBytes(r.into_inner().len() + 1));
    }
    Ok(w.into_bytes())
}

/// A value captured in its encoded form.
///
/// `data` is a value payload whose type references index `ref_types`,
/// whatever the version of the stream it came from, so the capture can be
/// re-encoded onto any stream without the ids of the one it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    ty: Type,
    ref_types: Vec<Type>,
    data: Vec<u8>,
    version: Version,
}

impl RawValue {
    /// Assembles a capture. `data` must be a payload of type `ty` whose
    /// references index `ref_types`.
    pub fn new(ty: Type, ref_types: Vec<Type>, data: Vec<u8>, version: Version) -> Self {
        RawValue { ty, ref_types, data, version }
    }

    /// Captures `v`. A value wrapped in any is captured as its contents.
    pub fn from_value(v: &Value) -> Result<RawValue> {
        if let Rep::Raw(raw) = v.rep() {
            return Ok(raw.as_ref().clone());
        }
        let v = v.unwrap_any();
        let mut refs = RefList::new();
        let mut w = ValueWriter::new(v.ty(), &mut refs);
        v.drive(&mut w)?;
        let data = w.into_bytes();
        Ok(RawValue { ty: v.ty(), ref_types: refs.into_types(), data, version: Version::default() })
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn ref_types(&self) -> &[Type] {
        &self.ref_types
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The version of the stream the value was captured from.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Reports whether this captures a nil any.
    pub fn is_nil_any(&self) -> bool {
        self.ty == Type::ANY && self.data == [WIRE_CTRL_NIL]
    }

    fn decode_to(&self, want: Type) -> Result<Value> {
        let mut r = WireReader::new(self.data.as_slice());
        let mut target = ValueTarget::new(want);
        ValueReader::new(&mut r, &self.ref_types).decode_value(self.ty, &mut target)?;
        if !r.at_eof()? {
            return Err(Error::LeftoverBytes(r.into_inner().len() + 1));
        }
        target.finish()
    }

    /// Decodes the capture into a generic value of its own type.
    pub fn to_value(&self) -> Result<Value> {
        self.decode_to(self.ty)
    }

    pub fn decode<T: VdlType>(&self) -> Result<T> {
        let v = self.decode_to(T::vdl_type()?)?;
        T::from_value(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_of_nested_any() {
        let t = Type::struct_of("raw.Box", &[("Item", Type::ANY)]).unwrap();
        let v = Value::struct_from(t, &[("Item", Value::any(Value::uint32(7)))]).unwrap();
        let raw = RawValue::from_value(&v).unwrap();
        assert_eq!(raw.ty(), t);
        assert_eq!(raw.ref_types(), &[Type::UINT32]);
        assert_eq!(raw.data(), &[0, 0, 7, crate::object::WIRE_CTRL_END]);
        assert_eq!(raw.to_value().unwrap(), v);
    }

    #[test]
    fn test_nil_any() {
        let raw = RawValue::from_value(&Value::nil_any()).unwrap();
        assert!(raw.is_nil_any());
        assert!(raw.to_value().unwrap().semantic_eq(&Value::nil_any()));
        let raw = RawValue::from_value(&Value::any(Value::bool(false))).unwrap();
        assert!(!raw.is_nil_any());
        assert_eq!(raw.ty(), Type::BOOL);
    }

    #[test]
    fn test_decode_converts() {
        let raw = RawValue::from_value(&Value::int64(300)).unwrap();
        assert_eq!(raw.decode::<i32>().unwrap(), 300);
        assert!(raw.decode::<u8>().is_err());
        assert_eq!(raw.decode::<f64>().unwrap(), 300.0);
    }

    #[test]
    fn test_transcode_to_absolute_ids() {
        struct Ids;
        impl TypeRefs for Ids {
            fn type_ref(&mut self, t: Type) -> Result<u64> {
                Ok(if t == Type::STRING { 3 } else { 99 })
            }
        }
        let list = Type::list_of(Type::ANY).unwrap();
        let v = Value::list(list, vec![Value::string("a")]).unwrap();
        let raw = RawValue::from_value(&v).unwrap();
        assert_eq!(raw.data(), &[1, 0, 1, b'a']);
        let out = transcode(list, raw.data(), &raw.ref_types, &mut Ids, 8).unwrap();
        assert!(matches!(transcode(list, raw.data(), &raw.ref_types, &mut Ids, 1), Err(Error::TooDeep(1))));
        assert_eq!(out, vec![1, 3, 1, b'a']);
    }
}
