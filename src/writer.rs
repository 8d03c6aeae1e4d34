use std::collections::HashMap;

use crate::encode::WireWriter;
use crate::object::{WIRE_CTRL_END, WIRE_CTRL_NIL};
use crate::target::Target;
use crate::vtype::{Kind, Type};
use crate::{Error, Result};

/// Turns the types referenced from inside a payload (by any values and type
/// objects) into the integers written on the wire.
pub trait TypeRefs {
    fn type_ref(&mut self, t: Type) -> Result<u64>;
}

/// Collects referenced types into a per-message list; references are
/// indices into that list.
#[derive(Debug, Default)]
pub struct RefList {
    types: Vec<Type>,
    index: HashMap<Type, u64>,
}

impl RefList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn into_types(self) -> Vec<Type> {
        self.types
    }
}

impl TypeRefs for RefList {
    fn type_ref(&mut self, t: Type) -> Result<u64> {
        if let Some(i) = self.index.get(&t) {
            return Ok(*i);
        }
        let i = self.types.len() as u64;
        self.types.push(t);
        self.index.insert(t, i);
        Ok(i)
    }
}

/// For payloads that can hold no type references, such as type messages.
pub(crate) struct NoRefs;

impl TypeRefs for NoRefs {
    fn type_ref(&mut self, t: Type) -> Result<u64> {
        Err(Error::invalid(format!("unexpected reference to {t}")))
    }
}

#[derive(Debug)]
enum Frame {
    List(Type),
    Set(Type),
    Map { tt: Type, at_key: bool },
    Struct { tt: Type, current: Option<Type> },
    Union { tt: Type, current: Option<Type> },
}

/// A [`Target`] that writes the payload of a value message of type `root`.
pub struct ValueWriter<'a> {
    out: WireWriter<Vec<u8>>,
    refs: &'a mut dyn TypeRefs,
    root: Type,
    stack: Vec<Frame>,
}

impl<'a> ValueWriter<'a> {
    pub fn new(root: Type, refs: &'a mut dyn TypeRefs) -> Self {
        Self { out: WireWriter::new(Vec::new()), refs, root, stack: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_inner()
    }

    /// The type of the slot the next value is written into.
    fn slot(&self) -> Result<Type> {
        let slot = match self.stack.last() {
            None => Some(self.root),
            Some(Frame::List(tt)) => Some(tt.elem()),
            Some(Frame::Set(tt)) => Some(tt.key()),
            Some(Frame::Map { tt, at_key: true }) => Some(tt.key()),
            Some(Frame::Map { tt, .. }) => Some(tt.elem()),
            Some(Frame::Struct { current, .. } | Frame::Union { current, .. }) => *current,
        };
        slot.ok_or_else(|| Error::invalid("value outside of a field"))
    }

    /// Checks that a value of type `tt` fits the current slot, writing the
    /// type reference that prefixes a non-nil any.
    fn begin(&mut self, tt: Type) -> Result<()> {
        let slot = self.slot()?;
        if slot.kind() == Kind::Any {
            if tt != Type::ANY {
                let r = self.refs.type_ref(tt)?;
                self.out.write_uint(r)?;
            }
            return Ok(());
        }
        if slot != tt {
            return Err(Error::mismatch(tt, slot));
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Frame> {
        self.stack.pop().ok_or_else(|| Error::invalid("unbalanced finish"))
    }
}

impl Target for ValueWriter<'_> {
    fn from_nil(&mut self, tt: Type) -> Result<()> {
        let slot = self.slot()?;
        match slot.kind() {
            Kind::Any if tt.kind() == Kind::Optional => {
                let r = self.refs.type_ref(tt)?;
                self.out.write_uint(r)?;
            }
            Kind::Any | Kind::Optional => {}
            _ => return Err(Error::mismatch(format!("nil {tt}"), slot)),
        }
        self.out.write_control(WIRE_CTRL_NIL)
    }

    fn from_bool(&mut self, v: bool, tt: Type) -> Result<()> {
        self.begin(tt)?;
        self.out.write_bool(v)
    }

    fn from_uint(&mut self, v: u64, tt: Type) -> Result<()> {
        self.begin(tt)?;
        if tt.kind() == Kind::Byte {
            return self.out.write_u8(v as u8);
        }
        self.out.write_uint(v)
    }

    fn from_int(&mut self, v: i64, tt: Type) -> Result<()> {
        self.begin(tt)?;
        self.out.write_int(v)
    }

    fn from_float(&mut self, v: f64, tt: Type) -> Result<()> {
        self.begin(tt)?;
        self.out.write_float(v)
    }

    fn from_complex(&mut self, re: f64, im: f64, tt: Type) -> Result<()> {
        self.begin(tt)?;
        self.out.write_float(re)?;
        self.out.write_float(im)
    }

    fn from_bytes(&mut self, v: &[u8], tt: Type) -> Result<()> {
        self.begin(tt)?;
        if tt.kind() == Kind::Array {
            if v.len() != tt.len() {
                return Err(Error::invalid(format!("{tt} needs {} bytes, got {}", tt.len(), v.len())));
            }
            return self.out.write_all(v);
        }
        self.out.write_bytes(v)
    }

    fn from_string(&mut self, v: &str, tt: Type) -> Result<()> {
        self.begin(tt)?;
        self.out.write_string(v)
    }

    fn from_enum_label(&mut self, label: &str, tt: Type) -> Result<()> {
        self.begin(tt)?;
        let index = tt
            .label_index(label)
            .ok_or_else(|| Error::invalid(format!("{label:?} is not a label of {tt}")))?;
        self.out.write_uint(index as u64)
    }

    fn from_type_object(&mut self, v: Type) -> Result<()> {
        self.begin(Type::TYPE_OBJECT)?;
        let r = self.refs.type_ref(v)?;
        self.out.write_uint(r)
    }

    fn start_list(&mut self, tt: Type, len: usize) -> Result<()> {
        self.begin(tt)?;
        if tt.kind() == Kind::Array {
            if len != tt.len() {
                return Err(Error::invalid(format!("{tt} needs {} elems, got {len}", tt.len())));
            }
        } else {
            self.out.write_uint(len as u64)?;
        }
        self.stack.push(Frame::List(tt));
        Ok(())
    }

    fn start_elem(&mut self, _index: usize) -> Result<()> {
        Ok(())
    }

    fn finish_elem(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish_list(&mut self) -> Result<()> {
        self.pop().map(drop)
    }

    fn start_set(&mut self, tt: Type, len: usize) -> Result<()> {
        self.begin(tt)?;
        self.out.write_uint(len as u64)?;
        self.stack.push(Frame::Set(tt));
        Ok(())
    }

    fn start_key(&mut self) -> Result<()> {
        if let Some(Frame::Map { at_key, .. }) = self.stack.last_mut() {
            *at_key = true;
        }
        Ok(())
    }

    fn finish_key(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn finish_set(&mut self) -> Result<()> {
        self.pop().map(drop)
    }

    fn start_map(&mut self, tt: Type, len: usize) -> Result<()> {
        self.begin(tt)?;
        self.out.write_uint(len as u64)?;
        self.stack.push(Frame::Map { tt, at_key: true });
        Ok(())
    }

    fn finish_key_start_field(&mut self) -> Result<bool> {
        if let Some(Frame::Map { at_key, .. }) = self.stack.last_mut() {
            *at_key = false;
        }
        Ok(true)
    }

    fn finish_map(&mut self) -> Result<()> {
        self.pop().map(drop)
    }

    fn start_fields(&mut self, tt: Type) -> Result<()> {
        self.begin(tt)?;
        let shape = if tt.kind() == Kind::Optional { tt.elem() } else { tt };
        match shape.kind() {
            Kind::Struct => self.stack.push(Frame::Struct { tt: shape, current: None }),
            Kind::Union => self.stack.push(Frame::Union { tt: shape, current: None }),
            _ => return Err(Error::invalid(format!("{tt} has no fields"))),
        }
        Ok(())
    }

    fn start_field(&mut self, name: &str) -> Result<bool> {
        let Some(Frame::Struct { tt, current } | Frame::Union { tt, current }) = self.stack.last_mut() else {
            return Err(Error::invalid("field outside of a struct"));
        };
        let index = tt
            .field_index(name)
            .ok_or_else(|| Error::invalid(format!("{tt} has no field {name:?}")))?;
        *current = Some(tt.fields()[index].ty);
        self.out.write_uint(index as u64)?;
        Ok(true)
    }

    fn finish_field(&mut self) -> Result<()> {
        if let Some(Frame::Struct { current, .. } | Frame::Union { current, .. }) = self.stack.last_mut() {
            *current = None;
        }
        Ok(())
    }

    fn finish_fields(&mut self) -> Result<()> {
        match self.pop()? {
            Frame::Struct { .. } => self.out.write_control(WIRE_CTRL_END),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn write(v: &Value) -> Result<(Vec<u8>, Vec<Type>)> {
        let mut refs = RefList::new();
        let mut w = ValueWriter::new(v.ty(), &mut refs);
        v.drive(&mut w)?;
        let bytes = w.into_bytes();
        Ok((bytes, refs.into_types()))
    }

    #[test]
    fn test_struct_payload_skips_zero_fields() {
        let t = Type::struct_of("writer.S", &[("A", Type::INT64), ("B", Type::STRING), ("C", Type::BOOL)]).unwrap();
        let v = Value::struct_from(t, &[("B", Value::string("hi")), ("C", Value::bool(true))]).unwrap();
        let (bytes, refs) = write(&v).unwrap();
        assert_eq!(bytes, vec![1, 2, b'h', b'i', 2, 1, WIRE_CTRL_END]);
        assert!(refs.is_empty());
    }

    #[test]
    fn test_any_elems_carry_type_refs() {
        let t = Type::list_of(Type::ANY).unwrap();
        let v = Value::list(t, vec![Value::int64(-1), Value::string("x"), Value::nil_any(), Value::int64(2)]).unwrap();
        let (bytes, refs) = write(&v).unwrap();
        assert_eq!(bytes, vec![4, 0, 1, 1, 1, b'x', WIRE_CTRL_NIL, 0, 4]);
        assert_eq!(refs, vec![Type::INT64, Type::STRING]);
    }

    #[test]
    fn test_bytes_and_arrays() {
        let (bytes, _) = write(&Value::bytes(vec![7, 8])).unwrap();
        assert_eq!(bytes, vec![2, 7, 8]);
        let arr = Type::array_of(2, Type::BYTE).unwrap();
        let v = Value::list(arr, vec![Value::byte(7), Value::byte(8)]).unwrap();
        assert_eq!(write(&v).unwrap().0, vec![7, 8]);
        let arr = Type::array_of(2, Type::INT64).unwrap();
        let v = Value::list(arr, vec![Value::int64(1), Value::int64(2)]).unwrap();
        assert_eq!(write(&v).unwrap().0, vec![2, 4]);
    }

    #[test]
    fn test_optional_and_union() {
        let s = Type::struct_of("writer.P", &[("X", Type::INT64)]).unwrap();
        let o = Type::optional_of(s).unwrap();
        let nil = Value::optional(o, None).unwrap();
        assert_eq!(write(&nil).unwrap().0, vec![WIRE_CTRL_NIL]);
        let some = Value::optional(o, Some(Value::struct_from(s, &[("X", Value::int64(3))]).unwrap())).unwrap();
        assert_eq!(write(&some).unwrap().0, vec![0, 6, WIRE_CTRL_END]);
        let u = Type::union_of("writer.U", &[("A", Type::BOOL), ("B", Type::STRING)]).unwrap();
        let v = Value::union_of(u, 1, Value::string("")).unwrap();
        assert_eq!(write(&v).unwrap().0, vec![1, 0]);
    }

    #[test]
    fn test_slot_mismatch_is_rejected() {
        let mut refs = RefList::new();
        let mut w = ValueWriter::new(Type::INT64, &mut refs);
        assert!(matches!(w.from_string("x", Type::STRING), Err(Error::TypeMismatch { .. })));
        let mut none = NoRefs;
        let mut w = ValueWriter::new(Type::TYPE_OBJECT, &mut none);
        assert!(w.from_type_object(Type::BOOL).is_err());
    }
}
