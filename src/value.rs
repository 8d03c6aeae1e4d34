use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::convert::{int_range, uint_max};
use crate::raw::RawValue;
use crate::target::{Target, ValueTarget};
use crate::vtype::{Kind, Type};
use crate::{Error, Result};

/// A generic value of any [`Type`].
///
/// Values are always well-typed: the constructors check the representation
/// against the type, and slots of type any or optional wrap their contents
/// explicitly. Lists and arrays of bytes are always held as [`Rep::Bytes`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Value {
    ty: Type,
    rep: Rep,
}

#[derive(Debug, Clone)]
pub enum Rep {
    Bool(bool),
    /// Byte and all unsigned kinds.
    Uint(u64),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    String(String),
    Bytes(Vec<u8>),
    /// Index into the enum's labels.
    Enum(usize),
    TypeObject(Type),
    /// Elements of a list or array.
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<Value, Value>),
    /// All fields of a struct, in declaration order.
    Fields(Vec<Value>),
    Union(usize, Box<Value>),
    Any(Option<Box<Value>>),
    Optional(Option<Box<Value>>),
    /// An any whose contents are still encoded.
    Raw(Box<RawValue>),
}

impl Rep {
    fn rank(&self) -> u8 {
        match self {
            Rep::Bool(_) => 0,
            Rep::Uint(_) => 1,
            Rep::Int(_) => 2,
            Rep::Float(_) => 3,
            Rep::Complex(..) => 4,
            Rep::String(_) => 5,
            Rep::Bytes(_) => 6,
            Rep::Enum(_) => 7,
            Rep::TypeObject(_) => 8,
            Rep::List(_) => 9,
            Rep::Set(_) => 10,
            Rep::Map(_) => 11,
            Rep::Fields(_) => 12,
            Rep::Union(..) => 13,
            Rep::Any(_) => 14,
            Rep::Optional(_) => 15,
            Rep::Raw(_) => 16,
        }
    }
}

impl PartialEq for Rep {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rep {}

impl PartialOrd for Rep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rep {
    fn cmp(&self, other: &Self) -> Ordering {
        // Floats compare by bit pattern so that every value, NaN included,
        // can be a set or map key.
        use Rep::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Uint(a), Uint(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.to_bits().cmp(&b.to_bits()),
            (Complex(ar, ai), Complex(br, bi)) => {
                (ar.to_bits(), ai.to_bits()).cmp(&(br.to_bits(), bi.to_bits()))
            }
            (String(a), String(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Enum(a), Enum(b)) => a.cmp(b),
            (TypeObject(a), TypeObject(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Set(a), Set(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            (Fields(a), Fields(b)) => a.cmp(b),
            (Union(ai, a), Union(bi, b)) => (ai, a).cmp(&(bi, b)),
            (Any(a), Any(b)) => a.cmp(b),
            (Optional(a), Optional(b)) => a.cmp(b),
            (Raw(a), Raw(b)) => (a.ty(), a.ref_types(), a.data()).cmp(&(b.ty(), b.ref_types(), b.data())),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Places `v` in a slot of type `slot`, wrapping it for any and optional
/// slots.
fn fit(slot: Type, v: Value) -> Result<Value> {
    if v.ty == slot {
        return Ok(v);
    }
    match slot.kind() {
        Kind::Any => Ok(Value::any(v)),
        Kind::Optional if v.ty == slot.elem() => Ok(Value::raw(slot, Rep::Optional(Some(Box::new(v))))),
        _ => Err(Error::mismatch(v.ty, slot)),
    }
}

impl Value {
    /// Builds a value without checking `rep` against `ty`.
    pub(crate) fn raw(ty: Type, rep: Rep) -> Value {
        Value { ty, rep }
    }

    /// Builds a value of type `ty`, checking that `rep` is a valid
    /// representation for it.
    pub fn new(ty: Type, rep: Rep) -> Result<Value> {
        let kind = ty.kind();
        let bad = |rep: &Rep| Error::invalid(format!("{ty} cannot hold {rep:?}"));
        let rep = match (kind, rep) {
            (Kind::Bool, rep @ Rep::Bool(_)) => rep,
            (Kind::Byte | Kind::Uint16 | Kind::Uint32 | Kind::Uint64, Rep::Uint(u)) => {
                if u > uint_max(kind) {
                    return Err(Error::invalid(format!("{u} overflows {ty}")));
                }
                Rep::Uint(u)
            }
            (Kind::Int16 | Kind::Int32 | Kind::Int64, Rep::Int(i)) => {
                let (min, max) = int_range(kind);
                if i < min || i > max {
                    return Err(Error::invalid(format!("{i} overflows {ty}")));
                }
                Rep::Int(i)
            }
            (Kind::Float32 | Kind::Float64, rep @ Rep::Float(_)) => rep,
            (Kind::Complex64 | Kind::Complex128, rep @ Rep::Complex(..)) => rep,
            (Kind::String, rep @ Rep::String(_)) => rep,
            (Kind::Enum, Rep::Enum(i)) => {
                if i >= ty.labels().len() {
                    return Err(Error::IndexOutOfRange { index: i as u64, len: ty.labels().len(), ty: ty.to_string() });
                }
                Rep::Enum(i)
            }
            (Kind::TypeObject, rep @ Rep::TypeObject(_)) => rep,
            (Kind::Array | Kind::List, Rep::Bytes(b)) if ty.is_bytes() => Rep::Bytes(b),
            (Kind::Array | Kind::List, Rep::List(elems)) if ty.is_bytes() => {
                let mut bytes = Vec::with_capacity(elems.len());
                for e in elems {
                    match (e.ty.kind(), e.rep) {
                        (Kind::Byte, Rep::Uint(u)) => bytes.push(u as u8),
                        (_, rep) => return Err(bad(&rep)),
                    }
                }
                Rep::Bytes(bytes)
            }
            (Kind::Array | Kind::List, Rep::List(elems)) => {
                let elem = ty.elem();
                Rep::List(elems.into_iter().map(|e| fit(elem, e)).collect::<Result<_>>()?)
            }
            (Kind::Set, Rep::Set(keys)) => {
                let key = ty.key();
                Rep::Set(keys.into_iter().map(|k| fit(key, k)).collect::<Result<_>>()?)
            }
            (Kind::Map, Rep::Map(entries)) => {
                let (key, elem) = (ty.key(), ty.elem());
                Rep::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| Ok((fit(key, k)?, fit(elem, v)?)))
                        .collect::<Result<_>>()?,
                )
            }
            (Kind::Struct, Rep::Fields(values)) => {
                if values.len() != ty.num_fields() {
                    return Err(Error::invalid(format!(
                        "{ty} has {} fields, got {}",
                        ty.num_fields(),
                        values.len()
                    )));
                }
                Rep::Fields(
                    values
                        .into_iter()
                        .zip(ty.fields())
                        .map(|(v, f)| fit(f.ty, v))
                        .collect::<Result<_>>()?,
                )
            }
            (Kind::Union, Rep::Union(i, v)) => {
                let field = ty.field(i).ok_or_else(|| Error::IndexOutOfRange {
                    index: i as u64,
                    len: ty.num_fields(),
                    ty: ty.to_string(),
                })?;
                Rep::Union(i, Box::new(fit(field.ty, *v)?))
            }
            (Kind::Any, Rep::Any(v)) => match v {
                Some(v) if v.ty == Type::ANY => v.rep,
                v => Rep::Any(v),
            },
            (Kind::Any, rep @ Rep::Raw(_)) => rep,
            (Kind::Optional, Rep::Optional(v)) => match v {
                Some(v) if v.ty != ty.elem() => return Err(Error::mismatch(v.ty, ty.elem())),
                v => Rep::Optional(v),
            },
            (_, rep) => return Err(bad(&rep)),
        };
        // Arrays have a fixed length.
        if kind == Kind::Array {
            let len = match &rep {
                Rep::Bytes(b) => b.len(),
                Rep::List(l) => l.len(),
                _ => ty.len(),
            };
            if len != ty.len() {
                return Err(Error::invalid(format!("{ty} needs {} elems, got {len}", ty.len())));
            }
        }
        Ok(Value { ty, rep })
    }

    /// The zero value of `ty`.
    pub fn zero(ty: Type) -> Value {
        let rep = match ty.kind() {
            Kind::Bool => Rep::Bool(false),
            Kind::Byte | Kind::Uint16 | Kind::Uint32 | Kind::Uint64 => Rep::Uint(0),
            Kind::Int16 | Kind::Int32 | Kind::Int64 => Rep::Int(0),
            Kind::Float32 | Kind::Float64 => Rep::Float(0.0),
            Kind::Complex64 | Kind::Complex128 => Rep::Complex(0.0, 0.0),
            Kind::String => Rep::String(String::new()),
            Kind::Enum => Rep::Enum(0),
            Kind::TypeObject => Rep::TypeObject(Type::ANY),
            Kind::Array if ty.is_bytes() => Rep::Bytes(vec![0; ty.len()]),
            Kind::Array => Rep::List((0..ty.len()).map(|_| Value::zero(ty.elem())).collect()),
            Kind::List if ty.is_bytes() => Rep::Bytes(Vec::new()),
            Kind::List => Rep::List(Vec::new()),
            Kind::Set => Rep::Set(BTreeSet::new()),
            Kind::Map => Rep::Map(BTreeMap::new()),
            Kind::Struct => Rep::Fields(ty.fields().iter().map(|f| Value::zero(f.ty)).collect()),
            Kind::Union => match ty.field(0) {
                Some(f) => Rep::Union(0, Box::new(Value::zero(f.ty))),
                None => Rep::Union(0, Box::new(Value::nil_any())),
            },
            Kind::Any => Rep::Any(None),
            Kind::Optional => Rep::Optional(None),
        };
        Value { ty, rep }
    }

    pub fn is_zero(&self) -> bool {
        let array = self.ty.kind() == Kind::Array;
        match &self.rep {
            Rep::Bool(b) => !b,
            Rep::Uint(u) => *u == 0,
            Rep::Int(i) => *i == 0,
            Rep::Float(f) => *f == 0.0,
            Rep::Complex(re, im) => *re == 0.0 && *im == 0.0,
            Rep::String(s) => s.is_empty(),
            Rep::Bytes(b) if array => b.iter().all(|b| *b == 0),
            Rep::Bytes(b) => b.is_empty(),
            Rep::Enum(i) => *i == 0,
            Rep::TypeObject(t) => *t == Type::ANY,
            Rep::List(l) if array => l.iter().all(Value::is_zero),
            Rep::List(l) => l.is_empty(),
            Rep::Set(s) => s.is_empty(),
            Rep::Map(m) => m.is_empty(),
            Rep::Fields(fs) => fs.iter().all(Value::is_zero),
            Rep::Union(i, v) => *i == 0 && v.is_zero(),
            Rep::Any(v) | Rep::Optional(v) => v.is_none(),
            Rep::Raw(r) => r.is_nil_any(),
        }
    }

    pub fn bool(v: bool) -> Value {
        Value::raw(Type::BOOL, Rep::Bool(v))
    }

    pub fn byte(v: u8) -> Value {
        Value::raw(Type::BYTE, Rep::Uint(v as u64))
    }

    pub fn uint16(v: u16) -> Value {
        Value::raw(Type::UINT16, Rep::Uint(v as u64))
    }

    pub fn uint32(v: u32) -> Value {
        Value::raw(Type::UINT32, Rep::Uint(v as u64))
    }

    pub fn uint64(v: u64) -> Value {
        Value::raw(Type::UINT64, Rep::Uint(v))
    }

    pub fn int16(v: i16) -> Value {
        Value::raw(Type::INT16, Rep::Int(v as i64))
    }

    pub fn int32(v: i32) -> Value {
        Value::raw(Type::INT32, Rep::Int(v as i64))
    }

    pub fn int64(v: i64) -> Value {
        Value::raw(Type::INT64, Rep::Int(v))
    }

    pub fn float32(v: f32) -> Value {
        Value::raw(Type::FLOAT32, Rep::Float(v as f64))
    }

    pub fn float64(v: f64) -> Value {
        Value::raw(Type::FLOAT64, Rep::Float(v))
    }

    pub fn complex128(re: f64, im: f64) -> Value {
        Value::raw(Type::COMPLEX128, Rep::Complex(re, im))
    }

    pub fn string(v: impl Into<String>) -> Value {
        Value::raw(Type::STRING, Rep::String(v.into()))
    }

    /// A `[]byte` value.
    pub fn bytes(v: impl Into<Vec<u8>>) -> Value {
        match Type::list_of(Type::BYTE) {
            Ok(ty) => Value::raw(ty, Rep::Bytes(v.into())),
            Err(_) => unreachable!("[]byte is always a valid type"),
        }
    }

    pub fn type_object(t: Type) -> Value {
        Value::raw(Type::TYPE_OBJECT, Rep::TypeObject(t))
    }

    pub fn nil_any() -> Value {
        Value::raw(Type::ANY, Rep::Any(None))
    }

    /// Wraps `v` in an any. Wrapping an any value returns it unchanged.
    pub fn any(v: Value) -> Value {
        if v.ty == Type::ANY {
            return v;
        }
        Value::raw(Type::ANY, Rep::Any(Some(Box::new(v))))
    }

    pub fn enum_index(ty: Type, index: usize) -> Result<Value> {
        Value::new(ty, Rep::Enum(index))
    }

    pub fn enum_label(ty: Type, label: &str) -> Result<Value> {
        match ty.label_index(label) {
            Some(i) if ty.kind() == Kind::Enum => Ok(Value::raw(ty, Rep::Enum(i))),
            _ => Err(Error::invalid(format!("{label:?} is not a label of {ty}"))),
        }
    }

    /// A list or array value.
    pub fn list(ty: Type, elems: Vec<Value>) -> Result<Value> {
        Value::new(ty, Rep::List(elems))
    }

    pub fn set(ty: Type, keys: impl IntoIterator<Item = Value>) -> Result<Value> {
        Value::new(ty, Rep::Set(keys.into_iter().collect()))
    }

    pub fn map(ty: Type, entries: impl IntoIterator<Item = (Value, Value)>) -> Result<Value> {
        Value::new(ty, Rep::Map(entries.into_iter().collect()))
    }

    /// A struct value; `fields` are given in declaration order.
    pub fn struct_of(ty: Type, fields: Vec<Value>) -> Result<Value> {
        Value::new(ty, Rep::Fields(fields))
    }

    /// A struct value from named fields; unnamed fields are zero.
    pub fn struct_from(ty: Type, fields: &[(&str, Value)]) -> Result<Value> {
        if ty.kind() != Kind::Struct {
            return Err(Error::invalid(format!("{ty} is not a struct")));
        }
        let mut values: Vec<Value> = ty.fields().iter().map(|f| Value::zero(f.ty)).collect();
        for (name, v) in fields {
            let i = ty
                .field_index(name)
                .ok_or_else(|| Error::invalid(format!("{ty} has no field {name:?}")))?;
            values[i] = v.clone();
        }
        Value::struct_of(ty, values)
    }

    pub fn union_of(ty: Type, index: usize, v: Value) -> Result<Value> {
        Value::new(ty, Rep::Union(index, Box::new(v)))
    }

    pub fn optional(ty: Type, v: Option<Value>) -> Result<Value> {
        Value::new(ty, Rep::Optional(v.map(Box::new)))
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn kind(&self) -> Kind {
        self.ty.kind()
    }

    pub fn rep(&self) -> &Rep {
        &self.rep
    }

    pub fn into_rep(self) -> Rep {
        self.rep
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.rep {
            Rep::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self.rep {
            Rep::Uint(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.rep {
            Rep::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.rep {
            Rep::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match self.rep {
            Rep::Complex(re, im) => Some((re, im)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.rep {
            Rep::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.rep {
            Rep::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_type_object(&self) -> Option<Type> {
        match self.rep {
            Rep::TypeObject(t) => Some(t),
            _ => None,
        }
    }

    /// The enum label of an enum value.
    pub fn label(&self) -> Option<&'static str> {
        match self.rep {
            Rep::Enum(i) => self.ty.labels().get(i).map(String::as_str),
            _ => None,
        }
    }

    pub fn label_index(&self) -> Option<usize> {
        match self.rep {
            Rep::Enum(i) => Some(i),
            _ => None,
        }
    }

    /// Elements of a list or array that is not a byte list.
    pub fn elems(&self) -> Option<&[Value]> {
        match &self.rep {
            Rep::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn set_keys(&self) -> Option<&BTreeSet<Value>> {
        match &self.rep {
            Rep::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn map_entries(&self) -> Option<&BTreeMap<Value, Value>> {
        match &self.rep {
            Rep::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Number of elements, keys, entries or fields; zero for scalars.
    pub fn len(&self) -> usize {
        match &self.rep {
            Rep::String(s) => s.len(),
            Rep::Bytes(b) => b.len(),
            Rep::List(l) => l.len(),
            Rep::Set(s) => s.len(),
            Rep::Map(m) => m.len(),
            Rep::Fields(f) => f.len(),
            _ => 0,
        }
    }

    pub fn struct_field(&self, index: usize) -> Result<&Value> {
        match &self.rep {
            Rep::Fields(fs) => fs.get(index).ok_or_else(|| Error::IndexOutOfRange {
                index: index as u64,
                len: fs.len(),
                ty: self.ty.to_string(),
            }),
            _ => Err(Error::invalid(format!("{} is not a struct", self.ty))),
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Value> {
        let i = self.ty.field_index(name)?;
        match &self.rep {
            Rep::Fields(fs) => fs.get(i),
            Rep::Union(j, v) if *j == i => Some(v),
            _ => None,
        }
    }

    /// The active field of a union value.
    pub fn union_field(&self) -> Option<(usize, &Value)> {
        match &self.rep {
            Rep::Union(i, v) => Some((*i, v)),
            _ => None,
        }
    }

    /// The contents of an any or optional value.
    pub fn elem(&self) -> Option<&Value> {
        match &self.rep {
            Rep::Any(v) | Rep::Optional(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        match &self.rep {
            Rep::Any(None) | Rep::Optional(None) => true,
            Rep::Raw(r) => r.is_nil_any(),
            _ => false,
        }
    }

    /// Strips any number of any wrappers.
    pub fn unwrap_any(&self) -> &Value {
        let mut v = self;
        while let Rep::Any(Some(inner)) = &v.rep {
            v = inner;
        }
        v
    }

    /// Reports whether some any inside the value still holds encoded bytes.
    pub fn contains_raw(&self) -> bool {
        match &self.rep {
            Rep::Raw(_) => true,
            Rep::List(vs) | Rep::Fields(vs) => vs.iter().any(Value::contains_raw),
            Rep::Set(keys) => keys.iter().any(Value::contains_raw),
            Rep::Map(entries) => entries.iter().any(|(k, v)| k.contains_raw() || v.contains_raw()),
            Rep::Union(_, v) => v.contains_raw(),
            Rep::Any(Some(v)) | Rep::Optional(Some(v)) => v.contains_raw(),
            _ => false,
        }
    }

    /// The value with every encoded any decoded.
    pub fn resolve_raw(&self) -> Result<Value> {
        if let Rep::Raw(raw) = &self.rep {
            return Ok(Value::any(raw.to_value()?));
        }
        if !self.contains_raw() {
            return Ok(self.clone());
        }
        let mut target = ValueTarget::new(self.ty);
        self.drive(&mut target)?;
        target.finish()
    }

    /// Compares two values ignoring any wrappers at the top level, which is
    /// where a nil any can be represented either as a nil `Value` of type any
    /// or as a value wrapped in an any.
    pub fn semantic_eq(&self, other: &Value) -> bool {
        self.unwrap_any() == other.unwrap_any()
    }

    /// Converts the value to type `to` following the conversion rules of the
    /// generic target.
    pub fn convert(&self, to: Type) -> Result<Value> {
        if self.ty == to {
            return Ok(self.clone());
        }
        let mut target = ValueTarget::new(to);
        self.drive(&mut target)?;
        target.finish()
    }

    /// Drives `target` with the contents of this value. Zero struct fields
    /// are not sent.
    pub fn drive(&self, target: &mut dyn Target) -> Result<()> {
        self.drive_as(target, self.ty)
    }

    fn drive_as(&self, t: &mut dyn Target, tt: Type) -> Result<()> {
        match &self.rep {
            Rep::Bool(b) => t.from_bool(*b, tt),
            Rep::Uint(u) => t.from_uint(*u, tt),
            Rep::Int(i) => t.from_int(*i, tt),
            Rep::Float(f) => t.from_float(*f, tt),
            Rep::Complex(re, im) => t.from_complex(*re, *im, tt),
            Rep::String(s) => t.from_string(s, tt),
            Rep::Bytes(b) => t.from_bytes(b, tt),
            Rep::Enum(i) => {
                let label = self.ty.labels().get(*i).map(String::as_str).unwrap_or_default();
                t.from_enum_label(label, tt)
            }
            Rep::TypeObject(x) => t.from_type_object(*x),
            Rep::List(elems) => {
                t.start_list(tt, elems.len())?;
                for (i, e) in elems.iter().enumerate() {
                    t.start_elem(i)?;
                    e.drive(t)?;
                    t.finish_elem()?;
                }
                t.finish_list()
            }
            Rep::Set(keys) => {
                t.start_set(tt, keys.len())?;
                for k in keys {
                    t.start_key()?;
                    k.drive(t)?;
                    t.finish_key()?;
                }
                t.finish_set()
            }
            Rep::Map(entries) => {
                t.start_map(tt, entries.len())?;
                for (k, v) in entries {
                    t.start_key()?;
                    k.drive(t)?;
                    if t.finish_key_start_field()? {
                        v.drive(t)?;
                        t.finish_field()?;
                    }
                }
                t.finish_map()
            }
            Rep::Fields(values) => {
                t.start_fields(tt)?;
                for (v, f) in values.iter().zip(self.ty.fields()) {
                    if v.is_zero() {
                        continue;
                    }
                    if t.start_field(&f.name)? {
                        v.drive(t)?;
                        t.finish_field()?;
                    }
                }
                t.finish_fields()
            }
            Rep::Union(i, v) => {
                t.start_fields(tt)?;
                let name = self.ty.field(*i).map(|f| f.name.as_str()).unwrap_or_default();
                if t.start_field(name)? {
                    v.drive(t)?;
                    t.finish_field()?;
                }
                t.finish_fields()
            }
            Rep::Any(None) => t.from_nil(Type::ANY),
            Rep::Any(Some(v)) => v.drive(t),
            Rep::Optional(None) => t.from_nil(tt),
            Rep::Optional(Some(v)) => v.drive_as(t, tt),
            Rep::Raw(r) => r.to_value()?.drive(t),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rep {
            Rep::Bool(b) => write!(f, "{b}"),
            Rep::Uint(u) => write!(f, "{u}"),
            Rep::Int(i) => write!(f, "{i}"),
            Rep::Float(x) => write!(f, "{x}"),
            Rep::Complex(re, im) => write!(f, "{re}+{im}i"),
            Rep::String(s) => write!(f, "{s:?}"),
            Rep::Bytes(b) => write!(f, "{b:?}"),
            Rep::Enum(_) => f.write_str(self.label().unwrap_or_default()),
            Rep::TypeObject(t) => write!(f, "typeobject({t})"),
            Rep::List(l) => {
                f.write_str("{")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            Rep::Set(s) => {
                f.write_str("{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            Rep::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Rep::Fields(values) => {
                f.write_str("{")?;
                for (i, (v, field)) in values.iter().zip(self.ty.fields()).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {v}", field.name)?;
                }
                f.write_str("}")
            }
            Rep::Union(i, v) => {
                let name = self.ty.field(*i).map(|f| f.name.as_str()).unwrap_or_default();
                write!(f, "{{{name}: {v}}}")
            }
            Rep::Any(None) | Rep::Optional(None) => f.write_str("nil"),
            Rep::Any(Some(v)) => write!(f, "{}({v})", v.ty),
            Rep::Optional(Some(v)) => write!(f, "{v}"),
            Rep::Raw(r) => match r.to_value() {
                Ok(v) => write!(f, "{}", Value::any(v)),
                Err(_) => write!(f, "{}(<{} encoded bytes>)", r.ty(), r.data().len()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int64(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::uint64(u)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::float64(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::bytes(b)
    }
}

impl From<Type> for Value {
    fn from(t: Type) -> Self {
        Value::type_object(t)
    }
}

impl TryFrom<Value> for String {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v.rep {
            Rep::String(s) => Ok(s),
            _ => Err(Error::mismatch(v.ty, Type::STRING)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        v.convert(Type::INT64)?.as_int().ok_or_else(|| Error::mismatch(v.ty, Type::INT64))
    }
}

impl TryFrom<Value> for u64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        v.convert(Type::UINT64)?.as_uint().ok_or_else(|| Error::mismatch(v.ty, Type::UINT64))
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        v.convert(Type::FLOAT64)?.as_float().ok_or_else(|| Error::mismatch(v.ty, Type::FLOAT64))
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v.rep {
            Rep::Bool(b) => Ok(b),
            _ => Err(Error::mismatch(v.ty, Type::BOOL)),
        }
    }
}
