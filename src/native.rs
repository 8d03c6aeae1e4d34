//! Describing Rust types to the codec.
//!
//! A type implementing [`VdlType`] states its VDL type and converts to and
//! from the generic [`Value`] form the codec works on. Implementations for
//! user structs and enums come from `#[derive(Vdl)]`.
//!
//! Derived types may not refer to themselves: a recursive type has to be
//! assembled with a [`TypeBuilder`](crate::TypeBuilder) and handled as a
//! [`Value`].

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::object::SCHEMA;
use crate::raw::RawValue;
use crate::types::WireType;
use crate::value::{Rep, Value};
use crate::vtype::Type;
use crate::{Error, Result};

pub trait VdlType: Sized {
    /// The VDL type values of `Self` are encoded as.
    fn vdl_type() -> Result<Type>;
    fn to_value(&self) -> Result<Value>;
    /// Builds `Self` from `v`, converting `v` first if its type differs.
    fn from_value(v: &Value) -> Result<Self>;
}

/// `v` as a value of type `want`, converted only when its type differs.
pub fn conform(v: &Value, want: Type) -> Result<Cow<'_, Value>> {
    if v.ty() == want {
        Ok(Cow::Borrowed(v))
    } else {
        v.convert(want).map(Cow::Owned)
    }
}

fn mismatch(v: &Value, want: Type) -> Error {
    Error::mismatch(v.ty(), want)
}

impl VdlType for bool {
    fn vdl_type() -> Result<Type> {
        Ok(Type::BOOL)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::bool(*self))
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Type::BOOL)?;
        v.as_bool().ok_or_else(|| mismatch(&v, Type::BOOL))
    }
}

macro_rules! impl_uint {
    ($($t:ty => $ty:ident, $ctor:ident;)*) => {$(
        impl VdlType for $t {
            fn vdl_type() -> Result<Type> {
                Ok(Type::$ty)
            }

            fn to_value(&self) -> Result<Value> {
                Ok(Value::$ctor(*self))
            }

            fn from_value(v: &Value) -> Result<Self> {
                let v = conform(v, Type::$ty)?;
                let u = v.as_uint().ok_or_else(|| mismatch(&v, Type::$ty))?;
                <$t>::try_from(u).map_err(|_| Error::invalid(format!("{u} overflows {}", Type::$ty)))
            }
        }
    )*};
}

impl_uint! {
    u8 => BYTE, byte;
    u16 => UINT16, uint16;
    u32 => UINT32, uint32;
    u64 => UINT64, uint64;
}

macro_rules! impl_int {
    ($($t:ty => $ty:ident, $ctor:ident;)*) => {$(
        impl VdlType for $t {
            fn vdl_type() -> Result<Type> {
                Ok(Type::$ty)
            }

            fn to_value(&self) -> Result<Value> {
                Ok(Value::$ctor(*self))
            }

            fn from_value(v: &Value) -> Result<Self> {
                let v = conform(v, Type::$ty)?;
                let i = v.as_int().ok_or_else(|| mismatch(&v, Type::$ty))?;
                <$t>::try_from(i).map_err(|_| Error::invalid(format!("{i} overflows {}", Type::$ty)))
            }
        }
    )*};
}

impl_int! {
    i16 => INT16, int16;
    i32 => INT32, int32;
    i64 => INT64, int64;
}

impl VdlType for f32 {
    fn vdl_type() -> Result<Type> {
        Ok(Type::FLOAT32)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::float32(*self))
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Type::FLOAT32)?;
        v.as_float().map(|f| f as f32).ok_or_else(|| mismatch(&v, Type::FLOAT32))
    }
}

impl VdlType for f64 {
    fn vdl_type() -> Result<Type> {
        Ok(Type::FLOAT64)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::float64(*self))
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Type::FLOAT64)?;
        v.as_float().ok_or_else(|| mismatch(&v, Type::FLOAT64))
    }
}

impl VdlType for String {
    fn vdl_type() -> Result<Type> {
        Ok(Type::STRING)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::string(self.as_str()))
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Type::STRING)?;
        v.as_str().map(str::to_string).ok_or_else(|| mismatch(&v, Type::STRING))
    }
}

/// The elements of a list or array value, byte lists included.
fn elems_of<T: VdlType>(v: &Value) -> Result<Vec<T>> {
    if let Some(bytes) = v.as_bytes() {
        return bytes.iter().map(|b| T::from_value(&Value::byte(*b))).collect();
    }
    let elems = v.elems().ok_or_else(|| Error::invalid(format!("{} is not a list", v.ty())))?;
    elems.iter().map(T::from_value).collect()
}

impl<T: VdlType> VdlType for Vec<T> {
    fn vdl_type() -> Result<Type> {
        Ok(Type::list_of(T::vdl_type()?)?)
    }

    fn to_value(&self) -> Result<Value> {
        let elems = self.iter().map(T::to_value).collect::<Result<Vec<_>>>()?;
        Value::list(Self::vdl_type()?, elems)
    }

    fn from_value(v: &Value) -> Result<Self> {
        elems_of(&*conform(v, Self::vdl_type()?)?)
    }
}

impl<T: VdlType, const N: usize> VdlType for [T; N] {
    fn vdl_type() -> Result<Type> {
        Ok(Type::array_of(N, T::vdl_type()?)?)
    }

    fn to_value(&self) -> Result<Value> {
        let elems = self.iter().map(T::to_value).collect::<Result<Vec<_>>>()?;
        Value::list(Self::vdl_type()?, elems)
    }

    fn from_value(v: &Value) -> Result<Self> {
        let elems: Vec<T> = elems_of(&*conform(v, Self::vdl_type()?)?)?;
        let len = elems.len();
        elems.try_into().map_err(|_| Error::invalid(format!("array needs {N} elems, got {len}")))
    }
}

/// Optional values; `T` must be described by a struct type.
impl<T: VdlType> VdlType for Option<T> {
    fn vdl_type() -> Result<Type> {
        Ok(Type::optional_of(T::vdl_type()?)?)
    }

    fn to_value(&self) -> Result<Value> {
        let elem = self.as_ref().map(T::to_value).transpose()?;
        Value::optional(Self::vdl_type()?, elem)
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Self::vdl_type()?)?;
        v.elem().map(T::from_value).transpose()
    }
}

fn entries_of<K: VdlType, V: VdlType>(v: &Value) -> Result<Vec<(K, V)>> {
    let entries = v.map_entries().ok_or_else(|| Error::invalid(format!("{} is not a map", v.ty())))?;
    entries.iter().map(|(k, e)| Ok((K::from_value(k)?, V::from_value(e)?))).collect()
}

fn keys_of<K: VdlType>(v: &Value) -> Result<Vec<K>> {
    let keys = v.set_keys().ok_or_else(|| Error::invalid(format!("{} is not a set", v.ty())))?;
    keys.iter().map(K::from_value).collect()
}

macro_rules! impl_map {
    ($($map:ident<K: $($kb:path),+>;)*) => {$(
        impl<K: VdlType $(+ $kb)+, V: VdlType> VdlType for $map<K, V> {
            fn vdl_type() -> Result<Type> {
                Ok(Type::map_of(K::vdl_type()?, V::vdl_type()?)?)
            }

            fn to_value(&self) -> Result<Value> {
                let entries = self
                    .iter()
                    .map(|(k, v)| Ok((k.to_value()?, v.to_value()?)))
                    .collect::<Result<Vec<_>>>()?;
                Value::map(Self::vdl_type()?, entries)
            }

            fn from_value(v: &Value) -> Result<Self> {
                Ok(entries_of(&*conform(v, Self::vdl_type()?)?)?.into_iter().collect())
            }
        }
    )*};
}

impl_map! {
    BTreeMap<K: Ord>;
    HashMap<K: Eq, Hash>;
}

macro_rules! impl_set {
    ($($set:ident<K: $($kb:path),+>;)*) => {$(
        impl<K: VdlType $(+ $kb)+> VdlType for $set<K> {
            fn vdl_type() -> Result<Type> {
                Ok(Type::set_of(K::vdl_type()?)?)
            }

            fn to_value(&self) -> Result<Value> {
                let keys = self.iter().map(K::to_value).collect::<Result<Vec<_>>>()?;
                Value::set(Self::vdl_type()?, keys)
            }

            fn from_value(v: &Value) -> Result<Self> {
                Ok(keys_of(&*conform(v, Self::vdl_type()?)?)?.into_iter().collect())
            }
        }
    )*};
}

impl_set! {
    BTreeSet<K: Ord>;
    HashSet<K: Eq, Hash>;
}

/// A generic value travels as an any.
impl VdlType for Value {
    fn vdl_type() -> Result<Type> {
        Ok(Type::ANY)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::any(self.clone()))
    }

    fn from_value(v: &Value) -> Result<Self> {
        match v.rep() {
            Rep::Raw(raw) => raw.to_value(),
            _ => v.unwrap_any().resolve_raw(),
        }
    }
}

impl VdlType for Type {
    fn vdl_type() -> Result<Type> {
        Ok(Type::TYPE_OBJECT)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::type_object(*self))
    }

    fn from_value(v: &Value) -> Result<Self> {
        let v = conform(v, Type::TYPE_OBJECT)?;
        v.as_type_object().ok_or_else(|| mismatch(&v, Type::TYPE_OBJECT))
    }
}

impl VdlType for RawValue {
    fn vdl_type() -> Result<Type> {
        Ok(Type::ANY)
    }

    fn to_value(&self) -> Result<Value> {
        if self.is_nil_any() {
            return Ok(Value::nil_any());
        }
        Ok(Value::any(RawValue::to_value(self)?))
    }

    fn from_value(v: &Value) -> Result<Self> {
        RawValue::from_value(v)
    }
}

impl VdlType for WireType {
    fn vdl_type() -> Result<Type> {
        Ok(SCHEMA.wire_type)
    }

    fn to_value(&self) -> Result<Value> {
        WireType::to_value(self)
    }

    fn from_value(v: &Value) -> Result<Self> {
        WireType::from_value(&*conform(v, SCHEMA.wire_type)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: VdlType + PartialEq + std::fmt::Debug>(v: T) {
        let value = v.to_value().unwrap();
        assert_eq!(value.ty(), T::vdl_type().unwrap());
        assert_eq!(T::from_value(&value).unwrap(), v);
    }

    #[test]
    fn test_std_types() {
        round_trip(true);
        round_trip(7u8);
        round_trip(-3i16);
        round_trip(u64::MAX);
        round_trip(1.5f32);
        round_trip("hi".to_string());
        round_trip(vec![1u8, 2, 3]);
        round_trip(vec!["a".to_string()]);
        round_trip([1i64, 2]);
        round_trip(BTreeMap::from([("k".to_string(), 1u32)]));
        round_trip(HashSet::from([4i32, 5]));
        round_trip(Type::STRING);
    }

    #[test]
    fn test_bytes_use_byte_list() {
        let v = vec![1u8, 2].to_value().unwrap();
        assert_eq!(v, Value::bytes(vec![1, 2]));
        assert_eq!(<[u8; 2]>::from_value(&v).unwrap(), [1, 2]);
        assert!(<[u8; 3]>::from_value(&v).is_err());
    }

    #[test]
    fn test_conversion_on_read() {
        assert_eq!(i64::from_value(&Value::uint32(9)).unwrap(), 9);
        assert!(u8::from_value(&Value::int64(-1)).is_err());
        let ints = vec![1i64, 2].to_value().unwrap();
        assert_eq!(Vec::<f64>::from_value(&ints).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_value_is_any() {
        let v = Value::string("x");
        let any = v.to_value().unwrap();
        assert_eq!(any.ty(), Type::ANY);
        assert_eq!(Value::from_value(&any).unwrap(), v);
    }

    #[test]
    fn test_optional_needs_struct() {
        assert!(Option::<i64>::vdl_type().is_err());
    }
}
