use std::io::Read;

use crate::config::{Version, DEFAULT_MAX_DEPTH};
use crate::convert::{int_range, uint_max};
use crate::decode::{UintOrControl, WireReader};
use crate::object::{WIRE_CTRL_END, WIRE_CTRL_NIL};
use crate::raw::{transcode, RawValue};
use crate::target::Target;
use crate::vtype::{Kind, Type};
use crate::writer::RefList;
use crate::{Error, Result};

/// Resolves the type references found inside a payload.
pub trait TypeLookup {
    fn lookup_ref(&self, r: u64) -> Result<Type>;

    /// The list references index into, when they are indices at all.
    fn ref_list(&self) -> Option<&[Type]> {
        None
    }
}

/// A message's referenced-types list: references are indices.
impl TypeLookup for Vec<Type> {
    fn lookup_ref(&self, r: u64) -> Result<Type> {
        usize::try_from(r)
            .ok()
            .and_then(|i| self.get(i).copied())
            .ok_or_else(|| Error::IndexOutOfRange { index: r, len: self.len(), ty: "type refs".to_string() })
    }

    fn ref_list(&self) -> Option<&[Type]> {
        Some(self)
    }
}

/// For payloads that can hold no type references, such as type messages.
pub(crate) struct NoLookup;

impl TypeLookup for NoLookup {
    fn lookup_ref(&self, r: u64) -> Result<Type> {
        Err(Error::invalid(format!("unexpected type reference {r}")))
    }
}

fn index_error(index: u64, len: usize, tt: Type) -> Error {
    Error::IndexOutOfRange { index, len, ty: tt.to_string() }
}

/// Walks one encoded value of a known type, either presenting it to a
/// [`Target`] or skipping it.
///
/// Nesting deeper than the depth limit fails with [`Error::TooDeep`]
/// instead of exhausting the stack on recursive types.
pub struct ValueReader<'a, R: Read> {
    r: &'a mut WireReader<R>,
    types: &'a dyn TypeLookup,
    depth: usize,
    max_depth: usize,
}

impl<'a, R: Read> ValueReader<'a, R> {
    pub fn new(r: &'a mut WireReader<R>, types: &'a dyn TypeLookup) -> Self {
        Self { r, types, depth: 0, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::TooDeep(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.r.read_uint()?;
        usize::try_from(len).map_err(|_| Error::invalid(format!("length {len} overflows")))
    }

    fn read_index(&mut self, len: usize, tt: Type) -> Result<usize> {
        let index = self.r.read_uint()?;
        if index >= len as u64 {
            return Err(index_error(index, len, tt));
        }
        Ok(index as usize)
    }

    fn read_type_ref(&mut self) -> Result<Type> {
        let r = self.r.read_uint()?;
        self.types.lookup_ref(r)
    }

    fn read_uint_of(&mut self, tt: Type) -> Result<u64> {
        let v = self.r.read_uint()?;
        if v > uint_max(tt.kind()) {
            return Err(Error::invalid(format!("{v} overflows {tt}")));
        }
        Ok(v)
    }

    fn read_int_of(&mut self, tt: Type) -> Result<i64> {
        let v = self.r.read_int()?;
        let (min, max) = int_range(tt.kind());
        if v < min || v > max {
            return Err(Error::invalid(format!("{v} overflows {tt}")));
        }
        Ok(v)
    }

    /// Consumes a nil marker if one is next.
    fn take_nil(&mut self) -> Result<bool> {
        match self.r.peek_control()? {
            Some(WIRE_CTRL_NIL) => {
                self.r.read_u8()?;
                Ok(true)
            }
            Some(c) => Err(Error::UnexpectedControlByte(c)),
            None => Ok(false),
        }
    }

    /// Presents the value of type `tt` to `target`.
    pub fn decode_value(&mut self, tt: Type, target: &mut dyn Target) -> Result<()> {
        self.enter()?;
        let res = self.decode_as(tt, tt, target);
        self.depth -= 1;
        res
    }

    /// Captures the value of type `tt` as it is encoded. References are
    /// rewritten to index a list of their own unless they already do.
    fn capture(&mut self, tt: Type) -> Result<RawValue> {
        let (types, depth, max_depth) = (self.types, self.depth, self.max_depth);
        let ((), data) =
            self.r.record(|r| ValueReader { r, types, depth, max_depth }.ignore_value(tt))?;
        if let Some(list) = types.ref_list() {
            return Ok(RawValue::new(tt, list.to_vec(), data, Version::V81));
        }
        let mut refs = RefList::new();
        let data = transcode(tt, &data, types, &mut refs, max_depth)?;
        Ok(RawValue::new(tt, refs.into_types(), data, Version::V80))
    }

    /// Decodes a value of type `tt`, reporting composite events with the
    /// type `from` (which differs for the element of an optional).
    fn decode_as(&mut self, tt: Type, from: Type, t: &mut dyn Target) -> Result<()> {
        match tt.kind() {
            Kind::Bool => t.from_bool(self.r.read_bool()?, from),
            Kind::Byte => t.from_uint(self.r.read_u8()? as u64, from),
            Kind::Uint16 | Kind::Uint32 | Kind::Uint64 => t.from_uint(self.read_uint_of(tt)?, from),
            Kind::Int16 | Kind::Int32 | Kind::Int64 => t.from_int(self.read_int_of(tt)?, from),
            Kind::Float32 | Kind::Float64 => t.from_float(self.r.read_float()?, from),
            Kind::Complex64 | Kind::Complex128 => {
                let re = self.r.read_float()?;
                let im = self.r.read_float()?;
                t.from_complex(re, im, from)
            }
            Kind::String => t.from_string(&self.r.read_string()?, from),
            Kind::Enum => {
                let labels = tt.labels();
                let index = self.read_index(labels.len(), tt)?;
                t.from_enum_label(&labels[index], from)
            }
            Kind::TypeObject => {
                let v = self.read_type_ref()?;
                t.from_type_object(v)
            }
            Kind::Array | Kind::List if tt.is_bytes() => {
                let len = if tt.kind() == Kind::Array { tt.len() as u64 } else { self.r.read_uint()? };
                let bytes = self.r.read_vec(len)?;
                t.from_bytes(&bytes, from)
            }
            Kind::Array | Kind::List => {
                let len = if tt.kind() == Kind::Array { tt.len() } else { self.read_len()? };
                t.start_list(from, len)?;
                for i in 0..len {
                    t.start_elem(i)?;
                    self.decode_value(tt.elem(), t)?;
                    t.finish_elem()?;
                }
                t.finish_list()
            }
            Kind::Set => {
                let len = self.read_len()?;
                t.start_set(from, len)?;
                for _ in 0..len {
                    t.start_key()?;
                    self.decode_value(tt.key(), t)?;
                    t.finish_key()?;
                }
                t.finish_set()
            }
            Kind::Map => {
                let len = self.read_len()?;
                t.start_map(from, len)?;
                for _ in 0..len {
                    t.start_key()?;
                    self.decode_value(tt.key(), t)?;
                    if t.finish_key_start_field()? {
                        self.decode_value(tt.elem(), t)?;
                        t.finish_field()?;
                    } else {
                        self.ignore_value(tt.elem())?;
                    }
                }
                t.finish_map()
            }
            Kind::Struct => {
                t.start_fields(from)?;
                loop {
                    let index = match self.r.read_uint_or_control()? {
                        UintOrControl::Control(WIRE_CTRL_END) => break,
                        UintOrControl::Control(c) => return Err(Error::UnexpectedControlByte(c)),
                        UintOrControl::Uint(i) => i,
                    };
                    let field = tt.field(index as usize).ok_or_else(|| index_error(index, tt.num_fields(), tt))?;
                    if t.start_field(&field.name)? {
                        self.decode_value(field.ty, t)?;
                        t.finish_field()?;
                    } else {
                        self.ignore_value(field.ty)?;
                    }
                }
                t.finish_fields()
            }
            Kind::Union => {
                let index = self.read_index(tt.num_fields(), tt)?;
                let field = &tt.fields()[index];
                t.start_fields(from)?;
                if t.start_field(&field.name)? {
                    self.decode_value(field.ty, t)?;
                    t.finish_field()?;
                } else {
                    self.ignore_value(field.ty)?;
                }
                t.finish_fields()
            }
            Kind::Optional => {
                if self.take_nil()? {
                    return t.from_nil(tt);
                }
                self.decode_as(tt.elem(), tt, t)
            }
            Kind::Any => {
                if self.take_nil()? {
                    return t.from_nil(Type::ANY);
                }
                let inner = self.read_type_ref()?;
                if inner == Type::ANY {
                    return Err(Error::invalid("any cannot hold a non-nil any"));
                }
                if t.wants_raw()? {
                    let raw = self.capture(inner)?;
                    return t.from_raw(raw);
                }
                self.decode_value(inner, t)
            }
        }
    }

    /// Skips the value of type `tt`.
    pub fn ignore_value(&mut self, tt: Type) -> Result<()> {
        self.enter()?;
        let res = self.skip_value(tt);
        self.depth -= 1;
        res
    }

    fn skip_value(&mut self, tt: Type) -> Result<()> {
        match tt.kind() {
            Kind::Bool | Kind::Byte => self.r.read_u8().map(drop),
            Kind::Uint16 | Kind::Uint32 | Kind::Uint64 | Kind::Int16 | Kind::Int32 | Kind::Int64 => {
                self.r.read_uint().map(drop)
            }
            Kind::Float32 | Kind::Float64 | Kind::TypeObject => self.r.read_uint().map(drop),
            Kind::Complex64 | Kind::Complex128 => {
                self.r.read_uint()?;
                self.r.read_uint().map(drop)
            }
            Kind::String => self.r.skip_bytes(),
            Kind::Enum => self.read_index(tt.labels().len(), tt).map(drop),
            Kind::Array if tt.is_bytes() => self.r.skip(tt.len() as u64),
            Kind::List if tt.is_bytes() => self.r.skip_bytes(),
            Kind::Array | Kind::List => {
                let len = if tt.kind() == Kind::Array { tt.len() } else { self.read_len()? };
                for _ in 0..len {
                    self.ignore_value(tt.elem())?;
                }
                Ok(())
            }
            Kind::Set => {
                let len = self.read_len()?;
                for _ in 0..len {
                    self.ignore_value(tt.key())?;
                }
                Ok(())
            }
            Kind::Map => {
                let len = self.read_len()?;
                for _ in 0..len {
                    self.ignore_value(tt.key())?;
                    self.ignore_value(tt.elem())?;
                }
                Ok(())
            }
            Kind::Struct => loop {
                let index = match self.r.read_uint_or_control()? {
                    UintOrControl::Control(WIRE_CTRL_END) => return Ok(()),
                    UintOrControl::Control(c) => return Err(Error::UnexpectedControlByte(c)),
                    UintOrControl::Uint(i) => i,
                };
                let field = tt.field(index as usize).ok_or_else(|| index_error(index, tt.num_fields(), tt))?;
                self.ignore_value(field.ty)?;
            },
            Kind::Union => {
                let index = self.read_index(tt.num_fields(), tt)?;
                self.ignore_value(tt.fields()[index].ty)
            }
            Kind::Optional => {
                if self.take_nil()? {
                    return Ok(());
                }
                self.ignore_value(tt.elem())
            }
            Kind::Any => {
                if self.take_nil()? {
                    return Ok(());
                }
                let inner = self.read_type_ref()?;
                self.ignore_value(inner)
            }
        }
    }
}
