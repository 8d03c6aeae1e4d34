//! The visitor that decouples value traversal from value representation.
//!
//! A value is presented to a [`Target`] as a stream of events. Scalars are a
//! single `from_*` call; composites bracket their contents:
//!
//! ```text
//! list/array  start_list (start_elem <value> finish_elem)* finish_list
//! set         start_set  (start_key <key> finish_key)* finish_set
//! map         start_map  (start_key <key> finish_key_start_field [<value> finish_field])* finish_map
//! struct      start_fields (start_field [<value> finish_field])* finish_fields
//! union       start_fields start_field [<value> finish_field] finish_fields
//! ```
//!
//! Every event carries the type of the value being presented. For a non-nil
//! optional this is the optional type itself, so a consumer can tell the
//! value was optional. A `false` from `start_field` or
//! `finish_key_start_field` means the target has no place for the value;
//! the producer then skips it and sends no `finish_field`.

use std::collections::{BTreeMap, BTreeSet};

use crate::convert::coerce;
use crate::raw::RawValue;
use crate::value::{Rep, Value};
use crate::vtype::{Kind, Type};
use crate::{Error, Result};

pub trait Target {
    /// A nil any (`tt` is any) or nil optional (`tt` is the optional type).
    fn from_nil(&mut self, tt: Type) -> Result<()>;
    fn from_bool(&mut self, v: bool, tt: Type) -> Result<()>;
    fn from_uint(&mut self, v: u64, tt: Type) -> Result<()>;
    fn from_int(&mut self, v: i64, tt: Type) -> Result<()>;
    fn from_float(&mut self, v: f64, tt: Type) -> Result<()>;
    fn from_complex(&mut self, re: f64, im: f64, tt: Type) -> Result<()>;
    /// A whole byte list or byte array.
    fn from_bytes(&mut self, v: &[u8], tt: Type) -> Result<()>;
    fn from_string(&mut self, v: &str, tt: Type) -> Result<()>;
    fn from_enum_label(&mut self, label: &str, tt: Type) -> Result<()>;
    fn from_type_object(&mut self, v: Type) -> Result<()>;

    fn start_list(&mut self, tt: Type, len: usize) -> Result<()>;
    fn start_elem(&mut self, index: usize) -> Result<()>;
    fn finish_elem(&mut self) -> Result<()>;
    fn finish_list(&mut self) -> Result<()>;

    fn start_set(&mut self, tt: Type, len: usize) -> Result<()>;
    fn start_key(&mut self) -> Result<()>;
    /// Returns false when the key has no counterpart in the target.
    fn finish_key(&mut self) -> Result<bool>;
    fn finish_set(&mut self) -> Result<()>;

    fn start_map(&mut self, tt: Type, len: usize) -> Result<()>;
    /// Returns false when the entry's value should be skipped.
    fn finish_key_start_field(&mut self) -> Result<bool>;
    fn finish_map(&mut self) -> Result<()>;

    fn start_fields(&mut self, tt: Type) -> Result<()>;
    /// Returns false when the field does not exist in the target.
    fn start_field(&mut self, name: &str) -> Result<bool>;
    fn finish_field(&mut self) -> Result<()>;
    fn finish_fields(&mut self) -> Result<()>;

    /// Returns true to take the contents of the next non-nil any still
    /// encoded, through [`from_raw`](Target::from_raw).
    fn wants_raw(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn from_raw(&mut self, raw: RawValue) -> Result<()> {
        Err(Error::invalid(format!("unexpected encoded {}", raw.ty())))
    }
}

/// Splits a destination slot into the concrete type to build and the
/// any/optional wrappers (outermost first) to apply afterwards.
fn resolve(slot: Type, from: Type) -> (Type, Vec<Type>) {
    let mut wraps = Vec::new();
    let mut want = slot;
    if want.kind() == Kind::Any {
        wraps.push(Type::ANY);
        want = from;
    }
    if want.kind() == Kind::Optional {
        wraps.push(want);
        want = want.elem();
    }
    (want, wraps)
}

fn wrap(mut v: Value, wraps: &[Type]) -> Result<Value> {
    for w in wraps.iter().rev() {
        v = if w.kind() == Kind::Any { Value::any(v) } else { Value::optional(*w, Some(v))? };
    }
    Ok(v)
}

/// The shape of an incoming composite: optionals present their element.
fn shape(tt: Type) -> Type {
    if tt.kind() == Kind::Optional { tt.elem() } else { tt }
}

// Caps preallocation driven by untrusted lengths.
const PREALLOC: usize = 1024;

#[derive(Debug)]
enum State {
    List(Vec<Value>),
    Set {
        keys: BTreeSet<Value>,
        key: Option<Value>,
    },
    Map {
        entries: BTreeMap<Value, Value>,
        key: Option<Value>,
        at_key: bool,
    },
    Struct {
        values: Vec<Option<Value>>,
        current: Option<usize>,
    },
    Union {
        value: Option<(usize, Value)>,
        current: Option<usize>,
    },
    /// A `map[string]T` landing in a struct: keys name fields.
    StructFromMap {
        values: Vec<Option<Value>>,
        key: Option<Value>,
        at_key: bool,
        current: Option<usize>,
    },
    /// A `set[string]` landing in a struct of bools.
    StructFromSet {
        values: Vec<Option<Value>>,
        key: Option<Value>,
    },
}

#[derive(Debug)]
struct Frame {
    want: Type,
    wraps: Vec<Type>,
    state: State,
}

/// A [`Target`] that builds a [`Value`] of a requested type, converting
/// from the presented types where they are compatible.
#[derive(Debug)]
pub struct ValueTarget {
    want: Type,
    stack: Vec<Frame>,
    result: Option<Value>,
    raw_any: bool,
}

impl ValueTarget {
    pub fn new(want: Type) -> Self {
        ValueTarget { want, stack: Vec::new(), result: None, raw_any: false }
    }

    /// Keeps the contents of every incoming any encoded, as a
    /// [`Rep::Raw`] value, instead of decoding them.
    pub fn with_raw_any(mut self) -> Self {
        self.raw_any = true;
        self
    }

    /// The value built so far; fails if no complete value was presented.
    pub fn finish(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(Error::invalid("incomplete value"));
        }
        self.result.ok_or_else(|| Error::invalid("no value"))
    }

    /// The type expected for the next value.
    fn slot(&self) -> Result<Type> {
        let Some(top) = self.stack.last() else {
            return Ok(self.want);
        };
        let outside = || Error::invalid(format!("value outside of a field of {}", top.want));
        let field = |i: usize| top.want.field(i).map(|f| f.ty).ok_or_else(outside);
        match &top.state {
            State::List(_) => Ok(top.want.elem()),
            State::Set { .. } => Ok(top.want.key()),
            State::Map { at_key: true, .. } => Ok(top.want.key()),
            State::Map { .. } => Ok(top.want.elem()),
            State::Struct { current: Some(i), .. } | State::Union { current: Some(i), .. } => field(*i),
            State::StructFromMap { at_key: true, .. } | State::StructFromSet { .. } => Ok(Type::STRING),
            State::StructFromMap { current: Some(i), .. } => field(*i),
            _ => Err(outside()),
        }
    }

    fn place(&mut self, v: Value) -> Result<()> {
        let Some(top) = self.stack.last_mut() else {
            self.result = Some(v);
            return Ok(());
        };
        match &mut top.state {
            State::List(elems) => elems.push(v),
            State::Set { key, .. } | State::StructFromSet { key, .. } => *key = Some(v),
            State::Map { entries, key, at_key } => {
                if *at_key {
                    *key = Some(v);
                } else {
                    let k = key.take().ok_or_else(|| Error::invalid("map value without key"))?;
                    entries.insert(k, v);
                }
            }
            State::Struct { values, current: Some(i) } => values[*i] = Some(v),
            State::Union { value, current: Some(i) } => *value = Some((*i, v)),
            State::StructFromMap { key, at_key: true, .. } => *key = Some(v),
            State::StructFromMap { values, current: Some(i), .. } => values[*i] = Some(v),
            _ => return Err(Error::invalid("value outside of a field")),
        }
        Ok(())
    }

    fn leaf(&mut self, src: Value) -> Result<()> {
        let (want, wraps) = resolve(self.slot()?, src.ty());
        let v = coerce(src, want)?;
        self.place(wrap(v, &wraps)?)
    }

    fn push(&mut self, want: Type, wraps: Vec<Type>, state: State) -> Result<()> {
        self.stack.push(Frame { want, wraps, state });
        Ok(())
    }

    fn pop(&mut self) -> Result<Frame> {
        self.stack.pop().ok_or_else(|| Error::invalid("unbalanced finish"))
    }

    fn struct_values(want: Type) -> Vec<Option<Value>> {
        vec![None; want.num_fields()]
    }

    fn finish_struct(want: Type, values: Vec<Option<Value>>) -> Result<Value> {
        let values = values
            .into_iter()
            .zip(want.fields())
            .map(|(v, f)| v.unwrap_or_else(|| Value::zero(f.ty)))
            .collect();
        Value::struct_of(want, values)
    }

    fn finish_frame(&mut self, frame: Frame) -> Result<()> {
        let want = frame.want;
        let v = match frame.state {
            State::List(elems) => Value::list(want, elems)?,
            State::Set { keys, .. } => Value::set(want, keys)?,
            State::Map { entries, .. } => Value::map(want, entries)?,
            State::Struct { values, .. }
            | State::StructFromMap { values, .. }
            | State::StructFromSet { values, .. } => Self::finish_struct(want, values)?,
            State::Union { value: Some((i, v)), .. } => Value::union_of(want, i, v)?,
            State::Union { value: None, .. } => {
                return Err(Error::invalid(format!("union {want} received no field")));
            }
        };
        let v = wrap(v, &frame.wraps)?;
        self.place(v)
    }
}

impl Target for ValueTarget {
    fn wants_raw(&mut self) -> Result<bool> {
        Ok(self.raw_any && self.slot()?.kind() == Kind::Any)
    }

    fn from_raw(&mut self, raw: RawValue) -> Result<()> {
        let slot = self.slot()?;
        if slot.kind() != Kind::Any {
            return Err(Error::mismatch(raw.ty(), slot));
        }
        self.place(Value::raw(Type::ANY, Rep::Raw(Box::new(raw))))
    }

    fn from_nil(&mut self, tt: Type) -> Result<()> {
        let slot = self.slot()?;
        let v = match slot.kind() {
            Kind::Any if tt.kind() == Kind::Optional => Value::any(Value::optional(tt, None)?),
            Kind::Any => Value::nil_any(),
            Kind::Optional => Value::optional(slot, None)?,
            _ => return Err(Error::mismatch(format!("nil {tt}"), slot)),
        };
        self.place(v)
    }

    fn from_bool(&mut self, v: bool, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Bool(v)))
    }

    fn from_uint(&mut self, v: u64, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Uint(v)))
    }

    fn from_int(&mut self, v: i64, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Int(v)))
    }

    fn from_float(&mut self, v: f64, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Float(v)))
    }

    fn from_complex(&mut self, re: f64, im: f64, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Complex(re, im)))
    }

    fn from_bytes(&mut self, v: &[u8], tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::Bytes(v.to_vec())))
    }

    fn from_string(&mut self, v: &str, tt: Type) -> Result<()> {
        self.leaf(Value::raw(tt, Rep::String(v.to_string())))
    }

    fn from_enum_label(&mut self, label: &str, tt: Type) -> Result<()> {
        let index = tt
            .label_index(label)
            .ok_or_else(|| Error::invalid(format!("{label:?} is not a label of {tt}")))?;
        self.leaf(Value::raw(tt, Rep::Enum(index)))
    }

    fn from_type_object(&mut self, v: Type) -> Result<()> {
        self.leaf(Value::type_object(v))
    }

    fn start_list(&mut self, tt: Type, len: usize) -> Result<()> {
        let (want, wraps) = resolve(self.slot()?, tt);
        match want.kind() {
            Kind::List => {}
            Kind::Array if want.len() == len => {}
            _ => return Err(Error::mismatch(tt, want)),
        }
        self.push(want, wraps, State::List(Vec::with_capacity(len.min(PREALLOC))))
    }

    fn start_elem(&mut self, _index: usize) -> Result<()> {
        Ok(())
    }

    fn finish_elem(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish_list(&mut self) -> Result<()> {
        let frame = self.pop()?;
        self.finish_frame(frame)
    }

    fn start_set(&mut self, tt: Type, _len: usize) -> Result<()> {
        let (want, wraps) = resolve(self.slot()?, tt);
        let state = match want.kind() {
            Kind::Set => State::Set { keys: BTreeSet::new(), key: None },
            Kind::Struct if tt.key().kind() == Kind::String => {
                State::StructFromSet { values: Self::struct_values(want), key: None }
            }
            _ => return Err(Error::mismatch(tt, want)),
        };
        self.push(want, wraps, state)
    }

    fn start_key(&mut self) -> Result<()> {
        if let Some(Frame { state: State::Map { at_key, .. } | State::StructFromMap { at_key, .. }, .. }) =
            self.stack.last_mut()
        {
            *at_key = true;
        }
        Ok(())
    }

    fn finish_key(&mut self) -> Result<bool> {
        let top = self.stack.last_mut().ok_or_else(|| Error::invalid("key outside of a set"))?;
        let want = top.want;
        match &mut top.state {
            State::Set { keys, key } => {
                let k = key.take().ok_or_else(|| Error::invalid("set without key"))?;
                keys.insert(k);
                Ok(true)
            }
            State::StructFromSet { values, key } => {
                let k = key.take().ok_or_else(|| Error::invalid("set without key"))?;
                let Some(i) = k.as_str().and_then(|name| want.field_index(name)) else {
                    return Ok(false);
                };
                values[i] = Some(coerce(Value::bool(true), want.fields()[i].ty)?);
                Ok(true)
            }
            _ => Err(Error::invalid("key outside of a set")),
        }
    }

    fn finish_set(&mut self) -> Result<()> {
        let frame = self.pop()?;
        self.finish_frame(frame)
    }

    fn start_map(&mut self, tt: Type, _len: usize) -> Result<()> {
        let (want, wraps) = resolve(self.slot()?, tt);
        let state = match want.kind() {
            Kind::Map => State::Map { entries: BTreeMap::new(), key: None, at_key: true },
            Kind::Struct if tt.key().kind() == Kind::String => State::StructFromMap {
                values: Self::struct_values(want),
                key: None,
                at_key: true,
                current: None,
            },
            _ => return Err(Error::mismatch(tt, want)),
        };
        self.push(want, wraps, state)
    }

    fn finish_key_start_field(&mut self) -> Result<bool> {
        let top = self.stack.last_mut().ok_or_else(|| Error::invalid("key outside of a map"))?;
        let want = top.want;
        match &mut top.state {
            State::Map { at_key, .. } => {
                *at_key = false;
                Ok(true)
            }
            State::StructFromMap { key, at_key, current, .. } => {
                *at_key = false;
                let k = key.take().ok_or_else(|| Error::invalid("map without key"))?;
                *current = k.as_str().and_then(|name| want.field_index(name));
                Ok(current.is_some())
            }
            _ => Err(Error::invalid("key outside of a map")),
        }
    }

    fn finish_map(&mut self) -> Result<()> {
        let frame = self.pop()?;
        self.finish_frame(frame)
    }

    fn start_fields(&mut self, tt: Type) -> Result<()> {
        let (want, wraps) = resolve(self.slot()?, tt);
        let from = shape(tt);
        let state = match (want.kind(), from.kind()) {
            (Kind::Struct, Kind::Struct) => State::Struct { values: Self::struct_values(want), current: None },
            (Kind::Union, Kind::Union) => State::Union { value: None, current: None },
            _ => return Err(Error::mismatch(tt, want)),
        };
        self.push(want, wraps, state)
    }

    fn start_field(&mut self, name: &str) -> Result<bool> {
        let top = self.stack.last_mut().ok_or_else(|| Error::invalid("field outside of a struct"))?;
        let index = top.want.field_index(name);
        match &mut top.state {
            State::Struct { current, .. } => {
                *current = index;
                Ok(index.is_some())
            }
            State::Union { current, .. } => match index {
                Some(i) => {
                    *current = Some(i);
                    Ok(true)
                }
                None => Err(Error::invalid(format!("union {} has no field {name:?}", top.want))),
            },
            _ => Err(Error::invalid("field outside of a struct")),
        }
    }

    fn finish_field(&mut self) -> Result<()> {
        if let Some(top) = self.stack.last_mut() {
            match &mut top.state {
                State::Struct { current, .. }
                | State::Union { current, .. }
                | State::StructFromMap { current, .. } => *current = None,
                _ => {}
            }
        }
        Ok(())
    }

    fn finish_fields(&mut self) -> Result<()> {
        let frame = self.pop()?;
        self.finish_frame(frame)
    }
}
