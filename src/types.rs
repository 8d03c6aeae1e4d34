//! The records a type message carries: one [`WireType`] per transmitted
//! type, with component types named by [`TypeId`].

use serde::{Deserialize, Serialize};

use crate::decode::WireReader;
use crate::object::{TypeId, SCHEMA};
use crate::reader::{NoLookup, ValueReader};
use crate::target::ValueTarget;
use crate::value::{Rep, Value};
use crate::vtype::Type;
use crate::writer::{NoRefs, ValueWriter};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireNamed {
    pub name: String,
    pub base: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireEnum {
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireArray {
    pub name: String,
    pub elem: TypeId,
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireList {
    pub name: String,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireSet {
    pub name: String,
    pub key: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireMap {
    pub name: String,
    pub key: TypeId,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireField {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireStruct {
    pub name: String,
    pub fields: Vec<WireField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireUnion {
    pub name: String,
    pub fields: Vec<WireField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireOptional {
    pub name: String,
    pub elem: TypeId,
}

/// The description of one type as sent in a type message. The variant
/// order is the union field order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireType {
    #[serde(rename = "NamedT")]
    Named(WireNamed),
    #[serde(rename = "EnumT")]
    Enum(WireEnum),
    #[serde(rename = "ArrayT")]
    Array(WireArray),
    #[serde(rename = "ListT")]
    List(WireList),
    #[serde(rename = "SetT")]
    Set(WireSet),
    #[serde(rename = "MapT")]
    Map(WireMap),
    #[serde(rename = "StructT")]
    Struct(WireStruct),
    #[serde(rename = "UnionT")]
    Union(WireUnion),
    #[serde(rename = "OptionalT")]
    Optional(WireOptional),
}

fn id_value(id: TypeId) -> Value {
    Value::raw(SCHEMA.type_id, Rep::Uint(id.0))
}

fn string_value(s: &str) -> Value {
    Value::string(s)
}

fn fields_value(fields: &[WireField]) -> Result<Value> {
    let elems = fields
        .iter()
        .map(|f| Value::struct_of(SCHEMA.field, vec![string_value(&f.name), id_value(f.ty)]))
        .collect::<Result<Vec<_>>>()?;
    Value::list(SCHEMA.field_list, elems)
}

struct Fields<'a>(&'a Value);

impl Fields<'_> {
    fn get(&self, i: usize) -> Result<&Value> {
        self.0.struct_field(i)
    }

    fn string(&self, i: usize) -> Result<String> {
        let v = self.get(i)?;
        v.as_str().map(str::to_string).ok_or_else(|| Error::mismatch(v.ty(), Type::STRING))
    }

    fn id(&self, i: usize) -> Result<TypeId> {
        let v = self.get(i)?;
        v.as_uint().map(TypeId).ok_or_else(|| Error::mismatch(v.ty(), SCHEMA.type_id))
    }

    fn uint(&self, i: usize) -> Result<u64> {
        let v = self.get(i)?;
        v.as_uint().ok_or_else(|| Error::mismatch(v.ty(), Type::UINT64))
    }

    fn strings(&self, i: usize) -> Result<Vec<String>> {
        let v = self.get(i)?;
        let elems = v.elems().ok_or_else(|| Error::invalid(format!("{} is not a list", v.ty())))?;
        elems
            .iter()
            .map(|e| e.as_str().map(str::to_string).ok_or_else(|| Error::mismatch(e.ty(), Type::STRING)))
            .collect()
    }

    fn fields(&self, i: usize) -> Result<Vec<WireField>> {
        let v = self.get(i)?;
        let elems = v.elems().ok_or_else(|| Error::invalid(format!("{} is not a list", v.ty())))?;
        elems
            .iter()
            .map(|e| {
                let f = Fields(e);
                Ok(WireField { name: f.string(0)?, ty: f.id(1)? })
            })
            .collect()
    }
}

impl WireType {
    pub fn name(&self) -> &str {
        match self {
            WireType::Named(t) => &t.name,
            WireType::Enum(t) => &t.name,
            WireType::Array(t) => &t.name,
            WireType::List(t) => &t.name,
            WireType::Set(t) => &t.name,
            WireType::Map(t) => &t.name,
            WireType::Struct(t) => &t.name,
            WireType::Union(t) => &t.name,
            WireType::Optional(t) => &t.name,
        }
    }

    /// The ids of the types this description refers to.
    pub fn refs(&self) -> Vec<TypeId> {
        match self {
            WireType::Named(t) => vec![t.base],
            WireType::Enum(_) => Vec::new(),
            WireType::Array(t) => vec![t.elem],
            WireType::List(t) => vec![t.elem],
            WireType::Set(t) => vec![t.key],
            WireType::Map(t) => vec![t.key, t.elem],
            WireType::Struct(WireStruct { fields, .. }) | WireType::Union(WireUnion { fields, .. }) => {
                fields.iter().map(|f| f.ty).collect()
            }
            WireType::Optional(t) => vec![t.elem],
        }
    }

    fn index(&self) -> usize {
        match self {
            WireType::Named(_) => 0,
            WireType::Enum(_) => 1,
            WireType::Array(_) => 2,
            WireType::List(_) => 3,
            WireType::Set(_) => 4,
            WireType::Map(_) => 5,
            WireType::Struct(_) => 6,
            WireType::Union(_) => 7,
            WireType::Optional(_) => 8,
        }
    }

    /// The description as a value of the `vom.WireType` union.
    pub fn to_value(&self) -> Result<Value> {
        let s = &*SCHEMA;
        let inner = match self {
            WireType::Named(t) => Value::struct_of(s.named, vec![string_value(&t.name), id_value(t.base)])?,
            WireType::Enum(t) => {
                let labels_ty = s.enum_.fields()[1].ty;
                let labels = Value::list(labels_ty, t.labels.iter().map(|l| string_value(l)).collect())?;
                Value::struct_of(s.enum_, vec![string_value(&t.name), labels])?
            }
            WireType::Array(t) => Value::struct_of(
                s.array,
                vec![string_value(&t.name), id_value(t.elem), Value::uint64(t.len)],
            )?,
            WireType::List(t) => Value::struct_of(s.list, vec![string_value(&t.name), id_value(t.elem)])?,
            WireType::Set(t) => Value::struct_of(s.set, vec![string_value(&t.name), id_value(t.key)])?,
            WireType::Map(t) => Value::struct_of(
                s.map,
                vec![string_value(&t.name), id_value(t.key), id_value(t.elem)],
            )?,
            WireType::Struct(t) => Value::struct_of(s.struct_, vec![string_value(&t.name), fields_value(&t.fields)?])?,
            WireType::Union(t) => Value::struct_of(s.union, vec![string_value(&t.name), fields_value(&t.fields)?])?,
            WireType::Optional(t) => Value::struct_of(s.optional, vec![string_value(&t.name), id_value(t.elem)])?,
        };
        Value::union_of(s.wire_type, self.index(), inner)
    }

    pub fn from_value(v: &Value) -> Result<WireType> {
        if v.ty() != SCHEMA.wire_type {
            return Err(Error::mismatch(v.ty(), SCHEMA.wire_type));
        }
        let (index, inner) = v.union_field().ok_or_else(|| Error::invalid("wire type is not a union value"))?;
        let f = Fields(inner);
        Ok(match index {
            0 => WireType::Named(WireNamed { name: f.string(0)?, base: f.id(1)? }),
            1 => WireType::Enum(WireEnum { name: f.string(0)?, labels: f.strings(1)? }),
            2 => WireType::Array(WireArray { name: f.string(0)?, elem: f.id(1)?, len: f.uint(2)? }),
            3 => WireType::List(WireList { name: f.string(0)?, elem: f.id(1)? }),
            4 => WireType::Set(WireSet { name: f.string(0)?, key: f.id(1)? }),
            5 => WireType::Map(WireMap { name: f.string(0)?, key: f.id(1)?, elem: f.id(2)? }),
            6 => WireType::Struct(WireStruct { name: f.string(0)?, fields: f.fields(1)? }),
            7 => WireType::Union(WireUnion { name: f.string(0)?, fields: f.fields(1)? }),
            8 => WireType::Optional(WireOptional { name: f.string(0)?, elem: f.id(1)? }),
            i => {
                return Err(Error::IndexOutOfRange { index: i as u64, len: 9, ty: SCHEMA.wire_type.to_string() });
            }
        })
    }

    /// Encodes the payload of a type message.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let v = self.to_value()?;
        let mut refs = NoRefs;
        let mut w = ValueWriter::new(SCHEMA.wire_type, &mut refs);
        v.drive(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Decodes the payload of a type message, which must be consumed exactly.
    pub fn decode(payload: &[u8]) -> Result<WireType> {
        let mut r = WireReader::new(payload);
        let mut target = ValueTarget::new(SCHEMA.wire_type);
        ValueReader::new(&mut r, &NoLookup).decode_value(SCHEMA.wire_type, &mut target)?;
        if !r.at_eof()? {
            // One byte sits in the lookahead.
            return Err(Error::LeftoverBytes(r.into_inner().len() + 1));
        }
        WireType::from_value(&target.finish()?)
    }
}
