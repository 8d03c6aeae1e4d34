//! Connection-scoped type ids and the bootstrap table.
//!
//! Ids below [`FIRST_USER_ID`] name types that both ends know without any
//! transmission:
//!
//! ```text
//! bool          1     int16         7     complex64    12
//! byte          2     int32         8     complex128   13
//! string        3     int64         9     typeobject   14
//! uint16        4     float32      10     any          15
//! uint32        5     float64      11     vom.TypeId   16
//! uint64        6
//! // wire type schema
//! WireNamed    17     WireMap      22     WireUnion    26
//! WireEnum     18     WireField    23     WireOptional 27
//! WireArray    19     []WireField  24     WireType     28
//! WireList     20     WireStruct   25
//! WireSet      21
//! // gap for reserved ids.
//! []byte       39     []string     40
//! ```

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::builder::TypeBuilder;
use crate::vtype::{Kind, Type};

/// Identifies a type within one connection's type stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u64);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TypeId {
    pub fn is_bootstrap(self) -> bool {
        self.0 < FIRST_USER_ID.0
    }
}

pub const BOOL_ID: TypeId = TypeId(1);
pub const BYTE_ID: TypeId = TypeId(2);
pub const STRING_ID: TypeId = TypeId(3);
pub const UINT16_ID: TypeId = TypeId(4);
pub const UINT32_ID: TypeId = TypeId(5);
pub const UINT64_ID: TypeId = TypeId(6);
pub const INT16_ID: TypeId = TypeId(7);
pub const INT32_ID: TypeId = TypeId(8);
pub const INT64_ID: TypeId = TypeId(9);
pub const FLOAT32_ID: TypeId = TypeId(10);
pub const FLOAT64_ID: TypeId = TypeId(11);
pub const COMPLEX64_ID: TypeId = TypeId(12);
pub const COMPLEX128_ID: TypeId = TypeId(13);
pub const TYPE_OBJECT_ID: TypeId = TypeId(14);
pub const ANY_ID: TypeId = TypeId(15);
pub const TYPE_ID_ID: TypeId = TypeId(16);
pub const WIRE_TYPE_ID: TypeId = TypeId(28);
pub const BYTE_LIST_ID: TypeId = TypeId(39);
pub const STRING_LIST_ID: TypeId = TypeId(40);
pub const FIRST_USER_ID: TypeId = TypeId(41);

/// Marks a nil any or optional value.
pub const WIRE_CTRL_NIL: u8 = 0xe0;
/// Terminates the fields of a struct value.
pub const WIRE_CTRL_END: u8 = 0xe1;

/// The types used to describe types on the wire.
pub(crate) struct WireSchema {
    pub type_id: Type,
    pub named: Type,
    pub enum_: Type,
    pub array: Type,
    pub list: Type,
    pub set: Type,
    pub map: Type,
    pub field: Type,
    pub field_list: Type,
    pub struct_: Type,
    pub union: Type,
    pub optional: Type,
    pub wire_type: Type,
}

impl WireSchema {
    fn build() -> Result<WireSchema, crate::error::BuildErrors> {
        let mut b = TypeBuilder::new();
        let type_id = b.named("vom.TypeId");
        b.assign_base(type_id, Type::UINT64);
        let strings = b.list_type();
        b.assign_elem(strings, Type::STRING);

        let shape = |b: &mut TypeBuilder, name: &str, fields: &[(&str, crate::builder::TypeOrPending)]| {
            let p = b.struct_type();
            b.set_name(p, name);
            for (field, ty) in fields {
                b.append_field(p, *field, *ty);
            }
            p
        };
        let s = Type::STRING.into();
        let id = type_id.into();
        let named = shape(&mut b, "vom.WireNamed", &[("Name", s), ("Base", id)]);
        let enum_ = shape(&mut b, "vom.WireEnum", &[("Name", s), ("Labels", strings.into())]);
        let array = shape(&mut b, "vom.WireArray", &[("Name", s), ("Elem", id), ("Len", Type::UINT64.into())]);
        let list = shape(&mut b, "vom.WireList", &[("Name", s), ("Elem", id)]);
        let set = shape(&mut b, "vom.WireSet", &[("Name", s), ("Key", id)]);
        let map = shape(&mut b, "vom.WireMap", &[("Name", s), ("Key", id), ("Elem", id)]);
        let field = shape(&mut b, "vom.WireField", &[("Name", s), ("Type", id)]);
        let field_list = b.list_type();
        b.assign_elem(field_list, field);
        let struct_ = shape(&mut b, "vom.WireStruct", &[("Name", s), ("Fields", field_list.into())]);
        let union = shape(&mut b, "vom.WireUnion", &[("Name", s), ("Fields", field_list.into())]);
        let optional = shape(&mut b, "vom.WireOptional", &[("Name", s), ("Elem", id)]);

        let wire_type = b.union_type();
        b.set_name(wire_type, "vom.WireType");
        for (name, p) in [
            ("NamedT", named),
            ("EnumT", enum_),
            ("ArrayT", array),
            ("ListT", list),
            ("SetT", set),
            ("MapT", map),
            ("StructT", struct_),
            ("UnionT", union),
            ("OptionalT", optional),
        ] {
            b.append_field(wire_type, name, p);
        }
        b.build()?;
        let get = |p| b.built(p).map_err(|e| crate::error::BuildErrors(vec![e]));
        Ok(WireSchema {
            type_id: get(type_id)?,
            named: get(named)?,
            enum_: get(enum_)?,
            array: get(array)?,
            list: get(list)?,
            set: get(set)?,
            map: get(map)?,
            field: get(field)?,
            field_list: get(field_list)?,
            struct_: get(struct_)?,
            union: get(union)?,
            optional: get(optional)?,
            wire_type: get(wire_type)?,
        })
    }
}

struct Bootstrap {
    by_id: HashMap<TypeId, Type>,
    by_type: HashMap<Type, TypeId>,
}

lazy_static! {
    pub(crate) static ref SCHEMA: WireSchema =
        WireSchema::build().expect("vom: the wire type schema is statically valid");
    static ref BOOTSTRAP: Bootstrap = {
        let s = &*SCHEMA;
        let byte_list = Type::list_of(Type::BYTE);
        let string_list = Type::list_of(Type::STRING);
        let mut pairs = vec![
            (BOOL_ID, Type::BOOL),
            (BYTE_ID, Type::BYTE),
            (STRING_ID, Type::STRING),
            (UINT16_ID, Type::UINT16),
            (UINT32_ID, Type::UINT32),
            (UINT64_ID, Type::UINT64),
            (INT16_ID, Type::INT16),
            (INT32_ID, Type::INT32),
            (INT64_ID, Type::INT64),
            (FLOAT32_ID, Type::FLOAT32),
            (FLOAT64_ID, Type::FLOAT64),
            (COMPLEX64_ID, Type::COMPLEX64),
            (COMPLEX128_ID, Type::COMPLEX128),
            (TYPE_OBJECT_ID, Type::TYPE_OBJECT),
            (ANY_ID, Type::ANY),
            (TYPE_ID_ID, s.type_id),
            (TypeId(17), s.named),
            (TypeId(18), s.enum_),
            (TypeId(19), s.array),
            (TypeId(20), s.list),
            (TypeId(21), s.set),
            (TypeId(22), s.map),
            (TypeId(23), s.field),
            (TypeId(24), s.field_list),
            (TypeId(25), s.struct_),
            (TypeId(26), s.union),
            (TypeId(27), s.optional),
            (WIRE_TYPE_ID, s.wire_type),
        ];
        if let (Ok(b), Ok(l)) = (byte_list, string_list) {
            pairs.push((BYTE_LIST_ID, b));
            pairs.push((STRING_LIST_ID, l));
        }
        Bootstrap {
            by_id: pairs.iter().copied().collect(),
            by_type: pairs.iter().map(|(id, t)| (*t, *id)).collect(),
        }
    };
}

/// The built-in type for a bootstrap id.
pub fn bootstrap_type(id: TypeId) -> Option<Type> {
    BOOTSTRAP.by_id.get(&id).copied()
}

/// The bootstrap id of a built-in type.
pub fn bootstrap_id(t: Type) -> Option<TypeId> {
    BOOTSTRAP.by_type.get(&t).copied()
}

/// Reports whether a value message of type `t` carries an explicit byte
/// length. Both ends derive this from the type alone.
pub fn has_message_len(t: Type) -> bool {
    if t.is_bytes() {
        return false;
    }
    matches!(
        t.kind(),
        Kind::Complex64
            | Kind::Complex128
            | Kind::Array
            | Kind::List
            | Kind::Set
            | Kind::Map
            | Kind::Struct
            | Kind::Union
            | Kind::Any
            | Kind::Optional
    )
}
