//! The type model.
//!
//! A [`Type`] is a small copyable handle into a process-wide, append-only
//! arena of immutable type nodes. Sub-types are stored as handles too, so
//! self-referential and mutually recursive graphs need no owning cycles.
//! Structurally identical types share one node, which makes handle equality
//! the type equality test. Nodes are only ever added by
//! [`TypeBuilder::build`](crate::TypeBuilder::build).

use std::collections::{HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Bool,
    Byte,
    Uint16,
    Uint32,
    Uint64,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    Enum,
    TypeObject,
    Array,
    List,
    Set,
    Map,
    Struct,
    Union,
    Any,
    Optional,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Byte => "byte",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Complex64 => "complex64",
            Kind::Complex128 => "complex128",
            Kind::String => "string",
            Kind::Enum => "enum",
            Kind::TypeObject => "typeobject",
            Kind::Array => "array",
            Kind::List => "list",
            Kind::Set => "set",
            Kind::Map => "map",
            Kind::Struct => "struct",
            Kind::Union => "union",
            Kind::Any => "any",
            Kind::Optional => "optional",
        }
    }

    /// Kinds carrying no sub-types, labels or fields.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Kind::Bool
                | Kind::Byte
                | Kind::Uint16
                | Kind::Uint32
                | Kind::Uint64
                | Kind::Int16
                | Kind::Int32
                | Kind::Int64
                | Kind::Float32
                | Kind::Float64
                | Kind::Complex64
                | Kind::Complex128
                | Kind::String
                | Kind::TypeObject
                | Kind::Any
        )
    }

    pub(crate) fn has_elem(self) -> bool {
        matches!(self, Kind::Array | Kind::List | Kind::Map | Kind::Optional)
    }

    pub(crate) fn has_key(self) -> bool {
        matches!(self, Kind::Set | Kind::Map)
    }

    /// Kinds whose cycles can terminate: a value of these kinds may hold zero
    /// occurrences of the recursive element.
    pub(crate) fn breaks_cycles(self) -> bool {
        matches!(self, Kind::List | Kind::Set | Kind::Map | Kind::Optional | Kind::Union)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named member of a struct or union type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug)]
pub(crate) struct TypeData {
    pub(crate) kind: Kind,
    pub(crate) name: String,
    pub(crate) labels: Vec<String>,
    pub(crate) len: usize,
    pub(crate) elem: Option<Type>,
    pub(crate) key: Option<Type>,
    pub(crate) fields: Vec<Field>,
    pub(crate) unique: String,
}

pub(crate) struct Arena {
    nodes: Vec<&'static TypeData>,
    by_unique: HashMap<String, Type>,
}

impl Arena {
    fn with_builtins() -> Self {
        let mut arena = Arena { nodes: Vec::new(), by_unique: HashMap::new() };
        for kind in BUILTIN_KINDS {
            arena.push(TypeData {
                kind,
                name: String::new(),
                labels: Vec::new(),
                len: 0,
                elem: None,
                key: None,
                fields: Vec::new(),
                unique: kind.as_str().to_string(),
            });
        }
        arena
    }

    pub(crate) fn lookup(&self, unique: &str) -> Option<Type> {
        self.by_unique.get(unique).copied()
    }

    pub(crate) fn next_index(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Interns `data` for the life of the process.
    pub(crate) fn push(&mut self, data: TypeData) -> Type {
        let t = Type(self.nodes.len() as u32);
        let data: &'static TypeData = Box::leak(Box::new(data));
        self.by_unique.insert(data.unique.clone(), t);
        self.nodes.push(data);
        t
    }
}

// Order must match the associated constants on `Type`.
const BUILTIN_KINDS: [Kind; 15] = [
    Kind::Bool,
    Kind::Byte,
    Kind::Uint16,
    Kind::Uint32,
    Kind::Uint64,
    Kind::Int16,
    Kind::Int32,
    Kind::Int64,
    Kind::Float32,
    Kind::Float64,
    Kind::Complex64,
    Kind::Complex128,
    Kind::String,
    Kind::TypeObject,
    Kind::Any,
];

lazy_static! {
    pub(crate) static ref ARENA: RwLock<Arena> = RwLock::new(Arena::with_builtins());
}

/// Handle to an interned, immutable type.
///
/// Handles are cheap to copy and compare; two handles are equal exactly
/// when the types are structurally identical (including names).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(pub(crate) u32);

impl Type {
    pub const BOOL: Type = Type(0);
    pub const BYTE: Type = Type(1);
    pub const UINT16: Type = Type(2);
    pub const UINT32: Type = Type(3);
    pub const UINT64: Type = Type(4);
    pub const INT16: Type = Type(5);
    pub const INT32: Type = Type(6);
    pub const INT64: Type = Type(7);
    pub const FLOAT32: Type = Type(8);
    pub const FLOAT64: Type = Type(9);
    pub const COMPLEX64: Type = Type(10);
    pub const COMPLEX128: Type = Type(11);
    pub const STRING: Type = Type(12);
    pub const TYPE_OBJECT: Type = Type(13);
    pub const ANY: Type = Type(14);

    /// The unnamed primitive type of the given kind, if the kind is primitive.
    pub fn primitive(kind: Kind) -> Option<Type> {
        BUILTIN_KINDS.iter().position(|k| *k == kind).map(|i| Type(i as u32))
    }

    pub(crate) fn data(self) -> &'static TypeData {
        ARENA.read().nodes[self.0 as usize]
    }

    pub fn kind(self) -> Kind {
        self.data().kind
    }

    /// The type's name; empty for anonymous types.
    pub fn name(self) -> &'static str {
        &self.data().name
    }

    pub fn is_named(self) -> bool {
        !self.data().name.is_empty()
    }

    /// Array length; zero for every other kind.
    pub fn len(self) -> usize {
        self.data().len
    }

    /// Element type of an Array, List, Map or Optional.
    ///
    /// # Panics
    ///
    /// Panics if the kind has no element type.
    pub fn elem(self) -> Type {
        match self.data().elem {
            Some(t) => t,
            None => panic!("vom: {} has no elem type", self),
        }
    }

    /// Key type of a Set or Map.
    ///
    /// # Panics
    ///
    /// Panics if the kind has no key type.
    pub fn key(self) -> Type {
        match self.data().key {
            Some(t) => t,
            None => panic!("vom: {} has no key type", self),
        }
    }

    /// Fields of a Struct or Union; empty otherwise.
    pub fn fields(self) -> &'static [Field] {
        &self.data().fields
    }

    pub fn num_fields(self) -> usize {
        self.data().fields.len()
    }

    pub fn field(self, index: usize) -> Option<&'static Field> {
        self.data().fields.get(index)
    }

    pub fn field_index(self, name: &str) -> Option<usize> {
        self.data().fields.iter().position(|f| f.name == name)
    }

    /// Labels of an Enum; empty otherwise.
    pub fn labels(self) -> &'static [String] {
        &self.data().labels
    }

    pub fn label_index(self, label: &str) -> Option<usize> {
        self.data().labels.iter().position(|l| l == label)
    }

    /// Reports whether the type is a list or array of bytes, which use the
    /// compact byte-string encoding.
    pub fn is_bytes(self) -> bool {
        let data = self.data();
        matches!(data.kind, Kind::List | Kind::Array)
            && data.elem.is_some_and(|e| e.kind() == Kind::Byte)
    }

    /// Reports whether values of this type may be nil.
    pub fn can_be_nil(self) -> bool {
        matches!(self.kind(), Kind::Any | Kind::Optional)
    }

    /// Reports whether any type reachable from this one is Any or
    /// TypeObject, i.e. whether its values can carry type references.
    pub fn contains_any_or_type_object(self) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            if !seen.insert(t) {
                continue;
            }
            let data = t.data();
            if matches!(data.kind, Kind::Any | Kind::TypeObject) {
                return true;
            }
            stack.extend(data.elem);
            stack.extend(data.key);
            stack.extend(data.fields.iter().map(|f| f.ty));
        }
        false
    }

    /// Canonical description; equal for structurally equal types.
    pub fn unique(self) -> &'static str {
        &self.data().unique
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unique())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.unique())
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::ANY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_constants_match_kinds() {
        assert_eq!(Type::BOOL.kind(), Kind::Bool);
        assert_eq!(Type::BYTE.kind(), Kind::Byte);
        assert_eq!(Type::FLOAT64.kind(), Kind::Float64);
        assert_eq!(Type::STRING.kind(), Kind::String);
        assert_eq!(Type::TYPE_OBJECT.kind(), Kind::TypeObject);
        assert_eq!(Type::ANY.kind(), Kind::Any);
        for kind in BUILTIN_KINDS {
            let t = Type::primitive(kind).unwrap();
            assert_eq!(t.kind(), kind);
            assert_eq!(t.to_string(), kind.as_str());
            assert!(!t.is_named());
        }
        assert_eq!(Type::primitive(Kind::Struct), None);
    }

    #[test]
    fn test_contains_any() {
        assert!(Type::ANY.contains_any_or_type_object());
        assert!(Type::TYPE_OBJECT.contains_any_or_type_object());
        assert!(!Type::INT64.contains_any_or_type_object());
        let list = Type::list_of(Type::ANY).unwrap();
        assert!(list.contains_any_or_type_object());
        assert!(!Type::list_of(Type::STRING).unwrap().contains_any_or_type_object());
        assert!(Type::ANY.can_be_nil());
        assert!(!list.can_be_nil());
    }
}
