//! serde views of generic values and types, for dumping them as JSON and
//! similar formats. Structs become maps keyed by field name, a union value a
//! single-entry map, an enum its label and a type its unique string.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::value::{Rep, Value};
use crate::vtype::Type;

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.unique())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.rep() {
            Rep::Bool(b) => serializer.serialize_bool(*b),
            Rep::Uint(u) => serializer.serialize_u64(*u),
            Rep::Int(i) => serializer.serialize_i64(*i),
            Rep::Float(f) => serializer.serialize_f64(*f),
            Rep::Complex(re, im) => (re, im).serialize(serializer),
            Rep::String(s) => serializer.serialize_str(s),
            Rep::Bytes(b) => serde_bytes::Bytes::new(b).serialize(serializer),
            Rep::Enum(_) => serializer.serialize_str(self.label().unwrap_or_default()),
            Rep::TypeObject(t) => t.serialize(serializer),
            Rep::List(elems) => {
                let mut seq = serializer.serialize_seq(Some(elems.len()))?;
                for e in elems {
                    seq.serialize_element(e)?;
                }
                seq.end()
            }
            Rep::Set(keys) => {
                let mut seq = serializer.serialize_seq(Some(keys.len()))?;
                for k in keys {
                    seq.serialize_element(k)?;
                }
                seq.end()
            }
            Rep::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Rep::Fields(values) => {
                let mut map = serializer.serialize_map(Some(values.len()))?;
                for (f, v) in self.ty().fields().iter().zip(values) {
                    map.serialize_entry(&f.name, v)?;
                }
                map.end()
            }
            Rep::Union(i, v) => {
                let name = self.ty().field(*i).map(|f| f.name.as_str()).unwrap_or_default();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, v.as_ref())?;
                map.end()
            }
            Rep::Any(None) | Rep::Optional(None) => serializer.serialize_unit(),
            Rep::Any(Some(v)) | Rep::Optional(Some(v)) => v.serialize(serializer),
            Rep::Raw(r) => match r.to_value() {
                Ok(v) => v.serialize(serializer),
                Err(e) => Err(serde::ser::Error::custom(e)),
            },
        }
    }
}
