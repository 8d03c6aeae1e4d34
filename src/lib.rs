//! Vanadium object marshaling (VOM).
//!
//! A self-describing binary codec: each value message names its type by a
//! small id, and the first use of a type on a stream is preceded by type
//! messages describing it. Values are encoded from and decoded into the
//! generic [`Value`] tree, Rust types implementing [`VdlType`], or a
//! [`RawValue`] capture.
//!
//! Types are interned for the life of the process, so a type received from
//! a peer outlives the connection that sent it. Identical types share one
//! entry; [`Config::max_types`] bounds how many descriptions one type stream
//! may send.
//!
//! ```
//! use vom::{Decoder, Encoder, Value};
//!
//! let mut enc = Encoder::new(Vec::new());
//! enc.encode(&vec!["a".to_string(), "b".to_string()]).unwrap();
//! enc.encode_value(&Value::int64(7)).unwrap();
//! let bytes = enc.into_inner();
//!
//! let mut dec = Decoder::new(bytes.as_slice());
//! let list: Vec<String> = dec.decode().unwrap();
//! assert_eq!(list, ["a", "b"]);
//! assert_eq!(dec.decode::<i64>().unwrap(), 7);
//! ```

extern crate self as vom;

mod builder;
mod config;
mod convert;
mod decode;
mod decoder;
mod encode;
mod encoder;
mod error;
mod native;
mod object;
mod raw;
mod reader;
mod ser;
mod target;
mod type_decoder;
mod types;
mod value;
mod vtype;
mod writer;

use std::io::Read;

pub use builder::{PendingType, TypeBuilder, TypeOrPending};
pub use config::{Config, Version};
pub use decode::{UintOrControl, WireReader};
pub use decoder::Decoder;
pub use encode::WireWriter;
pub use encoder::{Encoder, TypeEncoder, WireTypeTable};
pub use error::{BuildErrors, Error, TypeError};
pub use native::{conform, VdlType};
pub use object::{
    bootstrap_id, bootstrap_type, has_message_len, TypeId, ANY_ID, BOOL_ID, BYTE_ID, BYTE_LIST_ID, COMPLEX128_ID,
    COMPLEX64_ID, FIRST_USER_ID, FLOAT32_ID, FLOAT64_ID, INT16_ID, INT32_ID, INT64_ID, STRING_ID, STRING_LIST_ID,
    TYPE_ID_ID, TYPE_OBJECT_ID, UINT16_ID, UINT32_ID, UINT64_ID, WIRE_CTRL_END, WIRE_CTRL_NIL, WIRE_TYPE_ID,
};
pub use raw::RawValue;
pub use reader::{TypeLookup, ValueReader};
pub use target::{Target, ValueTarget};
pub use type_decoder::TypeDecoder;
pub use types::{
    WireArray, WireEnum, WireField, WireList, WireMap, WireNamed, WireOptional, WireSet, WireStruct, WireType,
    WireUnion,
};
pub use value::{Rep, Value};
pub use vom_macro::Vdl;
pub use vtype::{Field, Kind, Type};
pub use writer::{RefList, TypeRefs, ValueWriter};

pub type Result<T> = std::result::Result<T, Error>;

/// Encodes `v` as a complete stream in the default version.
pub fn encode<T: VdlType>(v: &T) -> Result<Vec<u8>> {
    encode_with_version(v, Version::default())
}

pub fn encode_with_version<T: VdlType>(v: &T, version: Version) -> Result<Vec<u8>> {
    let mut enc = Encoder::with_version(Vec::new(), version);
    enc.encode(v)?;
    Ok(enc.into_inner())
}

/// Decodes the first value of a stream as `T`.
pub fn decode<T: VdlType>(data: impl Read) -> Result<T> {
    Decoder::new(data).decode()
}

